//! Sample types, aggregate statistics and collector errors

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Well-known sample categories
pub mod categories {
    pub const PAGE_LOAD: &str = "page_load";
    pub const INTERACTION: &str = "interaction";
    pub const QUERY: &str = "query";
    pub const NETWORK: &str = "network";
}

/// Labels marking the outcome of a sample
pub mod labels {
    pub const OK: &str = "ok";
    pub const ERROR: &str = "error";
}

/// Errors raised when recording samples
#[derive(Debug, Error, PartialEq)]
pub enum MetricsError {
    #[error("Invalid sample for {category}/{label}: {value} ({reason})")]
    InvalidSample {
        category: String,
        label: String,
        value: f64,
        reason: &'static str,
    },
}

/// A single recorded observation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub category: String,
    pub label: String,
    /// Milliseconds for durations, plain number for counts
    pub value: f64,
    /// Unix millis at record time
    pub timestamp: u64,
}

/// Aggregate view of one category
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CategorySummary {
    pub count: usize,
    pub mean: f64,
    pub min: f64,
    pub max: f64,
    pub p50: f64,
    pub p95: f64,
    pub p99: f64,
}

/// Statistic selectable in a threshold metric key
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Stat {
    Mean,
    Min,
    Max,
    Count,
    Sum,
    /// Percentage of samples labelled [`labels::OK`]
    SuccessRate,
    Percentile(f64),
}

impl Stat {
    fn parse(s: &str) -> Option<Self> {
        match s {
            "mean" | "avg" => Some(Stat::Mean),
            "min" => Some(Stat::Min),
            "max" => Some(Stat::Max),
            "count" => Some(Stat::Count),
            "sum" => Some(Stat::Sum),
            "success_rate" => Some(Stat::SuccessRate),
            _ => {
                let p = s.strip_prefix('p')?.parse::<f64>().ok()?;
                (0.0..=100.0).contains(&p).then_some(Stat::Percentile(p))
            }
        }
    }
}

/// A metric key of the form `<category>` or `<category>.<stat>`
///
/// A bare category selects the mean. Category names may themselves contain
/// dots; only a recognised trailing stat is split off. Fractional
/// percentiles such as `network.p99.9` keep their own dot.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricKey {
    pub category: String,
    pub stat: Stat,
}

impl MetricKey {
    pub fn parse(key: &str) -> Self {
        if let Some(idx) = key.rfind(".p")
            && let Some(stat @ Stat::Percentile(_)) = Stat::parse(&key[idx + 1..])
        {
            return Self {
                category: key[..idx].to_string(),
                stat,
            };
        }
        if let Some((category, stat)) = key.rsplit_once('.')
            && let Some(stat) = Stat::parse(stat)
        {
            return Self {
                category: category.to_string(),
                stat,
            };
        }
        Self {
            category: key.to_string(),
            stat: Stat::Mean,
        }
    }
}
