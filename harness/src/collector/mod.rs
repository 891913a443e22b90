//! Sample collection and aggregation
//!
//! This module provides:
//! - `MetricsCollector`, a concurrency-safe append-only sample store
//! - Aggregates computed on demand (mean, extremes, nearest-rank percentiles, success rate)
//! - `MetricKey` parsing for threshold lookups like `network.p95`

mod store;
mod types;

pub use store::MetricsCollector;
pub use types::{CategorySummary, MetricKey, MetricsError, Sample, Stat, categories, labels};
