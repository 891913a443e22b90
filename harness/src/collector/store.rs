use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use metrics::{counter, histogram};
use tokio::sync::RwLock;
use tracing::{debug, warn};

use super::types::{CategorySummary, MetricKey, MetricsError, Sample, Stat, labels};
use crate::clock::{Clock, SystemClock};

/// Append-only sample store with on-demand aggregation
///
/// Every aggregate is recomputed from the full sample set on each call.
/// Appends from parallel scenarios serialize on a single write lock.
pub struct MetricsCollector {
    samples: RwLock<Vec<Sample>>,
    /// Categories that accept negative values (everything else is a duration or count)
    signed_categories: HashSet<String>,
    clock: Arc<dyn Clock>,
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricsCollector {
    pub fn new() -> Self {
        Self {
            samples: RwLock::new(Vec::new()),
            signed_categories: HashSet::new(),
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Allow negative values in the given category (e.g. deltas)
    pub fn with_signed_category(mut self, category: impl Into<String>) -> Self {
        self.signed_categories.insert(category.into());
        self
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    /// Record a sample
    pub async fn record(
        &self,
        category: &str,
        label: &str,
        value: f64,
    ) -> Result<(), MetricsError> {
        let reason = if !value.is_finite() {
            Some("value must be finite")
        } else if value < 0.0 && !self.signed_categories.contains(category) {
            Some("negative value in a non-negative category")
        } else {
            None
        };

        if let Some(reason) = reason {
            counter!("harness_samples_rejected_total").increment(1);
            warn!(category, label, value, reason, "Rejected sample");
            return Err(MetricsError::InvalidSample {
                category: category.to_string(),
                label: label.to_string(),
                value,
                reason,
            });
        }

        let sample = Sample {
            category: category.to_string(),
            label: label.to_string(),
            value,
            timestamp: self.clock.now_millis(),
        };

        self.samples.write().await.push(sample);

        counter!("harness_samples_total", "category" => category.to_string()).increment(1);
        histogram!("harness_sample_value", "category" => category.to_string()).record(value);
        debug!(category, label, value, "Recorded sample");
        Ok(())
    }

    /// Record a duration in milliseconds
    pub async fn record_duration(
        &self,
        category: &str,
        label: &str,
        duration: Duration,
    ) -> Result<(), MetricsError> {
        self.record(category, label, duration.as_secs_f64() * 1000.0)
            .await
    }

    /// Values of one category, sorted ascending
    async fn sorted_values(&self, category: &str) -> Vec<f64> {
        let samples = self.samples.read().await;
        let mut values: Vec<f64> = samples
            .iter()
            .filter(|s| s.category == category)
            .map(|s| s.value)
            .collect();
        values.sort_by(f64::total_cmp);
        values
    }

    /// Arithmetic mean of a category, 0 when empty
    pub async fn average(&self, category: &str) -> f64 {
        mean(&self.sorted_values(category).await)
    }

    /// Value at index `ceil(p/100 * n) - 1` of the sorted samples
    ///
    /// This is a nearest-rank approximation over the whole batch, not a
    /// streaming percentile estimate. Returns 0 when the category is empty.
    pub async fn percentile_approx(&self, category: &str, p: f64) -> f64 {
        percentile(&self.sorted_values(category).await, p)
    }

    /// Percentage (0..=100) of samples in `category` matching `is_success`
    pub async fn success_rate<F>(&self, category: &str, is_success: F) -> f64
    where
        F: Fn(&Sample) -> bool,
    {
        let samples = self.samples.read().await;
        let (total, ok) = samples
            .iter()
            .filter(|s| s.category == category)
            .fold((0usize, 0usize), |(total, ok), s| {
                (total + 1, ok + usize::from(is_success(s)))
            });
        if total == 0 {
            return 0.0;
        }
        ok as f64 / total as f64 * 100.0
    }

    pub async fn count(&self, category: &str) -> usize {
        let samples = self.samples.read().await;
        samples.iter().filter(|s| s.category == category).count()
    }

    pub async fn sum(&self, category: &str) -> f64 {
        self.sorted_values(category).await.iter().sum()
    }

    pub async fn min(&self, category: &str) -> f64 {
        self.sorted_values(category)
            .await
            .first()
            .copied()
            .unwrap_or(0.0)
    }

    pub async fn max(&self, category: &str) -> f64 {
        self.sorted_values(category)
            .await
            .last()
            .copied()
            .unwrap_or(0.0)
    }

    /// Count, mean, extremes and common percentiles for one category
    pub async fn summary(&self, category: &str) -> CategorySummary {
        let values = self.sorted_values(category).await;
        summarize(&values)
    }

    /// Category names in first-recorded order
    pub async fn categories(&self) -> Vec<String> {
        let samples = self.samples.read().await;
        let mut seen = HashSet::new();
        samples
            .iter()
            .filter(|s| seen.insert(s.category.as_str()))
            .map(|s| s.category.clone())
            .collect()
    }

    /// Snapshot of the samples recorded in `category`
    pub async fn samples(&self, category: &str) -> Vec<Sample> {
        let samples = self.samples.read().await;
        samples
            .iter()
            .filter(|s| s.category == category)
            .cloned()
            .collect()
    }

    pub async fn len(&self) -> usize {
        self.samples.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.samples.read().await.is_empty()
    }

    /// Resolve a metric key such as `load_time` or `network.p95`
    pub async fn metric(&self, key: &str) -> f64 {
        let key = MetricKey::parse(key);
        let values = self.sorted_values(&key.category).await;
        match key.stat {
            Stat::Mean => mean(&values),
            Stat::Min => values.first().copied().unwrap_or(0.0),
            Stat::Max => values.last().copied().unwrap_or(0.0),
            Stat::Count => values.len() as f64,
            Stat::Sum => values.iter().sum(),
            Stat::SuccessRate => {
                self.success_rate(&key.category, |s| s.label == labels::OK)
                    .await
            }
            Stat::Percentile(p) => percentile(&values, p),
        }
    }
}

/// Mean of pre-sorted values; summing in sorted order keeps the result
/// independent of insertion order
fn mean(sorted: &[f64]) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    sorted.iter().sum::<f64>() / sorted.len() as f64
}

fn percentile(sorted: &[f64], p: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    let n = sorted.len();
    let rank = (p / 100.0 * n as f64).ceil() as i64 - 1;
    let idx = rank.clamp(0, n as i64 - 1) as usize;
    sorted[idx]
}

fn summarize(sorted: &[f64]) -> CategorySummary {
    if sorted.is_empty() {
        return CategorySummary::default();
    }
    CategorySummary {
        count: sorted.len(),
        mean: mean(sorted),
        min: sorted[0],
        max: sorted[sorted.len() - 1],
        p50: percentile(sorted, 50.0),
        p95: percentile(sorted, 95.0),
        p99: percentile(sorted, 99.0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::collector::categories;

    async fn collector_with(category: &str, values: &[f64]) -> MetricsCollector {
        let collector = MetricsCollector::new();
        for v in values {
            collector.record(category, "sample", *v).await.unwrap();
        }
        collector
    }

    #[tokio::test]
    async fn test_average_and_median_of_three() {
        let collector = collector_with("load_time", &[100.0, 200.0, 300.0]).await;
        assert_eq!(collector.average("load_time").await, 200.0);
        assert_eq!(collector.percentile_approx("load_time", 50.0).await, 200.0);
    }

    #[tokio::test]
    async fn test_empty_category_uses_zero() {
        let collector = MetricsCollector::new();
        assert_eq!(collector.average("missing").await, 0.0);
        assert_eq!(collector.percentile_approx("missing", 95.0).await, 0.0);
        assert_eq!(collector.success_rate("missing", |_| true).await, 0.0);
        assert_eq!(collector.min("missing").await, 0.0);
        assert_eq!(collector.max("missing").await, 0.0);
        assert_eq!(collector.summary("missing").await, CategorySummary::default());
    }

    #[tokio::test]
    async fn test_percentile_clamps_to_bounds() {
        let collector = collector_with("q", &[5.0, 1.0, 3.0, 2.0, 4.0]).await;
        assert_eq!(collector.percentile_approx("q", 0.0).await, 1.0);
        assert_eq!(collector.percentile_approx("q", 100.0).await, 5.0);
        assert_eq!(collector.percentile_approx("q", 250.0).await, 5.0);
        assert_eq!(collector.percentile_approx("q", 20.0).await, 1.0);
        assert_eq!(collector.percentile_approx("q", 21.0).await, 2.0);
    }

    #[tokio::test]
    async fn test_rejects_non_finite_and_negative() {
        let collector = MetricsCollector::new();

        let err = collector
            .record(categories::PAGE_LOAD, "home", f64::NAN)
            .await
            .unwrap_err();
        assert!(matches!(err, MetricsError::InvalidSample { .. }));

        assert!(
            collector
                .record(categories::PAGE_LOAD, "home", f64::INFINITY)
                .await
                .is_err()
        );
        assert!(
            collector
                .record(categories::PAGE_LOAD, "home", -1.0)
                .await
                .is_err()
        );
        assert!(collector.is_empty().await);
    }

    #[tokio::test]
    async fn test_signed_category_accepts_negative() {
        let collector = MetricsCollector::new().with_signed_category("delta");
        collector.record("delta", "drift", -12.5).await.unwrap();
        assert_eq!(collector.average("delta").await, -12.5);
        assert!(collector.record("delta", "drift", f64::NAN).await.is_err());
    }

    #[tokio::test]
    async fn test_success_rate_by_label() {
        let collector = MetricsCollector::new();
        for label in ["ok", "ok", "ok", "error"] {
            collector
                .record(categories::NETWORK, label, 10.0)
                .await
                .unwrap();
        }
        let rate = collector
            .success_rate(categories::NETWORK, |s| s.label == "ok")
            .await;
        assert_eq!(rate, 75.0);
    }

    #[tokio::test]
    async fn test_timestamps_come_from_clock() {
        let clock = Arc::new(ManualClock::new(42));
        let collector = MetricsCollector::new().with_clock(clock.clone());
        collector.record("q", "a", 1.0).await.unwrap();
        clock.advance(8);
        collector.record("q", "b", 2.0).await.unwrap();

        let samples = collector.samples("q").await;
        assert_eq!(samples[0].timestamp, 42);
        assert_eq!(samples[1].timestamp, 50);
    }

    #[tokio::test]
    async fn test_record_duration_in_millis() {
        let collector = MetricsCollector::new();
        collector
            .record_duration(categories::QUERY, "select", Duration::from_micros(2500))
            .await
            .unwrap();
        assert_eq!(collector.average(categories::QUERY).await, 2.5);
    }

    #[tokio::test]
    async fn test_metric_keys() {
        let collector = collector_with("net", &[10.0, 20.0, 30.0, 40.0]).await;
        assert_eq!(collector.metric("net").await, 25.0);
        assert_eq!(collector.metric("net.min").await, 10.0);
        assert_eq!(collector.metric("net.max").await, 40.0);
        assert_eq!(collector.metric("net.count").await, 4.0);
        assert_eq!(collector.metric("net.sum").await, 100.0);
        assert_eq!(collector.metric("net.p50").await, 20.0);
        // every sample above is labelled "sample", none "ok"
        assert_eq!(collector.metric("net.success_rate").await, 0.0);
    }

    #[tokio::test]
    async fn test_categories_in_first_seen_order() {
        let collector = MetricsCollector::new();
        collector.record("b", "x", 1.0).await.unwrap();
        collector.record("a", "x", 1.0).await.unwrap();
        collector.record("b", "x", 1.0).await.unwrap();
        assert_eq!(collector.categories().await, vec!["b", "a"]);
    }

    #[tokio::test]
    async fn test_concurrent_records_are_not_lost() {
        let collector = Arc::new(MetricsCollector::new());
        let mut handles = Vec::new();
        for task in 0..16 {
            let collector = collector.clone();
            handles.push(tokio::spawn(async move {
                for i in 0..100 {
                    collector
                        .record("load", &format!("vu-{task}"), i as f64)
                        .await
                        .unwrap();
                }
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }
        assert_eq!(collector.count("load").await, 1600);
        assert_eq!(collector.average("load").await, 49.5);
    }

    #[tokio::test]
    async fn test_summary() {
        let values: Vec<f64> = (1..=100).map(f64::from).collect();
        let collector = collector_with("s", &values).await;
        let summary = collector.summary("s").await;
        assert_eq!(summary.count, 100);
        assert_eq!(summary.mean, 50.5);
        assert_eq!(summary.min, 1.0);
        assert_eq!(summary.max, 100.0);
        assert_eq!(summary.p50, 50.0);
        assert_eq!(summary.p95, 95.0);
        assert_eq!(summary.p99, 99.0);
    }
}
