use std::any::Any;
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use futures_util::future::join_all;
use indexmap::IndexMap;
use metrics::{counter, histogram};
use tokio::sync::RwLock;
use tracing::{error, info, warn};

use super::report::{ScenarioReport, ThresholdReport};
use super::scenario::{Scenario, ScenarioContext, ScenarioDef};
use super::types::{OrchestratorConfig, ScenarioError, ScenarioStatus, Thresholds, Violation};
use crate::collector::{MetricKey, MetricsCollector};
use crate::experiment::VariantAssigner;

/// Drives scenarios, evaluates thresholds and builds the run report
///
/// Scenario failures never escape: an error, panic or timeout inside a
/// scenario is recorded as `Errored` and the orchestrator carries on with
/// the next one.
pub struct TestOrchestrator {
    collector: Arc<MetricsCollector>,
    assigner: Arc<VariantAssigner>,
    config: OrchestratorConfig,
    /// Scenario outcomes in first-run order
    outcomes: RwLock<IndexMap<String, ScenarioReport>>,
}

impl TestOrchestrator {
    pub fn new(collector: Arc<MetricsCollector>, assigner: Arc<VariantAssigner>) -> Self {
        Self::with_config(collector, assigner, OrchestratorConfig::default())
    }

    pub fn with_config(
        collector: Arc<MetricsCollector>,
        assigner: Arc<VariantAssigner>,
        config: OrchestratorConfig,
    ) -> Self {
        Self {
            collector,
            assigner,
            config,
            outcomes: RwLock::new(IndexMap::new()),
        }
    }

    pub fn collector(&self) -> &Arc<MetricsCollector> {
        &self.collector
    }

    pub fn assigner(&self) -> &Arc<VariantAssigner> {
        &self.assigner
    }

    /// Run one scenario to completion and evaluate its thresholds
    ///
    /// Re-running a name replaces that scenario's previous outcome.
    pub async fn run_scenario<S: Scenario>(
        &self,
        name: &str,
        scenario: S,
        thresholds: Thresholds,
    ) -> ScenarioStatus {
        self.run_shared(name, Arc::new(scenario), &thresholds).await
    }

    /// Run several scenarios concurrently; returns once all have finished
    pub async fn run_parallel(&self, scenarios: Vec<ScenarioDef>) -> Vec<ScenarioStatus> {
        // Register everything up front so the report keeps submission order
        for def in &scenarios {
            self.set_report(ScenarioReport::pending(&def.name)).await;
        }
        join_all(
            scenarios
                .iter()
                .map(|def| self.run_shared(&def.name, def.scenario.clone(), &def.thresholds)),
        )
        .await
    }

    /// Current status of a scenario, if it was ever run
    pub async fn status(&self, name: &str) -> Option<ScenarioStatus> {
        self.outcomes.read().await.get(name).map(|r| r.status)
    }

    async fn set_report(&self, report: ScenarioReport) {
        self.outcomes
            .write()
            .await
            .insert(report.name.clone(), report);
    }

    async fn set_status(&self, name: &str, status: ScenarioStatus) {
        let mut outcomes = self.outcomes.write().await;
        outcomes
            .entry(name.to_string())
            .or_insert_with(|| ScenarioReport::pending(name))
            .status = status;
    }

    async fn run_shared(
        &self,
        name: &str,
        scenario: Arc<dyn Scenario>,
        thresholds: &Thresholds,
    ) -> ScenarioStatus {
        self.set_report(ScenarioReport::pending(name)).await;
        self.set_status(name, ScenarioStatus::Running).await;
        info!("Running scenario {}", name);

        let ctx = ScenarioContext::new(name, self.collector.clone(), self.assigner.clone());
        let start = Instant::now();
        let outcome = self.execute(scenario, ctx).await;
        let elapsed = start.elapsed();

        let mut report = ScenarioReport::pending(name);
        report.duration_ms = elapsed.as_secs_f64() * 1000.0;

        match outcome {
            Ok(()) => {
                for (metric, threshold) in thresholds {
                    let actual = self.metric(metric).await;
                    report.metrics.insert(metric.clone(), actual);
                    report.violations.extend(threshold.check(metric, actual));
                }
                report.status = if report.violations.is_empty() {
                    ScenarioStatus::Passed
                } else {
                    ScenarioStatus::Failed
                };
                for v in &report.violations {
                    warn!(
                        "Scenario {} violated {}: expected {}, got {}",
                        name, v.metric, v.expected, v.actual
                    );
                }
            }
            Err(e) => {
                error!("Scenario {} errored: {}", name, e);
                report.status = ScenarioStatus::Errored;
                report.error = Some(e.to_string());
            }
        }

        let status = report.status;
        info!(
            "Scenario {} finished: {} in {:.1}ms",
            name, status, report.duration_ms
        );
        counter!("harness_scenarios_total", "status" => status.as_str()).increment(1);
        histogram!("harness_scenario_duration_seconds").record(elapsed);

        self.set_report(report).await;
        status
    }

    /// Run the scenario on its own task so panics and timeouts stay contained
    async fn execute(
        &self,
        scenario: Arc<dyn Scenario>,
        ctx: ScenarioContext,
    ) -> Result<(), ScenarioError> {
        let handle = tokio::spawn(async move { scenario.run(ctx).await });
        let abort = handle.abort_handle();

        match tokio::time::timeout(self.config.scenario_timeout, handle).await {
            Ok(Ok(Ok(()))) => Ok(()),
            Ok(Ok(Err(e))) => Err(ScenarioError::Failed(format!("{e:#}"))),
            Ok(Err(join_err)) if join_err.is_panic() => {
                Err(ScenarioError::Panicked(panic_message(join_err.into_panic())))
            }
            Ok(Err(_)) => Err(ScenarioError::Cancelled),
            Err(_) => {
                // Samples recorded before the deadline stay in the collector
                abort.abort();
                Err(ScenarioError::TimedOut(self.config.scenario_timeout))
            }
        }
    }

    /// Resolve a threshold metric key against current aggregates
    ///
    /// `experiment.<test>.<variant>.<rate|participants|conversions>` reads
    /// A/B results; anything else is a collector key. Unknown tests and
    /// variants resolve to 0, as do categories without samples; both log a
    /// warning.
    pub async fn metric(&self, key: &str) -> f64 {
        if let Some(rest) = key.strip_prefix("experiment.") {
            let mut parts = rest.rsplitn(3, '.');
            if let (Some(stat), Some(variant), Some(test)) =
                (parts.next(), parts.next(), parts.next())
                && matches!(stat, "rate" | "participants" | "conversions")
            {
                let results = self.assigner.results(test).ok();
                let Some(r) = results.as_ref().and_then(|r| r.get(variant)) else {
                    warn!("Metric {} refers to an unknown test or variant", key);
                    return 0.0;
                };
                return match stat {
                    "rate" => r.conversion_rate,
                    "participants" => r.participant_count as f64,
                    _ => r.total_conversions,
                };
            }
        }

        let category = MetricKey::parse(key).category;
        if self.collector.count(&category).await == 0 {
            warn!("Metric {} has no samples in category {}", key, category);
        }
        self.collector.metric(key).await
    }

    /// Build the report for every scenario run so far
    pub async fn report(&self) -> ThresholdReport {
        let mut summary = IndexMap::new();
        for category in self.collector.categories().await {
            let s = self.collector.summary(&category).await;
            summary.insert(format!("{category}.count"), s.count as f64);
            summary.insert(format!("{category}.mean"), s.mean);
            summary.insert(format!("{category}.min"), s.min);
            summary.insert(format!("{category}.max"), s.max);
            summary.insert(format!("{category}.p50"), s.p50);
            summary.insert(format!("{category}.p95"), s.p95);
            summary.insert(format!("{category}.p99"), s.p99);
        }

        let mut experiments = IndexMap::new();
        for test in self.assigner.tests() {
            if let Ok(results) = self.assigner.results(&test) {
                experiments.insert(test, results);
            }
        }

        let scenarios: Vec<ScenarioReport> = self
            .outcomes
            .read()
            .await
            .values()
            .cloned()
            .collect();
        let generated_at =
            DateTime::from_timestamp_millis(self.collector.clock().now_millis() as i64)
                .unwrap_or_else(Utc::now);

        ThresholdReport::new(generated_at, summary, scenarios, experiments)
    }

    /// All violations recorded so far
    pub async fn violations(&self) -> Vec<Violation> {
        self.outcomes
            .read()
            .await
            .values()
            .flat_map(|r| r.violations.iter().cloned())
            .collect()
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
