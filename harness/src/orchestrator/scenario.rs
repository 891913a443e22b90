//! Scenario trait and the context handed to scenario code

use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use uuid::Uuid;

use super::types::Thresholds;
use crate::clock::Clock;
use crate::collector::{MetricsCollector, MetricsError};
use crate::experiment::{ConversionEvent, ExperimentError, VariantAssigner};

/// A unit of test logic that performs actions and reports samples
///
/// Implemented for any `Fn(ScenarioContext) -> impl Future<Output = anyhow::Result<()>>`,
/// so plain async closures can be passed to the orchestrator.
#[async_trait]
pub trait Scenario: Send + Sync + 'static {
    async fn run(&self, ctx: ScenarioContext) -> anyhow::Result<()>;
}

#[async_trait]
impl<F, Fut> Scenario for F
where
    F: Fn(ScenarioContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
{
    async fn run(&self, ctx: ScenarioContext) -> anyhow::Result<()> {
        (self)(ctx).await
    }
}

/// Shared services available to a running scenario
#[derive(Clone)]
pub struct ScenarioContext {
    name: Arc<str>,
    collector: Arc<MetricsCollector>,
    assigner: Arc<VariantAssigner>,
}

impl ScenarioContext {
    pub fn new(
        name: &str,
        collector: Arc<MetricsCollector>,
        assigner: Arc<VariantAssigner>,
    ) -> Self {
        Self {
            name: Arc::from(name),
            collector,
            assigner,
        }
    }

    /// Name of the scenario this context belongs to
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn collector(&self) -> &Arc<MetricsCollector> {
        &self.collector
    }

    pub fn assigner(&self) -> &Arc<VariantAssigner> {
        &self.assigner
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        self.collector.clock()
    }

    pub async fn record(
        &self,
        category: &str,
        label: &str,
        value: f64,
    ) -> Result<(), MetricsError> {
        self.collector.record(category, label, value).await
    }

    /// Await `fut` and record how long it took under `category`/`label`
    pub async fn time<F: Future>(
        &self,
        category: &str,
        label: &str,
        fut: F,
    ) -> Result<F::Output, MetricsError> {
        let start = Instant::now();
        let output = fut.await;
        self.collector
            .record_duration(category, label, start.elapsed())
            .await?;
        Ok(output)
    }

    pub fn assign(&self, test_name: &str, participant_id: &str) -> Result<String, ExperimentError> {
        self.assigner.assign(test_name, participant_id)
    }

    pub fn convert(
        &self,
        test_name: &str,
        participant_id: &str,
        event_type: &str,
    ) -> Result<ConversionEvent, ExperimentError> {
        self.assigner.convert(test_name, participant_id, event_type)
    }

    /// Fresh participant id for a simulated user
    pub fn new_participant_id(&self) -> String {
        Uuid::new_v4().to_string()
    }
}

/// A named scenario with its thresholds, for parallel runs
#[derive(Clone)]
pub struct ScenarioDef {
    pub name: String,
    pub scenario: Arc<dyn Scenario>,
    pub thresholds: Thresholds,
}

impl ScenarioDef {
    pub fn new(name: impl Into<String>, scenario: impl Scenario, thresholds: Thresholds) -> Self {
        Self {
            name: name.into(),
            scenario: Arc::new(scenario),
            thresholds,
        }
    }
}
