//! GET-only load scenario against a single endpoint

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::info;

use super::{LoadProfile, run_virtual_users};
use crate::orchestrator::{Scenario, ScenarioContext};
use crate::probe::HttpProbe;

/// Hammer one URL with virtual users, recording every request as a
/// `network` sample
///
/// Request failures are samples, not scenario errors: the run itself
/// succeeds and thresholds such as `network.p95` or `network.success_rate`
/// decide whether it passes.
#[derive(Debug, Clone)]
pub struct HttpLoadScenario {
    pub url: String,
    pub profile: LoadProfile,
    pub request_timeout: Duration,
}

impl HttpLoadScenario {
    pub fn new(url: impl Into<String>, profile: LoadProfile) -> Self {
        Self {
            url: url.into(),
            profile,
            request_timeout: Duration::from_secs(10),
        }
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }
}

#[async_trait]
impl Scenario for HttpLoadScenario {
    async fn run(&self, ctx: ScenarioContext) -> anyhow::Result<()> {
        // Scenario-local client; its pool is gone once the run returns
        let probe = Arc::new(HttpProbe::new(
            ctx.collector().clone(),
            self.request_timeout,
        )?);
        let url: Arc<str> = Arc::from(self.url.as_str());

        let summary = run_virtual_users(&self.profile, move |_user, _iteration| {
            let probe = probe.clone();
            let url = url.clone();
            async move {
                probe.get(&url).await?;
                anyhow::Ok(())
            }
        })
        .await;

        info!(
            "Scenario {} sent {} requests to {} ({} failed)",
            ctx.name(),
            summary.completed + summary.failed,
            self.url,
            summary.failed
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::categories;
    use crate::orchestrator::{ScenarioStatus, Threshold};
    use crate::test_utils::{TestServer, fixture_router, orchestrator, thresholds};

    fn profile() -> LoadProfile {
        LoadProfile {
            virtual_users: 3,
            requests_per_user: 4,
            think_time: Duration::ZERO,
        }
    }

    #[tokio::test]
    async fn test_healthy_endpoint_passes() {
        let server = TestServer::spawn(fixture_router()).await;
        let orch = orchestrator();

        let status = orch
            .run_scenario(
                "health_load",
                HttpLoadScenario::new(server.url("/health"), profile()),
                thresholds(&[
                    ("network.success_rate", Threshold::min(100.0)),
                    ("network.count", Threshold::between(12.0, 12.0)),
                ]),
            )
            .await;

        assert_eq!(status, ScenarioStatus::Passed);
        assert_eq!(orch.collector().count(categories::NETWORK).await, 12);
    }

    #[tokio::test]
    async fn test_failing_endpoint_fails_on_success_rate() {
        let server = TestServer::spawn(fixture_router()).await;
        let orch = orchestrator();

        let status = orch
            .run_scenario(
                "fail_load",
                HttpLoadScenario::new(server.url("/fail"), profile()),
                thresholds(&[("network.success_rate", Threshold::min(99.0))]),
            )
            .await;

        assert_eq!(status, ScenarioStatus::Failed);
        let report = orch.report().await;
        let scenario = report.scenario("fail_load").unwrap();
        assert_eq!(scenario.violations[0].metric, "network.success_rate");
        assert_eq!(scenario.violations[0].actual, 0.0);
    }

    #[tokio::test]
    async fn test_request_timeout_counts_as_error_sample() {
        let server = TestServer::spawn(fixture_router()).await;
        let orch = orchestrator();
        let scenario = HttpLoadScenario::new(
            server.url("/slow"),
            LoadProfile {
                virtual_users: 1,
                requests_per_user: 2,
                think_time: Duration::ZERO,
            },
        )
        .with_request_timeout(Duration::from_millis(50));

        let status = orch
            .run_scenario("slow_load", scenario, Default::default())
            .await;

        assert_eq!(status, ScenarioStatus::Passed);
        let samples = orch.collector().samples(categories::NETWORK).await;
        assert_eq!(samples.len(), 2);
        assert!(samples.iter().all(|s| s.label == "error"));
    }
}
