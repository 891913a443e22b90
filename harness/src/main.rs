use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use scenario_harness::config::Config;
use scenario_harness::orchestrator::OrchestratorConfig;
use scenario_harness::{HttpLoadScenario, MetricsCollector, TestOrchestrator, VariantAssigner};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize the Prometheus metrics recorder
fn setup_prometheus_metrics() -> anyhow::Result<PrometheusHandle> {
    PrometheusBuilder::new()
        .install_recorder()
        .context("Failed to install Prometheus recorder")
}

/// Write `contents` to `path`, creating parent directories as needed
fn write_output(path: &Path, contents: &str) -> anyhow::Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory {:?}", parent))?;
    }
    std::fs::write(path, contents).with_context(|| format!("Failed to write {:?}", path))
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    // Load configuration from environment
    let config = Config::from_env();

    // Install the recorder before any metric is emitted
    let prometheus_handle = match config.output.prometheus_path {
        Some(_) => Some(setup_prometheus_metrics()?),
        None => None,
    };

    // Initialize tracing; stdout is reserved for the report
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "scenario_harness=info,harness=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    info!(
        "Loaded configuration: tier={}, users={}, requests/user={}",
        config.tier, config.load.virtual_users, config.load.requests_per_user
    );

    let orchestrator = TestOrchestrator::with_config(
        Arc::new(MetricsCollector::new()),
        Arc::new(VariantAssigner::new()),
        OrchestratorConfig {
            scenario_timeout: config.scenario_timeout,
        },
    );

    match config.target_url {
        Some(ref url) => {
            info!("Running load scenario against {}", url);
            let scenario = HttpLoadScenario::new(url.clone(), config.load.clone())
                .with_request_timeout(config.request_timeout);
            orchestrator
                .run_scenario("api_load", scenario, config.thresholds())
                .await;
        }
        None => {
            warn!("HARNESS_TARGET_URL not set - no scenarios to run");
        }
    }

    let report = orchestrator.report().await;
    let json = report.to_json()?;

    eprintln!("{}", report);
    println!("{}", json);

    if let Some(ref path) = config.output.report_path {
        write_output(path, &json)?;
        info!("Report written to {:?}", path);
    }
    if let (Some(path), Some(handle)) = (&config.output.prometheus_path, &prometheus_handle) {
        write_output(path, &handle.render())?;
        info!("Prometheus metrics written to {:?}", path);
    }

    Ok(ExitCode::from(report.exit_code()))
}
