//! Scenario orchestration
//!
//! This module provides:
//! - `Scenario` trait (implemented for async closures) and `ScenarioContext`
//! - `TestOrchestrator` with failure isolation, timeouts and parallel runs
//! - Threshold evaluation and the serializable `ThresholdReport`

mod report;
mod runner;
mod scenario;
mod types;

pub use report::{ReportStatus, ScenarioReport, ThresholdReport};
pub use runner::TestOrchestrator;
pub use scenario::{Scenario, ScenarioContext, ScenarioDef};
pub use types::{
    OrchestratorConfig, ScenarioError, ScenarioStatus, Threshold, Thresholds, Violation,
};
