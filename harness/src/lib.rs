//! Scenario Harness Library
//!
//! Performance and experiment test harness: a concurrency-safe metrics
//! collector, a deterministic A/B variant assigner and an orchestrator that
//! runs scenarios against thresholds and produces a pass/fail report.

pub mod clock;
pub mod collector;
pub mod config;
pub mod experiment;
pub mod load;
pub mod orchestrator;
pub mod probe;

mod test_utils;

// Re-export commonly used types
pub use clock::{Clock, ManualClock, SystemClock};
pub use collector::MetricsCollector;
pub use config::Config;
pub use experiment::VariantAssigner;
pub use load::{HttpLoadScenario, LoadProfile, LoadTier, run_virtual_users};
pub use orchestrator::{
    Scenario, ScenarioContext, ScenarioDef, ScenarioStatus, TestOrchestrator, Threshold,
    ThresholdReport, Thresholds,
};
pub use probe::HttpProbe;
