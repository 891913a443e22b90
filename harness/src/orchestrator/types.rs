//! Scenario lifecycle, thresholds and violation records

use std::fmt;
use std::time::Duration;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Lifecycle of one scenario run
///
/// `Pending -> Running -> {Passed | Failed | Errored}`. Terminal states are
/// never left again; re-running a scenario starts a new lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScenarioStatus {
    Pending,
    Running,
    Passed,
    /// At least one threshold was violated
    Failed,
    /// The scenario itself failed, panicked or timed out
    Errored,
}

impl ScenarioStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScenarioStatus::Pending => "pending",
            ScenarioStatus::Running => "running",
            ScenarioStatus::Passed => "passed",
            ScenarioStatus::Failed => "failed",
            ScenarioStatus::Errored => "errored",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ScenarioStatus::Passed | ScenarioStatus::Failed | ScenarioStatus::Errored
        )
    }
}

impl fmt::Display for ScenarioStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a scenario ended up `Errored`
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ScenarioError {
    #[error("Scenario failed: {0}")]
    Failed(String),

    #[error("Scenario panicked: {0}")]
    Panicked(String),

    #[error("Scenario timed out after {0:?}")]
    TimedOut(Duration),

    #[error("Scenario was cancelled")]
    Cancelled,
}

/// Bounds on an aggregate metric
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Threshold {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
}

impl Threshold {
    pub fn max(max: f64) -> Self {
        Self {
            min: None,
            max: Some(max),
        }
    }

    pub fn min(min: f64) -> Self {
        Self {
            min: Some(min),
            max: None,
        }
    }

    pub fn between(min: f64, max: f64) -> Self {
        Self {
            min: Some(min),
            max: Some(max),
        }
    }

    /// Violations of this threshold for `metric` at value `actual`
    pub fn check(&self, metric: &str, actual: f64) -> Vec<Violation> {
        let mut violations = Vec::new();
        if let Some(max) = self.max
            && actual > max
        {
            violations.push(Violation {
                metric: metric.to_string(),
                expected: format!("<={}", max),
                actual,
            });
        }
        if let Some(min) = self.min
            && actual < min
        {
            violations.push(Violation {
                metric: metric.to_string(),
                expected: format!(">={}", min),
                actual,
            });
        }
        violations
    }
}

/// Thresholds keyed by metric name, evaluated in insertion order
pub type Thresholds = IndexMap<String, Threshold>;

/// A threshold that was not met; report data, not an error
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Violation {
    pub metric: String,
    pub expected: String,
    pub actual: f64,
}

/// Orchestrator configuration
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Wall-clock budget per scenario
    pub scenario_timeout: Duration,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            scenario_timeout: Duration::from_secs(300),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_max_threshold_violation() {
        let violations = Threshold::max(1000.0).check("responseTime", 1500.0);
        assert_eq!(
            violations,
            vec![Violation {
                metric: "responseTime".to_string(),
                expected: "<=1000".to_string(),
                actual: 1500.0,
            }]
        );
    }

    #[test]
    fn test_bounds_are_inclusive() {
        assert!(Threshold::max(10.0).check("m", 10.0).is_empty());
        assert!(Threshold::min(10.0).check("m", 10.0).is_empty());
        assert!(Threshold::between(1.0, 2.0).check("m", 1.5).is_empty());
    }

    #[test]
    fn test_min_threshold_violation() {
        let violations = Threshold::min(99.5).check("success", 97.25);
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].expected, ">=99.5");
        assert_eq!(violations[0].actual, 97.25);
    }

    #[test]
    fn test_threshold_from_json() {
        let thresholds: Thresholds =
            serde_json::from_str(r#"{"network.p95": {"max": 250}, "success": {"min": 99}}"#)
                .unwrap();
        assert_eq!(thresholds["network.p95"], Threshold::max(250.0));
        assert_eq!(thresholds["success"], Threshold::min(99.0));
        assert_eq!(thresholds.get_index(0).unwrap().0, "network.p95");
    }

    #[test]
    fn test_status_serialization() {
        assert_eq!(
            serde_json::to_string(&ScenarioStatus::Errored).unwrap(),
            "\"errored\""
        );
        assert!(ScenarioStatus::Passed.is_terminal());
        assert!(!ScenarioStatus::Running.is_terminal());
    }
}
