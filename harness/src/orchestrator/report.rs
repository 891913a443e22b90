//! Run reports for CI consumption

use std::fmt;

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use super::types::{ScenarioStatus, Violation};
use crate::experiment::VariantResults;

/// Overall verdict of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportStatus {
    Pass,
    Fail,
}

/// Outcome of one scenario
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioReport {
    pub name: String,
    pub status: ScenarioStatus,
    pub duration_ms: f64,
    /// Actual value of every thresholded metric
    pub metrics: IndexMap<String, f64>,
    pub violations: Vec<Violation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ScenarioReport {
    pub fn pending(name: &str) -> Self {
        Self {
            name: name.to_string(),
            status: ScenarioStatus::Pending,
            duration_ms: 0.0,
            metrics: IndexMap::new(),
            violations: Vec::new(),
            error: None,
        }
    }
}

/// Aggregated report across every scenario of a run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThresholdReport {
    pub status: ReportStatus,
    pub passed: bool,
    pub generated_at: DateTime<Utc>,
    /// `<category>.<stat>` -> value for every recorded category
    pub summary: IndexMap<String, f64>,
    /// All violations, in scenario order
    pub violations: Vec<Violation>,
    pub scenarios: Vec<ScenarioReport>,
    /// Test name -> variant -> results
    pub experiments: IndexMap<String, IndexMap<String, VariantResults>>,
}

impl ThresholdReport {
    /// Build a report; passes only when every scenario passed
    pub fn new(
        generated_at: DateTime<Utc>,
        summary: IndexMap<String, f64>,
        scenarios: Vec<ScenarioReport>,
        experiments: IndexMap<String, IndexMap<String, VariantResults>>,
    ) -> Self {
        let violations: Vec<Violation> = scenarios
            .iter()
            .flat_map(|s| s.violations.iter().cloned())
            .collect();
        let passed = violations.is_empty()
            && scenarios
                .iter()
                .all(|s| s.status == ScenarioStatus::Passed);

        Self {
            status: if passed {
                ReportStatus::Pass
            } else {
                ReportStatus::Fail
            },
            passed,
            generated_at,
            summary,
            violations,
            scenarios,
            experiments,
        }
    }

    pub fn scenario(&self, name: &str) -> Option<&ScenarioReport> {
        self.scenarios.iter().find(|s| s.name == name)
    }

    pub fn errored(&self) -> impl Iterator<Item = &ScenarioReport> {
        self.scenarios
            .iter()
            .filter(|s| s.status == ScenarioStatus::Errored)
    }

    /// Process exit code for CI gating
    pub fn exit_code(&self) -> u8 {
        if self.passed { 0 } else { 1 }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

impl fmt::Display for ThresholdReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rule = "═══════════════════════════════════════════════════════════════";
        writeln!(f, "{rule}")?;
        writeln!(
            f,
            " RESULTS: {} scenarios ({})",
            self.scenarios.len(),
            self.generated_at.to_rfc3339()
        )?;
        writeln!(f, "{rule}")?;
        writeln!(f)?;

        for s in &self.scenarios {
            writeln!(
                f,
                "   {:28} {:>8}   {:>10.1}ms",
                s.name,
                s.status.as_str().to_uppercase(),
                s.duration_ms
            )?;
            for (metric, value) in &s.metrics {
                writeln!(f, "      {:25} {:>12.2}", metric, value)?;
            }
            for v in &s.violations {
                writeln!(
                    f,
                    "      [VIOLATION] {}: expected {}, got {:.2}",
                    v.metric, v.expected, v.actual
                )?;
            }
            if let Some(ref error) = s.error {
                writeln!(f, "      [ERROR] {}", error)?;
            }
        }

        for (test, variants) in &self.experiments {
            writeln!(f)?;
            writeln!(
                f,
                " ─── Experiment {} ───────────────────────────────────────",
                test
            )?;
            for (variant, r) in variants {
                writeln!(
                    f,
                    "   {:16} {:>6} participants {:>8.2}% conversion",
                    variant, r.participant_count, r.conversion_rate
                )?;
            }
        }

        writeln!(f)?;
        writeln!(f, "{rule}")?;
        let overall = if self.passed {
            "PASS"
        } else if self.errored().next().is_some() {
            "FAIL (scenario errored)"
        } else {
            "FAIL (threshold violated)"
        };
        writeln!(f, " OVERALL: {}", overall)?;
        write!(f, "{rule}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scenario(name: &str, status: ScenarioStatus) -> ScenarioReport {
        ScenarioReport {
            status,
            ..ScenarioReport::pending(name)
        }
    }

    #[test]
    fn test_all_passed() {
        let report = ThresholdReport::new(
            Utc::now(),
            IndexMap::new(),
            vec![scenario("a", ScenarioStatus::Passed)],
            IndexMap::new(),
        );
        assert!(report.passed);
        assert_eq!(report.status, ReportStatus::Pass);
        assert_eq!(report.exit_code(), 0);
    }

    #[test]
    fn test_errored_scenario_fails_run() {
        let mut errored = scenario("b", ScenarioStatus::Errored);
        errored.error = Some("boom".to_string());
        let report = ThresholdReport::new(
            Utc::now(),
            IndexMap::new(),
            vec![scenario("a", ScenarioStatus::Passed), errored],
            IndexMap::new(),
        );
        assert!(!report.passed);
        assert_eq!(report.exit_code(), 1);
        assert_eq!(report.errored().count(), 1);
        assert!(report.to_string().contains("FAIL (scenario errored)"));
    }

    #[test]
    fn test_unfinished_scenario_fails_run() {
        let report = ThresholdReport::new(
            Utc::now(),
            IndexMap::new(),
            vec![scenario("a", ScenarioStatus::Running)],
            IndexMap::new(),
        );
        assert!(!report.passed);
    }

    #[test]
    fn test_json_shape() {
        let mut failed = scenario("load", ScenarioStatus::Failed);
        failed.violations.push(Violation {
            metric: "responseTime".to_string(),
            expected: "<=1000".to_string(),
            actual: 1500.0,
        });
        let report =
            ThresholdReport::new(Utc::now(), IndexMap::new(), vec![failed], IndexMap::new());

        let json: serde_json::Value = serde_json::from_str(&report.to_json().unwrap()).unwrap();
        assert_eq!(json["status"], "fail");
        assert_eq!(json["passed"], false);
        assert_eq!(json["scenarios"][0]["status"], "failed");
        assert_eq!(json["violations"][0]["metric"], "responseTime");
        assert_eq!(json["violations"][0]["expected"], "<=1000");
        assert_eq!(json["violations"][0]["actual"], 1500.0);
        assert!(json["scenarios"][0].get("error").is_none());
    }
}
