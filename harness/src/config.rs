//! Harness configuration
//!
//! Configuration is loaded from `HARNESS_*` environment variables. Anything
//! unset or unparseable keeps its default.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::load::{LoadProfile, LoadTier};
use crate::orchestrator::{Threshold, Thresholds};

/// Main harness configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Base URL the load scenario targets; nothing runs without it
    pub target_url: Option<String>,
    /// Preset the load profile started from
    pub tier: LoadTier,
    /// Effective load profile (tier preset plus overrides)
    pub load: LoadProfile,
    /// Wall-clock budget per scenario
    pub scenario_timeout: Duration,
    /// Per-request HTTP timeout
    pub request_timeout: Duration,

    /// Pass/fail gates for the load scenario
    pub thresholds: ThresholdConfig,

    /// Where results are written
    pub output: OutputConfig,
}

/// Threshold-related configuration
#[derive(Debug, Clone)]
pub struct ThresholdConfig {
    /// Upper bound for the 95th percentile network latency
    pub max_p95_ms: f64,
    /// Lower bound for the network success rate, in percent
    pub min_success_rate: f64,
}

/// Output-related configuration
#[derive(Debug, Clone, Default)]
pub struct OutputConfig {
    /// Report JSON file, in addition to stdout
    pub report_path: Option<PathBuf>,
    /// Prometheus text dump; the recorder is only installed when set
    pub prometheus_path: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        let tier = LoadTier::Smoke;
        Self {
            target_url: None,
            tier,
            load: tier.profile(),
            scenario_timeout: Duration::from_secs(300),
            request_timeout: Duration::from_millis(10_000),
            thresholds: ThresholdConfig::default(),
            output: OutputConfig::default(),
        }
    }
}

impl Default for ThresholdConfig {
    fn default() -> Self {
        Self {
            max_p95_ms: 1000.0,
            min_success_rate: 99.0,
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        Self::from_vars(|key| env::var(key).ok())
    }

    /// Load configuration from an arbitrary variable lookup
    pub fn from_vars(var: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        // Target
        if let Some(url) = var("HARNESS_TARGET_URL")
            && !url.is_empty()
        {
            config.target_url = Some(url);
        }

        // Load profile: tier first, explicit knobs override it
        if let Some(val) = var("HARNESS_TIER")
            && let Ok(tier) = val.parse::<LoadTier>()
        {
            config.tier = tier;
            config.load = tier.profile();
        }
        if let Some(val) = var("HARNESS_VIRTUAL_USERS")
            && let Ok(v) = val.parse()
        {
            config.load.virtual_users = v;
        }
        if let Some(val) = var("HARNESS_REQUESTS_PER_USER")
            && let Ok(v) = val.parse()
        {
            config.load.requests_per_user = v;
        }
        if let Some(val) = var("HARNESS_THINK_TIME_MS")
            && let Ok(ms) = val.parse::<u64>()
        {
            config.load.think_time = Duration::from_millis(ms);
        }

        // Timeouts
        if let Some(val) = var("HARNESS_SCENARIO_TIMEOUT_SECS")
            && let Ok(secs) = val.parse::<u64>()
        {
            config.scenario_timeout = Duration::from_secs(secs);
        }
        if let Some(val) = var("HARNESS_REQUEST_TIMEOUT_MS")
            && let Ok(ms) = val.parse::<u64>()
        {
            config.request_timeout = Duration::from_millis(ms);
        }

        // Thresholds
        if let Some(val) = var("HARNESS_MAX_P95_MS")
            && let Ok(v) = val.parse::<f64>()
            && v.is_finite()
        {
            config.thresholds.max_p95_ms = v;
        }
        if let Some(val) = var("HARNESS_MIN_SUCCESS_RATE")
            && let Ok(v) = val.parse::<f64>()
            && v.is_finite()
        {
            config.thresholds.min_success_rate = v;
        }

        // Output
        if let Some(path) = var("HARNESS_REPORT_PATH")
            && !path.is_empty()
        {
            config.output.report_path = Some(PathBuf::from(path));
        }
        if let Some(path) = var("HARNESS_PROMETHEUS_PATH")
            && !path.is_empty()
        {
            config.output.prometheus_path = Some(PathBuf::from(path));
        }

        config
    }

    /// Threshold map for the network load scenario
    pub fn thresholds(&self) -> Thresholds {
        let mut thresholds = Thresholds::new();
        thresholds.insert(
            "network.p95".to_string(),
            Threshold::max(self.thresholds.max_p95_ms),
        );
        thresholds.insert(
            "network.success_rate".to_string(),
            Threshold::min(self.thresholds.min_success_rate),
        );
        thresholds
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn from_pairs(pairs: &[(&str, &str)]) -> Config {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_vars(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert!(config.target_url.is_none());
        assert_eq!(config.tier, LoadTier::Smoke);
        assert_eq!(config.load, LoadTier::Smoke.profile());
        assert_eq!(config.scenario_timeout, Duration::from_secs(300));
        assert_eq!(config.thresholds.min_success_rate, 99.0);
        assert!(config.output.report_path.is_none());
    }

    #[test]
    fn test_config_from_env() {
        // Nothing in the test environment sets HARNESS_TIER
        let config = Config::from_env();
        assert_eq!(config.scenario_timeout, Duration::from_secs(300));
    }

    #[test]
    fn test_tier_then_overrides() {
        let config = from_pairs(&[
            ("HARNESS_TIER", "stress"),
            ("HARNESS_VIRTUAL_USERS", "7"),
            ("HARNESS_THINK_TIME_MS", "0"),
        ]);
        assert_eq!(config.tier, LoadTier::Stress);
        assert_eq!(config.load.virtual_users, 7);
        assert_eq!(
            config.load.requests_per_user,
            LoadTier::Stress.profile().requests_per_user
        );
        assert_eq!(config.load.think_time, Duration::ZERO);
    }

    #[test]
    fn test_garbage_keeps_defaults() {
        let config = from_pairs(&[
            ("HARNESS_TIER", "soak"),
            ("HARNESS_MAX_P95_MS", "fast"),
            ("HARNESS_MIN_SUCCESS_RATE", "NaN"),
            ("HARNESS_TARGET_URL", ""),
        ]);
        assert_eq!(config.tier, LoadTier::Smoke);
        assert_eq!(config.thresholds.max_p95_ms, 1000.0);
        assert_eq!(config.thresholds.min_success_rate, 99.0);
        assert!(config.target_url.is_none());
    }

    #[test]
    fn test_thresholds_from_config() {
        let config = from_pairs(&[
            ("HARNESS_TARGET_URL", "http://localhost:8080/health"),
            ("HARNESS_MAX_P95_MS", "250"),
            ("HARNESS_MIN_SUCCESS_RATE", "95.5"),
            ("HARNESS_REPORT_PATH", "out/report.json"),
        ]);
        assert_eq!(
            config.target_url.as_deref(),
            Some("http://localhost:8080/health")
        );
        assert_eq!(
            config.output.report_path,
            Some(PathBuf::from("out/report.json"))
        );

        let thresholds = config.thresholds();
        assert_eq!(thresholds["network.p95"], Threshold::max(250.0));
        assert_eq!(thresholds["network.success_rate"], Threshold::min(95.5));
    }
}
