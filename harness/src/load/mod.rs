//! Load profiles and virtual-user execution
//!
//! Three preset tiers, mirroring how load suites are gated:
//! - **Smoke**: quick CI validation on every push
//! - **Standard**: merge gate
//! - **Stress**: manual/release testing

mod http;
mod runner;

pub use http::HttpLoadScenario;
pub use runner::{LoadSummary, run_virtual_users};

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Load tier for different testing scenarios
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoadTier {
    /// 5 users x 10 requests
    Smoke,
    /// 25 users x 40 requests
    Standard,
    /// 100 users x 100 requests
    Stress,
}

impl LoadTier {
    /// Get the tier name for display
    pub fn name(&self) -> &'static str {
        match self {
            LoadTier::Smoke => "SMOKE",
            LoadTier::Standard => "STANDARD",
            LoadTier::Stress => "STRESS",
        }
    }

    pub fn profile(&self) -> LoadProfile {
        match self {
            LoadTier::Smoke => LoadProfile {
                virtual_users: 5,
                requests_per_user: 10,
                think_time: Duration::from_millis(50),
            },
            LoadTier::Standard => LoadProfile {
                virtual_users: 25,
                requests_per_user: 40,
                think_time: Duration::from_millis(25),
            },
            LoadTier::Stress => LoadProfile {
                virtual_users: 100,
                requests_per_user: 100,
                think_time: Duration::from_millis(10),
            },
        }
    }
}

impl fmt::Display for LoadTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for LoadTier {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "smoke" => Ok(LoadTier::Smoke),
            "standard" => Ok(LoadTier::Standard),
            "stress" => Ok(LoadTier::Stress),
            other => Err(format!("unknown load tier: {other}")),
        }
    }
}

/// How many virtual users run, and how hard each one pushes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadProfile {
    pub virtual_users: usize,
    pub requests_per_user: usize,
    /// Pause between a user's iterations
    pub think_time: Duration,
}

impl Default for LoadProfile {
    fn default() -> Self {
        LoadTier::Smoke.profile()
    }
}

impl LoadProfile {
    pub fn total_requests(&self) -> usize {
        self.virtual_users * self.requests_per_user
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tier_parsing() {
        assert_eq!("smoke".parse::<LoadTier>().unwrap(), LoadTier::Smoke);
        assert_eq!("STRESS".parse::<LoadTier>().unwrap(), LoadTier::Stress);
        assert!("soak".parse::<LoadTier>().is_err());
    }

    #[test]
    fn test_tiers_scale_up() {
        let smoke = LoadTier::Smoke.profile().total_requests();
        let standard = LoadTier::Standard.profile().total_requests();
        let stress = LoadTier::Stress.profile().total_requests();
        assert!(smoke < standard && standard < stress);
        assert_eq!(LoadProfile::default(), LoadTier::Smoke.profile());
    }
}
