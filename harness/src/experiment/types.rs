//! A/B experiment types and error definitions

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur when registering or querying experiments
#[derive(Debug, Error, PartialEq)]
pub enum ExperimentError {
    #[error("Test already exists: {0}")]
    DuplicateTest(String),

    #[error("Test not found: {0}")]
    UnknownTest(String),

    #[error("Invalid variants for test {test}: {reason}")]
    InvalidVariants { test: String, reason: String },

    #[error("Variant {variant} is not part of test {test}")]
    UnknownVariant { test: String, variant: String },

    #[error("Invalid conversion value for test {test}: {value}")]
    InvalidConversion { test: String, value: f64 },
}

/// A participant's bucket in one test
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariantAssignment {
    pub test_name: String,
    pub participant_id: String,
    pub variant_name: String,
}

/// A recorded conversion, attributed to the participant's variant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversionEvent {
    pub test_name: String,
    pub participant_id: String,
    pub variant_name: String,
    pub event_type: String,
    pub value: f64,
}

/// Aggregated results for one variant
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VariantResults {
    /// Participants bucketed into this variant
    pub participant_count: usize,
    /// Distinct participants with at least one conversion
    pub converted_participants: usize,
    /// Sum of conversion values
    pub total_conversions: f64,
    /// `total_conversions / participant_count * 100`, 0 with no participants
    pub conversion_rate: f64,
    /// Summed conversion value per event type
    pub breakdown: BTreeMap<String, f64>,
}

/// Outcome of a two-proportion z-test
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ZTestResult {
    /// Positive when the treatment converts better than the control
    pub z: f64,
    /// Two-sided p-value
    pub p_value: f64,
}

impl ZTestResult {
    pub fn is_significant(&self, alpha: f64) -> bool {
        self.p_value < alpha
    }
}
