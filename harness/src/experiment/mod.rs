//! A/B experiment bookkeeping
//!
//! This module provides:
//! - `VariantAssigner` for deterministic hash bucketing of participants
//! - Conversion tracking and per-variant results
//! - A fixed-delta significance heuristic and a two-proportion z-test

mod assigner;
mod stats;
mod types;

pub use assigner::VariantAssigner;
pub use stats::{bucket, normal_cdf, stable_hash, two_proportion_z};
pub use types::{ConversionEvent, ExperimentError, VariantAssignment, VariantResults, ZTestResult};
