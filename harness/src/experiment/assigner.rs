use std::collections::HashSet;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use indexmap::IndexMap;
use metrics::counter;
use tracing::{debug, info};

use super::stats::{bucket, two_proportion_z};
use super::types::{
    ConversionEvent, ExperimentError, VariantAssignment, VariantResults, ZTestResult,
};

/// Per-test state: variants, cached assignments and the conversion log
#[derive(Debug)]
struct Experiment {
    variants: Vec<String>,
    /// participant id -> variant index, in first-assignment order
    assignments: IndexMap<String, usize>,
    conversions: Vec<ConversionEvent>,
}

impl Experiment {
    /// Assign-if-absent; returns the variant index and whether it was new
    fn assign(&mut self, test_name: &str, participant_id: &str) -> (usize, bool) {
        if let Some(&idx) = self.assignments.get(participant_id) {
            return (idx, false);
        }
        let idx = bucket(participant_id, test_name, self.variants.len());
        self.assignments.insert(participant_id.to_string(), idx);
        (idx, true)
    }

    fn results(&self) -> IndexMap<String, VariantResults> {
        let mut results: IndexMap<String, VariantResults> = self
            .variants
            .iter()
            .map(|v| (v.clone(), VariantResults::default()))
            .collect();

        for &idx in self.assignments.values() {
            results[idx].participant_count += 1;
        }

        let mut converted: HashSet<(&str, &str)> = HashSet::new();
        for event in &self.conversions {
            if let Some(r) = results.get_mut(&event.variant_name) {
                r.total_conversions += event.value;
                *r.breakdown.entry(event.event_type.clone()).or_insert(0.0) += event.value;
                if converted.insert((event.variant_name.as_str(), event.participant_id.as_str())) {
                    r.converted_participants += 1;
                }
            }
        }

        for r in results.values_mut() {
            r.conversion_rate = if r.participant_count > 0 {
                r.total_conversions / r.participant_count as f64 * 100.0
            } else {
                0.0
            };
        }

        results
    }
}

/// Deterministic A/B bucketing with conversion bookkeeping
///
/// Each test lives in its own map entry, so `assign` and `record_conversion`
/// for one test are serialized by the entry lock. Because a conversion
/// assigns-if-absent under that same lock, a participant's assignment always
/// happens-before any conversion attributed to it.
pub struct VariantAssigner {
    tests: DashMap<String, Experiment>,
}

impl Default for VariantAssigner {
    fn default() -> Self {
        Self::new()
    }
}

impl VariantAssigner {
    pub fn new() -> Self {
        Self {
            tests: DashMap::new(),
        }
    }

    /// Register a test with an ordered, non-empty list of unique variant names
    pub fn create_test<S: Into<String>>(
        &self,
        test_name: &str,
        variant_names: impl IntoIterator<Item = S>,
    ) -> Result<(), ExperimentError> {
        let variants: Vec<String> = variant_names.into_iter().map(Into::into).collect();

        if variants.is_empty() {
            return Err(ExperimentError::InvalidVariants {
                test: test_name.to_string(),
                reason: "at least one variant is required".to_string(),
            });
        }
        let mut seen = HashSet::new();
        if let Some(dup) = variants.iter().find(|v| !seen.insert(v.as_str())) {
            return Err(ExperimentError::InvalidVariants {
                test: test_name.to_string(),
                reason: format!("duplicate variant name {dup}"),
            });
        }

        match self.tests.entry(test_name.to_string()) {
            Entry::Occupied(_) => Err(ExperimentError::DuplicateTest(test_name.to_string())),
            Entry::Vacant(slot) => {
                info!("Created test {} with variants {:?}", test_name, variants);
                slot.insert(Experiment {
                    variants,
                    assignments: IndexMap::new(),
                    conversions: Vec::new(),
                });
                Ok(())
            }
        }
    }

    /// Registered test names
    pub fn tests(&self) -> Vec<String> {
        let mut names: Vec<String> = self.tests.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }

    pub fn variants(&self, test_name: &str) -> Result<Vec<String>, ExperimentError> {
        let test = self
            .tests
            .get(test_name)
            .ok_or_else(|| ExperimentError::UnknownTest(test_name.to_string()))?;
        Ok(test.variants.clone())
    }

    /// Variant for a participant; the first assignment is kept for the run
    pub fn assign(&self, test_name: &str, participant_id: &str) -> Result<String, ExperimentError> {
        let mut test = self
            .tests
            .get_mut(test_name)
            .ok_or_else(|| ExperimentError::UnknownTest(test_name.to_string()))?;

        let (idx, is_new) = test.assign(test_name, participant_id);
        let variant = test.variants[idx].clone();
        if is_new {
            counter!(
                "harness_variant_assignments_total",
                "test" => test_name.to_string(),
                "variant" => variant.clone()
            )
            .increment(1);
            debug!("Assigned {} to {}/{}", participant_id, test_name, variant);
        }
        Ok(variant)
    }

    /// Existing assignment, without assigning
    pub fn assignment(
        &self,
        test_name: &str,
        participant_id: &str,
    ) -> Result<Option<VariantAssignment>, ExperimentError> {
        let test = self
            .tests
            .get(test_name)
            .ok_or_else(|| ExperimentError::UnknownTest(test_name.to_string()))?;
        Ok(test
            .assignments
            .get(participant_id)
            .map(|&idx| VariantAssignment {
                test_name: test_name.to_string(),
                participant_id: participant_id.to_string(),
                variant_name: test.variants[idx].clone(),
            }))
    }

    /// All assignments of a test, in first-assignment order
    pub fn assignments(&self, test_name: &str) -> Result<Vec<VariantAssignment>, ExperimentError> {
        let test = self
            .tests
            .get(test_name)
            .ok_or_else(|| ExperimentError::UnknownTest(test_name.to_string()))?;
        Ok(test
            .assignments
            .iter()
            .map(|(participant, &idx)| VariantAssignment {
                test_name: test_name.to_string(),
                participant_id: participant.clone(),
                variant_name: test.variants[idx].clone(),
            })
            .collect())
    }

    /// Record a conversion of `value` for the participant's variant
    pub fn record_conversion(
        &self,
        test_name: &str,
        participant_id: &str,
        event_type: &str,
        value: f64,
    ) -> Result<ConversionEvent, ExperimentError> {
        if !value.is_finite() || value < 0.0 {
            return Err(ExperimentError::InvalidConversion {
                test: test_name.to_string(),
                value,
            });
        }

        let mut test = self
            .tests
            .get_mut(test_name)
            .ok_or_else(|| ExperimentError::UnknownTest(test_name.to_string()))?;

        let (idx, _) = test.assign(test_name, participant_id);
        let event = ConversionEvent {
            test_name: test_name.to_string(),
            participant_id: participant_id.to_string(),
            variant_name: test.variants[idx].clone(),
            event_type: event_type.to_string(),
            value,
        };
        test.conversions.push(event.clone());

        counter!(
            "harness_conversions_total",
            "test" => test_name.to_string(),
            "variant" => event.variant_name.clone()
        )
        .increment(1);
        Ok(event)
    }

    /// Record a single conversion (value 1)
    pub fn convert(
        &self,
        test_name: &str,
        participant_id: &str,
        event_type: &str,
    ) -> Result<ConversionEvent, ExperimentError> {
        self.record_conversion(test_name, participant_id, event_type, 1.0)
    }

    /// Per-variant results in registration order
    pub fn results(
        &self,
        test_name: &str,
    ) -> Result<IndexMap<String, VariantResults>, ExperimentError> {
        let test = self
            .tests
            .get(test_name)
            .ok_or_else(|| ExperimentError::UnknownTest(test_name.to_string()))?;
        Ok(test.results())
    }

    /// Fixed-delta significance heuristic
    ///
    /// True only when every variant has at least `min_sample_size`
    /// participants and the spread between the best and worst conversion
    /// rate is at least `min_rate_delta_percent` points. This is not a
    /// statistical test; see [`VariantAssigner::z_test`].
    pub fn is_significant(
        &self,
        test_name: &str,
        min_sample_size: usize,
        min_rate_delta_percent: f64,
    ) -> Result<bool, ExperimentError> {
        let results = self.results(test_name)?;

        if results
            .values()
            .any(|r| r.participant_count < min_sample_size)
        {
            return Ok(false);
        }

        let (lo, hi) = results
            .values()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), r| {
                (lo.min(r.conversion_rate), hi.max(r.conversion_rate))
            });
        Ok(hi - lo >= min_rate_delta_percent)
    }

    /// Variant with the highest conversion rate, `None` before any conversion
    pub fn winning_variant(&self, test_name: &str) -> Result<Option<String>, ExperimentError> {
        let test = self
            .tests
            .get(test_name)
            .ok_or_else(|| ExperimentError::UnknownTest(test_name.to_string()))?;
        if test.conversions.is_empty() {
            return Ok(None);
        }

        let results = test.results();
        let mut best: Option<(&String, f64)> = None;
        for (name, r) in &results {
            if best.is_none_or(|(_, rate)| r.conversion_rate > rate) {
                best = Some((name, r.conversion_rate));
            }
        }
        Ok(best.map(|(name, _)| name.clone()))
    }

    /// Two-proportion z-test of `treatment` against `control` over converted participants
    pub fn z_test(
        &self,
        test_name: &str,
        control: &str,
        treatment: &str,
    ) -> Result<ZTestResult, ExperimentError> {
        let results = self.results(test_name)?;
        let lookup = |variant: &str| {
            results
                .get(variant)
                .ok_or_else(|| ExperimentError::UnknownVariant {
                    test: test_name.to_string(),
                    variant: variant.to_string(),
                })
        };
        let c = lookup(control)?;
        let t = lookup(treatment)?;
        Ok(two_proportion_z(
            c.converted_participants,
            c.participant_count,
            t.converted_participants,
            t.participant_count,
        ))
    }
}
