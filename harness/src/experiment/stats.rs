//! Bucketing hash and the normal approximation used by the z-test

use super::types::ZTestResult;

/// 32-bit polynomial rolling hash (multiplier 31) over UTF-8 bytes
///
/// Wrapping signed arithmetic, so for ASCII input this matches the
/// `hash = (hash << 5) - hash + code; hash |= 0` idiom used by browser
/// clients and buckets participants identically on both sides.
pub fn stable_hash(input: &str) -> i32 {
    input
        .bytes()
        .fold(0i32, |h, b| h.wrapping_mul(31).wrapping_add(i32::from(b)))
}

/// Bucket index for a participant in a test with `variants` arms
///
/// # Panics
///
/// Panics if `variants` is 0. Registered tests always have at least one
/// variant.
pub fn bucket(participant_id: &str, test_name: &str, variants: usize) -> usize {
    assert!(variants > 0, "bucket requires at least one variant");
    let mut key = String::with_capacity(participant_id.len() + test_name.len());
    key.push_str(participant_id);
    key.push_str(test_name);
    stable_hash(&key).unsigned_abs() as usize % variants
}

/// Abramowitz & Stegun 26.2.17 approximation of the standard normal CDF
pub fn normal_cdf(x: f64) -> f64 {
    if x < -8.0 {
        return 0.0;
    }
    if x > 8.0 {
        return 1.0;
    }
    let t = 1.0 / (1.0 + 0.2316419 * x.abs());
    let d = 0.3989422804014327; // 1/sqrt(2*pi)
    let p = d
        * (-x * x / 2.0).exp()
        * (t * (0.3193815 + t * (-0.3565638 + t * (1.781478 + t * (-1.8212560 + t * 1.3302744)))));
    if x > 0.0 { 1.0 - p } else { p }
}

/// Pooled two-proportion z-test
///
/// `x` is the number of converted participants, `n` the number of
/// participants. Degenerate inputs (an empty arm, or a pooled rate of 0 or 1)
/// yield `z = 0, p = 1`.
pub fn two_proportion_z(
    x_control: usize,
    n_control: usize,
    x_treat: usize,
    n_treat: usize,
) -> ZTestResult {
    let no_difference = ZTestResult {
        z: 0.0,
        p_value: 1.0,
    };
    if n_control == 0 || n_treat == 0 {
        return no_difference;
    }

    let (x1, n1, x2, n2) = (
        x_control as f64,
        n_control as f64,
        x_treat as f64,
        n_treat as f64,
    );
    let pooled = (x1 + x2) / (n1 + n2);
    let se = (pooled * (1.0 - pooled) * (1.0 / n1 + 1.0 / n2)).sqrt();
    if se == 0.0 || !se.is_finite() {
        return no_difference;
    }

    let z = (x2 / n2 - x1 / n1) / se;
    let p_value = (2.0 * (1.0 - normal_cdf(z.abs()))).clamp(0.0, 1.0);
    ZTestResult { z, p_value }
}
