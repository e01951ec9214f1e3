// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

//! Finite-subset reductions.
//!
//! Every aggregate in geox ignores non-finite entries (`NaN`, `±inf`) instead
//! of relying on a library's NaN-skipping defaults. Missing observations are
//! stored as `NaN`, so these helpers are also the "skip missing" reductions.

use crate::GeoxError;
use statrs::distribution::{ContinuousCDF, Normal};

/// Sum of the finite entries; `0.0` when there are none.
pub fn finite_sum(values: &[f64]) -> f64 {
    values.iter().copied().filter(|v| v.is_finite()).sum()
}

/// Number of finite entries.
pub fn finite_count(values: &[f64]) -> usize {
    values.iter().filter(|v| v.is_finite()).count()
}

/// Mean of the finite entries; `NaN` when there are none.
pub fn finite_mean(values: &[f64]) -> f64 {
    let count = finite_count(values);
    if count == 0 {
        return f64::NAN;
    }
    finite_sum(values) / count as f64
}

/// Standard deviation of the finite entries with `ddof` delta degrees of
/// freedom (`0` population, `1` sample).
///
/// Returns `NaN` when fewer than `ddof + 1` finite entries exist.
pub fn finite_std(values: &[f64], ddof: usize) -> f64 {
    let count = finite_count(values);
    if count <= ddof {
        return f64::NAN;
    }
    let mean = finite_mean(values);
    let sum_sq = values
        .iter()
        .copied()
        .filter(|v| v.is_finite())
        .map(|v| (v - mean).powi(2))
        .sum::<f64>();
    (sum_sq / (count - ddof) as f64).sqrt()
}

/// Pearson correlation over index-aligned entries.
///
/// Pairs where either side is non-finite are dropped. Returns `NaN` when
/// either side has zero variance or fewer than two pairs survive.
pub fn pearson(a: &[f64], b: &[f64]) -> Result<f64, GeoxError> {
    ensure_same_len(a, b, "pearson")?;

    let pairs = a
        .iter()
        .zip(b)
        .filter(|(x, y)| x.is_finite() && y.is_finite())
        .map(|(x, y)| (*x, *y))
        .collect::<Vec<_>>();
    if pairs.len() < 2 {
        return Ok(f64::NAN);
    }

    let n = pairs.len() as f64;
    let mean_a = pairs.iter().map(|(x, _)| x).sum::<f64>() / n;
    let mean_b = pairs.iter().map(|(_, y)| y).sum::<f64>() / n;

    let mut cov = 0.0;
    let mut var_a = 0.0;
    let mut var_b = 0.0;
    for (x, y) in &pairs {
        let dx = x - mean_a;
        let dy = y - mean_b;
        cov += dx * dy;
        var_a += dx * dx;
        var_b += dy * dy;
    }

    let denom = (var_a * var_b).sqrt();
    if denom == 0.0 || !denom.is_finite() {
        return Ok(f64::NAN);
    }
    Ok((cov / denom).clamp(-1.0, 1.0))
}

/// Quantile with linear interpolation between closest ranks over the finite
/// subset. `q` must lie in `[0, 1]`.
pub fn quantile(values: &[f64], q: f64) -> Result<f64, GeoxError> {
    if !q.is_finite() || !(0.0..=1.0).contains(&q) {
        return Err(GeoxError::invalid_input(format!(
            "quantile q must be within [0, 1]; got {q}"
        )));
    }

    let mut sorted = values
        .iter()
        .copied()
        .filter(|v| v.is_finite())
        .collect::<Vec<_>>();
    if sorted.is_empty() {
        return Ok(f64::NAN);
    }
    sorted.sort_by(f64::total_cmp);

    let position = q * (sorted.len() - 1) as f64;
    let lower = position.floor() as usize;
    let upper = position.ceil() as usize;
    let weight = position - lower as f64;
    Ok(sorted[lower] + (sorted[upper] - sorted[lower]) * weight)
}

/// Standard normal CDF, Φ(x).
pub fn standard_normal_cdf(x: f64) -> f64 {
    Normal::standard().cdf(x)
}

/// Standard normal quantile, Φ⁻¹(p), for `p` strictly inside `(0, 1)`.
pub fn standard_normal_quantile(p: f64) -> Result<f64, GeoxError> {
    if !p.is_finite() || p <= 0.0 || p >= 1.0 {
        return Err(GeoxError::invalid_input(format!(
            "normal quantile requires p in (0, 1); got {p}"
        )));
    }
    Ok(Normal::standard().inverse_cdf(p))
}

/// Two-sided normal tail probability, `2 * (1 - Φ(|z|))`.
pub fn two_sided_p_value(z: f64) -> f64 {
    if z.is_nan() {
        return f64::NAN;
    }
    // Φ(-|z|) avoids cancellation in 1 - Φ(|z|) for large |z|.
    (2.0 * standard_normal_cdf(-z.abs())).clamp(0.0, 1.0)
}

/// Fails when either slice is empty or the lengths differ.
pub fn ensure_same_len(a: &[f64], b: &[f64], what: &str) -> Result<(), GeoxError> {
    if a.is_empty() || b.is_empty() {
        return Err(GeoxError::invalid_input(format!(
            "{what} requires non-empty series; got len_a={}, len_b={}",
            a.len(),
            b.len()
        )));
    }
    if a.len() != b.len() {
        return Err(GeoxError::invalid_input(format!(
            "{what} requires equal-length series; got len_a={}, len_b={}",
            a.len(),
            b.len()
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{
        finite_count, finite_mean, finite_std, finite_sum, pearson, quantile,
        standard_normal_cdf, standard_normal_quantile, two_sided_p_value,
    };

    fn assert_approx_eq(actual: f64, expected: f64, tol: f64) {
        let delta = (actual - expected).abs();
        assert!(
            delta <= tol,
            "expected {expected}, got {actual} (delta={delta}, tol={tol})"
        );
    }

    #[test]
    fn reductions_skip_non_finite_entries() {
        let values = [1.0, f64::NAN, 3.0, f64::INFINITY, 5.0];
        assert_eq!(finite_count(&values), 3);
        assert_approx_eq(finite_sum(&values), 9.0, 1e-12);
        assert_approx_eq(finite_mean(&values), 3.0, 1e-12);
        assert_approx_eq(finite_std(&values, 0), (8.0_f64 / 3.0).sqrt(), 1e-12);
        assert_approx_eq(finite_std(&values, 1), 2.0, 1e-12);
    }

    #[test]
    fn reductions_over_all_missing_are_sentinels() {
        let values = [f64::NAN, f64::NAN];
        assert_eq!(finite_count(&values), 0);
        assert_eq!(finite_sum(&values), 0.0);
        assert!(finite_mean(&values).is_nan());
        assert!(finite_std(&values, 0).is_nan());
        assert!(finite_std(&[4.0], 1).is_nan());
    }

    #[test]
    fn pearson_matches_hand_computed_values() {
        let a = [1.0, 2.0, 3.0, 4.0];
        let b = [2.0, 4.0, 6.0, 8.0];
        assert_approx_eq(pearson(&a, &b).expect("pearson should compute"), 1.0, 1e-12);

        let reversed = [8.0, 6.0, 4.0, 2.0];
        assert_approx_eq(
            pearson(&a, &reversed).expect("pearson should compute"),
            -1.0,
            1e-12,
        );
    }

    #[test]
    fn pearson_of_flat_series_is_nan() {
        let a = [1.0, 2.0, 3.0];
        let flat = [5.0, 5.0, 5.0];
        assert!(pearson(&a, &flat).expect("flat input is not an error").is_nan());
    }

    #[test]
    fn pearson_rejects_mismatched_lengths() {
        let err = pearson(&[1.0, 2.0], &[1.0]).expect_err("length mismatch must fail");
        assert!(err.to_string().contains("equal-length"));
    }

    #[test]
    fn quantile_interpolates_between_ranks() {
        let values = [4.0, 1.0, 3.0, 2.0, f64::NAN];
        assert_approx_eq(quantile(&values, 0.0).expect("q0"), 1.0, 1e-12);
        assert_approx_eq(quantile(&values, 0.5).expect("median"), 2.5, 1e-12);
        assert_approx_eq(quantile(&values, 0.25).expect("q1"), 1.75, 1e-12);
        assert_approx_eq(quantile(&values, 1.0).expect("q4"), 4.0, 1e-12);
        assert!(quantile(&values, 1.5).is_err());
    }

    #[test]
    fn normal_helpers_match_reference_points() {
        assert_approx_eq(standard_normal_cdf(0.0), 0.5, 1e-12);
        assert_approx_eq(
            standard_normal_quantile(0.975).expect("valid p"),
            1.959_963_984_540_054,
            1e-9,
        );
        assert_approx_eq(two_sided_p_value(1.959_963_984_540_054), 0.05, 1e-9);
        assert_approx_eq(two_sided_p_value(0.0), 1.0, 1e-12);
        assert!(standard_normal_quantile(1.0).is_err());
        assert!(standard_normal_quantile(0.0).is_err());
    }

    #[test]
    fn p_value_is_symmetric_in_z() {
        assert_approx_eq(two_sided_p_value(-2.3), two_sided_p_value(2.3), 1e-15);
        assert!(two_sided_p_value(f64::NAN).is_nan());
        assert_approx_eq(two_sided_p_value(f64::INFINITY), 0.0, 1e-15);
    }
}
