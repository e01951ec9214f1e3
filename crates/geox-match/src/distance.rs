// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use geox_core::GeoxError;
use geox_core::stats::{ensure_same_len, pearson};

/// `sqrt(sum((a_i - b_i)^2))` over aligned pairs.
///
/// Unequal or empty inputs are rejected rather than truncated. Any missing
/// value on either side makes the distance `NaN`.
pub fn euclidean_distance(a: &[f64], b: &[f64]) -> Result<f64, GeoxError> {
    ensure_same_len(a, b, "euclidean_distance")?;
    if a.iter().chain(b).any(|value| !value.is_finite()) {
        return Ok(f64::NAN);
    }
    let sum_sq = a.iter().zip(b).map(|(x, y)| (x - y).powi(2)).sum::<f64>();
    Ok(sum_sq.sqrt())
}

/// Pearson correlation; `NaN` when either side is flat.
pub fn correlation(a: &[f64], b: &[f64]) -> Result<f64, GeoxError> {
    pearson(a, b)
}

#[cfg(test)]
mod tests {
    use super::{correlation, euclidean_distance};

    #[test]
    fn distance_matches_hand_computed_value() {
        let d = euclidean_distance(&[0.0, 0.0, 1.0], &[3.0, 4.0, 1.0]).expect("equal lengths");
        assert!((d - 5.0).abs() < 1e-12);
    }

    #[test]
    fn missing_values_make_distance_undefined() {
        let d = euclidean_distance(&[1.0, f64::NAN, 4.0], &[1.0, 2.0, 8.0])
            .expect("equal lengths");
        assert!(d.is_nan());
        let d = euclidean_distance(&[1.0, 2.0], &[f64::NAN, f64::NAN]).expect("equal lengths");
        assert!(d.is_nan());
    }

    #[test]
    fn mismatched_lengths_are_typed_errors() {
        let err = euclidean_distance(&[1.0, 2.0], &[1.0]).expect_err("must fail");
        assert!(err.to_string().contains("euclidean_distance requires equal-length"));
        let err = correlation(&[], &[]).expect_err("must fail");
        assert!(err.to_string().contains("non-empty"));
    }

    #[test]
    fn scaled_copy_is_perfectly_correlated_but_distant() {
        let a = [1.0, 3.0, 2.0, 5.0];
        let b = a.map(|v| v * 10.0);
        assert!((correlation(&a, &b).expect("equal lengths") - 1.0).abs() < 1e-12);
        assert!(euclidean_distance(&a, &b).expect("equal lengths") > 40.0);
    }
}
