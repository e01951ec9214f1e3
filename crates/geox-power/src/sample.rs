// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use geox_core::GeoxError;
use geox_core::stats::{finite_count, finite_mean, finite_std};

/// Pre-period summary feeding the power calculator.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SampleCharacteristics {
    pub baseline_mean: f64,
    /// Sample standard deviation (n - 1 denominator).
    pub baseline_std: f64,
    /// `baseline_std / baseline_mean`; `NaN` when the mean is zero.
    pub baseline_cv: f64,
    pub n_observations: usize,
}

/// Mean, sample std, and coefficient of variation over the observed days.
pub fn estimate_sample_characteristics(series: &[f64]) -> Result<SampleCharacteristics, GeoxError> {
    let n_observations = finite_count(series);
    if n_observations < 2 {
        return Err(GeoxError::invalid_input(format!(
            "sample characteristics need >= 2 observed values; got {n_observations}"
        )));
    }

    let baseline_mean = finite_mean(series);
    let baseline_std = finite_std(series, 1);
    let baseline_cv = if baseline_mean == 0.0 {
        f64::NAN
    } else {
        baseline_std / baseline_mean
    };

    Ok(SampleCharacteristics {
        baseline_mean,
        baseline_std,
        baseline_cv,
        n_observations,
    })
}

#[cfg(test)]
mod tests {
    use super::estimate_sample_characteristics;

    #[test]
    fn uses_sample_standard_deviation() {
        let stats = estimate_sample_characteristics(&[2.0, 4.0, 6.0, f64::NAN]).expect("valid");
        assert_eq!(stats.baseline_mean, 4.0);
        assert_eq!(stats.baseline_std, 2.0);
        assert_eq!(stats.baseline_cv, 0.5);
        assert_eq!(stats.n_observations, 3);
    }

    #[test]
    fn zero_mean_gives_nan_cv() {
        let stats = estimate_sample_characteristics(&[-1.0, 1.0]).expect("valid");
        assert!(stats.baseline_cv.is_nan());
    }

    #[test]
    fn needs_two_observations() {
        let err = estimate_sample_characteristics(&[5.0, f64::NAN]).expect_err("must fail");
        assert!(err.to_string().contains("need >= 2 observed values"));
    }
}
