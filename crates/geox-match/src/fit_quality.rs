// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use geox_core::GeoxError;
use geox_core::stats::{ensure_same_len, finite_mean, pearson};

/// Pre-period tracking quality of a synthetic control.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PreFitQuality {
    pub rmse: f64,
    pub mae: f64,
    pub correlation: f64,
    /// RMSE as a percentage of the test mean; `NaN` when that mean is zero.
    pub rmse_pct: f64,
}

/// Scores how closely `synthetic` tracks `test` over index pairs where both
/// are observed. Pure; repeated calls give identical results.
pub fn evaluate_pre_period_fit(test: &[f64], synthetic: &[f64]) -> Result<PreFitQuality, GeoxError> {
    ensure_same_len(test, synthetic, "evaluate_pre_period_fit")?;

    let residuals = test
        .iter()
        .zip(synthetic)
        .filter(|(a, b)| a.is_finite() && b.is_finite())
        .map(|(a, b)| a - b)
        .collect::<Vec<_>>();
    if residuals.is_empty() {
        return Ok(PreFitQuality {
            rmse: f64::NAN,
            mae: f64::NAN,
            correlation: f64::NAN,
            rmse_pct: f64::NAN,
        });
    }

    let n = residuals.len() as f64;
    let rmse = (residuals.iter().map(|r| r * r).sum::<f64>() / n).sqrt();
    let mae = residuals.iter().map(|r| r.abs()).sum::<f64>() / n;
    let test_mean = finite_mean(test);
    let rmse_pct = if test_mean == 0.0 || !test_mean.is_finite() {
        f64::NAN
    } else {
        rmse / test_mean * 100.0
    };

    Ok(PreFitQuality {
        rmse,
        mae,
        correlation: pearson(test, synthetic)?,
        rmse_pct,
    })
}
