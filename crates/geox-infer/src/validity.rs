// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

//! Traffic-light diagnostics on whether an experiment readout can be trusted.

use geox_core::GeoxError;
use geox_core::stats::{ensure_same_len, finite_mean, finite_std, pearson};
use std::fmt;

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CheckStatus {
    Green,
    Yellow,
    Red,
    NotAvailable,
}

impl CheckStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Green => "green",
            Self::Yellow => "yellow",
            Self::Red => "red",
            Self::NotAvailable => "n/a",
        }
    }
}

impl fmt::Display for CheckStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, PartialEq)]
pub struct ValidityThresholds {
    pub similarity_green: f64,
    pub similarity_yellow: f64,
    /// Absolute z-score above which a post-period difference is an outlier.
    pub outlier_z: f64,
    /// Outlier counts up to this are yellow; above it red.
    pub outliers_yellow_max: usize,
    pub rmse_pct_green: f64,
    pub rmse_pct_yellow: f64,
}

impl Default for ValidityThresholds {
    fn default() -> Self {
        Self {
            similarity_green: 0.85,
            similarity_yellow: 0.70,
            outlier_z: 3.0,
            outliers_yellow_max: 2,
            rmse_pct_green: 10.0,
            rmse_pct_yellow: 15.0,
        }
    }
}

impl ValidityThresholds {
    fn validate(&self) -> Result<(), GeoxError> {
        if !(self.similarity_yellow.is_finite()
            && self.similarity_green.is_finite()
            && self.similarity_yellow <= self.similarity_green)
        {
            return Err(GeoxError::invalid_input(format!(
                "ValidityThresholds requires similarity_yellow <= similarity_green; got {} and {}",
                self.similarity_yellow, self.similarity_green
            )));
        }
        if !self.outlier_z.is_finite() || self.outlier_z <= 0.0 {
            return Err(GeoxError::invalid_input(format!(
                "ValidityThresholds.outlier_z must be finite and > 0; got {}",
                self.outlier_z
            )));
        }
        if !(self.rmse_pct_green.is_finite()
            && self.rmse_pct_yellow.is_finite()
            && self.rmse_pct_green <= self.rmse_pct_yellow)
        {
            return Err(GeoxError::invalid_input(format!(
                "ValidityThresholds requires rmse_pct_green <= rmse_pct_yellow; got {} and {}",
                self.rmse_pct_green, self.rmse_pct_yellow
            )));
        }
        Ok(())
    }
}

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, PartialEq)]
pub struct ValidityReport {
    /// Pre-period Pearson correlation of test and control.
    pub similarity: f64,
    pub similarity_status: CheckStatus,
    pub outliers: usize,
    pub outlier_status: CheckStatus,
    /// `None` when no synthetic-control fit was supplied.
    pub rmse_pct: Option<f64>,
    pub fit_status: CheckStatus,
    pub all_checks_pass: bool,
}

#[derive(Clone, Debug, Default)]
pub struct ValidityChecker {
    thresholds: ValidityThresholds,
}

impl ValidityChecker {
    pub fn new(thresholds: ValidityThresholds) -> Result<Self, GeoxError> {
        thresholds.validate()?;
        Ok(Self { thresholds })
    }

    pub fn thresholds(&self) -> &ValidityThresholds {
        &self.thresholds
    }

    /// Checks aligned `test`/`control` series split at `pre_days`.
    ///
    /// `fit_rmse` is the pre-period RMSE of a synthetic control, when one was
    /// built; `control` should then be that synthetic series.
    pub fn check(
        &self,
        test: &[f64],
        control: &[f64],
        pre_days: usize,
        fit_rmse: Option<f64>,
    ) -> Result<ValidityReport, GeoxError> {
        ensure_same_len(test, control, "validity check")?;
        if pre_days == 0 || pre_days >= test.len() {
            return Err(GeoxError::invalid_input(format!(
                "validity check requires 1 <= pre_days < len; got pre_days={pre_days}, len={}",
                test.len()
            )));
        }
        let t = &self.thresholds;

        let similarity = pearson(&test[..pre_days], &control[..pre_days])?;
        let similarity_status = if similarity >= t.similarity_green {
            CheckStatus::Green
        } else if similarity >= t.similarity_yellow {
            CheckStatus::Yellow
        } else {
            CheckStatus::Red
        };

        let outliers = count_outliers(&test[pre_days..], &control[pre_days..], t.outlier_z);
        let outlier_status = if outliers == 0 {
            CheckStatus::Green
        } else if outliers <= t.outliers_yellow_max {
            CheckStatus::Yellow
        } else {
            CheckStatus::Red
        };

        let pre_mean = finite_mean(&test[..pre_days]);
        let rmse_pct = fit_rmse
            .filter(|_| pre_mean.is_finite() && pre_mean != 0.0)
            .map(|rmse| rmse / pre_mean * 100.0);
        let fit_status = match rmse_pct {
            Some(pct) if pct < t.rmse_pct_green => CheckStatus::Green,
            Some(pct) if pct < t.rmse_pct_yellow => CheckStatus::Yellow,
            Some(_) => CheckStatus::Red,
            None => CheckStatus::NotAvailable,
        };

        let all_checks_pass = (similarity >= t.similarity_green
            && outliers <= t.outliers_yellow_max)
            || fit_status == CheckStatus::Green;

        Ok(ValidityReport {
            similarity,
            similarity_status,
            outliers,
            outlier_status,
            rmse_pct,
            fit_status,
            all_checks_pass,
        })
    }
}

/// Post-period differences whose population z-score exceeds `limit` in
/// absolute value. Flat differences have no outliers.
fn count_outliers(test: &[f64], control: &[f64], limit: f64) -> usize {
    let differences = test
        .iter()
        .zip(control)
        .map(|(a, b)| a - b)
        .collect::<Vec<_>>();
    let mean = finite_mean(&differences);
    let std = finite_std(&differences, 0);
    if !(std > 0.0 && std.is_finite()) {
        return 0;
    }
    differences
        .iter()
        .filter(|d| d.is_finite() && ((*d - mean) / std).abs() > limit)
        .count()
}
