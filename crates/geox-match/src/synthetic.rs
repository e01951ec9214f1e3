// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use crate::pool::CandidatePool;
use geox_core::{GeoxError, TimeSeries};
use nalgebra::{DMatrix, DVector};

/// Configuration for [`SyntheticControlBuilder`].
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, PartialEq)]
pub struct SyntheticControlConfig {
    /// Ridge penalty on the weight vector.
    pub alpha: f64,
}

impl Default for SyntheticControlConfig {
    fn default() -> Self {
        Self { alpha: 1.0 }
    }
}

impl SyntheticControlConfig {
    fn validate(&self) -> Result<(), GeoxError> {
        if !self.alpha.is_finite() || self.alpha < 0.0 {
            return Err(GeoxError::invalid_input(format!(
                "SyntheticControlConfig.alpha must be finite and >= 0; got {}",
                self.alpha
            )));
        }
        Ok(())
    }
}

/// Final normalized weight of one control market.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, PartialEq)]
pub struct ControlWeight {
    pub name: String,
    pub weight: f64,
}

/// Summary of a synthetic control fit.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, PartialEq)]
pub struct SyntheticControlFit {
    pub selected_control_names: Vec<String>,
    /// Non-negative, sums to 1, same order as `selected_control_names`.
    pub weights: Vec<ControlWeight>,
    /// Ridge coefficients before clipping and renormalization.
    pub raw_coefficients: Vec<f64>,
    pub rmse: f64,
    pub r_squared: f64,
    pub alpha: f64,
    /// True when every coefficient clipped to zero.
    pub used_uniform_fallback: bool,
}

impl SyntheticControlFit {
    pub fn weight_of(&self, name: &str) -> Option<f64> {
        self.weights
            .iter()
            .find(|entry| entry.name == name)
            .map(|entry| entry.weight)
    }

    pub fn weight_sum(&self) -> f64 {
        self.weights.iter().map(|entry| entry.weight).sum()
    }
}

/// Weighted combination of controls plus its fit summary.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, PartialEq)]
pub struct SyntheticControl {
    pub series: TimeSeries,
    pub fit: SyntheticControlFit,
}

/// Ridge-then-clip synthetic control estimator.
///
/// Solves `(X'X + alpha I) w = X'y` without intercept, clips negative
/// coefficients to zero, and renormalizes the rest to unit sum. The result
/// approximates a convex-combination fit and can differ from the exact
/// constrained optimum.
#[derive(Clone, Debug)]
pub struct SyntheticControlBuilder {
    config: SyntheticControlConfig,
}

impl SyntheticControlBuilder {
    pub fn new(config: SyntheticControlConfig) -> Result<Self, GeoxError> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &SyntheticControlConfig {
        &self.config
    }

    /// Fits `test` on the `selected` candidates, or on the whole pool in
    /// insertion order when `selected` is `None`.
    ///
    /// Rows where the test or any selected control is missing are left out of
    /// the solve and out of RMSE/R².
    pub fn build(
        &self,
        test: &TimeSeries,
        candidates: &CandidatePool,
        selected: Option<&[&str]>,
    ) -> Result<SyntheticControl, GeoxError> {
        let names = resolve_selection(candidates, selected)?;
        let columns = names
            .iter()
            .map(|name| {
                candidates.get(name).ok_or_else(|| {
                    GeoxError::invalid_input(format!("unknown control name '{name}'"))
                })
            })
            .collect::<Result<Vec<_>, GeoxError>>()?;
        for (name, column) in names.iter().zip(&columns) {
            if column.len() != test.len() {
                return Err(GeoxError::invalid_input(format!(
                    "candidate '{name}' has {} observations; test series has {}",
                    column.len(),
                    test.len()
                )));
            }
        }

        let n = test.len();
        let k = columns.len();
        let rows = (0..n)
            .filter(|&t| {
                test.values()[t].is_finite() && columns.iter().all(|c| c.values()[t].is_finite())
            })
            .collect::<Vec<_>>();
        if rows.is_empty() {
            return Err(GeoxError::invalid_input(
                "synthetic control needs at least one day where test and every control are observed",
            ));
        }

        let x = DMatrix::from_fn(rows.len(), k, |r, c| columns[c].values()[rows[r]]);
        let y = DVector::from_iterator(rows.len(), rows.iter().map(|&t| test.values()[t]));
        let raw = ridge_solve(&x, &y, self.config.alpha)?;

        let clipped = raw.iter().map(|w| w.max(0.0)).collect::<Vec<_>>();
        let total = clipped.iter().sum::<f64>();
        let used_uniform_fallback = !(total > 0.0 && total.is_finite());
        let normalized = if used_uniform_fallback {
            vec![1.0 / k as f64; k]
        } else {
            clipped.iter().map(|w| w / total).collect()
        };
        if used_uniform_fallback {
            tracing::warn!(
                controls = k,
                "all ridge coefficients clipped to zero; using uniform weights"
            );
        }

        let synthetic = (0..n)
            .map(|t| {
                columns
                    .iter()
                    .zip(&normalized)
                    .map(|(column, w)| w * column.values()[t])
                    .sum::<f64>()
            })
            .collect::<Vec<_>>();

        let (rmse, r_squared) = fit_scores(test.values(), &synthetic);
        tracing::debug!(controls = k, rmse, r_squared, alpha = self.config.alpha, "built synthetic control");

        let fit = SyntheticControlFit {
            weights: names
                .iter()
                .zip(&normalized)
                .map(|(name, weight)| ControlWeight {
                    name: name.clone(),
                    weight: *weight,
                })
                .collect(),
            selected_control_names: names,
            raw_coefficients: raw.iter().copied().collect(),
            rmse,
            r_squared,
            alpha: self.config.alpha,
            used_uniform_fallback,
        };
        Ok(SyntheticControl {
            series: TimeSeries::new(synthetic)?,
            fit,
        })
    }
}

/// One-shot form of [`SyntheticControlBuilder::build`].
pub fn build_synthetic_control(
    test: &TimeSeries,
    candidates: &CandidatePool,
    selected: Option<&[&str]>,
    alpha: f64,
) -> Result<SyntheticControl, GeoxError> {
    SyntheticControlBuilder::new(SyntheticControlConfig { alpha })?.build(test, candidates, selected)
}

fn resolve_selection(
    candidates: &CandidatePool,
    selected: Option<&[&str]>,
) -> Result<Vec<String>, GeoxError> {
    let names = match selected {
        Some(names) => names.iter().map(|name| (*name).to_string()).collect::<Vec<_>>(),
        None => candidates.names().map(str::to_string).collect(),
    };
    if names.is_empty() {
        return Err(GeoxError::invalid_input(
            "synthetic control requires at least one control market",
        ));
    }
    for (idx, name) in names.iter().enumerate() {
        if names[..idx].contains(name) {
            return Err(GeoxError::invalid_input(format!(
                "control '{name}' selected more than once"
            )));
        }
    }
    Ok(names)
}

fn ridge_solve(
    x: &DMatrix<f64>,
    y: &DVector<f64>,
    alpha: f64,
) -> Result<DVector<f64>, GeoxError> {
    let k = x.ncols();
    let xt = x.transpose();
    let gram = &xt * x + DMatrix::<f64>::identity(k, k) * alpha;
    let rhs = &xt * y;

    if let Some(chol) = gram.clone().cholesky() {
        return Ok(chol.solve(&rhs));
    }
    gram.lu().solve(&rhs).ok_or_else(|| {
        GeoxError::numerical_issue(format!(
            "ridge normal equations are singular (controls={k}, alpha={alpha})"
        ))
    })
}

fn fit_scores(test: &[f64], synthetic: &[f64]) -> (f64, f64) {
    let pairs = test
        .iter()
        .zip(synthetic)
        .filter(|(a, b)| a.is_finite() && b.is_finite())
        .map(|(a, b)| (*a, *b))
        .collect::<Vec<_>>();
    if pairs.is_empty() {
        return (f64::NAN, f64::NAN);
    }
    let n = pairs.len() as f64;
    let ss_res = pairs.iter().map(|(a, b)| (a - b).powi(2)).sum::<f64>();
    let mean = pairs.iter().map(|(a, _)| a).sum::<f64>() / n;
    let ss_tot = pairs.iter().map(|(a, _)| (a - mean).powi(2)).sum::<f64>();
    let r_squared = if ss_tot > 0.0 {
        1.0 - ss_res / ss_tot
    } else {
        f64::NAN
    };
    ((ss_res / n).sqrt(), r_squared)
}
