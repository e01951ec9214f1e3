// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use crate::runner::{RunOutcome, RunResult};
use geox_core::GeoxError;
use geox_core::stats::{finite_mean, finite_std, quantile};
use serde::Serialize;

/// Minimum effect, in percent, for a run to count as a winner.
pub const WINNER_MIN_EFFECT_PCT: f64 = 2.0;
/// A winning run's p-value must be below this.
pub const WINNER_MAX_P_VALUE: f64 = 0.10;

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct EffectDistribution {
    pub min: f64,
    pub q1: f64,
    pub median: f64,
    pub q3: f64,
    pub max: f64,
    pub mean: f64,
    /// Sample standard deviation; `NaN` with a single run.
    pub std: f64,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct SignificanceBuckets {
    /// `p < 0.05`
    pub significant: usize,
    /// `0.05 <= p < 0.10`
    pub marginal: usize,
    /// `p >= 0.10`
    pub not_significant: usize,
    /// Failed runs and runs without a defined p-value.
    pub errors: usize,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct BatchSummary {
    pub total: usize,
    pub completed: usize,
    pub failed: usize,
    pub winners: usize,
    /// Winners as a percentage of all runs.
    pub win_rate_pct: f64,
    /// Mean effect percentage over completed runs; `NaN` when none.
    pub mean_effect_pct: f64,
    /// `None` when no run produced a finite effect.
    pub effect_distribution: Option<EffectDistribution>,
    pub significance: SignificanceBuckets,
}

impl BatchSummary {
    pub fn from_results(results: &[RunResult]) -> Result<Self, GeoxError> {
        let mut effects = Vec::with_capacity(results.len());
        let mut significance = SignificanceBuckets::default();
        let mut winners = 0;
        let mut completed = 0;

        for result in results {
            let RunOutcome::Completed { decision, .. } = &result.outcome else {
                significance.errors += 1;
                continue;
            };
            completed += 1;
            let estimate = &decision.estimate;
            effects.push(estimate.percent);

            let p = estimate.p_value;
            if !p.is_finite() {
                significance.errors += 1;
            } else if p < 0.05 {
                significance.significant += 1;
            } else if p < 0.10 {
                significance.marginal += 1;
            } else {
                significance.not_significant += 1;
            }
            if estimate.percent > WINNER_MIN_EFFECT_PCT && p < WINNER_MAX_P_VALUE {
                winners += 1;
            }
        }

        let total = results.len();
        let effect_distribution = if effects.iter().any(|e| e.is_finite()) {
            Some(EffectDistribution {
                min: quantile(&effects, 0.0)?,
                q1: quantile(&effects, 0.25)?,
                median: quantile(&effects, 0.5)?,
                q3: quantile(&effects, 0.75)?,
                max: quantile(&effects, 1.0)?,
                mean: finite_mean(&effects),
                std: finite_std(&effects, 1),
            })
        } else {
            None
        };

        Ok(Self {
            total,
            completed,
            failed: total - completed,
            winners,
            win_rate_pct: if total == 0 {
                0.0
            } else {
                winners as f64 / total as f64 * 100.0
            },
            mean_effect_pct: finite_mean(&effects),
            effect_distribution,
            significance,
        })
    }
}
