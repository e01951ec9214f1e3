// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use crate::counterfactual::{CounterfactualInput, CounterfactualModel};
use geox_core::GeoxError;
use geox_core::stats::{finite_count, finite_mean, finite_std, finite_sum, two_sided_p_value};
use std::fmt;

/// Causal effect of the intervention over the post-period.
///
/// Aggregates use the finite subset of the pointwise effects.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, PartialEq)]
pub struct EffectEstimate {
    /// `actual - predicted`, one entry per post-period day.
    pub pointwise: Vec<f64>,
    pub cumulative: f64,
    pub average: f64,
    /// Cumulative effect as a percentage of the summed post-period actuals.
    pub percent: f64,
    pub standard_error: f64,
    pub z: f64,
    pub p_value: f64,
    pub n_finite: usize,
}

impl EffectEstimate {
    /// Estimates the effect from aligned post-period actuals and predictions.
    ///
    /// Fails on misaligned input or when no day has both values observed.
    pub fn compute(actual: &[f64], predicted: &[f64]) -> Result<Self, GeoxError> {
        if actual.len() != predicted.len() {
            return Err(GeoxError::invalid_input(format!(
                "actual has {} post-period days; prediction has {}",
                actual.len(),
                predicted.len()
            )));
        }
        let pointwise = actual
            .iter()
            .zip(predicted)
            .map(|(a, p)| a - p)
            .collect::<Vec<_>>();
        let n_finite = finite_count(&pointwise);
        if n_finite == 0 {
            return Err(GeoxError::invalid_input(
                "no post-period day has both an actual and a finite prediction",
            ));
        }

        let cumulative = finite_sum(&pointwise);
        let average = finite_mean(&pointwise);
        let actual_total = finite_sum(actual);
        let percent = if actual_total == 0.0 {
            0.0
        } else {
            cumulative / actual_total * 100.0
        };
        let standard_error = finite_std(&pointwise, 0) / (n_finite as f64).sqrt();
        let z = if standard_error > 0.0 && standard_error.is_finite() {
            cumulative / standard_error
        } else {
            0.0
        };

        Ok(Self {
            pointwise,
            cumulative,
            average,
            percent,
            standard_error,
            z,
            p_value: two_sided_p_value(z),
            n_finite,
        })
    }

    /// All-`NaN` estimate reported when no effect can be computed.
    pub fn undefined(pointwise: Vec<f64>) -> Self {
        Self {
            pointwise,
            cumulative: f64::NAN,
            average: f64::NAN,
            percent: f64::NAN,
            standard_error: f64::NAN,
            z: f64::NAN,
            p_value: f64::NAN,
            n_finite: 0,
        }
    }

    pub fn is_defined(&self) -> bool {
        self.percent.is_finite() && self.p_value.is_finite()
    }
}

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Recommendation {
    Ship,
    Continue,
    DontShip,
    /// The counterfactual could not be computed; not a verdict.
    Error,
}

impl Recommendation {
    pub fn label(self) -> &'static str {
        match self {
            Self::Ship => "Ship",
            Self::Continue => "Continue",
            Self::DontShip => "Don't Ship",
            Self::Error => "Error",
        }
    }
}

impl fmt::Display for Recommendation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Which decision branch fired.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DecisionReason {
    SignificantHarm,
    StrongWin,
    LikelyWin,
    InsufficientEvidence,
    DegenerateCounterfactual,
    CollaboratorFailure,
}

impl DecisionReason {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::SignificantHarm => "significant_harm",
            Self::StrongWin => "strong_win",
            Self::LikelyWin => "likely_win",
            Self::InsufficientEvidence => "insufficient_evidence",
            Self::DegenerateCounterfactual => "degenerate_counterfactual",
            Self::CollaboratorFailure => "collaborator_failure",
        }
    }
}

impl fmt::Display for DecisionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Thresholds of the ordered decision branches.
///
/// Branches are evaluated harm, ship, continue, then the default; the first
/// match wins.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, PartialEq)]
pub struct DecisionPolicy {
    /// Effects below this percentage can trigger the harm branch.
    pub harm_max_effect_pct: f64,
    pub harm_max_p_value: f64,
    pub ship_min_effect_pct: f64,
    pub ship_max_p_value: f64,
    pub continue_min_effect_pct: f64,
    pub continue_max_p_value: f64,
}

impl Default for DecisionPolicy {
    fn default() -> Self {
        Self {
            harm_max_effect_pct: 0.0,
            harm_max_p_value: 0.10,
            ship_min_effect_pct: 5.0,
            ship_max_p_value: 0.05,
            continue_min_effect_pct: 2.0,
            continue_max_p_value: 0.10,
        }
    }
}

impl DecisionPolicy {
    fn validate(&self) -> Result<(), GeoxError> {
        for (name, value) in [
            ("harm_max_p_value", self.harm_max_p_value),
            ("ship_max_p_value", self.ship_max_p_value),
            ("continue_max_p_value", self.continue_max_p_value),
        ] {
            if !value.is_finite() || value <= 0.0 || value > 1.0 {
                return Err(GeoxError::invalid_input(format!(
                    "DecisionPolicy.{name} must lie within (0, 1]; got {value}"
                )));
            }
        }
        for (name, value) in [
            ("harm_max_effect_pct", self.harm_max_effect_pct),
            ("ship_min_effect_pct", self.ship_min_effect_pct),
            ("continue_min_effect_pct", self.continue_min_effect_pct),
        ] {
            if !value.is_finite() {
                return Err(GeoxError::invalid_input(format!(
                    "DecisionPolicy.{name} must be finite; got {value}"
                )));
            }
        }
        Ok(())
    }

    /// Maps an effect percentage and p-value onto a branch.
    pub fn decide(&self, percent: f64, p_value: f64) -> (Recommendation, DecisionReason) {
        if percent < self.harm_max_effect_pct && p_value < self.harm_max_p_value {
            (Recommendation::DontShip, DecisionReason::SignificantHarm)
        } else if percent > self.ship_min_effect_pct && p_value < self.ship_max_p_value {
            (Recommendation::Ship, DecisionReason::StrongWin)
        } else if percent > self.continue_min_effect_pct && p_value < self.continue_max_p_value {
            (Recommendation::Continue, DecisionReason::LikelyWin)
        } else {
            (Recommendation::DontShip, DecisionReason::InsufficientEvidence)
        }
    }
}

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, PartialEq)]
pub struct DecisionResult {
    pub recommendation: Recommendation,
    pub reason: DecisionReason,
    pub estimate: EffectEstimate,
    pub explanation: String,
}

/// Turns post-period actuals and a counterfactual into a recommendation.
///
/// Never returns an error for data problems: a malformed counterfactual
/// yields `DontShip`, a failed collaborator yields `Error`.
#[derive(Clone, Debug, Default)]
pub struct DecisionEngine {
    policy: DecisionPolicy,
}

impl DecisionEngine {
    pub fn new(policy: DecisionPolicy) -> Result<Self, GeoxError> {
        policy.validate()?;
        Ok(Self { policy })
    }

    pub fn policy(&self) -> &DecisionPolicy {
        &self.policy
    }

    pub fn analyze(&self, actual: &[f64], predicted: &[f64]) -> DecisionResult {
        let estimate = match EffectEstimate::compute(actual, predicted) {
            Ok(estimate) => estimate,
            Err(err) => {
                tracing::warn!(error = %err, "degenerate counterfactual; defaulting to don't ship");
                let pointwise = if actual.len() == predicted.len() {
                    actual.iter().zip(predicted).map(|(a, p)| a - p).collect()
                } else {
                    vec![]
                };
                return DecisionResult {
                    recommendation: Recommendation::DontShip,
                    reason: DecisionReason::DegenerateCounterfactual,
                    estimate: EffectEstimate::undefined(pointwise),
                    explanation: format!("Effect could not be estimated ({err})."),
                };
            }
        };

        let (recommendation, reason) = self.policy.decide(estimate.percent, estimate.p_value);
        let explanation = self.explain(reason, &estimate);
        tracing::debug!(
            percent = estimate.percent,
            z = estimate.z,
            p_value = estimate.p_value,
            reason = reason.as_str(),
            "decision reached"
        );
        DecisionResult {
            recommendation,
            reason,
            estimate,
            explanation,
        }
    }

    /// Fits `model`, slices its predictions to the post-period, and decides.
    pub fn analyze_with_model(
        &self,
        model: &dyn CounterfactualModel,
        input: &CounterfactualInput,
    ) -> DecisionResult {
        let post = input.periods().post_range();
        let actual = &input.outcome().values()[post.clone()];

        let predictions = match model.fit_predict(input) {
            Ok(predictions) => predictions,
            Err(err) => {
                tracing::warn!(model = model.name(), error = %err, "counterfactual model failed");
                return DecisionResult {
                    recommendation: Recommendation::Error,
                    reason: DecisionReason::CollaboratorFailure,
                    estimate: EffectEstimate::undefined(vec![]),
                    explanation: format!("Counterfactual model '{}' failed: {err}", model.name()),
                };
            }
        };
        if predictions.len() != input.len() {
            tracing::warn!(
                model = model.name(),
                expected = input.len(),
                got = predictions.len(),
                "counterfactual has the wrong length"
            );
            return DecisionResult {
                recommendation: Recommendation::DontShip,
                reason: DecisionReason::DegenerateCounterfactual,
                estimate: EffectEstimate::undefined(vec![]),
                explanation: format!(
                    "Counterfactual model '{}' returned {} predictions for {} days.",
                    model.name(),
                    predictions.len(),
                    input.len()
                ),
            };
        }
        self.analyze(actual, &predictions[post])
    }

    fn explain(&self, reason: DecisionReason, estimate: &EffectEstimate) -> String {
        let stats = format!("{:+.1}% (p={:.3})", estimate.percent, estimate.p_value);
        match reason {
            DecisionReason::SignificantHarm => {
                format!("Significant negative effect {stats}. Do not roll out.")
            }
            DecisionReason::StrongWin => format!(
                "Effect {stats} exceeds {:.0}% at p<{:.2}. Roll out.",
                self.policy.ship_min_effect_pct, self.policy.ship_max_p_value
            ),
            DecisionReason::LikelyWin => format!(
                "Promising effect {stats} but below the ship bar. Extend the test."
            ),
            DecisionReason::InsufficientEvidence => {
                format!("Effect {stats} is too small or too uncertain to act on.")
            }
            DecisionReason::DegenerateCounterfactual | DecisionReason::CollaboratorFailure => {
                format!("No usable effect estimate {stats}.")
            }
        }
    }
}
