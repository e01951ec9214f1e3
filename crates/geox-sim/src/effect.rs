// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use geox_core::GeoxError;
use geox_core::stats::finite_mean;
use std::fmt;
use std::str::FromStr;

/// Days a ramp effect takes to reach full magnitude.
pub const RAMP_DAYS: usize = 14;

/// Days a delayed step waits after the intervention.
pub const DELAY_DAYS: usize = 7;

/// Multiplicative jitter bounds applied to the requested MDE at injection.
pub const MDE_JITTER: (f64, f64) = (0.80, 1.20);

/// Time profile of an injected treatment effect.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum EffectShape {
    #[default]
    Step,
    Ramp,
    DelayedStep,
}

impl EffectShape {
    pub const ALL: [Self; 3] = [Self::Step, Self::Ramp, Self::DelayedStep];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Step => "step",
            Self::Ramp => "ramp",
            Self::DelayedStep => "delayed_step",
        }
    }
}

impl fmt::Display for EffectShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EffectShape {
    type Err = GeoxError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|shape| shape.as_str() == raw)
            .ok_or_else(|| {
                GeoxError::invalid_input(format!(
                    "unknown effect shape '{raw}'; expected one of step, ramp, delayed_step"
                ))
            })
    }
}

/// Requested treatment effect.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct EffectSpec {
    /// 0-based index of the first treated day.
    pub intervention_day: usize,
    /// Effect size as a fraction of the post-period baseline mean.
    pub requested_mde_fraction: f64,
    pub shape: EffectShape,
}

impl EffectSpec {
    pub fn new(
        intervention_day: usize,
        requested_mde_fraction: f64,
        shape: EffectShape,
    ) -> Result<Self, GeoxError> {
        if !requested_mde_fraction.is_finite() {
            return Err(GeoxError::invalid_input(format!(
                "requested_mde_fraction must be finite; got {requested_mde_fraction}"
            )));
        }
        Ok(Self {
            intervention_day,
            requested_mde_fraction,
            shape,
        })
    }
}

/// Effect actually injected into a treatment series.
///
/// `applied_mde_fraction` is a fresh jittered draw made at injection time; two
/// injections of the same [`EffectSpec`] generally differ.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, PartialEq)]
pub struct AppliedEffect {
    pub intervention_day: usize,
    pub requested_mde_fraction: f64,
    pub applied_mde_fraction: f64,
    pub shape: EffectShape,
    /// Full step size in absolute units.
    pub magnitude: f64,
    /// Mixing weight of the latent baseline in the treatment market.
    pub correlation: f64,
    /// Additive per-day effect, zero before the intervention.
    pub effect: Vec<f64>,
}

/// Builds the additive effect array for `baseline`.
///
/// The full magnitude is `applied_mde_fraction` times the baseline mean from
/// `spec.intervention_day` to the end. Returns the array and that magnitude.
/// An intervention at or past the end of the series leaves no post-period:
/// the array is all zeros and the magnitude is zero.
pub fn build_effect(
    baseline: &[f64],
    spec: &EffectSpec,
    applied_mde_fraction: f64,
) -> Result<(Vec<f64>, f64), GeoxError> {
    let n = baseline.len();
    let start = spec.intervention_day;
    if start >= n {
        tracing::debug!(intervention_day = start, n, "intervention after series end; no effect");
        return Ok((vec![0.0; n], 0.0));
    }

    let magnitude = applied_mde_fraction * finite_mean(&baseline[start..]);
    if !magnitude.is_finite() {
        return Err(GeoxError::numerical_issue(format!(
            "effect magnitude is non-finite (applied_mde_fraction={applied_mde_fraction})"
        )));
    }

    let mut effect = vec![0.0; n];
    match spec.shape {
        EffectShape::Step => effect[start..].fill(magnitude),
        EffectShape::Ramp => {
            for (offset, slot) in effect[start..].iter_mut().enumerate() {
                *slot = if offset < RAMP_DAYS {
                    magnitude * offset as f64 / RAMP_DAYS as f64
                } else {
                    magnitude
                };
            }
        }
        EffectShape::DelayedStep => {
            let from = start.saturating_add(DELAY_DAYS).min(n);
            effect[from..].fill(magnitude);
        }
    }

    Ok((effect, magnitude))
}
