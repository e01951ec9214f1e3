// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use crate::confounder::{
    ALGORITHM_UPDATE_DROP, ConfounderEvent, ConfounderKind, SEASONALITY_SPIKE_FRACTION,
    TRACKING_BREAK_LOSS_PROBABILITY, start_range,
};
use crate::effect::{AppliedEffect, EffectSpec, MDE_JITTER, build_effect};
use crate::params::{
    GenerationOverrides, GenerationParameters, ParameterRanges, UniformRange,
    validate_correlation,
};
use geox_core::{GeoxError, MISSING, TimeSeries};
use rand::distributions::Distribution;
use rand::{Rng, SeedableRng};
use rand_pcg::Pcg64;
use statrs::distribution::Normal;
use std::f64::consts::TAU;

/// Upper bound on generated series length.
pub const MAX_SERIES_DAYS: usize = 10_000;

const WEEK_DAYS: f64 = 7.0;
const MIXING_NOISE_STD_FRACTION: f64 = 0.5;

/// Seeded generator of correlated synthetic market series.
///
/// Every draw advances one owned PCG stream, so output depends on the seed and
/// on the order of calls.
#[derive(Clone, Debug)]
pub struct SeriesGenerator {
    rng: Pcg64,
    seed: u64,
    ranges: ParameterRanges,
}

impl SeriesGenerator {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: Pcg64::seed_from_u64(seed),
            seed,
            ranges: ParameterRanges::default(),
        }
    }

    pub fn with_ranges(seed: u64, ranges: ParameterRanges) -> Result<Self, GeoxError> {
        ranges.validate()?;
        Ok(Self {
            rng: Pcg64::seed_from_u64(seed),
            seed,
            ranges,
        })
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn ranges(&self) -> &ParameterRanges {
        &self.ranges
    }

    /// Latent baseline: linear trend, weekly sine seasonality, Gaussian noise.
    ///
    /// Parameters missing from `overrides` are drawn in field order from the
    /// configured ranges. Day `t` (0-based) has weekday phase `t % 7`, which
    /// puts the seasonal trough on days 5 and 6.
    pub fn generate_baseline(
        &mut self,
        n_days: usize,
        overrides: &GenerationOverrides,
    ) -> Result<(TimeSeries, GenerationParameters), GeoxError> {
        check_days(n_days)?;
        overrides.validate()?;

        let ranges = self.ranges.clone();
        let params = GenerationParameters {
            baseline_mean: self.resolve(overrides.baseline_mean, ranges.baseline_mean),
            trend_drift_per_day: self
                .resolve(overrides.trend_drift_per_day, ranges.trend_drift_per_day),
            seasonality_amplitude_fraction: self.resolve(
                overrides.seasonality_amplitude_fraction,
                ranges.seasonality_amplitude_fraction,
            ),
            noise_std_fraction: self
                .resolve(overrides.noise_std_fraction, ranges.noise_std_fraction),
            control_correlation: self
                .resolve(overrides.control_correlation, ranges.control_correlation),
        };

        let mean = params.baseline_mean;
        let noise = self.gaussian(n_days, params.noise_std_fraction * mean)?;
        let values = noise
            .into_iter()
            .enumerate()
            .map(|(day, eps)| {
                let trend = mean + params.trend_drift_per_day * day as f64 * mean;
                let phase = TAU * (day % 7) as f64 / WEEK_DAYS;
                let seasonal = params.seasonality_amplitude_fraction * mean * phase.sin();
                trend + seasonal + eps
            })
            .collect::<Vec<_>>();

        tracing::debug!(
            seed = self.seed,
            n_days,
            baseline_mean = params.baseline_mean,
            trend_drift_per_day = params.trend_drift_per_day,
            seasonality = params.seasonality_amplitude_fraction,
            noise = params.noise_std_fraction,
            "generated baseline"
        );

        Ok((TimeSeries::floored(values, ranges.value_floor)?, params))
    }

    /// Control market: `c * baseline + (1 - c) * N(0, 0.5 * std(baseline))`.
    ///
    /// Returns the series and the correlation used.
    pub fn generate_control_market(
        &mut self,
        baseline: &TimeSeries,
        correlation: Option<f64>,
    ) -> Result<(TimeSeries, f64), GeoxError> {
        let correlation = self.resolve_correlation(correlation)?;
        let values = self.mix_with_noise(baseline, correlation)?;
        Ok((
            TimeSeries::floored(values, self.ranges.value_floor)?,
            correlation,
        ))
    }

    /// Treatment market: a control-style mix plus an injected effect.
    ///
    /// The applied MDE is the requested MDE times a fresh `U(0.8, 1.2)` draw.
    pub fn generate_treatment_market(
        &mut self,
        baseline: &TimeSeries,
        spec: &EffectSpec,
        correlation: Option<f64>,
    ) -> Result<(TimeSeries, AppliedEffect), GeoxError> {
        let correlation = self.resolve_correlation(correlation)?;
        let applied_mde_fraction =
            spec.requested_mde_fraction * self.rng.gen_range(MDE_JITTER.0..=MDE_JITTER.1);
        let mut values = self.mix_with_noise(baseline, correlation)?;
        let (effect, magnitude) = build_effect(baseline.values(), spec, applied_mde_fraction)?;
        for (value, lift) in values.iter_mut().zip(&effect) {
            *value += lift;
        }

        tracing::debug!(
            seed = self.seed,
            shape = spec.shape.as_str(),
            requested = spec.requested_mde_fraction,
            applied = applied_mde_fraction,
            magnitude,
            "injected treatment effect"
        );

        let applied = AppliedEffect {
            intervention_day: spec.intervention_day,
            requested_mde_fraction: spec.requested_mde_fraction,
            applied_mde_fraction,
            shape: spec.shape,
            magnitude,
            correlation,
            effect,
        };
        Ok((TimeSeries::floored(values, self.ranges.value_floor)?, applied))
    }

    /// Applies one confounder to a copy of `series`.
    ///
    /// The start day is drawn uniformly from `[intervention_day, len - window)`
    /// so the affected window always lies inside the series.
    pub fn apply_confounder(
        &mut self,
        series: &TimeSeries,
        kind: ConfounderKind,
        intervention_day: usize,
    ) -> Result<(TimeSeries, ConfounderEvent), GeoxError> {
        let starts = start_range(kind, series.len(), intervention_day)?;
        let start_day = self.rng.gen_range(starts);
        let window = start_day..start_day + kind.window_days();
        let mut values = series.values().to_vec();

        let event = match kind {
            ConfounderKind::AlgorithmUpdate => {
                let drop_fraction = self
                    .rng
                    .gen_range(ALGORITHM_UPDATE_DROP.0..=ALGORITHM_UPDATE_DROP.1);
                for value in &mut values[window] {
                    *value *= 1.0 - drop_fraction;
                }
                ConfounderEvent::AlgorithmUpdate {
                    start_day,
                    drop_fraction,
                }
            }
            ConfounderKind::SeasonalitySpike => {
                for value in &mut values[window] {
                    *value *= 1.0 + SEASONALITY_SPIKE_FRACTION;
                }
                ConfounderEvent::SeasonalitySpike {
                    start_day,
                    spike_fraction: SEASONALITY_SPIKE_FRACTION,
                }
            }
            ConfounderKind::TrackingBreak => {
                let mut lost_days = Vec::new();
                for day in window {
                    if self.rng.gen_bool(TRACKING_BREAK_LOSS_PROBABILITY) {
                        values[day] = MISSING;
                        lost_days.push(day);
                    }
                }
                ConfounderEvent::TrackingBreak {
                    start_day,
                    loss_probability: TRACKING_BREAK_LOSS_PROBABILITY,
                    lost_days,
                }
            }
        };

        tracing::debug!(seed = self.seed, confounder = kind.as_str(), start_day, "applied confounder");
        Ok((TimeSeries::new(values)?, event))
    }

    /// Random confounder plan: with probability `probability` one uniformly
    /// chosen kind, otherwise none.
    pub fn sample_confounders(
        &mut self,
        probability: f64,
    ) -> Result<Vec<ConfounderKind>, GeoxError> {
        if !(0.0..=1.0).contains(&probability) {
            return Err(GeoxError::invalid_input(format!(
                "confounder probability must lie within [0, 1]; got {probability}"
            )));
        }
        if !self.rng.gen_bool(probability) {
            return Ok(vec![]);
        }
        let idx = self.rng.gen_range(0..ConfounderKind::ALL.len());
        Ok(vec![ConfounderKind::ALL[idx]])
    }

    fn resolve(&mut self, pinned: Option<f64>, range: UniformRange) -> f64 {
        match pinned {
            Some(value) => value,
            None => self.rng.gen_range(range.low..=range.high),
        }
    }

    fn resolve_correlation(&mut self, pinned: Option<f64>) -> Result<f64, GeoxError> {
        if let Some(correlation) = pinned {
            validate_correlation(correlation)?;
        }
        let range = self.ranges.control_correlation;
        Ok(self.resolve(pinned, range))
    }

    fn mix_with_noise(
        &mut self,
        baseline: &TimeSeries,
        correlation: f64,
    ) -> Result<Vec<f64>, GeoxError> {
        check_days(baseline.len())?;
        let spread = baseline.population_std();
        let std = if spread.is_finite() {
            MIXING_NOISE_STD_FRACTION * spread
        } else {
            0.0
        };
        let noise = self.gaussian(baseline.len(), std)?;
        Ok(baseline
            .values()
            .iter()
            .zip(noise)
            .map(|(value, eps)| correlation * value + (1.0 - correlation) * eps)
            .collect())
    }

    fn gaussian(&mut self, n: usize, std: f64) -> Result<Vec<f64>, GeoxError> {
        if std == 0.0 {
            return Ok(vec![0.0; n]);
        }
        let normal = Normal::new(0.0, std).map_err(|err| {
            GeoxError::numerical_issue(format!("cannot build N(0, {std}) noise: {err}"))
        })?;
        Ok((0..n).map(|_| normal.sample(&mut self.rng)).collect())
    }
}

fn check_days(n_days: usize) -> Result<(), GeoxError> {
    if n_days == 0 {
        return Err(GeoxError::invalid_input("n_days must be >= 1; got 0"));
    }
    if n_days > MAX_SERIES_DAYS {
        return Err(GeoxError::resource_limit(format!(
            "n_days={n_days} exceeds MAX_SERIES_DAYS={MAX_SERIES_DAYS}"
        )));
    }
    Ok(())
}
