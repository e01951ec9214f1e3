// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use geox_core::{DEFAULT_VALUE_FLOOR, GeoxError};

/// Closed interval a parameter is drawn from uniformly.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct UniformRange {
    pub low: f64,
    pub high: f64,
}

impl UniformRange {
    pub const fn new(low: f64, high: f64) -> Self {
        Self { low, high }
    }

    pub fn contains(&self, value: f64) -> bool {
        value >= self.low && value <= self.high
    }

    fn validate(&self, name: &str) -> Result<(), GeoxError> {
        if !self.low.is_finite() || !self.high.is_finite() || self.low > self.high {
            return Err(GeoxError::invalid_input(format!(
                "ParameterRanges.{name} must be a finite range with low <= high; got [{}, {}]",
                self.low, self.high
            )));
        }
        Ok(())
    }
}

/// Sampling ranges for generation parameters left unspecified by the caller.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, PartialEq)]
pub struct ParameterRanges {
    pub baseline_mean: UniformRange,
    /// Fractional drift of the mean per day.
    pub trend_drift_per_day: UniformRange,
    pub seasonality_amplitude_fraction: UniformRange,
    pub noise_std_fraction: UniformRange,
    pub control_correlation: UniformRange,
    /// Minimum value of any generated observation.
    pub value_floor: f64,
}

impl Default for ParameterRanges {
    fn default() -> Self {
        Self {
            baseline_mean: UniformRange::new(500.0, 5000.0),
            trend_drift_per_day: UniformRange::new(-0.005, 0.005),
            seasonality_amplitude_fraction: UniformRange::new(0.10, 0.15),
            noise_std_fraction: UniformRange::new(0.05, 0.08),
            control_correlation: UniformRange::new(0.80, 0.90),
            value_floor: DEFAULT_VALUE_FLOOR,
        }
    }
}

impl ParameterRanges {
    pub fn validate(&self) -> Result<(), GeoxError> {
        self.baseline_mean.validate("baseline_mean")?;
        self.trend_drift_per_day.validate("trend_drift_per_day")?;
        self.seasonality_amplitude_fraction
            .validate("seasonality_amplitude_fraction")?;
        self.noise_std_fraction.validate("noise_std_fraction")?;
        self.control_correlation.validate("control_correlation")?;

        if self.baseline_mean.low <= 0.0 {
            return Err(GeoxError::invalid_input(format!(
                "ParameterRanges.baseline_mean must be > 0; got low={}",
                self.baseline_mean.low
            )));
        }
        if self.seasonality_amplitude_fraction.low < 0.0 || self.noise_std_fraction.low < 0.0 {
            return Err(GeoxError::invalid_input(
                "ParameterRanges seasonality and noise fractions must be >= 0",
            ));
        }
        if self.control_correlation.low < 0.0 || self.control_correlation.high > 1.0 {
            return Err(GeoxError::invalid_input(format!(
                "ParameterRanges.control_correlation must lie within [0, 1]; got [{}, {}]",
                self.control_correlation.low, self.control_correlation.high
            )));
        }
        if !self.value_floor.is_finite() || self.value_floor < 0.0 {
            return Err(GeoxError::invalid_input(format!(
                "ParameterRanges.value_floor must be finite and >= 0; got {}",
                self.value_floor
            )));
        }
        Ok(())
    }
}

/// Caller-pinned parameters; `None` fields are sampled from [`ParameterRanges`].
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, Default, PartialEq)]
pub struct GenerationOverrides {
    pub baseline_mean: Option<f64>,
    pub trend_drift_per_day: Option<f64>,
    pub seasonality_amplitude_fraction: Option<f64>,
    pub noise_std_fraction: Option<f64>,
    pub control_correlation: Option<f64>,
}

impl GenerationOverrides {
    pub(crate) fn validate(&self) -> Result<(), GeoxError> {
        if let Some(mean) = self.baseline_mean {
            if !mean.is_finite() || mean <= 0.0 {
                return Err(GeoxError::invalid_input(format!(
                    "baseline_mean must be finite and > 0; got {mean}"
                )));
            }
        }
        if let Some(drift) = self.trend_drift_per_day {
            if !drift.is_finite() {
                return Err(GeoxError::invalid_input(format!(
                    "trend_drift_per_day must be finite; got {drift}"
                )));
            }
        }
        for (name, value) in [
            (
                "seasonality_amplitude_fraction",
                self.seasonality_amplitude_fraction,
            ),
            ("noise_std_fraction", self.noise_std_fraction),
        ] {
            let Some(value) = value else {
                continue;
            };
            if !value.is_finite() || value < 0.0 {
                return Err(GeoxError::invalid_input(format!(
                    "{name} must be finite and >= 0; got {value}"
                )));
            }
        }
        if let Some(correlation) = self.control_correlation {
            validate_correlation(correlation)?;
        }
        Ok(())
    }
}

pub(crate) fn validate_correlation(correlation: f64) -> Result<(), GeoxError> {
    if !correlation.is_finite() || !(0.0..=1.0).contains(&correlation) {
        return Err(GeoxError::invalid_input(format!(
            "correlation must lie within [0, 1]; got {correlation}"
        )));
    }
    Ok(())
}

/// Parameters a baseline was actually generated with.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GenerationParameters {
    pub baseline_mean: f64,
    pub trend_drift_per_day: f64,
    pub seasonality_amplitude_fraction: f64,
    pub noise_std_fraction: f64,
    /// Mixing weight of the latent baseline in the control market.
    pub control_correlation: f64,
}

#[cfg(test)]
mod tests {
    use super::{GenerationOverrides, ParameterRanges, UniformRange};

    #[test]
    fn default_ranges_are_valid() {
        let ranges = ParameterRanges::default();
        ranges.validate().expect("default ranges should validate");
        assert_eq!(ranges.value_floor, 100.0);
        assert!(ranges.control_correlation.contains(0.85));
        assert!(!ranges.control_correlation.contains(0.95));
    }

    #[test]
    fn rejects_inverted_and_out_of_domain_ranges() {
        let inverted = ParameterRanges {
            noise_std_fraction: UniformRange::new(0.08, 0.05),
            ..ParameterRanges::default()
        };
        let err = inverted.validate().expect_err("inverted range must fail");
        assert!(err.to_string().contains("noise_std_fraction"));

        let correlation = ParameterRanges {
            control_correlation: UniformRange::new(0.5, 1.5),
            ..ParameterRanges::default()
        };
        let err = correlation.validate().expect_err("correlation > 1 must fail");
        assert!(err.to_string().contains("within [0, 1]"));

        let floor = ParameterRanges {
            value_floor: f64::NAN,
            ..ParameterRanges::default()
        };
        assert!(floor.validate().is_err());
    }

    #[test]
    fn overrides_validate_each_field() {
        GenerationOverrides::default()
            .validate()
            .expect("empty overrides are valid");

        let bad_mean = GenerationOverrides {
            baseline_mean: Some(0.0),
            ..GenerationOverrides::default()
        };
        assert!(
            bad_mean
                .validate()
                .expect_err("zero mean must fail")
                .to_string()
                .contains("baseline_mean")
        );

        let bad_noise = GenerationOverrides {
            noise_std_fraction: Some(-0.1),
            ..GenerationOverrides::default()
        };
        assert!(
            bad_noise
                .validate()
                .expect_err("negative noise must fail")
                .to_string()
                .contains("noise_std_fraction")
        );
    }
}
