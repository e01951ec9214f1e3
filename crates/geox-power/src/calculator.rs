// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use crate::noncentral_t::noncentral_t_cdf;
use geox_core::GeoxError;
use geox_core::stats::standard_normal_quantile;

pub const DEFAULT_MIN_DAYS: usize = 7;
pub const DEFAULT_MAX_DAYS: usize = 90;

/// Operational bounds on experiment duration.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PowerConfig {
    /// No test shorter than this, whatever the statistics say.
    pub min_days: usize,
    /// No test longer than this, whatever the statistics say.
    pub max_days: usize,
}

impl Default for PowerConfig {
    fn default() -> Self {
        Self {
            min_days: DEFAULT_MIN_DAYS,
            max_days: DEFAULT_MAX_DAYS,
        }
    }
}

impl PowerConfig {
    fn validate(&self) -> Result<(), GeoxError> {
        if self.min_days == 0 || self.min_days > self.max_days {
            return Err(GeoxError::invalid_input(format!(
                "PowerConfig requires 1 <= min_days <= max_days; got min_days={}, max_days={}",
                self.min_days, self.max_days
            )));
        }
        Ok(())
    }
}

/// Forward direction: days needed to detect the MDE.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, PartialEq)]
pub struct RequiredDuration {
    /// Ceiled and clamped to the configured bounds.
    pub required_days: usize,
    /// Raw `2 (z_a + z_b)^2 sigma^2 / delta^2` before rounding.
    pub unclamped_days: f64,
    pub baseline_mean: f64,
    pub baseline_std: f64,
    pub mde_fraction: f64,
    pub alpha: f64,
    pub power: f64,
    pub z_alpha: f64,
    pub z_beta: f64,
    pub delta_absolute: f64,
}

impl RequiredDuration {
    pub fn was_clamped(&self) -> bool {
        (self.required_days as f64) != self.unclamped_days.ceil()
    }
}

/// Inverse direction: power reached by a fixed duration.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, PartialEq)]
pub struct AchievedPower {
    /// Clipped to `[0, 1]`.
    pub achieved_power: f64,
    pub duration_days: usize,
    pub baseline_mean: f64,
    pub baseline_std: f64,
    pub mde_fraction: f64,
    pub alpha: f64,
    pub z_alpha: f64,
    pub ncp: f64,
    pub degrees_of_freedom: f64,
}

/// Sample-size calculator for a two-sample mean comparison.
#[derive(Clone, Debug, Default)]
pub struct PowerCalculator {
    config: PowerConfig,
}

impl PowerCalculator {
    pub fn new(config: PowerConfig) -> Result<Self, GeoxError> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &PowerConfig {
        &self.config
    }

    /// `n = 2 (z_{1-alpha/2} + z_power)^2 sigma^2 / (mean * mde)^2`, rounded up
    /// and clamped to `[min_days, max_days]`.
    pub fn calculate_required_duration(
        &self,
        baseline_mean: f64,
        baseline_std: f64,
        mde_fraction: f64,
        alpha: f64,
        power: f64,
    ) -> Result<RequiredDuration, GeoxError> {
        validate_baseline(baseline_mean, baseline_std, mde_fraction)?;
        validate_probability("alpha", alpha)?;
        validate_probability("power", power)?;

        let z_alpha = standard_normal_quantile(1.0 - alpha / 2.0)?;
        let z_beta = standard_normal_quantile(power)?;
        let delta_absolute = baseline_mean * mde_fraction;
        let unclamped_days =
            2.0 * (z_alpha + z_beta).powi(2) * baseline_std.powi(2) / delta_absolute.powi(2);
        if !unclamped_days.is_finite() {
            return Err(GeoxError::numerical_issue(format!(
                "required duration is non-finite (delta={delta_absolute}, sigma={baseline_std})"
            )));
        }

        let ceiled = unclamped_days.ceil();
        let required_days = if ceiled <= self.config.min_days as f64 {
            self.config.min_days
        } else if ceiled >= self.config.max_days as f64 {
            self.config.max_days
        } else {
            ceiled as usize
        };
        if (required_days as f64) != ceiled {
            tracing::warn!(
                unclamped_days,
                required_days,
                min_days = self.config.min_days,
                max_days = self.config.max_days,
                "required duration clamped to policy bounds"
            );
        }

        Ok(RequiredDuration {
            required_days,
            unclamped_days,
            baseline_mean,
            baseline_std,
            mde_fraction,
            alpha,
            power,
            z_alpha,
            z_beta,
            delta_absolute,
        })
    }

    /// `1 - F_t(z_{1-alpha/2}; df = 2d - 2, ncp = (delta / sigma) sqrt(d / 2))`.
    pub fn calculate_achieved_power(
        &self,
        baseline_mean: f64,
        baseline_std: f64,
        mde_fraction: f64,
        duration_days: usize,
        alpha: f64,
    ) -> Result<AchievedPower, GeoxError> {
        validate_baseline(baseline_mean, baseline_std, mde_fraction)?;
        validate_probability("alpha", alpha)?;
        if duration_days < 2 {
            return Err(GeoxError::invalid_input(format!(
                "duration_days must be >= 2 for a positive t-test df; got {duration_days}"
            )));
        }

        let z_alpha = standard_normal_quantile(1.0 - alpha / 2.0)?;
        let days = duration_days as f64;
        let ncp = (baseline_mean * mde_fraction / baseline_std) * (days / 2.0).sqrt();
        let degrees_of_freedom = 2.0 * days - 2.0;
        let achieved_power =
            (1.0 - noncentral_t_cdf(z_alpha, degrees_of_freedom, ncp)?).clamp(0.0, 1.0);

        Ok(AchievedPower {
            achieved_power,
            duration_days,
            baseline_mean,
            baseline_std,
            mde_fraction,
            alpha,
            z_alpha,
            ncp,
            degrees_of_freedom,
        })
    }
}

fn validate_baseline(mean: f64, std: f64, mde_fraction: f64) -> Result<(), GeoxError> {
    if !mean.is_finite() || mean <= 0.0 {
        return Err(GeoxError::invalid_input(format!(
            "baseline_mean must be finite and > 0; got {mean}"
        )));
    }
    if !std.is_finite() || std <= 0.0 {
        return Err(GeoxError::invalid_input(format!(
            "baseline_std must be finite and > 0; got {std}"
        )));
    }
    if !mde_fraction.is_finite() || mde_fraction <= 0.0 {
        return Err(GeoxError::invalid_input(format!(
            "mde_fraction must be finite and > 0; got {mde_fraction}"
        )));
    }
    Ok(())
}

fn validate_probability(name: &str, value: f64) -> Result<(), GeoxError> {
    if !value.is_finite() || value <= 0.0 || value >= 1.0 {
        return Err(GeoxError::invalid_input(format!(
            "{name} must lie strictly within (0, 1); got {value}"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{PowerCalculator, PowerConfig};

    fn assert_approx_eq(actual: f64, expected: f64, tol: f64) {
        let delta = (actual - expected).abs();
        assert!(
            delta <= tol,
            "expected {expected}, got {actual} (delta={delta}, tol={tol})"
        );
    }

    #[test]
    fn required_duration_matches_closed_form() {
        let calculator = PowerCalculator::default();
        let result = calculator
            .calculate_required_duration(1000.0, 100.0, 0.05, 0.05, 0.80)
            .expect("valid inputs");
        assert_approx_eq(result.z_alpha, 1.959_963_984_540_054, 1e-9);
        assert_approx_eq(result.z_beta, 0.841_621_233_572_914, 1e-9);
        assert_approx_eq(result.delta_absolute, 50.0, 1e-12);
        assert_approx_eq(result.unclamped_days, 62.791_1, 1e-3);
        assert_eq!(result.required_days, 63);
        assert!(!result.was_clamped());
    }

    #[test]
    fn required_duration_is_clamped_to_policy_bounds() {
        let calculator = PowerCalculator::default();
        let short = calculator
            .calculate_required_duration(1000.0, 10.0, 0.20, 0.05, 0.80)
            .expect("valid inputs");
        assert_eq!(short.required_days, 7);
        assert!(short.was_clamped());

        let long = calculator
            .calculate_required_duration(1000.0, 500.0, 0.01, 0.05, 0.80)
            .expect("valid inputs");
        assert_eq!(long.required_days, 90);
        assert!(long.was_clamped());

        let custom = PowerCalculator::new(PowerConfig {
            min_days: 14,
            max_days: 28,
        })
        .expect("valid config");
        let result = custom
            .calculate_required_duration(1000.0, 10.0, 0.20, 0.05, 0.80)
            .expect("valid inputs");
        assert_eq!(result.required_days, 14);
    }

    #[test]
    fn achieved_power_at_required_days_meets_target() {
        let calculator = PowerCalculator::default();
        let required = calculator
            .calculate_required_duration(1000.0, 100.0, 0.05, 0.05, 0.80)
            .expect("valid inputs");
        let achieved = calculator
            .calculate_achieved_power(1000.0, 100.0, 0.05, required.required_days, 0.05)
            .expect("valid inputs");
        assert!(achieved.achieved_power >= 0.79, "power={}", achieved.achieved_power);
        assert_approx_eq(achieved.ncp, 0.5 * (63.0_f64 / 2.0).sqrt(), 1e-12);
        assert_eq!(achieved.degrees_of_freedom, 124.0);
    }

    #[test]
    fn huge_effects_saturate_power() {
        let calculator = PowerCalculator::default();
        let achieved = calculator
            .calculate_achieved_power(1000.0, 10.0, 0.5, 30, 0.05)
            .expect("valid inputs");
        assert_eq!(achieved.achieved_power, 1.0);
    }

    #[test]
    fn rejects_out_of_range_parameters() {
        let calculator = PowerCalculator::default();
        let err = calculator
            .calculate_required_duration(1000.0, 100.0, 0.05, 1.0, 0.8)
            .expect_err("alpha=1 must fail");
        assert!(err.to_string().contains("alpha must lie strictly within (0, 1)"));

        let err = calculator
            .calculate_required_duration(1000.0, 100.0, 0.05, 0.05, 0.0)
            .expect_err("power=0 must fail");
        assert!(err.to_string().contains("power"));

        let err = calculator
            .calculate_required_duration(1000.0, 0.0, 0.05, 0.05, 0.8)
            .expect_err("zero std must fail");
        assert!(err.to_string().contains("baseline_std"));

        let err = calculator
            .calculate_achieved_power(1000.0, 100.0, 0.05, 1, 0.05)
            .expect_err("one day must fail");
        assert!(err.to_string().contains("duration_days must be >= 2"));

        let err = PowerCalculator::new(PowerConfig {
            min_days: 30,
            max_days: 7,
        })
        .expect_err("inverted bounds must fail");
        assert!(err.to_string().contains("min_days <= max_days"));
    }
}
