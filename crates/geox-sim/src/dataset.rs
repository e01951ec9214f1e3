// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use crate::confounder::{ConfounderEvent, ConfounderKind};
use crate::effect::{AppliedEffect, EffectShape, EffectSpec};
use crate::generator::SeriesGenerator;
use crate::params::{GenerationOverrides, GenerationParameters};
use chrono::{Days, NaiveDate};
use geox_core::{GeoxError, Period, RunDiagnostics, TimeSeries};
use std::ops::Range;

pub const DEFAULT_PRE_PERIOD_DAYS: usize = 90;
pub const DEFAULT_POST_PERIOD_DAYS: usize = 42;
pub const DEFAULT_MDE_FRACTION: f64 = 0.08;

/// First calendar date of generated datasets unless overridden.
pub fn default_start_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 10, 1).unwrap_or_default()
}

/// Everything needed to simulate one test/control experiment.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, PartialEq)]
pub struct ExperimentRequest {
    pub test_market: String,
    pub control_market: String,
    pub pre_period_days: usize,
    pub post_period_days: usize,
    pub mde_fraction: f64,
    pub shape: EffectShape,
    /// Applied in order; later events see earlier modifications.
    pub confounders: Vec<ConfounderKind>,
    pub overrides: GenerationOverrides,
    /// Treatment mixing weight; sampled when `None`.
    pub treatment_correlation: Option<f64>,
    pub start_date: NaiveDate,
}

impl ExperimentRequest {
    pub fn new(test_market: impl Into<String>, control_market: impl Into<String>) -> Self {
        Self {
            test_market: test_market.into(),
            control_market: control_market.into(),
            pre_period_days: DEFAULT_PRE_PERIOD_DAYS,
            post_period_days: DEFAULT_POST_PERIOD_DAYS,
            mde_fraction: DEFAULT_MDE_FRACTION,
            shape: EffectShape::Step,
            confounders: vec![],
            overrides: GenerationOverrides::default(),
            treatment_correlation: None,
            start_date: default_start_date(),
        }
    }

    pub fn total_days(&self) -> usize {
        self.pre_period_days.saturating_add(self.post_period_days)
    }

    fn validate(&self) -> Result<(), GeoxError> {
        if self.test_market.trim().is_empty() || self.control_market.trim().is_empty() {
            return Err(GeoxError::invalid_input(
                "ExperimentRequest market names must be non-blank",
            ));
        }
        if self.test_market == self.control_market {
            return Err(GeoxError::invalid_input(format!(
                "ExperimentRequest test and control markets must differ; got '{}' twice",
                self.test_market
            )));
        }
        if self.pre_period_days == 0 || self.post_period_days == 0 {
            return Err(GeoxError::invalid_input(format!(
                "ExperimentRequest pre/post periods must be >= 1 day; got pre={}, post={}",
                self.pre_period_days, self.post_period_days
            )));
        }
        Ok(())
    }
}

/// One calendar day of an experiment.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, PartialEq)]
pub struct DailyObservation {
    pub date: NaiveDate,
    pub test_value: f64,
    pub control_value: f64,
    pub period: Period,
    /// 1-based day number.
    pub day_num: usize,
}

/// Generated test/control pair with its ground truth.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, PartialEq)]
pub struct ExperimentDataset {
    pub test_market: String,
    pub control_market: String,
    pub pre_period_days: usize,
    pub post_period_days: usize,
    pub start_date: NaiveDate,
    pub test: TimeSeries,
    pub control: TimeSeries,
    /// Unobservable latent signal both markets were mixed from.
    pub latent_baseline: TimeSeries,
    pub parameters: GenerationParameters,
    pub effect: AppliedEffect,
    pub confounders: Vec<ConfounderEvent>,
    pub diagnostics: RunDiagnostics,
}

impl ExperimentDataset {
    pub fn len(&self) -> usize {
        self.test.len()
    }

    pub fn is_empty(&self) -> bool {
        self.test.is_empty()
    }

    /// 0-based index range of the pre-period.
    pub fn pre_range(&self) -> Range<usize> {
        0..self.pre_period_days
    }

    /// 0-based index range of the post-period.
    pub fn post_range(&self) -> Range<usize> {
        self.pre_period_days..self.len()
    }

    pub fn period_of(&self, idx: usize) -> Period {
        if idx < self.pre_period_days {
            Period::Pre
        } else {
            Period::Post
        }
    }

    /// Dated rows with period tags and sequential day numbers.
    pub fn rows(&self) -> Result<Vec<DailyObservation>, GeoxError> {
        self.test
            .values()
            .iter()
            .zip(self.control.values())
            .enumerate()
            .map(|(idx, (test_value, control_value))| {
                let date = self
                    .start_date
                    .checked_add_days(Days::new(idx as u64))
                    .ok_or_else(|| {
                        GeoxError::invalid_input(format!(
                            "date overflow at day {} from {}",
                            idx + 1,
                            self.start_date
                        ))
                    })?;
                Ok(DailyObservation {
                    date,
                    test_value: *test_value,
                    control_value: *control_value,
                    period: self.period_of(idx),
                    day_num: idx + 1,
                })
            })
            .collect()
    }
}

impl SeriesGenerator {
    /// Builds a full experiment: baseline, control, treatment with effect,
    /// then each requested confounder on the treatment series in order.
    pub fn generate_experiment_data(
        &mut self,
        request: &ExperimentRequest,
    ) -> Result<ExperimentDataset, GeoxError> {
        request.validate()?;
        let total_days = request.total_days();
        let intervention_day = request.pre_period_days;

        let (baseline, parameters) = self.generate_baseline(total_days, &request.overrides)?;
        let (control, _) =
            self.generate_control_market(&baseline, Some(parameters.control_correlation))?;
        let spec = EffectSpec::new(intervention_day, request.mde_fraction, request.shape)?;
        let (mut test, effect) =
            self.generate_treatment_market(&baseline, &spec, request.treatment_correlation)?;

        let mut confounders = Vec::with_capacity(request.confounders.len());
        for kind in &request.confounders {
            let (modified, event) = self.apply_confounder(&test, *kind, intervention_day)?;
            test = modified;
            confounders.push(event);
        }

        let mut diagnostics = RunDiagnostics::with_seed(self.seed());
        diagnostics.note(format!(
            "pre={}d post={}d shape={} mde_applied={:.4}",
            request.pre_period_days,
            request.post_period_days,
            effect.shape,
            effect.applied_mde_fraction
        ));
        if test.n_missing() > 0 {
            diagnostics.warn(format!(
                "{} test observations lost to tracking breaks",
                test.n_missing()
            ));
        }

        tracing::debug!(
            seed = self.seed(),
            test_market = request.test_market.as_str(),
            control_market = request.control_market.as_str(),
            total_days,
            confounders = confounders.len(),
            "generated experiment dataset"
        );

        Ok(ExperimentDataset {
            test_market: request.test_market.clone(),
            control_market: request.control_market.clone(),
            pre_period_days: request.pre_period_days,
            post_period_days: request.post_period_days,
            start_date: request.start_date,
            test,
            control,
            latent_baseline: baseline,
            parameters,
            effect,
            confounders,
            diagnostics,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::{ExperimentRequest, default_start_date};
    use crate::confounder::ConfounderKind;
    use crate::effect::EffectShape;
    use crate::generator::SeriesGenerator;
    use chrono::NaiveDate;
    use geox_core::Period;

    #[test]
    fn default_request_matches_reference_design() {
        let request = ExperimentRequest::new("Austin, TX", "Denver, CO");
        assert_eq!(request.pre_period_days, 90);
        assert_eq!(request.post_period_days, 42);
        assert_eq!(request.mde_fraction, 0.08);
        assert_eq!(request.shape, EffectShape::Step);
        assert_eq!(request.total_days(), 132);
        assert_eq!(
            request.start_date,
            NaiveDate::from_ymd_opt(2024, 10, 1).expect("valid date")
        );
        assert_eq!(default_start_date(), request.start_date);
    }

    #[test]
    fn rows_are_dated_and_tagged() {
        let mut generator = SeriesGenerator::new(42);
        let request = ExperimentRequest {
            pre_period_days: 10,
            post_period_days: 5,
            ..ExperimentRequest::new("Austin, TX", "Denver, CO")
        };
        let dataset = generator
            .generate_experiment_data(&request)
            .expect("dataset generates");
        let rows = dataset.rows().expect("rows build");
        assert_eq!(rows.len(), 15);
        assert_eq!(rows[0].day_num, 1);
        assert_eq!(rows[0].period, Period::Pre);
        assert_eq!(rows[9].period, Period::Pre);
        assert_eq!(rows[10].period, Period::Post);
        assert_eq!(rows[14].day_num, 15);
        assert_eq!(
            rows[14].date,
            NaiveDate::from_ymd_opt(2024, 10, 15).expect("valid date")
        );
        assert_eq!(dataset.post_range(), 10..15);
        assert_eq!(dataset.diagnostics.seed, Some(42));
    }

    #[test]
    fn confounders_apply_in_order_within_post_period() {
        let mut generator = SeriesGenerator::new(7);
        let request = ExperimentRequest {
            confounders: vec![
                ConfounderKind::AlgorithmUpdate,
                ConfounderKind::SeasonalitySpike,
                ConfounderKind::TrackingBreak,
            ],
            ..ExperimentRequest::new("Austin, TX", "Denver, CO")
        };
        let dataset = generator
            .generate_experiment_data(&request)
            .expect("dataset generates");
        assert_eq!(dataset.confounders.len(), 3);
        for (event, kind) in dataset.confounders.iter().zip(&request.confounders) {
            assert_eq!(event.kind(), *kind);
            assert!(event.window().start >= 90);
            assert!(event.window().end <= 132);
        }
        assert_eq!(dataset.control.n_missing(), 0);
    }

    #[test]
    fn rejects_same_market_and_empty_periods() {
        let mut generator = SeriesGenerator::new(1);
        let err = generator
            .generate_experiment_data(&ExperimentRequest::new("Austin, TX", "Austin, TX"))
            .expect_err("same market must fail");
        assert!(err.to_string().contains("must differ"));

        let request = ExperimentRequest {
            post_period_days: 0,
            ..ExperimentRequest::new("Austin, TX", "Denver, CO")
        };
        let err = generator
            .generate_experiment_data(&request)
            .expect_err("empty post period must fail");
        assert!(err.to_string().contains("pre/post periods must be >= 1 day"));
    }

    #[test]
    fn confounder_without_room_is_rejected() {
        let mut generator = SeriesGenerator::new(1);
        let request = ExperimentRequest {
            post_period_days: 5,
            confounders: vec![ConfounderKind::AlgorithmUpdate],
            ..ExperimentRequest::new("Austin, TX", "Denver, CO")
        };
        let err = generator
            .generate_experiment_data(&request)
            .expect_err("seven-day confounder cannot fit in five days");
        assert!(err.to_string().contains("algorithm_update"));
    }
}
