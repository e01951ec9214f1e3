// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use geox_core::stats::finite_mean;
use geox_core::{GeoxError, TimeSeries};
use nalgebra::{DMatrix, DVector};
use std::ops::Range;

/// Pre- and post-period bounds on a 0-based day index, both inclusive.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PeriodRanges {
    pub pre: (usize, usize),
    pub post: (usize, usize),
}

impl PeriodRanges {
    /// `pre = [0, pre_days - 1]`, `post = [pre_days, len - 1]`.
    pub fn split(pre_days: usize, len: usize) -> Result<Self, GeoxError> {
        if pre_days == 0 || pre_days >= len {
            return Err(GeoxError::invalid_input(format!(
                "period split requires 1 <= pre_days < len; got pre_days={pre_days}, len={len}"
            )));
        }
        Ok(Self {
            pre: (0, pre_days - 1),
            post: (pre_days, len - 1),
        })
    }

    pub fn pre_range(&self) -> Range<usize> {
        self.pre.0..self.pre.1 + 1
    }

    pub fn post_range(&self) -> Range<usize> {
        self.post.0..self.post.1 + 1
    }

    pub fn validate(&self, len: usize) -> Result<(), GeoxError> {
        if self.pre.0 > self.pre.1 || self.post.0 > self.post.1 {
            return Err(GeoxError::invalid_input(format!(
                "period ranges must satisfy start <= end; got pre={:?}, post={:?}",
                self.pre, self.post
            )));
        }
        if self.pre.1 >= self.post.0 {
            return Err(GeoxError::invalid_input(format!(
                "pre period must end before the post period starts; got pre={:?}, post={:?}",
                self.pre, self.post
            )));
        }
        if self.post.1 >= len {
            return Err(GeoxError::invalid_input(format!(
                "post period end {} is out of bounds for {len} observations",
                self.post.1
            )));
        }
        Ok(())
    }
}

/// Aligned outcome/covariate table handed to a [`CounterfactualModel`].
#[derive(Clone, Debug, PartialEq)]
pub struct CounterfactualInput {
    outcome: TimeSeries,
    covariates: Vec<TimeSeries>,
    periods: PeriodRanges,
}

impl CounterfactualInput {
    pub fn new(
        outcome: TimeSeries,
        covariates: Vec<TimeSeries>,
        periods: PeriodRanges,
    ) -> Result<Self, GeoxError> {
        for (idx, covariate) in covariates.iter().enumerate() {
            if covariate.len() != outcome.len() {
                return Err(GeoxError::invalid_input(format!(
                    "covariate {idx} has {} observations; outcome has {}",
                    covariate.len(),
                    outcome.len()
                )));
            }
        }
        periods.validate(outcome.len())?;
        Ok(Self {
            outcome,
            covariates,
            periods,
        })
    }

    pub fn outcome(&self) -> &TimeSeries {
        &self.outcome
    }

    pub fn covariates(&self) -> &[TimeSeries] {
        &self.covariates
    }

    pub fn periods(&self) -> PeriodRanges {
        self.periods
    }

    pub fn len(&self) -> usize {
        self.outcome.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outcome.is_empty()
    }
}

/// Fits on the pre-period and predicts the untreated outcome for every day.
///
/// Implementations must return one prediction per input row, aligned by
/// index. Anything else is treated as a malformed counterfactual.
pub trait CounterfactualModel: Send + Sync {
    fn name(&self) -> &str;

    fn fit_predict(&self, input: &CounterfactualInput) -> Result<Vec<f64>, GeoxError>;
}

/// Pre-period outcome mean held flat over the whole index.
#[derive(Clone, Copy, Debug, Default)]
pub struct FlatMeanPredictor;

impl CounterfactualModel for FlatMeanPredictor {
    fn name(&self) -> &str {
        "flat_mean"
    }

    fn fit_predict(&self, input: &CounterfactualInput) -> Result<Vec<f64>, GeoxError> {
        let pre = &input.outcome.values()[input.periods.pre_range()];
        let level = finite_mean(pre);
        if !level.is_finite() {
            return Err(GeoxError::collaborator(
                "flat_mean: pre-period outcome has no observed values",
            ));
        }
        Ok(vec![level; input.len()])
    }
}

/// Least squares of the outcome on the covariates plus an intercept, fitted
/// over pre-period days where every column is observed.
///
/// Days with a missing covariate predict `NaN`.
#[derive(Clone, Copy, Debug, Default)]
pub struct RegressionPredictor;

impl CounterfactualModel for RegressionPredictor {
    fn name(&self) -> &str {
        "regression"
    }

    fn fit_predict(&self, input: &CounterfactualInput) -> Result<Vec<f64>, GeoxError> {
        let outcome = input.outcome.values();
        let columns = input
            .covariates
            .iter()
            .map(TimeSeries::values)
            .collect::<Vec<_>>();
        let k = columns.len() + 1;

        let rows = input
            .periods
            .pre_range()
            .filter(|&t| outcome[t].is_finite() && columns.iter().all(|c| c[t].is_finite()))
            .collect::<Vec<_>>();
        if rows.len() < k {
            return Err(GeoxError::collaborator(format!(
                "regression: {} usable pre-period rows for {k} parameters",
                rows.len()
            )));
        }

        let x = DMatrix::from_fn(rows.len(), k, |r, c| {
            if c == 0 { 1.0 } else { columns[c - 1][rows[r]] }
        });
        let y = DVector::from_iterator(rows.len(), rows.iter().map(|&t| outcome[t]));
        let beta = least_squares(&x, &y)?;
        tracing::debug!(
            covariates = columns.len(),
            rows = rows.len(),
            intercept = beta[0],
            "fitted regression counterfactual"
        );

        Ok((0..input.len())
            .map(|t| {
                columns
                    .iter()
                    .enumerate()
                    .fold(beta[0], |acc, (j, column)| acc + beta[j + 1] * column[t])
            })
            .collect())
    }
}

fn least_squares(x: &DMatrix<f64>, y: &DVector<f64>) -> Result<DVector<f64>, GeoxError> {
    let xt = x.transpose();
    let gram = &xt * x;
    let rhs = &xt * y;
    if let Some(chol) = gram.clone().cholesky() {
        return Ok(chol.solve(&rhs));
    }
    gram.lu().solve(&rhs).ok_or_else(|| {
        GeoxError::numerical_issue(format!(
            "regression normal equations are singular ({} parameters)",
            x.ncols()
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::{
        CounterfactualInput, CounterfactualModel, FlatMeanPredictor, PeriodRanges,
        RegressionPredictor,
    };
    use geox_core::TimeSeries;

    fn series(values: Vec<f64>) -> TimeSeries {
        TimeSeries::new(values).expect("valid series")
    }

    #[test]
    fn split_produces_adjacent_inclusive_ranges() {
        let periods = PeriodRanges::split(90, 132).expect("valid split");
        assert_eq!(periods.pre, (0, 89));
        assert_eq!(periods.post, (90, 131));
        assert_eq!(periods.pre_range(), 0..90);
        assert_eq!(periods.post_range(), 90..132);
        assert!(PeriodRanges::split(0, 10).is_err());
        assert!(PeriodRanges::split(10, 10).is_err());
    }

    #[test]
    fn period_ranges_are_validated() {
        let overlapping = PeriodRanges {
            pre: (0, 10),
            post: (10, 20),
        };
        let err = overlapping.validate(30).expect_err("overlap must fail");
        assert!(err.to_string().contains("must end before"));

        let out_of_bounds = PeriodRanges {
            pre: (0, 9),
            post: (10, 30),
        };
        let err = out_of_bounds.validate(30).expect_err("post end out of range");
        assert!(err.to_string().contains("out of bounds"));

        let inverted = PeriodRanges {
            pre: (5, 2),
            post: (10, 12),
        };
        assert!(inverted.validate(30).is_err());
    }

    #[test]
    fn input_rejects_misaligned_covariates() {
        let periods = PeriodRanges::split(2, 4).expect("valid split");
        let err = CounterfactualInput::new(
            series(vec![1.0, 2.0, 3.0, 4.0]),
            vec![series(vec![1.0, 2.0, 3.0])],
            periods,
        )
        .expect_err("length mismatch must fail");
        assert!(err.to_string().contains("covariate 0 has 3 observations"));
    }

    #[test]
    fn flat_mean_holds_pre_period_level() {
        let input = CounterfactualInput::new(
            series(vec![10.0, f64::NAN, 20.0, 100.0, 200.0]),
            vec![],
            PeriodRanges::split(3, 5).expect("valid split"),
        )
        .expect("valid input");
        let predictions = FlatMeanPredictor.fit_predict(&input).expect("fits");
        assert_eq!(predictions, vec![15.0; 5]);
    }

    #[test]
    fn flat_mean_fails_without_observed_pre_period() {
        let input = CounterfactualInput::new(
            series(vec![f64::NAN, f64::NAN, 5.0]),
            vec![],
            PeriodRanges::split(2, 3).expect("valid split"),
        )
        .expect("valid input");
        let err = FlatMeanPredictor
            .fit_predict(&input)
            .expect_err("nothing to average");
        assert!(err.to_string().contains("counterfactual collaborator failed"));
    }

    #[test]
    fn regression_recovers_linear_relationship() {
        let control = (0..40)
            .map(|t| 1000.0 + 50.0 * (t as f64 * 0.9).sin())
            .collect::<Vec<_>>();
        let mut outcome = control.iter().map(|c| 20.0 + 1.5 * c).collect::<Vec<_>>();
        for value in &mut outcome[30..] {
            *value += 100.0;
        }
        let input = CounterfactualInput::new(
            series(outcome),
            vec![series(control.clone())],
            PeriodRanges::split(30, 40).expect("valid split"),
        )
        .expect("valid input");

        let predictions = RegressionPredictor.fit_predict(&input).expect("fits");
        assert_eq!(predictions.len(), 40);
        for (prediction, c) in predictions.iter().zip(&control) {
            assert!((prediction - (20.0 + 1.5 * c)).abs() < 1e-6);
        }
    }

    #[test]
    fn regression_propagates_missing_covariates_and_needs_rows() {
        let mut control = (0..12).map(|t| 100.0 + t as f64).collect::<Vec<_>>();
        control[10] = f64::NAN;
        let outcome = (0..12).map(|t| 200.0 + 2.0 * t as f64).collect::<Vec<_>>();
        let input = CounterfactualInput::new(
            series(outcome),
            vec![series(control)],
            PeriodRanges::split(8, 12).expect("valid split"),
        )
        .expect("valid input");
        let predictions = RegressionPredictor.fit_predict(&input).expect("fits");
        assert!(predictions[10].is_nan());
        assert!((predictions[11] - 222.0).abs() < 1e-6);

        let tiny = CounterfactualInput::new(
            series(vec![1.0, 2.0, 3.0]),
            vec![series(vec![1.0, 2.0, 3.0])],
            PeriodRanges::split(1, 3).expect("valid split"),
        )
        .expect("valid input");
        let err = RegressionPredictor
            .fit_predict(&tiny)
            .expect_err("one row cannot fit two parameters");
        assert!(err.to_string().contains("usable pre-period rows"));
    }
}
