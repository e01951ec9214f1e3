// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use crate::GeoxError;
use crate::stats::{finite_count, finite_mean, finite_std};
use std::ops::Range;

/// Marker stored in place of a lost observation.
pub const MISSING: f64 = f64::NAN;

/// Lower bound applied to generated traffic values.
pub const DEFAULT_VALUE_FLOOR: f64 = 100.0;

/// Experiment period a day belongs to.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Period {
    Pre,
    Post,
}

impl Period {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pre => "pre",
            Self::Post => "post",
        }
    }
}

/// Ordered daily series on a contiguous, gap-free day index.
///
/// Day numbers are 1-based; slice positions are 0-based. Missing observations
/// keep their slot and hold [`MISSING`].
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, PartialEq)]
pub struct TimeSeries {
    values: Vec<f64>,
}

impl TimeSeries {
    /// Constructs a validated series. Values may be non-finite (missing) but
    /// the series must contain at least one slot.
    pub fn new(values: Vec<f64>) -> Result<Self, GeoxError> {
        if values.is_empty() {
            return Err(GeoxError::invalid_input("time series length must be >= 1"));
        }
        Ok(Self { values })
    }

    /// Constructs a series with every finite value raised to at least `floor`.
    pub fn floored(values: Vec<f64>, floor: f64) -> Result<Self, GeoxError> {
        let mut series = Self::new(values)?;
        series.apply_floor(floor);
        Ok(series)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Always false; kept for API symmetry with slices.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn into_values(self) -> Vec<f64> {
        self.values
    }

    /// Value on 1-based `day_num`; `None` outside the index.
    pub fn value_at_day(&self, day_num: usize) -> Option<f64> {
        day_num
            .checked_sub(1)
            .and_then(|idx| self.values.get(idx).copied())
    }

    pub fn n_missing(&self) -> usize {
        self.values.len() - finite_count(&self.values)
    }

    pub fn is_complete(&self) -> bool {
        self.n_missing() == 0
    }

    /// Copies the 0-based `range` into a new series.
    pub fn slice(&self, range: Range<usize>) -> Result<Self, GeoxError> {
        if range.start >= range.end || range.end > self.values.len() {
            return Err(GeoxError::invalid_input(format!(
                "slice range {}..{} is empty or exceeds series length {}",
                range.start,
                range.end,
                self.values.len()
            )));
        }
        Ok(Self {
            values: self.values[range].to_vec(),
        })
    }

    /// Mean over finite values.
    pub fn mean(&self) -> f64 {
        finite_mean(&self.values)
    }

    /// Population standard deviation (n denominator) over finite values.
    pub fn population_std(&self) -> f64 {
        finite_std(&self.values, 0)
    }

    /// Sample standard deviation (n - 1 denominator) over finite values.
    pub fn sample_std(&self) -> f64 {
        finite_std(&self.values, 1)
    }

    pub(crate) fn apply_floor(&mut self, floor: f64) {
        for value in &mut self.values {
            if value.is_finite() {
                *value = value.max(floor);
            }
        }
    }
}

impl AsRef<[f64]> for TimeSeries {
    fn as_ref(&self) -> &[f64] {
        &self.values
    }
}

impl TryFrom<Vec<f64>> for TimeSeries {
    type Error = GeoxError;

    fn try_from(values: Vec<f64>) -> Result<Self, Self::Error> {
        Self::new(values)
    }
}
