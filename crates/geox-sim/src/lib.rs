// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

//! Seeded synthetic market data for geo experiments.
//!
//! A [`SeriesGenerator`] owns its random stream. Two generators built from the
//! same seed and driven through the same call sequence produce bit-identical
//! series; independent runs need independently seeded generators.

pub mod confounder;
pub mod dataset;
pub mod effect;
pub mod generator;
pub mod params;

pub use confounder::{ConfounderEvent, ConfounderKind};
pub use dataset::{
    DEFAULT_MDE_FRACTION, DEFAULT_POST_PERIOD_DAYS, DEFAULT_PRE_PERIOD_DAYS, DailyObservation,
    ExperimentDataset, ExperimentRequest, default_start_date,
};
pub use effect::{AppliedEffect, DELAY_DAYS, EffectShape, EffectSpec, RAMP_DAYS, build_effect};
pub use generator::{MAX_SERIES_DAYS, SeriesGenerator};
pub use params::{GenerationOverrides, GenerationParameters, ParameterRanges, UniformRange};
