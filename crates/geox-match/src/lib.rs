// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

//! Control market selection: similarity ranking, ridge synthetic controls,
//! and pre-period fit diagnostics.

pub mod distance;
pub mod fit_quality;
pub mod pool;
pub mod ranking;
pub mod synthetic;

pub use distance::{correlation, euclidean_distance};
pub use fit_quality::{PreFitQuality, evaluate_pre_period_fit};
pub use pool::CandidatePool;
pub use ranking::{ControlMatch, find_best_controls};
pub use synthetic::{
    ControlWeight, SyntheticControl, SyntheticControlBuilder, SyntheticControlConfig,
    SyntheticControlFit, build_synthetic_control,
};
