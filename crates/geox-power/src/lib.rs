// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

//! Two-sample power analysis: required duration for a target power and
//! achieved power for a fixed duration.

pub mod calculator;
pub mod noncentral_t;
pub mod sample;
pub mod status;

pub use calculator::{AchievedPower, PowerCalculator, PowerConfig, RequiredDuration};
pub use noncentral_t::noncentral_t_cdf;
pub use sample::{SampleCharacteristics, estimate_sample_characteristics};
pub use status::{PowerStatus, PowerTier, get_power_status};
