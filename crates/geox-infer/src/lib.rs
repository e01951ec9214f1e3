// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

//! Counterfactual inference and the ship/continue/don't-ship decision.
//!
//! The counterfactual fitter is an external collaborator behind
//! [`CounterfactualModel`]; this crate only consumes its predictions.

pub mod counterfactual;
pub mod decision;
pub mod validity;

pub use counterfactual::{
    CounterfactualInput, CounterfactualModel, FlatMeanPredictor, PeriodRanges,
    RegressionPredictor,
};
pub use decision::{
    DecisionEngine, DecisionPolicy, DecisionReason, DecisionResult, EffectEstimate,
    Recommendation,
};
pub use validity::{CheckStatus, ValidityChecker, ValidityReport, ValidityThresholds};
