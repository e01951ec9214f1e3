// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

//! Shared types for geo-experiment causal analysis: the error type, daily
//! series, finite-subset statistics, the market catalog, and templates.

pub mod diagnostics;
pub mod error;
pub mod market;
pub mod stats;
pub mod template;
pub mod time_series;

pub use diagnostics::{DIAGNOSTICS_SCHEMA_VERSION, RunDiagnostics};
pub use error::GeoxError;
pub use market::MarketCatalog;
pub use template::{CUSTOM_TEMPLATE_ID, ExperimentTemplate, TemplateSet};
pub use time_series::{DEFAULT_VALUE_FLOOR, MISSING, Period, TimeSeries};
