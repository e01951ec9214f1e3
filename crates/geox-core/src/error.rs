// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use thiserror::Error;

/// Error type shared by every geox crate.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum GeoxError {
    /// Caller misuse: shapes, ranges, or names that can never be valid.
    #[error("invalid input: {0}")]
    InvalidInput(String),
    /// A numeric routine could not produce a usable answer.
    #[error("numerical issue: {0}")]
    NumericalIssue(String),
    /// The external counterfactual fitter failed or misbehaved.
    #[error("counterfactual collaborator failed: {0}")]
    Collaborator(String),
    /// A caller-imposed size cap was exceeded.
    #[error("resource limit exceeded: {0}")]
    ResourceLimit(String),
    /// A write-only run sink could not store a record.
    #[error("persistence failed: {0}")]
    Persistence(String),
}

impl GeoxError {
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    pub fn numerical_issue(msg: impl Into<String>) -> Self {
        Self::NumericalIssue(msg.into())
    }

    pub fn collaborator(msg: impl Into<String>) -> Self {
        Self::Collaborator(msg.into())
    }

    pub fn resource_limit(msg: impl Into<String>) -> Self {
        Self::ResourceLimit(msg.into())
    }

    pub fn persistence(msg: impl Into<String>) -> Self {
        Self::Persistence(msg.into())
    }

    /// Returns true for errors caused by the caller rather than the data.
    pub fn is_caller_error(&self) -> bool {
        matches!(self, Self::InvalidInput(_) | Self::ResourceLimit(_))
    }
}
