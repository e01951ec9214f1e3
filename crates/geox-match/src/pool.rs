// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use geox_core::{GeoxError, TimeSeries};

/// Named candidate control series in insertion order.
///
/// Insertion order is the tie-break order for equal distances.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CandidatePool {
    entries: Vec<(String, TimeSeries)>,
}

impl CandidatePool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, series: TimeSeries) -> Result<(), GeoxError> {
        let name = name.into();
        if self.get(&name).is_some() {
            return Err(GeoxError::invalid_input(format!(
                "candidate '{name}' is already in the pool"
            )));
        }
        self.entries.push((name, series));
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&TimeSeries> {
        self.entries
            .iter()
            .find(|(candidate, _)| candidate == name)
            .map(|(_, series)| series)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(name, _)| name.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &TimeSeries)> {
        self.entries
            .iter()
            .map(|(name, series)| (name.as_str(), series))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Fails unless every candidate has `expected` observations.
    pub(crate) fn ensure_len(&self, expected: usize) -> Result<(), GeoxError> {
        for (name, series) in &self.entries {
            if series.len() != expected {
                return Err(GeoxError::invalid_input(format!(
                    "candidate '{name}' has {} observations; test series has {expected}",
                    series.len()
                )));
            }
        }
        Ok(())
    }
}
