// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use crate::distance::{correlation, euclidean_distance};
use crate::pool::CandidatePool;
use geox_core::{GeoxError, TimeSeries};

/// One ranked control candidate.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, PartialEq)]
pub struct ControlMatch {
    /// 1-based, dense.
    pub rank: usize,
    pub name: String,
    pub distance: f64,
    /// Distance divided by series length.
    pub normalized_distance: f64,
    pub correlation: f64,
}

/// Ranks candidates by ascending Euclidean distance to `test` and returns the
/// first `top_k`.
///
/// Distance, not correlation, orders the table: it also penalizes level and
/// scale mismatch. Equal distances keep pool insertion order. Candidates with
/// missing days have a `NaN` distance and sort last.
pub fn find_best_controls(
    test: &TimeSeries,
    candidates: &CandidatePool,
    top_k: usize,
) -> Result<Vec<ControlMatch>, GeoxError> {
    if candidates.is_empty() {
        return Err(GeoxError::invalid_input(
            "find_best_controls requires at least one candidate",
        ));
    }
    candidates.ensure_len(test.len())?;

    let n = test.len() as f64;
    let mut scored = candidates
        .iter()
        .map(|(name, series)| {
            let distance = euclidean_distance(test.values(), series.values())?;
            Ok(ControlMatch {
                rank: 0,
                name: name.to_string(),
                distance,
                normalized_distance: distance / n,
                correlation: correlation(test.values(), series.values())?,
            })
        })
        .collect::<Result<Vec<_>, GeoxError>>()?;

    scored.sort_by(|a, b| {
        a.distance
            .is_nan()
            .cmp(&b.distance.is_nan())
            .then_with(|| a.distance.total_cmp(&b.distance))
    });
    for (idx, row) in scored.iter_mut().enumerate() {
        row.rank = idx + 1;
    }
    scored.truncate(top_k);

    tracing::debug!(
        candidates = candidates.len(),
        top_k,
        best = scored.first().map(|row| row.name.as_str()),
        "ranked control candidates"
    );
    Ok(scored)
}
