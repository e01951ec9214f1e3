// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use geox_core::GeoxError;
use std::fmt;
use std::str::FromStr;

pub const ALGORITHM_UPDATE_DAYS: usize = 7;
pub const ALGORITHM_UPDATE_DROP: (f64, f64) = (0.15, 0.25);
pub const SEASONALITY_SPIKE_DAYS: usize = 5;
pub const SEASONALITY_SPIKE_FRACTION: f64 = 0.20;
pub const TRACKING_BREAK_DAYS: usize = 3;
pub const TRACKING_BREAK_LOSS_PROBABILITY: f64 = 0.30;

/// Kind of exogenous shock layered onto a treatment series.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ConfounderKind {
    /// Search ranking change that suppresses traffic for a week.
    AlgorithmUpdate,
    /// Short promotional or holiday lift.
    SeasonalitySpike,
    /// Analytics outage that loses observations.
    TrackingBreak,
}

impl ConfounderKind {
    pub const ALL: [Self; 3] = [
        Self::AlgorithmUpdate,
        Self::SeasonalitySpike,
        Self::TrackingBreak,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::AlgorithmUpdate => "algorithm_update",
            Self::SeasonalitySpike => "seasonality_spike",
            Self::TrackingBreak => "tracking_break",
        }
    }

    /// Number of consecutive days the shock touches.
    pub fn window_days(self) -> usize {
        match self {
            Self::AlgorithmUpdate => ALGORITHM_UPDATE_DAYS,
            Self::SeasonalitySpike => SEASONALITY_SPIKE_DAYS,
            Self::TrackingBreak => TRACKING_BREAK_DAYS,
        }
    }
}

impl fmt::Display for ConfounderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ConfounderKind {
    type Err = GeoxError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == raw)
            .ok_or_else(|| {
                GeoxError::invalid_input(format!(
                    "unknown confounder '{raw}'; expected one of algorithm_update, seasonality_spike, tracking_break"
                ))
            })
    }
}

/// Record of one applied confounder. `start_day` is a 0-based index.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(tag = "type", rename_all = "snake_case"))]
#[derive(Clone, Debug, PartialEq)]
pub enum ConfounderEvent {
    AlgorithmUpdate {
        start_day: usize,
        drop_fraction: f64,
    },
    SeasonalitySpike {
        start_day: usize,
        spike_fraction: f64,
    },
    TrackingBreak {
        start_day: usize,
        loss_probability: f64,
        /// Indices that were replaced by the missing marker.
        lost_days: Vec<usize>,
    },
}

impl ConfounderEvent {
    pub fn kind(&self) -> ConfounderKind {
        match self {
            Self::AlgorithmUpdate { .. } => ConfounderKind::AlgorithmUpdate,
            Self::SeasonalitySpike { .. } => ConfounderKind::SeasonalitySpike,
            Self::TrackingBreak { .. } => ConfounderKind::TrackingBreak,
        }
    }

    pub fn start_day(&self) -> usize {
        match self {
            Self::AlgorithmUpdate { start_day, .. }
            | Self::SeasonalitySpike { start_day, .. }
            | Self::TrackingBreak { start_day, .. } => *start_day,
        }
    }

    /// Half-open index window the event affected.
    pub fn window(&self) -> std::ops::Range<usize> {
        let start = self.start_day();
        start..start + self.kind().window_days()
    }
}

/// Valid start positions `[intervention_day, len - window)` for `kind`.
pub(crate) fn start_range(
    kind: ConfounderKind,
    len: usize,
    intervention_day: usize,
) -> Result<std::ops::Range<usize>, GeoxError> {
    let window = kind.window_days();
    let upper = len.saturating_sub(window);
    if intervention_day >= upper {
        return Err(GeoxError::invalid_input(format!(
            "{kind} needs intervention_day < len - {window}; got intervention_day={intervention_day}, len={len}"
        )));
    }
    Ok(intervention_day..upper)
}
