// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use std::fmt;

pub const HIGH_POWER_THRESHOLD: f64 = 0.80;
pub const MEDIUM_POWER_THRESHOLD: f64 = 0.70;

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PowerTier {
    High,
    Medium,
    Low,
}

impl PowerTier {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::High => "high",
            Self::Medium => "medium",
            Self::Low => "low",
        }
    }
}

impl fmt::Display for PowerTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PowerStatus {
    pub tier: PowerTier,
    pub message: String,
}

/// Buckets achieved power into a tier with display text. `NaN` is low.
pub fn get_power_status(achieved_power: f64) -> PowerStatus {
    let pct = achieved_power * 100.0;
    if achieved_power >= HIGH_POWER_THRESHOLD {
        PowerStatus {
            tier: PowerTier::High,
            message: format!("High power ({pct:.1}%)"),
        }
    } else if achieved_power >= MEDIUM_POWER_THRESHOLD {
        PowerStatus {
            tier: PowerTier::Medium,
            message: format!("Medium power ({pct:.1}%) - Consider extending"),
        }
    } else {
        PowerStatus {
            tier: PowerTier::Low,
            message: format!("Low power ({pct:.1}%) - Increase duration"),
        }
    }
}
