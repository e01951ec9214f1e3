// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use geox_core::GeoxError;
use serde::{Deserialize, Serialize};

pub const MIN_EXPERIMENTS: usize = 2;
pub const MAX_EXPERIMENTS: usize = 10;
pub const MIN_POST_PERIOD_DAYS: usize = 14;
pub const MAX_POST_PERIOD_DAYS: usize = 90;

/// Eight placeholder market names used when no catalog is supplied.
pub fn default_markets() -> Vec<String> {
    ('A'..='H').map(|suffix| format!("Market_{suffix}")).collect()
}

/// Shape of a batch: how many market pairs, which effects, how long.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchConfig {
    /// Market pairs; each pair runs once per effect size.
    pub num_experiments: usize,
    pub pre_period_days: usize,
    pub post_period_days: usize,
    /// Injected step effects in percent. Empty means `[5]`.
    pub effect_sizes_pct: Vec<f64>,
    /// Each run then has a 50% chance of one random confounder.
    pub include_confounders: bool,
    pub markets: Vec<String>,
    pub base_seed: u64,
    pub template_name: String,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            num_experiments: 3,
            pre_period_days: 90,
            post_period_days: 42,
            effect_sizes_pct: vec![5.0, 10.0],
            include_confounders: false,
            markets: default_markets(),
            base_seed: 42,
            template_name: "Default".to_string(),
        }
    }
}

impl BatchConfig {
    pub fn validate(&self) -> Result<(), GeoxError> {
        if !(MIN_EXPERIMENTS..=MAX_EXPERIMENTS).contains(&self.num_experiments) {
            return Err(GeoxError::resource_limit(format!(
                "BatchConfig.num_experiments must be within [{MIN_EXPERIMENTS}, {MAX_EXPERIMENTS}]; got {}",
                self.num_experiments
            )));
        }
        if !(MIN_POST_PERIOD_DAYS..=MAX_POST_PERIOD_DAYS).contains(&self.post_period_days) {
            return Err(GeoxError::invalid_input(format!(
                "BatchConfig.post_period_days must be within [{MIN_POST_PERIOD_DAYS}, {MAX_POST_PERIOD_DAYS}]; got {}",
                self.post_period_days
            )));
        }
        if self.pre_period_days < 2 {
            return Err(GeoxError::invalid_input(format!(
                "BatchConfig.pre_period_days must be >= 2; got {}",
                self.pre_period_days
            )));
        }
        if let Some(bad) = self.effect_sizes_pct.iter().find(|e| !e.is_finite()) {
            return Err(GeoxError::invalid_input(format!(
                "BatchConfig.effect_sizes_pct must be finite; got {bad}"
            )));
        }
        if self.markets.len() < 2 {
            return Err(GeoxError::invalid_input(format!(
                "BatchConfig.markets needs at least 2 names; got {}",
                self.markets.len()
            )));
        }
        for (idx, market) in self.markets.iter().enumerate() {
            if market.trim().is_empty() {
                return Err(GeoxError::invalid_input("BatchConfig.markets contains a blank name"));
            }
            if self.markets[..idx].contains(market) {
                return Err(GeoxError::invalid_input(format!(
                    "BatchConfig.markets lists '{market}' more than once"
                )));
            }
        }
        Ok(())
    }

    /// Effect sizes actually run, after the empty-list default.
    pub fn effective_effect_sizes(&self) -> Vec<f64> {
        if self.effect_sizes_pct.is_empty() {
            vec![5.0]
        } else {
            self.effect_sizes_pct.clone()
        }
    }

    /// `(test, control)` for experiment `index`: consecutive markets,
    /// wrapping around the list.
    pub fn market_pair(&self, index: usize) -> (&str, &str) {
        let m = self.markets.len();
        (
            self.markets[(2 * index) % m].as_str(),
            self.markets[(2 * index + 1) % m].as_str(),
        )
    }

    pub fn total_runs(&self) -> usize {
        self.num_experiments * self.effective_effect_sizes().len()
    }
}
