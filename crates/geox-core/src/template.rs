// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use crate::GeoxError;

/// Template id reserved for user-defined hypotheses.
pub const CUSTOM_TEMPLATE_ID: u32 = 99;

/// Method hint attached to custom hypotheses.
pub const DEFAULT_RECOMMENDED_METHOD: &str = "synthetic_control";

/// Experiment template record supplied by an external loader.
///
/// Only `default_mde_pct` (as the initial MDE) and `recommended_method` (an
/// unvalidated hint) are consumed by the analysis crates.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, PartialEq)]
pub struct ExperimentTemplate {
    pub id: u32,
    pub name: String,
    #[cfg_attr(feature = "serde", serde(default))]
    pub description: String,
    pub primary_metric: String,
    /// Minimum detectable effect in percent, e.g. `8.0` for 8%.
    #[cfg_attr(feature = "serde", serde(rename = "default_mde"))]
    pub default_mde_pct: f64,
    #[cfg_attr(feature = "serde", serde(default = "default_method"))]
    pub recommended_method: String,
    #[cfg_attr(feature = "serde", serde(default))]
    pub common_confounders: Vec<String>,
}

#[cfg(feature = "serde")]
fn default_method() -> String {
    DEFAULT_RECOMMENDED_METHOD.to_string()
}

impl ExperimentTemplate {
    /// Template for a hypothesis defined without a catalog entry.
    pub fn custom(primary_metric: impl Into<String>, mde_pct: f64) -> Result<Self, GeoxError> {
        let primary_metric = primary_metric.into();
        let template = Self {
            id: CUSTOM_TEMPLATE_ID,
            name: "Custom Hypothesis".to_string(),
            description: format!("Custom metric: {primary_metric}"),
            primary_metric,
            default_mde_pct: mde_pct,
            recommended_method: DEFAULT_RECOMMENDED_METHOD.to_string(),
            common_confounders: vec![],
        };
        template.validate()?;
        Ok(template)
    }

    /// Default MDE as a fraction, e.g. `0.08` for 8%.
    pub fn default_mde_fraction(&self) -> f64 {
        self.default_mde_pct / 100.0
    }

    pub fn validate(&self) -> Result<(), GeoxError> {
        if self.name.trim().is_empty() {
            return Err(GeoxError::invalid_input(format!(
                "template {} must have a non-blank name",
                self.id
            )));
        }
        if !self.default_mde_pct.is_finite() || self.default_mde_pct <= 0.0 {
            return Err(GeoxError::invalid_input(format!(
                "template '{}' default_mde must be finite and > 0; got {}",
                self.name, self.default_mde_pct
            )));
        }
        Ok(())
    }
}

/// Ordered set of templates as delivered by the template loader.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TemplateSet {
    pub templates: Vec<ExperimentTemplate>,
}

impl TemplateSet {
    pub fn new(templates: Vec<ExperimentTemplate>) -> Result<Self, GeoxError> {
        for template in &templates {
            template.validate()?;
        }
        Ok(Self { templates })
    }

    /// Parses `{"templates": [...]}` JSON and validates every record.
    #[cfg(feature = "serde")]
    pub fn from_json_str(raw: &str) -> Result<Self, GeoxError> {
        let parsed: Self = serde_json::from_str(raw)
            .map_err(|err| GeoxError::invalid_input(format!("invalid template JSON: {err}")))?;
        Self::new(parsed.templates)
    }

    pub fn find(&self, name: &str) -> Option<&ExperimentTemplate> {
        self.templates
            .iter()
            .find(|template| template.name.eq_ignore_ascii_case(name))
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }
}
