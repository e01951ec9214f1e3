// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use crate::GeoxError;
use std::collections::BTreeSet;

const US_TOP_DMAS: [&str; 20] = [
    "New York, NY",
    "Los Angeles, CA",
    "Chicago, IL",
    "Dallas-Fort Worth, TX",
    "Houston, TX",
    "Philadelphia, PA",
    "Washington, DC",
    "Miami-Fort Lauderdale, FL",
    "Atlanta, GA",
    "Phoenix, AZ",
    "Boston, MA",
    "San Francisco-Oakland, CA",
    "Detroit, MI",
    "Minneapolis-St. Paul, MN",
    "Tampa-St. Petersburg, FL",
    "Denver, CO",
    "Seattle-Tacoma, WA",
    "Portland, OR",
    "Las Vegas, NV",
    "Austin, TX",
];

/// Immutable, ordered list of market names.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MarketCatalog {
    names: Vec<String>,
}

impl MarketCatalog {
    /// Builds a catalog from unique, non-blank names.
    pub fn new<I, S>(names: I) -> Result<Self, GeoxError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let names = names.into_iter().map(Into::into).collect::<Vec<String>>();
        if names.is_empty() {
            return Err(GeoxError::invalid_input(
                "market catalog requires at least one market",
            ));
        }

        let mut seen = BTreeSet::new();
        for (idx, name) in names.iter().enumerate() {
            if name.trim().is_empty() {
                return Err(GeoxError::invalid_input(format!(
                    "market catalog entry {idx} is blank"
                )));
            }
            if !seen.insert(name.as_str()) {
                return Err(GeoxError::invalid_input(format!(
                    "market catalog contains duplicate name '{name}'"
                )));
            }
        }

        Ok(Self { names })
    }

    /// The 20 largest US designated market areas, in rank order.
    pub fn us_top_dmas() -> Self {
        Self {
            names: US_TOP_DMAS.iter().map(|name| (*name).to_string()).collect(),
        }
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.iter().any(|candidate| candidate == name)
    }

    /// 1-based rank of `name` in the catalog.
    pub fn rank_of(&self, name: &str) -> Option<usize> {
        self.names
            .iter()
            .position(|candidate| candidate == name)
            .map(|idx| idx + 1)
    }

    /// Every market except `name`, in catalog order.
    pub fn others(&self, name: &str) -> impl Iterator<Item = &str> {
        self.names
            .iter()
            .map(String::as_str)
            .filter(move |candidate| *candidate != name)
    }
}

#[cfg(test)]
mod tests {
    use super::MarketCatalog;

    #[test]
    fn us_catalog_has_twenty_ranked_markets() {
        let catalog = MarketCatalog::us_top_dmas();
        assert_eq!(catalog.len(), 20);
        assert_eq!(catalog.rank_of("New York, NY"), Some(1));
        assert_eq!(catalog.rank_of("Austin, TX"), Some(20));
        assert_eq!(catalog.rank_of("Nowhere"), None);
        assert_eq!(catalog.others("Chicago, IL").count(), 19);
        assert!(!catalog.others("Chicago, IL").any(|name| name == "Chicago, IL"));
    }

    #[test]
    fn rejects_duplicates_and_blank_names() {
        let dup = MarketCatalog::new(["A", "B", "A"]).expect_err("duplicates must fail");
        assert!(dup.to_string().contains("duplicate name 'A'"));

        let blank = MarketCatalog::new(["A", "  "]).expect_err("blank must fail");
        assert!(blank.to_string().contains("is blank"));

        let empty = MarketCatalog::new(Vec::<String>::new()).expect_err("empty must fail");
        assert!(empty.to_string().contains("at least one market"));
    }
}
