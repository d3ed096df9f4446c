//! Batch classification of stored references.
//!
//! Migration tooling feeds every stored reference through a [`Census`] to
//! learn how much data still uses legacy formats before deciding whether
//! to rewrite anything.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::legacy::LegacyKind;
use crate::parse::{extract_info, Classification};

/// Default number of samples kept per class.
pub const DEFAULT_SAMPLE_LIMIT: usize = 3;

/// Buckets a census sorts references into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CensusClass {
    Standardized,
    Legacy,
    Malformed,
    /// Blank values, counted apart from malformed text.
    Empty,
}

impl CensusClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            CensusClass::Standardized => "standardized",
            CensusClass::Legacy => "legacy",
            CensusClass::Malformed => "malformed",
            CensusClass::Empty => "empty",
        }
    }
}

/// Running counts and samples of classified references.
#[derive(Debug, Clone, Serialize)]
pub struct Census {
    pub total: usize,
    pub standardized: usize,
    pub legacy: usize,
    pub malformed: usize,
    pub empty: usize,
    /// Legacy counts per layout, keyed by [`LegacyKind::as_str`].
    pub legacy_kinds: BTreeMap<&'static str, usize>,
    /// Up to `sample_limit` raw values per class, in input order.
    pub samples: BTreeMap<CensusClass, Vec<String>>,
    #[serde(skip)]
    sample_limit: usize,
}

impl Default for Census {
    fn default() -> Self {
        Self::new(DEFAULT_SAMPLE_LIMIT)
    }
}

impl Census {
    pub fn new(sample_limit: usize) -> Self {
        Self {
            total: 0,
            standardized: 0,
            legacy: 0,
            malformed: 0,
            empty: 0,
            legacy_kinds: BTreeMap::new(),
            samples: BTreeMap::new(),
            sample_limit,
        }
    }

    /// Classifies one stored value and returns its class.
    ///
    /// Surrounding whitespace is ignored; a blank value counts as empty.
    pub fn observe(&mut self, value: &str) -> CensusClass {
        let value = value.trim();
        self.total += 1;

        let class = if value.is_empty() {
            self.empty += 1;
            CensusClass::Empty
        } else {
            match extract_info(value) {
                Classification::Standardized(_) => {
                    self.standardized += 1;
                    CensusClass::Standardized
                }
                Classification::Legacy(legacy) => {
                    self.legacy += 1;
                    self.count_kind(legacy.kind);
                    CensusClass::Legacy
                }
                Classification::Malformed(_) => {
                    self.malformed += 1;
                    CensusClass::Malformed
                }
            }
        };

        let samples = self.samples.entry(class).or_default();
        if samples.len() < self.sample_limit {
            samples.push(value.to_string());
        }

        class
    }

    fn count_kind(&mut self, kind: LegacyKind) {
        *self.legacy_kinds.entry(kind.as_str()).or_default() += 1;
    }

    /// Samples kept for `class`.
    pub fn samples(&self, class: CensusClass) -> &[String] {
        self.samples.get(&class).map(Vec::as_slice).unwrap_or_default()
    }

    /// Count for `class`.
    pub fn count(&self, class: CensusClass) -> usize {
        match class {
            CensusClass::Standardized => self.standardized,
            CensusClass::Legacy => self.legacy,
            CensusClass::Malformed => self.malformed,
            CensusClass::Empty => self.empty,
        }
    }

    /// Returns true once every non-empty value is standardized.
    pub fn is_fully_standardized(&self) -> bool {
        self.legacy == 0 && self.malformed == 0
    }
}

impl<'a> Extend<&'a str> for Census {
    fn extend<I: IntoIterator<Item = &'a str>>(&mut self, iter: I) {
        for value in iter {
            self.observe(value);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_census_counts() {
        let mut census = Census::new(2);
        census.extend([
            "DEV-20250902-143027-0001",
            "DEV-20250902-143027-0002",
            "DEV-20250902-143027-0003",
            "BC16/2025",
            "DV001",
            "   ",
            "not a reference",
        ]);

        assert_eq!(census.total, 7);
        assert_eq!(census.standardized, 3);
        assert_eq!(census.legacy, 2);
        assert_eq!(census.empty, 1);
        assert_eq!(census.malformed, 1);
        assert_eq!(census.samples(CensusClass::Standardized).len(), 2);
        assert_eq!(census.legacy_kinds.get("short_code"), Some(&1));
        assert_eq!(census.legacy_kinds.get("supplier_order_year"), Some(&1));
        assert!(!census.is_fully_standardized());
    }

    #[test]
    fn test_census_trims_values() {
        let mut census = Census::default();
        assert_eq!(
            census.observe("  FAC-20250902-143027-0001\n"),
            CensusClass::Standardized
        );
        assert_eq!(census.samples(CensusClass::Standardized), ["FAC-20250902-143027-0001"]);
        assert!(census.is_fully_standardized());
    }

    #[test]
    fn test_census_json_shape() {
        let mut census = Census::new(1);
        census.observe("42");
        let json = serde_json::to_value(&census).unwrap();
        assert_eq!(json["legacy"], 1);
        assert_eq!(json["samples"]["legacy"][0], "42");
        assert!(json.get("sample_limit").is_none());
    }
}
