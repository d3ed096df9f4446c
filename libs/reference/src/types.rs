//! Reference value types.
//!
//! A reference is a document type, a second-resolution timestamp, a
//! sequence number and an optional suffix. All of them are validated on
//! construction, so a [`ReferenceCode`] always renders to a string that
//! parses back to itself.

use std::cmp::Ordering;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime, SubsecRound};

use crate::define_document_types;
use crate::error::{ParseFailure, SuffixError};
use crate::source::Bucket;

/// Field separator between reference segments.
pub const SEPARATOR: char = '-';

/// Maximum suffix length in characters.
pub const MAX_SUFFIX_LENGTH: usize = 32;

/// `chrono` format of the date segment.
pub const DATE_FORMAT: &str = "%Y%m%d";

/// `chrono` format of the time segment.
pub const TIME_FORMAT: &str = "%H%M%S";

// =============================================================================
// Document Types
// =============================================================================

define_document_types! {
    Quotation => "quotation", "DEV", "DV";
    SupplierOrder => "supplier_order", "BC", "BC";
    ClientOrder => "client_order", "CMD", "CM";
    FinishedProduct => "finished_product", "FPF", "FP";
    RawMaterialLabel => "raw_material_label", "MP", "MP";
    Delivery => "delivery", "LIV", "LV";
    Invoice => "invoice", "FAC", "FC";
    Reception => "reception", "REC", "RC";
    Return => "return", "RET", "RT";
    Production => "production", "PROD", "PD";
    StockMovement => "stock_movement", "MVT", "MV";
}

// =============================================================================
// Sequence
// =============================================================================

/// Sequence number within a (prefix, second) bucket, in `1..=9999`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Sequence(u16);

impl Sequence {
    /// The first sequence of every bucket.
    pub const MIN: Self = Self(1);

    /// The last sequence of every bucket.
    pub const MAX: Self = Self(9999);

    /// Creates a sequence, rejecting values outside `1..=9999`.
    #[must_use]
    pub const fn new(value: u16) -> Option<Self> {
        if value >= Self::MIN.0 && value <= Self::MAX.0 {
            Some(Self(value))
        } else {
            None
        }
    }

    /// Returns the underlying value.
    #[must_use]
    pub const fn value(&self) -> u16 {
        self.0
    }

    /// Returns the next sequence, or `None` past [`Sequence::MAX`].
    #[must_use]
    pub const fn next(&self) -> Option<Self> {
        Self::new(self.0 + 1)
    }

    /// Iterates over every valid sequence in ascending order.
    pub fn all() -> impl Iterator<Item = Self> {
        (Self::MIN.0..=Self::MAX.0).map(Self)
    }
}

impl Default for Sequence {
    fn default() -> Self {
        Self::MIN
    }
}

impl std::fmt::Display for Sequence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:04}", self.0)
    }
}

impl From<Sequence> for u16 {
    fn from(seq: Sequence) -> Self {
        seq.0
    }
}

impl TryFrom<u16> for Sequence {
    type Error = ParseFailure;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        Self::new(value).ok_or_else(|| ParseFailure::InvalidSequence(value.to_string()))
    }
}

impl serde::Serialize for Sequence {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_u16(self.0)
    }
}

impl<'de> serde::Deserialize<'de> for Sequence {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let value = u16::deserialize(deserializer)?;
        Self::try_from(value).map_err(serde::de::Error::custom)
    }
}

// =============================================================================
// Suffix
// =============================================================================

/// Optional trailing segment distinguishing variants of a reference.
///
/// Non-empty, at most [`MAX_SUFFIX_LENGTH`] characters of `[A-Za-z0-9_.]`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Suffix(String);

impl Suffix {
    /// Validates and wraps a suffix.
    pub fn new(value: impl Into<String>) -> Result<Self, SuffixError> {
        let value = value.into();
        if value.is_empty() {
            return Err(SuffixError::Empty);
        }

        let len = value.chars().count();
        if len > MAX_SUFFIX_LENGTH {
            return Err(SuffixError::TooLong {
                len,
                max: MAX_SUFFIX_LENGTH,
            });
        }

        for c in value.chars() {
            if c == SEPARATOR {
                return Err(SuffixError::ContainsSeparator);
            }
            if !(c.is_ascii_alphanumeric() || c == '_' || c == '.') {
                return Err(SuffixError::InvalidCharacter(c));
            }
        }

        Ok(Self(value))
    }

    /// Folds arbitrary text (typically an old reference being migrated)
    /// into the suffix alphabet.
    ///
    /// Disallowed characters become `_` and the result is cut to
    /// [`MAX_SUFFIX_LENGTH`]. Returns `None` for blank input.
    pub fn normalized(text: &str) -> Option<Self> {
        let text = text.trim();
        if text.is_empty() {
            return None;
        }

        let folded: String = text
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || c == '_' || c == '.' {
                    c
                } else {
                    '_'
                }
            })
            .take(MAX_SUFFIX_LENGTH)
            .collect();
        Some(Self(folded))
    }

    /// Returns the suffix text.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Suffix {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::str::FromStr for Suffix {
    type Err = SuffixError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl AsRef<str> for Suffix {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

// =============================================================================
// Reference Code
// =============================================================================

/// A standardized reference: `PREFIX-YYYYMMDD-HHMMSS-NNNN[-SUFFIX]`.
///
/// Immutable once built. Ordering is by prefix, then timestamp, then
/// sequence, then suffix, which matches the lexical order of the rendered
/// text for references sharing a prefix.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ReferenceCode {
    document_type: DocumentType,
    timestamp: NaiveDateTime,
    sequence: Sequence,
    suffix: Option<Suffix>,
}

impl ReferenceCode {
    /// Builds a reference. Sub-second precision is dropped from `timestamp`.
    #[must_use]
    pub fn new(
        document_type: DocumentType,
        timestamp: NaiveDateTime,
        sequence: Sequence,
        suffix: Option<Suffix>,
    ) -> Self {
        Self {
            document_type,
            timestamp: timestamp.trunc_subsecs(0),
            sequence,
            suffix,
        }
    }

    /// Parses a standardized reference. Legacy formats are rejected; use
    /// [`crate::extract_info`] to classify arbitrary input.
    pub fn parse(s: &str) -> Result<Self, ParseFailure> {
        crate::parse::parse_standardized(s)
    }

    /// The document type this reference belongs to.
    #[must_use]
    pub const fn document_type(&self) -> DocumentType {
        self.document_type
    }

    /// The rendered prefix.
    #[must_use]
    pub const fn prefix(&self) -> &'static str {
        self.document_type.prefix()
    }

    /// Generation time at second resolution.
    #[must_use]
    pub const fn timestamp(&self) -> NaiveDateTime {
        self.timestamp
    }

    #[must_use]
    pub fn date(&self) -> NaiveDate {
        self.timestamp.date()
    }

    #[must_use]
    pub fn time(&self) -> NaiveTime {
        self.timestamp.time()
    }

    #[must_use]
    pub const fn sequence(&self) -> Sequence {
        self.sequence
    }

    pub fn suffix(&self) -> Option<&Suffix> {
        self.suffix.as_ref()
    }

    /// The (prefix, second) bucket this reference was allocated from.
    #[must_use]
    pub fn bucket(&self) -> Bucket {
        Bucket::new(self.document_type, self.timestamp)
    }

    /// The `YYYYMMDD-HHMMSS` portion of the reference.
    #[must_use]
    pub fn stamp(&self) -> String {
        format_stamp(&self.timestamp)
    }
}

/// Renders a timestamp as `YYYYMMDD-HHMMSS`.
pub(crate) fn format_stamp(timestamp: &NaiveDateTime) -> String {
    format!(
        "{}{}{}",
        timestamp.format(DATE_FORMAT),
        SEPARATOR,
        timestamp.format(TIME_FORMAT)
    )
}

impl std::fmt::Display for ReferenceCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{prefix}{sep}{stamp}{sep}{seq}",
            prefix = self.prefix(),
            sep = SEPARATOR,
            stamp = self.stamp(),
            seq = self.sequence,
        )?;
        if let Some(suffix) = &self.suffix {
            write!(f, "{SEPARATOR}{suffix}")?;
        }
        Ok(())
    }
}

impl std::str::FromStr for ReferenceCode {
    type Err = ParseFailure;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl PartialOrd for ReferenceCode {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ReferenceCode {
    fn cmp(&self, other: &Self) -> Ordering {
        self.prefix()
            .cmp(other.prefix())
            .then_with(|| self.timestamp.cmp(&other.timestamp))
            .then_with(|| self.sequence.cmp(&other.sequence))
            .then_with(|| self.suffix.cmp(&other.suffix))
    }
}

impl serde::Serialize for ReferenceCode {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.collect_str(self)
    }
}

impl<'de> serde::Deserialize<'de> for ReferenceCode {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Self::parse(&s).map_err(serde::de::Error::custom)
    }
}

// =============================================================================
// Tests
// =============================================================================
