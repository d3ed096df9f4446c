//! Parsing and classification of reference strings.

use chrono::{NaiveDate, NaiveTime};

use crate::error::ParseFailure;
use crate::legacy::{self, LegacyReference};
use crate::types::{DocumentType, ReferenceCode, Sequence, Suffix, SEPARATOR};

/// What a reference string turned out to be.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classification {
    /// Follows `PREFIX-YYYYMMDD-HHMMSS-NNNN[-SUFFIX]`.
    Standardized(ReferenceCode),
    /// A recognized historical format, kept as-is.
    Legacy(LegacyReference),
    /// Neither; carries the reason the standardized parse failed.
    Malformed(ParseFailure),
}

impl Classification {
    pub fn is_standardized(&self) -> bool {
        matches!(self, Classification::Standardized(_))
    }

    /// The parsed reference, if standardized.
    pub fn reference(&self) -> Option<&ReferenceCode> {
        match self {
            Classification::Standardized(code) => Some(code),
            _ => None,
        }
    }

    /// The document type, when it can be told from the text.
    pub fn document_type(&self) -> Option<DocumentType> {
        match self {
            Classification::Standardized(code) => Some(code.document_type()),
            Classification::Legacy(legacy) => legacy.document_type,
            Classification::Malformed(_) => None,
        }
    }

    /// `standardized`, `legacy` or `malformed`.
    pub fn label(&self) -> &'static str {
        match self {
            Classification::Standardized(_) => "standardized",
            Classification::Legacy(_) => "legacy",
            Classification::Malformed(_) => "malformed",
        }
    }
}

/// Returns true iff `text` is a standardized reference with a known prefix,
/// a valid date and time, and a four-digit sequence.
pub fn is_standardized_format(text: &str) -> bool {
    parse_standardized(text).is_ok()
}

/// Classifies any string without failing.
///
/// Standardized references are parsed into their fields. Recognized legacy
/// formats are returned untouched. Anything else is malformed, with the
/// reason the standardized parse gave.
pub fn extract_info(text: &str) -> Classification {
    match parse_standardized(text) {
        Ok(code) => Classification::Standardized(code),
        Err(ParseFailure::Empty) => Classification::Malformed(ParseFailure::Empty),
        Err(failure) => match legacy::recognize(text) {
            Some(legacy) => Classification::Legacy(legacy),
            None => Classification::Malformed(failure),
        },
    }
}

/// Strict parser for the standardized grammar.
pub(crate) fn parse_standardized(text: &str) -> Result<ReferenceCode, ParseFailure> {
    if text.is_empty() {
        return Err(ParseFailure::Empty);
    }

    let mut parts = text.splitn(5, SEPARATOR);
    let (Some(prefix), Some(date), Some(time), Some(sequence)) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return Err(ParseFailure::WrongShape);
    };
    let suffix = parts.next();

    if prefix.is_empty() || !prefix.bytes().all(|b| b.is_ascii_uppercase()) {
        return Err(ParseFailure::WrongShape);
    }
    let document_type = DocumentType::from_prefix(prefix)
        .ok_or_else(|| ParseFailure::UnknownPrefix(prefix.to_string()))?;

    let date = parse_date(date).ok_or_else(|| ParseFailure::InvalidDate(date.to_string()))?;
    let time = parse_time(time).ok_or_else(|| ParseFailure::InvalidTime(time.to_string()))?;
    let sequence = parse_sequence(sequence)
        .ok_or_else(|| ParseFailure::InvalidSequence(sequence.to_string()))?;
    let suffix = suffix
        .map(Suffix::new)
        .transpose()
        .map_err(ParseFailure::InvalidSuffix)?;

    Ok(ReferenceCode::new(
        document_type,
        date.and_time(time),
        sequence,
        suffix,
    ))
}

fn is_digits(s: &str, len: usize) -> bool {
    s.len() == len && s.bytes().all(|b| b.is_ascii_digit())
}

fn parse_date(s: &str) -> Option<NaiveDate> {
    if !is_digits(s, 8) {
        return None;
    }
    let year = s[0..4].parse().ok()?;
    let month = s[4..6].parse().ok()?;
    let day = s[6..8].parse().ok()?;
    NaiveDate::from_ymd_opt(year, month, day)
}

fn parse_time(s: &str) -> Option<NaiveTime> {
    if !is_digits(s, 6) {
        return None;
    }
    let hour = s[0..2].parse().ok()?;
    let minute = s[2..4].parse().ok()?;
    let second = s[4..6].parse().ok()?;
    NaiveTime::from_hms_opt(hour, minute, second)
}

fn parse_sequence(s: &str) -> Option<Sequence> {
    if !is_digits(s, 4) {
        return None;
    }
    Sequence::new(s.parse().ok()?)
}
