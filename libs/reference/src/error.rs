//! Error types for reference generation and parsing.

use thiserror::Error;

use crate::source::StoreError;

/// Errors raised when validating a reference suffix.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SuffixError {
    /// The suffix is present but empty.
    #[error("suffix cannot be empty")]
    Empty,

    /// The suffix exceeds the maximum length.
    #[error("suffix is {len} characters long, at most {max} allowed")]
    TooLong { len: usize, max: usize },

    /// The suffix contains the field separator.
    #[error("suffix cannot contain the field separator '-'")]
    ContainsSeparator,

    /// The suffix contains a character outside `[A-Za-z0-9_.]`.
    #[error("suffix contains disallowed character {0:?}")]
    InvalidCharacter(char),
}

/// Why a string is not a standardized reference.
///
/// Returned as a value by the parser, never raised.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParseFailure {
    /// The input string is empty.
    #[error("reference cannot be empty")]
    Empty,

    /// The input does not have the `PREFIX-DATE-TIME-SEQ` layout.
    #[error("expected PREFIX-YYYYMMDD-HHMMSS-NNNN[-SUFFIX]")]
    WrongShape,

    /// The prefix is well formed but not one of the known document prefixes.
    #[error("unknown prefix '{0}'")]
    UnknownPrefix(String),

    /// The date segment is not a valid `YYYYMMDD` calendar date.
    #[error("invalid date '{0}'")]
    InvalidDate(String),

    /// The time segment is not a valid `HHMMSS` clock time.
    #[error("invalid time '{0}'")]
    InvalidTime(String),

    /// The sequence is not four digits in `0001..=9999`.
    #[error("invalid sequence '{0}'")]
    InvalidSequence(String),

    /// The suffix segment is malformed.
    #[error("invalid suffix: {0}")]
    InvalidSuffix(SuffixError),
}

impl ParseFailure {
    /// Stable machine-readable reason code.
    pub fn reason_code(&self) -> &'static str {
        match self {
            ParseFailure::Empty => "empty",
            ParseFailure::WrongShape => "wrong_shape",
            ParseFailure::UnknownPrefix(_) => "unknown_prefix",
            ParseFailure::InvalidDate(_) => "invalid_date",
            ParseFailure::InvalidTime(_) => "invalid_time",
            ParseFailure::InvalidSequence(_) => "invalid_sequence",
            ParseFailure::InvalidSuffix(_) => "invalid_suffix",
        }
    }
}

/// Errors that can occur when generating a reference.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ReferenceError {
    /// Every sequence in the bucket is taken.
    #[error("no free sequence left for {prefix} at {stamp}; retry in the next second")]
    SequenceExhausted { prefix: &'static str, stamp: String },

    /// The requested suffix is invalid.
    #[error("invalid suffix: {0}")]
    InvalidSuffix(#[from] SuffixError),

    /// The document type name is not in the fixed table.
    #[error("unknown document type '{0}'")]
    UnknownDocumentType(String),

    /// The prefix is not in the fixed table.
    #[error("unknown reference prefix '{0}'")]
    UnknownPrefix(String),

    /// Issued sequences could not be looked up.
    #[error("reference store unavailable: {0}")]
    PersistenceUnavailable(String),
}

impl ReferenceError {
    /// Returns true if the same call may succeed later without changes.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ReferenceError::SequenceExhausted { .. } | ReferenceError::PersistenceUnavailable(_)
        )
    }
}

/// Errors from [`crate::ReferenceGenerator::issue`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum IssueError {
    /// Generation itself failed.
    #[error(transparent)]
    Generate(#[from] ReferenceError),

    /// Every attempt collided with an already persisted reference.
    #[error("reference still colliding after {attempts} attempts (last: {last})")]
    RetriesExhausted { attempts: u32, last: String },

    /// The write failed for a reason other than a duplicate.
    #[error("failed to persist reference: {0}")]
    Store(StoreError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reason_codes_are_distinct() {
        let failures = [
            ParseFailure::Empty,
            ParseFailure::WrongShape,
            ParseFailure::UnknownPrefix("XYZ".into()),
            ParseFailure::InvalidDate("20251302".into()),
            ParseFailure::InvalidTime("246000".into()),
            ParseFailure::InvalidSequence("001".into()),
            ParseFailure::InvalidSuffix(SuffixError::Empty),
        ];
        let codes: std::collections::HashSet<_> =
            failures.iter().map(ParseFailure::reason_code).collect();
        assert_eq!(codes.len(), failures.len());
    }

    #[test]
    fn test_retryable_errors() {
        assert!(ReferenceError::SequenceExhausted {
            prefix: "DEV",
            stamp: "20250902-143027".into()
        }
        .is_retryable());
        assert!(ReferenceError::PersistenceUnavailable("down".into()).is_retryable());
        assert!(!ReferenceError::InvalidSuffix(SuffixError::ContainsSeparator).is_retryable());
    }
}
