//! # we-reference
//!
//! Reference codes for every document the workshop issues: quotations,
//! orders, product sheets, labels, deliveries, invoices, receptions,
//! returns, production batches and stock movements.
//!
//! ## Reference Format
//!
//! All references use the format `{PREFIX}-{YYYYMMDD}-{HHMMSS}-{NNNN}[-{SUFFIX}]`
//!
//! Examples:
//! - `DEV-20250902-143027-0001`
//! - `FPF-20250902-143027-0001-COPIE001`
//! - `MP-20250902-143027-0001-1_2_3`
//!
//! This format provides:
//! - Type safety (prefix indicates document type)
//! - Sortability (timestamp then sequence)
//! - Uniqueness (sequence is unique per prefix and second)
//! - Human readability (clear prefixes, calendar date)
//!
//! ## Generation
//!
//! [`ReferenceGenerator`] picks the smallest free sequence in the current
//! (prefix, second) bucket by asking an injected [`SequenceSource`]. It never
//! persists anything itself; [`ReferenceGenerator::issue`] wraps the caller's
//! write and retries a bounded number of times when the store reports a
//! duplicate.
//!
//! ## Parsing
//!
//! [`extract_info`] classifies any string as standardized, legacy, or
//! malformed without failing. [`is_standardized_format`] is the boolean
//! shortcut.

mod census;
mod clock;
mod error;
mod generator;
mod legacy;
mod macros;
mod parse;
mod source;
mod types;

pub use census::{Census, CensusClass, DEFAULT_SAMPLE_LIMIT};
pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{IssueError, ParseFailure, ReferenceError, SuffixError};
pub use generator::{
    FallbackPolicy, Issued, ReferenceGenerator, DEFAULT_MAX_ATTEMPTS, UNVERIFIED_SEQUENCE_FLOOR,
};
pub use legacy::{LegacyKind, LegacyReference};
pub use parse::{extract_info, is_standardized_format, Classification};
pub use source::{Bucket, MemorySource, SequenceSource, StoreError};
pub use types::*;
