//! Lookup of already issued sequences.
//!
//! The generator never owns the list of issued references. It asks a
//! [`SequenceSource`] for the sequences taken in one (prefix, second)
//! bucket. Production code backs this with the registry database; tests
//! and offline tools use [`MemorySource`].

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{NaiveDateTime, SubsecRound};
use thiserror::Error;
use tracing::debug;

use crate::types::{format_stamp, DocumentType, ReferenceCode, Sequence};

/// References sharing a prefix and a second-resolution timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Bucket {
    document_type: DocumentType,
    second: NaiveDateTime,
}

impl Bucket {
    /// Creates a bucket. Sub-second precision is dropped.
    #[must_use]
    pub fn new(document_type: DocumentType, timestamp: NaiveDateTime) -> Self {
        Self {
            document_type,
            second: timestamp.trunc_subsecs(0),
        }
    }

    #[must_use]
    pub const fn document_type(&self) -> DocumentType {
        self.document_type
    }

    #[must_use]
    pub const fn prefix(&self) -> &'static str {
        self.document_type.prefix()
    }

    #[must_use]
    pub const fn second(&self) -> NaiveDateTime {
        self.second
    }

    /// The `YYYYMMDD-HHMMSS` key shared by every reference in the bucket.
    #[must_use]
    pub fn stamp(&self) -> String {
        format_stamp(&self.second)
    }
}

impl std::fmt::Display for Bucket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}-{}", self.prefix(), self.stamp())
    }
}

/// Failures reported by a reference store.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The uniqueness constraint rejected the reference.
    #[error("reference already issued: {0}")]
    Duplicate(String),

    /// The store could not be queried or written.
    #[error("reference store unavailable: {0}")]
    Unavailable(String),
}

impl StoreError {
    pub fn is_duplicate(&self) -> bool {
        matches!(self, StoreError::Duplicate(_))
    }
}

/// Capability to list the sequences already issued in a bucket.
#[async_trait]
pub trait SequenceSource: Send + Sync {
    /// Returns every sequence already issued for `bucket`.
    async fn issued_sequences(&self, bucket: &Bucket) -> Result<BTreeSet<Sequence>, StoreError>;
}

#[async_trait]
impl<T: SequenceSource + ?Sized> SequenceSource for Arc<T> {
    async fn issued_sequences(&self, bucket: &Bucket) -> Result<BTreeSet<Sequence>, StoreError> {
        (**self).issued_sequences(bucket).await
    }
}

/// Whether an issued slot still belongs to a live document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Slot {
    Active,
    Retired,
}

/// In-memory source for tests and offline use.
///
/// Also acts as a store: [`MemorySource::record`] enforces the same
/// (prefix, second, sequence) uniqueness the registry does. Retired slots
/// stay reserved.
#[derive(Debug, Default)]
pub struct MemorySource {
    issued: Mutex<BTreeMap<Bucket, BTreeMap<Sequence, Slot>>>,

    /// Whether lookups and writes should "fail" as if the store were down.
    unavailable: bool,
}

impl MemorySource {
    /// Create an empty source.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a source that fails every call.
    pub fn unavailable() -> Self {
        Self {
            issued: Mutex::default(),
            unavailable: true,
        }
    }

    fn issued(&self) -> MutexGuard<'_, BTreeMap<Bucket, BTreeMap<Sequence, Slot>>> {
        self.issued.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn check_available(&self) -> Result<(), StoreError> {
        if self.unavailable {
            return Err(StoreError::Unavailable(
                "memory source configured to fail".to_string(),
            ));
        }
        Ok(())
    }

    /// Records a reference, rejecting a second one in the same slot.
    pub fn record(&self, code: &ReferenceCode) -> Result<(), StoreError> {
        self.check_available()?;

        let mut issued = self.issued();
        let slots = issued.entry(code.bucket()).or_default();
        if slots.contains_key(&code.sequence()) {
            return Err(StoreError::Duplicate(code.to_string()));
        }
        slots.insert(code.sequence(), Slot::Active);

        debug!(reference = %code, "Recorded reference in memory source");
        Ok(())
    }

    /// Marks a reference retired. Its sequence is never handed out again.
    ///
    /// Returns whether an active reference was retired.
    pub fn retire(&self, code: &ReferenceCode) -> bool {
        let mut issued = self.issued();
        let Some(slot) = issued
            .get_mut(&code.bucket())
            .and_then(|slots| slots.get_mut(&code.sequence()))
        else {
            return false;
        };
        if *slot == Slot::Retired {
            return false;
        }
        *slot = Slot::Retired;
        debug!(reference = %code, "Retired reference in memory source");
        true
    }

    /// Number of active (not retired) references.
    pub fn len(&self) -> usize {
        self.issued()
            .values()
            .flat_map(BTreeMap::values)
            .filter(|slot| **slot == Slot::Active)
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl SequenceSource for MemorySource {
    async fn issued_sequences(&self, bucket: &Bucket) -> Result<BTreeSet<Sequence>, StoreError> {
        self.check_available()?;
        Ok(self
            .issued()
            .get(bucket)
            .map(|slots| slots.keys().copied().collect())
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn code(seq: u16) -> ReferenceCode {
        let ts = NaiveDate::from_ymd_opt(2025, 9, 2)
            .unwrap()
            .and_hms_opt(14, 30, 27)
            .unwrap();
        ReferenceCode::new(DocumentType::Quotation, ts, Sequence::new(seq).unwrap(), None)
    }

    #[test]
    fn test_bucket_stamp() {
        let bucket = code(1).bucket();
        assert_eq!(bucket.stamp(), "20250902-143027");
        assert_eq!(bucket.to_string(), "DEV-20250902-143027");
    }

    #[tokio::test]
    async fn test_record_and_lookup() {
        let source = MemorySource::new();
        source.record(&code(1)).unwrap();
        source.record(&code(2)).unwrap();

        let issued = source.issued_sequences(&code(1).bucket()).await.unwrap();
        assert_eq!(issued.len(), 2);
        assert_eq!(source.len(), 2);
    }

    #[test]
    fn test_duplicate_rejected() {
        let source = MemorySource::new();
        source.record(&code(1)).unwrap();
        let err = source.record(&code(1)).unwrap_err();
        assert!(err.is_duplicate());
    }

    #[tokio::test]
    async fn test_retire_keeps_slot_reserved() {
        let source = MemorySource::new();
        source.record(&code(1)).unwrap();
        assert!(source.retire(&code(1)));
        assert!(!source.retire(&code(1)));
        assert!(!source.retire(&code(2)));
        assert!(source.is_empty());

        let issued = source.issued_sequences(&code(1).bucket()).await.unwrap();
        assert!(issued.contains(&Sequence::MIN));
        assert!(source.record(&code(1)).unwrap_err().is_duplicate());
    }

    #[tokio::test]
    async fn test_unavailable() {
        let source = MemorySource::unavailable();
        let err = source.issued_sequences(&code(1).bucket()).await.unwrap_err();
        assert!(matches!(err, StoreError::Unavailable(_)));
        assert!(source.record(&code(1)).is_err());
    }
}
