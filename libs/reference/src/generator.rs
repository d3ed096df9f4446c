//! Reference generation.
//!
//! The generator picks the smallest free sequence in the current
//! (prefix, second) bucket. It does not persist what it returns; two
//! callers that look up the same bucket before either writes will get the
//! same code. The store's uniqueness constraint catches that, and
//! [`ReferenceGenerator::issue`] retries a bounded number of times.

use std::collections::BTreeSet;
use std::future::Future;

use rand::Rng;
use tracing::{debug, warn};

use crate::clock::{Clock, SystemClock};
use crate::error::{IssueError, ReferenceError};
use crate::source::{Bucket, SequenceSource, StoreError};
use crate::types::{DocumentType, ReferenceCode, Sequence, Suffix};

/// Default bound on [`ReferenceGenerator::issue`] attempts.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Lowest sequence drawn for unverified references.
pub const UNVERIFIED_SEQUENCE_FLOOR: u16 = 9000;

/// What to do when issued sequences cannot be looked up.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FallbackPolicy {
    /// Fail with [`ReferenceError::PersistenceUnavailable`].
    #[default]
    Strict,
    /// Draw a random sequence in the high range and tag the result unverified.
    AllowUnverified,
}

/// A generated reference and whether its sequence was checked against the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Issued {
    Verified(ReferenceCode),
    /// Generated without a lookup; needs reconciliation once the store is back.
    Unverified(ReferenceCode),
}

impl Issued {
    pub fn code(&self) -> &ReferenceCode {
        match self {
            Issued::Verified(code) | Issued::Unverified(code) => code,
        }
    }

    pub fn into_code(self) -> ReferenceCode {
        match self {
            Issued::Verified(code) | Issued::Unverified(code) => code,
        }
    }

    pub fn is_verified(&self) -> bool {
        matches!(self, Issued::Verified(_))
    }
}

/// Builds references for every document type.
#[derive(Debug)]
pub struct ReferenceGenerator<S, C = SystemClock> {
    source: S,
    clock: C,
    policy: FallbackPolicy,
    max_attempts: u32,
}

impl<S: SequenceSource> ReferenceGenerator<S> {
    /// Creates a generator reading the system clock.
    pub fn new(source: S) -> Self {
        Self::with_clock(source, SystemClock)
    }
}

impl<S: SequenceSource, C: Clock> ReferenceGenerator<S, C> {
    /// Creates a generator with an explicit clock.
    pub fn with_clock(source: S, clock: C) -> Self {
        Self {
            source,
            clock,
            policy: FallbackPolicy::default(),
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }

    /// Sets the policy applied when the source is unavailable.
    #[must_use]
    pub fn fallback_policy(mut self, policy: FallbackPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Sets the number of attempts [`Self::issue`] makes. At least one.
    #[must_use]
    pub fn max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts.max(1);
        self
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    /// Generates the next reference for `document_type`.
    ///
    /// Fails with [`ReferenceError::SequenceExhausted`] when all 9999
    /// sequences of the current second are taken, and with
    /// [`ReferenceError::PersistenceUnavailable`] when the lookup fails,
    /// whatever the fallback policy.
    pub async fn generate(
        &self,
        document_type: DocumentType,
        suffix: Option<&str>,
    ) -> Result<ReferenceCode, ReferenceError> {
        let suffix = suffix.map(Suffix::new).transpose()?;
        let bucket = Bucket::new(document_type, self.clock.now());
        let issued = self.lookup(&bucket).await?;
        self.build(bucket, &issued, suffix)
    }

    /// Generates a reference for a rendered prefix such as `"DEV"`.
    pub async fn generate_for_prefix(
        &self,
        prefix: &str,
        suffix: Option<&str>,
    ) -> Result<ReferenceCode, ReferenceError> {
        let document_type = DocumentType::from_prefix(prefix)
            .ok_or_else(|| ReferenceError::UnknownPrefix(prefix.to_string()))?;
        self.generate(document_type, suffix).await
    }

    /// Like [`Self::generate`], but applies the fallback policy when the
    /// source is unavailable.
    pub async fn generate_or_unverified(
        &self,
        document_type: DocumentType,
        suffix: Option<&str>,
    ) -> Result<Issued, ReferenceError> {
        let suffix = suffix.map(Suffix::new).transpose()?;
        let bucket = Bucket::new(document_type, self.clock.now());

        match self.lookup(&bucket).await {
            Ok(issued) => self.build(bucket, &issued, suffix).map(Issued::Verified),
            Err(ReferenceError::PersistenceUnavailable(reason))
                if self.policy == FallbackPolicy::AllowUnverified =>
            {
                let value = rand::rng()
                    .random_range(UNVERIFIED_SEQUENCE_FLOOR..=Sequence::MAX.value());
                let sequence = Sequence::new(value).unwrap_or(Sequence::MAX);
                let code = ReferenceCode::new(document_type, bucket.second(), sequence, suffix);
                warn!(
                    reference = %code,
                    reason = %reason,
                    "Issuing unverified reference; reconcile once the store is reachable"
                );
                Ok(Issued::Unverified(code))
            }
            Err(e) => Err(e),
        }
    }

    /// Generates a reference and hands it to `write`, retrying when the
    /// write reports [`StoreError::Duplicate`].
    ///
    /// `write` is the caller's persistence of the owning document; it should
    /// be atomic and covered by a uniqueness constraint on the reference.
    pub async fn issue<F, Fut, T>(
        &self,
        document_type: DocumentType,
        suffix: Option<&str>,
        mut write: F,
    ) -> Result<T, IssueError>
    where
        F: FnMut(Issued) -> Fut,
        Fut: Future<Output = Result<T, StoreError>>,
    {
        let mut last = String::new();

        for attempt in 1..=self.max_attempts {
            let issued = self.generate_or_unverified(document_type, suffix).await?;
            let reference = issued.code().to_string();

            match write(issued).await {
                Ok(value) => {
                    debug!(reference = %reference, attempt, "Reference issued");
                    return Ok(value);
                }
                Err(StoreError::Duplicate(_)) => {
                    warn!(
                        reference = %reference,
                        attempt,
                        max_attempts = self.max_attempts,
                        "Reference collided with an existing one, regenerating"
                    );
                    last = reference;
                }
                Err(e) => return Err(IssueError::Store(e)),
            }
        }

        Err(IssueError::RetriesExhausted {
            attempts: self.max_attempts,
            last,
        })
    }

    async fn lookup(&self, bucket: &Bucket) -> Result<BTreeSet<Sequence>, ReferenceError> {
        self.source.issued_sequences(bucket).await.map_err(|e| {
            warn!(bucket = %bucket, error = %e, "Issued sequence lookup failed");
            ReferenceError::PersistenceUnavailable(e.to_string())
        })
    }

    fn build(
        &self,
        bucket: Bucket,
        issued: &BTreeSet<Sequence>,
        suffix: Option<Suffix>,
    ) -> Result<ReferenceCode, ReferenceError> {
        let sequence = Sequence::all()
            .find(|s| !issued.contains(s))
            .ok_or_else(|| ReferenceError::SequenceExhausted {
                prefix: bucket.prefix(),
                stamp: bucket.stamp(),
            })?;

        debug!(
            bucket = %bucket,
            sequence = sequence.value(),
            taken = issued.len(),
            "Picked sequence"
        );

        Ok(ReferenceCode::new(
            bucket.document_type(),
            bucket.second(),
            sequence,
            suffix,
        ))
    }
}
