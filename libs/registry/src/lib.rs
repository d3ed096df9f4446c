//! # we-registry
//!
//! Local SQLite registry of issued references.
//!
//! This crate provides:
//! - Connection pool management
//! - The issued-sequence lookup the generator needs ([`SequenceSource`])
//! - The uniqueness constraint that backs every reference write
//! - Lookup, listing and retirement of issued references
//!
//! The registry uses SQLx with SQLite; the database file lives next to the
//! application data and is created on first use.

mod error;

pub use error::DbError;

use std::collections::BTreeSet;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::Row;
use tracing::{debug, info, warn};
use we_reference::{Bucket, DocumentType, ReferenceCode, Sequence, SequenceSource, StoreError};

/// Default database URL when nothing is configured.
pub const DEFAULT_DATABASE_URL: &str = "sqlite://references.db";

/// Registry configuration.
#[derive(Debug, Clone)]
pub struct DbConfig {
    /// Database connection URL (`sqlite://path` or `sqlite::memory:`).
    pub database_url: String,

    /// Maximum number of connections in the pool.
    pub max_connections: u32,

    /// Minimum number of idle connections.
    pub min_connections: u32,

    /// Connection acquire timeout.
    pub acquire_timeout: Duration,

    /// Idle connection timeout.
    pub idle_timeout: Option<Duration>,

    /// Maximum lifetime of a connection.
    pub max_lifetime: Option<Duration>,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            database_url: DEFAULT_DATABASE_URL.to_string(),
            max_connections: 4,
            min_connections: 1,
            acquire_timeout: Duration::from_secs(5),
            idle_timeout: Some(Duration::from_secs(600)),
            max_lifetime: Some(Duration::from_secs(1800)),
        }
    }
}

impl DbConfig {
    /// Configuration for a database file at `url`.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            database_url: url.into(),
            ..Default::default()
        }
    }

    /// A private in-memory database.
    ///
    /// Every SQLite memory connection is its own database, so the pool is
    /// pinned to a single connection that is never recycled.
    pub fn in_memory() -> Self {
        Self {
            database_url: "sqlite::memory:".to_string(),
            max_connections: 1,
            min_connections: 1,
            idle_timeout: None,
            max_lifetime: None,
            ..Default::default()
        }
    }
}

/// An issued reference as stored in the registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuedRecord {
    pub reference: ReferenceCode,
    /// False for references generated while the registry was unreachable.
    pub verified: bool,
    pub issued_at: DateTime<Utc>,
}

impl<'r> sqlx::FromRow<'r, SqliteRow> for IssuedRecord {
    fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
        let text: String = row.try_get("reference")?;
        let reference = ReferenceCode::parse(&text).map_err(|e| sqlx::Error::ColumnDecode {
            index: "reference".to_string(),
            source: Box::new(e),
        })?;

        Ok(Self {
            reference,
            verified: row.try_get("verified")?,
            issued_at: row.try_get("issued_at")?,
        })
    }
}

/// Handle on the registry database.
#[derive(Clone)]
pub struct Registry {
    pool: SqlitePool,
}

impl Registry {
    /// Open the registry, creating the database file if needed.
    pub async fn connect(config: &DbConfig) -> Result<Self, DbError> {
        info!(
            database_url = %config.database_url,
            max_connections = config.max_connections,
            "Opening reference registry"
        );

        let options = SqliteConnectOptions::from_str(&config.database_url)
            .map_err(DbError::Connect)?
            .create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(config.acquire_timeout)
            .idle_timeout(config.idle_timeout)
            .max_lifetime(config.max_lifetime)
            .connect_with(options)
            .await
            .map_err(DbError::Connect)?;

        Ok(Self { pool })
    }

    /// Open the registry and bring its schema up to date.
    pub async fn open(config: &DbConfig) -> Result<Self, DbError> {
        let registry = Self::connect(config).await?;
        registry.run_migrations().await?;
        Ok(registry)
    }

    /// Get a reference to the underlying connection pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Check if the database is reachable.
    pub async fn health_check(&self) -> Result<(), DbError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(DbError::Query)?;
        Ok(())
    }

    /// Run pending migrations.
    pub async fn run_migrations(&self) -> Result<(), DbError> {
        let candidates = vec![
            PathBuf::from("./migrations"),
            PathBuf::from("libs/registry/migrations"),
            PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("migrations"),
        ];
        let mut last_error: Option<sqlx::migrate::MigrateError> = None;

        for dir in &candidates {
            match sqlx::migrate::Migrator::new(dir.clone()).await {
                Ok(migrator) => {
                    debug!(migrations_dir = %dir.display(), "Loaded migrations");
                    migrator.run(&self.pool).await.map_err(DbError::Migration)?;
                    return Ok(());
                }
                Err(e) => {
                    last_error = Some(e);
                }
            }
        }

        let tried = candidates
            .iter()
            .map(|dir| dir.display().to_string())
            .collect::<Vec<_>>()
            .join(", ");

        Err(DbError::MigrationDirNotFound {
            tried,
            last_error: last_error
                .map(|e| e.to_string())
                .unwrap_or_else(|| "unknown error".to_string()),
        })
    }

    /// Record an issued reference.
    ///
    /// Fails with [`DbError::Duplicate`] when the reference or its
    /// (prefix, second, sequence) slot is already taken.
    pub async fn record(&self, code: &ReferenceCode, verified: bool) -> Result<(), DbError> {
        let reference = code.to_string();

        sqlx::query(
            r#"
            INSERT INTO issued_references (
                reference,
                document_type,
                prefix,
                stamp,
                sequence,
                suffix,
                verified,
                issued_at
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
        )
        .bind(&reference)
        .bind(code.document_type().as_str())
        .bind(code.prefix())
        .bind(code.stamp())
        .bind(i64::from(code.sequence().value()))
        .bind(code.suffix().map(|s| s.as_str().to_string()))
        .bind(verified)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db) if db.is_unique_violation() => {
                DbError::Duplicate(reference.clone())
            }
            other => DbError::Query(other),
        })?;

        debug!(reference = %reference, verified, "Recorded reference");
        Ok(())
    }

    /// Look up a live (not retired) reference by its exact text.
    pub async fn find(&self, reference: &str) -> Result<Option<IssuedRecord>, DbError> {
        sqlx::query_as::<_, IssuedRecord>(
            r#"
            SELECT reference, verified, issued_at
            FROM issued_references
            WHERE reference = ?1 AND retired_at IS NULL
            "#,
        )
        .bind(reference)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| decode_error(reference, e))
    }

    /// Most recent references of one document type, newest first.
    pub async fn list(
        &self,
        document_type: DocumentType,
        limit: u32,
    ) -> Result<Vec<IssuedRecord>, DbError> {
        sqlx::query_as::<_, IssuedRecord>(
            r#"
            SELECT reference, verified, issued_at
            FROM issued_references
            WHERE document_type = ?1 AND retired_at IS NULL
            ORDER BY stamp DESC, sequence DESC
            LIMIT ?2
            "#,
        )
        .bind(document_type.as_str())
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| decode_error(document_type.as_str(), e))
    }

    /// References generated without a lookup, oldest first.
    pub async fn unverified(&self) -> Result<Vec<IssuedRecord>, DbError> {
        sqlx::query_as::<_, IssuedRecord>(
            r#"
            SELECT reference, verified, issued_at
            FROM issued_references
            WHERE verified = 0 AND retired_at IS NULL
            ORDER BY issued_at ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| decode_error("unverified", e))
    }

    /// Retire a reference whose owning document was deleted.
    ///
    /// The row is kept as a tombstone so its (prefix, second, sequence)
    /// slot is never handed out again. Returns whether a live reference
    /// was retired.
    pub async fn retire(&self, reference: &str) -> Result<bool, DbError> {
        let result = sqlx::query(
            r#"
            UPDATE issued_references
            SET retired_at = ?2
            WHERE reference = ?1 AND retired_at IS NULL
            "#,
        )
        .bind(reference)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(DbError::Query)?;

        let retired = result.rows_affected() > 0;
        if retired {
            info!(reference = %reference, "Retired reference");
        }
        Ok(retired)
    }
}

fn decode_error(context: &str, err: sqlx::Error) -> DbError {
    match err {
        sqlx::Error::ColumnDecode { source, .. } => DbError::CorruptRow {
            reference: context.to_string(),
            reason: source.to_string(),
        },
        other => DbError::Query(other),
    }
}

#[async_trait]
impl SequenceSource for Registry {
    async fn issued_sequences(&self, bucket: &Bucket) -> Result<BTreeSet<Sequence>, StoreError> {
        let rows: Vec<i64> = sqlx::query_scalar(
            r#"
            SELECT sequence
            FROM issued_references
            WHERE prefix = ?1 AND stamp = ?2
            "#,
        )
        .bind(bucket.prefix())
        .bind(bucket.stamp())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StoreError::from(DbError::Query(e)))?;

        let mut sequences = BTreeSet::new();
        for value in rows {
            match u16::try_from(value).ok().and_then(Sequence::new) {
                Some(sequence) => {
                    sequences.insert(sequence);
                }
                None => {
                    warn!(bucket = %bucket, value, "Ignoring out-of-range sequence in registry");
                }
            }
        }

        Ok(sequences)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_db_config_defaults() {
        let config = DbConfig::default();
        assert_eq!(config.database_url, DEFAULT_DATABASE_URL);
        assert_eq!(config.max_connections, 4);
        assert_eq!(config.min_connections, 1);
    }

    #[test]
    fn test_in_memory_pins_one_connection() {
        let config = DbConfig::in_memory();
        assert_eq!(config.max_connections, 1);
        assert!(config.idle_timeout.is_none());
        assert!(config.max_lifetime.is_none());
    }

    #[test]
    fn test_duplicate_maps_to_store_duplicate() {
        let err: StoreError = DbError::Duplicate("DEV-20250902-143027-0001".into()).into();
        assert!(err.is_duplicate());
    }
}
