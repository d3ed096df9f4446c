//! Registry error types.

use thiserror::Error;
use we_reference::StoreError;

/// Registry operation errors.
#[derive(Debug, Error)]
pub enum DbError {
    /// Failed to open the database.
    #[error("failed to open reference registry: {0}")]
    Connect(#[source] sqlx::Error),

    /// Failed to execute a query.
    #[error("query failed: {0}")]
    Query(#[source] sqlx::Error),

    /// Failed to run migrations.
    #[error("migration failed: {0}")]
    Migration(#[source] sqlx::migrate::MigrateError),

    /// Migration directory not found in the current environment.
    #[error("migration directory not found; tried {tried}. Last error: {last_error}")]
    MigrationDirNotFound { tried: String, last_error: String },

    /// The reference, or its (prefix, second, sequence) slot, is already taken.
    #[error("reference already issued: {0}")]
    Duplicate(String),

    /// A stored row no longer parses as a reference.
    #[error("corrupt registry row for '{reference}': {reason}")]
    CorruptRow { reference: String, reason: String },
}

impl DbError {
    pub fn is_duplicate(&self) -> bool {
        matches!(self, DbError::Duplicate(_))
    }
}

impl From<DbError> for StoreError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::Duplicate(reference) => StoreError::Duplicate(reference),
            other => StoreError::Unavailable(other.to_string()),
        }
    }
}
