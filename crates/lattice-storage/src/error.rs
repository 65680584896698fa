//! Storage error types.

use chrono::{DateTime, Utc};

/// Errors that can occur during repository operations.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// The requested entity was not found.
    #[error("{entity} not found: {id}")]
    NotFound {
        /// The kind of entity (e.g., "collection", "document").
        entity: String,
        /// The identifier that was looked up.
        id: String,
    },

    /// A unique constraint was violated.
    #[error("{entity} already exists: {detail}")]
    Conflict {
        /// The kind of entity.
        entity: String,
        /// The conflicting value.
        detail: String,
    },

    /// A named object lock is held by another owner.
    #[error("object locked by {hostname} since {created_utc}")]
    Locked {
        /// Host that owns the lock.
        hostname: String,
        /// When the lock was created.
        created_utc: DateTime<Utc>,
    },

    /// A dynamic table name did not have the expected shape. Dynamic
    /// names are interpolated into DDL, so this is rejected outright.
    #[error("invalid index table name: {0}")]
    InvalidTableName(String),

    /// Failed to establish or maintain a database connection.
    #[error("connection error: {0}")]
    Connection(String),

    /// A transaction operation failed.
    #[error("transaction error: {0}")]
    Transaction(String),

    /// A schema migration failed.
    #[error("migration {name} failed: {reason}")]
    Migration {
        /// Name of the migration that failed.
        name: String,
        /// Underlying error description.
        reason: String,
    },

    /// A raw SQLite query error.
    #[error("query error: {0}")]
    Query(#[from] rusqlite::Error),

    /// JSON serialization/deserialization failed.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Catch-all for unexpected internal errors.
    #[error("internal error: {0}")]
    Internal(String),
}

/// Convenience alias used throughout the storage crate.
pub type Result<T> = std::result::Result<T, StorageError>;

impl StorageError {
    /// Creates a [`StorageError::NotFound`] for the given entity kind and id.
    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity: entity.into(),
            id: id.into(),
        }
    }

    /// Creates a [`StorageError::Conflict`] for the given entity kind.
    pub fn conflict(entity: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::Conflict {
            entity: entity.into(),
            detail: detail.into(),
        }
    }

    /// Returns `true` if this is a [`StorageError::NotFound`].
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Returns `true` if this is a [`StorageError::Conflict`].
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }
}

/// Returns `true` when the underlying SQLite error is a unique- or
/// primary-key constraint violation (not an FK or CHECK failure, which
/// share the same primary code). Callers use this for the
/// insert-then-reread race pattern on schemas, index mappings and locks.
pub fn is_unique_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _)
            if e.code == rusqlite::ErrorCode::ConstraintViolation
                && (e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
                    || e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY)
    )
}
