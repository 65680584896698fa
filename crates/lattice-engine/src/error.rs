//! Engine error taxonomy.
//!
//! Storage and blob failures are folded into these variants; the HTTP
//! layer maps each variant to a status code.

use chrono::{DateTime, Utc};

use lattice_core::validation::ValidationIssue;
use lattice_blob::BlobError;
use lattice_storage::StorageError;

/// Errors surfaced by the engine services.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Malformed JSON or missing required request fields.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Unknown collection, document or schema.
    #[error("{entity} not found: {id}")]
    NotFound {
        /// The kind of entity.
        entity: String,
        /// The identifier that was looked up.
        id: String,
    },

    /// Duplicate collection name or document id.
    #[error("{entity} already exists: {detail}")]
    Conflict {
        /// The kind of entity.
        entity: String,
        /// The conflicting value.
        detail: String,
    },

    /// The document name is locked by another ingestion.
    #[error("document {document_name} in {collection_id} is locked by {locked_by_hostname}")]
    DocumentLocked {
        collection_id: String,
        document_name: String,
        locked_by_hostname: String,
        lock_created_utc: DateTime<Utc>,
    },

    /// Strict enforcement rejected the document.
    #[error("schema validation failed with {} error(s)", .0.len())]
    SchemaValidation(Vec<ValidationIssue>),

    /// The operation was cancelled cooperatively.
    #[error("operation cancelled")]
    Cancelled,

    /// Backend or I/O failure.
    #[error("internal error: {0}")]
    Internal(String),
}

/// Convenience alias used throughout the engine crate.
pub type Result<T> = std::result::Result<T, EngineError>;

impl EngineError {
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput(message.into())
    }

    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity: entity.into(),
            id: id.into(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

impl From<StorageError> for EngineError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound { entity, id } => Self::NotFound { entity, id },
            StorageError::Conflict { entity, detail } => Self::Conflict { entity, detail },
            StorageError::Locked {
                hostname,
                created_utc,
            } => Self::DocumentLocked {
                collection_id: String::new(),
                document_name: String::new(),
                locked_by_hostname: hostname,
                lock_created_utc: created_utc,
            },
            other => Self::Internal(other.to_string()),
        }
    }
}

impl From<BlobError> for EngineError {
    fn from(err: BlobError) -> Self {
        match err {
            BlobError::NotFound { id } => Self::NotFound {
                entity: "document content".into(),
                id,
            },
            BlobError::AlreadyExists { id } => Self::Conflict {
                entity: "document content".into(),
                detail: id,
            },
            BlobError::Io(e) => Self::Internal(format!("blob I/O error: {e}")),
        }
    }
}

/// Returns `Err(Cancelled)` when the token has been triggered. Called
/// between the I/O steps of long operations.
pub fn check_cancelled(cancel: &lattice_core::cancel::CancelToken) -> Result<()> {
    if cancel.is_cancelled() {
        Err(EngineError::Cancelled)
    } else {
        Ok(())
    }
}
