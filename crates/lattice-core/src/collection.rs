//! Collection entity.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::enums::{IndexingMode, SchemaEnforcementMode};
use crate::idgen;

/// A named namespace that owns documents, field constraints,
/// indexed-field declarations and annotations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Collection {
    pub id: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Directory holding one blob file per document id. Relative paths
    /// are resolved against the configured data directory.
    pub documents_directory: String,
    pub schema_enforcement_mode: SchemaEnforcementMode,
    pub indexing_mode: IndexingMode,
    pub created_utc: DateTime<Utc>,
    pub last_update_utc: DateTime<Utc>,
}

impl Collection {
    /// Creates a collection with a fresh id and current timestamps.
    pub fn new(name: impl Into<String>, documents_directory: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: idgen::collection_id(),
            name: name.into(),
            description: None,
            documents_directory: documents_directory.into(),
            schema_enforcement_mode: SchemaEnforcementMode::default(),
            indexing_mode: IndexingMode::default(),
            created_utc: now,
            last_update_utc: now,
        }
    }
}
