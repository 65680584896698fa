//! Document entity.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::idgen;

/// Metadata for one stored JSON body. The body itself lives in the blob
/// store, keyed by `id`. Documents are immutable once ingested; updates
/// are delete-then-ingest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    pub id: String,
    pub collection_id: String,
    pub schema_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Byte count of the canonical UTF-8 body.
    pub content_length: i64,
    /// Lowercase hex SHA-256 of the canonical UTF-8 body.
    pub sha256_hash: String,
    pub created_utc: DateTime<Utc>,
    pub last_update_utc: DateTime<Utc>,
}

impl Document {
    pub fn new(
        collection_id: impl Into<String>,
        schema_id: impl Into<String>,
        name: Option<String>,
        body: &[u8],
    ) -> Self {
        let now = Utc::now();
        Self {
            id: idgen::document_id(),
            collection_id: collection_id.into(),
            schema_id: schema_id.into(),
            name,
            content_length: body.len() as i64,
            sha256_hash: crate::hash::sha256_hex(body),
            created_utc: now,
            last_update_utc: now,
        }
    }
}
