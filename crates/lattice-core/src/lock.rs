//! Named object locks.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::idgen;

/// A TTL-bounded claim on a `(collection, document name)` pair, held by
/// one host for the duration of an ingestion. The backing table is
/// unique on `(collection_id, document_name)` and is the only
/// cross-process coordination primitive in the system.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectLock {
    pub id: String,
    pub collection_id: String,
    pub document_name: String,
    pub hostname: String,
    pub created_utc: DateTime<Utc>,
}

impl ObjectLock {
    pub fn new(
        collection_id: impl Into<String>,
        document_name: impl Into<String>,
        hostname: impl Into<String>,
    ) -> Self {
        Self {
            id: idgen::lock_id(),
            collection_id: collection_id.into(),
            document_name: document_name.into(),
            hostname: hostname.into(),
            created_utc: Utc::now(),
        }
    }

    /// Whether the lock has outlived the expiration window.
    pub fn is_expired(&self, expiration_seconds: i64, now: DateTime<Utc>) -> bool {
        now.signed_duration_since(self.created_utc).num_seconds() > expiration_seconds
    }
}
