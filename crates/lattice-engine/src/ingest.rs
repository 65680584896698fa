//! Document ingestion.
//!
//! Orchestrates the full pipeline: name lock, schema extraction and
//! dedup, constraint validation, content hashing, blob persistence,
//! flattening and index population. The metadata row and schema dedup
//! share one transaction; index rows and annotations share a second. A
//! blob-write failure between the two compensates by deleting the
//! metadata row.

use std::collections::BTreeSet;
use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, error, info, warn};

use lattice_core::annotation::{Label, Tag};
use lattice_core::cancel::CancelToken;
use lattice_core::collection::Collection;
use lattice_core::document::Document;
use lattice_core::enums::{IndexingMode, SchemaEnforcementMode};
use lattice_core::flatten::{FlattenedValue, flatten_value};
use lattice_core::index::IndexEntry;
use lattice_core::schema::{Schema, SchemaElement, extract_elements, schema_hash};
use lattice_core::validation::{ValidationIssue, validate_constraints};
use lattice_blob::BlobStore;
use lattice_storage::{Repository, StorageError};

use crate::error::{EngineError, Result, check_cancelled};

/// Runtime options for ingestion.
#[derive(Debug, Clone)]
pub struct IngestOptions {
    /// Whether named ingestions take an object lock.
    pub enable_object_locking: bool,
    /// Seconds after which a foreign lock may be reclaimed.
    pub lock_expiration_seconds: i64,
    /// This host's name, recorded as the lock owner.
    pub hostname: String,
}

impl Default for IngestOptions {
    fn default() -> Self {
        Self {
            enable_object_locking: true,
            lock_expiration_seconds: 30,
            hostname: whoami::fallible::hostname().unwrap_or_else(|_| "unknown".to_owned()),
        }
    }
}

/// One ingestion request.
#[derive(Debug, Clone)]
pub struct IngestRequest {
    pub collection_id: String,
    /// Raw UTF-8 JSON body, stored byte-identical in the blob store.
    pub body: Vec<u8>,
    pub name: Option<String>,
    pub labels: Vec<String>,
    pub tags: Vec<(String, String)>,
}

impl IngestRequest {
    pub fn new(collection_id: impl Into<String>, body: impl Into<Vec<u8>>) -> Self {
        Self {
            collection_id: collection_id.into(),
            body: body.into(),
            name: None,
            labels: Vec::new(),
            tags: Vec::new(),
        }
    }
}

/// The ingested document plus any soft-enforcement warnings.
#[derive(Debug, Clone)]
pub struct IngestOutcome {
    pub document: Document,
    /// Validation errors collected under `Soft` enforcement; empty
    /// otherwise.
    pub warnings: Vec<ValidationIssue>,
}

/// Releases the object lock on every exit path. Release is best-effort;
/// a failure is logged and never replaces the operation's own result.
struct LockGuard {
    repo: Arc<dyn Repository>,
    lock_id: String,
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        if let Err(e) = self.repo.release_lock(&self.lock_id) {
            warn!(lock_id = %self.lock_id, error = %e, "failed to release object lock");
        }
    }
}

/// Document lifecycle service: ingest, read content, delete.
pub struct IngestionService {
    repo: Arc<dyn Repository>,
    blobs: Arc<dyn BlobStore>,
    options: IngestOptions,
}

impl IngestionService {
    pub fn new(
        repo: Arc<dyn Repository>,
        blobs: Arc<dyn BlobStore>,
        options: IngestOptions,
    ) -> Self {
        Self {
            repo,
            blobs,
            options,
        }
    }

    /// Ingests one JSON document into a collection.
    pub fn ingest(&self, request: IngestRequest, cancel: &CancelToken) -> Result<IngestOutcome> {
        let collection = self.repo.get_collection(&request.collection_id)?;
        check_cancelled(cancel)?;

        let _guard = match (&request.name, self.options.enable_object_locking) {
            (Some(name), true) => Some(self.acquire_lock(&collection.id, name)?),
            _ => None,
        };

        let parsed = parse_body(&request.body)?;
        let extracted = extract_elements(&parsed);
        let hash = schema_hash(&extracted);
        let flattened = flatten_value(&parsed);

        // Validation gate per the collection's enforcement mode.
        let mut warnings = Vec::new();
        if collection.schema_enforcement_mode != SchemaEnforcementMode::None {
            let constraints = self.repo.get_field_constraints(&collection.id)?;
            let report = validate_constraints(&flattened, &constraints);
            if !report.ok {
                match collection.schema_enforcement_mode {
                    SchemaEnforcementMode::Strict => {
                        return Err(EngineError::SchemaValidation(report.errors));
                    }
                    SchemaEnforcementMode::Soft => {
                        warn!(
                            collection = %collection.id,
                            errors = report.errors.len(),
                            "soft enforcement: accepting document with validation warnings"
                        );
                        warnings = report.errors;
                    }
                    SchemaEnforcementMode::None => {}
                }
            }
        }
        check_cancelled(cancel)?;

        // Transaction one: schema dedup + document row. Hash equality
        // alone dedupes; a losing concurrent insert re-reads the winner.
        let mut created: Option<Document> = None;
        self.repo.run_in_transaction(&mut |tx| {
            let schema = match tx.find_schema_by_hash(&hash)? {
                Some(schema) => schema,
                None => {
                    let schema = Schema::new(&hash);
                    let elements: Vec<SchemaElement> = extracted
                        .iter()
                        .map(|e| SchemaElement::from_extracted(&schema.id, e))
                        .collect();
                    match tx.insert_schema(&schema, &elements) {
                        Ok(()) => schema,
                        Err(e) if e.is_conflict() => {
                            tx.find_schema_by_hash(&hash)?.ok_or_else(|| {
                                StorageError::Internal(
                                    "schema vanished after conflicting insert".into(),
                                )
                            })?
                        }
                        Err(e) => return Err(e),
                    }
                }
            };

            let document = Document::new(
                &collection.id,
                &schema.id,
                request.name.clone(),
                &request.body,
            );
            tx.insert_document(&document)?;
            created = Some(document);
            Ok(())
        })?;
        let document =
            created.ok_or_else(|| EngineError::Internal("document row was not created".into()))?;

        // Blob write; compensate the metadata row on failure.
        if let Err(e) = self
            .blobs
            .write(&collection.documents_directory, &document.id, &request.body)
        {
            if let Err(cleanup) = self.repo.delete_document(&document.id) {
                error!(
                    document = %document.id,
                    error = %cleanup,
                    "failed to compensate metadata row after blob write failure"
                );
            }
            return Err(e.into());
        }
        check_cancelled(cancel)?;

        // Transaction two: index rows and annotations. Partial rows from
        // a crash here are tolerated; rebuild restores consistency.
        let keys = self.indexable_keys(&collection, &flattened)?;
        let mut tables = Vec::with_capacity(keys.len());
        for key in &keys {
            let mapping = self.repo.ensure_index_table(key)?;
            tables.push((key.clone(), mapping.table_name));
        }

        self.repo.run_in_transaction(&mut |tx| {
            for (key, table) in &tables {
                tx.delete_index_entries_for_document(table, &document.id)?;
                let entries: Vec<IndexEntry> = flattened
                    .iter()
                    .filter(|v| v.key == *key)
                    .map(|v| IndexEntry::new(&document.id, v.position, v.value.clone()))
                    .collect();
                tx.insert_index_entries(table, &entries)?;
            }
            for label in &request.labels {
                tx.insert_label(&Label::for_document(&document.id, label))?;
            }
            for (key, value) in &request.tags {
                tx.insert_tag(&Tag::for_document(&document.id, key, value))?;
            }
            Ok(())
        })?;

        info!(
            collection = %collection.id,
            document = %document.id,
            indexed_keys = keys.len(),
            "document ingested"
        );
        Ok(IngestOutcome { document, warnings })
    }

    /// Reads the raw body bytes of a stored document.
    pub fn read_content(&self, document_id: &str) -> Result<Vec<u8>> {
        let document = self.repo.get_document(document_id)?;
        let collection = self.repo.get_collection(&document.collection_id)?;
        Ok(self
            .blobs
            .read(&collection.documents_directory, &document.id)?)
    }

    /// Deletes a document: metadata row, annotations and index rows
    /// cascade in the repository; the blob unlink tolerates a missing
    /// file.
    pub fn delete(&self, document_id: &str) -> Result<()> {
        let document = self.repo.get_document(document_id)?;
        let collection = self.repo.get_collection(&document.collection_id)?;

        self.repo.delete_document(&document.id)?;
        if let Err(e) = self
            .blobs
            .delete(&collection.documents_directory, &document.id)
        {
            warn!(document = %document.id, error = %e, "failed to unlink blob after delete");
        }
        debug!(document = %document.id, "document deleted");
        Ok(())
    }

    fn acquire_lock(&self, collection_id: &str, document_name: &str) -> Result<LockGuard> {
        match self.repo.try_acquire_lock(
            collection_id,
            document_name,
            &self.options.hostname,
            self.options.lock_expiration_seconds,
        ) {
            Ok(lock) => Ok(LockGuard {
                repo: Arc::clone(&self.repo),
                lock_id: lock.id,
            }),
            Err(StorageError::Locked {
                hostname,
                created_utc,
            }) => Err(EngineError::DocumentLocked {
                collection_id: collection_id.to_owned(),
                document_name: document_name.to_owned(),
                locked_by_hostname: hostname,
                lock_created_utc: created_utc,
            }),
            Err(e) => Err(e.into()),
        }
    }

    /// The set of keys to index for this document under the
    /// collection's indexing mode.
    fn indexable_keys(
        &self,
        collection: &Collection,
        flattened: &[FlattenedValue],
    ) -> Result<Vec<String>> {
        let projection: BTreeSet<&str> = flattened.iter().map(|v| v.key.as_str()).collect();
        let keys = match collection.indexing_mode {
            IndexingMode::None => Vec::new(),
            IndexingMode::All => projection.iter().map(|k| (*k).to_owned()).collect(),
            IndexingMode::Selective => {
                let declared = self.repo.get_indexed_fields(&collection.id)?;
                declared
                    .into_iter()
                    .filter(|f| projection.contains(f.field_path.as_str()))
                    .map(|f| f.field_path)
                    .collect()
            }
        };
        Ok(keys)
    }
}

/// Parses the raw body, rejecting empty, non-UTF-8 and invalid JSON
/// input.
fn parse_body(body: &[u8]) -> Result<Value> {
    let text = std::str::from_utf8(body)
        .map_err(|_| EngineError::invalid_input("document body is not valid UTF-8"))?;
    if text.trim().is_empty() {
        return Err(EngineError::invalid_input("document body is empty"));
    }
    serde_json::from_str(text)
        .map_err(|e| EngineError::invalid_input(format!("document body is not valid JSON: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_body_rejects_empty_and_invalid() {
        assert!(matches!(
            parse_body(b""),
            Err(EngineError::InvalidInput(_))
        ));
        assert!(matches!(
            parse_body(b"   \n"),
            Err(EngineError::InvalidInput(_))
        ));
        assert!(matches!(
            parse_body(b"{broken"),
            Err(EngineError::InvalidInput(_))
        ));
        assert!(matches!(
            parse_body(&[0xFF, 0xFE]),
            Err(EngineError::InvalidInput(_))
        ));
    }

    #[test]
    fn parse_body_accepts_json() {
        let value = parse_body(br#"{"x":1}"#).unwrap();
        assert_eq!(value["x"], 1);
    }
}
