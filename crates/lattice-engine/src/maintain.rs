//! Index rebuild after indexing-policy changes.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use serde::Serialize;
use tracing::{info, warn};

use lattice_core::cancel::CancelToken;
use lattice_core::collection::Collection;
use lattice_core::enums::IndexingMode;
use lattice_core::flatten::flatten_value;
use lattice_core::index::IndexEntry;
use lattice_blob::{BlobError, BlobStore};
use lattice_storage::Repository;

use crate::error::{Result, check_cancelled};

/// Rebuild summary.
#[derive(Debug, Clone, Copy, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RebuildOutcome {
    pub indexes_added: i64,
    pub indexes_dropped: i64,
    pub documents_processed: i64,
}

/// Drops and repopulates per-key index tables so they reflect the
/// collection's current indexing policy. Restartable: re-indexing a
/// document first deletes its rows per affected table.
pub struct IndexMaintenanceService {
    repo: Arc<dyn Repository>,
    blobs: Arc<dyn BlobStore>,
}

impl IndexMaintenanceService {
    pub fn new(repo: Arc<dyn Repository>, blobs: Arc<dyn BlobStore>) -> Self {
        Self { repo, blobs }
    }

    pub fn rebuild(
        &self,
        collection_id: &str,
        drop_unused_indexes: bool,
        cancel: &CancelToken,
    ) -> Result<RebuildOutcome> {
        let collection = self.repo.get_collection(collection_id)?;
        let document_ids = self.repo.collection_document_ids(&collection.id)?;

        let target = self.target_keys(&collection, &document_ids, cancel)?;
        let current: BTreeSet<String> = self
            .repo
            .mappings_with_entries_for_collection(&collection.id)?
            .into_iter()
            .map(|m| m.key)
            .collect();

        // Retire keys no longer indexed. Rows are removed only for this
        // collection; the table itself goes away only once no collection
        // holds rows in it.
        let mut indexes_dropped = 0i64;
        if drop_unused_indexes {
            for key in current.difference(&target) {
                check_cancelled(cancel)?;
                let Some(mapping) = self.repo.get_index_mapping(key)? else {
                    continue;
                };
                self.repo
                    .delete_index_entries_for_collection(&mapping.table_name, &collection.id)?;
                if self.repo.index_table_is_empty(&mapping.table_name)? {
                    self.repo.drop_index_table(key)?;
                }
                indexes_dropped += 1;
            }
        }

        // Provision tables for every target key.
        let indexes_added = target.difference(&current).count() as i64;
        let mut tables: BTreeMap<String, String> = BTreeMap::new();
        for key in &target {
            let mapping = self.repo.ensure_index_table(key)?;
            tables.insert(key.clone(), mapping.table_name);
        }

        // Repopulate from stored blobs, one transaction per document.
        let mut documents_processed = 0i64;
        for document_id in &document_ids {
            check_cancelled(cancel)?;
            let Some(flattened) = self.flatten_blob(&collection, document_id)? else {
                continue;
            };

            let mut per_key: BTreeMap<&str, Vec<IndexEntry>> = BTreeMap::new();
            for value in &flattened {
                if let Some((key, _)) = tables.get_key_value(value.key.as_str()) {
                    per_key.entry(key.as_str()).or_default().push(IndexEntry::new(
                        document_id,
                        value.position,
                        value.value.clone(),
                    ));
                }
            }

            self.repo.run_in_transaction(&mut |tx| {
                for (key, entries) in &per_key {
                    let table = &tables[*key];
                    tx.delete_index_entries_for_document(table, document_id)?;
                    tx.insert_index_entries(table, entries)?;
                }
                Ok(())
            })?;
            documents_processed += 1;
        }

        let outcome = RebuildOutcome {
            indexes_added,
            indexes_dropped,
            documents_processed,
        };
        info!(
            collection = %collection.id,
            added = indexes_added,
            dropped = indexes_dropped,
            documents = documents_processed,
            "index rebuild complete"
        );
        Ok(outcome)
    }

    /// The target key set under the collection's current policy. Mode
    /// `All` derives it from the stored documents themselves.
    fn target_keys(
        &self,
        collection: &Collection,
        document_ids: &[String],
        cancel: &CancelToken,
    ) -> Result<BTreeSet<String>> {
        match collection.indexing_mode {
            IndexingMode::None => Ok(BTreeSet::new()),
            IndexingMode::Selective => Ok(self
                .repo
                .get_indexed_fields(&collection.id)?
                .into_iter()
                .map(|f| f.field_path)
                .collect()),
            IndexingMode::All => {
                let mut keys = BTreeSet::new();
                for document_id in document_ids {
                    check_cancelled(cancel)?;
                    if let Some(flattened) = self.flatten_blob(collection, document_id)? {
                        keys.extend(flattened.into_iter().map(|v| v.key));
                    }
                }
                Ok(keys)
            }
        }
    }

    /// Reads and flattens one stored blob. A missing or unparseable
    /// blob is skipped with a warning; rebuild keeps going.
    fn flatten_blob(
        &self,
        collection: &Collection,
        document_id: &str,
    ) -> Result<Option<Vec<lattice_core::flatten::FlattenedValue>>> {
        let bytes = match self
            .blobs
            .read(&collection.documents_directory, document_id)
        {
            Ok(bytes) => bytes,
            Err(BlobError::NotFound { .. }) => {
                warn!(document = %document_id, "blob missing during rebuild, skipping");
                return Ok(None);
            }
            Err(e) => return Err(e.into()),
        };
        match serde_json::from_slice(&bytes) {
            Ok(value) => Ok(Some(flatten_value(&value))),
            Err(e) => {
                warn!(document = %document_id, error = %e, "stored blob is not valid JSON, skipping");
                Ok(None)
            }
        }
    }
}
