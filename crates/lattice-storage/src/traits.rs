//! Repository and transaction traits -- the capability contract the
//! engine depends on.
//!
//! One method group per entity, plus `run_in_transaction` for the
//! multi-statement spans of ingestion. Concrete backends implement this
//! contract; everything above it stays backend-agnostic. All statements
//! behind these methods are parameterized; the only interpolated
//! identifiers are dynamic index-table names, which are shape-checked
//! first.

use lattice_core::annotation::{Label, Tag};
use lattice_core::collection::Collection;
use lattice_core::constraint::{FieldConstraint, IndexedField};
use lattice_core::document::Document;
use lattice_core::enums::{IndexingMode, SchemaEnforcementMode};
use lattice_core::filter::{ResultOrdering, SearchFilter};
use lattice_core::index::{IndexEntry, IndexTableMapping};
use lattice_core::lock::ObjectLock;
use lattice_core::schema::{Schema, SchemaElement};

use crate::error::Result;

/// Primary persistence interface for lattice metadata.
pub trait Repository: Send + Sync {
    // -- Collections ---------------------------------------------------------

    /// Inserts a collection. Fails with `Conflict` on a duplicate name.
    fn insert_collection(&self, collection: &Collection) -> Result<()>;

    fn get_collection(&self, id: &str) -> Result<Collection>;

    fn get_collection_by_name(&self, name: &str) -> Result<Option<Collection>>;

    fn list_collections(&self) -> Result<Vec<Collection>>;

    /// Deletes the collection row. Constraints, indexed fields and
    /// collection-level annotations cascade; documents must already be
    /// gone.
    fn delete_collection(&self, id: &str) -> Result<()>;

    fn set_schema_enforcement(&self, id: &str, mode: SchemaEnforcementMode) -> Result<()>;

    fn set_indexing_mode(&self, id: &str, mode: IndexingMode) -> Result<()>;

    // -- Documents -----------------------------------------------------------

    /// Inserts a document row. Fails with `Conflict` on a duplicate id.
    fn insert_document(&self, document: &Document) -> Result<()>;

    fn get_document(&self, id: &str) -> Result<Document>;

    fn list_documents(&self, collection_id: &str) -> Result<Vec<Document>>;

    fn collection_document_ids(&self, collection_id: &str) -> Result<Vec<String>>;

    /// Fetches the given documents ordered and paged. `limit = None`
    /// means unbounded.
    fn documents_by_ids(
        &self,
        collection_id: &str,
        ids: &[String],
        ordering: ResultOrdering,
        skip: i64,
        limit: Option<i64>,
    ) -> Result<Vec<Document>>;

    /// Deletes a document row together with its annotations and every
    /// row carrying its id in any dynamic index table.
    fn delete_document(&self, id: &str) -> Result<()>;

    // -- Schemas -------------------------------------------------------------

    fn find_schema_by_hash(&self, hash: &str) -> Result<Option<Schema>>;

    /// Inserts a schema with its elements. Fails with `Conflict` when
    /// the hash already exists (callers re-read and continue with the
    /// winner).
    fn insert_schema(&self, schema: &Schema, elements: &[SchemaElement]) -> Result<()>;

    fn get_schema(&self, id: &str) -> Result<Schema>;

    fn list_schemas(&self) -> Result<Vec<Schema>>;

    fn get_schema_elements(&self, schema_id: &str) -> Result<Vec<SchemaElement>>;

    // -- Field constraints and indexed fields --------------------------------

    /// Replaces the collection's constraint set wholesale.
    fn replace_field_constraints(
        &self,
        collection_id: &str,
        constraints: &[FieldConstraint],
    ) -> Result<()>;

    fn get_field_constraints(&self, collection_id: &str) -> Result<Vec<FieldConstraint>>;

    /// Replaces the collection's indexed-field declarations wholesale.
    fn replace_indexed_fields(
        &self,
        collection_id: &str,
        fields: &[IndexedField],
    ) -> Result<()>;

    fn get_indexed_fields(&self, collection_id: &str) -> Result<Vec<IndexedField>>;

    // -- Labels and tags -----------------------------------------------------

    fn insert_label(&self, label: &Label) -> Result<()>;

    fn insert_tag(&self, tag: &Tag) -> Result<()>;

    fn labels_for_document(&self, document_id: &str) -> Result<Vec<Label>>;

    fn tags_for_document(&self, document_id: &str) -> Result<Vec<Tag>>;

    fn document_ids_with_label(&self, collection_id: &str, label: &str) -> Result<Vec<String>>;

    fn document_ids_with_tag(
        &self,
        collection_id: &str,
        key: &str,
        value: &str,
    ) -> Result<Vec<String>>;

    // -- Dynamic index tables ------------------------------------------------

    /// Returns the mapping for `key`, creating the mapping row and the
    /// dynamic table if needed. Idempotent and safe under concurrent
    /// callers (unique-violation + re-read).
    fn ensure_index_table(&self, key: &str) -> Result<IndexTableMapping>;

    /// Drops the mapping and its table atomically.
    fn drop_index_table(&self, key: &str) -> Result<()>;

    fn get_index_mapping(&self, key: &str) -> Result<Option<IndexTableMapping>>;

    fn list_index_mappings(&self) -> Result<Vec<IndexTableMapping>>;

    fn insert_index_entries(&self, table_name: &str, entries: &[IndexEntry]) -> Result<()>;

    fn delete_index_entries_for_document(
        &self,
        table_name: &str,
        document_id: &str,
    ) -> Result<()>;

    /// Deletes every row belonging to the collection's documents from
    /// one dynamic table; returns the number of rows removed.
    fn delete_index_entries_for_collection(
        &self,
        table_name: &str,
        collection_id: &str,
    ) -> Result<u64>;

    /// Distinct ids of the collection's documents with at least one row
    /// in `table_name` satisfying the filter condition.
    fn index_document_ids(
        &self,
        table_name: &str,
        collection_id: &str,
        filter: &SearchFilter,
    ) -> Result<Vec<String>>;

    /// Mappings whose tables currently hold rows for this collection's
    /// documents.
    fn mappings_with_entries_for_collection(
        &self,
        collection_id: &str,
    ) -> Result<Vec<IndexTableMapping>>;

    /// Whether the dynamic table holds no rows for any collection.
    fn index_table_is_empty(&self, table_name: &str) -> Result<bool>;

    // -- Object locks --------------------------------------------------------

    /// Attempts to claim `(collection, document name)`. An existing lock
    /// past its expiration window is reclaimed (delete + one retry);
    /// otherwise fails with [`StorageError::Locked`].
    fn try_acquire_lock(
        &self,
        collection_id: &str,
        document_name: &str,
        hostname: &str,
        expiration_seconds: i64,
    ) -> Result<ObjectLock>;

    /// Deletes a lock by id. Deleting an absent lock is not an error.
    fn release_lock(&self, lock_id: &str) -> Result<()>;

    /// Removes every lock past the expiration window; returns the count.
    fn delete_expired_locks(&self, expiration_seconds: i64) -> Result<u64>;

    // -- Transactions --------------------------------------------------------

    /// Executes a closure within a database transaction: commit on
    /// `Ok`, rollback on `Err`.
    fn run_in_transaction(
        &self,
        f: &mut dyn FnMut(&dyn RepositoryTx) -> Result<()>,
    ) -> Result<()>;
}

/// Subset of [`Repository`] available inside a transaction. Covers the
/// two transactional spans of ingestion: schema dedup + document insert,
/// and index/annotation population.
pub trait RepositoryTx {
    fn insert_document(&self, document: &Document) -> Result<()>;
    fn delete_document(&self, id: &str) -> Result<()>;
    fn find_schema_by_hash(&self, hash: &str) -> Result<Option<Schema>>;
    fn insert_schema(&self, schema: &Schema, elements: &[SchemaElement]) -> Result<()>;
    fn insert_index_entries(&self, table_name: &str, entries: &[IndexEntry]) -> Result<()>;
    fn delete_index_entries_for_document(
        &self,
        table_name: &str,
        document_id: &str,
    ) -> Result<()>;
    fn insert_label(&self, label: &Label) -> Result<()>;
    fn insert_tag(&self, tag: &Tag) -> Result<()>;
}
