//! Relational repository backend for the lattice document store.
//!
//! Provides the [`Repository`] trait and a SQLite implementation
//! ([`SqliteRepository`]).

pub mod error;
pub mod sqlite;
pub mod traits;

// Re-exports for convenience.
pub use error::StorageError;
pub use sqlite::SqliteRepository;
pub use traits::{Repository, RepositoryTx};

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

impl Repository for SqliteRepository {
    fn insert_collection(&self, collection: &Collection) -> Result<()> {
        self.insert_collection_impl(collection)
    }

    fn get_collection(&self, id: &str) -> Result<Collection> {
        self.get_collection_impl(id)
    }

    fn get_collection_by_name(&self, name: &str) -> Result<Option<Collection>> {
        self.get_collection_by_name_impl(name)
    }

    fn list_collections(&self) -> Result<Vec<Collection>> {
        self.list_collections_impl()
    }

    fn delete_collection(&self, id: &str) -> Result<()> {
        self.delete_collection_impl(id)
    }

    fn set_schema_enforcement(&self, id: &str, mode: SchemaEnforcementMode) -> Result<()> {
        self.set_schema_enforcement_impl(id, mode)
    }

    fn set_indexing_mode(&self, id: &str, mode: IndexingMode) -> Result<()> {
        self.set_indexing_mode_impl(id, mode)
    }

    fn insert_document(&self, document: &Document) -> Result<()> {
        self.insert_document_impl(document)
    }

    fn get_document(&self, id: &str) -> Result<Document> {
        self.get_document_impl(id)
    }

    fn list_documents(&self, collection_id: &str) -> Result<Vec<Document>> {
        self.list_documents_impl(collection_id)
    }

    fn collection_document_ids(&self, collection_id: &str) -> Result<Vec<String>> {
        self.collection_document_ids_impl(collection_id)
    }

    fn documents_by_ids(
        &self,
        collection_id: &str,
        ids: &[String],
        ordering: ResultOrdering,
        skip: i64,
        limit: Option<i64>,
    ) -> Result<Vec<Document>> {
        self.documents_by_ids_impl(collection_id, ids, ordering, skip, limit)
    }

    fn delete_document(&self, id: &str) -> Result<()> {
        self.delete_document_impl(id)
    }

    fn find_schema_by_hash(&self, hash: &str) -> Result<Option<Schema>> {
        self.find_schema_by_hash_impl(hash)
    }

    fn insert_schema(&self, schema: &Schema, elements: &[SchemaElement]) -> Result<()> {
        self.insert_schema_impl(schema, elements)
    }

    fn get_schema(&self, id: &str) -> Result<Schema> {
        self.get_schema_impl(id)
    }

    fn list_schemas(&self) -> Result<Vec<Schema>> {
        self.list_schemas_impl()
    }

    fn get_schema_elements(&self, schema_id: &str) -> Result<Vec<SchemaElement>> {
        self.get_schema_elements_impl(schema_id)
    }

    fn replace_field_constraints(
        &self,
        collection_id: &str,
        constraints: &[FieldConstraint],
    ) -> Result<()> {
        self.replace_field_constraints_impl(collection_id, constraints)
    }

    fn get_field_constraints(&self, collection_id: &str) -> Result<Vec<FieldConstraint>> {
        self.get_field_constraints_impl(collection_id)
    }

    fn replace_indexed_fields(
        &self,
        collection_id: &str,
        fields: &[IndexedField],
    ) -> Result<()> {
        self.replace_indexed_fields_impl(collection_id, fields)
    }

    fn get_indexed_fields(&self, collection_id: &str) -> Result<Vec<IndexedField>> {
        self.get_indexed_fields_impl(collection_id)
    }

    fn insert_label(&self, label: &Label) -> Result<()> {
        self.insert_label_impl(label)
    }

    fn insert_tag(&self, tag: &Tag) -> Result<()> {
        self.insert_tag_impl(tag)
    }

    fn labels_for_document(&self, document_id: &str) -> Result<Vec<Label>> {
        self.labels_for_document_impl(document_id)
    }

    fn tags_for_document(&self, document_id: &str) -> Result<Vec<Tag>> {
        self.tags_for_document_impl(document_id)
    }

    fn document_ids_with_label(&self, collection_id: &str, label: &str) -> Result<Vec<String>> {
        self.document_ids_with_label_impl(collection_id, label)
    }

    fn document_ids_with_tag(
        &self,
        collection_id: &str,
        key: &str,
        value: &str,
    ) -> Result<Vec<String>> {
        self.document_ids_with_tag_impl(collection_id, key, value)
    }

    fn ensure_index_table(&self, key: &str) -> Result<IndexTableMapping> {
        self.ensure_index_table_impl(key)
    }

    fn drop_index_table(&self, key: &str) -> Result<()> {
        self.drop_index_table_impl(key)
    }

    fn get_index_mapping(&self, key: &str) -> Result<Option<IndexTableMapping>> {
        self.get_index_mapping_impl(key)
    }

    fn list_index_mappings(&self) -> Result<Vec<IndexTableMapping>> {
        self.list_index_mappings_impl()
    }

    fn insert_index_entries(&self, table_name: &str, entries: &[IndexEntry]) -> Result<()> {
        self.insert_index_entries_impl(table_name, entries)
    }

    fn delete_index_entries_for_document(
        &self,
        table_name: &str,
        document_id: &str,
    ) -> Result<()> {
        self.delete_index_entries_for_document_impl(table_name, document_id)
    }

    fn delete_index_entries_for_collection(
        &self,
        table_name: &str,
        collection_id: &str,
    ) -> Result<u64> {
        self.delete_index_entries_for_collection_impl(table_name, collection_id)
    }

    fn index_document_ids(
        &self,
        table_name: &str,
        collection_id: &str,
        filter: &SearchFilter,
    ) -> Result<Vec<String>> {
        self.index_document_ids_impl(table_name, collection_id, filter)
    }

    fn mappings_with_entries_for_collection(
        &self,
        collection_id: &str,
    ) -> Result<Vec<IndexTableMapping>> {
        self.mappings_with_entries_for_collection_impl(collection_id)
    }

    fn index_table_is_empty(&self, table_name: &str) -> Result<bool> {
        self.index_table_is_empty_impl(table_name)
    }

    fn try_acquire_lock(
        &self,
        collection_id: &str,
        document_name: &str,
        hostname: &str,
        expiration_seconds: i64,
    ) -> Result<ObjectLock> {
        self.try_acquire_lock_impl(collection_id, document_name, hostname, expiration_seconds)
    }

    fn release_lock(&self, lock_id: &str) -> Result<()> {
        self.release_lock_impl(lock_id)
    }

    fn delete_expired_locks(&self, expiration_seconds: i64) -> Result<u64> {
        self.delete_expired_locks_impl(expiration_seconds)
    }

    fn run_in_transaction(
        &self,
        f: &mut dyn FnMut(&dyn RepositoryTx) -> Result<()>,
    ) -> Result<()> {
        self.run_in_transaction_impl(f)
    }
}
