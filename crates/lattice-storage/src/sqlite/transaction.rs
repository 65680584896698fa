//! Transaction wrapper for [`SqliteRepository`].

use rusqlite::Connection;

use lattice_core::annotation::{Label, Tag};
use lattice_core::document::Document;
use lattice_core::index::IndexEntry;
use lattice_core::schema::{Schema, SchemaElement};

use crate::error::{Result, StorageError};
use crate::sqlite::store::SqliteRepository;
use crate::sqlite::{annotations, documents, indexes, schemas};
use crate::traits::RepositoryTx;

/// A thin wrapper around a SQLite connection that is inside a
/// transaction. Delegates to the same connection-level helpers used by
/// [`SqliteRepository`].
pub(crate) struct SqliteTx<'a> {
    pub(crate) conn: &'a Connection,
}

impl RepositoryTx for SqliteTx<'_> {
    fn insert_document(&self, document: &Document) -> Result<()> {
        documents::insert_document_on_conn(self.conn, document)
    }

    fn delete_document(&self, id: &str) -> Result<()> {
        documents::delete_document_on_conn(self.conn, id)
    }

    fn find_schema_by_hash(&self, hash: &str) -> Result<Option<Schema>> {
        schemas::find_schema_by_hash_on_conn(self.conn, hash)
    }

    fn insert_schema(&self, schema: &Schema, elements: &[SchemaElement]) -> Result<()> {
        schemas::insert_schema_on_conn(self.conn, schema, elements)
    }

    fn insert_index_entries(&self, table_name: &str, entries: &[IndexEntry]) -> Result<()> {
        indexes::insert_entries_on_conn(self.conn, table_name, entries)
    }

    fn delete_index_entries_for_document(
        &self,
        table_name: &str,
        document_id: &str,
    ) -> Result<()> {
        indexes::delete_entries_for_document_on_conn(self.conn, table_name, document_id)
    }

    fn insert_label(&self, label: &Label) -> Result<()> {
        annotations::insert_label_on_conn(self.conn, label)
    }

    fn insert_tag(&self, tag: &Tag) -> Result<()> {
        annotations::insert_tag_on_conn(self.conn, tag)
    }
}

impl SqliteRepository {
    /// Runs a closure inside a database transaction: commit on `Ok`,
    /// rollback (on drop) on `Err`.
    pub fn run_in_transaction_impl(
        &self,
        f: &mut dyn FnMut(&dyn RepositoryTx) -> Result<()>,
    ) -> Result<()> {
        let conn = self.lock_conn()?;
        let tx = conn
            .unchecked_transaction()
            .map_err(|e| StorageError::Transaction(format!("failed to begin: {e}")))?;

        let sqlite_tx = SqliteTx { conn: &tx };
        match f(&sqlite_tx) {
            Ok(()) => {
                tx.commit()
                    .map_err(|e| StorageError::Transaction(format!("failed to commit: {e}")))?;
                Ok(())
            }
            Err(e) => Err(e),
        }
    }
}
