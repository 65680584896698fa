//! Document CRUD operations for [`SqliteRepository`].

use rusqlite::{Connection, Row, params};

use lattice_core::document::Document;
use lattice_core::filter::ResultOrdering;

use crate::error::{Result, StorageError, is_unique_violation};
use crate::sqlite::store::SqliteRepository;
use crate::sqlite::{format_datetime, parse_datetime};

/// All document columns in a deterministic order for SELECT queries.
pub(crate) const DOCUMENT_COLUMNS: &str = "\
    id, collection_id, schema_id, name, content_length, sha256_hash, \
    created_utc, last_update_utc";

/// Deserialises a row into a [`Document`]. The column order MUST match
/// [`DOCUMENT_COLUMNS`].
pub(crate) fn scan_document(row: &Row<'_>) -> rusqlite::Result<Document> {
    let created: String = row.get("created_utc")?;
    let updated: String = row.get("last_update_utc")?;
    Ok(Document {
        id: row.get("id")?,
        collection_id: row.get("collection_id")?,
        schema_id: row.get("schema_id")?,
        name: row.get("name")?,
        content_length: row.get("content_length")?,
        sha256_hash: row.get("sha256_hash")?,
        created_utc: parse_datetime(&created),
        last_update_utc: parse_datetime(&updated),
    })
}

// ---------------------------------------------------------------------------
// Connection-level helpers (shared with the transaction wrapper)
// ---------------------------------------------------------------------------

pub(crate) fn insert_document_on_conn(conn: &Connection, document: &Document) -> Result<()> {
    conn.execute(
        &format!(
            "INSERT INTO documents ({DOCUMENT_COLUMNS})
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)"
        ),
        params![
            document.id,
            document.collection_id,
            document.schema_id,
            document.name,
            document.content_length,
            document.sha256_hash,
            format_datetime(&document.created_utc),
            format_datetime(&document.last_update_utc),
        ],
    )
    .map_err(|e| {
        if is_unique_violation(&e) {
            StorageError::conflict("document", document.id.clone())
        } else {
            StorageError::Query(e)
        }
    })?;
    Ok(())
}

pub(crate) fn get_document_on_conn(conn: &Connection, id: &str) -> Result<Document> {
    let sql = format!("SELECT {DOCUMENT_COLUMNS} FROM documents WHERE id = ?1");
    conn.query_row(&sql, params![id], scan_document)
        .map_err(|e| match e {
            rusqlite::Error::QueryReturnedNoRows => StorageError::not_found("document", id),
            other => StorageError::Query(other),
        })
}

/// Deletes a document row together with its annotations and every row
/// in any dynamic index table carrying its id. Annotations cascade via
/// foreign keys; dynamic tables are purged explicitly since they carry
/// no FK.
pub(crate) fn delete_document_on_conn(conn: &Connection, id: &str) -> Result<()> {
    let tables: Vec<String> = {
        let mut stmt = conn.prepare("SELECT table_name FROM indextablemappings")?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
        let mut tables = Vec::new();
        for row in rows {
            tables.push(row?);
        }
        tables
    };
    for table in tables {
        crate::sqlite::indexes::delete_entries_for_document_on_conn(conn, &table, id)?;
    }

    let affected = conn.execute("DELETE FROM documents WHERE id = ?1", params![id])?;
    if affected == 0 {
        return Err(StorageError::not_found("document", id));
    }
    Ok(())
}

fn ordering_sql(ordering: ResultOrdering) -> &'static str {
    match ordering {
        ResultOrdering::CreatedAscending => "created_utc ASC, id ASC",
        ResultOrdering::CreatedDescending => "created_utc DESC, id DESC",
        ResultOrdering::Name => "name ASC, id ASC",
        ResultOrdering::Size => "content_length DESC, id ASC",
    }
}

// ---------------------------------------------------------------------------
// SqliteRepository methods
// ---------------------------------------------------------------------------

impl SqliteRepository {
    pub fn insert_document_impl(&self, document: &Document) -> Result<()> {
        let conn = self.lock_conn()?;
        insert_document_on_conn(&conn, document)
    }

    pub fn get_document_impl(&self, id: &str) -> Result<Document> {
        let conn = self.lock_conn()?;
        get_document_on_conn(&conn, id)
    }

    pub fn list_documents_impl(&self, collection_id: &str) -> Result<Vec<Document>> {
        let conn = self.lock_conn()?;
        let sql = format!(
            "SELECT {DOCUMENT_COLUMNS} FROM documents
             WHERE collection_id = ?1
             ORDER BY created_utc, id"
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params![collection_id], scan_document)?;
        let mut documents = Vec::new();
        for row in rows {
            documents.push(row?);
        }
        Ok(documents)
    }

    pub fn collection_document_ids_impl(&self, collection_id: &str) -> Result<Vec<String>> {
        let conn = self.lock_conn()?;
        let mut stmt =
            conn.prepare("SELECT id FROM documents WHERE collection_id = ?1 ORDER BY id")?;
        let rows = stmt.query_map(params![collection_id], |row| row.get::<_, String>(0))?;
        let mut ids = Vec::new();
        for row in rows {
            ids.push(row?);
        }
        Ok(ids)
    }

    pub fn documents_by_ids_impl(
        &self,
        collection_id: &str,
        ids: &[String],
        ordering: ResultOrdering,
        skip: i64,
        limit: Option<i64>,
    ) -> Result<Vec<Document>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let conn = self.lock_conn()?;
        let placeholders = ids.iter().map(|_| "?").collect::<Vec<_>>().join(",");
        let sql = format!(
            "SELECT {DOCUMENT_COLUMNS} FROM documents
             WHERE collection_id = ? AND id IN ({placeholders})
             ORDER BY {}
             LIMIT ? OFFSET ?",
            ordering_sql(ordering)
        );

        let mut values: Vec<Box<dyn rusqlite::types::ToSql>> = Vec::new();
        values.push(Box::new(collection_id.to_owned()));
        for id in ids {
            values.push(Box::new(id.clone()));
        }
        // LIMIT -1 means unbounded in SQLite.
        values.push(Box::new(limit.unwrap_or(-1)));
        values.push(Box::new(skip.max(0)));

        let param_refs: Vec<&dyn rusqlite::types::ToSql> =
            values.iter().map(|p| p.as_ref()).collect();

        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(param_refs.as_slice(), scan_document)?;
        let mut documents = Vec::new();
        for row in rows {
            documents.push(row?);
        }
        Ok(documents)
    }

    pub fn delete_document_impl(&self, id: &str) -> Result<()> {
        let conn = self.lock_conn()?;
        delete_document_on_conn(&conn, id)
    }
}
