//! Collection CRUD operations for [`SqliteRepository`].

use chrono::Utc;
use rusqlite::{Connection, Row, params};

use lattice_core::collection::Collection;
use lattice_core::enums::{IndexingMode, SchemaEnforcementMode};

use crate::error::{Result, StorageError, is_unique_violation};
use crate::sqlite::store::SqliteRepository;
use crate::sqlite::{format_datetime, parse_datetime};

/// All collection columns in a deterministic order for SELECT queries.
pub(crate) const COLLECTION_COLUMNS: &str = "\
    id, name, description, documents_directory, \
    schema_enforcement_mode, indexing_mode, created_utc, last_update_utc";

/// Deserialises a row into a [`Collection`]. The column order MUST
/// match [`COLLECTION_COLUMNS`].
pub(crate) fn scan_collection(row: &Row<'_>) -> rusqlite::Result<Collection> {
    let enforcement: String = row.get("schema_enforcement_mode")?;
    let indexing: String = row.get("indexing_mode")?;
    let created: String = row.get("created_utc")?;
    let updated: String = row.get("last_update_utc")?;

    Ok(Collection {
        id: row.get("id")?,
        name: row.get("name")?,
        description: row.get("description")?,
        documents_directory: row.get("documents_directory")?,
        schema_enforcement_mode: SchemaEnforcementMode::parse(&enforcement).unwrap_or_default(),
        indexing_mode: IndexingMode::parse(&indexing).unwrap_or_default(),
        created_utc: parse_datetime(&created),
        last_update_utc: parse_datetime(&updated),
    })
}

pub(crate) fn get_collection_on_conn(conn: &Connection, id: &str) -> Result<Collection> {
    let sql = format!("SELECT {COLLECTION_COLUMNS} FROM collections WHERE id = ?1");
    conn.query_row(&sql, params![id], scan_collection)
        .map_err(|e| match e {
            rusqlite::Error::QueryReturnedNoRows => StorageError::not_found("collection", id),
            other => StorageError::Query(other),
        })
}

impl SqliteRepository {
    pub fn insert_collection_impl(&self, collection: &Collection) -> Result<()> {
        let conn = self.lock_conn()?;
        conn.execute(
            &format!(
                "INSERT INTO collections ({COLLECTION_COLUMNS})
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)"
            ),
            params![
                collection.id,
                collection.name,
                collection.description,
                collection.documents_directory,
                collection.schema_enforcement_mode.as_str(),
                collection.indexing_mode.as_str(),
                format_datetime(&collection.created_utc),
                format_datetime(&collection.last_update_utc),
            ],
        )
        .map_err(|e| {
            if is_unique_violation(&e) {
                StorageError::conflict("collection", collection.name.clone())
            } else {
                StorageError::Query(e)
            }
        })?;
        Ok(())
    }

    pub fn get_collection_impl(&self, id: &str) -> Result<Collection> {
        let conn = self.lock_conn()?;
        get_collection_on_conn(&conn, id)
    }

    pub fn get_collection_by_name_impl(&self, name: &str) -> Result<Option<Collection>> {
        let conn = self.lock_conn()?;
        let sql = format!("SELECT {COLLECTION_COLUMNS} FROM collections WHERE name = ?1");
        match conn.query_row(&sql, params![name], scan_collection) {
            Ok(collection) => Ok(Some(collection)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(StorageError::Query(e)),
        }
    }

    pub fn list_collections_impl(&self) -> Result<Vec<Collection>> {
        let conn = self.lock_conn()?;
        let sql = format!("SELECT {COLLECTION_COLUMNS} FROM collections ORDER BY created_utc, id");
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map([], scan_collection)?;
        let mut collections = Vec::new();
        for row in rows {
            collections.push(row?);
        }
        Ok(collections)
    }

    pub fn delete_collection_impl(&self, id: &str) -> Result<()> {
        let conn = self.lock_conn()?;
        let affected = conn.execute("DELETE FROM collections WHERE id = ?1", params![id])?;
        if affected == 0 {
            return Err(StorageError::not_found("collection", id));
        }
        Ok(())
    }

    pub fn set_schema_enforcement_impl(
        &self,
        id: &str,
        mode: SchemaEnforcementMode,
    ) -> Result<()> {
        self.update_collection_column(id, "schema_enforcement_mode", mode.as_str())
    }

    pub fn set_indexing_mode_impl(&self, id: &str, mode: IndexingMode) -> Result<()> {
        self.update_collection_column(id, "indexing_mode", mode.as_str())
    }

    fn update_collection_column(&self, id: &str, column: &str, value: &str) -> Result<()> {
        let conn = self.lock_conn()?;
        let now = format_datetime(&Utc::now());
        let affected = conn.execute(
            &format!("UPDATE collections SET {column} = ?1, last_update_utc = ?2 WHERE id = ?3"),
            params![value, now, id],
        )?;
        if affected == 0 {
            return Err(StorageError::not_found("collection", id));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_store() -> SqliteRepository {
        SqliteRepository::open_in_memory().unwrap()
    }

    #[test]
    fn insert_and_get() {
        let store = test_store();
        let collection = Collection::new("books", "books");
        store.insert_collection_impl(&collection).unwrap();

        let loaded = store.get_collection_impl(&collection.id).unwrap();
        assert_eq!(loaded.name, "books");
        assert_eq!(loaded.indexing_mode, IndexingMode::All);
    }

    #[test]
    fn duplicate_name_conflicts() {
        let store = test_store();
        store
            .insert_collection_impl(&Collection::new("books", "a"))
            .unwrap();
        let err = store
            .insert_collection_impl(&Collection::new("books", "b"))
            .unwrap_err();
        assert!(err.is_conflict());
    }

    #[test]
    fn lookup_by_name() {
        let store = test_store();
        let collection = Collection::new("reports", "reports");
        store.insert_collection_impl(&collection).unwrap();

        let found = store.get_collection_by_name_impl("reports").unwrap();
        assert_eq!(found.map(|c| c.id), Some(collection.id));
        assert!(store.get_collection_by_name_impl("missing").unwrap().is_none());
    }

    #[test]
    fn mode_updates_bump_last_update() {
        let store = test_store();
        let collection = Collection::new("books", "books");
        store.insert_collection_impl(&collection).unwrap();

        store
            .set_schema_enforcement_impl(&collection.id, SchemaEnforcementMode::Strict)
            .unwrap();
        store
            .set_indexing_mode_impl(&collection.id, IndexingMode::Selective)
            .unwrap();

        let loaded = store.get_collection_impl(&collection.id).unwrap();
        assert_eq!(loaded.schema_enforcement_mode, SchemaEnforcementMode::Strict);
        assert_eq!(loaded.indexing_mode, IndexingMode::Selective);
        assert!(loaded.last_update_utc >= loaded.created_utc);
    }

    #[test]
    fn delete_missing_is_not_found() {
        let store = test_store();
        assert!(store.delete_collection_impl("col_missing").unwrap_err().is_not_found());
    }
}
