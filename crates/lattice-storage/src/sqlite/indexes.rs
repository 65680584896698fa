//! Dynamic index-table management for [`SqliteRepository`].
//!
//! Every indexed flattened key maps to one physical table named
//! `index_<md5(key)>` holding `(id, document_id, position, value,
//! created_utc)` rows. The `indextablemappings` table is the bijection;
//! its unique key column plus `CREATE TABLE IF NOT EXISTS` make
//! concurrent `ensure` calls safe (the losing insert re-reads the
//! winner).

use rusqlite::{Connection, Row, params};
use serde_json::Value;
use tracing::debug;

use lattice_core::filter::{SearchCondition, SearchFilter};
use lattice_core::hash::is_index_table_name;
use lattice_core::index::{IndexEntry, IndexTableMapping};

use crate::error::{Result, StorageError, is_unique_violation};
use crate::sqlite::store::SqliteRepository;
use crate::sqlite::{format_datetime, parse_datetime};

pub(crate) const MAPPING_COLUMNS: &str = "id, key, table_name, created_utc";

fn scan_mapping(row: &Row<'_>) -> rusqlite::Result<IndexTableMapping> {
    let created: String = row.get("created_utc")?;
    Ok(IndexTableMapping {
        id: row.get("id")?,
        key: row.get("key")?,
        table_name: row.get("table_name")?,
        created_utc: parse_datetime(&created),
    })
}

/// Rejects any table name that was not derived via
/// [`lattice_core::hash::index_table_name`]; these names are the only
/// identifiers interpolated into SQL.
fn checked_table_name(table_name: &str) -> Result<&str> {
    if is_index_table_name(table_name) {
        Ok(table_name)
    } else {
        Err(StorageError::InvalidTableName(table_name.to_owned()))
    }
}

fn mapping_by_key(conn: &Connection, key: &str) -> Result<Option<IndexTableMapping>> {
    let sql = format!("SELECT {MAPPING_COLUMNS} FROM indextablemappings WHERE key = ?1");
    match conn.query_row(&sql, params![key], scan_mapping) {
        Ok(mapping) => Ok(Some(mapping)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(StorageError::Query(e)),
    }
}

/// Creates the dynamic table and its indexes. Idempotent.
fn create_dynamic_table(conn: &Connection, table_name: &str) -> Result<()> {
    let table = checked_table_name(table_name)?;
    conn.execute_batch(&format!(
        "CREATE TABLE IF NOT EXISTS {table} (
            id          TEXT PRIMARY KEY,
            document_id TEXT NOT NULL,
            position    INTEGER,
            value       TEXT,
            created_utc TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_{table}_document ON {table}(document_id);
        CREATE INDEX IF NOT EXISTS idx_{table}_position ON {table}(position);
        CREATE INDEX IF NOT EXISTS idx_{table}_created ON {table}(created_utc);
        CREATE INDEX IF NOT EXISTS idx_{table}_document_position ON {table}(document_id, position);"
    ))?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Connection-level helpers (shared with the transaction wrapper)
// ---------------------------------------------------------------------------

pub(crate) fn insert_entries_on_conn(
    conn: &Connection,
    table_name: &str,
    entries: &[IndexEntry],
) -> Result<()> {
    let table = checked_table_name(table_name)?;
    let sql = format!(
        "INSERT INTO {table} (id, document_id, position, value, created_utc)
         VALUES (?1, ?2, ?3, ?4, ?5)"
    );
    let mut stmt = conn.prepare(&sql)?;
    for entry in entries {
        stmt.execute(params![
            entry.id,
            entry.document_id,
            entry.position,
            entry.value,
            format_datetime(&entry.created_utc),
        ])?;
    }
    Ok(())
}

pub(crate) fn delete_entries_for_document_on_conn(
    conn: &Connection,
    table_name: &str,
    document_id: &str,
) -> Result<()> {
    let table = checked_table_name(table_name)?;
    conn.execute(
        &format!("DELETE FROM {table} WHERE document_id = ?1"),
        params![document_id],
    )?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Filter condition -> SQL fragment
// ---------------------------------------------------------------------------

fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => if *b { "true" } else { "false" }.to_owned(),
        other => other.to_string(),
    }
}

fn escape_like(needle: &str) -> String {
    needle
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}

/// Builds the WHERE fragment for one condition over `t.value`, pushing
/// parameters in order.
fn condition_sql(
    filter: &SearchFilter,
    values: &mut Vec<Box<dyn rusqlite::types::ToSql>>,
) -> Result<String> {
    let fragment = match filter.condition {
        SearchCondition::Equals => {
            values.push(Box::new(value_text(&filter.value)));
            "t.value = ?".to_owned()
        }
        SearchCondition::NotEquals => {
            values.push(Box::new(value_text(&filter.value)));
            "t.value IS NOT NULL AND t.value <> ?".to_owned()
        }
        SearchCondition::GreaterThan
        | SearchCondition::GreaterThanOrEqual
        | SearchCondition::LessThan
        | SearchCondition::LessThanOrEqual => {
            let op = match filter.condition {
                SearchCondition::GreaterThan => ">",
                SearchCondition::GreaterThanOrEqual => ">=",
                SearchCondition::LessThan => "<",
                _ => "<=",
            };
            // Numeric literals compare numerically; everything else is a
            // lexicographic text comparison.
            if let Value::Number(n) = &filter.value {
                values.push(Box::new(n.as_f64().unwrap_or_default()));
                format!("t.value IS NOT NULL AND CAST(t.value AS REAL) {op} ?")
            } else {
                values.push(Box::new(value_text(&filter.value)));
                format!("t.value IS NOT NULL AND t.value {op} ?")
            }
        }
        SearchCondition::Contains | SearchCondition::StartsWith | SearchCondition::EndsWith => {
            let needle = escape_like(&value_text(&filter.value));
            let pattern = match filter.condition {
                SearchCondition::Contains => format!("%{needle}%"),
                SearchCondition::StartsWith => format!("{needle}%"),
                _ => format!("%{needle}"),
            };
            values.push(Box::new(pattern));
            "t.value LIKE ? ESCAPE '\\'".to_owned()
        }
        SearchCondition::In | SearchCondition::NotIn => {
            let items: Vec<String> = match &filter.value {
                Value::Array(items) => items.iter().map(value_text).collect(),
                single => vec![value_text(single)],
            };
            if items.is_empty() {
                return Err(StorageError::Internal(
                    "In/NotIn filter requires at least one value".into(),
                ));
            }
            let placeholders = items.iter().map(|_| "?").collect::<Vec<_>>().join(",");
            for item in items {
                values.push(Box::new(item));
            }
            match filter.condition {
                SearchCondition::In => format!("t.value IN ({placeholders})"),
                _ => format!("t.value IS NOT NULL AND t.value NOT IN ({placeholders})"),
            }
        }
        SearchCondition::IsNull => "t.value IS NULL".to_owned(),
        SearchCondition::IsNotNull => "t.value IS NOT NULL".to_owned(),
    };
    Ok(fragment)
}

// ---------------------------------------------------------------------------
// SqliteRepository methods
// ---------------------------------------------------------------------------

impl SqliteRepository {
    /// Returns the mapping for `key`, creating the row and the table on
    /// first use. A losing concurrent insert re-reads the winner; the
    /// DDL itself is idempotent.
    pub fn ensure_index_table_impl(&self, key: &str) -> Result<IndexTableMapping> {
        let conn = self.lock_conn()?;

        if let Some(mapping) = mapping_by_key(&conn, key)? {
            create_dynamic_table(&conn, &mapping.table_name)?;
            return Ok(mapping);
        }

        let mapping = IndexTableMapping::for_key(key);
        let insert = conn.execute(
            &format!("INSERT INTO indextablemappings ({MAPPING_COLUMNS}) VALUES (?1, ?2, ?3, ?4)"),
            params![
                mapping.id,
                mapping.key,
                mapping.table_name,
                format_datetime(&mapping.created_utc),
            ],
        );
        let mapping = match insert {
            Ok(_) => {
                debug!(key, table = %mapping.table_name, "created index table mapping");
                mapping
            }
            Err(e) if is_unique_violation(&e) => mapping_by_key(&conn, key)?.ok_or_else(|| {
                StorageError::Internal(format!("mapping for {key} vanished after conflict"))
            })?,
            Err(e) => return Err(StorageError::Query(e)),
        };

        create_dynamic_table(&conn, &mapping.table_name)?;
        Ok(mapping)
    }

    /// Removes the mapping row and drops the table within one
    /// transaction. Dropping an unmapped key is a no-op.
    pub fn drop_index_table_impl(&self, key: &str) -> Result<()> {
        let conn = self.lock_conn()?;
        let Some(mapping) = mapping_by_key(&conn, key)? else {
            return Ok(());
        };
        let table = checked_table_name(&mapping.table_name)?.to_owned();

        let tx = conn
            .unchecked_transaction()
            .map_err(|e| StorageError::Transaction(format!("failed to begin: {e}")))?;
        tx.execute(
            "DELETE FROM indextablemappings WHERE key = ?1",
            params![key],
        )?;
        tx.execute_batch(&format!("DROP TABLE IF EXISTS {table}"))?;
        tx.commit()
            .map_err(|e| StorageError::Transaction(format!("failed to commit: {e}")))?;
        debug!(key, table = %table, "dropped index table");
        Ok(())
    }

    pub fn get_index_mapping_impl(&self, key: &str) -> Result<Option<IndexTableMapping>> {
        let conn = self.lock_conn()?;
        mapping_by_key(&conn, key)
    }

    pub fn list_index_mappings_impl(&self) -> Result<Vec<IndexTableMapping>> {
        let conn = self.lock_conn()?;
        let sql = format!("SELECT {MAPPING_COLUMNS} FROM indextablemappings ORDER BY key");
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map([], scan_mapping)?;
        let mut mappings = Vec::new();
        for row in rows {
            mappings.push(row?);
        }
        Ok(mappings)
    }

    pub fn insert_index_entries_impl(
        &self,
        table_name: &str,
        entries: &[IndexEntry],
    ) -> Result<()> {
        let conn = self.lock_conn()?;
        insert_entries_on_conn(&conn, table_name, entries)
    }

    pub fn delete_index_entries_for_document_impl(
        &self,
        table_name: &str,
        document_id: &str,
    ) -> Result<()> {
        let conn = self.lock_conn()?;
        delete_entries_for_document_on_conn(&conn, table_name, document_id)
    }

    pub fn delete_index_entries_for_collection_impl(
        &self,
        table_name: &str,
        collection_id: &str,
    ) -> Result<u64> {
        let conn = self.lock_conn()?;
        let table = checked_table_name(table_name)?;
        let affected = conn.execute(
            &format!(
                "DELETE FROM {table} WHERE document_id IN
                 (SELECT id FROM documents WHERE collection_id = ?1)"
            ),
            params![collection_id],
        )?;
        Ok(affected as u64)
    }

    pub fn index_document_ids_impl(
        &self,
        table_name: &str,
        collection_id: &str,
        filter: &SearchFilter,
    ) -> Result<Vec<String>> {
        let conn = self.lock_conn()?;
        let table = checked_table_name(table_name)?;

        let mut values: Vec<Box<dyn rusqlite::types::ToSql>> = Vec::new();
        values.push(Box::new(collection_id.to_owned()));
        let condition = condition_sql(filter, &mut values)?;

        let sql = format!(
            "SELECT DISTINCT t.document_id FROM {table} t
             INNER JOIN documents d ON d.id = t.document_id
             WHERE d.collection_id = ? AND ({condition})"
        );
        let param_refs: Vec<&dyn rusqlite::types::ToSql> =
            values.iter().map(|p| p.as_ref()).collect();

        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(param_refs.as_slice(), |row| row.get::<_, String>(0))?;
        let mut ids = Vec::new();
        for row in rows {
            ids.push(row?);
        }
        Ok(ids)
    }

    pub fn mappings_with_entries_for_collection_impl(
        &self,
        collection_id: &str,
    ) -> Result<Vec<IndexTableMapping>> {
        let mappings = self.list_index_mappings_impl()?;
        let conn = self.lock_conn()?;

        let mut populated = Vec::new();
        for mapping in mappings {
            let table = checked_table_name(&mapping.table_name)?;
            let exists: bool = conn.query_row(
                &format!(
                    "SELECT EXISTS (
                         SELECT 1 FROM {table} t
                         INNER JOIN documents d ON d.id = t.document_id
                         WHERE d.collection_id = ?1
                     )"
                ),
                params![collection_id],
                |row| row.get(0),
            )?;
            if exists {
                populated.push(mapping);
            }
        }
        Ok(populated)
    }

    pub fn index_table_is_empty_impl(&self, table_name: &str) -> Result<bool> {
        let conn = self.lock_conn()?;
        let table = checked_table_name(table_name)?;
        let count: i64 =
            conn.query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| row.get(0))?;
        Ok(count == 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lattice_core::collection::Collection;
    use lattice_core::document::Document;
    use lattice_core::hash::index_table_name;

    fn test_store() -> SqliteRepository {
        SqliteRepository::open_in_memory().unwrap()
    }

    fn store_with_document() -> (SqliteRepository, Collection, Document) {
        let store = test_store();
        let collection = Collection::new("books", "books");
        store.insert_collection_impl(&collection).unwrap();
        let document = Document::new(&collection.id, "sch_x", None, b"{}");
        store.insert_document_impl(&document).unwrap();
        (store, collection, document)
    }

    fn filter(condition: SearchCondition, value: serde_json::Value) -> SearchFilter {
        SearchFilter::new("year", condition, value)
    }

    #[test]
    fn ensure_is_idempotent() {
        let store = test_store();
        let first = store.ensure_index_table_impl("title").unwrap();
        let second = store.ensure_index_table_impl("title").unwrap();
        assert_eq!(first.id, second.id);
        assert_eq!(first.table_name, index_table_name("title"));
        assert_eq!(store.list_index_mappings_impl().unwrap().len(), 1);
    }

    #[test]
    fn entries_round_trip_through_conditions() {
        let (store, collection, document) = store_with_document();
        let mapping = store.ensure_index_table_impl("year").unwrap();
        store
            .insert_index_entries_impl(
                &mapping.table_name,
                &[IndexEntry::new(&document.id, None, Some("1999".into()))],
            )
            .unwrap();

        let hit = store
            .index_document_ids_impl(
                &mapping.table_name,
                &collection.id,
                &filter(SearchCondition::Equals, serde_json::json!(1999)),
            )
            .unwrap();
        assert_eq!(hit, vec![document.id.clone()]);

        let miss = store
            .index_document_ids_impl(
                &mapping.table_name,
                &collection.id,
                &filter(SearchCondition::Equals, serde_json::json!(2000)),
            )
            .unwrap();
        assert!(miss.is_empty());

        let range = store
            .index_document_ids_impl(
                &mapping.table_name,
                &collection.id,
                &filter(SearchCondition::GreaterThan, serde_json::json!(1990)),
            )
            .unwrap();
        assert_eq!(range.len(), 1);
    }

    #[test]
    fn like_conditions_escape_wildcards() {
        let (store, collection, document) = store_with_document();
        let mapping = store.ensure_index_table_impl("title").unwrap();
        store
            .insert_index_entries_impl(
                &mapping.table_name,
                &[IndexEntry::new(&document.id, None, Some("100% rust".into()))],
            )
            .unwrap();

        let contains = store
            .index_document_ids_impl(
                &mapping.table_name,
                &collection.id,
                &SearchFilter::new("title", SearchCondition::Contains, serde_json::json!("100%")),
            )
            .unwrap();
        assert_eq!(contains.len(), 1);

        let miss = store
            .index_document_ids_impl(
                &mapping.table_name,
                &collection.id,
                &SearchFilter::new("title", SearchCondition::StartsWith, serde_json::json!("rust")),
            )
            .unwrap();
        assert!(miss.is_empty());
    }

    #[test]
    fn null_conditions() {
        let (store, collection, document) = store_with_document();
        let mapping = store.ensure_index_table_impl("note").unwrap();
        store
            .insert_index_entries_impl(
                &mapping.table_name,
                &[IndexEntry::new(&document.id, None, None)],
            )
            .unwrap();

        let is_null = store
            .index_document_ids_impl(
                &mapping.table_name,
                &collection.id,
                &SearchFilter::new("note", SearchCondition::IsNull, serde_json::Value::Null),
            )
            .unwrap();
        assert_eq!(is_null.len(), 1);

        let not_null = store
            .index_document_ids_impl(
                &mapping.table_name,
                &collection.id,
                &SearchFilter::new("note", SearchCondition::IsNotNull, serde_json::Value::Null),
            )
            .unwrap();
        assert!(not_null.is_empty());
    }

    #[test]
    fn in_condition() {
        let (store, collection, document) = store_with_document();
        let mapping = store.ensure_index_table_impl("state").unwrap();
        store
            .insert_index_entries_impl(
                &mapping.table_name,
                &[IndexEntry::new(&document.id, None, Some("draft".into()))],
            )
            .unwrap();

        let found = store
            .index_document_ids_impl(
                &mapping.table_name,
                &collection.id,
                &SearchFilter::new(
                    "state",
                    SearchCondition::In,
                    serde_json::json!(["draft", "final"]),
                ),
            )
            .unwrap();
        assert_eq!(found.len(), 1);
    }

    #[test]
    fn drop_removes_mapping_and_table() {
        let store = test_store();
        let mapping = store.ensure_index_table_impl("title").unwrap();
        store.drop_index_table_impl("title").unwrap();

        assert!(store.get_index_mapping_impl("title").unwrap().is_none());
        let conn = store.lock_conn().unwrap();
        let count: i32 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
                params![mapping.table_name],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(count, 0);

        // Dropping again is a no-op.
        store.drop_index_table_impl("title").unwrap();
    }

    #[test]
    fn collection_scoped_deletes_and_emptiness() {
        let (store, collection, document) = store_with_document();
        let mapping = store.ensure_index_table_impl("year").unwrap();
        store
            .insert_index_entries_impl(
                &mapping.table_name,
                &[IndexEntry::new(&document.id, None, Some("1999".into()))],
            )
            .unwrap();

        assert!(!store.index_table_is_empty_impl(&mapping.table_name).unwrap());
        let populated = store
            .mappings_with_entries_for_collection_impl(&collection.id)
            .unwrap();
        assert_eq!(populated.len(), 1);

        let removed = store
            .delete_index_entries_for_collection_impl(&mapping.table_name, &collection.id)
            .unwrap();
        assert_eq!(removed, 1);
        assert!(store.index_table_is_empty_impl(&mapping.table_name).unwrap());
    }

    #[test]
    fn malformed_table_names_rejected() {
        let store = test_store();
        let err = store
            .insert_index_entries_impl("documents", &[])
            .unwrap_err();
        assert!(matches!(err, StorageError::InvalidTableName(_)));
    }
}
