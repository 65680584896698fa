//! Schema and schema-element operations for [`SqliteRepository`].
//!
//! Schemas are content-addressed by their hash; insertion races are
//! resolved by the caller re-reading after a `Conflict`.

use rusqlite::{Connection, Row, params};

use lattice_core::schema::{Schema, SchemaElement};

use crate::error::{Result, StorageError, is_unique_violation};
use crate::sqlite::store::SqliteRepository;
use crate::sqlite::{format_datetime, parse_datetime};

pub(crate) const SCHEMA_COLUMNS: &str = "id, name, hash, created_utc, last_update_utc";

pub(crate) const ELEMENT_COLUMNS: &str =
    "id, schema_id, position, key, data_type, nullable, created_utc, last_update_utc";

pub(crate) fn scan_schema(row: &Row<'_>) -> rusqlite::Result<Schema> {
    let created: String = row.get("created_utc")?;
    let updated: String = row.get("last_update_utc")?;
    Ok(Schema {
        id: row.get("id")?,
        name: row.get("name")?,
        hash: row.get("hash")?,
        created_utc: parse_datetime(&created),
        last_update_utc: parse_datetime(&updated),
    })
}

pub(crate) fn scan_element(row: &Row<'_>) -> rusqlite::Result<SchemaElement> {
    let nullable: i32 = row.get("nullable")?;
    let created: String = row.get("created_utc")?;
    let updated: String = row.get("last_update_utc")?;
    Ok(SchemaElement {
        id: row.get("id")?,
        schema_id: row.get("schema_id")?,
        position: row.get("position")?,
        key: row.get("key")?,
        data_type: row.get("data_type")?,
        nullable: nullable != 0,
        created_utc: parse_datetime(&created),
        last_update_utc: parse_datetime(&updated),
    })
}

// ---------------------------------------------------------------------------
// Connection-level helpers (shared with the transaction wrapper)
// ---------------------------------------------------------------------------

pub(crate) fn find_schema_by_hash_on_conn(
    conn: &Connection,
    hash: &str,
) -> Result<Option<Schema>> {
    let sql = format!("SELECT {SCHEMA_COLUMNS} FROM schemas WHERE hash = ?1");
    match conn.query_row(&sql, params![hash], scan_schema) {
        Ok(schema) => Ok(Some(schema)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(StorageError::Query(e)),
    }
}

pub(crate) fn insert_schema_on_conn(
    conn: &Connection,
    schema: &Schema,
    elements: &[SchemaElement],
) -> Result<()> {
    conn.execute(
        &format!("INSERT INTO schemas ({SCHEMA_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5)"),
        params![
            schema.id,
            schema.name,
            schema.hash,
            format_datetime(&schema.created_utc),
            format_datetime(&schema.last_update_utc),
        ],
    )
    .map_err(|e| {
        if is_unique_violation(&e) {
            StorageError::conflict("schema", schema.hash.clone())
        } else {
            StorageError::Query(e)
        }
    })?;

    for element in elements {
        conn.execute(
            &format!(
                "INSERT INTO schemaelements ({ELEMENT_COLUMNS})
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)"
            ),
            params![
                element.id,
                element.schema_id,
                element.position,
                element.key,
                element.data_type,
                element.nullable as i32,
                format_datetime(&element.created_utc),
                format_datetime(&element.last_update_utc),
            ],
        )?;
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// SqliteRepository methods
// ---------------------------------------------------------------------------

impl SqliteRepository {
    pub fn find_schema_by_hash_impl(&self, hash: &str) -> Result<Option<Schema>> {
        let conn = self.lock_conn()?;
        find_schema_by_hash_on_conn(&conn, hash)
    }

    pub fn insert_schema_impl(&self, schema: &Schema, elements: &[SchemaElement]) -> Result<()> {
        let conn = self.lock_conn()?;
        insert_schema_on_conn(&conn, schema, elements)
    }

    pub fn get_schema_impl(&self, id: &str) -> Result<Schema> {
        let conn = self.lock_conn()?;
        let sql = format!("SELECT {SCHEMA_COLUMNS} FROM schemas WHERE id = ?1");
        conn.query_row(&sql, params![id], scan_schema)
            .map_err(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => StorageError::not_found("schema", id),
                other => StorageError::Query(other),
            })
    }

    pub fn list_schemas_impl(&self) -> Result<Vec<Schema>> {
        let conn = self.lock_conn()?;
        let sql = format!("SELECT {SCHEMA_COLUMNS} FROM schemas ORDER BY created_utc, id");
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map([], scan_schema)?;
        let mut schemas = Vec::new();
        for row in rows {
            schemas.push(row?);
        }
        Ok(schemas)
    }

    pub fn get_schema_elements_impl(&self, schema_id: &str) -> Result<Vec<SchemaElement>> {
        let conn = self.lock_conn()?;
        let sql = format!(
            "SELECT {ELEMENT_COLUMNS} FROM schemaelements
             WHERE schema_id = ?1 ORDER BY position"
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params![schema_id], scan_element)?;
        let mut elements = Vec::new();
        for row in rows {
            elements.push(row?);
        }
        Ok(elements)
    }
}
