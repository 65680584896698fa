//! Field-constraint and indexed-field operations for [`SqliteRepository`].

use rusqlite::{Row, params};

use lattice_core::constraint::{FieldConstraint, IndexedField};
use lattice_core::enums::DataType;

use crate::error::Result;
use crate::sqlite::store::SqliteRepository;
use crate::sqlite::{format_datetime, parse_datetime};

pub(crate) const CONSTRAINT_COLUMNS: &str = "\
    id, collection_id, field_path, data_type, required, nullable, \
    regex_pattern, min_value, max_value, min_length, max_length, \
    allowed_values, array_element_type, created_utc, last_update_utc";

pub(crate) const INDEXED_FIELD_COLUMNS: &str =
    "id, collection_id, field_path, created_utc, last_update_utc";

fn scan_constraint(row: &Row<'_>) -> rusqlite::Result<FieldConstraint> {
    let data_type: Option<String> = row.get("data_type")?;
    let required: i32 = row.get("required")?;
    let nullable: i32 = row.get("nullable")?;
    let allowed_values: Option<String> = row.get("allowed_values")?;
    let array_element_type: Option<String> = row.get("array_element_type")?;
    let created: String = row.get("created_utc")?;
    let updated: String = row.get("last_update_utc")?;

    Ok(FieldConstraint {
        id: row.get("id")?,
        collection_id: row.get("collection_id")?,
        field_path: row.get("field_path")?,
        data_type: data_type.as_deref().and_then(DataType::parse),
        required: required != 0,
        nullable: nullable != 0,
        regex_pattern: row.get("regex_pattern")?,
        min_value: row.get("min_value")?,
        max_value: row.get("max_value")?,
        min_length: row.get("min_length")?,
        max_length: row.get("max_length")?,
        allowed_values: allowed_values
            .as_deref()
            .and_then(|s| serde_json::from_str(s).ok()),
        array_element_type: array_element_type.as_deref().and_then(DataType::parse),
        created_utc: parse_datetime(&created),
        last_update_utc: parse_datetime(&updated),
    })
}

fn scan_indexed_field(row: &Row<'_>) -> rusqlite::Result<IndexedField> {
    let created: String = row.get("created_utc")?;
    let updated: String = row.get("last_update_utc")?;
    Ok(IndexedField {
        id: row.get("id")?,
        collection_id: row.get("collection_id")?,
        field_path: row.get("field_path")?,
        created_utc: parse_datetime(&created),
        last_update_utc: parse_datetime(&updated),
    })
}

impl SqliteRepository {
    /// Replaces the collection's constraint set in one transaction.
    pub fn replace_field_constraints_impl(
        &self,
        collection_id: &str,
        constraints: &[FieldConstraint],
    ) -> Result<()> {
        let conn = self.lock_conn()?;
        let tx = conn
            .unchecked_transaction()
            .map_err(|e| crate::error::StorageError::Transaction(format!("failed to begin: {e}")))?;

        tx.execute(
            "DELETE FROM fieldconstraints WHERE collection_id = ?1",
            params![collection_id],
        )?;
        for constraint in constraints {
            let allowed = constraint
                .allowed_values
                .as_ref()
                .map(serde_json::to_string)
                .transpose()?;
            tx.execute(
                &format!(
                    "INSERT INTO fieldconstraints ({CONSTRAINT_COLUMNS})
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)"
                ),
                params![
                    constraint.id,
                    collection_id,
                    constraint.field_path,
                    constraint.data_type.map(|t| t.as_str()),
                    constraint.required as i32,
                    constraint.nullable as i32,
                    constraint.regex_pattern,
                    constraint.min_value,
                    constraint.max_value,
                    constraint.min_length,
                    constraint.max_length,
                    allowed,
                    constraint.array_element_type.map(|t| t.as_str()),
                    format_datetime(&constraint.created_utc),
                    format_datetime(&constraint.last_update_utc),
                ],
            )?;
        }

        tx.commit()
            .map_err(|e| crate::error::StorageError::Transaction(format!("failed to commit: {e}")))?;
        Ok(())
    }

    pub fn get_field_constraints_impl(
        &self,
        collection_id: &str,
    ) -> Result<Vec<FieldConstraint>> {
        let conn = self.lock_conn()?;
        let sql = format!(
            "SELECT {CONSTRAINT_COLUMNS} FROM fieldconstraints
             WHERE collection_id = ?1 ORDER BY field_path"
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params![collection_id], scan_constraint)?;
        let mut constraints = Vec::new();
        for row in rows {
            constraints.push(row?);
        }
        Ok(constraints)
    }

    /// Replaces the collection's indexed-field declarations in one
    /// transaction.
    pub fn replace_indexed_fields_impl(
        &self,
        collection_id: &str,
        fields: &[IndexedField],
    ) -> Result<()> {
        let conn = self.lock_conn()?;
        let tx = conn
            .unchecked_transaction()
            .map_err(|e| crate::error::StorageError::Transaction(format!("failed to begin: {e}")))?;

        tx.execute(
            "DELETE FROM indexedfields WHERE collection_id = ?1",
            params![collection_id],
        )?;
        for field in fields {
            tx.execute(
                &format!(
                    "INSERT INTO indexedfields ({INDEXED_FIELD_COLUMNS})
                     VALUES (?1, ?2, ?3, ?4, ?5)"
                ),
                params![
                    field.id,
                    collection_id,
                    field.field_path,
                    format_datetime(&field.created_utc),
                    format_datetime(&field.last_update_utc),
                ],
            )?;
        }

        tx.commit()
            .map_err(|e| crate::error::StorageError::Transaction(format!("failed to commit: {e}")))?;
        Ok(())
    }

    pub fn get_indexed_fields_impl(&self, collection_id: &str) -> Result<Vec<IndexedField>> {
        let conn = self.lock_conn()?;
        let sql = format!(
            "SELECT {INDEXED_FIELD_COLUMNS} FROM indexedfields
             WHERE collection_id = ?1 ORDER BY field_path"
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params![collection_id], scan_indexed_field)?;
        let mut fields = Vec::new();
        for row in rows {
            fields.push(row?);
        }
        Ok(fields)
    }
}
