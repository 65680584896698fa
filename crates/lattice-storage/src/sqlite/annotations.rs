//! Label and tag operations for [`SqliteRepository`].

use rusqlite::{Connection, Row, params};

use lattice_core::annotation::{Label, Tag};

use crate::error::Result;
use crate::sqlite::store::SqliteRepository;
use crate::sqlite::{format_datetime, parse_datetime};

pub(crate) const LABEL_COLUMNS: &str = "id, collection_id, document_id, label, created_utc";

pub(crate) const TAG_COLUMNS: &str = "id, collection_id, document_id, key, value, created_utc";

fn scan_label(row: &Row<'_>) -> rusqlite::Result<Label> {
    let created: String = row.get("created_utc")?;
    Ok(Label {
        id: row.get("id")?,
        collection_id: row.get("collection_id")?,
        document_id: row.get("document_id")?,
        label: row.get("label")?,
        created_utc: parse_datetime(&created),
    })
}

fn scan_tag(row: &Row<'_>) -> rusqlite::Result<Tag> {
    let created: String = row.get("created_utc")?;
    Ok(Tag {
        id: row.get("id")?,
        collection_id: row.get("collection_id")?,
        document_id: row.get("document_id")?,
        key: row.get("key")?,
        value: row.get("value")?,
        created_utc: parse_datetime(&created),
    })
}

// ---------------------------------------------------------------------------
// Connection-level helpers (shared with the transaction wrapper)
// ---------------------------------------------------------------------------

pub(crate) fn insert_label_on_conn(conn: &Connection, label: &Label) -> Result<()> {
    conn.execute(
        &format!("INSERT INTO labels ({LABEL_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5)"),
        params![
            label.id,
            label.collection_id,
            label.document_id,
            label.label,
            format_datetime(&label.created_utc),
        ],
    )?;
    Ok(())
}

pub(crate) fn insert_tag_on_conn(conn: &Connection, tag: &Tag) -> Result<()> {
    conn.execute(
        &format!("INSERT INTO tags ({TAG_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6)"),
        params![
            tag.id,
            tag.collection_id,
            tag.document_id,
            tag.key,
            tag.value,
            format_datetime(&tag.created_utc),
        ],
    )?;
    Ok(())
}

// ---------------------------------------------------------------------------
// SqliteRepository methods
// ---------------------------------------------------------------------------

impl SqliteRepository {
    pub fn insert_label_impl(&self, label: &Label) -> Result<()> {
        let conn = self.lock_conn()?;
        insert_label_on_conn(&conn, label)
    }

    pub fn insert_tag_impl(&self, tag: &Tag) -> Result<()> {
        let conn = self.lock_conn()?;
        insert_tag_on_conn(&conn, tag)
    }

    pub fn labels_for_document_impl(&self, document_id: &str) -> Result<Vec<Label>> {
        let conn = self.lock_conn()?;
        let sql = format!(
            "SELECT {LABEL_COLUMNS} FROM labels WHERE document_id = ?1 ORDER BY label"
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params![document_id], scan_label)?;
        let mut labels = Vec::new();
        for row in rows {
            labels.push(row?);
        }
        Ok(labels)
    }

    pub fn tags_for_document_impl(&self, document_id: &str) -> Result<Vec<Tag>> {
        let conn = self.lock_conn()?;
        let sql = format!("SELECT {TAG_COLUMNS} FROM tags WHERE document_id = ?1 ORDER BY key");
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params![document_id], scan_tag)?;
        let mut tags = Vec::new();
        for row in rows {
            tags.push(row?);
        }
        Ok(tags)
    }

    pub fn document_ids_with_label_impl(
        &self,
        collection_id: &str,
        label: &str,
    ) -> Result<Vec<String>> {
        let conn = self.lock_conn()?;
        let mut stmt = conn.prepare(
            "SELECT DISTINCT labels.document_id FROM labels
             INNER JOIN documents ON documents.id = labels.document_id
             WHERE documents.collection_id = ?1 AND labels.label = ?2",
        )?;
        let rows = stmt.query_map(params![collection_id, label], |row| {
            row.get::<_, String>(0)
        })?;
        let mut ids = Vec::new();
        for row in rows {
            ids.push(row?);
        }
        Ok(ids)
    }

    pub fn document_ids_with_tag_impl(
        &self,
        collection_id: &str,
        key: &str,
        value: &str,
    ) -> Result<Vec<String>> {
        let conn = self.lock_conn()?;
        let mut stmt = conn.prepare(
            "SELECT DISTINCT tags.document_id FROM tags
             INNER JOIN documents ON documents.id = tags.document_id
             WHERE documents.collection_id = ?1 AND tags.key = ?2 AND tags.value = ?3",
        )?;
        let rows = stmt.query_map(params![collection_id, key, value], |row| {
            row.get::<_, String>(0)
        })?;
        let mut ids = Vec::new();
        for row in rows {
            ids.push(row?);
        }
        Ok(ids)
    }
}
