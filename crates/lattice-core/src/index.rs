//! Index-table mapping and dynamic-table entry types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::hash;
use crate::idgen;

/// Global bijection between a flattened key and its dynamic table.
/// Both columns are unique.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexTableMapping {
    pub id: String,
    pub key: String,
    pub table_name: String,
    pub created_utc: DateTime<Utc>,
}

impl IndexTableMapping {
    /// Creates a mapping with the table name derived from the key.
    pub fn for_key(key: impl Into<String>) -> Self {
        let key = key.into();
        let table_name = hash::index_table_name(&key);
        Self {
            id: idgen::index_mapping_id(),
            key,
            table_name,
            created_utc: Utc::now(),
        }
    }
}

/// One row in a dynamic index table: a single flattened leaf of one
/// document under the mapping's key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexEntry {
    pub id: String,
    pub document_id: String,
    /// Array index when the leaf sat inside an array, else `None`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position: Option<i64>,
    /// String rendering of the leaf value; `None` for JSON null.
    pub value: Option<String>,
    pub created_utc: DateTime<Utc>,
}

impl IndexEntry {
    pub fn new(document_id: impl Into<String>, position: Option<i64>, value: Option<String>) -> Self {
        Self {
            id: idgen::index_value_id(),
            document_id: document_id.into(),
            position,
            value,
            created_utc: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mapping_derives_table_name() {
        let m = IndexTableMapping::for_key("title");
        assert!(m.id.starts_with("itm_"));
        assert_eq!(m.table_name, hash::index_table_name("title"));
        assert!(hash::is_index_table_name(&m.table_name));
    }

    #[test]
    fn entry_id_prefix() {
        let e = IndexEntry::new("doc_x", Some(2), Some("42".into()));
        assert!(e.id.starts_with("val_"));
    }
}
