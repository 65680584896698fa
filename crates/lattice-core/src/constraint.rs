//! Per-collection field constraints and indexed-field declarations.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::enums::DataType;
use crate::idgen;

/// A validation rule evaluated against a document's flattened
/// projection. Unique per `(collection, field path)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldConstraint {
    pub id: String,
    pub collection_id: String,
    /// Dot-joined path as produced by the flattener.
    pub field_path: String,
    /// Expected scalar datatype, if declared.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_type: Option<DataType>,
    /// At least one projection entry must carry this path.
    #[serde(default)]
    pub required: bool,
    /// Whether JSON null satisfies the constraint. Defaults to true.
    #[serde(default = "default_nullable")]
    pub nullable: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub regex_pattern: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_value: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_value: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_length: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_length: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub allowed_values: Option<Vec<String>>,
    /// When the path denotes array leaves, every element must have this
    /// datatype.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub array_element_type: Option<DataType>,
    #[serde(default = "Utc::now")]
    pub created_utc: DateTime<Utc>,
    #[serde(default = "Utc::now")]
    pub last_update_utc: DateTime<Utc>,
}

fn default_nullable() -> bool {
    true
}

impl FieldConstraint {
    /// Creates an empty constraint on the given path; callers fill in
    /// the rules they need.
    pub fn new(collection_id: impl Into<String>, field_path: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: idgen::field_constraint_id(),
            collection_id: collection_id.into(),
            field_path: field_path.into(),
            data_type: None,
            required: false,
            nullable: true,
            regex_pattern: None,
            min_value: None,
            max_value: None,
            min_length: None,
            max_length: None,
            allowed_values: None,
            array_element_type: None,
            created_utc: now,
            last_update_utc: now,
        }
    }
}

/// Opt-in declaration for selective indexing. Unique per
/// `(collection, field path)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexedField {
    pub id: String,
    pub collection_id: String,
    pub field_path: String,
    #[serde(default = "Utc::now")]
    pub created_utc: DateTime<Utc>,
    #[serde(default = "Utc::now")]
    pub last_update_utc: DateTime<Utc>,
}

impl IndexedField {
    pub fn new(collection_id: impl Into<String>, field_path: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: idgen::indexed_field_id(),
            collection_id: collection_id.into(),
            field_path: field_path.into(),
            created_utc: now,
            last_update_utc: now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nullable_defaults_true() {
        let c = FieldConstraint::new("col_a", "year");
        assert!(c.nullable);
        assert!(!c.required);
        assert!(c.id.starts_with("fco_"));
    }

    #[test]
    fn deserializes_with_defaults() {
        let c: FieldConstraint = serde_json::from_str(
            r#"{"id":"fco_x","collectionId":"col_a","fieldPath":"year","dataType":"integer","required":true,"minValue":1900}"#,
        )
        .unwrap();
        assert!(c.nullable);
        assert!(c.required);
        assert_eq!(c.data_type, Some(DataType::Integer));
        assert_eq!(c.min_value, Some(1900.0));
    }

    #[test]
    fn indexed_field_prefix() {
        let f = IndexedField::new("col_a", "year");
        assert!(f.id.starts_with("ixf_"));
    }
}
