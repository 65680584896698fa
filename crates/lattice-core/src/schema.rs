//! Schema extraction and deduplication.
//!
//! A schema is the ordered structural fingerprint of a JSON shape.
//! Schemas are content-addressed: the hash covers the sorted
//! `key:dataType` pairs, so it is stable under property reordering and
//! independent of nullability.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::enums::DataType;
use crate::idgen;

/// Deduplicated schema row. `hash` is unique across the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Schema {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub hash: String,
    pub created_utc: DateTime<Utc>,
    pub last_update_utc: DateTime<Utc>,
}

impl Schema {
    pub fn new(hash: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: idgen::schema_id(),
            name: None,
            hash: hash.into(),
            created_utc: now,
            last_update_utc: now,
        }
    }
}

/// One element of a stored schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchemaElement {
    pub id: String,
    pub schema_id: String,
    pub position: i64,
    /// Dot-joined path.
    pub key: String,
    /// Scalar type name, or `array<T>` / `array` for array containers.
    pub data_type: String,
    pub nullable: bool,
    pub created_utc: DateTime<Utc>,
    pub last_update_utc: DateTime<Utc>,
}

impl SchemaElement {
    pub fn from_extracted(schema_id: impl Into<String>, element: &ExtractedElement) -> Self {
        let now = Utc::now();
        Self {
            id: idgen::schema_element_id(),
            schema_id: schema_id.into(),
            position: element.position,
            key: element.key.clone(),
            data_type: element.data_type.clone(),
            nullable: element.nullable,
            created_utc: now,
            last_update_utc: now,
        }
    }
}

/// A schema element before it is attached to a stored schema.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractedElement {
    pub key: String,
    pub data_type: String,
    pub nullable: bool,
    pub position: i64,
}

/// Extracts the ordered element list from a parsed JSON value.
///
/// Scalar leaves yield one element each with `nullable` set for JSON
/// null. Arrays yield one `array<T>` element (T from the first element,
/// bare `array` when empty) and, when the first element is an object,
/// its leaves are extracted as well.
pub fn extract_elements(value: &Value) -> Vec<ExtractedElement> {
    let mut out = Vec::new();
    let mut position = 0i64;
    walk(value, "", &mut out, &mut position);
    out
}

fn walk(value: &Value, path: &str, out: &mut Vec<ExtractedElement>, position: &mut i64) {
    match value {
        Value::Object(map) => {
            for (name, child) in map {
                let child_path = if path.is_empty() {
                    name.clone()
                } else {
                    format!("{path}.{name}")
                };
                walk(child, &child_path, out, position);
            }
        }
        Value::Array(items) => {
            let data_type = match items.first() {
                None => "array".to_owned(),
                Some(first) => format!("array<{}>", type_name(first)),
            };
            out.push(ExtractedElement {
                key: path.to_owned(),
                data_type,
                nullable: true,
                position: *position,
            });
            *position += 1;

            if let Some(first @ Value::Object(_)) = items.first() {
                walk(first, path, out, position);
            }
        }
        scalar => {
            out.push(ExtractedElement {
                key: path.to_owned(),
                data_type: scalar_type(scalar).as_str().to_owned(),
                nullable: scalar.is_null(),
                position: *position,
            });
            *position += 1;
        }
    }
}

fn scalar_type(value: &Value) -> DataType {
    match value {
        Value::String(_) => DataType::String,
        Value::Number(n) if n.is_i64() => DataType::Integer,
        Value::Number(_) => DataType::Number,
        Value::Bool(_) => DataType::Boolean,
        _ => DataType::Null,
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Object(_) => "object",
        Value::Array(_) => "array",
        scalar => scalar_type(scalar).as_str(),
    }
}

/// Stable fingerprint over the element list:
/// `SHA-256(join(";", sort(elements by key, then dataType) as "key:dataType"))`.
pub fn schema_hash(elements: &[ExtractedElement]) -> String {
    let mut pairs: Vec<(&str, &str)> = elements
        .iter()
        .map(|e| (e.key.as_str(), e.data_type.as_str()))
        .collect();
    pairs.sort();

    let joined = pairs
        .iter()
        .map(|(key, data_type)| format!("{key}:{data_type}"))
        .collect::<Vec<_>>()
        .join(";");

    format!("{:x}", Sha256::digest(joined.as_bytes()))
}

/// Compares two schemas.
///
/// Strict mode requires identical multisets of `(key, dataType)`.
/// Flexible mode tolerates a key present on one side only when that
/// side marks it nullable, and treats `integer`/`number` as mutually
/// compatible and `null` as compatible with anything.
pub fn schemas_match(a: &[ExtractedElement], b: &[ExtractedElement], flexible: bool) -> bool {
    if !flexible {
        let mut left: Vec<(&str, &str)> = a
            .iter()
            .map(|e| (e.key.as_str(), e.data_type.as_str()))
            .collect();
        let mut right: Vec<(&str, &str)> = b
            .iter()
            .map(|e| (e.key.as_str(), e.data_type.as_str()))
            .collect();
        left.sort();
        right.sort();
        return left == right;
    }

    let keys: std::collections::BTreeSet<&str> = a
        .iter()
        .map(|e| e.key.as_str())
        .chain(b.iter().map(|e| e.key.as_str()))
        .collect();

    for key in keys {
        let in_a = a.iter().find(|e| e.key == key);
        let in_b = b.iter().find(|e| e.key == key);
        match (in_a, in_b) {
            (Some(ea), Some(eb)) => {
                if !types_compatible(&ea.data_type, &eb.data_type) {
                    return false;
                }
            }
            (Some(only), None) | (None, Some(only)) => {
                if !only.nullable {
                    return false;
                }
            }
            (None, None) => unreachable!("key came from one of the two sides"),
        }
    }
    true
}

fn types_compatible(a: &str, b: &str) -> bool {
    if a == b || a == "null" || b == "null" {
        return true;
    }
    let numeric = |t: &str| t == "integer" || t == "number";
    numeric(a) && numeric(b)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn extract(text: &str) -> Vec<ExtractedElement> {
        extract_elements(&serde_json::from_str(text).unwrap())
    }

    #[test]
    fn scalar_leaves() {
        let elements = extract(r#"{"title":"X","year":1999,"rating":4.5,"used":false,"isbn":null}"#);
        let by_key = |k: &str| elements.iter().find(|e| e.key == k).unwrap();

        assert_eq!(by_key("title").data_type, "string");
        assert_eq!(by_key("year").data_type, "integer");
        assert_eq!(by_key("rating").data_type, "number");
        assert_eq!(by_key("used").data_type, "boolean");
        assert_eq!(by_key("isbn").data_type, "null");
        assert!(by_key("isbn").nullable);
        assert!(!by_key("title").nullable);
    }

    #[test]
    fn positions_are_sequential() {
        let elements = extract(r#"{"a":1,"b":{"c":2},"d":3}"#);
        let positions: Vec<i64> = elements.iter().map(|e| e.position).collect();
        assert_eq!(positions, vec![0, 1, 2]);
    }

    #[test]
    fn array_element_types() {
        let elements = extract(r#"{"tags":["a"],"counts":[1,2],"empty":[]}"#);
        let by_key = |k: &str| elements.iter().find(|e| e.key == k).unwrap();
        assert_eq!(by_key("tags").data_type, "array<string>");
        assert_eq!(by_key("counts").data_type, "array<integer>");
        assert_eq!(by_key("empty").data_type, "array");
        assert!(by_key("tags").nullable);
    }

    #[test]
    fn array_of_objects_recurses_into_first_element() {
        let elements = extract(r#"{"authors":[{"name":"Ada","born":1815}]}"#);
        let keys: Vec<&str> = elements.iter().map(|e| e.key.as_str()).collect();
        assert_eq!(keys, vec!["authors", "authors.born", "authors.name"]);
        assert_eq!(elements[0].data_type, "array<object>");
    }

    #[test]
    fn hash_stable_under_key_reordering() {
        let a = extract(r#"{"title":"X","year":1999}"#);
        let b = extract(r#"{"year":2024,"title":"Y"}"#);
        assert_eq!(schema_hash(&a), schema_hash(&b));
    }

    #[test]
    fn hash_independent_of_nullable() {
        let mut a = extract(r#"{"x":1}"#);
        let b = extract(r#"{"x":1}"#);
        a[0].nullable = true;
        assert_eq!(schema_hash(&a), schema_hash(&b));
    }

    #[test]
    fn hash_differs_on_type_change() {
        let a = extract(r#"{"x":1}"#);
        let b = extract(r#"{"x":"1"}"#);
        assert_ne!(schema_hash(&a), schema_hash(&b));
    }

    #[test]
    fn flatten_and_schema_agree_on_leaf_keys() {
        // Scalar-array leaves keep the container key in the flattened
        // projection, so the container element counts as a key here.
        let text = r#"{"title":"X","author":{"name":"Ada"},"tags":["a","b"]}"#;
        let value: Value = serde_json::from_str(text).unwrap();

        let flat_keys: std::collections::BTreeSet<String> = crate::flatten::flatten_value(&value)
            .into_iter()
            .map(|v| v.key)
            .collect();
        let schema_keys: std::collections::BTreeSet<String> = extract_elements(&value)
            .into_iter()
            .map(|e| e.key)
            .collect();
        assert_eq!(flat_keys, schema_keys);
    }

    #[test]
    fn strict_match_requires_same_types() {
        let a = extract(r#"{"x":1}"#);
        let b = extract(r#"{"x":1.5}"#);
        assert!(!schemas_match(&a, &b, false));
        assert!(schemas_match(&a, &b, true));
    }

    #[test]
    fn flexible_match_allows_nullable_extra_key() {
        let a = extract(r#"{"x":1,"note":null}"#);
        let b = extract(r#"{"x":2}"#);
        assert!(schemas_match(&a, &b, true));
        assert!(!schemas_match(&a, &b, false));
    }

    #[test]
    fn flexible_match_rejects_missing_required_key() {
        let a = extract(r#"{"x":1,"title":"X"}"#);
        let b = extract(r#"{"x":2}"#);
        assert!(!schemas_match(&a, &b, true));
    }

    #[test]
    fn null_is_compatible_with_anything_in_flexible_mode() {
        let a = extract(r#"{"x":null}"#);
        let b = extract(r#"{"x":"text"}"#);
        assert!(schemas_match(&a, &b, true));
    }
}
