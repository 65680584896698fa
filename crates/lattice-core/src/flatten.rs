//! JSON flattening.
//!
//! Converts a JSON document into an ordered list of
//! `(key, position, value, datatype)` tuples. Keys are dot-joined paths;
//! arrays keep the parent key and record the element index in
//! `position` (the innermost index when arrays nest). Empty objects and
//! arrays produce no output.

use serde_json::Value;

use crate::enums::DataType;

/// One flattened leaf of a JSON document.
#[derive(Debug, Clone, PartialEq)]
pub struct FlattenedValue {
    /// Dot-joined path from the root, e.g. `author.name`.
    pub key: String,
    /// Array index if the leaf sat inside an array, else `None`.
    pub position: Option<i64>,
    /// String rendering of the value; `None` for JSON null.
    pub value: Option<String>,
    pub data_type: DataType,
}

/// Error for unusable flattener input.
#[derive(Debug, thiserror::Error)]
pub enum FlattenError {
    #[error("document body is empty")]
    Empty,

    #[error("document body is not valid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),
}

/// Flattens JSON text. Fails on empty, whitespace-only or invalid input.
pub fn flatten_text(text: &str) -> Result<Vec<FlattenedValue>, FlattenError> {
    if text.trim().is_empty() {
        return Err(FlattenError::Empty);
    }
    let value: Value = serde_json::from_str(text)?;
    Ok(flatten_value(&value))
}

/// Flattens an already-parsed JSON value.
pub fn flatten_value(value: &Value) -> Vec<FlattenedValue> {
    let mut out = Vec::new();
    walk(value, "", None, &mut out);
    out
}

fn walk(value: &Value, key: &str, position: Option<i64>, out: &mut Vec<FlattenedValue>) {
    match value {
        Value::Object(map) => {
            for (name, child) in map {
                let child_key = if key.is_empty() {
                    name.clone()
                } else {
                    format!("{key}.{name}")
                };
                walk(child, &child_key, position, out);
            }
        }
        Value::Array(items) => {
            for (index, child) in items.iter().enumerate() {
                walk(child, key, Some(index as i64), out);
            }
        }
        Value::String(s) => out.push(FlattenedValue {
            key: key.to_owned(),
            position,
            value: Some(s.clone()),
            data_type: DataType::String,
        }),
        Value::Number(n) => {
            let data_type = if n.is_i64() {
                DataType::Integer
            } else {
                DataType::Number
            };
            out.push(FlattenedValue {
                key: key.to_owned(),
                position,
                value: Some(n.to_string()),
                data_type,
            });
        }
        Value::Bool(b) => out.push(FlattenedValue {
            key: key.to_owned(),
            position,
            value: Some(if *b { "true" } else { "false" }.to_owned()),
            data_type: DataType::Boolean,
        }),
        Value::Null => out.push(FlattenedValue {
            key: key.to_owned(),
            position,
            value: None,
            data_type: DataType::Null,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn flat(text: &str) -> Vec<FlattenedValue> {
        flatten_text(text).unwrap()
    }

    #[test]
    fn flattens_nested_objects() {
        let values = flat(r#"{"author":{"name":"Ada","age":36}}"#);
        let keys: Vec<&str> = values.iter().map(|v| v.key.as_str()).collect();
        assert_eq!(keys, vec!["author.age", "author.name"]);
        assert!(values.iter().all(|v| v.position.is_none()));
    }

    #[test]
    fn scalar_types_and_values() {
        let values = flat(r#"{"s":"x","i":7,"n":1.5,"b":true,"z":null}"#);
        let by_key = |k: &str| values.iter().find(|v| v.key == k).unwrap();

        assert_eq!(by_key("s").data_type, DataType::String);
        assert_eq!(by_key("s").value.as_deref(), Some("x"));
        assert_eq!(by_key("i").data_type, DataType::Integer);
        assert_eq!(by_key("i").value.as_deref(), Some("7"));
        assert_eq!(by_key("n").data_type, DataType::Number);
        assert_eq!(by_key("n").value.as_deref(), Some("1.5"));
        assert_eq!(by_key("b").data_type, DataType::Boolean);
        assert_eq!(by_key("b").value.as_deref(), Some("true"));
        assert_eq!(by_key("z").data_type, DataType::Null);
        assert_eq!(by_key("z").value, None);
    }

    #[test]
    fn large_integers_fit_int64() {
        let values = flat(r#"{"big":9223372036854775807,"huge":9223372036854775808}"#);
        let by_key = |k: &str| values.iter().find(|v| v.key == k).unwrap();
        assert_eq!(by_key("big").data_type, DataType::Integer);
        assert_eq!(by_key("huge").data_type, DataType::Number);
    }

    #[test]
    fn arrays_keep_parent_key_with_position() {
        let values = flat(r#"{"tags":["a","b","c"]}"#);
        assert_eq!(values.len(), 3);
        for (i, v) in values.iter().enumerate() {
            assert_eq!(v.key, "tags");
            assert_eq!(v.position, Some(i as i64));
        }
    }

    #[test]
    fn arrays_of_objects_carry_element_position() {
        let values = flat(r#"{"authors":[{"name":"Ada"},{"name":"Alan"}]}"#);
        assert_eq!(values.len(), 2);
        assert_eq!(values[0].key, "authors.name");
        assert_eq!(values[0].position, Some(0));
        assert_eq!(values[0].value.as_deref(), Some("Ada"));
        assert_eq!(values[1].position, Some(1));
        assert_eq!(values[1].value.as_deref(), Some("Alan"));
    }

    #[test]
    fn nested_arrays_keep_innermost_position() {
        let values = flat(r#"{"grid":[[1,2],[3]]}"#);
        let positions: Vec<Option<i64>> = values.iter().map(|v| v.position).collect();
        assert_eq!(positions, vec![Some(0), Some(1), Some(0)]);
        assert!(values.iter().all(|v| v.key == "grid"));
    }

    #[test]
    fn empty_containers_produce_nothing() {
        assert!(flat(r#"{"a":{},"b":[]}"#).is_empty());
    }

    #[test]
    fn deterministic_across_invocations() {
        let text = r#"{"b":1,"a":{"y":[true,false],"x":"v"}}"#;
        assert_eq!(flat(text), flat(text));
    }

    #[test]
    fn rejects_empty_and_whitespace() {
        assert!(matches!(flatten_text(""), Err(FlattenError::Empty)));
        assert!(matches!(flatten_text("   \n\t"), Err(FlattenError::Empty)));
    }

    #[test]
    fn rejects_invalid_json() {
        assert!(matches!(
            flatten_text("{not json"),
            Err(FlattenError::InvalidJson(_))
        ));
    }
}
