//! Labels and tags.
//!
//! Both point at either a collection or a document; exactly one of the
//! two owner ids is set. The storage layer enforces this with a CHECK
//! constraint.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::idgen;

/// A single-string annotation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Label {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub collection_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub document_id: Option<String>,
    pub label: String,
    pub created_utc: DateTime<Utc>,
}

impl Label {
    pub fn for_document(document_id: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            id: idgen::label_id(),
            collection_id: None,
            document_id: Some(document_id.into()),
            label: label.into(),
            created_utc: Utc::now(),
        }
    }

    pub fn for_collection(collection_id: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            id: idgen::label_id(),
            collection_id: Some(collection_id.into()),
            document_id: None,
            label: label.into(),
            created_utc: Utc::now(),
        }
    }
}

/// A key/value annotation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tag {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub collection_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub document_id: Option<String>,
    pub key: String,
    pub value: String,
    pub created_utc: DateTime<Utc>,
}

impl Tag {
    pub fn for_document(
        document_id: impl Into<String>,
        key: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        Self {
            id: idgen::tag_id(),
            collection_id: None,
            document_id: Some(document_id.into()),
            key: key.into(),
            value: value.into(),
            created_utc: Utc::now(),
        }
    }

    pub fn for_collection(
        collection_id: impl Into<String>,
        key: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        Self {
            id: idgen::tag_id(),
            collection_id: Some(collection_id.into()),
            document_id: None,
            key: key.into(),
            value: value.into(),
            created_utc: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exactly_one_owner() {
        let l = Label::for_document("doc_x", "archived");
        assert!(l.document_id.is_some() && l.collection_id.is_none());
        let t = Tag::for_collection("col_x", "team", "infra");
        assert!(t.collection_id.is_some() && t.document_id.is_none());
    }
}
