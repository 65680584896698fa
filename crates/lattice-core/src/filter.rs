//! Search filter and query types.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Comparison applied to one flattened key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SearchCondition {
    Equals,
    NotEquals,
    GreaterThan,
    GreaterThanOrEqual,
    LessThan,
    LessThanOrEqual,
    Contains,
    StartsWith,
    EndsWith,
    In,
    NotIn,
    IsNull,
    IsNotNull,
}

impl SearchCondition {
    /// Conditions that take no right-hand value.
    pub fn is_nullary(&self) -> bool {
        matches!(self, Self::IsNull | Self::IsNotNull)
    }
}

/// One predicate over a flattened key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchFilter {
    /// Dot-joined path as produced by the flattener.
    pub field: String,
    pub condition: SearchCondition,
    /// String or number for scalar conditions, array for `In`/`NotIn`,
    /// ignored for `IsNull`/`IsNotNull`.
    #[serde(default)]
    pub value: serde_json::Value,
}

impl SearchFilter {
    pub fn new(
        field: impl Into<String>,
        condition: SearchCondition,
        value: serde_json::Value,
    ) -> Self {
        Self {
            field: field.into(),
            condition,
            value,
        }
    }
}

/// How results are ordered before paging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ResultOrdering {
    CreatedAscending,
    #[default]
    CreatedDescending,
    Name,
    Size,
}

/// A structured search request over one collection.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SearchQuery {
    /// Opaque predicate in the SQL-like subset; mutually exclusive with
    /// `filters` (the expression wins when both are present).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sql_expression: Option<String>,
    /// AND-combined structured predicates.
    pub filters: Vec<SearchFilter>,
    /// Labels that must all be present on the document.
    pub labels: Vec<String>,
    /// Tag pairs that must all match.
    pub tags: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_results: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skip: Option<i64>,
    pub ordering: ResultOrdering,
    pub include_content: bool,
}
