//! Search planning and execution.
//!
//! Predicates -- structured filters or the parsed SQL-like subset --
//! are evaluated as document-id set algebra over the per-key dynamic
//! index tables, then intersected with label and tag matches. Survivors
//! are fetched ordered and paged, with content optionally attached from
//! the blob store.

use std::collections::BTreeSet;
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, warn};

use lattice_core::collection::Collection;
use lattice_core::document::Document;
use lattice_core::filter::{SearchFilter, SearchQuery};
use lattice_core::sqlexpr::{Expr, parse_expression};
use lattice_blob::{BlobError, BlobStore};
use lattice_storage::Repository;

use crate::error::{EngineError, Result};

/// A matched document, optionally with its parsed body inlined.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FoundDocument {
    #[serde(flatten)]
    pub document: Document,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<serde_json::Value>,
}

/// Search response: one page of matches plus the total match count
/// before paging.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchOutcome {
    pub documents: Vec<FoundDocument>,
    pub total_matches: i64,
}

/// Read-side service over one collection's indexes.
pub struct SearchService {
    repo: Arc<dyn Repository>,
    blobs: Arc<dyn BlobStore>,
}

impl SearchService {
    pub fn new(repo: Arc<dyn Repository>, blobs: Arc<dyn BlobStore>) -> Self {
        Self { repo, blobs }
    }

    pub fn search(&self, collection_id: &str, query: &SearchQuery) -> Result<SearchOutcome> {
        let collection = self.repo.get_collection(collection_id)?;

        let universe: BTreeSet<String> = self
            .repo
            .collection_document_ids(&collection.id)?
            .into_iter()
            .collect();

        let mut candidates = if let Some(expression) = query.sql_expression.as_deref() {
            let expr = parse_expression(expression)
                .map_err(|e| EngineError::invalid_input(e.to_string()))?;
            self.eval(&collection, &expr, &universe)?
        } else if !query.filters.is_empty() {
            let mut set = universe.clone();
            for filter in &query.filters {
                if set.is_empty() {
                    break;
                }
                let matched = self.eval_atom(&collection, filter)?;
                set = set.intersection(&matched).cloned().collect();
            }
            set
        } else {
            universe.clone()
        };

        for label in &query.labels {
            if candidates.is_empty() {
                break;
            }
            let with_label: BTreeSet<String> = self
                .repo
                .document_ids_with_label(&collection.id, label)?
                .into_iter()
                .collect();
            candidates = candidates.intersection(&with_label).cloned().collect();
        }
        for (key, value) in &query.tags {
            if candidates.is_empty() {
                break;
            }
            let with_tag: BTreeSet<String> = self
                .repo
                .document_ids_with_tag(&collection.id, key, value)?
                .into_iter()
                .collect();
            candidates = candidates.intersection(&with_tag).cloned().collect();
        }

        let ids: Vec<String> = candidates.into_iter().collect();
        let total_matches = ids.len() as i64;
        debug!(
            collection = %collection.id,
            matches = total_matches,
            "search planned"
        );

        let documents = self.repo.documents_by_ids(
            &collection.id,
            &ids,
            query.ordering,
            query.skip.unwrap_or(0),
            query.max_results,
        )?;

        let mut found = Vec::with_capacity(documents.len());
        for document in documents {
            let content = if query.include_content {
                self.load_content(&collection, &document)?
            } else {
                None
            };
            found.push(FoundDocument { document, content });
        }

        Ok(SearchOutcome {
            documents: found,
            total_matches,
        })
    }

    /// Evaluates a predicate tree to a document-id set. `NOT`
    /// complements against the collection's full id set.
    fn eval(
        &self,
        collection: &Collection,
        expr: &Expr,
        universe: &BTreeSet<String>,
    ) -> Result<BTreeSet<String>> {
        match expr {
            Expr::Atom(filter) => self.eval_atom(collection, filter),
            Expr::And(terms) => {
                let mut set = universe.clone();
                for term in terms {
                    if set.is_empty() {
                        break;
                    }
                    let term_set = self.eval(collection, term, universe)?;
                    set = set.intersection(&term_set).cloned().collect();
                }
                Ok(set)
            }
            Expr::Or(terms) => {
                let mut set = BTreeSet::new();
                for term in terms {
                    let term_set = self.eval(collection, term, universe)?;
                    set.extend(term_set);
                }
                Ok(set)
            }
            Expr::Not(inner) => {
                let inner_set = self.eval(collection, inner, universe)?;
                Ok(universe.difference(&inner_set).cloned().collect())
            }
        }
    }

    /// One filter atom. A key with no index mapping matches nothing:
    /// under mode `All` no document carries the key; under `Selective`
    /// the field is simply not indexed.
    fn eval_atom(
        &self,
        collection: &Collection,
        filter: &SearchFilter,
    ) -> Result<BTreeSet<String>> {
        match self.repo.get_index_mapping(&filter.field)? {
            None => Ok(BTreeSet::new()),
            Some(mapping) => Ok(self
                .repo
                .index_document_ids(&mapping.table_name, &collection.id, filter)?
                .into_iter()
                .collect()),
        }
    }

    fn load_content(
        &self,
        collection: &Collection,
        document: &Document,
    ) -> Result<Option<serde_json::Value>> {
        match self.blobs.read(&collection.documents_directory, &document.id) {
            Ok(bytes) => match serde_json::from_slice(&bytes) {
                Ok(value) => Ok(Some(value)),
                Err(e) => {
                    warn!(document = %document.id, error = %e, "stored blob is not valid JSON");
                    Ok(None)
                }
            },
            Err(BlobError::NotFound { .. }) => {
                warn!(document = %document.id, "blob missing for matched document");
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }
}
