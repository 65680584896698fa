//! Collection administration: creation, deletion, constraint and
//! indexing policy management.

use std::sync::Arc;

use tracing::{info, warn};

use lattice_core::collection::Collection;
use lattice_core::constraint::{FieldConstraint, IndexedField};
use lattice_core::enums::{DataType, IndexingMode, SchemaEnforcementMode};
use lattice_blob::BlobStore;
use lattice_storage::Repository;

use crate::error::{EngineError, Result};

/// Parameters for creating a collection.
#[derive(Debug, Clone, Default)]
pub struct CreateCollectionSpec {
    pub name: String,
    pub description: Option<String>,
    /// Defaults to the collection name (resolved under the blob root).
    pub documents_directory: Option<String>,
    pub schema_enforcement_mode: Option<SchemaEnforcementMode>,
    pub indexing_mode: Option<IndexingMode>,
}

/// One constraint rule as supplied by callers; ids and ownership are
/// assigned here.
#[derive(Debug, Clone, Default)]
pub struct ConstraintSpec {
    pub field_path: String,
    pub data_type: Option<DataType>,
    pub required: bool,
    pub nullable: Option<bool>,
    pub regex_pattern: Option<String>,
    pub min_value: Option<f64>,
    pub max_value: Option<f64>,
    pub min_length: Option<i64>,
    pub max_length: Option<i64>,
    pub allowed_values: Option<Vec<String>>,
    pub array_element_type: Option<DataType>,
}

/// Collection catalog service.
pub struct CatalogService {
    repo: Arc<dyn Repository>,
    blobs: Arc<dyn BlobStore>,
}

impl CatalogService {
    pub fn new(repo: Arc<dyn Repository>, blobs: Arc<dyn BlobStore>) -> Self {
        Self { repo, blobs }
    }

    pub fn create_collection(&self, spec: CreateCollectionSpec) -> Result<Collection> {
        if spec.name.trim().is_empty() {
            return Err(EngineError::invalid_input("collection name is required"));
        }
        if self.repo.get_collection_by_name(&spec.name)?.is_some() {
            return Err(EngineError::Conflict {
                entity: "collection".into(),
                detail: spec.name,
            });
        }

        let directory = spec
            .documents_directory
            .unwrap_or_else(|| spec.name.clone());
        self.blobs.ensure_directory(&directory)?;

        let mut collection = Collection::new(spec.name, directory);
        collection.description = spec.description;
        if let Some(mode) = spec.schema_enforcement_mode {
            collection.schema_enforcement_mode = mode;
        }
        if let Some(mode) = spec.indexing_mode {
            collection.indexing_mode = mode;
        }

        self.repo.insert_collection(&collection)?;
        info!(collection = %collection.id, name = %collection.name, "collection created");
        Ok(collection)
    }

    pub fn get_collection(&self, id: &str) -> Result<Collection> {
        Ok(self.repo.get_collection(id)?)
    }

    pub fn list_collections(&self) -> Result<Vec<Collection>> {
        Ok(self.repo.list_collections()?)
    }

    /// Deletes a collection and everything it owns: documents (with
    /// their index rows, annotations and blobs), then the collection
    /// row itself.
    pub fn delete_collection(&self, id: &str) -> Result<()> {
        let collection = self.repo.get_collection(id)?;

        for document_id in self.repo.collection_document_ids(&collection.id)? {
            self.repo.delete_document(&document_id)?;
            if let Err(e) = self
                .blobs
                .delete(&collection.documents_directory, &document_id)
            {
                warn!(document = %document_id, error = %e, "failed to unlink blob during collection delete");
            }
        }

        self.repo.delete_collection(&collection.id)?;
        info!(collection = %collection.id, "collection deleted");
        Ok(())
    }

    // -- Constraint policy ---------------------------------------------------

    pub fn get_constraints(
        &self,
        collection_id: &str,
    ) -> Result<(SchemaEnforcementMode, Vec<FieldConstraint>)> {
        let collection = self.repo.get_collection(collection_id)?;
        let constraints = self.repo.get_field_constraints(&collection.id)?;
        Ok((collection.schema_enforcement_mode, constraints))
    }

    /// Sets the enforcement mode and, when given, replaces the
    /// constraint set.
    pub fn set_constraints(
        &self,
        collection_id: &str,
        mode: SchemaEnforcementMode,
        constraints: Option<Vec<ConstraintSpec>>,
    ) -> Result<()> {
        let collection = self.repo.get_collection(collection_id)?;
        self.repo.set_schema_enforcement(&collection.id, mode)?;

        if let Some(specs) = constraints {
            let mut rows = Vec::with_capacity(specs.len());
            for spec in specs {
                if spec.field_path.trim().is_empty() {
                    return Err(EngineError::invalid_input(
                        "constraint fieldPath is required",
                    ));
                }
                let mut row = FieldConstraint::new(&collection.id, spec.field_path);
                row.data_type = spec.data_type;
                row.required = spec.required;
                row.nullable = spec.nullable.unwrap_or(true);
                row.regex_pattern = spec.regex_pattern;
                row.min_value = spec.min_value;
                row.max_value = spec.max_value;
                row.min_length = spec.min_length;
                row.max_length = spec.max_length;
                row.allowed_values = spec.allowed_values;
                row.array_element_type = spec.array_element_type;
                rows.push(row);
            }
            self.repo.replace_field_constraints(&collection.id, &rows)?;
        }
        Ok(())
    }

    // -- Indexing policy -----------------------------------------------------

    pub fn get_indexing(
        &self,
        collection_id: &str,
    ) -> Result<(IndexingMode, Vec<IndexedField>)> {
        let collection = self.repo.get_collection(collection_id)?;
        let fields = self.repo.get_indexed_fields(&collection.id)?;
        Ok((collection.indexing_mode, fields))
    }

    /// Sets the indexing mode and, when given, replaces the
    /// indexed-field declarations. Callers trigger a rebuild separately
    /// when they want existing documents re-projected.
    pub fn set_indexing(
        &self,
        collection_id: &str,
        mode: IndexingMode,
        indexed_fields: Option<Vec<String>>,
    ) -> Result<()> {
        let collection = self.repo.get_collection(collection_id)?;
        self.repo.set_indexing_mode(&collection.id, mode)?;

        if let Some(paths) = indexed_fields {
            let fields: Vec<IndexedField> = paths
                .into_iter()
                .filter(|p| !p.trim().is_empty())
                .map(|p| IndexedField::new(&collection.id, p))
                .collect();
            self.repo.replace_indexed_fields(&collection.id, &fields)?;
        }
        Ok(())
    }
}
