//! Ingestion, search and index-maintenance services for the lattice
//! document store.
//!
//! The services in this crate orchestrate over the
//! [`Repository`](lattice_storage::Repository) and
//! [`BlobStore`](lattice_blob::BlobStore) capabilities; nothing here
//! talks SQL or touches the filesystem directly.

pub mod catalog;
pub mod error;
pub mod ingest;
pub mod maintain;
pub mod search;

pub use catalog::{CatalogService, ConstraintSpec, CreateCollectionSpec};
pub use error::{EngineError, Result};
pub use ingest::{IngestOptions, IngestOutcome, IngestRequest, IngestionService};
pub use maintain::{IndexMaintenanceService, RebuildOutcome};
pub use search::{FoundDocument, SearchOutcome, SearchService};
