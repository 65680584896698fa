//! Axum router and handlers for the `/v1.0` API.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;

use lattice_core::cancel::CancelToken;
use lattice_core::enums::{DataType, IndexingMode, SchemaEnforcementMode};
use lattice_core::filter::SearchQuery;
use lattice_blob::BlobStore;
use lattice_engine::{
    CatalogService, ConstraintSpec, CreateCollectionSpec, IndexMaintenanceService, IngestOptions,
    IngestRequest, IngestionService, SearchService,
};
use lattice_storage::Repository;

use crate::envelope;

/// Shared server state injected into all handlers.
#[derive(Clone)]
pub struct AppState {
    pub repo: Arc<dyn Repository>,
    pub catalog: Arc<CatalogService>,
    pub ingestion: Arc<IngestionService>,
    pub search: Arc<SearchService>,
    pub maintenance: Arc<IndexMaintenanceService>,
}

impl AppState {
    pub fn new(
        repo: Arc<dyn Repository>,
        blobs: Arc<dyn BlobStore>,
        options: IngestOptions,
    ) -> Self {
        Self {
            catalog: Arc::new(CatalogService::new(Arc::clone(&repo), Arc::clone(&blobs))),
            ingestion: Arc::new(IngestionService::new(
                Arc::clone(&repo),
                Arc::clone(&blobs),
                options,
            )),
            search: Arc::new(SearchService::new(Arc::clone(&repo), Arc::clone(&blobs))),
            maintenance: Arc::new(IndexMaintenanceService::new(Arc::clone(&repo), blobs)),
            repo,
        }
    }
}

/// Builds the full route table. HEAD requests are served by the GET
/// routes with an empty body.
pub fn router(state: AppState) -> Router {
    let v1 = Router::new()
        .route("/collections", get(list_collections).put(create_collection))
        .route(
            "/collections/{id}",
            get(get_collection).delete(delete_collection),
        )
        .route(
            "/collections/{id}/constraints",
            get(get_constraints).put(put_constraints),
        )
        .route(
            "/collections/{id}/indexing",
            get(get_indexing).put(put_indexing),
        )
        .route("/collections/{id}/indexes/rebuild", post(rebuild_indexes))
        .route(
            "/collections/{cid}/documents",
            get(list_documents).put(create_document),
        )
        .route(
            "/collections/{cid}/documents/{id}",
            get(get_document).delete(delete_document),
        )
        .route("/collections/{cid}/documents/search", post(search_documents))
        .route("/schemas", get(list_schemas))
        .route("/schemas/{id}", get(get_schema))
        .route("/schemas/{id}/elements", get(get_schema_elements))
        .route("/tables", get(list_tables));

    Router::new()
        .route("/health", get(health))
        .nest("/v1.0", v1)
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Request bodies
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateCollectionRequest {
    name: String,
    description: Option<String>,
    documents_directory: Option<String>,
    schema_enforcement_mode: Option<SchemaEnforcementMode>,
    indexing_mode: Option<IndexingMode>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FieldConstraintRequest {
    field_path: String,
    data_type: Option<DataType>,
    #[serde(default)]
    required: bool,
    nullable: Option<bool>,
    regex_pattern: Option<String>,
    min_value: Option<f64>,
    max_value: Option<f64>,
    min_length: Option<i64>,
    max_length: Option<i64>,
    allowed_values: Option<Vec<String>>,
    array_element_type: Option<DataType>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ConstraintsRequest {
    schema_enforcement_mode: SchemaEnforcementMode,
    field_constraints: Option<Vec<FieldConstraintRequest>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct IndexingRequest {
    indexing_mode: IndexingMode,
    indexed_fields: Option<Vec<String>>,
    #[serde(default)]
    rebuild_indexes: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RebuildRequest {
    #[serde(default)]
    drop_unused_indexes: bool,
}

/// Query parameters accepted by the document-create endpoint. Labels
/// and tags are comma-separated; tag entries are `key:value`.
#[derive(Debug, Deserialize)]
struct CreateDocumentParams {
    name: Option<String>,
    labels: Option<String>,
    tags: Option<String>,
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({"status": "ok"}))
}

async fn list_collections(State(state): State<AppState>) -> Response {
    let started = Instant::now();
    match state.catalog.list_collections() {
        Ok(collections) => envelope::ok(StatusCode::OK, &collections, started),
        Err(e) => envelope::fail(e, started),
    }
}

async fn create_collection(
    State(state): State<AppState>,
    Json(request): Json<CreateCollectionRequest>,
) -> Response {
    let started = Instant::now();
    let spec = CreateCollectionSpec {
        name: request.name,
        description: request.description,
        documents_directory: request.documents_directory,
        schema_enforcement_mode: request.schema_enforcement_mode,
        indexing_mode: request.indexing_mode,
    };
    match state.catalog.create_collection(spec) {
        Ok(collection) => envelope::ok(StatusCode::CREATED, &collection, started),
        Err(e) => envelope::fail(e, started),
    }
}

async fn get_collection(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    let started = Instant::now();
    match state.catalog.get_collection(&id) {
        Ok(collection) => envelope::ok(StatusCode::OK, &collection, started),
        Err(e) => envelope::fail(e, started),
    }
}

async fn delete_collection(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    let started = Instant::now();
    match state.catalog.delete_collection(&id) {
        Ok(()) => envelope::no_content(started),
        Err(e) => envelope::fail(e, started),
    }
}

async fn get_constraints(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    let started = Instant::now();
    match state.catalog.get_constraints(&id) {
        Ok((mode, constraints)) => envelope::ok(
            StatusCode::OK,
            &serde_json::json!({
                "schemaEnforcementMode": mode,
                "fieldConstraints": constraints,
            }),
            started,
        ),
        Err(e) => envelope::fail(e, started),
    }
}

async fn put_constraints(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<ConstraintsRequest>,
) -> Response {
    let started = Instant::now();
    let specs = request.field_constraints.map(|constraints| {
        constraints
            .into_iter()
            .map(|c| ConstraintSpec {
                field_path: c.field_path,
                data_type: c.data_type,
                required: c.required,
                nullable: c.nullable,
                regex_pattern: c.regex_pattern,
                min_value: c.min_value,
                max_value: c.max_value,
                min_length: c.min_length,
                max_length: c.max_length,
                allowed_values: c.allowed_values,
                array_element_type: c.array_element_type,
            })
            .collect()
    });
    match state
        .catalog
        .set_constraints(&id, request.schema_enforcement_mode, specs)
    {
        Ok(()) => envelope::no_content(started),
        Err(e) => envelope::fail(e, started),
    }
}

async fn get_indexing(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    let started = Instant::now();
    match state.catalog.get_indexing(&id) {
        Ok((mode, fields)) => envelope::ok(
            StatusCode::OK,
            &serde_json::json!({
                "indexingMode": mode,
                "indexedFields": fields,
            }),
            started,
        ),
        Err(e) => envelope::fail(e, started),
    }
}

async fn put_indexing(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<IndexingRequest>,
) -> Response {
    let started = Instant::now();
    if let Err(e) = state
        .catalog
        .set_indexing(&id, request.indexing_mode, request.indexed_fields)
    {
        return envelope::fail(e, started);
    }
    if request.rebuild_indexes {
        if let Err(e) = state.maintenance.rebuild(&id, true, &CancelToken::new()) {
            return envelope::fail(e, started);
        }
    }
    envelope::no_content(started)
}

async fn rebuild_indexes(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<RebuildRequest>,
) -> Response {
    let started = Instant::now();
    match state
        .maintenance
        .rebuild(&id, request.drop_unused_indexes, &CancelToken::new())
    {
        Ok(outcome) => envelope::ok(StatusCode::OK, &outcome, started),
        Err(e) => envelope::fail(e, started),
    }
}

async fn list_documents(State(state): State<AppState>, Path(cid): Path<String>) -> Response {
    let started = Instant::now();
    // Surface NotFound for an unknown collection before listing.
    if let Err(e) = state.catalog.get_collection(&cid) {
        return envelope::fail(e, started);
    }
    match state.repo.list_documents(&cid) {
        Ok(documents) => envelope::ok(StatusCode::OK, &documents, started),
        Err(e) => envelope::fail(e.into(), started),
    }
}

async fn create_document(
    State(state): State<AppState>,
    Path(cid): Path<String>,
    Query(params): Query<CreateDocumentParams>,
    body: Bytes,
) -> Response {
    let started = Instant::now();

    let labels = split_list(params.labels.as_deref());
    let tags = match parse_tags(params.tags.as_deref()) {
        Ok(tags) => tags,
        Err(message) => {
            return envelope::fail(
                lattice_engine::EngineError::invalid_input(message),
                started,
            );
        }
    };

    let request = IngestRequest {
        collection_id: cid,
        body: body.to_vec(),
        name: params.name,
        labels,
        tags,
    };
    match state.ingestion.ingest(request, &CancelToken::new()) {
        Ok(outcome) if outcome.warnings.is_empty() => {
            envelope::ok(StatusCode::CREATED, &outcome.document, started)
        }
        Ok(outcome) => {
            let warning = outcome
                .warnings
                .iter()
                .map(|w| format!("{}: {}", w.field_path, w.message))
                .collect::<Vec<_>>()
                .join("; ");
            envelope::ok_with_warning(StatusCode::CREATED, &outcome.document, warning, started)
        }
        Err(e) => envelope::fail(e, started),
    }
}

async fn get_document(
    State(state): State<AppState>,
    Path((_cid, id)): Path<(String, String)>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    let started = Instant::now();
    let include_content = params
        .get("includeContent")
        .is_some_and(|v| v.eq_ignore_ascii_case("true"));

    if include_content {
        // The raw body is returned unwrapped.
        return match state.ingestion.read_content(&id) {
            Ok(bytes) => {
                ([(header::CONTENT_TYPE, "application/json")], bytes).into_response()
            }
            Err(e) => envelope::fail(e, started),
        };
    }

    match state.repo.get_document(&id) {
        Ok(document) => envelope::ok(StatusCode::OK, &document, started),
        Err(e) => envelope::fail(e.into(), started),
    }
}

async fn delete_document(
    State(state): State<AppState>,
    Path((_cid, id)): Path<(String, String)>,
) -> Response {
    let started = Instant::now();
    match state.ingestion.delete(&id) {
        Ok(()) => envelope::no_content(started),
        Err(e) => envelope::fail(e, started),
    }
}

async fn search_documents(
    State(state): State<AppState>,
    Path(cid): Path<String>,
    Json(query): Json<SearchQuery>,
) -> Response {
    let started = Instant::now();
    match state.search.search(&cid, &query) {
        Ok(outcome) => envelope::ok(StatusCode::OK, &outcome, started),
        Err(e) => envelope::fail(e, started),
    }
}

async fn list_schemas(State(state): State<AppState>) -> Response {
    let started = Instant::now();
    match state.repo.list_schemas() {
        Ok(schemas) => envelope::ok(StatusCode::OK, &schemas, started),
        Err(e) => envelope::fail(e.into(), started),
    }
}

async fn get_schema(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    let started = Instant::now();
    match state.repo.get_schema(&id) {
        Ok(schema) => envelope::ok(StatusCode::OK, &schema, started),
        Err(e) => envelope::fail(e.into(), started),
    }
}

async fn get_schema_elements(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    let started = Instant::now();
    if let Err(e) = state.repo.get_schema(&id) {
        return envelope::fail(e.into(), started);
    }
    match state.repo.get_schema_elements(&id) {
        Ok(elements) => envelope::ok(StatusCode::OK, &elements, started),
        Err(e) => envelope::fail(e.into(), started),
    }
}

async fn list_tables(State(state): State<AppState>) -> Response {
    let started = Instant::now();
    match state.repo.list_index_mappings() {
        Ok(mappings) => envelope::ok(StatusCode::OK, &mappings, started),
        Err(e) => envelope::fail(e.into(), started),
    }
}

// ---------------------------------------------------------------------------
// Query-parameter parsing
// ---------------------------------------------------------------------------

fn split_list(raw: Option<&str>) -> Vec<String> {
    raw.map(|s| {
        s.split(',')
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .map(str::to_owned)
            .collect()
    })
    .unwrap_or_default()
}

fn parse_tags(raw: Option<&str>) -> Result<Vec<(String, String)>, String> {
    let mut tags = Vec::new();
    for part in split_list(raw) {
        let Some((key, value)) = part.split_once(':') else {
            return Err(format!("tag {part:?} is not in key:value form"));
        };
        tags.push((key.trim().to_owned(), value.trim().to_owned()));
    }
    Ok(tags)
}
