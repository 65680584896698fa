//! Router-level API tests driven through `tower::ServiceExt::oneshot`,
//! backed by an in-memory repository and a tempdir blob store.

use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use tempfile::TempDir;
use tower::ServiceExt;

use lattice_blob::DirBlobStore;
use lattice_engine::IngestOptions;
use lattice_storage::{Repository, SqliteRepository};
use latticed::server::{AppState, router};

fn app() -> (TempDir, Router) {
    let tmp = TempDir::new().unwrap();
    let repo: Arc<dyn Repository> = Arc::new(SqliteRepository::open_in_memory().unwrap());
    let blobs = Arc::new(DirBlobStore::new(tmp.path()));
    let options = IngestOptions {
        enable_object_locking: true,
        lock_expiration_seconds: 30,
        hostname: "test-host".to_owned(),
    };
    (tmp, router(AppState::new(repo, blobs, options)))
}

async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let request = match body {
        Some(value) => Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(value.to_string()))
            .unwrap(),
        None => Request::builder()
            .method(method)
            .uri(uri)
            .body(Body::empty())
            .unwrap(),
    };
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

async fn send_raw(app: &Router, method: &str, uri: &str, body: &[u8]) -> (StatusCode, Vec<u8>) {
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_vec()))
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    (status, bytes.to_vec())
}

async fn create_collection(app: &Router, name: &str, indexing_mode: &str) -> String {
    let (status, body) = send(
        app,
        "PUT",
        "/v1.0/collections",
        Some(json!({"name": name, "indexingMode": indexing_mode})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "create collection: {body}");
    body["data"]["id"].as_str().unwrap().to_owned()
}

#[tokio::test]
async fn health_is_unwrapped() {
    let (_tmp, app) = app();
    let (status, body) = send(&app, "GET", "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"status": "ok"}));
}

#[tokio::test]
async fn envelope_shape_on_success() {
    let (_tmp, app) = app();
    let (status, body) = send(&app, "GET", "/v1.0/collections", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], json!(true));
    assert_eq!(body["statusCode"], json!(200));
    assert!(body["data"].is_array());
    assert!(body["guid"].is_string());
    assert!(body["timestampUtc"].is_string());
    assert!(body["processingTimeMs"].is_number());
    assert!(body.get("errorMessage").is_none());
}

#[tokio::test]
async fn round_trip_document() {
    let (_tmp, app) = app();
    let collection_id = create_collection(&app, "books", "All").await;

    let body = br#"{"title":"X","year":1999}"#;
    let (status, created) = send_raw(
        &app,
        "PUT",
        &format!("/v1.0/collections/{collection_id}/documents?name=x.json"),
        body,
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let created: Value = serde_json::from_slice(&created).unwrap();
    let document_id = created["data"]["id"].as_str().unwrap();
    assert_eq!(created["data"]["contentLength"], json!(body.len()));
    assert_eq!(created["data"]["name"], json!("x.json"));

    // Raw content comes back byte-identical and unwrapped.
    let (status, content) = send_raw(
        &app,
        "GET",
        &format!("/v1.0/collections/{collection_id}/documents/{document_id}?includeContent=true"),
        b"",
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(content, body.to_vec());

    // Metadata read is wrapped.
    let (status, wrapped) = send(
        &app,
        "GET",
        &format!("/v1.0/collections/{collection_id}/documents/{document_id}"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(wrapped["data"]["sha256Hash"].as_str().unwrap().len() == 64);

    // Both keys show up in the table listing.
    let (_, tables) = send(&app, "GET", "/v1.0/tables", None).await;
    let keys: Vec<&str> = tables["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|m| m["key"].as_str().unwrap())
        .collect();
    assert_eq!(keys, vec!["title", "year"]);
}

#[tokio::test]
async fn unknown_collection_is_404() {
    let (_tmp, app) = app();
    let (status, body) = send(&app, "GET", "/v1.0/collections/col_missing", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["success"], json!(false));
    assert_eq!(body["statusCode"], json!(404));
    assert!(body["errorMessage"].as_str().unwrap().contains("not found"));
}

#[tokio::test]
async fn duplicate_collection_is_409() {
    let (_tmp, app) = app();
    create_collection(&app, "books", "All").await;
    let (status, body) = send(
        &app,
        "PUT",
        "/v1.0/collections",
        Some(json!({"name": "books"})),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["success"], json!(false));
}

#[tokio::test]
async fn strict_validation_is_422() {
    let (_tmp, app) = app();
    let collection_id = create_collection(&app, "books", "All").await;

    let (status, _) = send(
        &app,
        "PUT",
        &format!("/v1.0/collections/{collection_id}/constraints"),
        Some(json!({
            "schemaEnforcementMode": "Strict",
            "fieldConstraints": [
                {"fieldPath": "year", "dataType": "integer", "required": true, "minValue": 1900}
            ]
        })),
    )
    .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, body) = send_raw(
        &app,
        "PUT",
        &format!("/v1.0/collections/{collection_id}/documents"),
        br#"{"title":"Y","year":"abc"}"#,
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    let body: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(body["data"][0]["fieldPath"], json!("year"));

    let (status, _) = send_raw(
        &app,
        "PUT",
        &format!("/v1.0/collections/{collection_id}/documents"),
        br#"{"title":"Y"}"#,
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn invalid_json_body_is_400() {
    let (_tmp, app) = app();
    let collection_id = create_collection(&app, "books", "All").await;
    let (status, body) = send_raw(
        &app,
        "PUT",
        &format!("/v1.0/collections/{collection_id}/documents"),
        b"{broken",
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let body: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(body["statusCode"], json!(400));
}

#[tokio::test]
async fn search_endpoint() {
    let (_tmp, app) = app();
    let collection_id = create_collection(&app, "books", "All").await;
    send_raw(
        &app,
        "PUT",
        &format!("/v1.0/collections/{collection_id}/documents"),
        br#"{"title":"X","year":1999}"#,
    )
    .await;
    send_raw(
        &app,
        "PUT",
        &format!("/v1.0/collections/{collection_id}/documents"),
        br#"{"title":"Z","year":2005}"#,
    )
    .await;

    let (status, body) = send(
        &app,
        "POST",
        &format!("/v1.0/collections/{collection_id}/documents/search"),
        Some(json!({
            "filters": [{"field": "year", "condition": "Equals", "value": 1999}],
            "includeContent": true
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let documents = body["data"]["documents"].as_array().unwrap();
    assert_eq!(documents.len(), 1);
    assert_eq!(documents[0]["content"]["title"], json!("X"));
    assert_eq!(body["data"]["totalMatches"], json!(1));

    // SQL-expression form hits the same planner.
    let (status, body) = send(
        &app,
        "POST",
        &format!("/v1.0/collections/{collection_id}/documents/search"),
        Some(json!({"sqlExpression": "year > 2000"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["totalMatches"], json!(1));
}

#[tokio::test]
async fn document_delete_cascades() {
    let (_tmp, app) = app();
    let collection_id = create_collection(&app, "books", "All").await;
    let (_, created) = send_raw(
        &app,
        "PUT",
        &format!("/v1.0/collections/{collection_id}/documents?labels=keep&tags=team:infra"),
        br#"{"title":"X"}"#,
    )
    .await;
    let created: Value = serde_json::from_slice(&created).unwrap();
    let document_id = created["data"]["id"].as_str().unwrap().to_owned();

    let (status, _) = send(
        &app,
        "DELETE",
        &format!("/v1.0/collections/{collection_id}/documents/{document_id}"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = send(
        &app,
        "GET",
        &format!("/v1.0/collections/{collection_id}/documents/{document_id}"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn indexing_update_with_rebuild() {
    let (_tmp, app) = app();
    let collection_id = create_collection(&app, "books", "All").await;
    send_raw(
        &app,
        "PUT",
        &format!("/v1.0/collections/{collection_id}/documents"),
        br#"{"a":{"b":1},"title":"one"}"#,
    )
    .await;

    let (status, _) = send(
        &app,
        "PUT",
        &format!("/v1.0/collections/{collection_id}/indexing"),
        Some(json!({
            "indexingMode": "Selective",
            "indexedFields": ["a.b"],
            "rebuildIndexes": true
        })),
    )
    .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (_, tables) = send(&app, "GET", "/v1.0/tables", None).await;
    let keys: Vec<&str> = tables["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|m| m["key"].as_str().unwrap())
        .collect();
    assert_eq!(keys, vec!["a.b"]);

    let (status, body) = send(
        &app,
        "POST",
        &format!("/v1.0/collections/{collection_id}/indexes/rebuild"),
        Some(json!({"dropUnusedIndexes": true})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["documentsProcessed"], json!(1));
}

#[tokio::test]
async fn schema_endpoints() {
    let (_tmp, app) = app();
    let collection_id = create_collection(&app, "books", "All").await;
    send_raw(
        &app,
        "PUT",
        &format!("/v1.0/collections/{collection_id}/documents"),
        br#"{"x":1}"#,
    )
    .await;
    send_raw(
        &app,
        "PUT",
        &format!("/v1.0/collections/{collection_id}/documents"),
        br#"{"x":42}"#,
    )
    .await;

    let (status, body) = send(&app, "GET", "/v1.0/schemas", None).await;
    assert_eq!(status, StatusCode::OK);
    let schemas = body["data"].as_array().unwrap();
    assert_eq!(schemas.len(), 1, "identical shapes dedupe to one schema");
    let schema_id = schemas[0]["id"].as_str().unwrap();

    let (status, body) = send(&app, "GET", &format!("/v1.0/schemas/{schema_id}"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["id"], json!(schema_id));

    let (status, body) = send(
        &app,
        "GET",
        &format!("/v1.0/schemas/{schema_id}/elements"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"][0]["key"], json!("x"));
    assert_eq!(body["data"][0]["dataType"], json!("integer"));
}

#[tokio::test]
async fn constraints_round_trip() {
    let (_tmp, app) = app();
    let collection_id = create_collection(&app, "books", "All").await;
    send(
        &app,
        "PUT",
        &format!("/v1.0/collections/{collection_id}/constraints"),
        Some(json!({
            "schemaEnforcementMode": "Soft",
            "fieldConstraints": [{"fieldPath": "year", "dataType": "integer"}]
        })),
    )
    .await;

    let (status, body) = send(
        &app,
        "GET",
        &format!("/v1.0/collections/{collection_id}/constraints"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["schemaEnforcementMode"], json!("Soft"));
    assert_eq!(
        body["data"]["fieldConstraints"][0]["fieldPath"],
        json!("year")
    );
}
