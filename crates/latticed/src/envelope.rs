//! Response envelope and error -> status mapping.
//!
//! Every endpoint except the raw-content read and the body-less 204s
//! wraps its payload in `{success, statusCode, data, errorMessage,
//! timestampUtc, guid, processingTimeMs}`.

use std::time::Instant;

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, error};
use uuid::Uuid;

use lattice_engine::EngineError;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiResponse {
    pub success: bool,
    pub status_code: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    pub timestamp_utc: DateTime<Utc>,
    pub guid: Uuid,
    pub processing_time_ms: u64,
}

fn build(
    status: StatusCode,
    data: Option<serde_json::Value>,
    error_message: Option<String>,
    started: Instant,
) -> (StatusCode, ApiResponse) {
    (
        status,
        ApiResponse {
            success: status.is_success(),
            status_code: status.as_u16(),
            data,
            error_message,
            timestamp_utc: Utc::now(),
            guid: Uuid::new_v4(),
            processing_time_ms: started.elapsed().as_millis() as u64,
        },
    )
}

fn respond(pair: (StatusCode, ApiResponse)) -> Response {
    (pair.0, Json(pair.1)).into_response()
}

/// Success with payload.
pub fn ok<T: Serialize>(status: StatusCode, data: &T, started: Instant) -> Response {
    match serde_json::to_value(data) {
        Ok(value) => respond(build(status, Some(value), None, started)),
        Err(e) => respond(build(
            StatusCode::INTERNAL_SERVER_ERROR,
            None,
            Some(format!("failed to serialize response: {e}")),
            started,
        )),
    }
}

/// Success with payload and a warning message (soft enforcement).
pub fn ok_with_warning<T: Serialize>(
    status: StatusCode,
    data: &T,
    warning: String,
    started: Instant,
) -> Response {
    match serde_json::to_value(data) {
        Ok(value) => respond(build(status, Some(value), Some(warning), started)),
        Err(e) => respond(build(
            StatusCode::INTERNAL_SERVER_ERROR,
            None,
            Some(format!("failed to serialize response: {e}")),
            started,
        )),
    }
}

/// Body-less success (deletes, policy updates).
pub fn no_content(_started: Instant) -> Response {
    StatusCode::NO_CONTENT.into_response()
}

/// Maps an engine error to the wire. Validation and lookup failures log
/// at debug; internal failures log at error with full context.
pub fn fail(err: EngineError, started: Instant) -> Response {
    respond(fail_parts(err, started))
}

fn fail_parts(err: EngineError, started: Instant) -> (StatusCode, ApiResponse) {
    let status = match &err {
        EngineError::InvalidInput(_) => StatusCode::BAD_REQUEST,
        EngineError::NotFound { .. } => StatusCode::NOT_FOUND,
        EngineError::Conflict { .. } | EngineError::DocumentLocked { .. } => StatusCode::CONFLICT,
        EngineError::SchemaValidation(_) => StatusCode::UNPROCESSABLE_ENTITY,
        EngineError::Cancelled | EngineError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };

    match &err {
        EngineError::Cancelled | EngineError::Internal(_) => {
            error!(error = %err, "request failed");
        }
        _ => debug!(error = %err, "request rejected"),
    }

    // Structured detail rides in `data` where the error carries one.
    let data = match &err {
        EngineError::SchemaValidation(errors) => serde_json::to_value(errors).ok(),
        EngineError::DocumentLocked {
            locked_by_hostname,
            lock_created_utc,
            ..
        } => Some(serde_json::json!({
            "lockedByHostname": locked_by_hostname,
            "lockCreatedUtc": lock_created_utc,
        })),
        _ => None,
    };

    build(status, data, Some(err.to_string()), started)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_envelope_shape() {
        let (status, body) = build(
            StatusCode::OK,
            Some(serde_json::json!({"a": 1})),
            None,
            Instant::now(),
        );
        assert_eq!(status, StatusCode::OK);
        assert!(body.success);
        assert_eq!(body.status_code, 200);
        assert!(body.data.is_some());
        assert!(body.error_message.is_none());
    }

    #[test]
    fn schema_validation_maps_to_422_with_detail() {
        let err = EngineError::SchemaValidation(vec![
            lattice_core::validation::ValidationIssue {
                field_path: "year".into(),
                message: "expected type integer but found string".into(),
            },
        ]);
        let (status, body) = fail_parts(err, Instant::now());
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert!(!body.success);
        let detail = body.data.unwrap();
        assert_eq!(detail[0]["fieldPath"], "year");
    }

    #[test]
    fn locked_maps_to_409_with_owner() {
        let err = EngineError::DocumentLocked {
            collection_id: "col_a".into(),
            document_name: "report.json".into(),
            locked_by_hostname: "a.host".into(),
            lock_created_utc: Utc::now(),
        };
        let (status, body) = fail_parts(err, Instant::now());
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body.data.unwrap()["lockedByHostname"], "a.host");
    }

    #[test]
    fn serialized_envelope_is_camel_case() {
        let (_, body) = build(StatusCode::OK, None, None, Instant::now());
        let value = serde_json::to_value(&body).unwrap();
        assert!(value.get("statusCode").is_some());
        assert!(value.get("timestampUtc").is_some());
        assert!(value.get("processingTimeMs").is_some());
    }
}
