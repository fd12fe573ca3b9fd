//! API error types and their HTTP mapping

use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use ic_common::ItemId;
use ic_processor::BatchError;
use ic_store::StoreError;
use serde::Serialize;
use serde_json::json;
use thiserror::Error;
use tracing::{error, warn};
use utoipa::ToSchema;

/// Standard API error response
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }
}

/// One field-level problem with a request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Validation failed: {} field error(s)", .0.len())]
    Validation(Vec<FieldError>),

    #[error("Invalid or missing request body: {0}")]
    RequestBody(String),

    #[error("Invalid or missing media type: {0}")]
    MediaType(String),

    #[error("Item not found: {0}")]
    NotFound(ItemId),

    #[error(transparent)]
    Batch(#[from] BatchError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        match rejection {
            JsonRejection::MissingJsonContentType(e) => ApiError::MediaType(e.body_text()),
            other => ApiError::RequestBody(other.body_text()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::Validation(errors) => (StatusCode::BAD_REQUEST, Json(errors)).into_response(),
            ApiError::RequestBody(_) => {
                let errors = vec![FieldError::new("requestBody", self.to_string())];
                (StatusCode::BAD_REQUEST, Json(errors)).into_response()
            }
            ApiError::MediaType(_) => {
                let body = FieldError::new("mediaType", self.to_string());
                (StatusCode::UNSUPPORTED_MEDIA_TYPE, Json(body)).into_response()
            }
            ApiError::NotFound(_) => {
                let body = ErrorResponse::new("NOT_FOUND", self.to_string());
                (StatusCode::NOT_FOUND, Json(body)).into_response()
            }
            ApiError::Batch(err) => {
                warn!(error = %err, "Batch processing request failed");
                let body = batch_error_body(&err);
                (StatusCode::INTERNAL_SERVER_ERROR, Json(body)).into_response()
            }
            ApiError::Store(err) => {
                error!(error = %err, "Store operation failed");
                let body = ErrorResponse::new("STORE_ERROR", err.to_string());
                (StatusCode::INTERNAL_SERVER_ERROR, Json(body)).into_response()
            }
        }
    }
}

fn batch_error_body(err: &BatchError) -> ErrorResponse {
    let body = ErrorResponse::new("BATCH_FAILED", err.to_string());
    match err {
        BatchError::Snapshot(_) => body,
        BatchError::TasksFailed { failures, processed, skipped } => {
            let failures: Vec<_> = failures
                .iter()
                .map(|f| {
                    json!({
                        "itemId": f.item_id(),
                        "kind": f.kind(),
                        "message": f.to_string(),
                    })
                })
                .collect();
            let processed_ids: Vec<ItemId> = processed.iter().map(|i| i.id).collect();
            body.with_details(json!({
                "failures": failures,
                "processedIds": processed_ids,
                "skipped": skipped,
            }))
        }
    }
}
