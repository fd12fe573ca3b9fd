//! Item Catalog API
//!
//! HTTP API endpoints for:
//! - Item CRUD
//! - Triggering a batch processing run
//! - Health checks and worker pool statistics
//! - OpenAPI document and Swagger UI

use std::sync::Arc;

use axum::Router;
use ic_processor::BatchProcessor;
use ic_store::ItemStore;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

pub mod error;
pub mod items;
pub mod monitoring;
pub mod openapi;
pub mod validation;

pub use error::{ApiError, ErrorResponse, FieldError};
pub use openapi::ApiDoc;
pub use validation::ItemRequest;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn ItemStore>,
    pub processor: Arc<BatchProcessor>,
}

impl AppState {
    pub fn new(store: Arc<dyn ItemStore>, processor: Arc<BatchProcessor>) -> Self {
        Self { store, processor }
    }
}

/// Build the full router. Tracing, CORS and `/metrics` are layered on by the binary.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .merge(items::items_router(state.clone()))
        .merge(monitoring::monitoring_router(state))
        .merge(SwaggerUi::new("/swagger-ui").url("/api-doc/openapi.json", ApiDoc::openapi()))
}
