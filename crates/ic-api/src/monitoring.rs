//! Health and monitoring endpoints

use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use ic_common::PoolStats;
use serde::Serialize;
use utoipa::ToSchema;

use crate::AppState;

/// Simple health response for basic health check
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    /// Health status: UP
    pub status: String,
    /// Application version
    pub version: String,
}

/// Liveness and readiness response
#[derive(Debug, Serialize, ToSchema)]
pub struct CheckResponse {
    /// Check status: LIVE, READY, NOT_READY
    pub status: String,
}

#[utoipa::path(
    get,
    path = "/health",
    tag = "monitoring",
    responses((status = 200, description = "Service is up", body = HealthResponse))
)]
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "UP".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

#[utoipa::path(
    get,
    path = "/health/live",
    tag = "monitoring",
    responses((status = 200, description = "Process is alive", body = CheckResponse))
)]
pub async fn liveness() -> Json<CheckResponse> {
    Json(CheckResponse {
        status: "LIVE".to_string(),
    })
}

/// Not ready once the worker pool has been closed for shutdown
#[utoipa::path(
    get,
    path = "/health/ready",
    tag = "monitoring",
    responses(
        (status = 200, description = "Accepting batch work", body = CheckResponse),
        (status = 503, description = "Shutting down", body = CheckResponse)
    )
)]
pub async fn readiness(State(state): State<AppState>) -> (StatusCode, Json<CheckResponse>) {
    if state.processor.pool().is_closed() {
        let body = CheckResponse { status: "NOT_READY".to_string() };
        return (StatusCode::SERVICE_UNAVAILABLE, Json(body));
    }
    (StatusCode::OK, Json(CheckResponse { status: "READY".to_string() }))
}

#[utoipa::path(
    get,
    path = "/api/monitoring/pool",
    tag = "monitoring",
    responses((status = 200, description = "Worker pool statistics", body = PoolStats))
)]
pub async fn pool_stats(State(state): State<AppState>) -> Json<PoolStats> {
    Json(state.processor.pool().stats())
}

pub fn monitoring_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/health/live", get(liveness))
        .route("/health/ready", get(readiness))
        .route("/api/monitoring/pool", get(pool_stats))
        .with_state(state)
}
