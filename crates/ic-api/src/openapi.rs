//! OpenAPI Documentation

use ic_common::{Item, ItemStatus, PoolStats};
use utoipa::OpenApi;

use crate::error::{ErrorResponse, FieldError};
use crate::monitoring::{HealthResponse, CheckResponse};
use crate::validation::ItemRequest;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Item Catalog API",
        version = "1.0.0",
        description = "Item management and batch processing"
    ),
    servers(
        (url = "http://localhost:8080", description = "Local development")
    ),
    tags(
        (name = "items", description = "Item management and batch processing"),
        (name = "monitoring", description = "Health and monitoring")
    ),
    paths(
        super::items::list_items,
        super::items::create_item,
        super::items::get_item,
        super::items::update_item,
        super::items::delete_item,
        super::items::process_items,
        super::monitoring::health,
        super::monitoring::liveness,
        super::monitoring::readiness,
        super::monitoring::pool_stats,
    ),
    components(schemas(
        Item,
        ItemStatus,
        ItemRequest,
        FieldError,
        ErrorResponse,
        PoolStats,
        HealthResponse,
        CheckResponse,
    ))
)]
pub struct ApiDoc;
