//! Items API
//!
//! CRUD endpoints for items plus the batch processing trigger.

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use ic_common::{Item, ItemId};
use tracing::{debug, info};

use crate::error::{ApiError, ErrorResponse, FieldError};
use crate::validation::ItemRequest;
use crate::AppState;

type JsonBody = Result<Json<Option<ItemRequest>>, JsonRejection>;

/// Unwrap the JSON extractor, treating a `null` body like a missing one
fn read_body(payload: JsonBody) -> Result<ItemRequest, ApiError> {
    match payload? {
        Json(Some(request)) => Ok(request),
        Json(None) => Err(ApiError::RequestBody("body is null".to_string())),
    }
}

/// List all items
#[utoipa::path(
    get,
    path = "/api/items",
    tag = "items",
    responses(
        (status = 200, description = "All items", body = Vec<Item>),
        (status = 500, description = "Store failure", body = ErrorResponse)
    )
)]
pub async fn list_items(State(state): State<AppState>) -> Result<Json<Vec<Item>>, ApiError> {
    let items = state.store.find_all().await?;
    Ok(Json(items))
}

/// Create an item
#[utoipa::path(
    post,
    path = "/api/items",
    tag = "items",
    request_body = ItemRequest,
    responses(
        (status = 201, description = "Item created", body = Item),
        (status = 400, description = "Validation errors", body = Vec<FieldError>),
        (status = 415, description = "Missing JSON content type", body = FieldError)
    )
)]
pub async fn create_item(
    State(state): State<AppState>,
    payload: JsonBody,
) -> Result<(StatusCode, Json<Item>), ApiError> {
    let draft = read_body(payload)?.validate().map_err(ApiError::Validation)?;
    let item = state.store.create(draft).await?;

    info!(item_id = item.id, "Item created");
    Ok((StatusCode::CREATED, Json(item)))
}

/// Get an item by id
#[utoipa::path(
    get,
    path = "/api/items/{id}",
    tag = "items",
    params(
        ("id" = i64, Path, description = "Item ID")
    ),
    responses(
        (status = 200, description = "Item found", body = Item),
        (status = 204, description = "No item with this id")
    )
)]
pub async fn get_item(
    State(state): State<AppState>,
    Path(id): Path<ItemId>,
) -> Result<Response, ApiError> {
    match state.store.find_by_id(id).await? {
        Some(item) => Ok(Json(item).into_response()),
        None => {
            debug!(item_id = id, "Item not found");
            Ok(StatusCode::NO_CONTENT.into_response())
        }
    }
}

/// Replace an item's fields
#[utoipa::path(
    put,
    path = "/api/items/{id}",
    tag = "items",
    params(
        ("id" = i64, Path, description = "Item ID")
    ),
    request_body = ItemRequest,
    responses(
        (status = 200, description = "Item updated", body = Item),
        (status = 400, description = "Validation errors or null body", body = Vec<FieldError>),
        (status = 404, description = "Item not found", body = ErrorResponse),
        (status = 500, description = "Store failure", body = ErrorResponse)
    )
)]
pub async fn update_item(
    State(state): State<AppState>,
    Path(id): Path<ItemId>,
    payload: JsonBody,
) -> Result<Json<Item>, ApiError> {
    let draft = read_body(payload)?.validate().map_err(ApiError::Validation)?;

    let mut item = state.store.find_by_id(id).await?.ok_or(ApiError::NotFound(id))?;
    item.apply(draft);
    let saved = state.store.save(item).await?;

    info!(item_id = id, status = %saved.status, "Item updated");
    Ok(Json(saved))
}

/// Delete an item
#[utoipa::path(
    delete,
    path = "/api/items/{id}",
    tag = "items",
    params(
        ("id" = i64, Path, description = "Item ID")
    ),
    responses(
        (status = 204, description = "Item deleted"),
        (status = 404, description = "Item not found", body = ErrorResponse)
    )
)]
pub async fn delete_item(
    State(state): State<AppState>,
    Path(id): Path<ItemId>,
) -> Result<StatusCode, ApiError> {
    if state.store.delete_by_id(id).await? {
        info!(item_id = id, "Item deleted");
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::NotFound(id))
    }
}

/// Mark every unprocessed item as processed
///
/// Returns only the items this run changed. If any item fails the whole
/// call fails; the error details list the failures and the ids that were
/// already persisted.
#[utoipa::path(
    get,
    path = "/api/items/process",
    tag = "items",
    responses(
        (status = 200, description = "Newly processed items", body = Vec<Item>),
        (status = 500, description = "One or more items failed", body = ErrorResponse)
    )
)]
pub async fn process_items(State(state): State<AppState>) -> Result<Json<Vec<Item>>, ApiError> {
    let items = state.processor.process_all().await?;
    Ok(Json(items))
}

pub fn items_router(state: AppState) -> Router {
    Router::new()
        .route("/api/items", get(list_items).post(create_item))
        .route("/api/items/process", get(process_items))
        .route("/api/items/:id", get(get_item).put(update_item).delete(delete_item))
        .with_state(state)
}
