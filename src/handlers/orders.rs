use crate::entities::OrderStatus;
use crate::handlers::common::{map_service_error, success_response, PaginationParams};
use crate::{auth::CurrentUser, errors::ApiError, AppState};
use axum::{
    extract::{Json, Path, Query, State},
    routing::{get, post, put},
    Router,
};
use serde::Deserialize;
use std::str::FromStr;
use std::sync::Arc;
use uuid::Uuid;

/// Creates the router for order endpoints
pub fn orders_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(list_my_orders))
        .route("/all", get(list_all_orders))
        .route("/:id", get(get_order))
        .route("/:id/status", put(update_order_status))
        .route("/:id/pickup", post(mark_for_pickup))
}

/// List the caller's orders
async fn list_my_orders(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    Query(pagination): Query<PaginationParams>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let page = state
        .services
        .orders
        .list_for_user(&user, pagination.page, pagination.per_page)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(page))
}

/// List every order in the system (staff only)
async fn list_all_orders(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    Query(pagination): Query<PaginationParams>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let page = state
        .services
        .orders
        .list_all(&user, pagination.page, pagination.per_page)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(page))
}

/// Get an order with its items
async fn get_order(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let order = state
        .services
        .orders
        .get_order(&user, id)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(order))
}

/// Update an order's status (staff only)
async fn update_order_status(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateStatusRequest>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let new_status =
        OrderStatus::from_str(&payload.status).map_err(ApiError::BadRequest)?;

    let order = state
        .services
        .order_status
        .update_status(&user, id, new_status)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(order))
}

/// Switch the caller's own order to store pickup
async fn mark_for_pickup(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let order = state
        .services
        .order_status
        .mark_for_pickup(&user, id)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(order))
}

// Request DTOs

#[derive(Debug, Deserialize)]
struct UpdateStatusRequest {
    status: String,
}
