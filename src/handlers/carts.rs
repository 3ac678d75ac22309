use crate::handlers::common::{map_service_error, no_content_response, success_response, validate_input};
use crate::{auth::CurrentUser, errors::ApiError, AppState};
use axum::{
    extract::{Json, Path, State},
    routing::{delete, get, post, put},
    Router,
};
use serde::Deserialize;
use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;

/// Creates the router for session cart endpoints.
///
/// Carts are keyed by an opaque client-chosen session string and need
/// no authentication; binding a cart to a signed-in user is the one
/// exception.
pub fn carts_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/:session", get(get_cart))
        .route("/:session/items", post(add_to_cart))
        .route("/:session/items/:product_id", put(update_cart_item))
        .route("/:session/items/:product_id", delete(remove_cart_item))
        .route("/:session/discount", post(apply_discount))
        .route("/:session/discount", delete(remove_discount))
        .route("/:session/clear", post(clear_cart))
        .route("/:session/bind", post(bind_cart))
}

/// Get current cart contents
async fn get_cart(
    State(state): State<Arc<AppState>>,
    Path(session): Path<String>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    Ok(success_response(state.services.carts.snapshot(&session)))
}

/// Add a product to the cart
async fn add_to_cart(
    State(state): State<Arc<AppState>>,
    Path(session): Path<String>,
    Json(payload): Json<AddItemRequest>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    // Price and name come from the catalog, never from the client.
    let product = state
        .services
        .catalog
        .get_product(payload.product_id)
        .await
        .map_err(map_service_error)?;

    let cart = state
        .services
        .carts
        .add_item(
            &session,
            product.id,
            &product.name,
            product.price,
            payload.quantity,
        )
        .await
        .map_err(map_service_error)?;

    Ok(success_response(cart))
}

/// Set the quantity of a cart line
async fn update_cart_item(
    State(state): State<Arc<AppState>>,
    Path((session, product_id)): Path<(String, Uuid)>,
    Json(payload): Json<UpdateQuantityRequest>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let cart = state
        .services
        .carts
        .update_quantity(&session, product_id, payload.quantity)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(cart))
}

/// Remove a line from the cart
async fn remove_cart_item(
    State(state): State<Arc<AppState>>,
    Path((session, product_id)): Path<(String, Uuid)>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    state
        .services
        .carts
        .remove_item(&session, product_id)
        .await
        .map_err(map_service_error)?;

    Ok(no_content_response())
}

/// Apply a discount code to the cart
async fn apply_discount(
    State(state): State<Arc<AppState>>,
    Path(session): Path<String>,
    Json(payload): Json<DiscountRequest>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    validate_input(&payload)?;

    let cart = state
        .services
        .carts
        .apply_discount(&session, &payload.code)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(cart))
}

/// Remove any applied discount code
async fn remove_discount(
    State(state): State<Arc<AppState>>,
    Path(session): Path<String>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let cart = state
        .services
        .carts
        .remove_discount(&session)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(cart))
}

/// Clear all items from the cart
async fn clear_cart(
    State(state): State<Arc<AppState>>,
    Path(session): Path<String>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    state
        .services
        .carts
        .clear(&session)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(serde_json::json!({
        "message": "Cart cleared successfully"
    })))
}

/// Bind the session cart to the signed-in user so it starts mirroring
/// to the stored cart
async fn bind_cart(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    Path(session): Path<String>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let cart = state
        .services
        .carts
        .bind_user(&session, user.user_id)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(cart))
}

// Request DTOs

/// Non-positive quantities are accepted and normalized by the cart
/// service (no-op on add, removal on update).
#[derive(Debug, Deserialize)]
struct AddItemRequest {
    product_id: Uuid,
    quantity: i32,
}

#[derive(Debug, Deserialize)]
struct UpdateQuantityRequest {
    quantity: i32,
}

#[derive(Debug, Deserialize, Validate)]
struct DiscountRequest {
    #[validate(length(min = 1))]
    code: String,
}
