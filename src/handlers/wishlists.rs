use crate::handlers::common::{map_service_error, success_response};
use crate::{auth::CurrentUser, errors::ApiError, AppState};
use axum::{
    extract::{Path, State},
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use uuid::Uuid;

/// Creates the router for wishlist endpoints
pub fn wishlists_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(list_wishlist))
        .route("/:product_id", get(check_wishlist))
        .route("/:product_id/toggle", post(toggle_wishlist))
}

/// List the caller's wishlist with product details
async fn list_wishlist(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let entries = state
        .services
        .wishlists
        .list(user.user_id)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(entries))
}

/// Check whether a product is on the caller's wishlist
async fn check_wishlist(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    Path(product_id): Path<Uuid>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let wishlisted = state
        .services
        .wishlists
        .contains(user.user_id, product_id)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(serde_json::json!({
        "product_id": product_id,
        "wishlisted": wishlisted
    })))
}

/// Toggle a product on the caller's wishlist
async fn toggle_wishlist(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    Path(product_id): Path<Uuid>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let outcome = state
        .services
        .wishlists
        .toggle(user.user_id, product_id)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(serde_json::json!({
        "product_id": product_id,
        "result": outcome
    })))
}
