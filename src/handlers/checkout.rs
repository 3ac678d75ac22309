use crate::handlers::common::{created_response, map_service_error, success_response};
use crate::{auth::CurrentUser, errors::ApiError, AppState};
use axum::{
    extract::{Path, State},
    routing::{get, post},
    Router,
};
use std::sync::Arc;

/// Creates the router for checkout endpoints
pub fn checkout_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/:session", post(place_order))
        .route("/:session/quote", get(quote))
}

/// Price the session cart without placing an order
async fn quote(
    State(state): State<Arc<AppState>>,
    Path(session): Path<String>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let snapshot = state.services.carts.snapshot(&session);
    let quote = state
        .services
        .checkout
        .quote(&snapshot)
        .map_err(map_service_error)?;

    Ok(success_response(quote))
}

/// Place an order from the session cart
async fn place_order(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    Path(session): Path<String>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let snapshot = state.services.carts.snapshot(&session);

    let receipt = state
        .services
        .checkout
        .place_order(user.user_id, &snapshot)
        .await
        .map_err(map_service_error)?;

    // The order is committed; emptying the session cart afterwards
    // cannot fail the checkout.
    state
        .services
        .carts
        .clear(&session)
        .await
        .map_err(map_service_error)?;

    Ok(created_response(receipt))
}
