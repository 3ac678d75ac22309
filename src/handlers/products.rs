use crate::handlers::common::{map_service_error, success_response};
use crate::services::catalog::ProductFilter;
use crate::{errors::ApiError, AppState};
use axum::{
    extract::{Path, Query, State},
    routing::get,
    Router,
};
use std::sync::Arc;
use uuid::Uuid;

/// Creates the router for catalog endpoints
pub fn products_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(list_products))
        .route("/categories", get(list_categories))
        .route("/:id", get(get_product))
}

/// List products with optional category and name filters
async fn list_products(
    State(state): State<Arc<AppState>>,
    Query(filter): Query<ProductFilter>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let page = state
        .services
        .catalog
        .list_products(&filter)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(page))
}

/// List distinct product categories
async fn list_categories(
    State(state): State<Arc<AppState>>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let categories = state
        .services
        .catalog
        .list_categories()
        .await
        .map_err(map_service_error)?;

    Ok(success_response(categories))
}

/// Get a single product
async fn get_product(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let product = state
        .services
        .catalog
        .get_product(id)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(product))
}
