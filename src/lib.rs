/*!
 * Restaurant-supply storefront API.
 *
 * Serves the product catalog, session carts with discount support,
 * checkout, order tracking with a guarded status machine, and
 * per-user wishlists.
 */

pub mod auth;
pub mod config;
pub mod db;
pub mod entities;
pub mod errors;
pub mod events;
pub mod handlers;
pub mod migrator;
pub mod services;

use axum::{extract::State, routing::get, Json, Router};
use serde_json::json;
use std::sync::Arc;

use crate::config::AppConfig;
use crate::db::DbPool;
use crate::events::EventSender;
use crate::services::AppServices;

/// Shared application state handed to every handler.
pub struct AppState {
    pub db: Arc<DbPool>,
    pub config: AppConfig,
    pub event_sender: EventSender,
    pub services: AppServices,
}

impl AppState {
    pub fn new(
        db: Arc<DbPool>,
        config: AppConfig,
        event_sender: EventSender,
    ) -> Result<Self, errors::ServiceError> {
        let services = AppServices::build(db.clone(), &config, event_sender.clone())?;
        Ok(Self {
            db,
            config,
            event_sender,
            services,
        })
    }
}

/// All versioned API routes, mounted under `/api/v1`.
pub fn api_v1_routes() -> Router<Arc<AppState>> {
    Router::new()
        .nest("/products", handlers::products_routes())
        .nest("/carts", handlers::carts_routes())
        .nest("/checkout", handlers::checkout_routes())
        .nest("/orders", handlers::orders_routes())
        .nest("/wishlist", handlers::wishlists_routes())
}

/// Builds the complete application router.
pub fn app_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/status", get(status))
        .nest("/api/v1", api_v1_routes())
        .with_state(state)
}

/// Liveness plus a database reachability check.
async fn health_check(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    let db_ok = db::check_connection(&state.db).await.is_ok();
    Json(json!({
        "status": if db_ok { "ok" } else { "degraded" },
        "database": if db_ok { "up" } else { "down" },
    }))
}

/// Service identity and build information.
async fn status(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    Json(json!({
        "name": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
        "environment": state.config.environment,
    }))
}
