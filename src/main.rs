use anyhow::Context;
use axum::http::HeaderValue;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tower_http::{cors::CorsLayer, timeout::TimeoutLayer, trace::TraceLayer};
use tracing::{info, warn};

use supplyfront_api::{app_router, config, db, events, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let app_config = config::load_config().context("Failed to load configuration")?;
    config::init_tracing(app_config.log_level(), app_config.log_json);

    info!(
        environment = %app_config.environment,
        "Starting {} v{}",
        env!("CARGO_PKG_NAME"),
        env!("CARGO_PKG_VERSION")
    );

    let db_pool = Arc::new(
        db::establish_connection_from_app_config(&app_config)
            .await
            .context("Failed to connect to database")?,
    );

    if app_config.auto_migrate {
        db::run_migrations(&db_pool)
            .await
            .context("Failed to run database migrations")?;
    }

    let (event_tx, event_rx) = tokio::sync::mpsc::channel(1024);
    tokio::spawn(events::process_events(event_rx));
    let event_sender = events::EventSender::new(event_tx);

    let cors = cors_layer(&app_config);
    let timeout = TimeoutLayer::new(Duration::from_secs(app_config.request_timeout_secs));

    let addr = format!("{}:{}", app_config.host, app_config.port);
    let state = Arc::new(AppState::new(db_pool, app_config, event_sender)?);

    let app = app_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(timeout);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!("Listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shut down cleanly");
    Ok(())
}

fn cors_layer(cfg: &config::AppConfig) -> CorsLayer {
    match cfg.cors_allowed_origins.as_deref() {
        Some(origins) if !origins.trim().is_empty() => {
            let parsed: Vec<HeaderValue> = origins
                .split(',')
                .filter_map(|o| {
                    let o = o.trim();
                    match o.parse::<HeaderValue>() {
                        Ok(v) => Some(v),
                        Err(_) => {
                            warn!("Ignoring invalid CORS origin: {}", o);
                            None
                        }
                    }
                })
                .collect();
            CorsLayer::new()
                .allow_origin(parsed)
                .allow_methods(tower_http::cors::Any)
                .allow_headers(tower_http::cors::Any)
        }
        _ => CorsLayer::permissive(),
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to install Ctrl+C handler: {}", e);
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => warn!("Failed to install SIGTERM handler: {}", e),
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, shutting down"),
        _ = terminate => info!("Received SIGTERM, shutting down"),
    }
}
