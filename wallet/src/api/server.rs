use axum::{
    http::HeaderValue,
    routing::{get, post, put},
    Router,
};
use btc_wallet_sync::{RefreshScheduler, SyncEngine};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

use super::handlers::{self, AppState};
use crate::config::MonitorConfig;

pub fn create_router(state: AppState, allowed_origins: &[String]) -> Router {
    // Set ALLOWED_ORIGINS="https://your-dashboard.example" for production
    // If not set, allows any origin (development mode)
    let cors = if allowed_origins.is_empty() {
        log::warn!("CORS: Allowing all origins (development mode). Set ALLOWED_ORIGINS env var for production.");
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        log::info!("CORS configured for origins: {}", allowed_origins.join(","));
        let origin_list: Vec<HeaderValue> = allowed_origins
            .iter()
            .filter_map(|origin| match origin.parse() {
                Ok(value) => Some(value),
                Err(_) => {
                    log::warn!("Ignoring invalid CORS origin '{}'", origin);
                    None
                }
            })
            .collect();
        CorsLayer::new()
            .allow_origin(origin_list)
            .allow_methods(Any)
            .allow_headers(Any)
    };

    Router::new()
        .route("/health", get(handlers::health_handler))
        // Dashboard data
        .route("/api/state", get(handlers::get_state_handler))
        .route("/api/price", get(handlers::get_price_handler))
        .route("/api/wallet", get(handlers::get_wallet_handler))
        .route("/api/summary", get(handlers::get_summary_handler))
        .route("/api/refresh", post(handlers::refresh_handler))
        .route(
            "/api/converter",
            get(handlers::get_converter_handler).put(handlers::set_converter_handler),
        )
        .route(
            "/api/settings",
            get(handlers::get_settings_handler).put(handlers::put_settings_handler),
        )
        // Wallet book
        .route(
            "/api/wallets",
            get(handlers::list_wallets_handler).post(handlers::add_wallet_handler),
        )
        .route(
            "/api/wallets/:id",
            put(handlers::update_wallet_handler).delete(handlers::delete_wallet_handler),
        )
        .route(
            "/api/wallets/:id/select",
            post(handlers::select_wallet_handler),
        )
        .layer(cors)
        .with_state(state)
}

pub async fn start_server(config: MonitorConfig) -> anyhow::Result<()> {
    let engine = Arc::new(SyncEngine::new(config.sync.clone()));
    engine.restore();

    // Surface engine errors in the server log
    let mut errors = engine.subscribe_errors();
    tokio::spawn(async move {
        while let Ok(message) = errors.recv().await {
            log::error!("❌ {}", message);
        }
    });

    let scheduler = Arc::new(RefreshScheduler::new(engine));
    let app = create_router(scheduler.clone(), &config.allowed_origins);

    // Initial cycle runs in the background so the API is reachable immediately
    let startup = scheduler.clone();
    tokio::spawn(async move {
        startup.start().await;
    });

    let listener = tokio::net::TcpListener::bind(&config.bind_address).await?;
    log::info!("Server listening on http://{}", config.bind_address);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    scheduler.stop();
    Ok(())
}

/// Handle graceful shutdown signals (Ctrl+C, SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            log::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                log::error!("Failed to install signal handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            log::info!("Received Ctrl+C signal");
        },
        _ = terminate => {
            log::info!("Received SIGTERM signal");
        },
    }

    log::info!("Shutting down gracefully...");
}
