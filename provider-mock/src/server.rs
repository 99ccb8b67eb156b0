/// Axum HTTP server setup and routing

use axum::{
    routing::{get, post},
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::handlers::*;
use crate::state::MockState;

pub fn create_router(state: Arc<MockState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Health check
        .route("/health", get(health_check))

        // Price providers
        .route("/coingecko/simple/price", get(coingecko_price))
        .route("/binance/ticker/24hr", get(binance_ticker))

        // Ledger providers
        .route("/blockcypher/addrs/:address", get(blockcypher_address))
        .route("/esplora/address/:address", get(esplora_address))
        .route("/esplora/address/:address/txs", get(esplora_address_txs))

        // Failure injection
        .route("/control/fail", post(set_failure))
        .route("/control/hits", get(get_hits))

        // Shared state
        .with_state(state)

        // Middleware
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

/// Serve on an ephemeral local port in the background
pub async fn spawn(state: Arc<MockState>) -> anyhow::Result<SocketAddr> {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    let app = create_router(state);

    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            log::error!("Provider mock stopped: {}", e);
        }
    });

    log::debug!("Provider mock listening on http://{}", addr);
    Ok(addr)
}

pub async fn run_server(state: Arc<MockState>, host: String, port: u16) -> anyhow::Result<()> {
    let app = create_router(state);

    let addr = format!("{}:{}", host, port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    log::info!("🚀 Provider mock listening on http://{}", addr);
    log::info!("💥 Failure injection: POST /control/fail {{\"provider\": \"coingecko\"}}");

    axum::serve(listener, app).await?;

    Ok(())
}
