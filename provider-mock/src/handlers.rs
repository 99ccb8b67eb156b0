/// Axum HTTP handlers for the mocked provider APIs

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, SecondsFormat, Utc};
use std::collections::HashMap;
use std::sync::Arc;

use crate::state::{MockState, BINANCE, BLOCKCYPHER, COINGECKO, ESPLORA};
use crate::types::*;

/// Shared application state
pub type AppState = Arc<MockState>;

/// Custom error type for handlers
pub enum ApiError {
    NotFound(String),
    /// Injected provider outage
    Unavailable(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::Unavailable(msg) => (StatusCode::SERVICE_UNAVAILABLE, msg),
        };

        (status, message).into_response()
    }
}

fn guard(state: &MockState, provider: &str) -> Result<(), ApiError> {
    if state.record_hit(provider) {
        log::debug!("Injected failure for {}", provider);
        return Err(ApiError::Unavailable(format!("{} unavailable", provider)));
    }
    Ok(())
}

/// GET /coingecko/simple/price
/// Returns USD, EUR and 24h change for bitcoin
pub async fn coingecko_price(
    State(state): State<AppState>,
) -> Result<Json<CoinGeckoResponse>, ApiError> {
    guard(&state, COINGECKO)?;
    let data = state.data();

    let mut quotes = CoinGeckoResponse::new();
    quotes.insert(
        "bitcoin".to_string(),
        CoinGeckoQuote {
            usd: data.btc_usd,
            eur: data.btc_eur,
            usd_24h_change: data.change_24h,
        },
    );
    Ok(Json(quotes))
}

/// GET /binance/ticker/24hr?symbol=BTCUSDT|BTCEUR
pub async fn binance_ticker(
    State(state): State<AppState>,
    Query(query): Query<TickerQuery>,
) -> Result<Json<BinanceTicker>, ApiError> {
    guard(&state, BINANCE)?;
    let data = state.data();

    let price = match query.symbol.as_str() {
        "BTCUSDT" => data.btc_usd,
        "BTCEUR" => data.btc_eur,
        other => return Err(ApiError::NotFound(format!("Unknown symbol: {}", other))),
    };
    Ok(Json(BinanceTicker {
        symbol: query.symbol,
        last_price: format!("{:.8}", price),
        price_change_percent: format!("{:.3}", data.change_24h),
    }))
}

/// GET /blockcypher/addrs/{address}
pub async fn blockcypher_address(
    State(state): State<AppState>,
    Path(address): Path<String>,
) -> Result<Json<BlockCypherAddress>, ApiError> {
    guard(&state, BLOCKCYPHER)?;
    let data = state.data();

    let txrefs = data
        .transactions
        .iter()
        .map(|tx| BlockCypherTxRef {
            tx_hash: tx.txid.clone(),
            tx_input_n: if tx.incoming { -1 } else { 0 },
            value: tx.value_sats,
            confirmed: tx.block_time.map(rfc3339),
        })
        .collect();

    Ok(Json(BlockCypherAddress {
        address,
        balance: data.balance_sats as i64,
        txrefs: Some(txrefs),
    }))
}

/// GET /esplora/address/{address}
pub async fn esplora_address(
    State(state): State<AppState>,
    Path(address): Path<String>,
) -> Result<Json<EsploraAddress>, ApiError> {
    guard(&state, ESPLORA)?;
    let data = state.data();

    let spent: u64 = data
        .transactions
        .iter()
        .filter(|tx| !tx.incoming)
        .map(|tx| tx.value_sats)
        .sum();

    Ok(Json(EsploraAddress {
        address,
        chain_stats: EsploraStats {
            funded_txo_sum: data.balance_sats + spent,
            spent_txo_sum: spent,
            tx_count: data.transactions.len() as u64,
        },
    }))
}

/// GET /esplora/address/{address}/txs
/// Outgoing transactions spend a prevout owned by the address
pub async fn esplora_address_txs(
    State(state): State<AppState>,
    Path(address): Path<String>,
) -> Result<Json<Vec<EsploraTx>>, ApiError> {
    guard(&state, ESPLORA)?;
    let data = state.data();

    let txs = data
        .transactions
        .iter()
        .map(|tx| {
            let counterparty = EsploraOutput {
                scriptpubkey_address: Some("bc1qcounterparty".to_string()),
                value: tx.value_sats,
            };
            let own = EsploraOutput {
                scriptpubkey_address: Some(address.clone()),
                value: tx.value_sats,
            };
            let (vin, vout) = if tx.incoming {
                (vec![EsploraInput { prevout: Some(counterparty) }], vec![own])
            } else {
                (vec![EsploraInput { prevout: Some(own) }], vec![counterparty])
            };
            EsploraTx {
                txid: tx.txid.clone(),
                status: EsploraStatus {
                    confirmed: tx.block_time.is_some(),
                    block_time: tx.block_time,
                },
                vin,
                vout,
            }
        })
        .collect();

    Ok(Json(txs))
}

// ============================================================================
// CONTROL ENDPOINTS (not part of any provider API)
// ============================================================================

/// POST /control/fail
/// Toggle an injected outage for one provider, optionally for `count` requests
pub async fn set_failure(
    State(state): State<AppState>,
    Json(req): Json<FailRequest>,
) -> Json<FailResponse> {
    match req.count {
        Some(count) if req.failing => state.fail_next(&req.provider, count),
        _ => state.set_failing(&req.provider, req.failing),
    }
    Json(FailResponse {
        failing: state.failing(),
    })
}

/// GET /control/hits
/// Requests received per provider
pub async fn get_hits(State(state): State<AppState>) -> Json<HashMap<String, u64>> {
    Json(state.all_hits())
}

/// GET /health
/// Health check endpoint
pub async fn health_check() -> &'static str {
    "OK"
}

fn rfc3339(unix_secs: i64) -> String {
    DateTime::<Utc>::from_timestamp(unix_secs, 0)
        .unwrap_or_default()
        .to_rfc3339_opts(SecondsFormat::Secs, true)
}
