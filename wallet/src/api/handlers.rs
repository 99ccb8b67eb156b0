use axum::{
    extract::{Path, State},
    Json,
};
use btc_wallet_sync::{
    display::{format_btc, format_currency, format_percentage},
    ledger::SATS_PER_BTC,
    Currency, PriceSnapshot, RefreshScheduler, Settings, WalletEntry, WalletOutcome,
};
use std::sync::Arc;

use super::types::*;
use crate::error::ApiError;

/// Shared application state
pub type AppState = Arc<RefreshScheduler>;

pub async fn health_handler() -> &'static str {
    "OK"
}

pub async fn get_state_handler(State(scheduler): State<AppState>) -> Json<StateResponse> {
    let engine = scheduler.engine();
    Json(StateResponse {
        view: engine.view(),
        scheduler: scheduler.state(),
        settings: engine.settings(),
    })
}

pub async fn get_price_handler(
    State(scheduler): State<AppState>,
) -> Result<Json<PriceSnapshot>, ApiError> {
    scheduler
        .engine()
        .price()
        .map(Json)
        .ok_or_else(|| ApiError::Unavailable("Price data not loaded yet".to_string()))
}

pub async fn get_wallet_handler(
    State(scheduler): State<AppState>,
) -> Result<Json<WalletResponse>, ApiError> {
    let engine = scheduler.engine();
    let wallet = engine
        .wallet()
        .ok_or_else(|| ApiError::WalletNotFound("no wallet data for the active address".to_string()))?;

    Ok(Json(WalletResponse {
        wallet,
        provenance: engine.provenance(),
        value: engine.wallet_value(),
    }))
}

pub async fn get_summary_handler(State(scheduler): State<AppState>) -> Json<SummaryResponse> {
    let engine = scheduler.engine();
    let settings = engine.settings();
    let view = engine.view();
    let hide = settings.hide_values;
    let currency = settings.currency;

    let transactions = view
        .wallet
        .as_ref()
        .map(|wallet| {
            wallet
                .transactions
                .iter()
                .map(|tx| TransactionLine {
                    direction: tx.direction,
                    amount: format!("{} BTC", format_btc(tx.value_sats as f64 / SATS_PER_BTC, hide)),
                    confirmed_at: tx.confirmed_at,
                    hash: tx.hash.clone(),
                })
                .collect()
        })
        .unwrap_or_default();

    Json(SummaryResponse {
        currency,
        hidden: hide,
        price: view
            .price
            .map(|p| format_currency(p.price_in(currency), currency, false)),
        change_24h: view
            .price
            .map(|p| format!("{}%", format_percentage(p.price_change_percent_24h))),
        balance: view
            .wallet
            .as_ref()
            .map(|w| format!("{} BTC", format_btc(w.balance_btc(), hide))),
        value: view.wallet_value.map(|v| {
            let amount = match currency {
                Currency::Usd => v.usd,
                Currency::Eur => v.eur,
            };
            format_currency(amount, currency, hide)
        }),
        provenance: view.provenance,
        last_updated: view.wallet.as_ref().map(|w| w.last_updated),
        transactions,
        error: view.last_error,
    })
}

pub async fn refresh_handler(State(scheduler): State<AppState>) -> Json<RefreshResponse> {
    let Some(report) = scheduler.refresh_now().await else {
        return Json(RefreshResponse {
            started: false,
            error: None,
        });
    };

    let error = match report.wallet {
        WalletOutcome::Failed(message) => Some(message),
        _ => report.price_error,
    };
    Json(RefreshResponse {
        started: true,
        error,
    })
}

pub async fn get_converter_handler(State(scheduler): State<AppState>) -> Json<ConverterResponse> {
    let view = scheduler.engine().view();
    Json(ConverterResponse {
        sats: view.sats_input,
        usd: view.conversion.usd,
        eur: view.conversion.eur,
    })
}

pub async fn set_converter_handler(
    State(scheduler): State<AppState>,
    Json(req): Json<ConverterRequest>,
) -> Json<ConverterResponse> {
    let conversion = scheduler.engine().set_sats_input(&req.sats);
    Json(ConverterResponse {
        sats: req.sats,
        usd: conversion.usd,
        eur: conversion.eur,
    })
}

pub async fn get_settings_handler(State(scheduler): State<AppState>) -> Json<Settings> {
    Json(scheduler.engine().settings())
}

pub async fn put_settings_handler(
    State(scheduler): State<AppState>,
    Json(settings): Json<Settings>,
) -> Result<Json<Settings>, ApiError> {
    scheduler.apply_settings(settings).await?;
    Ok(Json(scheduler.engine().settings()))
}

pub async fn list_wallets_handler(State(scheduler): State<AppState>) -> Json<Vec<WalletEntry>> {
    Json(scheduler.engine().storage().list_wallets())
}

/// Add a wallet and make it the active one
pub async fn add_wallet_handler(
    State(scheduler): State<AppState>,
    Json(req): Json<AddWalletRequest>,
) -> Result<Json<WalletEntry>, ApiError> {
    let entry = scheduler.engine().add_wallet(&req.name, &req.address)?;
    scheduler.select_wallet(&entry.id).await?;
    Ok(Json(entry))
}

pub async fn update_wallet_handler(
    State(scheduler): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<UpdateWalletRequest>,
) -> Result<Json<WalletEntry>, ApiError> {
    let engine = scheduler.engine();
    let previous = engine
        .storage()
        .find_wallet(&id)
        .ok_or_else(|| ApiError::WalletNotFound(id.clone()))?;

    let updated = engine.update_wallet(&WalletEntry {
        id,
        name: req.name,
        address: req.address,
    })?;

    // Editing the active wallet's address follows it
    if previous.address == engine.address() && previous.address != updated.address {
        scheduler.select_wallet(&updated.id).await?;
    }
    Ok(Json(updated))
}

pub async fn delete_wallet_handler(
    State(scheduler): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<DeleteWalletResponse>, ApiError> {
    let engine = scheduler.engine();
    let removed = engine.storage().remove_wallet(&id)?;

    if removed.address == engine.address() {
        let next = engine
            .storage()
            .list_wallets()
            .into_iter()
            .next()
            .map(|w| w.address)
            .unwrap_or_default();
        scheduler
            .apply_settings(Settings {
                wallet_address: next,
                ..engine.settings()
            })
            .await?;
    }

    Ok(Json(DeleteWalletResponse {
        id,
        status: "deleted".to_string(),
    }))
}

pub async fn select_wallet_handler(
    State(scheduler): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<SelectWalletResponse>, ApiError> {
    let entry = scheduler
        .engine()
        .storage()
        .find_wallet(&id)
        .ok_or_else(|| ApiError::WalletNotFound(id.clone()))?;
    let report = scheduler.select_wallet(&id).await?;

    Ok(Json(SelectWalletResponse {
        wallet: entry,
        refreshed: report.is_some(),
    }))
}
