use btc_wallet_sync::{
    Currency, Direction, EngineView, Provenance, SchedulerState, Settings, WalletEntry,
    WalletSnapshot, WalletValue,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StateResponse {
    #[serde(flatten)]
    pub view: EngineView,
    pub scheduler: SchedulerState,
    pub settings: Settings,
}

#[derive(Debug, Serialize)]
pub struct WalletResponse {
    pub wallet: WalletSnapshot,
    pub provenance: Option<Provenance>,
    pub value: Option<WalletValue>,
}

/// Display-ready strings; monetary values masked when hidden
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SummaryResponse {
    pub currency: Currency,
    pub hidden: bool,
    pub price: Option<String>,
    pub change_24h: Option<String>,
    pub balance: Option<String>,
    pub value: Option<String>,
    pub provenance: Option<Provenance>,
    pub last_updated: Option<DateTime<Utc>>,
    pub transactions: Vec<TransactionLine>,
    pub error: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionLine {
    pub direction: Direction,
    pub amount: String,
    pub confirmed_at: Option<DateTime<Utc>>,
    pub hash: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct RefreshResponse {
    /// False when a refresh was already in flight
    pub started: bool,
    pub error: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ConverterRequest {
    pub sats: String,
}

#[derive(Debug, Serialize)]
pub struct ConverterResponse {
    pub sats: String,
    pub usd: String,
    pub eur: String,
}

#[derive(Debug, Deserialize)]
pub struct AddWalletRequest {
    #[serde(default)]
    pub name: String,
    pub address: String,
}

#[derive(Debug, Deserialize)]
pub struct UpdateWalletRequest {
    pub name: String,
    pub address: String,
}

#[derive(Debug, Serialize)]
pub struct DeleteWalletResponse {
    pub id: String,
    pub status: String,
}

#[derive(Debug, Serialize)]
pub struct SelectWalletResponse {
    pub wallet: WalletEntry,
    pub refreshed: bool,
}
