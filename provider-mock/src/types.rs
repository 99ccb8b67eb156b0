/// Upstream API response types
///
/// These match the public provider formats so the sync engine consumes them
/// unchanged.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

// ============================================================================
// Price providers
// ============================================================================

/// Quote body of `/simple/price`, keyed by coin id
pub type CoinGeckoResponse = HashMap<String, CoinGeckoQuote>;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoinGeckoQuote {
    pub usd: f64,
    pub eur: f64,
    pub usd_24h_change: f64,
}

/// `/ticker/24hr` response; prices are decimal strings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BinanceTicker {
    pub symbol: String,
    pub last_price: String,
    pub price_change_percent: String,
}

#[derive(Debug, Deserialize)]
pub struct TickerQuery {
    pub symbol: String,
}

// ============================================================================
// Ledger providers
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlockCypherAddress {
    pub address: String,
    pub balance: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub txrefs: Option<Vec<BlockCypherTxRef>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlockCypherTxRef {
    pub tx_hash: String,
    /// -1 for outputs paying the address, input index otherwise
    pub tx_input_n: i64,
    pub value: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confirmed: Option<String>,
}

/// Address summary from /address/{address}
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EsploraAddress {
    pub address: String,
    pub chain_stats: EsploraStats,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EsploraStats {
    pub funded_txo_sum: u64,
    pub spent_txo_sum: u64,
    pub tx_count: u64,
}

/// Transaction from /address/{address}/txs
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EsploraTx {
    pub txid: String,
    pub status: EsploraStatus,
    pub vin: Vec<EsploraInput>,
    pub vout: Vec<EsploraOutput>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EsploraStatus {
    pub confirmed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub block_time: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EsploraInput {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prevout: Option<EsploraOutput>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EsploraOutput {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scriptpubkey_address: Option<String>,
    pub value: u64,
}

// ============================================================================
// Control endpoints (not part of any provider API)
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct FailRequest {
    pub provider: String,
    /// Fail only the next `count` requests
    #[serde(default)]
    pub count: Option<u32>,
    #[serde(default = "default_failing")]
    pub failing: bool,
}

fn default_failing() -> bool {
    true
}

#[derive(Debug, Serialize, Deserialize)]
pub struct FailResponse {
    pub failing: Vec<String>,
}
