//! Wallet balance and recent transactions from blockchain explorers
//!
//! Three explorers are consulted in order (BlockCypher, Blockstream, Mempool).
//! Each one is normalized to the same shape before it reaches the chain.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::clock::Clock;
use crate::config::ProviderUrls;
use crate::error::SyncError;
use crate::fetcher::RetryingFetcher;

pub const SATS_PER_BTC: f64 = 100_000_000.0;

/// Number of transactions kept from a provider response
pub const MAX_TRANSACTIONS: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Incoming,
    Outgoing,
}

impl Direction {
    /// Input index reported by explorers for outputs received by the address
    pub const INCOMING_INPUT_INDEX: i64 = -1;

    pub fn from_input_index(tx_input_n: i64) -> Self {
        if tx_input_n == Self::INCOMING_INPUT_INDEX {
            Self::Incoming
        } else {
            Self::Outgoing
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    /// Block time; `None` while unconfirmed
    pub confirmed_at: Option<DateTime<Utc>>,
    pub direction: Direction,
    pub value_sats: u64,
    pub hash: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WalletSnapshot {
    pub address: String,
    pub balance_sats: u64,
    /// Most recent first, at most [`MAX_TRANSACTIONS`]
    pub transactions: Vec<Transaction>,
    pub last_updated: DateTime<Utc>,
}

impl WalletSnapshot {
    pub fn balance_btc(&self) -> f64 {
        self.balance_sats as f64 / SATS_PER_BTC
    }
}

/// Provider output before the chain stamps and truncates it
#[derive(Debug, Clone, PartialEq)]
pub struct LedgerRecord {
    pub balance_sats: u64,
    pub transactions: Vec<Transaction>,
}

#[async_trait]
pub trait LedgerProvider: Send + Sync {
    fn name(&self) -> &str;

    async fn fetch_ledger(&self, address: &str) -> Result<LedgerRecord, SyncError>;
}

// ============================================================================
// BlockCypher
// ============================================================================

#[derive(Debug, Deserialize)]
struct BlockCypherAddress {
    balance: i64,
    #[serde(default)]
    txrefs: Option<Vec<BlockCypherTxRef>>,
}

#[derive(Debug, Deserialize)]
struct BlockCypherTxRef {
    #[serde(default)]
    tx_hash: Option<String>,
    tx_input_n: i64,
    value: u64,
    #[serde(default)]
    confirmed: Option<DateTime<Utc>>,
}

pub struct BlockCypherProvider {
    fetcher: RetryingFetcher,
    base_url: String,
}

impl BlockCypherProvider {
    pub fn new(fetcher: RetryingFetcher, base_url: impl Into<String>) -> Self {
        Self {
            fetcher,
            base_url: base_url.into(),
        }
    }
}

#[async_trait]
impl LedgerProvider for BlockCypherProvider {
    fn name(&self) -> &str {
        "blockcypher"
    }

    async fn fetch_ledger(&self, address: &str) -> Result<LedgerRecord, SyncError> {
        let url = format!("{}/addrs/{}", self.base_url.trim_end_matches('/'), address);
        let data: BlockCypherAddress = self.fetcher.fetch_json(&url).await?;

        let balance_sats = u64::try_from(data.balance)
            .map_err(|_| SyncError::decode(format!("negative balance {}", data.balance)))?;

        let transactions = data
            .txrefs
            .unwrap_or_default()
            .into_iter()
            .map(|tx| Transaction {
                confirmed_at: tx.confirmed,
                direction: Direction::from_input_index(tx.tx_input_n),
                value_sats: tx.value,
                hash: tx.tx_hash,
            })
            .collect();

        Ok(LedgerRecord {
            balance_sats,
            transactions,
        })
    }
}

// ============================================================================
// Esplora (Blockstream, Mempool)
// ============================================================================

#[derive(Debug, Deserialize)]
struct EsploraAddress {
    chain_stats: EsploraStats,
}

#[derive(Debug, Deserialize)]
struct EsploraStats {
    funded_txo_sum: u64,
    spent_txo_sum: u64,
}

#[derive(Debug, Deserialize)]
struct EsploraTx {
    txid: String,
    status: EsploraStatus,
    #[serde(default)]
    vin: Vec<EsploraInput>,
    #[serde(default)]
    vout: Vec<EsploraOutput>,
}

#[derive(Debug, Deserialize)]
struct EsploraStatus {
    confirmed: bool,
    #[serde(default)]
    block_time: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct EsploraInput {
    #[serde(default)]
    prevout: Option<EsploraOutput>,
}

#[derive(Debug, Deserialize)]
struct EsploraOutput {
    #[serde(default)]
    scriptpubkey_address: Option<String>,
    value: u64,
}

/// Any Esplora-compatible explorer
pub struct EsploraProvider {
    name: String,
    fetcher: RetryingFetcher,
    base_url: String,
}

impl EsploraProvider {
    pub fn new(
        name: impl Into<String>,
        fetcher: RetryingFetcher,
        base_url: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            fetcher,
            base_url: base_url.into(),
        }
    }

    fn normalize(address: &str, tx: EsploraTx) -> Transaction {
        let pays_address = |o: &EsploraOutput| o.scriptpubkey_address.as_deref() == Some(address);

        let spent: u64 = tx
            .vin
            .iter()
            .filter_map(|input| input.prevout.as_ref())
            .filter(|prevout| pays_address(*prevout))
            .map(|prevout| prevout.value)
            .sum();
        let received: u64 = tx
            .vout
            .iter()
            .filter(|output| pays_address(*output))
            .map(|output| output.value)
            .sum();

        let (direction, value_sats) = if spent > 0 {
            (Direction::Outgoing, spent.saturating_sub(received))
        } else {
            (Direction::Incoming, received)
        };

        let confirmed_at = if tx.status.confirmed {
            tx.status
                .block_time
                .and_then(|secs| DateTime::from_timestamp(secs, 0))
        } else {
            None
        };

        Transaction {
            confirmed_at,
            direction,
            value_sats,
            hash: Some(tx.txid),
        }
    }
}

#[async_trait]
impl LedgerProvider for EsploraProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn fetch_ledger(&self, address: &str) -> Result<LedgerRecord, SyncError> {
        let base = self.base_url.trim_end_matches('/');

        let info: EsploraAddress = self
            .fetcher
            .fetch_json(&format!("{}/address/{}", base, address))
            .await?;
        let txs: Vec<EsploraTx> = self
            .fetcher
            .fetch_json(&format!("{}/address/{}/txs", base, address))
            .await?;

        let balance_sats = info
            .chain_stats
            .funded_txo_sum
            .saturating_sub(info.chain_stats.spent_txo_sum);

        Ok(LedgerRecord {
            balance_sats,
            transactions: txs
                .into_iter()
                .map(|tx| Self::normalize(address, tx))
                .collect(),
        })
    }
}

// ============================================================================
// Chain
// ============================================================================

pub struct LedgerProviderChain {
    providers: Vec<Box<dyn LedgerProvider>>,
    clock: Arc<dyn Clock>,
}

impl LedgerProviderChain {
    pub fn new(providers: Vec<Box<dyn LedgerProvider>>, clock: Arc<dyn Clock>) -> Self {
        Self { providers, clock }
    }

    /// BlockCypher, then Blockstream, then Mempool
    pub fn with_defaults(fetcher: RetryingFetcher, urls: &ProviderUrls, clock: Arc<dyn Clock>) -> Self {
        Self::new(
            vec![
                Box::new(BlockCypherProvider::new(fetcher.clone(), urls.blockcypher.clone())),
                Box::new(EsploraProvider::new("blockstream", fetcher.clone(), urls.blockstream.clone())),
                Box::new(EsploraProvider::new("mempool", fetcher, urls.mempool.clone())),
            ],
            clock,
        )
    }

    pub fn provider_names(&self) -> Vec<&str> {
        self.providers.iter().map(|p| p.name()).collect()
    }

    /// Snapshot from the first provider that answers for `address`
    pub async fn fetch(&self, address: &str) -> Result<WalletSnapshot, SyncError> {
        let mut failures = Vec::with_capacity(self.providers.len());

        for provider in &self.providers {
            match provider.fetch_ledger(address).await {
                Ok(mut record) => {
                    record.transactions.truncate(MAX_TRANSACTIONS);
                    log::debug!(
                        "Wallet {} from {}: {} sats, {} transactions",
                        address,
                        provider.name(),
                        record.balance_sats,
                        record.transactions.len()
                    );
                    return Ok(WalletSnapshot {
                        address: address.to_string(),
                        balance_sats: record.balance_sats,
                        transactions: record.transactions,
                        last_updated: self.clock.now(),
                    });
                }
                Err(e) => {
                    log::warn!("{} API failed, trying next...: {}", provider.name(), e);
                    failures.push(format!("{}: {}", provider.name(), e));
                }
            }
        }

        log::error!("All blockchain APIs failed for {}", address);
        Err(SyncError::ProviderExhausted(format!(
            "All blockchain APIs failed: {}",
            failures.join(", ")
        )))
    }
}
