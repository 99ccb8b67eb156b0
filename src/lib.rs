//! btc-wallet-sync: resilient Bitcoin price and wallet synchronization
//!
//! Keeps a BTC price (USD, EUR, 24h change) and one watched address's balance
//! and recent transactions up to date from unreliable public APIs.
//!
//! # Architecture
//!
//! - **Retrying fetcher**: every upstream GET gets a bounded number of attempts
//! - **Provider chains**: ordered fallback across price and ledger APIs
//! - **Freshness cache**: wallet data reused for a TTL, only with a usable price
//! - **Engine**: refresh cycles, persisted last-known data, derived values
//! - **Scheduler**: periodic, manual and degraded-retry triggers
//!
//! # Example
//!
//! ```ignore
//! use btc_wallet_sync::{RefreshScheduler, SyncConfig, SyncEngine};
//! use std::sync::Arc;
//!
//! let engine = Arc::new(SyncEngine::new(SyncConfig::from_env()));
//! engine.restore();
//!
//! let scheduler = RefreshScheduler::new(engine.clone());
//! scheduler.start().await;
//!
//! if let Some(value) = engine.wallet_value() {
//!     println!("Wallet is worth ${:.2}", value.usd);
//! }
//! ```

// Public modules
pub mod address;
pub mod cache;
pub mod clock;
pub mod config;
pub mod convert;
pub mod display;
pub mod engine;
pub mod error;
pub mod fetcher;
pub mod ledger;
pub mod price;
pub mod scheduler;
pub mod storage;

// Re-exports for convenience
pub use address::{validate_address, INVALID_ADDRESS_MESSAGE};
pub use cache::{CacheEntry, FreshnessCache};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{ProviderUrls, RefreshCadence, SyncConfig};
pub use convert::{convert_sats, format_number, parse_sats, Conversion};
pub use engine::{
    CycleReport, EngineView, Provenance, RefreshGuard, SettingsChange, SyncEngine, WalletOutcome,
    WalletValue, PRICE_FAILURE_MESSAGE, WALLET_FAILURE_MESSAGE,
};
pub use error::{StorageError, SyncError};
pub use fetcher::{HttpTransport, RetryPolicy, RetryingFetcher, Transport};
pub use ledger::{
    BlockCypherProvider, Direction, EsploraProvider, LedgerProvider, LedgerProviderChain,
    LedgerRecord, Transaction, WalletSnapshot,
};
pub use price::{BinanceProvider, CoinGeckoProvider, PriceProvider, PriceProviderChain, PriceSnapshot};
pub use scheduler::{RefreshScheduler, SchedulerState};
pub use storage::{Currency, PersistedWallet, Settings, Storage, WalletEntry};

// Common result type
pub type Result<T> = std::result::Result<T, SyncError>;
