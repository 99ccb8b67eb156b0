//! Synchronization engine
//!
//! Owns the provider chains, the wallet cache, persisted data and the
//! display-facing state. A refresh cycle always fetches a fresh price first and
//! then resolves the wallet (cache or ledger chain), so the wallet shown after a
//! cycle is valued with the price from that same cycle. Currency values are
//! never stored; [`SyncEngine::wallet_value`] derives them from the latest price
//! on every read.

use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use tokio::sync::broadcast;

use crate::address::validate_address;
use crate::cache::FreshnessCache;
use crate::clock::{Clock, SystemClock};
use crate::config::SyncConfig;
use crate::convert::{convert_sats, Conversion};
use crate::error::SyncError;
use crate::fetcher::RetryingFetcher;
use crate::ledger::{LedgerProviderChain, WalletSnapshot};
use crate::price::{PriceProviderChain, PriceSnapshot};
use crate::storage::{PersistedWallet, Settings, Storage, WalletEntry};

const ERROR_CHANNEL_CAPACITY: usize = 32;

pub const PRICE_FAILURE_MESSAGE: &str = "Failed to fetch price data. Will retry automatically.";
pub const WALLET_FAILURE_MESSAGE: &str = "Failed to fetch wallet data. Please try again later.";

/// Where the displayed wallet data came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Provenance {
    Fresh,
    Cached,
}

/// Wallet balance valued at the latest price
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct WalletValue {
    pub usd: f64,
    pub eur: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum WalletOutcome {
    /// No address configured; only the price was refreshed
    NoAddress,
    Updated(Provenance),
    Failed(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct CycleReport {
    pub price: Option<PriceSnapshot>,
    pub price_error: Option<String>,
    pub wallet: WalletOutcome,
}

impl CycleReport {
    pub fn price_failed(&self) -> bool {
        self.price_error.is_some()
    }
}

/// What changed when settings were applied
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SettingsChange {
    pub address_changed: bool,
    pub auto_refresh_changed: bool,
}

/// Read-only view handed to consumers
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineView {
    pub price: Option<PriceSnapshot>,
    pub wallet: Option<WalletSnapshot>,
    pub provenance: Option<Provenance>,
    pub wallet_value: Option<WalletValue>,
    pub sats_input: String,
    pub conversion: Conversion,
    pub last_error: Option<String>,
    pub is_refreshing: bool,
}

#[derive(Debug, Default)]
struct EngineState {
    price: Option<PriceSnapshot>,
    wallet: Option<WalletSnapshot>,
    provenance: Option<Provenance>,
    sats_input: String,
    conversion: Conversion,
    price_error: Option<String>,
    wallet_error: Option<String>,
}

/// Clears the in-flight flag when dropped, whatever the cycle outcome
#[derive(Debug)]
pub struct RefreshGuard {
    flag: Arc<AtomicBool>,
}

impl Drop for RefreshGuard {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

pub struct SyncEngine {
    config: SyncConfig,
    price_chain: PriceProviderChain,
    ledger_chain: LedgerProviderChain,
    cache: FreshnessCache,
    storage: Storage,
    settings: RwLock<Settings>,
    state: RwLock<EngineState>,
    in_flight: Arc<AtomicBool>,
    errors: broadcast::Sender<String>,
}

impl SyncEngine {
    // ============================================================================
    // Constructors
    // ============================================================================

    /// Engine over the public providers with the wall clock
    pub fn new(config: SyncConfig) -> Self {
        let fetcher = RetryingFetcher::http(config.retry);
        Self::with_fetcher(config, fetcher, Arc::new(SystemClock))
    }

    /// Default provider chains over a custom fetcher and clock
    pub fn with_fetcher(config: SyncConfig, fetcher: RetryingFetcher, clock: Arc<dyn Clock>) -> Self {
        let price_chain = PriceProviderChain::with_defaults(fetcher.clone(), &config.providers);
        let ledger_chain =
            LedgerProviderChain::with_defaults(fetcher, &config.providers, clock.clone());
        let storage = Storage::new(config.data_dir.clone(), config.network);
        Self::with_components(config, price_chain, ledger_chain, storage, clock)
    }

    pub fn with_components(
        config: SyncConfig,
        price_chain: PriceProviderChain,
        ledger_chain: LedgerProviderChain,
        storage: Storage,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let (errors, _) = broadcast::channel(ERROR_CHANNEL_CAPACITY);
        Self {
            cache: FreshnessCache::new(config.cache_ttl, clock),
            config,
            price_chain,
            ledger_chain,
            storage,
            settings: RwLock::new(Settings::default()),
            state: RwLock::new(EngineState::default()),
            in_flight: Arc::new(AtomicBool::new(false)),
            errors,
        }
    }

    /// Load settings and last-known data from storage
    ///
    /// Absent or corrupted files leave the engine empty; a persisted address
    /// that no longer validates is dropped.
    pub fn restore(&self) {
        let mut settings = self.storage.load_settings();
        if !settings.wallet_address.is_empty()
            && validate_address(&settings.wallet_address, self.config.network).is_err()
        {
            log::warn!(
                "Ignoring stored wallet address '{}': invalid format",
                settings.wallet_address
            );
            settings.wallet_address.clear();
        }

        let price = self.storage.load_price();
        let wallet = if settings.wallet_address.is_empty() {
            None
        } else {
            self.storage.load_wallet(&settings.wallet_address)
        };

        let mut state = self.write_state();
        state.price = price;
        state.wallet = wallet.map(|persisted| persisted.wallet);
        state.provenance = None;
        state.conversion = convert_sats(&state.sats_input, state.price.as_ref());
        drop(state);

        log::info!(
            "Restored settings (address: '{}', auto refresh: {})",
            settings.wallet_address,
            settings.auto_refresh
        );
        *self.settings.write().unwrap_or_else(|e| e.into_inner()) = settings;
    }

    // ============================================================================
    // Settings & wallet book
    // ============================================================================

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    pub fn storage(&self) -> &Storage {
        &self.storage
    }

    pub fn cache(&self) -> &FreshnessCache {
        &self.cache
    }

    pub fn settings(&self) -> Settings {
        self.settings
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn address(&self) -> String {
        self.settings
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .wallet_address
            .clone()
    }

    /// Validate, persist and apply new settings
    ///
    /// An invalid address rejects the whole update and is reported on the
    /// error channel; nothing reaches the network.
    pub fn apply_settings(&self, mut settings: Settings) -> Result<SettingsChange, SyncError> {
        settings.wallet_address = settings.wallet_address.trim().to_string();
        if !settings.wallet_address.is_empty() {
            if let Err(e) = validate_address(&settings.wallet_address, self.config.network) {
                self.notify(e.to_string());
                return Err(e);
            }
        }

        if let Err(e) = self.storage.save_settings(&settings) {
            log::warn!("Failed to persist settings: {}", e);
        }

        let previous = {
            let mut current = self.settings.write().unwrap_or_else(|e| e.into_inner());
            std::mem::replace(&mut *current, settings.clone())
        };
        let change = SettingsChange {
            address_changed: previous.wallet_address != settings.wallet_address,
            auto_refresh_changed: previous.auto_refresh != settings.auto_refresh,
        };

        if change.address_changed {
            log::info!("Wallet address changed to '{}'", settings.wallet_address);
            let last_known = if settings.wallet_address.is_empty() {
                None
            } else {
                self.storage.load_wallet(&settings.wallet_address)
            };
            let mut state = self.write_state();
            state.wallet = last_known.map(|persisted| persisted.wallet);
            state.provenance = None;
            state.wallet_error = None;
        }

        Ok(change)
    }

    /// Add an address to the wallet book
    pub fn add_wallet(&self, name: &str, address: &str) -> Result<WalletEntry, SyncError> {
        self.storage.add_wallet(name, address).map_err(|e| {
            self.notify(e.to_string());
            e
        })
    }

    pub fn update_wallet(&self, entry: &WalletEntry) -> Result<WalletEntry, SyncError> {
        self.storage.update_wallet(entry).map_err(|e| {
            self.notify(e.to_string());
            e
        })
    }

    /// Settings with the address of wallet `id` made active
    pub fn settings_for_wallet(&self, id: &str) -> Result<Settings, SyncError> {
        let entry = self
            .storage
            .find_wallet(id)
            .ok_or_else(|| crate::error::StorageError::WalletNotFound(id.to_string()))?;
        Ok(Settings {
            wallet_address: entry.address,
            ..self.settings()
        })
    }

    // ============================================================================
    // Refresh
    // ============================================================================

    pub fn is_refreshing(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Claim the in-flight flag; `None` while another cycle runs
    pub fn try_begin_refresh(&self) -> Option<RefreshGuard> {
        self.in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| RefreshGuard {
                flag: self.in_flight.clone(),
            })
    }

    /// Run one cycle if none is in flight
    ///
    /// Bypasses the scheduler: a failed price fetch arms no degraded retry and
    /// a pending one is not cancelled. Hosts should trigger cycles through
    /// [`RefreshScheduler::refresh_now`](crate::scheduler::RefreshScheduler::refresh_now).
    pub async fn refresh_now(&self) -> Option<CycleReport> {
        match self.try_begin_refresh() {
            Some(guard) => Some(self.refresh_cycle(guard).await),
            None => {
                log::debug!("Refresh already in flight, ignoring trigger");
                None
            }
        }
    }

    /// Fresh price, then the wallet valued with it
    pub async fn refresh_cycle(&self, _guard: RefreshGuard) -> CycleReport {
        log::info!("Refreshing price and wallet data");

        let price = self.refresh_price().await;
        let cycle_price = price.as_ref().ok().copied();
        let wallet = self.refresh_wallet(cycle_price).await;

        CycleReport {
            price: cycle_price,
            price_error: price.err().map(|e| failure_message(PRICE_FAILURE_MESSAGE, &e)),
            wallet,
        }
    }

    /// Fetch a new price through the provider chain
    pub async fn refresh_price(&self) -> Result<PriceSnapshot, SyncError> {
        match self.price_chain.fetch().await {
            Ok(price) => {
                {
                    let mut state = self.write_state();
                    state.price = Some(price);
                    state.price_error = None;
                    state.conversion = convert_sats(&state.sats_input, Some(&price));
                }
                if let Err(e) = self.storage.save_price(&price) {
                    log::warn!("Failed to persist price: {}", e);
                }
                Ok(price)
            }
            Err(e) => {
                log::error!("Error fetching BTC price: {}", e);
                let message = failure_message(PRICE_FAILURE_MESSAGE, &e);
                self.write_state().price_error = Some(message.clone());
                self.notify(message);
                Err(e)
            }
        }
    }

    /// Resolve the wallet for the active address, cache first
    ///
    /// `cycle_price` is stored with a freshly fetched wallet; an entry without
    /// a populated price never counts as fresh.
    pub async fn refresh_wallet(&self, cycle_price: Option<PriceSnapshot>) -> WalletOutcome {
        let address = self.address();
        if address.is_empty() {
            return WalletOutcome::NoAddress;
        }

        if let Some(wallet) = self.cache.get(&address) {
            log::info!("Wallet data for {} served from cache", address);
            self.apply_wallet(&address, wallet, Provenance::Cached);
            return WalletOutcome::Updated(Provenance::Cached);
        }

        match self.ledger_chain.fetch(&address).await {
            Ok(wallet) => {
                self.cache.put(&address, wallet.clone(), cycle_price);
                let persisted = PersistedWallet {
                    wallet: wallet.clone(),
                    price: cycle_price,
                };
                if let Err(e) = self.storage.save_wallet(&persisted) {
                    log::warn!("Failed to persist wallet snapshot: {}", e);
                }
                self.apply_wallet(&address, wallet, Provenance::Fresh);
                WalletOutcome::Updated(Provenance::Fresh)
            }
            Err(e) => {
                log::error!("Error fetching wallet data: {}", e);
                let message = failure_message(WALLET_FAILURE_MESSAGE, &e);
                self.write_state().wallet_error = Some(message.clone());
                self.notify(message.clone());
                WalletOutcome::Failed(message)
            }
        }
    }

    fn apply_wallet(&self, address: &str, wallet: WalletSnapshot, provenance: Provenance) {
        if self.address() != address {
            log::debug!("Discarding wallet data for {}: address changed", address);
            return;
        }
        let mut state = self.write_state();
        state.wallet = Some(wallet);
        state.provenance = Some(provenance);
        state.wallet_error = None;
    }

    // ============================================================================
    // Conversion
    // ============================================================================

    /// Set the sats amount to convert and recompute both outputs
    pub fn set_sats_input(&self, input: &str) -> Conversion {
        let mut state = self.write_state();
        state.sats_input = input.to_string();
        state.conversion = convert_sats(input, state.price.as_ref());
        state.conversion.clone()
    }

    // ============================================================================
    // Accessors
    // ============================================================================

    pub fn price(&self) -> Option<PriceSnapshot> {
        self.read_state().price
    }

    pub fn wallet(&self) -> Option<WalletSnapshot> {
        self.read_state().wallet.clone()
    }

    pub fn provenance(&self) -> Option<Provenance> {
        self.read_state().provenance
    }

    pub fn conversion(&self) -> Conversion {
        self.read_state().conversion.clone()
    }

    /// Wallet balance valued at the latest price
    pub fn wallet_value(&self) -> Option<WalletValue> {
        let state = self.read_state();
        Self::value_of(&state)
    }

    /// Most recent unresolved failure, wallet errors first
    pub fn last_error(&self) -> Option<String> {
        let state = self.read_state();
        state.wallet_error.clone().or_else(|| state.price_error.clone())
    }

    pub fn view(&self) -> EngineView {
        let state = self.read_state();
        EngineView {
            price: state.price,
            wallet: state.wallet.clone(),
            provenance: state.provenance,
            wallet_value: Self::value_of(&state),
            sats_input: state.sats_input.clone(),
            conversion: state.conversion.clone(),
            last_error: state.wallet_error.clone().or_else(|| state.price_error.clone()),
            is_refreshing: self.is_refreshing(),
        }
    }

    /// Error messages for display (provider exhaustion, invalid addresses)
    pub fn subscribe_errors(&self) -> broadcast::Receiver<String> {
        self.errors.subscribe()
    }

    fn value_of(state: &EngineState) -> Option<WalletValue> {
        let wallet = state.wallet.as_ref()?;
        let price = state.price.filter(|p| p.is_populated())?;
        let btc = wallet.balance_btc();
        Some(WalletValue {
            usd: btc * price.btc_price_usd,
            eur: btc * price.btc_price_eur,
        })
    }

    fn notify(&self, message: String) {
        // No subscribers is fine
        let _ = self.errors.send(message);
    }

    fn read_state(&self) -> std::sync::RwLockReadGuard<'_, EngineState> {
        self.state.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write_state(&self) -> std::sync::RwLockWriteGuard<'_, EngineState> {
        self.state.write().unwrap_or_else(|e| e.into_inner())
    }
}

/// User-facing message followed by the provider reasons
fn failure_message(summary: &str, err: &SyncError) -> String {
    format!("{} ({})", summary, err)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_guard_is_exclusive_and_released_on_drop() {
        let engine = SyncEngine::new(SyncConfig {
            data_dir: std::env::temp_dir().join("btc-wallet-sync-guard-test"),
            ..SyncConfig::default()
        });

        let guard = engine.try_begin_refresh().unwrap();
        assert!(engine.is_refreshing());
        assert!(engine.try_begin_refresh().is_none());

        drop(guard);
        assert!(!engine.is_refreshing());
        assert!(engine.try_begin_refresh().is_some());
    }

    #[test]
    fn test_wallet_value_requires_price() {
        let state = EngineState {
            wallet: Some(WalletSnapshot {
                address: "1BoatSLRHtKNngkdXEeobR76b53LETtpyT".to_string(),
                balance_sats: 50_000_000,
                transactions: Vec::new(),
                last_updated: chrono::Utc::now(),
            }),
            ..EngineState::default()
        };
        assert!(SyncEngine::value_of(&state).is_none());

        let priced = EngineState {
            price: Some(PriceSnapshot {
                btc_price_usd: 60_000.0,
                btc_price_eur: 50_000.0,
                price_change_percent_24h: 0.0,
            }),
            ..state
        };
        assert_eq!(
            SyncEngine::value_of(&priced),
            Some(WalletValue {
                usd: 30_000.0,
                eur: 25_000.0
            })
        );
    }
}
