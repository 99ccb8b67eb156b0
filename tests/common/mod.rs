//! Common test utilities for sync engine integration tests
//!
//! This module provides shared test infrastructure including:
//! - Scripted price and ledger providers with call counting
//! - A scripted HTTP transport keyed by URL fragment
//! - Test environment setup over a temporary data directory
#![allow(dead_code)]

use async_trait::async_trait;
use btc_wallet_sync::{
    Clock, LedgerProvider, LedgerProviderChain, LedgerRecord, ManualClock, PriceProvider,
    PriceProviderChain, PriceSnapshot, Storage, SyncConfig, SyncEngine, SyncError, Transport,
};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;
use tokio::time::Instant;

pub const ADDRESS: &str = "bc1qw508d6qejxtdg4y5r3zarvary0c5xw7kv8f3t4";
pub const OTHER_ADDRESS: &str = "1BoatSLRHtKNngkdXEeobR76b53LETtpyT";

pub fn init_logger() {
    env_logger::builder().is_test(true).try_init().ok();
}

pub fn price(usd: f64, eur: f64) -> PriceSnapshot {
    PriceSnapshot {
        btc_price_usd: usd,
        btc_price_eur: eur,
        price_change_percent_24h: 1.25,
    }
}

pub fn record(balance_sats: u64) -> LedgerRecord {
    LedgerRecord {
        balance_sats,
        transactions: Vec::new(),
    }
}

// ============================================================================
// Scripts
// ============================================================================

/// Queued outcomes, then a repeating default. Errors are HTTP status codes.
pub struct Script<T> {
    queue: Mutex<VecDeque<Result<T, u16>>>,
    default: Mutex<Result<T, u16>>,
    latency: Mutex<Duration>,
    calls: AtomicUsize,
}

impl<T: Clone> Script<T> {
    pub fn new(default: Result<T, u16>) -> Self {
        Self {
            queue: Mutex::new(VecDeque::new()),
            default: Mutex::new(default),
            latency: Mutex::new(Duration::ZERO),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn push(&self, outcome: Result<T, u16>) {
        self.queue.lock().unwrap().push_back(outcome);
    }

    pub fn set_default(&self, outcome: Result<T, u16>) {
        *self.default.lock().unwrap() = outcome;
    }

    pub fn set_latency(&self, latency: Duration) {
        *self.latency.lock().unwrap() = latency;
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub async fn next(&self) -> Result<T, SyncError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let latency = *self.latency.lock().unwrap();
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }
        let outcome = self
            .queue
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| self.default.lock().unwrap().clone());
        outcome.map_err(SyncError::HttpStatus)
    }
}

#[derive(Clone)]
pub struct ScriptedPrice {
    name: String,
    pub script: Arc<Script<PriceSnapshot>>,
}

impl ScriptedPrice {
    pub fn new(name: &str, default: Result<PriceSnapshot, u16>) -> Self {
        Self {
            name: name.to_string(),
            script: Arc::new(Script::new(default)),
        }
    }
}

#[async_trait]
impl PriceProvider for ScriptedPrice {
    fn name(&self) -> &str {
        &self.name
    }

    async fn fetch_price(&self) -> Result<PriceSnapshot, SyncError> {
        self.script.next().await
    }
}

#[derive(Clone)]
pub struct ScriptedLedger {
    name: String,
    pub script: Arc<Script<LedgerRecord>>,
}

impl ScriptedLedger {
    pub fn new(name: &str, default: Result<LedgerRecord, u16>) -> Self {
        Self {
            name: name.to_string(),
            script: Arc::new(Script::new(default)),
        }
    }
}

#[async_trait]
impl LedgerProvider for ScriptedLedger {
    fn name(&self) -> &str {
        &self.name
    }

    async fn fetch_ledger(&self, _address: &str) -> Result<LedgerRecord, SyncError> {
        self.script.next().await
    }
}

// ============================================================================
// Transport
// ============================================================================

/// Answers each URL from the first route whose fragment it contains
pub struct RouteTransport {
    routes: Vec<(String, Script<String>)>,
    log: Mutex<Vec<(String, Instant)>>,
}

impl RouteTransport {
    pub fn new() -> Self {
        Self {
            routes: Vec::new(),
            log: Mutex::new(Vec::new()),
        }
    }

    pub fn route(mut self, fragment: &str, default: Result<String, u16>) -> Self {
        self.routes.push((fragment.to_string(), Script::new(default)));
        self
    }

    /// Times at which URLs containing `fragment` were requested
    pub fn calls_to(&self, fragment: &str) -> Vec<Instant> {
        self.log
            .lock()
            .unwrap()
            .iter()
            .filter(|(url, _)| url.contains(fragment))
            .map(|(_, at)| *at)
            .collect()
    }
}

#[async_trait]
impl Transport for RouteTransport {
    async fn get(&self, url: &str) -> Result<String, SyncError> {
        self.log.lock().unwrap().push((url.to_string(), Instant::now()));
        match self.routes.iter().find(|(fragment, _)| url.contains(fragment.as_str())) {
            Some((_, script)) => script.next().await,
            None => Err(SyncError::HttpStatus(404)),
        }
    }
}

// ============================================================================
// Environment
// ============================================================================

/// Engine over scripted providers with automatic cleanup
pub struct TestEnvironment {
    pub temp_dir: TempDir,
    pub clock: Arc<ManualClock>,
    pub primary: ScriptedPrice,
    pub fallback: ScriptedPrice,
    pub ledger: ScriptedLedger,
    pub engine: Arc<SyncEngine>,
}

impl TestEnvironment {
    /// Primary price provider answers 50,000 / 45,000; fallback is down;
    /// ledger reports one coin.
    pub fn new() -> Self {
        Self::in_dir(TempDir::new().unwrap())
    }

    pub fn in_dir(temp_dir: TempDir) -> Self {
        init_logger();

        let clock = Arc::new(ManualClock::default());
        let primary = ScriptedPrice::new("coingecko", Ok(price(50_000.0, 45_000.0)));
        let fallback = ScriptedPrice::new("binance", Err(503));
        let ledger = ScriptedLedger::new("blockcypher", Ok(record(100_000_000)));

        let engine = build_engine(&temp_dir, &clock, &primary, &fallback, &ledger);

        Self {
            temp_dir,
            clock,
            primary,
            fallback,
            ledger,
            engine: Arc::new(engine),
        }
    }

    /// Fresh engine over the same data directory and providers
    pub fn restart(&self) -> SyncEngine {
        build_engine(&self.temp_dir, &self.clock, &self.primary, &self.fallback, &self.ledger)
    }
}

fn build_engine(
    temp_dir: &TempDir,
    clock: &Arc<ManualClock>,
    primary: &ScriptedPrice,
    fallback: &ScriptedPrice,
    ledger: &ScriptedLedger,
) -> SyncEngine {
    let config = SyncConfig {
        data_dir: temp_dir.path().to_path_buf(),
        ..SyncConfig::default()
    };
    let clock: Arc<dyn Clock> = clock.clone();

    SyncEngine::with_components(
        config,
        PriceProviderChain::new(vec![Box::new(primary.clone()), Box::new(fallback.clone())]),
        LedgerProviderChain::new(vec![Box::new(ledger.clone())], clock.clone()),
        Storage::new(temp_dir.path(), bitcoin::Network::Bitcoin),
        clock,
    )
}
