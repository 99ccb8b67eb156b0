/// Per-address wallet snapshot cache with a freshness window
///
/// Entries are usable while younger than the TTL and only if they were stored
/// together with a fully populated price. Stale entries stay in place until the
/// next fetch overwrites them.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use crate::clock::Clock;
use crate::ledger::WalletSnapshot;
use crate::price::PriceSnapshot;

#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry {
    pub address: String,
    pub wallet: WalletSnapshot,
    /// Price fetched in the same cycle as `wallet`
    pub price: Option<PriceSnapshot>,
    pub fetched_at: DateTime<Utc>,
}

impl CacheEntry {
    pub fn age(&self, now: DateTime<Utc>) -> chrono::Duration {
        now - self.fetched_at
    }

    pub fn is_fresh(&self, now: DateTime<Utc>, ttl: Duration) -> bool {
        let populated = self.price.map_or(false, |p| p.is_populated());
        populated && self.age(now).num_milliseconds() < ttl.as_millis() as i64
    }
}

pub struct FreshnessCache {
    entries: RwLock<HashMap<String, CacheEntry>>,
    ttl: Duration,
    clock: Arc<dyn Clock>,
}

impl FreshnessCache {
    pub fn new(ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            ttl,
            clock,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Fresh snapshot for `address`, or `None` on a miss or stale entry
    pub fn get(&self, address: &str) -> Option<WalletSnapshot> {
        let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
        let entry = entries.get(address)?;
        let now = self.clock.now();

        if entry.is_fresh(now, self.ttl) {
            log::debug!(
                "Wallet cache hit for {} (age {}s)",
                address,
                entry.age(now).num_seconds()
            );
            Some(entry.wallet.clone())
        } else {
            log::debug!("Wallet cache entry for {} is stale", address);
            None
        }
    }

    /// Raw entry regardless of freshness
    pub fn entry(&self, address: &str) -> Option<CacheEntry> {
        self.entries
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(address)
            .cloned()
    }

    /// Store `wallet` with the price fetched alongside it
    pub fn put(&self, address: &str, wallet: WalletSnapshot, price: Option<PriceSnapshot>) {
        let entry = CacheEntry {
            address: address.to_string(),
            wallet,
            price,
            fetched_at: self.clock.now(),
        };
        self.entries
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(address.to_string(), entry);
    }

    pub fn invalidate(&self, address: &str) {
        self.entries
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .remove(address);
    }

    pub fn len(&self) -> usize {
        self.entries.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
