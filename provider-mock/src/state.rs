/// Scripted upstream data with failure injection and hit counting

use std::collections::HashMap;
use std::sync::Mutex;

pub const COINGECKO: &str = "coingecko";
pub const BINANCE: &str = "binance";
pub const BLOCKCYPHER: &str = "blockcypher";
pub const ESPLORA: &str = "esplora";

/// One transaction touching the watched address
#[derive(Debug, Clone, PartialEq)]
pub struct MockTx {
    pub txid: String,
    pub incoming: bool,
    pub value_sats: u64,
    /// Unix seconds; `None` for unconfirmed
    pub block_time: Option<i64>,
}

/// Values served by every provider endpoint
#[derive(Debug, Clone, PartialEq)]
pub struct MockData {
    pub btc_usd: f64,
    pub btc_eur: f64,
    pub change_24h: f64,
    pub balance_sats: u64,
    pub transactions: Vec<MockTx>,
}

impl Default for MockData {
    fn default() -> Self {
        Self {
            btc_usd: 64_000.0,
            btc_eur: 59_000.0,
            change_24h: 2.5,
            balance_sats: 150_000_000,
            transactions: (0..7)
                .map(|i| MockTx {
                    txid: format!("{:064x}", i + 1),
                    incoming: i % 3 != 2,
                    value_sats: 10_000_000 + i as u64 * 1_000,
                    block_time: Some(1_700_000_000 + i * 600),
                })
                .collect(),
        }
    }
}

#[derive(Debug, Default)]
pub struct MockState {
    data: Mutex<MockData>,
    /// Injected outages; `None` fails until cleared, `Some(n)` the next n requests
    failing: Mutex<HashMap<String, Option<u32>>>,
    hits: Mutex<HashMap<String, u64>>,
}

impl MockState {
    pub fn new(data: MockData) -> Self {
        Self {
            data: Mutex::new(data),
            ..Self::default()
        }
    }

    pub fn data(&self) -> MockData {
        self.data.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn set_data(&self, data: MockData) {
        *self.data.lock().unwrap_or_else(|e| e.into_inner()) = data;
    }

    /// Make `provider` answer 503 until switched back
    pub fn set_failing(&self, provider: &str, failing: bool) {
        let mut outages = self.failing.lock().unwrap_or_else(|e| e.into_inner());
        if failing {
            log::info!("💥 {} will now fail", provider);
            outages.insert(provider.to_string(), None);
        } else {
            log::info!("✅ {} restored", provider);
            outages.remove(provider);
        }
    }

    /// Make the next `count` requests to `provider` answer 503
    pub fn fail_next(&self, provider: &str, count: u32) {
        log::info!("💥 {} will fail the next {} requests", provider, count);
        let mut outages = self.failing.lock().unwrap_or_else(|e| e.into_inner());
        if count == 0 {
            outages.remove(provider);
        } else {
            outages.insert(provider.to_string(), Some(count));
        }
    }

    pub fn failing(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .failing
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .keys()
            .cloned()
            .collect();
        names.sort();
        names
    }

    /// Count a request and report whether it should fail
    pub fn record_hit(&self, provider: &str) -> bool {
        *self
            .hits
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .entry(provider.to_string())
            .or_insert(0) += 1;

        let mut outages = self.failing.lock().unwrap_or_else(|e| e.into_inner());
        match outages.get_mut(provider) {
            None => false,
            Some(None) => true,
            Some(Some(remaining)) => {
                *remaining -= 1;
                if *remaining == 0 {
                    outages.remove(provider);
                }
                true
            }
        }
    }

    pub fn hits(&self, provider: &str) -> u64 {
        self.hits
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(provider)
            .copied()
            .unwrap_or(0)
    }

    pub fn all_hits(&self) -> HashMap<String, u64> {
        self.hits.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn reset_hits(&self) {
        self.hits.lock().unwrap_or_else(|e| e.into_inner()).clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fail_next_expires() {
        let state = MockState::default();
        state.fail_next(BINANCE, 2);

        assert!(state.record_hit(BINANCE));
        assert!(state.record_hit(BINANCE));
        assert!(!state.record_hit(BINANCE));
        assert_eq!(state.hits(BINANCE), 3);
        assert!(state.failing().is_empty());
    }

    #[test]
    fn test_outage_until_cleared() {
        let state = MockState::default();
        state.set_failing(COINGECKO, true);
        assert!(state.record_hit(COINGECKO));
        assert!(state.record_hit(COINGECKO));

        state.set_failing(COINGECKO, false);
        assert!(!state.record_hit(COINGECKO));
        assert!(!state.record_hit(ESPLORA));
    }
}
