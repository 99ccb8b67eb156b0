/// Synchronization configuration from environment variables
///
/// Controls provider endpoints, the retry budget, cache freshness and the
/// refresh cadence. Defaults target the public mainnet APIs.

use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::fetcher::RetryPolicy;

pub const DEFAULT_COINGECKO_URL: &str = "https://api.coingecko.com/api/v3";
pub const DEFAULT_BINANCE_URL: &str = "https://api.binance.com/api/v3";
pub const DEFAULT_BLOCKCYPHER_URL: &str = "https://api.blockcypher.com/v1/btc/main";
pub const DEFAULT_BLOCKSTREAM_URL: &str = "https://blockstream.info/api";
pub const DEFAULT_MEMPOOL_URL: &str = "https://mempool.space/api";

/// Age after which a cached wallet snapshot is re-fetched
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(5 * 60);

/// Delay of the price-only retry armed after the price chain is exhausted
pub const DEFAULT_DEGRADED_RETRY_DELAY: Duration = Duration::from_secs(30);

/// Named periodic refresh periods
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RefreshCadence {
    /// Refresh every minute
    #[default]
    Standard,
    /// Refresh every five minutes
    Relaxed,
}

impl RefreshCadence {
    pub fn interval(self) -> Duration {
        match self {
            Self::Standard => Duration::from_secs(60),
            Self::Relaxed => Duration::from_secs(300),
        }
    }
}

impl FromStr for RefreshCadence {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "standard" | "" => Ok(Self::Standard),
            "relaxed" => Ok(Self::Relaxed),
            other => Err(format!("unknown refresh cadence '{}'", other)),
        }
    }
}

/// Upstream provider base URLs
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProviderUrls {
    pub coingecko: String,
    pub binance: String,
    pub blockcypher: String,
    pub blockstream: String,
    pub mempool: String,
}

impl Default for ProviderUrls {
    fn default() -> Self {
        Self {
            coingecko: DEFAULT_COINGECKO_URL.to_string(),
            binance: DEFAULT_BINANCE_URL.to_string(),
            blockcypher: DEFAULT_BLOCKCYPHER_URL.to_string(),
            blockstream: DEFAULT_BLOCKSTREAM_URL.to_string(),
            mempool: DEFAULT_MEMPOOL_URL.to_string(),
        }
    }
}

impl ProviderUrls {
    /// Point every provider at one host, using the path prefixes served by
    /// the provider mock (`/coingecko`, `/binance`, `/blockcypher`, `/esplora`)
    pub fn single_host(base: &str) -> Self {
        let base = base.trim_end_matches('/');
        Self {
            coingecko: format!("{}/coingecko", base),
            binance: format!("{}/binance", base),
            blockcypher: format!("{}/blockcypher", base),
            blockstream: format!("{}/esplora", base),
            mempool: format!("{}/esplora", base),
        }
    }
}

#[derive(Clone, Debug)]
pub struct SyncConfig {
    /// Network used for address validation
    pub network: bitcoin::Network,
    pub providers: ProviderUrls,
    pub retry: RetryPolicy,
    pub cache_ttl: Duration,
    /// Period of the auto-refresh timer
    pub refresh_interval: Duration,
    pub degraded_retry_delay: Duration,
    /// Directory holding settings, wallet book and last-known snapshots
    pub data_dir: PathBuf,
}

impl SyncConfig {
    /// Load configuration from environment variables
    ///
    /// Environment variables:
    /// - `BITCOIN_NETWORK`: "bitcoin" (default), "testnet", "signet" or "regtest"
    /// - `PROVIDER_BASE_URL`: serve every provider from one host (provider mock)
    /// - `COINGECKO_URL`, `BINANCE_URL`, `BLOCKCYPHER_URL`, `BLOCKSTREAM_URL`, `MEMPOOL_URL`
    /// - `RETRY_ATTEMPTS`, `RETRY_DELAY_MS`: bounded retry budget per request
    /// - `CACHE_TTL_SECS`: wallet cache freshness window
    /// - `REFRESH_CADENCE`: "standard" (60 s) or "relaxed" (300 s)
    /// - `REFRESH_INTERVAL_SECS`: explicit override of the cadence
    /// - `DEGRADED_RETRY_SECS`: delay of the price retry after exhaustion
    /// - `DATA_DIR`: persistence directory (default `./wallet-data`)
    ///
    /// # Examples
    ///
    /// ```bash
    /// # Public providers, refresh every minute
    /// cargo run -p wallet
    ///
    /// # Local provider mock, relaxed cadence
    /// PROVIDER_BASE_URL=http://localhost:3001 REFRESH_CADENCE=relaxed cargo run -p wallet
    /// ```
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let network = match env::var("BITCOIN_NETWORK")
            .unwrap_or_default()
            .to_lowercase()
            .as_str()
        {
            "" | "bitcoin" | "mainnet" => bitcoin::Network::Bitcoin,
            "testnet" => bitcoin::Network::Testnet,
            "signet" => bitcoin::Network::Signet,
            "regtest" => {
                log::info!("🔧 Using REGTEST network");
                bitcoin::Network::Regtest
            }
            other => {
                log::warn!("⚠️  Unknown network '{}', defaulting to mainnet", other);
                bitcoin::Network::Bitcoin
            }
        };

        let mut providers = match env::var("PROVIDER_BASE_URL") {
            Ok(base) if !base.is_empty() => {
                log::info!("📡 All providers served from {}", base);
                ProviderUrls::single_host(&base)
            }
            _ => defaults.providers.clone(),
        };
        override_string("COINGECKO_URL", &mut providers.coingecko);
        override_string("BINANCE_URL", &mut providers.binance);
        override_string("BLOCKCYPHER_URL", &mut providers.blockcypher);
        override_string("BLOCKSTREAM_URL", &mut providers.blockstream);
        override_string("MEMPOOL_URL", &mut providers.mempool);

        let retry = RetryPolicy {
            attempts: env_parse("RETRY_ATTEMPTS").unwrap_or(defaults.retry.attempts),
            delay: env_parse("RETRY_DELAY_MS")
                .map(Duration::from_millis)
                .unwrap_or(defaults.retry.delay),
        };

        let cadence = env::var("REFRESH_CADENCE")
            .ok()
            .and_then(|value| match value.parse::<RefreshCadence>() {
                Ok(cadence) => Some(cadence),
                Err(e) => {
                    log::warn!("⚠️  {}, using standard cadence", e);
                    None
                }
            })
            .unwrap_or_default();
        let refresh_interval = env_parse("REFRESH_INTERVAL_SECS")
            .map(Duration::from_secs)
            .unwrap_or_else(|| cadence.interval());

        let config = Self {
            network,
            providers,
            retry,
            cache_ttl: env_parse("CACHE_TTL_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.cache_ttl),
            refresh_interval,
            degraded_retry_delay: env_parse("DEGRADED_RETRY_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.degraded_retry_delay),
            data_dir: env::var("DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.data_dir),
        };

        log::info!(
            "Refresh every {:?}, cache TTL {:?}, {} attempts per request",
            config.refresh_interval,
            config.cache_ttl,
            config.retry.attempts
        );

        config
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            network: bitcoin::Network::Bitcoin,
            providers: ProviderUrls::default(),
            retry: RetryPolicy::default(),
            cache_ttl: DEFAULT_CACHE_TTL,
            refresh_interval: RefreshCadence::Standard.interval(),
            degraded_retry_delay: DEFAULT_DEGRADED_RETRY_DELAY,
            data_dir: PathBuf::from("./wallet-data"),
        }
    }
}

fn override_string(var: &str, target: &mut String) {
    if let Ok(value) = env::var(var) {
        if !value.is_empty() {
            *target = value;
        }
    }
}

fn env_parse<T: FromStr>(var: &str) -> Option<T> {
    let raw = env::var(var).ok()?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            log::warn!("⚠️  Ignoring invalid {}='{}'", var, raw);
            None
        }
    }
}
