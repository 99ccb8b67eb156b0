//! Bitcoin price quotes with ordered provider fallback
//!
//! Providers are tried one after another, never raced. The first provider that
//! produces a complete snapshot wins; partial results are never merged.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::config::ProviderUrls;
use crate::error::SyncError;
use crate::fetcher::RetryingFetcher;
use crate::storage::Currency;

/// BTC quote from a single provider call
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PriceSnapshot {
    pub btc_price_usd: f64,
    pub btc_price_eur: f64,
    pub price_change_percent_24h: f64,
}

impl PriceSnapshot {
    /// Both fiat prices present and usable for conversion
    pub fn is_populated(&self) -> bool {
        [self.btc_price_usd, self.btc_price_eur]
            .iter()
            .all(|p| p.is_finite() && *p > 0.0)
    }

    pub fn price_in(&self, currency: Currency) -> f64 {
        match currency {
            Currency::Usd => self.btc_price_usd,
            Currency::Eur => self.btc_price_eur,
        }
    }
}

#[async_trait]
pub trait PriceProvider: Send + Sync {
    /// Short provider name used in logs and aggregated errors
    fn name(&self) -> &str;

    async fn fetch_price(&self) -> Result<PriceSnapshot, SyncError>;
}

// ============================================================================
// CoinGecko (aggregator quote)
// ============================================================================

#[derive(Debug, Deserialize)]
struct CoinGeckoQuote {
    usd: f64,
    eur: f64,
    usd_24h_change: f64,
}

/// Single call returning USD, EUR and the 24h change
pub struct CoinGeckoProvider {
    fetcher: RetryingFetcher,
    base_url: String,
}

impl CoinGeckoProvider {
    pub fn new(fetcher: RetryingFetcher, base_url: impl Into<String>) -> Self {
        Self {
            fetcher,
            base_url: base_url.into(),
        }
    }

    fn quote_url(&self) -> String {
        format!(
            "{}/simple/price?ids=bitcoin&vs_currencies=usd,eur&include_24hr_change=true",
            self.base_url.trim_end_matches('/')
        )
    }
}

#[async_trait]
impl PriceProvider for CoinGeckoProvider {
    fn name(&self) -> &str {
        "coingecko"
    }

    async fn fetch_price(&self) -> Result<PriceSnapshot, SyncError> {
        let mut quotes: HashMap<String, CoinGeckoQuote> =
            self.fetcher.fetch_json(&self.quote_url()).await?;
        let quote = quotes
            .remove("bitcoin")
            .ok_or_else(|| SyncError::decode("coingecko response has no bitcoin quote"))?;

        Ok(PriceSnapshot {
            btc_price_usd: quote.usd,
            btc_price_eur: quote.eur,
            price_change_percent_24h: quote.usd_24h_change,
        })
    }
}

// ============================================================================
// Binance (exchange tickers)
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BinanceTicker {
    last_price: String,
    price_change_percent: String,
}

/// Two concurrent ticker calls (BTCUSDT, BTCEUR); both must succeed
pub struct BinanceProvider {
    fetcher: RetryingFetcher,
    base_url: String,
}

impl BinanceProvider {
    pub const USD_SYMBOL: &'static str = "BTCUSDT";
    pub const EUR_SYMBOL: &'static str = "BTCEUR";

    pub fn new(fetcher: RetryingFetcher, base_url: impl Into<String>) -> Self {
        Self {
            fetcher,
            base_url: base_url.into(),
        }
    }

    fn ticker_url(&self, symbol: &str) -> String {
        format!(
            "{}/ticker/24hr?symbol={}",
            self.base_url.trim_end_matches('/'),
            symbol
        )
    }
}

fn parse_decimal(field: &str, value: &str) -> Result<f64, SyncError> {
    value
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| SyncError::decode(format!("binance {} is not a number: '{}'", field, value)))
}

#[async_trait]
impl PriceProvider for BinanceProvider {
    fn name(&self) -> &str {
        "binance"
    }

    async fn fetch_price(&self) -> Result<PriceSnapshot, SyncError> {
        let usd_url = self.ticker_url(Self::USD_SYMBOL);
        let eur_url = self.ticker_url(Self::EUR_SYMBOL);

        let (usd, eur) = tokio::try_join!(
            self.fetcher.fetch_json::<BinanceTicker>(&usd_url),
            self.fetcher.fetch_json::<BinanceTicker>(&eur_url),
        )?;

        Ok(PriceSnapshot {
            btc_price_usd: parse_decimal("lastPrice", &usd.last_price)?,
            btc_price_eur: parse_decimal("lastPrice", &eur.last_price)?,
            price_change_percent_24h: parse_decimal(
                "priceChangePercent",
                &usd.price_change_percent,
            )?,
        })
    }
}

// ============================================================================
// Chain
// ============================================================================

pub struct PriceProviderChain {
    providers: Vec<Box<dyn PriceProvider>>,
}

impl PriceProviderChain {
    pub fn new(providers: Vec<Box<dyn PriceProvider>>) -> Self {
        Self { providers }
    }

    /// CoinGecko first, Binance as fallback
    pub fn with_defaults(fetcher: RetryingFetcher, urls: &ProviderUrls) -> Self {
        Self::new(vec![
            Box::new(CoinGeckoProvider::new(fetcher.clone(), urls.coingecko.clone())),
            Box::new(BinanceProvider::new(fetcher, urls.binance.clone())),
        ])
    }

    pub fn provider_names(&self) -> Vec<&str> {
        self.providers.iter().map(|p| p.name()).collect()
    }

    /// Return the first snapshot any provider produces
    ///
    /// Fails with [`SyncError::ProviderExhausted`] carrying every provider's
    /// failure message, in priority order.
    pub async fn fetch(&self) -> Result<PriceSnapshot, SyncError> {
        let mut failures = Vec::with_capacity(self.providers.len());

        for provider in &self.providers {
            match provider.fetch_price().await {
                Ok(snapshot) => {
                    log::debug!(
                        "Price from {}: ${} / €{} ({:+.2}%)",
                        provider.name(),
                        snapshot.btc_price_usd,
                        snapshot.btc_price_eur,
                        snapshot.price_change_percent_24h
                    );
                    return Ok(snapshot);
                }
                Err(e) => {
                    log::warn!("{} price API failed, trying next provider: {}", provider.name(), e);
                    failures.push(format!("{}: {}", provider.name(), e));
                }
            }
        }

        log::error!("All price APIs failed");
        Err(SyncError::ProviderExhausted(format!(
            "Failed to fetch prices: {}",
            failures.join(", ")
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_populated_requires_both_prices() {
        let snapshot = PriceSnapshot {
            btc_price_usd: 50_000.0,
            btc_price_eur: 46_000.0,
            price_change_percent_24h: -1.2,
        };
        assert!(snapshot.is_populated());
        assert!(!PriceSnapshot { btc_price_eur: 0.0, ..snapshot }.is_populated());
        assert!(!PriceSnapshot { btc_price_usd: f64::NAN, ..snapshot }.is_populated());
    }

    #[test]
    fn test_price_in_currency() {
        let snapshot = PriceSnapshot {
            btc_price_usd: 2.0,
            btc_price_eur: 3.0,
            price_change_percent_24h: 0.0,
        };
        assert_eq!(snapshot.price_in(Currency::Usd), 2.0);
        assert_eq!(snapshot.price_in(Currency::Eur), 3.0);
    }

    #[test]
    fn test_parse_decimal_rejects_garbage() {
        assert_eq!(parse_decimal("lastPrice", "64012.50000000").unwrap(), 64012.5);
        assert!(parse_decimal("lastPrice", "n/a").is_err());
    }

    #[tokio::test]
    async fn test_empty_chain_is_exhausted() {
        let chain = PriceProviderChain::new(Vec::new());
        let err = chain.fetch().await.unwrap_err();
        assert!(matches!(err, SyncError::ProviderExhausted(_)));
    }
}
