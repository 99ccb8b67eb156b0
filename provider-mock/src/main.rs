/// Provider Mock Server
///
/// Local stand-in for the public price and ledger APIs, for development
/// against the wallet monitor without network access or rate limits.

use anyhow::{Context, Result};
use std::env;
use std::sync::Arc;

use provider_mock::{run_server, MockData, MockState};

#[derive(Debug)]
struct Config {
    server_host: String,
    server_port: u16,
    btc_usd: Option<f64>,
    btc_eur: Option<f64>,
    balance_sats: Option<u64>,
}

impl Config {
    fn from_env() -> Result<Self> {
        dotenv::dotenv().ok(); // Load .env file if present

        let server_host = env::var("SERVER_HOST")
            .unwrap_or_else(|_| "0.0.0.0".to_string());

        let server_port = env::var("SERVER_PORT")
            .unwrap_or_else(|_| "3001".to_string())
            .parse()
            .context("Invalid SERVER_PORT")?;

        let btc_usd = optional_env("MOCK_BTC_USD")?;
        let btc_eur = optional_env("MOCK_BTC_EUR")?;
        let balance_sats = optional_env("MOCK_BALANCE_SATS")?;

        Ok(Self {
            server_host,
            server_port,
            btc_usd,
            btc_eur,
            balance_sats,
        })
    }
}

fn optional_env<T>(var: &str) -> Result<Option<T>>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(var) {
        Ok(raw) => Ok(Some(raw.parse().with_context(|| format!("Invalid {}", var))?)),
        Err(_) => Ok(None),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .init();

    log::info!("Starting Provider Mock Server...");

    // Load configuration
    let config = Config::from_env()
        .context("Failed to load configuration")?;

    let defaults = MockData::default();
    let data = MockData {
        btc_usd: config.btc_usd.unwrap_or(defaults.btc_usd),
        btc_eur: config.btc_eur.unwrap_or(defaults.btc_eur),
        balance_sats: config.balance_sats.unwrap_or(defaults.balance_sats),
        ..defaults
    };
    log::info!("Serving BTC at ${} / €{}, balance {} sats", data.btc_usd, data.btc_eur, data.balance_sats);

    run_server(Arc::new(MockState::new(data)), config.server_host, config.server_port)
        .await
        .context("Server error")?;

    Ok(())
}
