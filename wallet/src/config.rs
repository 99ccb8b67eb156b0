/// Monitor configuration from environment variables
///
/// Wraps the engine's [`SyncConfig`] with the HTTP surface settings.

use btc_wallet_sync::SyncConfig;
use std::env;

pub const DEFAULT_BIND_ADDRESS: &str = "0.0.0.0:3000";

#[derive(Clone, Debug)]
pub struct MonitorConfig {
    /// Address the HTTP API binds to
    pub bind_address: String,
    /// Allowed CORS origins; empty allows any origin
    pub allowed_origins: Vec<String>,
    pub sync: SyncConfig,
}

impl MonitorConfig {
    /// Load configuration from environment variables (and `.env` if present)
    ///
    /// Environment variables:
    /// - `BIND_ADDRESS`: listen address (default `0.0.0.0:3000`)
    /// - `ALLOWED_ORIGINS`: comma separated CORS origins (default: any)
    /// - everything read by [`SyncConfig::from_env`]
    ///
    /// # Examples
    ///
    /// ```bash
    /// # Local development against the provider mock
    /// BIND_ADDRESS=127.0.0.1:3000 PROVIDER_BASE_URL=http://localhost:3001 cargo run -p wallet
    /// ```
    pub fn from_env() -> Self {
        dotenv::dotenv().ok();

        let bind_address =
            env::var("BIND_ADDRESS").unwrap_or_else(|_| DEFAULT_BIND_ADDRESS.to_string());

        let allowed_origins = env::var("ALLOWED_ORIGINS")
            .map(|origins| parse_origins(&origins))
            .unwrap_or_default();

        Self {
            bind_address,
            allowed_origins,
            sync: SyncConfig::from_env(),
        }
    }
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            bind_address: DEFAULT_BIND_ADDRESS.to_string(),
            allowed_origins: Vec::new(),
            sync: SyncConfig::default(),
        }
    }
}

fn parse_origins(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|origin| !origin.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_allows_any_origin() {
        let config = MonitorConfig::default();
        assert_eq!(config.bind_address, "0.0.0.0:3000");
        assert!(config.allowed_origins.is_empty());
    }

    #[test]
    fn test_parse_origins() {
        assert_eq!(
            parse_origins("https://a.example, https://b.example,,"),
            vec!["https://a.example", "https://b.example"]
        );
        assert!(parse_origins("").is_empty());
    }
}
