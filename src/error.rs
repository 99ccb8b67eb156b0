//! Error types for price and wallet synchronization
//!
//! Transport failures are retried inside the fetcher and never travel past a
//! single provider attempt. Everything that reaches the engine is converted to
//! observable state (an error message plus the previous data).

use thiserror::Error;

/// Core error type for synchronization operations
#[derive(Error, Debug)]
pub enum SyncError {
    /// Network failure before a response was received
    #[error("Transport error: {0}")]
    Transport(String),

    /// Upstream answered with a non-2xx status
    #[error("HTTP error! status: {0}")]
    HttpStatus(u16),

    /// Upstream body could not be decoded into the expected shape
    #[error("Invalid provider response: {0}")]
    Decode(String),

    /// Every provider in a chain failed
    #[error("{0}")]
    ProviderExhausted(String),

    /// Malformed numeric input
    #[error("Parse error: {0}")]
    Parse(String),

    /// Malformed Bitcoin address
    #[error("{0}")]
    Validation(String),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Wallet not found: {0}")]
    WalletNotFound(String),
}

impl SyncError {
    /// Whether the bounded retry loop should try the request again
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transport(_) | Self::HttpStatus(_))
    }

    /// Create a transport error
    pub fn transport(msg: impl Into<String>) -> Self {
        Self::Transport(msg.into())
    }

    /// Create a decode error
    pub fn decode(msg: impl Into<String>) -> Self {
        Self::Decode(msg.into())
    }
}

impl From<reqwest::Error> for SyncError {
    fn from(err: reqwest::Error) -> Self {
        match err.status() {
            Some(status) => Self::HttpStatus(status.as_u16()),
            None => Self::Transport(err.to_string()),
        }
    }
}
