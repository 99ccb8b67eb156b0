//! Bounded retry fetch
//!
//! Every provider request goes through [`RetryingFetcher`]: one `GET` per
//! attempt, a constant delay between attempts, and the last failure returned
//! once the attempt budget is spent. Logging failures is left to callers.

use async_trait::async_trait;
use reqwest::header::ACCEPT;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;

use crate::error::SyncError;

pub const DEFAULT_RETRY_ATTEMPTS: u32 = 3;
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_millis(1000);

/// Attempt budget and fixed delay between attempts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: DEFAULT_RETRY_ATTEMPTS,
            delay: DEFAULT_RETRY_DELAY,
        }
    }
}

/// A single JSON `GET`, without retries
#[async_trait]
pub trait Transport: Send + Sync {
    async fn get(&self, url: &str) -> Result<String, SyncError>;
}

/// `reqwest`-backed transport
#[derive(Clone, Default)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn get(&self, url: &str) -> Result<String, SyncError> {
        let response = self
            .client
            .get(url)
            .header(ACCEPT, "application/json")
            .send()
            .await?
            .error_for_status()?;

        Ok(response.text().await?)
    }
}

#[derive(Clone)]
pub struct RetryingFetcher {
    transport: Arc<dyn Transport>,
    policy: RetryPolicy,
}

impl RetryingFetcher {
    pub fn new(transport: Arc<dyn Transport>, policy: RetryPolicy) -> Self {
        Self { transport, policy }
    }

    /// Fetcher over plain HTTP with the given policy
    pub fn http(policy: RetryPolicy) -> Self {
        Self::new(Arc::new(HttpTransport::new()), policy)
    }

    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    /// Fetch `url` using the configured attempt budget
    pub async fn fetch(&self, url: &str) -> Result<String, SyncError> {
        self.fetch_with_attempts(url, self.policy.attempts).await
    }

    /// Fetch `url`, retrying retryable failures until `attempts` are spent
    ///
    /// A budget of zero is treated as a single attempt.
    pub async fn fetch_with_attempts(
        &self,
        url: &str,
        attempts: u32,
    ) -> Result<String, SyncError> {
        let mut remaining = attempts.max(1);
        loop {
            match self.transport.get(url).await {
                Ok(body) => return Ok(body),
                Err(e) if remaining == 1 || !e.is_retryable() => return Err(e),
                Err(_) => {
                    remaining -= 1;
                    tokio::time::sleep(self.policy.delay).await;
                }
            }
        }
    }

    /// Fetch and decode a JSON body. Decode failures are not retried.
    pub async fn fetch_json<T: DeserializeOwned>(&self, url: &str) -> Result<T, SyncError> {
        let body = self.fetch(url).await?;
        serde_json::from_str(&body).map_err(|e| SyncError::decode(format!("{}: {}", url, e)))
    }
}
