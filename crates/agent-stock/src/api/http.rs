//! Shared HTTP plumbing for upstream clients
//!
//! Every client owns one [`HttpClient`]: a reqwest client with the configured
//! timeout, a `governor` rate limiter and a retry loop with exponential
//! backoff for transient failures.

use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use std::num::NonZeroU32;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::config::StockConfig;
use crate::error::{Result, StockError};

type SharedRateLimiter = Arc<RateLimiter<NotKeyed, InMemoryState, DefaultClock>>;

const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
                          (KHTML, like Gecko) Chrome/124.0 Safari/537.36";

/// Rate-limited, retrying HTTP client for one upstream
#[derive(Clone)]
pub struct HttpClient {
    provider: &'static str,
    client: Client,
    rate_limiter: SharedRateLimiter,
    config: Arc<StockConfig>,
}

impl HttpClient {
    /// Create a client for `provider` (used in logs and errors)
    pub fn new(provider: &'static str, config: Arc<StockConfig>) -> Result<Self> {
        Self::with_builder(provider, config, Client::builder())
    }

    /// Create a client that keeps cookies between requests
    pub fn with_cookies(provider: &'static str, config: Arc<StockConfig>) -> Result<Self> {
        Self::with_builder(provider, config, Client::builder().cookie_store(true))
    }

    fn with_builder(
        provider: &'static str,
        config: Arc<StockConfig>,
        builder: reqwest::ClientBuilder,
    ) -> Result<Self> {
        let client = builder
            .timeout(config.request_timeout)
            .user_agent(USER_AGENT)
            .build()?;
        let per_minute = NonZeroU32::new(config.rate_limit_per_minute).ok_or_else(|| {
            StockError::ConfigError("rate_limit_per_minute must be greater than 0".to_string())
        })?;
        let rate_limiter = Arc::new(RateLimiter::direct(Quota::per_minute(per_minute)));

        Ok(Self {
            provider,
            client,
            rate_limiter,
            config,
        })
    }

    /// Provider name
    pub fn provider(&self) -> &'static str {
        self.provider
    }

    /// The underlying reqwest client, for building requests
    pub fn client(&self) -> &Client {
        &self.client
    }

    /// Run `op` under the rate limit, retrying transient failures with
    /// exponential backoff.
    pub async fn retry<T, F, Fut>(&self, op: F) -> Result<T>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let attempts = self.config.max_retries + 1;
        let mut last_error = None;

        for attempt in 0..attempts {
            if attempt > 0 {
                let backoff = self.config.retry_backoff(attempt - 1);
                debug!(provider = self.provider, attempt, ?backoff, "retrying request");
                tokio::time::sleep(backoff).await;
            }

            self.rate_limiter.until_ready().await;
            match op().await {
                Ok(value) => return Ok(value),
                Err(error) if !error.is_transient() => return Err(error),
                Err(error) => {
                    warn!(provider = self.provider, attempt, error = %error, "transient request failure");
                    last_error = Some(error);
                }
            }
        }

        Err(StockError::RetriesExhausted {
            provider: self.provider.to_string(),
            attempts,
            reason: last_error.map(|e| e.to_string()).unwrap_or_default(),
        })
    }

    /// Send a request built by `build`, retrying transient failures.
    ///
    /// `build` is called once per attempt. Non-success statuses become
    /// errors; 429 and 5xx are retried.
    pub async fn send(&self, build: impl Fn(&Client) -> RequestBuilder) -> Result<Response> {
        self.retry(|| async {
            let response = build(&self.client).send().await?;
            Ok(response.error_for_status()?)
        })
        .await
    }

    /// Send and decode a JSON body
    pub async fn json<T: DeserializeOwned>(
        &self,
        build: impl Fn(&Client) -> RequestBuilder,
    ) -> Result<T> {
        let response = self.send(build).await?;
        Ok(response.json::<T>().await?)
    }

    /// Send and read the body as text
    pub async fn text(&self, build: impl Fn(&Client) -> RequestBuilder) -> Result<String> {
        let response = self.send(build).await?;
        Ok(response.text().await?)
    }
}
