//! Configuration for stock data access

use crate::error::{Result, StockError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Which market's tools to register
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Market {
    /// US equities via Yahoo Finance
    Us,
    /// China A-shares via East Money
    Zh,
    /// Both markets
    #[default]
    All,
}

impl Market {
    /// Whether the US tool set is included
    pub fn includes_us(self) -> bool {
        matches!(self, Self::Us | Self::All)
    }

    /// Whether the A-share tool set is included
    pub fn includes_zh(self) -> bool {
        matches!(self, Self::Zh | Self::All)
    }
}

impl FromStr for Market {
    type Err = StockError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "us" => Ok(Self::Us),
            "zh" | "cn" => Ok(Self::Zh),
            "all" => Ok(Self::All),
            other => Err(StockError::ConfigError(format!(
                "unknown market '{other}', expected us, zh or all"
            ))),
        }
    }
}

impl fmt::Display for Market {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Us => "us",
            Self::Zh => "zh",
            Self::All => "all",
        })
    }
}

/// Configuration for stock data access
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StockConfig {
    /// Markets whose tools are registered
    pub markets: Market,

    /// Maximum number of retries for API calls
    pub max_retries: u32,

    /// Initial backoff duration for retries
    pub retry_backoff_base: Duration,

    /// Request timeout duration
    pub request_timeout: Duration,

    /// Requests per minute allowed against each upstream
    pub rate_limit_per_minute: u32,

    /// News items returned when the caller gives no limit
    pub default_news_limit: usize,

    /// Search results returned when the caller gives no limit
    pub default_search_results: usize,

    /// SerpAPI key (optional, enables Google results)
    pub serpapi_api_key: Option<String>,

    /// Finnhub key (optional, enables the news fallback)
    pub finnhub_api_key: Option<String>,
}

impl Default for StockConfig {
    fn default() -> Self {
        Self {
            markets: Market::All,
            max_retries: 3,
            retry_backoff_base: Duration::from_secs(1),
            request_timeout: Duration::from_secs(30),
            rate_limit_per_minute: 60,
            default_news_limit: 10,
            default_search_results: 5,
            serpapi_api_key: None,
            finnhub_api_key: None,
        }
    }
}

impl StockConfig {
    /// Create a new configuration builder
    pub fn builder() -> StockConfigBuilder {
        StockConfigBuilder::default()
    }

    /// Default configuration with API keys read from the environment
    pub fn from_env() -> Result<Self> {
        Self::builder().with_env_api_keys().build()
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.max_retries == 0 {
            return Err(StockError::ConfigError(
                "max_retries must be greater than 0".to_string(),
            ));
        }

        if self.rate_limit_per_minute == 0 {
            return Err(StockError::ConfigError(
                "rate_limit_per_minute must be greater than 0".to_string(),
            ));
        }

        if self.default_news_limit == 0 || self.default_search_results == 0 {
            return Err(StockError::ConfigError(
                "default result limits must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }

    /// Get retry backoff duration for attempt number
    pub fn retry_backoff(&self, attempt: u32) -> Duration {
        self.retry_backoff_base * 2_u32.pow(attempt)
    }
}

/// Builder for StockConfig
#[derive(Debug, Default)]
pub struct StockConfigBuilder {
    markets: Option<Market>,
    max_retries: Option<u32>,
    retry_backoff_base: Option<Duration>,
    request_timeout: Option<Duration>,
    rate_limit_per_minute: Option<u32>,
    default_news_limit: Option<usize>,
    default_search_results: Option<usize>,
    serpapi_api_key: Option<String>,
    finnhub_api_key: Option<String>,
}

impl StockConfigBuilder {
    /// Set which markets to register
    pub fn markets(mut self, markets: Market) -> Self {
        self.markets = Some(markets);
        self
    }

    /// Set maximum retries
    pub fn max_retries(mut self, retries: u32) -> Self {
        self.max_retries = Some(retries);
        self
    }

    /// Set retry backoff base duration
    pub fn retry_backoff_base(mut self, duration: Duration) -> Self {
        self.retry_backoff_base = Some(duration);
        self
    }

    /// Set request timeout
    pub fn request_timeout(mut self, duration: Duration) -> Self {
        self.request_timeout = Some(duration);
        self
    }

    /// Set the per-upstream rate limit
    pub fn rate_limit_per_minute(mut self, limit: u32) -> Self {
        self.rate_limit_per_minute = Some(limit);
        self
    }

    /// Set the default news limit
    pub fn default_news_limit(mut self, limit: usize) -> Self {
        self.default_news_limit = Some(limit);
        self
    }

    /// Set the default number of search results
    pub fn default_search_results(mut self, limit: usize) -> Self {
        self.default_search_results = Some(limit);
        self
    }

    /// Set the SerpAPI key
    pub fn serpapi_api_key(mut self, key: impl Into<String>) -> Self {
        self.serpapi_api_key = Some(key.into());
        self
    }

    /// Set the Finnhub key
    pub fn finnhub_api_key(mut self, key: impl Into<String>) -> Self {
        self.finnhub_api_key = Some(key.into());
        self
    }

    /// Load API keys from the environment
    ///
    /// `SERPAPI_API_KEY` wins over `SERP_API_KEY`. Keys set explicitly on the
    /// builder are kept.
    pub fn with_env_api_keys(self) -> Self {
        self.with_api_keys_from(|key| std::env::var(key).ok())
    }

    fn with_api_keys_from(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        if self.serpapi_api_key.is_none() {
            self.serpapi_api_key = non_empty("SERPAPI_API_KEY").or_else(|| non_empty("SERP_API_KEY"));
        }
        if self.finnhub_api_key.is_none() {
            self.finnhub_api_key = non_empty("FINNHUB_API_KEY");
        }
        self
    }

    /// Build the configuration
    pub fn build(self) -> Result<StockConfig> {
        let defaults = StockConfig::default();

        let config = StockConfig {
            markets: self.markets.unwrap_or(defaults.markets),
            max_retries: self.max_retries.unwrap_or(defaults.max_retries),
            retry_backoff_base: self.retry_backoff_base.unwrap_or(defaults.retry_backoff_base),
            request_timeout: self.request_timeout.unwrap_or(defaults.request_timeout),
            rate_limit_per_minute: self
                .rate_limit_per_minute
                .unwrap_or(defaults.rate_limit_per_minute),
            default_news_limit: self.default_news_limit.unwrap_or(defaults.default_news_limit),
            default_search_results: self
                .default_search_results
                .unwrap_or(defaults.default_search_results),
            serpapi_api_key: self.serpapi_api_key,
            finnhub_api_key: self.finnhub_api_key,
        };

        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_default_config() {
        let config = StockConfig::default();
        assert_eq!(config.markets, Market::All);
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.default_news_limit, 10);
        assert_eq!(config.default_search_results, 5);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_builder() {
        let config = StockConfig::builder()
            .markets(Market::Zh)
            .max_retries(5)
            .request_timeout(Duration::from_secs(60))
            .build()
            .unwrap();

        assert_eq!(config.markets, Market::Zh);
        assert_eq!(config.max_retries, 5);
        assert_eq!(config.request_timeout, Duration::from_secs(60));
    }

    #[test]
    fn test_validation_rejects_zero_values() {
        assert!(StockConfig::builder().max_retries(0).build().is_err());
        assert!(StockConfig::builder().rate_limit_per_minute(0).build().is_err());
        assert!(StockConfig::builder().default_news_limit(0).build().is_err());
    }

    #[test]
    fn test_api_keys_from_lookup() {
        let env: HashMap<&str, &str> = [("SERP_API_KEY", "serp"), ("FINNHUB_API_KEY", " ")]
            .into_iter()
            .collect();
        let config = StockConfig::builder()
            .with_api_keys_from(|k| env.get(k).map(ToString::to_string))
            .build()
            .unwrap();

        assert_eq!(config.serpapi_api_key.as_deref(), Some("serp"));
        assert_eq!(config.finnhub_api_key, None);
    }

    #[test]
    fn test_explicit_key_wins_over_environment() {
        let config = StockConfig::builder()
            .serpapi_api_key("explicit")
            .with_api_keys_from(|_| Some("env".to_string()))
            .build()
            .unwrap();

        assert_eq!(config.serpapi_api_key.as_deref(), Some("explicit"));
        assert_eq!(config.finnhub_api_key.as_deref(), Some("env"));
    }

    #[test]
    fn test_market_parsing() {
        assert_eq!("US".parse::<Market>().unwrap(), Market::Us);
        assert_eq!("cn".parse::<Market>().unwrap(), Market::Zh);
        assert!("eu".parse::<Market>().is_err());
        assert!(Market::All.includes_us() && Market::All.includes_zh());
        assert!(!Market::Zh.includes_us());
        assert_eq!(Market::Zh.to_string(), "zh");
    }

    #[test]
    fn test_retry_backoff() {
        let config = StockConfig::default();
        assert_eq!(config.retry_backoff(0), Duration::from_secs(1));
        assert_eq!(config.retry_backoff(1), Duration::from_secs(2));
        assert_eq!(config.retry_backoff(2), Duration::from_secs(4));
    }
}
