//! Finnhub company news client

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::http::HttpClient;
use crate::config::StockConfig;
use crate::error::Result;

const COMPANY_NEWS_URL: &str = "https://finnhub.io/api/v1/company-news";

/// Finnhub news article
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FinnhubNewsArticle {
    /// Article category
    pub category: String,
    /// Publish time (UNIX timestamp)
    pub datetime: i64,
    /// News headline
    pub headline: String,
    /// Unique article ID
    pub id: i64,
    /// Related symbols
    pub related: String,
    /// News source
    pub source: String,
    /// Article summary
    pub summary: String,
    /// Article URL
    pub url: String,
}

/// Finnhub client for the company news API
pub struct FinnhubClient {
    http: HttpClient,
    api_key: String,
}

impl FinnhubClient {
    /// Create a new Finnhub client
    pub fn new(api_key: impl Into<String>, config: Arc<StockConfig>) -> Result<Self> {
        Ok(Self {
            http: HttpClient::new("finnhub", config)?,
            api_key: api_key.into(),
        })
    }

    /// Get company news for a specific symbol
    ///
    /// # Arguments
    /// * `symbol` - Stock symbol (e.g., "AAPL")
    /// * `from` - Start date (YYYY-MM-DD)
    /// * `to` - End date (YYYY-MM-DD)
    pub async fn company_news(
        &self,
        symbol: &str,
        from: &str,
        to: &str,
    ) -> Result<Vec<FinnhubNewsArticle>> {
        self.http
            .json(|c| {
                c.get(COMPANY_NEWS_URL).query(&[
                    ("symbol", symbol),
                    ("from", from),
                    ("to", to),
                    ("token", self.api_key.as_str()),
                ])
            })
            .await
    }
}
