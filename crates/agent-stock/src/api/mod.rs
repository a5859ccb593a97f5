//! API clients for stock data providers

pub mod eastmoney;
pub mod finnhub;
pub mod http;
pub mod search;
pub mod yahoo;

use chrono::NaiveDate;
use serde::Serialize;

pub use eastmoney::{Adjust, EastMoneyClient, EastMoneyNewsItem};
pub use finnhub::FinnhubClient;
pub use http::HttpClient;
pub use search::{DuckDuckGoClient, SearchHit, SearchOutcome, SearchProvider, SerpApiClient};
pub use yahoo::{YahooFinanceClient, YahooNewsItem};

/// One daily bar
///
/// The optional fields are only reported by the A-share upstream.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Bar {
    pub date: NaiveDate,
    pub open: f64,
    pub close: f64,
    pub high: f64,
    pub low: f64,
    pub volume: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub amount: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub amplitude: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pct_change: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub change: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub turnover: Option<f64>,
}

impl Bar {
    /// A bar with prices and volume only
    pub fn ohlcv(date: NaiveDate, open: f64, high: f64, low: f64, close: f64, volume: f64) -> Self {
        Self {
            date,
            open,
            close,
            high,
            low,
            volume,
            amount: None,
            amplitude: None,
            pct_change: None,
            change: None,
            turnover: None,
        }
    }
}
