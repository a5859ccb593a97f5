//! Yahoo Finance API client
//!
//! Price history goes through `yahoo_finance_api`. Quote summaries,
//! fundamentals time series and news use the JSON endpoints directly; the
//! quote summary needs a session cookie and crumb, fetched once per client.

use chrono::{DateTime, NaiveDate, Utc};
use serde::Deserialize;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::sync::Arc;
use time::OffsetDateTime;
use tokio::sync::OnceCell;
use tracing::debug;
use yahoo_finance_api as yahoo;

use super::Bar;
use super::http::HttpClient;
use crate::config::StockConfig;
use crate::error::{Result, StockError};

const COOKIE_URL: &str = "https://fc.yahoo.com";
const CRUMB_URL: &str = "https://query1.finance.yahoo.com/v1/test/getcrumb";
const QUOTE_SUMMARY_URL: &str = "https://query2.finance.yahoo.com/v10/finance/quoteSummary";
const TIMESERIES_URL: &str =
    "https://query2.finance.yahoo.com/ws/fundamentals-timeseries/v1/finance/timeseries";
const SEARCH_URL: &str = "https://query2.finance.yahoo.com/v1/finance/search";

/// Modules merged into the flat quote summary, earlier modules win
const SUMMARY_MODULES: [&str; 5] = [
    "price",
    "summaryProfile",
    "summaryDetail",
    "defaultKeyStatistics",
    "financialData",
];

/// Start of the fundamentals window (1985-08-23), as upstream uses
const TIMESERIES_PERIOD_START: i64 = 493_590_046;

/// One news item from the search endpoint
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct YahooNewsItem {
    pub uuid: String,
    pub title: String,
    pub publisher: String,
    pub link: String,
    pub provider_publish_time: i64,
    #[serde(rename = "type")]
    pub kind: String,
    pub related_tickers: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct SearchResponse {
    news: Vec<YahooNewsItem>,
}

/// Yahoo Finance API client
pub struct YahooFinanceClient {
    http: HttpClient,
    connector: yahoo::YahooConnector,
    crumb: OnceCell<String>,
}

impl YahooFinanceClient {
    /// Create a new Yahoo Finance client
    pub fn new(config: Arc<StockConfig>) -> Result<Self> {
        let connector = yahoo::YahooConnector::new()
            .map_err(|e| StockError::YahooFinanceError(e.to_string()))?;
        Ok(Self {
            http: HttpClient::with_cookies("yahoo", config)?,
            connector,
            crumb: OnceCell::new(),
        })
    }

    /// Daily bars from `start` (inclusive) to `end` (exclusive), prices
    /// adjusted for splits and dividends
    pub async fn history(&self, symbol: &str, start: NaiveDate, end: NaiveDate) -> Result<Vec<Bar>> {
        let start = to_offset_datetime(start)?;
        let end = to_offset_datetime(end)?;

        let quotes = self
            .http
            .retry(|| async {
                let response = self
                    .connector
                    .get_quote_history(symbol, start, end)
                    .await
                    .map_err(|e| StockError::YahooFinanceError(e.to_string()))?;
                response
                    .quotes()
                    .map_err(|e| StockError::YahooFinanceError(e.to_string()))
            })
            .await?;

        let bars = quotes
            .iter()
            .filter_map(|q| {
                let date = DateTime::from_timestamp(q.timestamp as i64, 0)?.date_naive();
                let ratio = if q.close == 0.0 { 1.0 } else { q.adjclose / q.close };
                Some(Bar::ohlcv(
                    date,
                    q.open * ratio,
                    q.high * ratio,
                    q.low * ratio,
                    q.adjclose,
                    q.volume as f64,
                ))
            })
            .collect::<Vec<_>>();

        debug!(symbol, bars = bars.len(), "fetched Yahoo history");
        Ok(bars)
    }

    async fn crumb(&self) -> Result<String> {
        self.crumb
            .get_or_try_init(|| async {
                prime_session(self.http.client(), COOKIE_URL).await;
                let crumb = self.http.text(|c| c.get(CRUMB_URL)).await?;
                let crumb = crumb.trim();
                if crumb.is_empty() || crumb.contains('<') || crumb.contains(' ') {
                    return Err(StockError::YahooFinanceError(
                        "could not obtain a session crumb".to_string(),
                    ));
                }
                Ok(crumb.to_string())
            })
            .await
            .cloned()
    }

    /// Company profile, valuation and analyst fields as one flat map
    pub async fn quote_summary(&self, symbol: &str) -> Result<Map<String, Value>> {
        let crumb = self.crumb().await?;
        let url = format!("{QUOTE_SUMMARY_URL}/{symbol}");
        let modules = SUMMARY_MODULES.join(",");

        let body: Value = self
            .http
            .json(|c| {
                c.get(&url)
                    .query(&[("modules", modules.as_str()), ("crumb", crumb.as_str())])
            })
            .await?;

        let summary = &body["quoteSummary"];
        if let Some(description) = summary["error"]["description"].as_str() {
            return Err(StockError::YahooFinanceError(description.to_string()));
        }
        let result = summary["result"].get(0).ok_or_else(|| StockError::DataUnavailable {
            symbol: symbol.to_string(),
            reason: "empty quote summary".to_string(),
        })?;

        Ok(flatten_summary(result))
    }

    /// Fundamentals time series, keyed by series type then as-of date
    pub async fn timeseries(
        &self,
        symbol: &str,
        types: &[String],
    ) -> Result<BTreeMap<String, BTreeMap<String, f64>>> {
        let url = format!("{TIMESERIES_URL}/{symbol}");
        let types = types.join(",");
        let now = Utc::now().timestamp().to_string();
        let start = TIMESERIES_PERIOD_START.to_string();

        let body: Value = self
            .http
            .json(|c| {
                c.get(&url).query(&[
                    ("symbol", symbol),
                    ("type", types.as_str()),
                    ("period1", start.as_str()),
                    ("period2", now.as_str()),
                ])
            })
            .await?;

        Ok(parse_timeseries(&body))
    }

    /// Latest news mentioning `symbol`
    pub async fn news(&self, symbol: &str, count: usize) -> Result<Vec<YahooNewsItem>> {
        let count = count.to_string();
        let response: SearchResponse = self
            .http
            .json(|c| {
                c.get(SEARCH_URL).query(&[
                    ("q", symbol),
                    ("quotesCount", "0"),
                    ("newsCount", count.as_str()),
                ])
            })
            .await?;
        Ok(response.news)
    }
}

fn to_offset_datetime(date: NaiveDate) -> Result<OffsetDateTime> {
    let timestamp = date
        .and_hms_opt(0, 0, 0)
        .map(|dt| dt.and_utc().timestamp())
        .ok_or_else(|| StockError::InvalidDate(date.to_string()))?;
    OffsetDateTime::from_unix_timestamp(timestamp)
        .map_err(|e| StockError::YahooFinanceError(format!("Invalid timestamp: {e}")))
}

/// Merge the summary modules into one map, unwrapping `{"raw": ..}` numbers
fn flatten_summary(result: &Value) -> Map<String, Value> {
    let mut flat = Map::new();
    for module in SUMMARY_MODULES {
        let Some(fields) = result[module].as_object() else {
            continue;
        };
        for (key, value) in fields {
            if key == "maxAge" || flat.contains_key(key) {
                continue;
            }
            let value = match value {
                Value::Object(inner) => match inner.get("raw") {
                    Some(raw) => raw.clone(),
                    None => continue,
                },
                Value::Null => continue,
                other => other.clone(),
            };
            flat.insert(key.clone(), value);
        }
    }
    flat
}

fn parse_timeseries(body: &Value) -> BTreeMap<String, BTreeMap<String, f64>> {
    let mut out = BTreeMap::new();
    let Some(results) = body["timeseries"]["result"].as_array() else {
        return out;
    };

    for series in results {
        let Some(kind) = series["meta"]["type"][0].as_str() else {
            continue;
        };
        let Some(points) = series[kind].as_array() else {
            continue;
        };
        let values: BTreeMap<String, f64> = points
            .iter()
            .filter_map(|p| {
                let date = p["asOfDate"].as_str()?;
                let value = p["reportedValue"]["raw"].as_f64()?;
                Some((date.to_string(), value))
            })
            .collect();
        if !values.is_empty() {
            out.insert(kind.to_string(), values);
        }
    }
    out
}

/// Visit `url` so the client's cookie store holds a session cookie.
///
/// The response status does not matter. Returns whether the request reached
/// the server at all.
async fn prime_session(client: &reqwest::Client, url: &str) -> bool {
    match client.get(url).send().await {
        Ok(_) => true,
        Err(e) => {
            debug!(error = %e, url, "Yahoo session cookie request failed");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_prime_session_reports_transport_failure() {
        let client = reqwest::Client::new();
        // nothing listens on port 1
        assert!(!prime_session(&client, "http://127.0.0.1:1/").await);
    }

    #[test]
    fn test_flatten_summary() {
        let result = json!({
            "price": {
                "maxAge": 1,
                "longName": "Apple Inc.",
                "marketCap": {"raw": 3.0e12, "fmt": "3T"},
                "exchange": "NMS"
            },
            "summaryDetail": {
                "marketCap": {"raw": 1.0, "fmt": "ignored"},
                "trailingPE": {"raw": 29.5, "fmt": "29.50"},
                "dividendYield": {}
            },
            "summaryProfile": {"sector": "Technology", "fullTimeEmployees": 161_000}
        });

        let flat = flatten_summary(&result);
        assert_eq!(flat["longName"], "Apple Inc.");
        assert_eq!(flat["marketCap"], json!(3.0e12));
        assert_eq!(flat["trailingPE"], json!(29.5));
        assert_eq!(flat["sector"], "Technology");
        assert!(!flat.contains_key("maxAge"));
        assert!(!flat.contains_key("dividendYield"));
    }

    #[test]
    fn test_parse_timeseries() {
        let body = json!({
            "timeseries": {"result": [
                {
                    "meta": {"type": ["annualTotalRevenue"]},
                    "annualTotalRevenue": [
                        {"asOfDate": "2022-09-30", "reportedValue": {"raw": 394.3}},
                        null,
                        {"asOfDate": "2023-09-30", "reportedValue": {"raw": 383.3}}
                    ]
                },
                {"meta": {"type": ["annualNetIncome"]}}
            ]}
        });

        let series = parse_timeseries(&body);
        assert_eq!(series.len(), 1);
        let revenue = &series["annualTotalRevenue"];
        assert_eq!(revenue["2023-09-30"], 383.3);
        assert_eq!(revenue.len(), 2);
    }

    #[test]
    fn test_news_item_defaults() {
        let item: YahooNewsItem =
            serde_json::from_value(json!({"title": "Apple earnings", "providerPublishTime": 1_700_000_000}))
                .unwrap();
        assert_eq!(item.title, "Apple earnings");
        assert_eq!(item.provider_publish_time, 1_700_000_000);
        assert!(item.link.is_empty());
    }

    #[tokio::test]
    #[ignore] // Requires network access
    async fn test_history() {
        let client = YahooFinanceClient::new(Arc::new(StockConfig::default())).unwrap();
        let start = NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();
        let end = NaiveDate::from_ymd_opt(2024, 2, 1).unwrap();
        let bars = client.history("AAPL", start, end).await.unwrap();
        assert!(!bars.is_empty());
        assert!(bars[0].close > 0.0);
    }

    #[tokio::test]
    #[ignore] // Requires network access
    async fn test_quote_summary() {
        let client = YahooFinanceClient::new(Arc::new(StockConfig::default())).unwrap();
        let summary = client.quote_summary("AAPL").await.unwrap();
        assert_eq!(summary["symbol"], "AAPL");
    }
}
