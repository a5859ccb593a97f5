//! Historical prices with a period summary

use agent_core::Result as AgentResult;
use agent_tools::Tool;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Value, json};
use std::sync::Arc;
use tracing::info;

use crate::api::{Bar, YahooFinanceClient};
use crate::error::{Result, StockError};
use crate::indicators::{mean, pct_change, sample_std};
use crate::tools::{parse_date, parse_params, respond};

/// Bars listed in `recent_data`
const DETAIL_PERIOD: usize = 5;

/// Daily prices of a US ticker with period statistics
pub struct HistoricalDataTool {
    yahoo: Arc<YahooFinanceClient>,
}

#[derive(Debug, Deserialize)]
struct HistoricalParams {
    ticker: String,
    start_date: String,
    end_date: String,
}

impl HistoricalDataTool {
    /// Create the tool over a shared Yahoo client
    pub fn new(yahoo: Arc<YahooFinanceClient>) -> Self {
        Self { yahoo }
    }

    async fn fetch(&self, params: Value) -> Result<Value> {
        let params: HistoricalParams = parse_params(params)?;
        let start = parse_date(&params.start_date)?;
        let end = parse_date(&params.end_date)?;
        info!(ticker = %params.ticker, %start, %end, "fetching historical data");

        let bars = self.yahoo.history(&params.ticker, start, end).await?;
        let summary = summarize(&params, &bars)
            .ok_or_else(|| StockError::NoData("未获取到数据".to_string()))?;

        info!(ticker = %params.ticker, bars = bars.len(), "fetched historical data");
        Ok(summary)
    }
}

fn summarize(params: &HistoricalParams, bars: &[Bar]) -> Option<Value> {
    let first = bars.first()?;
    let latest = bars.last()?;

    let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();
    let volumes: Vec<f64> = bars.iter().map(|b| b.volume).collect();
    let high = bars.iter().map(|b| b.high).fold(f64::NEG_INFINITY, f64::max);
    let low = bars.iter().map(|b| b.low).fold(f64::INFINITY, f64::min);
    let volatility = sample_std(&pct_change(&closes)).map(|std| std * 100.0);

    let recent: Vec<Value> = bars[bars.len().saturating_sub(DETAIL_PERIOD)..]
        .iter()
        .map(|b| {
            json!({
                "date": b.date.format("%Y-%m-%d").to_string(),
                "open": b.open,
                "high": b.high,
                "low": b.low,
                "close": b.close,
                "volume": b.volume as u64,
            })
        })
        .collect();

    Some(json!({
        "ticker": params.ticker,
        "period_summary": {
            "start_date": params.start_date,
            "end_date": params.end_date,
            "total_days": bars.len(),
            "current_price": latest.close,
            "period_high": high,
            "period_low": low,
            "period_return": (latest.close / first.close - 1.0) * 100.0,
            "avg_volume": mean(&volumes),
            "volatility": volatility,
        },
        "recent_data": recent,
    }))
}

#[async_trait]
impl Tool for HistoricalDataTool {
    async fn execute(&self, params: Value) -> AgentResult<Value> {
        Ok(respond(self.name(), self.fetch(params).await))
    }

    fn name(&self) -> &'static str {
        "get_historical_data"
    }

    fn description(&self) -> &'static str {
        "获取股票历史价格数据，包括开盘价、收盘价、最高价、最低价和成交量"
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "ticker": {"type": "string", "description": "股票代码，如AAPL"},
                "start_date": {"type": "string", "description": "开始日期，格式YYYY-MM-DD"},
                "end_date": {"type": "string", "description": "结束日期，格式YYYY-MM-DD"}
            },
            "required": ["ticker", "start_date", "end_date"]
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StockConfig;
    use chrono::NaiveDate;

    fn params() -> HistoricalParams {
        HistoricalParams {
            ticker: "AAPL".to_string(),
            start_date: "2024-01-01".to_string(),
            end_date: "2024-01-10".to_string(),
        }
    }

    fn bars(closes: &[f64]) -> Vec<Bar> {
        closes
            .iter()
            .enumerate()
            .map(|(i, &close)| {
                let date = NaiveDate::from_ymd_opt(2024, 1, 2 + i as u32).unwrap();
                Bar::ohlcv(date, close - 1.0, close + 2.0, close - 2.0, close, 1000.0 * (i + 1) as f64)
            })
            .collect()
    }

    #[test]
    fn test_summarize() {
        let summary = summarize(&params(), &bars(&[100.0, 102.0, 101.0, 105.0, 104.0, 110.0])).unwrap();
        let period = &summary["period_summary"];

        assert_eq!(period["total_days"], 6);
        assert_eq!(period["current_price"], 110.0);
        assert_eq!(period["period_high"], 112.0);
        assert_eq!(period["period_low"], 98.0);
        assert!((period["period_return"].as_f64().unwrap() - 10.0).abs() < 1e-9);
        assert_eq!(period["avg_volume"], 3500.0);
        assert!(period["volatility"].as_f64().unwrap() > 0.0);

        let recent = summary["recent_data"].as_array().unwrap();
        assert_eq!(recent.len(), DETAIL_PERIOD);
        assert_eq!(recent[0]["date"], "2024-01-03");
        assert_eq!(recent[4]["close"], 110.0);
        assert_eq!(recent[4]["volume"], 6000);
    }

    #[test]
    fn test_summarize_empty() {
        assert!(summarize(&params(), &[]).is_none());
    }

    #[tokio::test]
    async fn test_bad_date_is_error_payload() {
        let yahoo = Arc::new(YahooFinanceClient::new(Arc::new(StockConfig::default())).unwrap());
        let tool = HistoricalDataTool::new(yahoo);

        let result = tool
            .execute(json!({"ticker": "AAPL", "start_date": "yesterday", "end_date": "2024-01-10"}))
            .await
            .unwrap();
        assert!(agent_tools::is_error_payload(&result));
    }

    #[tokio::test]
    #[ignore] // Requires network access
    async fn test_fetch_aapl() {
        let yahoo = Arc::new(YahooFinanceClient::new(Arc::new(StockConfig::default())).unwrap());
        let tool = HistoricalDataTool::new(yahoo);

        let result = tool
            .execute(json!({"ticker": "AAPL", "start_date": "2024-01-01", "end_date": "2024-02-01"}))
            .await
            .unwrap();
        assert!(result["period_summary"]["total_days"].as_u64().unwrap() > 10);
    }
}
