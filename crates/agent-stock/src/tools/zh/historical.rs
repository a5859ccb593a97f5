//! A-share daily bars with period statistics

use agent_core::Result as AgentResult;
use agent_tools::Tool;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Value, json};
use std::sync::Arc;
use tracing::info;

use super::code_property;
use crate::api::{Adjust, Bar, EastMoneyClient};
use crate::error::{Result, StockError};
use crate::indicators::mean;
use crate::symbol::ZhCode;
use crate::tools::{parse_date, parse_params, respond_prefixed};

/// Daily A-share prices, optionally adjusted
pub struct ZhHistoricalDataTool {
    eastmoney: Arc<EastMoneyClient>,
}

#[derive(Debug, Deserialize)]
struct HistoricalParams {
    code: String,
    start_date: String,
    end_date: String,
    #[serde(default = "default_adjust")]
    adjust: String,
}

fn default_adjust() -> String {
    Adjust::default().as_str().to_string()
}

impl ZhHistoricalDataTool {
    /// Create the tool over a shared East Money client
    pub fn new(eastmoney: Arc<EastMoneyClient>) -> Self {
        Self { eastmoney }
    }

    async fn fetch(&self, params: Value) -> Result<Value> {
        let params: HistoricalParams = parse_params(params)?;
        let start = parse_date(&params.start_date)?;
        let end = parse_date(&params.end_date)?;
        let adjust = Adjust::from_param(&params.adjust);
        let code = ZhCode::parse(&params.code);
        info!(code = %code.normalized(), %start, %end, adjust = adjust.as_str(), "fetching A-share history");

        let bars = self.eastmoney.daily_bars(&code, start, end, adjust).await?;
        let statistics = statistics(&bars).ok_or_else(|| {
            StockError::NoData(format!("未找到股票代码 {} 的历史数据", params.code))
        })?;

        info!(code = %code.normalized(), bars = bars.len(), "fetched A-share history");
        Ok(json!({
            "stock_code": params.code,
            "adjust_type": adjust.as_str(),
            "period": format!("{} 到 {}", params.start_date, params.end_date),
            "data": bars,
            "statistics": statistics,
        }))
    }
}

fn statistics(bars: &[Bar]) -> Option<Value> {
    let first = bars.first()?;
    let latest = bars.last()?;
    let volumes: Vec<f64> = bars.iter().map(|b| b.volume).collect();

    Some(json!({
        "period_return": (latest.close / first.close - 1.0) * 100.0,
        "max_price": bars.iter().map(|b| b.high).fold(f64::NEG_INFINITY, f64::max),
        "min_price": bars.iter().map(|b| b.low).fold(f64::INFINITY, f64::min),
        "avg_volume": mean(&volumes),
        "total_volume": volumes.iter().sum::<f64>(),
        "trading_days": bars.len(),
    }))
}

#[async_trait]
impl Tool for ZhHistoricalDataTool {
    async fn execute(&self, params: Value) -> AgentResult<Value> {
        Ok(respond_prefixed(self.name(), "获取历史数据失败", self.fetch(params).await))
    }

    fn name(&self) -> &'static str {
        "get_zh_historical_data"
    }

    fn description(&self) -> &'static str {
        "获取A股历史价格数据，包括开盘价、收盘价、最高价、最低价和成交量"
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "code": code_property(),
                "start_date": {"type": "string", "description": "开始日期，格式YYYY-MM-DD"},
                "end_date": {"type": "string", "description": "结束日期，格式YYYY-MM-DD"},
                "adjust": {
                    "type": "string",
                    "description": "复权类型：qfq(前复权)，hfq(后复权)，空字符串(不复权)",
                    "default": "qfq"
                }
            },
            "required": ["code", "start_date", "end_date"]
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StockConfig;
    use chrono::NaiveDate;

    #[test]
    fn test_statistics() {
        let day = |d| NaiveDate::from_ymd_opt(2024, 1, d).unwrap();
        let bars = vec![
            Bar::ohlcv(day(2), 10.0, 10.5, 9.8, 10.0, 1000.0),
            Bar::ohlcv(day(3), 10.0, 11.2, 9.9, 11.0, 3000.0),
            Bar::ohlcv(day(4), 11.0, 11.5, 10.6, 12.0, 2000.0),
        ];
        let stats = statistics(&bars).unwrap();

        assert!((stats["period_return"].as_f64().unwrap() - 20.0).abs() < 1e-9);
        assert_eq!(stats["max_price"], 11.5);
        assert_eq!(stats["min_price"], 9.8);
        assert_eq!(stats["avg_volume"], 2000.0);
        assert_eq!(stats["total_volume"], 6000.0);
        assert_eq!(stats["trading_days"], 3);
    }

    #[test]
    fn test_statistics_empty() {
        assert!(statistics(&[]).is_none());
    }

    #[test]
    fn test_default_adjust_is_forward() {
        let params: HistoricalParams = parse_params(json!({
            "code": "600519",
            "start_date": "2024-01-01",
            "end_date": "2024-01-31"
        }))
        .unwrap();
        assert_eq!(params.adjust, "qfq");
    }

    #[tokio::test]
    async fn test_missing_code_is_prefixed_error() {
        let client = Arc::new(EastMoneyClient::new(Arc::new(StockConfig::default())).unwrap());
        let result = ZhHistoricalDataTool::new(client)
            .execute(json!({"start_date": "2024-01-01", "end_date": "2024-01-31"}))
            .await
            .unwrap();
        let message = agent_tools::error_message(&result).unwrap();
        assert!(message.starts_with("获取历史数据失败: 参数错误"));
    }

    #[tokio::test]
    #[ignore] // Requires network access
    async fn test_fetch_moutai() {
        let client = Arc::new(EastMoneyClient::new(Arc::new(StockConfig::default())).unwrap());
        let result = ZhHistoricalDataTool::new(client)
            .execute(json!({"code": "600519", "start_date": "2024-01-01", "end_date": "2024-01-31"}))
            .await
            .unwrap();
        assert!(result["statistics"]["trading_days"].as_u64().unwrap() > 10);
    }
}
