//! Data tools exposed to the agents
//!
//! Every tool reports upstream failures as an `{"error": ...}` payload
//! instead of failing the call, so one bad lookup never aborts a run.

pub mod search;
pub mod us;
pub mod zh;

pub use search::WebSearchTool;
pub use us::{
    FinancialStatementsTool, HistoricalDataTool, NewsTool, StockInfoTool, TechnicalIndicatorsTool,
};
pub use zh::{
    ZhFinancialStatementsTool, ZhHistoricalDataTool, ZhNewsTool, ZhStockInfoTool,
    ZhTechnicalIndicatorsTool,
};

use agent_tools::{Tool, ToolRegistry, error_payload};
use chrono::{Local, NaiveDate};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::Arc;
use tracing::{info, warn};

use crate::api::{EastMoneyClient, YahooFinanceClient};
use crate::config::StockConfig;
use crate::error::{Result, StockError};

/// Register the tools of every configured market, plus web search.
///
/// Returns the number of tools registered.
pub fn register_tools(registry: &ToolRegistry, config: Arc<StockConfig>) -> Result<usize> {
    let mut tools: Vec<Arc<dyn Tool>> = Vec::new();

    if config.markets.includes_us() {
        let yahoo = Arc::new(YahooFinanceClient::new(config.clone())?);
        tools.push(Arc::new(HistoricalDataTool::new(yahoo.clone())));
        tools.push(Arc::new(StockInfoTool::new(yahoo.clone())));
        tools.push(Arc::new(TechnicalIndicatorsTool::new(yahoo.clone())));
        tools.push(Arc::new(FinancialStatementsTool::new(yahoo.clone())));
        tools.push(Arc::new(NewsTool::new(yahoo, config.clone())?));
    }

    if config.markets.includes_zh() {
        let eastmoney = Arc::new(EastMoneyClient::new(config.clone())?);
        tools.push(Arc::new(ZhHistoricalDataTool::new(eastmoney.clone())));
        tools.push(Arc::new(ZhStockInfoTool::new(eastmoney.clone())));
        tools.push(Arc::new(ZhTechnicalIndicatorsTool::new(eastmoney.clone())));
        tools.push(Arc::new(ZhFinancialStatementsTool::new(eastmoney.clone())));
        tools.push(Arc::new(ZhNewsTool::new(eastmoney)));
    }

    tools.push(Arc::new(WebSearchTool::from_config(config.clone())?));

    let count = tools.len();
    for tool in tools {
        registry.register(tool);
    }
    info!(markets = %config.markets, tools = count, "registered data tools");
    Ok(count)
}

/// Decode tool parameters
pub(crate) fn parse_params<T: DeserializeOwned>(params: Value) -> Result<T> {
    serde_json::from_value(params).map_err(|e| StockError::Other(format!("参数错误: {e}")))
}

/// Parse a `YYYY-MM-DD` date
pub(crate) fn parse_date(value: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d")
        .map_err(|_| StockError::InvalidDate(value.to_string()))
}

/// Local wall-clock time, as reported in `query_time` fields
pub(crate) fn query_time() -> String {
    Local::now().format("%Y-%m-%d %H:%M:%S").to_string()
}

/// Final JSON of a tool call; failures become an error payload
pub(crate) fn respond(tool: &str, outcome: Result<Value>) -> Value {
    outcome.unwrap_or_else(|e| {
        warn!(tool, error = %e, "tool call failed");
        error_payload(e.to_string())
    })
}

/// Like [`respond`], prefixing failure messages with `prefix`.
///
/// [`StockError::NoData`] messages are already user-facing and are kept as is.
pub(crate) fn respond_prefixed(tool: &str, prefix: &str, outcome: Result<Value>) -> Value {
    respond(
        tool,
        outcome.map_err(|e| match e {
            StockError::NoData(_) => e,
            other => StockError::Other(format!("{prefix}: {other}")),
        }),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Market;
    use serde::Deserialize;
    use serde_json::json;

    #[derive(Debug, Deserialize)]
    struct Params {
        ticker: String,
        #[serde(default)]
        limit: Option<usize>,
    }

    #[test]
    fn test_parse_params() {
        let params: Params = parse_params(json!({"ticker": "AAPL"})).unwrap();
        assert_eq!(params.ticker, "AAPL");
        assert_eq!(params.limit, None);

        let err = parse_params::<Params>(json!({"limit": 3})).unwrap_err();
        assert!(err.to_string().starts_with("参数错误"));
    }

    #[test]
    fn test_parse_date() {
        assert_eq!(
            parse_date("2024-01-31").unwrap(),
            NaiveDate::from_ymd_opt(2024, 1, 31).unwrap()
        );
        assert!(matches!(parse_date("2024/01/31"), Err(StockError::InvalidDate(_))));
    }

    #[test]
    fn test_respond_error_payload() {
        let value = respond("get_news", Err(StockError::NoData("未获取到数据".to_string())));
        assert_eq!(value, json!({"error": "未获取到数据"}));

        let value = respond("get_news", Ok(json!({"news": []})));
        assert_eq!(value, json!({"news": []}));
    }

    #[test]
    fn test_respond_prefixed() {
        let value = respond_prefixed(
            "get_zh_historical_data",
            "获取历史数据失败",
            Err(StockError::ApiError("timeout".to_string())),
        );
        assert_eq!(value, json!({"error": "获取历史数据失败: API error: timeout"}));

        let value = respond_prefixed(
            "get_zh_historical_data",
            "获取历史数据失败",
            Err(StockError::NoData("未找到股票代码 000001 的历史数据".to_string())),
        );
        assert_eq!(value, json!({"error": "未找到股票代码 000001 的历史数据"}));
    }

    #[test]
    fn test_register_tools_by_market() {
        let names = |markets: Market| {
            let registry = ToolRegistry::new();
            let config = StockConfig::builder().markets(markets).build().unwrap();
            let count = register_tools(&registry, Arc::new(config)).unwrap();
            assert_eq!(count, registry.len());
            registry.names()
        };

        let us = names(Market::Us);
        assert_eq!(us.len(), 6);
        assert!(us.contains(&"get_historical_data".to_string()));
        assert!(us.contains(&"search_web_info".to_string()));
        assert!(!us.iter().any(|n| n.contains("zh")));

        let zh = names(Market::Zh);
        assert_eq!(zh.len(), 6);
        assert!(zh.contains(&"get_zh_news".to_string()));

        assert_eq!(names(Market::All).len(), 11);
    }
}
