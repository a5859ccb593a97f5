//! Company profile and valuation snapshot

use agent_core::Result as AgentResult;
use agent_tools::Tool;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Map, Value, json};
use std::sync::Arc;
use tracing::info;

use crate::api::YahooFinanceClient;
use crate::error::Result;
use crate::tools::{parse_params, respond};

/// Quote summary fields reported to the model, in order
const KEY_FIELDS: [&str; 31] = [
    "longName",
    "symbol",
    "sector",
    "industry",
    "country",
    "marketCap",
    "enterpriseValue",
    "trailingPE",
    "forwardPE",
    "priceToBook",
    "dividendYield",
    "beta",
    "fiftyTwoWeekHigh",
    "fiftyTwoWeekLow",
    "currentPrice",
    "targetHighPrice",
    "targetLowPrice",
    "targetMeanPrice",
    "recommendationMean",
    "numberOfAnalystOpinions",
    "totalCash",
    "totalDebt",
    "revenueGrowth",
    "earningsGrowth",
    "operatingMargins",
    "profitMargins",
    "returnOnEquity",
    "returnOnAssets",
    "website",
    "fullTimeEmployees",
    "longBusinessSummary",
];

/// Key profile and valuation fields of a US ticker
pub struct StockInfoTool {
    yahoo: Arc<YahooFinanceClient>,
}

#[derive(Debug, Deserialize)]
struct InfoParams {
    ticker: String,
}

impl StockInfoTool {
    /// Create the tool over a shared Yahoo client
    pub fn new(yahoo: Arc<YahooFinanceClient>) -> Self {
        Self { yahoo }
    }

    async fn fetch(&self, params: Value) -> Result<Value> {
        let params: InfoParams = parse_params(params)?;
        info!(ticker = %params.ticker, "fetching stock info");

        let summary = self.yahoo.quote_summary(&params.ticker).await?;
        Ok(Value::Object(key_info(&summary)))
    }
}

/// Select the key fields; when any is present, add currency, exchange and
/// the fiscal year end the data refers to.
fn key_info(summary: &Map<String, Value>) -> Map<String, Value> {
    let mut out: Map<String, Value> = KEY_FIELDS
        .iter()
        .filter_map(|&field| {
            summary
                .get(field)
                .filter(|v| !v.is_null())
                .map(|v| (field.to_string(), v.clone()))
        })
        .collect();

    if !out.is_empty() {
        let or = |key: &str, default: &str| summary.get(key).cloned().unwrap_or_else(|| json!(default));
        out.insert("data_timestamp".to_string(), or("lastFiscalYearEnd", "N/A"));
        out.insert("currency".to_string(), or("currency", "USD"));
        out.insert("exchange".to_string(), or("exchange", "N/A"));
    }
    out
}

#[async_trait]
impl Tool for StockInfoTool {
    async fn execute(&self, params: Value) -> AgentResult<Value> {
        Ok(respond(self.name(), self.fetch(params).await))
    }

    fn name(&self) -> &'static str {
        "get_stock_info"
    }

    fn description(&self) -> &'static str {
        "获取股票基本信息，包括公司概况、市值、PE比率等关键指标"
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "ticker": {"type": "string", "description": "股票代码，如AAPL"}
            },
            "required": ["ticker"]
        })
    }
}
