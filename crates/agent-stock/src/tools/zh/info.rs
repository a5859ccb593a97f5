//! A-share quote, company profile and headline financial indicators

use agent_core::Result as AgentResult;
use agent_tools::{Tool, error_payload};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Map, Value, json};
use std::sync::Arc;
use tracing::{info, warn};

use super::{DATA_SOURCE, code_property};
use crate::api::EastMoneyClient;
use crate::api::eastmoney::number;
use crate::error::Result;
use crate::symbol::ZhCode;
use crate::tools::{parse_params, query_time, respond_prefixed};

/// Real-time quote fields: output name and East Money field id
const REALTIME_FIELDS: [(&str, &str); 17] = [
    ("current_price", "f43"),
    ("change_percent", "f170"),
    ("change_amount", "f169"),
    ("volume", "f47"),
    ("amount", "f48"),
    ("turnover_rate", "f168"),
    ("pe_ratio_ttm", "f164"),
    ("pe_ratio_dynamic", "f162"),
    ("pe_ratio_static", "f163"),
    ("pb_ratio", "f167"),
    ("market_cap", "f116"),
    ("circulation_market_cap", "f117"),
    ("week_52_high", "f174"),
    ("week_52_low", "f175"),
    ("eps", "f55"),
    ("bps", "f92"),
    ("total_shares", "f84"),
];

const COMPANY_FIELDS: [&str; 5] = ["f58", "f84", "f85", "f127", "f189"];

/// Quote, company profile and latest report indicators of one A-share
pub struct ZhStockInfoTool {
    eastmoney: Arc<EastMoneyClient>,
}

#[derive(Debug, Deserialize)]
struct InfoParams {
    code: String,
}

impl ZhStockInfoTool {
    /// Create the tool over a shared East Money client
    pub fn new(eastmoney: Arc<EastMoneyClient>) -> Self {
        Self { eastmoney }
    }

    async fn realtime(&self, code: &ZhCode) -> Result<Value> {
        let mut fields: Vec<&str> = REALTIME_FIELDS.iter().map(|(_, id)| *id).collect();
        fields.extend(["f57", "f58", "f85"]);
        let snapshot = self.eastmoney.snapshot(code, &fields).await?;
        Ok(Value::Object(realtime_section(&snapshot)))
    }

    async fn company(&self, code: &ZhCode) -> Result<Value> {
        let snapshot = self.eastmoney.snapshot(code, &COMPANY_FIELDS).await?;
        Ok(company_section(&snapshot))
    }

    async fn indicators(&self, code: &ZhCode) -> Result<Value> {
        let rows = self.eastmoney.financial_indicators(code, 1).await?;
        Ok(rows.first().map(indicator_section).unwrap_or_else(|| json!({})))
    }

    async fn fetch(&self, params: Value) -> Result<Value> {
        let params: InfoParams = parse_params(params)?;
        let code = ZhCode::parse(&params.code);
        info!(code = %code.normalized(), "fetching A-share info");

        let (realtime, company, indicators) = tokio::join!(
            self.realtime(&code),
            self.company(&code),
            self.indicators(&code),
        );

        Ok(json!({
            "realtime_data": section(realtime, "获取实时行情失败"),
            "company_info": section(company, "获取公司基本信息失败"),
            "financial_indicators": section(indicators, "获取财务指标失败"),
            "metadata": {
                "stock_code": params.code,
                "query_time": query_time(),
                "data_source": DATA_SOURCE,
            },
        }))
    }
}

/// A section that failed carries its own error instead of failing the call
fn section(outcome: Result<Value>, prefix: &str) -> Value {
    outcome.unwrap_or_else(|e| {
        warn!(error = %e, "{prefix}");
        error_payload(format!("{prefix}: {e}"))
    })
}

fn realtime_section(snapshot: &Map<String, Value>) -> Map<String, Value> {
    let text = |id: &str| snapshot.get(id).and_then(Value::as_str).unwrap_or_default();
    let mut out = Map::new();
    out.insert("symbol".to_string(), json!(text("f57")));
    out.insert("name".to_string(), json!(text("f58")));
    for (name, id) in REALTIME_FIELDS {
        out.insert(name.to_string(), json!(number(snapshot.get(id))));
    }
    out.insert("float_shares".to_string(), json!(number(snapshot.get("f85"))));
    out
}

fn company_section(snapshot: &Map<String, Value>) -> Value {
    let listing_date = number(snapshot.get("f189"))
        .map(|d| format!("{d:.0}"))
        .unwrap_or_default();
    json!({
        "company_name": snapshot.get("f58").and_then(Value::as_str).unwrap_or_default(),
        "total_share_capital": number(snapshot.get("f84")),
        "circulation_share": number(snapshot.get("f85")),
        "industry": snapshot.get("f127").and_then(Value::as_str).unwrap_or_default(),
        "listing_date": listing_date,
    })
}

fn indicator_section(row: &Map<String, Value>) -> Value {
    let report_date = row
        .get("REPORT_DATE")
        .and_then(Value::as_str)
        .map(|d| d.chars().take(10).collect::<String>())
        .unwrap_or_default();
    json!({
        "report_date": report_date,
        "eps": number(row.get("EPSJB")),
        "roe": number(row.get("ROEJQ")),
        "net_profit_margin": number(row.get("XSJLL")),
        "debt_to_asset_ratio": number(row.get("ZCFZL")),
    })
}

#[async_trait]
impl Tool for ZhStockInfoTool {
    async fn execute(&self, params: Value) -> AgentResult<Value> {
        Ok(respond_prefixed(self.name(), "获取股票信息失败", self.fetch(params).await))
    }

    fn name(&self) -> &'static str {
        "get_zh_stock_info"
    }

    fn description(&self) -> &'static str {
        "获取A股股票基本信息，包括公司概况、市值、估值指标等"
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {"code": code_property()},
            "required": ["code"]
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StockError;

    #[test]
    fn test_realtime_section() {
        let snapshot = json!({
            "f57": "600519",
            "f58": "贵州茅台",
            "f43": 1685.01,
            "f170": -0.89,
            "f162": "-",
            "f85": 1_256_197_800.0
        });
        let section = realtime_section(snapshot.as_object().unwrap());

        assert_eq!(section["symbol"], "600519");
        assert_eq!(section["name"], "贵州茅台");
        assert_eq!(section["current_price"], 1685.01);
        assert_eq!(section["change_percent"], -0.89);
        assert!(section["pe_ratio_dynamic"].is_null());
        assert!(section["week_52_high"].is_null());
        assert_eq!(section["float_shares"], 1_256_197_800.0);
    }

    #[test]
    fn test_company_section() {
        let snapshot = json!({
            "f58": "贵州茅台",
            "f84": 1_256_197_800.0,
            "f127": "酿酒行业",
            "f189": 20_010_827
        });
        let section = company_section(snapshot.as_object().unwrap());
        assert_eq!(section["industry"], "酿酒行业");
        assert_eq!(section["listing_date"], "20010827");
        assert!(section["circulation_share"].is_null());
    }

    #[test]
    fn test_indicator_section() {
        let row = json!({
            "REPORT_DATE": "2024-09-30 00:00:00",
            "EPSJB": 47.1,
            "ROEJQ": 26.09,
            "XSJLL": 52.79,
            "ZCFZL": 12.81
        });
        let section = indicator_section(row.as_object().unwrap());
        assert_eq!(section["report_date"], "2024-09-30");
        assert_eq!(section["roe"], 26.09);
    }

    #[test]
    fn test_failed_section_carries_error() {
        let value = section(Err(StockError::ApiError("timeout".to_string())), "获取实时行情失败");
        assert_eq!(value, json!({"error": "获取实时行情失败: API error: timeout"}));
    }
}
