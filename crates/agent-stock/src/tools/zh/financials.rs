//! A-share key financial indicators of recent report periods

use agent_core::Result as AgentResult;
use agent_tools::Tool;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Map, Value, json};
use std::sync::Arc;
use tracing::info;

use super::{DATA_SOURCE, code_property};
use crate::api::EastMoneyClient;
use crate::api::eastmoney::number;
use crate::error::{Result, StockError};
use crate::symbol::ZhCode;
use crate::tools::{parse_params, query_time, respond_prefixed};

const PERIODS: usize = 4;

/// Report columns and their display names
const KEY_INDICATORS: [(&str, &str); 12] = [
    ("TOTALOPERATEREVE", "营业总收入"),
    ("PARENTNETPROFIT", "归属净利润"),
    ("KCFJCXSYJLR", "扣非净利润"),
    ("EPSJB", "基本每股收益"),
    ("BPS", "每股净资产"),
    ("MGJYXJJE", "每股经营现金流"),
    ("ROEJQ", "净资产收益率"),
    ("XSMLL", "销售毛利率"),
    ("XSJLL", "销售净利率"),
    ("ZCFZL", "资产负债率"),
    ("TOTALOPERATEREVETZ", "营业总收入同比增长率"),
    ("PARENTNETPROFITTZ", "归属净利润同比增长率"),
];

/// Ratios of the latest period: output name and report column
const RATIOS: [(&str, &str); 5] = [
    ("ROE", "ROEJQ"),
    ("净利率", "XSJLL"),
    ("资产负债率", "ZCFZL"),
    ("营业收入同比增长率", "TOTALOPERATEREVETZ"),
    ("净利润同比增长率", "PARENTNETPROFITTZ"),
];

/// Main financial indicators of the last four report periods
pub struct ZhFinancialStatementsTool {
    eastmoney: Arc<EastMoneyClient>,
}

#[derive(Debug, Deserialize)]
struct FinancialParams {
    code: String,
}

impl ZhFinancialStatementsTool {
    /// Create the tool over a shared East Money client
    pub fn new(eastmoney: Arc<EastMoneyClient>) -> Self {
        Self { eastmoney }
    }

    async fn fetch(&self, params: Value) -> Result<Value> {
        let params: FinancialParams = parse_params(params)?;
        let code = ZhCode::parse(&params.code);
        info!(code = %code.normalized(), "fetching A-share financials");

        let rows = self.eastmoney.financial_indicators(&code, PERIODS).await?;
        if rows.is_empty() {
            return Err(StockError::NoData(format!(
                "未找到股票代码 {} 的财务数据",
                params.code
            )));
        }

        Ok(json!({
            "stock_code": params.code,
            "data_source": DATA_SOURCE,
            "data": rows.iter().take(PERIODS).map(period_record).collect::<Vec<_>>(),
            "ratios": ratios(&rows[0]),
            "query_time": query_time(),
        }))
    }
}

fn period_record(row: &Map<String, Value>) -> Value {
    let mut record = Map::new();
    let report_date = row
        .get("REPORT_DATE")
        .and_then(Value::as_str)
        .map(|d| d.chars().take(10).collect::<String>());
    record.insert("报告日期".to_string(), json!(report_date));
    record.insert("报告期".to_string(), row.get("REPORT_DATE_NAME").cloned().unwrap_or(Value::Null));
    for (column, name) in KEY_INDICATORS {
        record.insert(name.to_string(), json!(number(row.get(column))));
    }
    Value::Object(record)
}

fn ratios(latest: &Map<String, Value>) -> Map<String, Value> {
    RATIOS
        .iter()
        .filter_map(|(name, column)| {
            number(latest.get(*column)).map(|v| ((*name).to_string(), json!(v)))
        })
        .collect()
}

#[async_trait]
impl Tool for ZhFinancialStatementsTool {
    async fn execute(&self, params: Value) -> AgentResult<Value> {
        Ok(respond_prefixed(self.name(), "获取财务报表失败", self.fetch(params).await))
    }

    fn name(&self) -> &'static str {
        "get_zh_financial_statements"
    }

    fn description(&self) -> &'static str {
        "获取A股公司财务报表数据，包括利润表、资产负债表和现金流量表"
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {"code": code_property()},
            "required": ["code"]
        })
    }
}
