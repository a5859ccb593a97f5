//! Annual income, balance sheet and cash flow statements

use agent_core::Result as AgentResult;
use agent_tools::Tool;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Map, Value, json};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{info, warn};

use crate::api::YahooFinanceClient;
use crate::error::{Result, StockError};
use crate::tools::{parse_params, respond};

const MAX_PERIODS: usize = 4;
const MAX_FIELDS: usize = 20;

/// Series of one statement, keyed by as-of date
type StatementSeries = BTreeMap<String, BTreeMap<String, f64>>;

/// One statement kind: upstream series names with display names, most
/// important first
struct Statement {
    kind: &'static str,
    title: &'static str,
    fields: &'static [(&'static str, &'static str)],
}

const STATEMENTS: [Statement; 3] = [
    Statement {
        kind: "income",
        title: "损益表",
        fields: &[
            ("TotalRevenue", "Total Revenue"),
            ("NetIncome", "Net Income"),
            ("GrossProfit", "Gross Profit"),
            ("OperatingIncome", "Operating Income"),
            ("EBITDA", "EBITDA"),
            ("BasicEPS", "Basic EPS"),
            ("DilutedEPS", "Diluted EPS"),
            ("OperatingRevenue", "Operating Revenue"),
            ("CostOfRevenue", "Cost Of Revenue"),
            ("OperatingExpense", "Operating Expense"),
            ("InterestExpense", "Interest Expense"),
            ("TaxProvision", "Tax Provision"),
            ("NetIncomeCommonStockholders", "Net Income Common Stockholders"),
            ("ResearchAndDevelopment", "Research And Development"),
            ("SellingGeneralAndAdministration", "Selling General And Administration"),
            ("PretaxIncome", "Pretax Income"),
            ("EBIT", "EBIT"),
            ("BasicAverageShares", "Basic Average Shares"),
            ("DilutedAverageShares", "Diluted Average Shares"),
            ("InterestIncome", "Interest Income"),
            ("OtherIncomeExpense", "Other Income Expense"),
        ],
    },
    Statement {
        kind: "balance",
        title: "资产负债表",
        fields: &[
            ("TotalAssets", "Total Assets"),
            ("TotalLiabilitiesNetMinorityInterest", "Total Liabilities Net Minority Interest"),
            ("StockholdersEquity", "Stockholders Equity"),
            ("CurrentAssets", "Current Assets"),
            ("CurrentLiabilities", "Current Liabilities"),
            ("CashAndCashEquivalents", "Cash And Cash Equivalents"),
            ("TotalDebt", "Total Debt"),
            ("NetDebt", "Net Debt"),
            ("WorkingCapital", "Working Capital"),
            ("RetainedEarnings", "Retained Earnings"),
            ("TotalCapitalization", "Total Capitalization"),
            ("Inventory", "Inventory"),
            ("AccountsReceivable", "Accounts Receivable"),
            ("AccountsPayable", "Accounts Payable"),
            ("LongTermDebt", "Long Term Debt"),
            ("NetPPE", "Net PPE"),
            ("Goodwill", "Goodwill"),
            ("OrdinarySharesNumber", "Ordinary Shares Number"),
            ("TangibleBookValue", "Tangible Book Value"),
            ("InvestedCapital", "Invested Capital"),
        ],
    },
    Statement {
        kind: "cash",
        title: "现金流量表",
        fields: &[
            ("OperatingCashFlow", "Operating Cash Flow"),
            ("InvestingCashFlow", "Investing Cash Flow"),
            ("FinancingCashFlow", "Financing Cash Flow"),
            ("NetIncomeFromContinuingOperations", "Net Income From Continuing Ops"),
            ("CapitalExpenditure", "Capital Expenditure"),
            ("FreeCashFlow", "Free Cash Flow"),
            ("ChangesInCash", "Change In Cash"),
            ("DepreciationAndAmortization", "Depreciation And Amortization"),
            ("StockBasedCompensation", "Stock Based Compensation"),
            ("ChangeInWorkingCapital", "Change In Working Capital"),
            ("RepurchaseOfCapitalStock", "Repurchase Of Capital Stock"),
            ("CashDividendsPaid", "Cash Dividends Paid"),
            ("EndCashPosition", "End Cash Position"),
            ("BeginningCashPosition", "Beginning Cash Position"),
            ("IssuanceOfDebt", "Issuance Of Debt"),
            ("RepaymentOfDebt", "Repayment Of Debt"),
        ],
    },
];

/// The latest annual financial statements of a US ticker
pub struct FinancialStatementsTool {
    yahoo: Arc<YahooFinanceClient>,
}

#[derive(Debug, Deserialize)]
struct FinancialParams {
    ticker: String,
}

impl FinancialStatementsTool {
    /// Create the tool over a shared Yahoo client
    pub fn new(yahoo: Arc<YahooFinanceClient>) -> Self {
        Self { yahoo }
    }

    async fn fetch(&self, params: Value) -> Result<Value> {
        let params: FinancialParams = parse_params(params)?;
        info!(ticker = %params.ticker, "fetching financial statements");

        let mut fetched = Vec::with_capacity(STATEMENTS.len());
        for statement in &STATEMENTS {
            let types: Vec<String> = statement
                .fields
                .iter()
                .map(|(key, _)| format!("annual{key}"))
                .collect();
            let series = self.yahoo.timeseries(&params.ticker, &types).await?;
            fetched.push(series);
        }

        build_statements(&params.ticker, &fetched)
    }
}

/// Assemble the statements response from the series of each statement,
/// in [`STATEMENTS`] order.
fn build_statements(ticker: &str, fetched: &[StatementSeries]) -> Result<Value> {
    let mut statements = Map::new();
    let mut available = Vec::new();
    let mut latest_income: Option<Map<String, Value>> = None;

    for (statement, series) in STATEMENTS.iter().zip(fetched) {
        let Some(data) = statement_data(ticker, statement, series) else {
            warn!(ticker, statement = statement.title, "no statement data");
            continue;
        };
        if statement.kind == "income" {
            latest_income = data["periods"][0]
                .as_str()
                .and_then(|period| data["data"][period].as_object().cloned());
        }
        statements.insert(
            statement.kind.to_string(),
            json!({"title": statement.title, "data": data}),
        );
        available.push(statement.kind);
    }

    if statements.is_empty() {
        return Err(StockError::NoData("未获取到任何财务报表数据".to_string()));
    }

    let mut result = json!({
        "ticker": ticker,
        "metadata": {
            "available_statements": available,
            "total_statements": statements.len(),
        },
        "statements": statements,
    });

    let ratios = latest_income.as_ref().map(income_ratios).unwrap_or_default();
    if !ratios.is_empty() {
        result["calculated_ratios"] = Value::Object(ratios);
    }

    info!(ticker, statements = available.len(), "assembled financial statements");
    Ok(result)
}

fn statement_data(ticker: &str, statement: &Statement, series: &StatementSeries) -> Option<Value> {
    let mut periods: Vec<&String> = series.values().flat_map(BTreeMap::keys).collect();
    periods.sort_unstable_by(|a, b| b.cmp(a));
    periods.dedup();
    periods.truncate(MAX_PERIODS);
    if periods.is_empty() {
        return None;
    }

    let fields: Vec<(&str, &str)> = statement
        .fields
        .iter()
        .filter(|(key, _)| series.contains_key(&format!("annual{key}")))
        .take(MAX_FIELDS)
        .copied()
        .collect();

    let data: Map<String, Value> = periods
        .iter()
        .map(|&period| {
            let values: Map<String, Value> = fields
                .iter()
                .filter_map(|(key, name)| {
                    let value = series.get(&format!("annual{key}"))?.get(period)?;
                    Some(((*name).to_string(), json!(value)))
                })
                .collect();
            (period.clone(), Value::Object(values))
        })
        .collect();

    Some(json!({
        "ticker": ticker,
        "statement_type": statement.kind,
        "periods": periods,
        "data": data,
    }))
}

fn income_ratios(latest: &Map<String, Value>) -> Map<String, Value> {
    let mut ratios = Map::new();
    let value = |name: &str| latest.get(name).and_then(Value::as_f64);

    if let Some(revenue) = value("Total Revenue").filter(|r| *r != 0.0) {
        if let Some(net) = value("Net Income") {
            ratios.insert("net_profit_margin".to_string(), json!(net / revenue * 100.0));
        }
        if let Some(gross) = value("Gross Profit") {
            ratios.insert("gross_profit_margin".to_string(), json!(gross / revenue * 100.0));
        }
    }
    ratios
}

#[async_trait]
impl Tool for FinancialStatementsTool {
    async fn execute(&self, params: Value) -> AgentResult<Value> {
        Ok(respond(self.name(), self.fetch(params).await))
    }

    fn name(&self) -> &'static str {
        "get_financial_statements"
    }

    fn description(&self) -> &'static str {
        "获取公司完整财务报表数据，包括损益表、资产负债表和现金流量表"
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
