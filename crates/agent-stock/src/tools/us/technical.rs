//! Technical indicators for US tickers

use agent_core::Result as AgentResult;
use agent_tools::Tool;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Map, Value, json};
use std::sync::Arc;
use tracing::info;

use crate::api::{Bar, YahooFinanceClient};
use crate::error::{Result, StockError};
use crate::indicators::{self, Series};
use crate::tools::{parse_date, parse_params, respond};

const MIN_BARS: usize = 20;
const RECENT_ROWS: usize = 5;

/// MA, RSI, MACD, Bollinger and KDJ over a date range
pub struct TechnicalIndicatorsTool {
    yahoo: Arc<YahooFinanceClient>,
}

#[derive(Debug, Deserialize)]
struct TechnicalParams {
    ticker: String,
    start_date: String,
    end_date: String,
}

/// Indicator columns aligned with the bars
struct Columns {
    ma5: Series,
    ma10: Series,
    ma20: Series,
    ma50: Series,
    ma200: Series,
    rsi: Series,
    macd: indicators::Macd,
    bollinger: indicators::Bollinger,
    kdj: indicators::Kdj,
}

impl Columns {
    fn compute(bars: &[Bar]) -> Self {
        let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();
        let highs: Vec<f64> = bars.iter().map(|b| b.high).collect();
        let lows: Vec<f64> = bars.iter().map(|b| b.low).collect();

        Self {
            ma5: indicators::rolling_mean(&closes, 5),
            ma10: indicators::rolling_mean(&closes, 10),
            ma20: indicators::rolling_mean(&closes, 20),
            ma50: indicators::rolling_mean(&closes, 50),
            ma200: indicators::rolling_mean(&closes, 200),
            rsi: indicators::rsi(&closes, 14),
            macd: indicators::macd(&closes, 12, 26, 9),
            bollinger: indicators::bollinger(&closes, 20, 2.0),
            kdj: indicators::kdj(&highs, &lows, &closes, 9),
        }
    }

    fn row(&self, bar: &Bar, i: usize) -> Value {
        let mut row = json!({
            "date": bar.date.format("%Y-%m-%d").to_string(),
            "close": bar.close,
            "volume": bar.volume as u64,
            "moving_averages": {
                "ma5": self.ma5[i],
                "ma10": self.ma10[i],
                "ma20": self.ma20[i],
                "ma50": self.ma50[i],
                "ma200": self.ma200[i],
            },
            "oscillators": {"rsi": self.rsi[i]},
            "macd": {
                "macd": self.macd.macd[i],
                "signal": self.macd.signal[i],
                "histogram": self.macd.histogram[i],
            },
            "bollinger_bands": {
                "upper": self.bollinger.upper[i],
                "sma": self.bollinger.middle[i],
                "lower": self.bollinger.lower[i],
            },
        });
        if let Some(k) = self.kdj.k[i] {
            row["kdj"] = json!({"k": k, "d": self.kdj.d[i], "j": self.kdj.j[i]});
        }
        row
    }

    /// Signals of the latest bar
    fn current_analysis(&self, close: f64, i: usize) -> Map<String, Value> {
        let mut analysis = Map::new();
        let above = |line: f64| if close > line { "上涨" } else { "下跌" };

        if let (Some(ma5), Some(ma20)) = (self.ma5[i], self.ma20[i]) {
            analysis.insert(
                "trend".to_string(),
                json!({
                    "price_vs_ma5": above(ma5),
                    "price_vs_ma20": above(ma20),
                    "ma5_vs_ma20": if ma5 > ma20 { "多头排列" } else { "空头排列" },
                }),
            );
        }

        if let Some(rsi) = self.rsi[i] {
            let signal = if rsi > 70.0 {
                "超买"
            } else if rsi < 30.0 {
                "超卖"
            } else {
                "正常"
            };
            analysis.insert("rsi_analysis".to_string(), json!({"value": rsi, "signal": signal}));
        }

        if let (Some(macd), Some(signal)) = (self.macd.macd[i], self.macd.signal[i]) {
            let histogram = self.macd.histogram[i].unwrap_or(macd - signal);
            analysis.insert(
                "macd_analysis".to_string(),
                json!({
                    "trend": if macd > signal { "看涨" } else { "看跌" },
                    "histogram_trend": if histogram > 0.0 { "增强" } else { "减弱" },
                }),
            );
        }

        if let (Some(upper), Some(lower), Some(sma)) = (
            self.bollinger.upper[i],
            self.bollinger.lower[i],
            self.bollinger.middle[i],
        ) {
            let position = if close > upper * 0.98 {
                "上轨附近"
            } else if close < lower * 1.02 {
                "下轨附近"
            } else {
                "中轨附近"
            };
            analysis.insert(
                "bollinger_analysis".to_string(),
                json!({
                    "position": position,
                    "squeeze": (upper - lower).abs() / sma < 0.1,
                }),
            );
        }

        analysis
    }
}

impl TechnicalIndicatorsTool {
    /// Create the tool over a shared Yahoo client
    pub fn new(yahoo: Arc<YahooFinanceClient>) -> Self {
        Self { yahoo }
    }

    async fn fetch(&self, params: Value) -> Result<Value> {
        let params: TechnicalParams = parse_params(params)?;
        let start = parse_date(&params.start_date)?;
        let end = parse_date(&params.end_date)?;
        info!(ticker = %params.ticker, %start, %end, "calculating technical indicators");

        let bars = self.yahoo.history(&params.ticker, start, end).await?;
        analyze(&params, &bars)
    }
}

fn analyze(params: &TechnicalParams, bars: &[Bar]) -> Result<Value> {
    if bars.len() < MIN_BARS {
        return Err(StockError::NoData("数据不足，无法计算技术指标".to_string()));
    }

    let columns = Columns::compute(bars);
    let from = bars.len() - RECENT_ROWS;
    let rows: Vec<Value> = (from..bars.len())
        .map(|i| columns.row(&bars[i], i))
        .collect();
    let last = bars.len() - 1;

    Ok(json!({
        "ticker": params.ticker,
        "calculation_period": {
            "start_date": params.start_date,
            "end_date": params.end_date,
            "total_days": bars.len(),
        },
        "indicators": rows,
        "current_analysis": columns.current_analysis(bars[last].close, last),
    }))
}

#[async_trait]
impl Tool for TechnicalIndicatorsTool {
    async fn execute(&self, params: Value) -> AgentResult<Value> {
        Ok(respond(self.name(), self.fetch(params).await))
    }

    fn name(&self) -> &'static str {
        "calculate_technical_indicators"
    }

    fn description(&self) -> &'static str {
        "计算技术指标，包括移动平均线(MA)、相对强弱指数(RSI)、MACD等"
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
