//! A-share technical indicators with a rule-based summary

use agent_core::Result as AgentResult;
use agent_tools::Tool;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Map, Value, json};
use std::sync::Arc;
use tracing::info;

use super::code_property;
use crate::api::{Adjust, Bar, EastMoneyClient};
use crate::error::{Result, StockError};
use crate::indicators::{self, Series};
use crate::symbol::ZhCode;
use crate::tools::{parse_date, parse_params, respond_prefixed};

/// Values reported per series
const TAIL: usize = 10;

const MA_PERIODS: [usize; 4] = [5, 10, 20, 60];

/// MA, RSI, MACD, BOLL and KDJ on forward-adjusted daily bars
pub struct ZhTechnicalIndicatorsTool {
    eastmoney: Arc<EastMoneyClient>,
}

#[derive(Debug, Deserialize)]
struct TechnicalParams {
    code: String,
    start_date: String,
    end_date: String,
    #[serde(default = "default_indicators")]
    indicators: Vec<String>,
}

fn default_indicators() -> Vec<String> {
    ["MA", "RSI", "MACD"].map(String::from).to_vec()
}

/// Computed columns in insertion order
#[derive(Default)]
struct Frame {
    columns: Vec<(String, Series)>,
}

impl Frame {
    fn push(&mut self, name: impl Into<String>, series: Series) {
        self.columns.push((name.into(), series));
    }

    fn get(&self, name: &str) -> Option<&Series> {
        self.columns.iter().find(|(n, _)| n == name).map(|(_, s)| s)
    }

    fn latest(&self, name: &str) -> Option<f64> {
        self.get(name).and_then(|s| indicators::last(s))
    }
}

impl ZhTechnicalIndicatorsTool {
    /// Create the tool over a shared East Money client
    pub fn new(eastmoney: Arc<EastMoneyClient>) -> Self {
        Self { eastmoney }
    }

    async fn fetch(&self, params: Value) -> Result<Value> {
        let params: TechnicalParams = parse_params(params)?;
        let start = parse_date(&params.start_date)?;
        let end = parse_date(&params.end_date)?;
        let code = ZhCode::parse(&params.code);
        info!(code = %code.normalized(), indicators = ?params.indicators, "calculating A-share indicators");

        let bars = self.eastmoney.daily_bars(&code, start, end, Adjust::Forward).await?;
        if bars.is_empty() {
            return Err(StockError::NoData(format!(
                "未找到股票代码 {} 的历史数据",
                params.code
            )));
        }

        let result = analyze(&params, &bars);
        info!(code = %code.normalized(), bars = bars.len(), "calculated A-share indicators");
        Ok(result)
    }
}

fn analyze(params: &TechnicalParams, bars: &[Bar]) -> Value {
    let wanted: Vec<String> = params.indicators.iter().map(|i| i.trim().to_uppercase()).collect();
    let wants = |name: &str| wanted.iter().any(|w| w == name);

    let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();
    let highs: Vec<f64> = bars.iter().map(|b| b.high).collect();
    let lows: Vec<f64> = bars.iter().map(|b| b.low).collect();
    let dates: Vec<String> = bars.iter().map(|b| b.date.format("%Y-%m-%d").to_string()).collect();
    let tail = |series: &Series| tail_by_date(&dates, series);

    let mut frame = Frame::default();
    let mut data = Map::new();

    if wants("MA") {
        let mut group = Map::new();
        for period in MA_PERIODS {
            let series = indicators::rolling_mean(&closes, period);
            group.insert(format!("MA{period}"), tail(&series));
            frame.push(format!("MA{period}"), series);
        }
        data.insert("MA".to_string(), Value::Object(group));
    }

    if wants("RSI") {
        let series = indicators::rsi(&closes, 14);
        data.insert("RSI".to_string(), tail(&series));
        frame.push("RSI", series);
    }

    if wants("MACD") {
        let macd = indicators::macd(&closes, 12, 26, 9);
        data.insert(
            "MACD".to_string(),
            json!({
                "MACD": tail(&macd.macd),
                "Signal": tail(&macd.signal),
                "Histogram": tail(&macd.histogram),
            }),
        );
        frame.push("MACD", macd.macd);
        frame.push("MACD_signal", macd.signal);
        frame.push("MACD_histogram", macd.histogram);
    }

    if wants("BOLL") {
        let bands = indicators::bollinger(&closes, 20, 2.0);
        data.insert(
            "Bollinger_Bands".to_string(),
            json!({
                "Upper": tail(&bands.upper),
                "Middle": tail(&bands.middle),
                "Lower": tail(&bands.lower),
            }),
        );
        frame.push("BOLL_middle", bands.middle);
        frame.push("BOLL_upper", bands.upper);
        frame.push("BOLL_lower", bands.lower);
    }

    if wants("KDJ") {
        let kdj = indicators::kdj(&highs, &lows, &closes, 9);
        data.insert(
            "KDJ".to_string(),
            json!({"K": tail(&kdj.k), "D": tail(&kdj.d), "J": tail(&kdj.j)}),
        );
        frame.push("K", kdj.k);
        frame.push("D", kdj.d);
        frame.push("J", kdj.j);
    }

    let latest_bar = &bars[bars.len() - 1];
    let mut latest = Map::new();
    latest.insert("close".to_string(), json!(latest_bar.close));
    latest.insert("volume".to_string(), json!(latest_bar.volume));
    for (name, series) in &frame.columns {
        latest.insert(name.clone(), json!(indicators::last(series)));
    }

    json!({
        "stock_code": params.code,
        "period": format!("{} 到 {}", params.start_date, params.end_date),
        "calculated_indicators": params.indicators,
        "indicators_data": data,
        "technical_summary": summary(&frame, latest_bar.close, &wants),
        "latest_values": latest,
        "data_points": bars.len(),
    })
}

/// Last defined values of a series, keyed by date
fn tail_by_date(dates: &[String], series: &Series) -> Value {
    let defined: Vec<(&String, f64)> = dates
        .iter()
        .zip(series)
        .filter_map(|(date, value)| value.map(|v| (date, v)))
        .collect();
    let from = defined.len().saturating_sub(TAIL);
    Value::Object(
        defined[from..]
            .iter()
            .map(|(date, value)| ((*date).clone(), json!(value)))
            .collect(),
    )
}

fn summary(frame: &Frame, close: f64, wants: &dyn Fn(&str) -> bool) -> Map<String, Value> {
    let mut summary = Map::new();

    if wants("MA") {
        let ma = |p: &str| frame.latest(p);
        let trend = match (ma("MA5"), ma("MA10"), ma("MA20")) {
            (Some(ma5), Some(ma10), Some(ma20)) if close > ma5 && ma5 > ma10 && ma10 > ma20 => {
                "多头排列，上涨趋势"
            }
            (Some(ma5), Some(ma10), Some(ma20)) if close < ma5 && ma5 < ma10 && ma10 < ma20 => {
                "空头排列，下跌趋势"
            }
            _ => "趋势不明确",
        };
        summary.insert("MA_trend".to_string(), json!(trend));
    }

    if wants("RSI") {
        let signal = match frame.latest("RSI") {
            Some(rsi) if rsi > 80.0 => "超买区域，可能回调",
            Some(rsi) if rsi < 20.0 => "超卖区域，可能反弹",
            _ => "正常区域",
        };
        summary.insert("RSI_signal".to_string(), json!(signal));
    }

    if wants("MACD") {
        let signal = match (frame.latest("MACD"), frame.latest("MACD_signal")) {
            (Some(macd), Some(signal)) if macd > signal && macd > 0.0 => "金叉向上，买入信号",
            (Some(macd), Some(signal)) if macd < signal && macd < 0.0 => "死叉向下，卖出信号",
            _ => "观望",
        };
        summary.insert("MACD_signal".to_string(), json!(signal));
    }

    summary
}

#[async_trait]
impl Tool for ZhTechnicalIndicatorsTool {
    async fn execute(&self, params: Value) -> AgentResult<Value> {
        Ok(respond_prefixed(self.name(), "技术分析失败", self.fetch(params).await))
    }

    fn name(&self) -> &'static str {
        "calculate_zh_technical_indicators"
    }

    fn description(&self) -> &'static str {
        "计算A股技术指标，包括移动平均线(MA)、相对强弱指数(RSI)、MACD等"
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "code": code_property(),
                "start_date": {"type": "string", "description": "开始日期，格式YYYY-MM-DD"},
                "end_date": {"type": "string", "description": "结束日期，格式YYYY-MM-DD"},
                "indicators": {
                    "type": "array",
                    "items": {"type": "string"},
                    "description": "要计算的指标列表，可选：MA, RSI, MACD, BOLL, KDJ",
                    "default": ["MA", "RSI", "MACD"]
                }
            },
            "required": ["code", "start_date", "end_date"]
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, NaiveDate};

    fn params(indicators: &[&str]) -> TechnicalParams {
        TechnicalParams {
            code: "600519".to_string(),
            start_date: "2024-01-01".to_string(),
            end_date: "2024-06-30".to_string(),
            indicators: indicators.iter().map(|s| (*s).to_string()).collect(),
        }
    }

    fn bars(closes: impl Iterator<Item = f64>) -> Vec<Bar> {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        closes
            .enumerate()
            .map(|(i, c)| Bar::ohlcv(start + Duration::days(i as i64), c, c + 1.0, c - 1.0, c, 10_000.0))
            .collect()
    }

    #[test]
    fn test_default_indicators() {
        let params: TechnicalParams = parse_params(json!({
            "code": "600519",
            "start_date": "2024-01-01",
            "end_date": "2024-06-30"
        }))
        .unwrap();
        assert_eq!(params.indicators, ["MA", "RSI", "MACD"]);
    }

    #[test]
    fn test_uptrend_summary() {
        let result = analyze(&params(&["MA", "RSI", "MACD"]), &bars((0..80).map(|i| 100.0 + f64::from(i))));

        let summary = &result["technical_summary"];
        assert_eq!(summary["MA_trend"], "多头排列，上涨趋势");
        assert_eq!(summary["RSI_signal"], "超买区域，可能回调");
        assert_eq!(summary["MACD_signal"], "金叉向上，买入信号");

        let ma5 = result["indicators_data"]["MA"]["MA5"].as_object().unwrap();
        assert_eq!(ma5.len(), TAIL);
        assert!(ma5.contains_key("2024-03-20"));
        assert_eq!(result["data_points"], 80);
        assert_eq!(result["latest_values"]["close"], 179.0);
        assert!(result["latest_values"]["MA60"].is_number());
        assert!(result["latest_values"].get("K").is_none());
    }

    #[test]
    fn test_downtrend_summary() {
        let result = analyze(&params(&["ma", "rsi", "macd"]), &bars((0..80).map(|i| 200.0 - f64::from(i))));

        let summary = &result["technical_summary"];
        assert_eq!(summary["MA_trend"], "空头排列，下跌趋势");
        assert_eq!(summary["RSI_signal"], "超卖区域，可能反弹");
        assert_eq!(summary["MACD_signal"], "死叉向下，卖出信号");
    }

    #[test]
    fn test_short_history_is_unclear() {
        let result = analyze(&params(&["MA", "BOLL", "KDJ"]), &bars((0..8).map(|i| 10.0 + f64::from(i))));

        assert_eq!(result["technical_summary"]["MA_trend"], "趋势不明确");
        assert!(result["technical_summary"].get("RSI_signal").is_none());
        assert_eq!(result["indicators_data"]["MA"]["MA20"], json!({}));
        assert_eq!(result["indicators_data"]["Bollinger_Bands"]["Upper"], json!({}));
        assert!(result["latest_values"]["BOLL_upper"].is_null());
        assert!(result["indicators_data"]["KDJ"]["K"].as_object().unwrap().is_empty());
    }
}
