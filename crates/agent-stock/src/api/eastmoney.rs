//! East Money client for China A-share data
//!
//! Daily bars, real-time snapshots, the main financial indicator report and
//! news search. All endpoints are public and keyless.

use chrono::NaiveDate;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use std::sync::Arc;
use tracing::debug;

use super::Bar;
use super::http::HttpClient;
use crate::config::StockConfig;
use crate::error::{Result, StockError};
use crate::symbol::ZhCode;

const KLINE_URL: &str = "https://push2his.eastmoney.com/api/qt/stock/kline/get";
const QUOTE_URL: &str = "https://push2.eastmoney.com/api/qt/stock/get";
const DATACENTER_URL: &str = "https://datacenter.eastmoney.com/securities/api/data/v1/get";
const NEWS_URL: &str = "https://search-api-web.eastmoney.com/search/jsonp";

/// Search highlight tags and layout noise in news text
const HIGHLIGHT_PATTERN: &str = r"\(<em>|</em>\)|</?em>|\x{3000}|\r\n";

/// Price adjustment of daily bars
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Adjust {
    /// Forward-adjusted (前复权)
    #[default]
    Forward,
    /// Backward-adjusted (后复权)
    Backward,
    /// Raw prices
    None,
}

impl Adjust {
    /// Parse the tool parameter; anything but `qfq`/`hfq` means raw prices
    pub fn from_param(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "qfq" => Self::Forward,
            "hfq" => Self::Backward,
            _ => Self::None,
        }
    }

    /// The tool parameter spelling
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Forward => "qfq",
            Self::Backward => "hfq",
            Self::None => "",
        }
    }

    fn fqt(self) -> &'static str {
        match self {
            Self::Forward => "1",
            Self::Backward => "2",
            Self::None => "0",
        }
    }
}

/// One news article
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EastMoneyNewsItem {
    pub title: String,
    pub content: String,
    pub publish_time: String,
    pub media: String,
    pub url: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawNewsItem {
    date: String,
    title: String,
    content: String,
    #[serde(rename = "mediaName")]
    media_name: String,
    code: String,
}

/// East Money API client
pub struct EastMoneyClient {
    http: HttpClient,
    highlight: Regex,
}

impl EastMoneyClient {
    /// Create a new East Money client
    pub fn new(config: Arc<StockConfig>) -> Result<Self> {
        Ok(Self {
            http: HttpClient::new("eastmoney", config)?,
            highlight: highlight_regex()?,
        })
    }

    /// Daily bars between two dates (both inclusive)
    pub async fn daily_bars(
        &self,
        code: &ZhCode,
        start: NaiveDate,
        end: NaiveDate,
        adjust: Adjust,
    ) -> Result<Vec<Bar>> {
        let secid = code.secid();
        let beg = start.format("%Y%m%d").to_string();
        let end = end.format("%Y%m%d").to_string();

        let body: Value = self
            .http
            .json(|c| {
                c.get(KLINE_URL).query(&[
                    ("secid", secid.as_str()),
                    ("fields1", "f1,f2,f3,f4,f5,f6"),
                    ("fields2", "f51,f52,f53,f54,f55,f56,f57,f58,f59,f60,f61"),
                    ("klt", "101"),
                    ("fqt", adjust.fqt()),
                    ("beg", beg.as_str()),
                    ("end", end.as_str()),
                ])
            })
            .await?;

        let bars: Vec<Bar> = body["data"]["klines"]
            .as_array()
            .map(|lines| {
                lines
                    .iter()
                    .filter_map(Value::as_str)
                    .filter_map(parse_kline)
                    .collect()
            })
            .unwrap_or_default();

        debug!(code = %code.normalized(), bars = bars.len(), "fetched East Money bars");
        Ok(bars)
    }

    /// Real-time snapshot fields (`f43`, `f58`, ...) of one stock
    pub async fn snapshot(&self, code: &ZhCode, fields: &[&str]) -> Result<Map<String, Value>> {
        let secid = code.secid();
        let fields = fields.join(",");

        let body: Value = self
            .http
            .json(|c| {
                c.get(QUOTE_URL).query(&[
                    ("secid", secid.as_str()),
                    ("fltt", "2"),
                    ("invt", "2"),
                    ("fields", fields.as_str()),
                ])
            })
            .await?;

        match body.get("data") {
            Some(Value::Object(data)) => Ok(data.clone()),
            _ => Err(StockError::DataUnavailable {
                symbol: code.normalized(),
                reason: "no snapshot data".to_string(),
            }),
        }
    }

    /// Main financial indicators, newest report first
    pub async fn financial_indicators(
        &self,
        code: &ZhCode,
        periods: usize,
    ) -> Result<Vec<Map<String, Value>>> {
        let filter = format!("(SECUCODE=\"{}\")", code.normalized());
        let page_size = periods.to_string();

        let body: Value = self
            .http
            .json(|c| {
                c.get(DATACENTER_URL).query(&[
                    ("reportName", "RPT_F10_FINANCE_MAINFINADATA"),
                    ("columns", "ALL"),
                    ("filter", filter.as_str()),
                    ("pageNumber", "1"),
                    ("pageSize", page_size.as_str()),
                    ("sortColumns", "REPORT_DATE"),
                    ("sortTypes", "-1"),
                    ("source", "HSF10"),
                    ("client", "PC"),
                ])
            })
            .await?;

        if body["success"] == Value::Bool(false) && !body["result"].is_object() {
            let message = body["message"].as_str().unwrap_or("request rejected");
            return Err(StockError::EastMoneyError(message.to_string()));
        }

        Ok(body["result"]["data"]
            .as_array()
            .map(|rows| rows.iter().filter_map(|r| r.as_object().cloned()).collect())
            .unwrap_or_default())
    }

    /// Latest news mentioning `keyword`
    pub async fn news(&self, keyword: &str, limit: usize) -> Result<Vec<EastMoneyNewsItem>> {
        let param = json!({
            "uid": "",
            "keyword": keyword,
            "type": ["cmsArticleWebOld"],
            "client": "web",
            "clientType": "web",
            "clientVersion": "curr",
            "param": {
                "cmsArticleWebOld": {
                    "searchScope": "default",
                    "sort": "default",
                    "pageIndex": 1,
                    "pageSize": limit,
                    "preTag": "<em>",
                    "postTag": "</em>"
                }
            }
        })
        .to_string();

        let text = self
            .http
            .text(|c| {
                c.get(NEWS_URL)
                    .query(&[("cb", "jQuery"), ("param", param.as_str())])
                    .header("Referer", "https://so.eastmoney.com/")
            })
            .await?;

        parse_news(&text, &self.highlight)
    }
}

/// `date,open,close,high,low,volume,amount,amplitude,pct,change,turnover`
fn parse_kline(line: &str) -> Option<Bar> {
    let parts: Vec<&str> = line.split(',').collect();
    if parts.len() < 6 {
        return None;
    }
    let num = |i: usize| parts.get(i).and_then(|v| v.parse::<f64>().ok());

    Some(Bar {
        date: NaiveDate::parse_from_str(parts[0], "%Y-%m-%d").ok()?,
        open: num(1)?,
        close: num(2)?,
        high: num(3)?,
        low: num(4)?,
        volume: num(5)?,
        amount: num(6),
        amplitude: num(7),
        pct_change: num(8),
        change: num(9),
        turnover: num(10),
    })
}

fn strip_jsonp(text: &str) -> Option<&str> {
    let start = text.find('(')?;
    let end = text.rfind(')')?;
    (start < end).then(|| &text[start + 1..end])
}

fn highlight_regex() -> Result<Regex> {
    Regex::new(HIGHLIGHT_PATTERN).map_err(|e| StockError::Other(e.to_string()))
}

fn parse_news(text: &str, highlight: &Regex) -> Result<Vec<EastMoneyNewsItem>> {
    let clean = |text: &str| highlight.replace_all(text, "").trim().to_string();
    let payload = strip_jsonp(text)
        .ok_or_else(|| StockError::EastMoneyError("malformed news response".to_string()))?;
    let body: Value = serde_json::from_str(payload)?;

    let items = match body["result"].get("cmsArticleWebOld") {
        Some(items) => Vec::<RawNewsItem>::deserialize(items)?,
        None => Vec::new(),
    };

    Ok(items
        .into_iter()
        .map(|item| EastMoneyNewsItem {
            title: clean(&item.title),
            content: clean(&item.content),
            publish_time: item.date,
            media: item.media_name,
            url: format!("http://finance.eastmoney.com/a/{}.html", item.code),
        })
        .collect())
}

/// Numeric value of a snapshot or report field; `"-"` and blanks are missing
pub fn number(value: Option<&Value>) -> Option<f64> {
    match value? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_kline() {
        let bar = parse_kline("2024-01-02,1700.00,1685.01,1709.00,1680.00,32341,5476532224.00,1.71,-0.89,-15.11,0.26")
            .unwrap();
        assert_eq!(bar.date, NaiveDate::from_ymd_opt(2024, 1, 2).unwrap());
        assert_eq!(bar.open, 1700.0);
        assert_eq!(bar.close, 1685.01);
        assert_eq!(bar.high, 1709.0);
        assert_eq!(bar.low, 1680.0);
        assert_eq!(bar.volume, 32341.0);
        assert_eq!(bar.pct_change, Some(-0.89));
        assert_eq!(bar.turnover, Some(0.26));
    }

    #[test]
    fn test_parse_kline_rejects_garbage() {
        assert!(parse_kline("not,a,bar").is_none());
        assert!(parse_kline("2024-13-01,1,2,3,4,5").is_none());
    }

    #[test]
    fn test_adjust_param() {
        assert_eq!(Adjust::from_param("qfq"), Adjust::Forward);
        assert_eq!(Adjust::from_param("HFQ"), Adjust::Backward);
        assert_eq!(Adjust::from_param(""), Adjust::None);
        assert_eq!(Adjust::from_param("xyz"), Adjust::None);
        assert_eq!(Adjust::Forward.as_str(), "qfq");
    }

    #[test]
    fn test_parse_news() {
        let text = r#"jQuery({"code":0,"result":{"cmsArticleWebOld":[
            {"date":"2024-06-01 10:00:00","title":"贵州茅台(<em>600519</em>)发布公告","content":"<em>茅台</em>　业绩\r\n稳健","mediaName":"证券时报","code":"202406013091"}
        ]}})"#;

        let news = parse_news(text, &highlight_regex().unwrap()).unwrap();
        assert_eq!(news.len(), 1);
        assert_eq!(news[0].title, "贵州茅台600519发布公告");
        assert_eq!(news[0].content, "茅台业绩稳健");
        assert_eq!(news[0].publish_time, "2024-06-01 10:00:00");
        assert_eq!(news[0].url, "http://finance.eastmoney.com/a/202406013091.html");
    }

    #[test]
    fn test_parse_news_without_results() {
        let highlight = highlight_regex().unwrap();
        assert!(parse_news(r#"jQuery({"code":0,"result":{}})"#, &highlight).unwrap().is_empty());
        assert!(parse_news("<html>", &highlight).is_err());
    }

    #[test]
    fn test_number() {
        assert_eq!(number(Some(&json!(12.5))), Some(12.5));
        assert_eq!(number(Some(&json!("3.2"))), Some(3.2));
        assert_eq!(number(Some(&json!("-"))), None);
        assert_eq!(number(None), None);
    }

    #[tokio::test]
    #[ignore] // Requires network access
    async fn test_daily_bars() {
        let client = EastMoneyClient::new(Arc::new(StockConfig::default())).unwrap();
        let start = NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();
        let end = NaiveDate::from_ymd_opt(2024, 1, 31).unwrap();
        let bars = client
            .daily_bars(&ZhCode::parse("600519"), start, end, Adjust::Forward)
            .await
            .unwrap();
        assert!(!bars.is_empty());
    }
}
