//! Company news with relevance ranking

use agent_core::Result as AgentResult;
use agent_tools::Tool;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Local};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::sync::Arc;
use tracing::{info, warn};

use crate::api::{FinnhubClient, YahooFinanceClient};
use crate::config::StockConfig;
use crate::error::{Result, StockError};
use crate::tools::{parse_params, respond};

const FINANCE_KEYWORDS: [&str; 7] = [
    "EARNINGS",
    "REVENUE",
    "PROFIT",
    "STOCK",
    "SHARES",
    "QUARTERLY",
    "ANNUAL",
];

/// Days of company news requested from Finnhub
const FINNHUB_LOOKBACK_DAYS: i64 = 7;

/// News about a US ticker: Yahoo Finance first, Finnhub when configured
pub struct NewsTool {
    yahoo: Arc<YahooFinanceClient>,
    finnhub: Option<FinnhubClient>,
    default_limit: usize,
}

#[derive(Debug, Deserialize)]
struct NewsParams {
    ticker: String,
    #[serde(default)]
    limit: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
struct Article {
    title: String,
    description: String,
    publisher: String,
    link: String,
    published_time: String,
    relevance_score: u32,
}

/// Articles from one source
struct NewsBatch {
    source: &'static str,
    articles: Vec<Article>,
}

impl NewsTool {
    /// Create the tool; Finnhub is used only when its key is configured
    pub fn new(yahoo: Arc<YahooFinanceClient>, config: Arc<StockConfig>) -> Result<Self> {
        let finnhub = match &config.finnhub_api_key {
            Some(key) => Some(FinnhubClient::new(key.clone(), config.clone())?),
            None => None,
        };
        Ok(Self {
            yahoo,
            finnhub,
            default_limit: config.default_news_limit,
        })
    }

    async fn from_yahoo(&self, ticker: &str, limit: usize) -> Result<NewsBatch> {
        let items = self.yahoo.news(ticker, limit).await?;
        let articles = items
            .into_iter()
            .take(limit)
            .map(|item| Article {
                title: item.title,
                description: String::new(),
                publisher: item.publisher,
                link: item.link,
                published_time: format_timestamp(item.provider_publish_time),
                relevance_score: 0,
            })
            .collect();
        Ok(NewsBatch {
            source: "Yahoo Finance",
            articles,
        })
    }

    async fn from_finnhub(&self, finnhub: &FinnhubClient, ticker: &str, limit: usize) -> Result<NewsBatch> {
        let today = Local::now().date_naive();
        let from = (today - Duration::days(FINNHUB_LOOKBACK_DAYS)).format("%Y-%m-%d").to_string();
        let to = today.format("%Y-%m-%d").to_string();

        let items = finnhub.company_news(ticker, &from, &to).await?;
        let articles = items
            .into_iter()
            .take(limit)
            .map(|item| Article {
                title: item.headline,
                description: item.summary,
                publisher: item.source,
                link: item.url,
                published_time: format_timestamp(item.datetime),
                relevance_score: 0,
            })
            .collect();
        Ok(NewsBatch {
            source: "Finnhub",
            articles,
        })
    }

    async fn fetch(&self, params: Value) -> Result<Value> {
        let params: NewsParams = parse_params(params)?;
        let limit = params.limit.unwrap_or(self.default_limit);
        let ticker = params.ticker;
        info!(%ticker, limit, "fetching news");

        let mut batch = match self.from_yahoo(&ticker, limit).await {
            Ok(batch) => Some(batch),
            Err(e) => {
                warn!(%ticker, error = %e, "Yahoo news failed");
                None
            }
        };

        if batch.as_ref().is_none_or(|b| b.articles.iter().all(|a| a.title.trim().is_empty())) {
            if let Some(finnhub) = &self.finnhub {
                info!(%ticker, "falling back to Finnhub news");
                batch = match self.from_finnhub(finnhub, &ticker, limit).await {
                    Ok(batch) => Some(batch),
                    Err(e) => {
                        warn!(%ticker, error = %e, "Finnhub news failed");
                        None
                    }
                };
            }
        }

        let batch = batch.ok_or_else(|| StockError::NoData("无法从任何新闻源获取数据".to_string()))?;
        rank(&ticker, limit, batch)
    }
}

fn format_timestamp(seconds: i64) -> String {
    DateTime::from_timestamp(seconds, 0)
        .map(|t| t.to_rfc3339())
        .unwrap_or_default()
}

/// Score each article and sort by descending relevance.
///
/// +3 when the ticker is in the title, +2 when in the description and +1
/// when either mentions a finance keyword.
fn relevance(ticker: &str, article: &Article) -> u32 {
    let ticker = ticker.to_uppercase();
    let title = article.title.to_uppercase();
    let description = article.description.to_uppercase();

    let mut score = 0;
    if title.contains(&ticker) {
        score += 3;
    }
    if description.contains(&ticker) {
        score += 2;
    }
    if FINANCE_KEYWORDS
        .iter()
        .any(|k| title.contains(k) || description.contains(k))
    {
        score += 1;
    }
    score
}

fn rank(ticker: &str, limit: usize, batch: NewsBatch) -> Result<Value> {
    let mut articles: Vec<Article> = batch
        .articles
        .into_iter()
        .filter(|a| !a.title.trim().is_empty())
        .map(|mut a| {
            a.relevance_score = relevance(ticker, &a);
            a
        })
        .collect();

    if articles.is_empty() {
        return Err(StockError::NoData(format!("未找到关于 {ticker} 的相关新闻")));
    }
    articles.sort_by_key(|a| std::cmp::Reverse(a.relevance_score));

    Ok(json!({
        "ticker": ticker,
        "source": batch.source,
        "total_count": articles.len(),
        "news": articles,
        "metadata": {
            "query_ticker": ticker,
            "requested_limit": limit,
            "actual_count": articles.len(),
            "data_source": batch.source,
            "note": "新闻数据实时性取决于数据源，建议结合多个来源进行分析",
        },
    }))
}

#[async_trait]
impl Tool for NewsTool {
    async fn execute(&self, params: Value) -> AgentResult<Value> {
        Ok(respond(self.name(), self.fetch(params).await))
    }

    fn name(&self) -> &'static str {
        "get_news"
    }

    fn description(&self) -> &'static str {
        "获取股票相关新闻"
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "ticker": {"type": "string", "description": "股票代码，如AAPL"},
                "limit": {"type": "integer", "description": "新闻数量限制，默认10条"}
            },
            "required": ["ticker"]
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn article(title: &str, description: &str) -> Article {
        Article {
            title: title.to_string(),
            description: description.to_string(),
            publisher: "Reuters".to_string(),
            link: "https://example.com".to_string(),
            published_time: String::new(),
            relevance_score: 0,
        }
    }

    #[test]
    fn test_relevance_scores() {
        assert_eq!(relevance("aapl", &article("AAPL hits record", "")), 3);
        assert_eq!(relevance("AAPL", &article("AAPL earnings beat", "AAPL up")), 6);
        assert_eq!(relevance("AAPL", &article("Tech rally", "stock market")), 1);
        assert_eq!(relevance("AAPL", &article("Weather report", "")), 0);
    }

    #[test]
    fn test_rank_sorts_and_filters() {
        let batch = NewsBatch {
            source: "Yahoo Finance",
            articles: vec![
                article("Weather report", ""),
                article("  ", ""),
                article("AAPL quarterly revenue", ""),
                article("Shares slide", ""),
            ],
        };
        let result = rank("AAPL", 10, batch).unwrap();

        let titles: Vec<&str> = result["news"]
            .as_array()
            .unwrap()
            .iter()
            .map(|n| n["title"].as_str().unwrap())
            .collect();
        assert_eq!(titles, ["AAPL quarterly revenue", "Shares slide", "Weather report"]);
        assert_eq!(result["news"][0]["relevance_score"], 4);
        assert_eq!(result["metadata"]["actual_count"], 3);
        assert_eq!(result["metadata"]["data_source"], "Yahoo Finance");
    }

    #[test]
    fn test_rank_empty() {
        let batch = NewsBatch {
            source: "Yahoo Finance",
            articles: vec![],
        };
        let err = rank("AAPL", 10, batch).unwrap_err();
        assert_eq!(err.to_string(), "未找到关于 AAPL 的相关新闻");
    }

    #[test]
    fn test_format_timestamp() {
        assert_eq!(format_timestamp(0), "1970-01-01T00:00:00+00:00");
    }

    #[tokio::test]
    #[ignore] // Requires network access
    async fn test_fetch_news() {
        let config = Arc::new(StockConfig::default());
        let yahoo = Arc::new(YahooFinanceClient::new(config.clone()).unwrap());
        let tool = NewsTool::new(yahoo, config).unwrap();

        let result = tool.execute(json!({"ticker": "AAPL", "limit": 5})).await.unwrap();
        assert!(result["news"].is_array() || result["error"].is_string());
    }
}
