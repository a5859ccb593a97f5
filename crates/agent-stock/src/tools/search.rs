//! Web search with finance-aware ranking

use agent_core::Result as AgentResult;
use agent_tools::Tool;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Value, json};
use std::sync::Arc;
use tracing::{info, warn};

use crate::api::{DuckDuckGoClient, SearchOutcome, SearchProvider, SerpApiClient};
use crate::config::StockConfig;
use crate::error::{Result, StockError};
use crate::tools::{parse_params, respond};

const SEARCH_FAILED: &str =
    "搜索失败：无法连接到搜索引擎API或网络服务不可用。请检查网络连接或配置有效的搜索API密钥。";

const FINANCE_KEYWORDS: [&str; 16] = [
    "stock",
    "stocks",
    "share",
    "shares",
    "ticker",
    "earnings",
    "revenue",
    "profit",
    "financial",
    "investment",
    "market",
    "trading",
    "portfolio",
    "dividend",
    "pe ratio",
    "market cap",
];

const FINANCE_DOMAINS: [&str; 8] = [
    "bloomberg.com",
    "reuters.com",
    "cnbc.com",
    "marketwatch.com",
    "yahoo.com/finance",
    "wsj.com",
    "ft.com",
    "sec.gov",
];

/// Searches the web through the first provider that answers
pub struct WebSearchTool {
    providers: Vec<Arc<dyn SearchProvider>>,
    default_results: usize,
}

#[derive(Debug, Deserialize)]
struct SearchParams {
    query: String,
    #[serde(default)]
    max_results: Option<usize>,
}

impl WebSearchTool {
    /// Providers are tried in order
    pub fn new(providers: Vec<Arc<dyn SearchProvider>>, default_results: usize) -> Self {
        Self {
            providers,
            default_results,
        }
    }

    /// SerpAPI when a key is configured, then DuckDuckGo
    pub fn from_config(config: Arc<StockConfig>) -> Result<Self> {
        let mut providers: Vec<Arc<dyn SearchProvider>> = Vec::new();
        if let Some(key) = &config.serpapi_api_key {
            providers.push(Arc::new(SerpApiClient::new(key.clone(), config.clone())?));
        }
        providers.push(Arc::new(DuckDuckGoClient::new(config.clone())?));
        Ok(Self::new(providers, config.default_search_results))
    }

    async fn fetch(&self, params: Value) -> Result<Value> {
        let params: SearchParams = parse_params(params)?;
        let max_results = params.max_results.unwrap_or(self.default_results);
        info!(query = %params.query, max_results, "searching the web");

        let mut outcome = None;
        for provider in &self.providers {
            match provider.search(&params.query, max_results).await {
                Ok(found) => {
                    outcome = Some(found);
                    break;
                }
                Err(e) => warn!(provider = provider.name(), error = %e, "search provider failed"),
            }
        }
        let outcome = outcome.ok_or_else(|| StockError::NoData(SEARCH_FAILED.to_string()))?;

        let engine = outcome.search_engine.clone();
        let mut result = enhance_for_finance(&params.query, outcome)?;
        let actual = result["results"].as_array().map_or(0, Vec::len);
        result["metadata"] = json!({
            "query": params.query,
            "requested_results": max_results,
            "actual_results": actual,
            "search_timestamp": "实时搜索",
            "api_used": engine,
            "note": "搜索结果实时性和准确性取决于搜索引擎和API可用性",
        });

        info!(query = %params.query, results = actual, "search finished");
        Ok(result)
    }
}

/// Re-rank results of finance queries by keyword and source authority
fn enhance_for_finance(query: &str, outcome: SearchOutcome) -> Result<Value> {
    let mut result = serde_json::to_value(outcome)?;
    let query = query.to_lowercase();
    if !FINANCE_KEYWORDS.iter().any(|k| query.contains(k)) {
        return Ok(result);
    }

    if let Some(hits) = result["results"].as_array_mut() {
        for hit in hits.iter_mut() {
            let title = hit["title"].as_str().unwrap_or_default().to_lowercase();
            let snippet = hit["snippet"].as_str().unwrap_or_default().to_lowercase();
            let link = hit["link"].as_str().unwrap_or_default().to_lowercase();

            let mut score: u32 = 0;
            for keyword in FINANCE_KEYWORDS {
                if title.contains(keyword) {
                    score += 2;
                }
                if snippet.contains(keyword) {
                    score += 1;
                }
            }
            let financial_source = FINANCE_DOMAINS.iter().any(|d| link.contains(d));
            if financial_source {
                score += 3;
            }

            hit["relevance_score"] = json!(score);
            hit["is_financial_source"] = json!(financial_source);
        }
        hits.sort_by_key(|hit| std::cmp::Reverse(hit["relevance_score"].as_u64().unwrap_or(0)));
    }
    result["enhanced_for_finance"] = json!(true);
    Ok(result)
}

#[async_trait]
impl Tool for WebSearchTool {
    async fn execute(&self, params: Value) -> AgentResult<Value> {
        Ok(respond(self.name(), self.fetch(params).await))
    }

    fn name(&self) -> &'static str {
        "search_web_info"
    }

    fn description(&self) -> &'static str {
        "搜索网络信息"
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "query": {"type": "string", "description": "搜索查询"},
                "max_results": {"type": "integer", "description": "最大结果数，默认5"}
            },
            "required": ["query"]
        })
    }
}
