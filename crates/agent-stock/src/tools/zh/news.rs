//! A-share company news from East Money

use agent_core::Result as AgentResult;
use agent_tools::Tool;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Value, json};
use std::sync::Arc;
use tracing::{info, warn};

use super::{DATA_SOURCE, code_property};
use crate::api::{EastMoneyClient, EastMoneyNewsItem};
use crate::error::Result;
use crate::symbol::ZhCode;
use crate::tools::{parse_params, query_time, respond_prefixed};

const DEFAULT_LIMIT: usize = 10;

/// Latest news about one A-share
pub struct ZhNewsTool {
    eastmoney: Arc<EastMoneyClient>,
}

#[derive(Debug, Deserialize)]
struct NewsParams {
    code: String,
    #[serde(default = "default_limit")]
    limit: usize,
}

fn default_limit() -> usize {
    DEFAULT_LIMIT
}

impl ZhNewsTool {
    /// Create the tool over a shared East Money client
    pub fn new(eastmoney: Arc<EastMoneyClient>) -> Self {
        Self { eastmoney }
    }

    async fn fetch(&self, params: Value) -> Result<Value> {
        let params: NewsParams = parse_params(params)?;
        let code = ZhCode::parse(&params.code);
        info!(code = %code.normalized(), limit = params.limit, "fetching A-share news");

        let items = self.eastmoney.news(&code.code, params.limit).await?;
        if items.is_empty() {
            warn!(code = %code.normalized(), "no news found");
        }
        Ok(news_response(&params.code, params.limit, items))
    }
}

fn news_response(code: &str, limit: usize, items: Vec<EastMoneyNewsItem>) -> Value {
    let news: Vec<Value> = items
        .into_iter()
        .take(limit)
        .map(|item| {
            json!({
                "title": item.title,
                "content": item.content,
                "publish_time": item.publish_time,
                "source": DATA_SOURCE,
                "url": item.url,
            })
        })
        .collect();

    json!({
        "symbol": code,
        "limit": limit,
        "query_time": query_time(),
        "news_count": news.len(),
        "news": news,
    })
}

#[async_trait]
impl Tool for ZhNewsTool {
    async fn execute(&self, params: Value) -> AgentResult<Value> {
        Ok(respond_prefixed(self.name(), "获取个股新闻失败", self.fetch(params).await))
    }

    fn name(&self) -> &'static str {
        "get_zh_news"
    }

    fn description(&self) -> &'static str {
        "获取个股新闻信息，使用东方财富数据源"
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "code": code_property(),
                "limit": {"type": "integer", "description": "新闻数量限制，默认10条", "default": 10}
            },
            "required": ["code"]
        })
    }
}
