//! Web search providers
//!
//! SerpAPI (Google results, needs a key) and the DuckDuckGo HTML endpoint
//! (keyless). The web search tool tries them in that order.

use async_trait::async_trait;
use regex::Regex;
use reqwest::Url;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;

use super::http::HttpClient;
use crate::config::StockConfig;
use crate::error::{Result, StockError};

const SERPAPI_URL: &str = "https://serpapi.com/search";
const DUCKDUCKGO_URL: &str = "https://html.duckduckgo.com/html/";

/// One organic search result
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchHit {
    pub title: String,
    pub link: String,
    pub snippet: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub displayed_link: Option<String>,
    pub position: usize,
}

/// Results of one search
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchOutcome {
    pub query: String,
    pub search_engine: String,
    pub total_results: usize,
    pub results: Vec<SearchHit>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub knowledge_graph: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub answer_box: Option<Value>,
}

/// A search backend
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SearchProvider: Send + Sync {
    /// Engine name reported in results
    fn name(&self) -> &str;

    /// Search for `query`, returning at most `max_results` hits
    async fn search(&self, query: &str, max_results: usize) -> Result<SearchOutcome>;
}

/// Google results through SerpAPI
pub struct SerpApiClient {
    http: HttpClient,
    api_key: String,
}

impl SerpApiClient {
    /// Create a new SerpAPI client
    pub fn new(api_key: impl Into<String>, config: Arc<StockConfig>) -> Result<Self> {
        Ok(Self {
            http: HttpClient::new("serpapi", config)?,
            api_key: api_key.into(),
        })
    }
}

#[async_trait]
impl SearchProvider for SerpApiClient {
    fn name(&self) -> &str {
        "Google (via SerpAPI)"
    }

    async fn search(&self, query: &str, max_results: usize) -> Result<SearchOutcome> {
        let num = max_results.min(10).to_string();
        let body: Value = self
            .http
            .json(|c| {
                c.get(SERPAPI_URL).query(&[
                    ("q", query),
                    ("api_key", self.api_key.as_str()),
                    ("engine", "google"),
                    ("num", num.as_str()),
                    ("gl", "us"),
                    ("hl", "en"),
                ])
            })
            .await?;

        parse_serpapi(query, self.name(), &body, max_results)
    }
}

fn parse_serpapi(
    query: &str,
    engine: &str,
    body: &Value,
    max_results: usize,
) -> Result<SearchOutcome> {
    if let Some(error) = body.get("error") {
        return Err(StockError::ApiError(format!("SerpAPI: {error}")));
    }

    let text = |v: &Value, key: &str| v[key].as_str().unwrap_or_default().to_string();
    let organic = body["organic_results"].as_array().cloned().unwrap_or_default();

    let results = organic
        .iter()
        .take(max_results)
        .map(|r| SearchHit {
            title: text(r, "title"),
            link: text(r, "link"),
            snippet: text(r, "snippet"),
            displayed_link: r["displayed_link"].as_str().map(str::to_string),
            position: r["position"].as_u64().unwrap_or(0) as usize,
        })
        .filter(|hit| !hit.title.is_empty() && !hit.link.is_empty())
        .collect();

    let knowledge_graph = body.get("knowledge_graph").map(|kg| {
        serde_json::json!({
            "title": text(kg, "title"),
            "type": text(kg, "type"),
            "description": text(kg, "description"),
            "source": kg["source"]["name"].as_str().unwrap_or_default(),
        })
    });
    let answer_box = body.get("answer_box").map(|ab| {
        serde_json::json!({
            "answer": text(ab, "answer"),
            "title": text(ab, "title"),
            "source": text(ab, "source"),
        })
    });

    Ok(SearchOutcome {
        query: query.to_string(),
        search_engine: engine.to_string(),
        total_results: organic.len(),
        results,
        knowledge_graph,
        answer_box,
    })
}

/// Keyless search through the DuckDuckGo HTML endpoint
pub struct DuckDuckGoClient {
    http: HttpClient,
    parser: DuckDuckGoParser,
}

impl DuckDuckGoClient {
    /// Create a new DuckDuckGo client
    pub fn new(config: Arc<StockConfig>) -> Result<Self> {
        Ok(Self {
            http: HttpClient::new("duckduckgo", config)?,
            parser: DuckDuckGoParser::new()?,
        })
    }
}

#[async_trait]
impl SearchProvider for DuckDuckGoClient {
    fn name(&self) -> &str {
        "DuckDuckGo"
    }

    async fn search(&self, query: &str, max_results: usize) -> Result<SearchOutcome> {
        let html = self
            .http
            .text(|c| c.post(DUCKDUCKGO_URL).form(&[("q", query)]))
            .await?;

        let results: Vec<SearchHit> = self.parser.parse(&html).into_iter().take(max_results).collect();
        Ok(SearchOutcome {
            query: query.to_string(),
            search_engine: self.name().to_string(),
            total_results: results.len(),
            results,
            knowledge_graph: None,
            answer_box: None,
        })
    }
}

struct DuckDuckGoParser {
    anchor: Regex,
    snippet: Regex,
    tag: Regex,
}

impl DuckDuckGoParser {
    fn new() -> Result<Self> {
        let compile = |pattern: &str| Regex::new(pattern).map_err(|e| StockError::Other(e.to_string()));
        Ok(Self {
            anchor: compile(r#"(?s)<a[^>]*class="result__a"[^>]*href="([^"]+)"[^>]*>(.*?)</a>"#)?,
            snippet: compile(r#"(?s)<a[^>]*class="result__snippet"[^>]*>(.*?)</a>"#)?,
            tag: compile(r"<[^>]+>")?,
        })
    }

    fn text(&self, html: &str) -> String {
        decode_entities(&self.tag.replace_all(html, "")).trim().to_string()
    }

    fn parse(&self, html: &str) -> Vec<SearchHit> {
        let snippets: Vec<String> = self
            .snippet
            .captures_iter(html)
            .map(|c| self.text(&c[1]))
            .collect();

        self.anchor
            .captures_iter(html)
            .enumerate()
            .filter_map(|(i, c)| {
                let title = self.text(&c[2]);
                let link = resolve_redirect(&decode_entities(&c[1]))?;
                (!title.is_empty()).then(|| SearchHit {
                    title,
                    link,
                    snippet: snippets.get(i).cloned().unwrap_or_default(),
                    displayed_link: None,
                    position: i + 1,
                })
            })
            .collect()
    }
}

/// Target of a `//duckduckgo.com/l/?uddg=...` redirect, or the link itself
fn resolve_redirect(href: &str) -> Option<String> {
    let absolute = if href.starts_with("//") {
        format!("https:{href}")
    } else {
        href.to_string()
    };
    let url = Url::parse(&absolute).ok()?;
    let target = url
        .query_pairs()
        .find(|(key, _)| key == "uddg")
        .map(|(_, value)| value.into_owned());
    Some(target.unwrap_or(absolute))
}

fn decode_entities(text: &str) -> String {
    text.replace("&amp;", "&")
        .replace("&quot;", "\"")
        .replace("&#x27;", "'")
        .replace("&#39;", "'")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&nbsp;", " ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_serpapi() {
        let body = json!({
            "organic_results": [
                {"title": "Apple Stock", "link": "https://finance.yahoo.com/quote/AAPL", "snippet": "AAPL stock price", "position": 1},
                {"title": "", "link": "https://empty.example", "position": 2},
                {"title": "Apple Newsroom", "link": "https://www.apple.com/newsroom", "snippet": "news", "position": 3}
            ],
            "knowledge_graph": {"title": "Apple Inc.", "type": "Company", "source": {"name": "Wikipedia"}},
            "answer_box": {"answer": "$180"}
        });

        let outcome = parse_serpapi("AAPL stock", "Google (via SerpAPI)", &body, 5).unwrap();
        assert_eq!(outcome.total_results, 3);
        assert_eq!(outcome.results.len(), 2);
        assert_eq!(outcome.results[0].position, 1);
        assert_eq!(outcome.knowledge_graph.unwrap()["source"], "Wikipedia");
        assert_eq!(outcome.answer_box.unwrap()["answer"], "$180");
    }

    #[test]
    fn test_parse_serpapi_error() {
        let body = json!({"error": "Invalid API key."});
        assert!(parse_serpapi("q", "serp", &body, 5).is_err());
    }

    #[test]
    fn test_parse_duckduckgo_html() {
        let html = r#"
            <div class="result">
              <a rel="nofollow" class="result__a" href="//duckduckgo.com/l/?uddg=https%3A%2F%2Fwww.reuters.com%2Fmarkets%2F&amp;rut=abc">Reuters <b>Markets</b></a>
              <a class="result__snippet" href="x">Stock &amp; bond <b>markets</b> news</a>
            </div>
            <div class="result">
              <a rel="nofollow" class="result__a" href="https://example.com/direct">Direct</a>
              <a class="result__snippet" href="y">Second</a>
            </div>"#;

        let parser = DuckDuckGoParser::new().unwrap();
        let hits = parser.parse(html);
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].title, "Reuters Markets");
        assert_eq!(hits[0].link, "https://www.reuters.com/markets/");
        assert_eq!(hits[0].snippet, "Stock & bond markets news");
        assert_eq!(hits[1].link, "https://example.com/direct");
        assert_eq!(hits[1].position, 2);
    }
}
