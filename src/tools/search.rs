//! Search-class tools
//!
//! Both tools query the same provider; the finance variant scopes the query
//! to Yahoo Finance.

use super::{require_str, Tool};
use crate::error::AgentError;
use crate::models::{ParamSpec, ToolSpec};
use crate::Result;
use regex::Regex;
use reqwest::Client;
use serde_json::{Map, Value};
use std::sync::{Arc, OnceLock};
use std::time::Duration;
use tracing::{debug, info};

const DUCKDUCKGO_HTML_URL: &str = "https://html.duckduckgo.com/html/";
const FINANCE_SITE: &str = "site:finance.yahoo.com";
const USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64) ollama-tool-agent/0.1";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchHit {
    pub title: String,
    pub link: String,
    pub snippet: String,
}

/// Trait for a web search backend
#[async_trait::async_trait]
pub trait SearchProvider: Send + Sync {
    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<SearchHit>>;
}

/// DuckDuckGo HTML endpoint (no API key)
pub struct DuckDuckGoSearch {
    client: Client,
    endpoint: String,
}

impl DuckDuckGoSearch {
    pub fn new() -> Result<Self> {
        Self::with_endpoint(DUCKDUCKGO_HTML_URL)
    }

    pub fn with_endpoint(endpoint: &str) -> Result<Self> {
        let client = Client::builder()
            .pool_idle_timeout(Duration::from_secs(60))
            .user_agent(USER_AGENT)
            .build()?;

        Ok(Self {
            client,
            endpoint: endpoint.to_string(),
        })
    }
}

#[async_trait::async_trait]
impl SearchProvider for DuckDuckGoSearch {
    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<SearchHit>> {
        let response = self
            .client
            .post(&self.endpoint)
            .form(&[("q", query)])
            .send()
            .await
            .map_err(|e| AgentError::SearchError(format!("search request failed: {}", e)))?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(AgentError::SearchError(format!(
                "search provider returned {}",
                status
            )));
        }

        let hits = parse_results(&body, max_results);
        debug!(query, hits = hits.len(), "Search completed");
        Ok(hits)
    }
}

struct ResultPatterns {
    link: Regex,
    snippet: Regex,
    tag: Regex,
}

fn patterns() -> &'static ResultPatterns {
    static PATTERNS: OnceLock<ResultPatterns> = OnceLock::new();
    PATTERNS.get_or_init(|| ResultPatterns {
        link: Regex::new(r#"(?s)<a[^>]*class="result__a"[^>]*href="([^"]*)"[^>]*>(.*?)</a>"#)
            .expect("valid result link pattern"),
        snippet: Regex::new(r#"(?s)class="result__snippet"[^>]*>(.*?)</(?:a|div|td)>"#)
            .expect("valid result snippet pattern"),
        tag: Regex::new(r"<[^>]+>").expect("valid tag pattern"),
    })
}

/// Extract result entries from the HTML results page.
pub fn parse_results(html: &str, max_results: usize) -> Vec<SearchHit> {
    let p = patterns();
    let snippets: Vec<String> = p
        .snippet
        .captures_iter(html)
        .map(|c| clean_text(&c[1]))
        .collect();

    p.link
        .captures_iter(html)
        .enumerate()
        .take(max_results)
        .map(|(i, c)| SearchHit {
            title: clean_text(&c[2]),
            link: resolve_link(&decode_entities(&c[1])),
            snippet: snippets.get(i).cloned().unwrap_or_default(),
        })
        .collect()
}

fn clean_text(fragment: &str) -> String {
    let stripped = patterns().tag.replace_all(fragment, "");
    decode_entities(stripped.trim())
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

fn decode_entities(text: &str) -> String {
    text.replace("&quot;", "\"")
        .replace("&#x27;", "'")
        .replace("&#39;", "'")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&nbsp;", " ")
        .replace("&amp;", "&")
}

/// Result links are wrapped in a redirect (`//duckduckgo.com/l/?uddg=<url>`).
fn resolve_link(href: &str) -> String {
    if let Some(start) = href.find("uddg=") {
        let encoded = &href[start + 5..];
        let encoded = encoded.split('&').next().unwrap_or(encoded);
        return urlencoding::decode(encoded)
            .map(|url| url.into_owned())
            .unwrap_or_else(|_| encoded.to_string());
    }
    if let Some(rest) = href.strip_prefix("//") {
        return format!("https://{}", rest);
    }
    href.to_string()
}

/// Render hits the way the tool output is fed back to the model.
pub fn format_hits(hits: &[SearchHit]) -> String {
    if hits.is_empty() {
        return "No results found.".to_string();
    }
    hits.iter()
        .map(|h| format!("snippet: {}, title: {}, link: {}", h.snippet, h.title, h.link))
        .collect::<Vec<_>>()
        .join(", ")
}

/// `search_web` / `search_yf`
pub struct SearchTool {
    provider: Arc<dyn SearchProvider>,
    spec: ToolSpec,
    site: Option<&'static str>,
    max_results: usize,
}

impl SearchTool {
    pub fn web(provider: Arc<dyn SearchProvider>, max_results: usize) -> Self {
        Self {
            provider,
            spec: ToolSpec {
                name: "search_web",
                description: "Search the web (news) for current information.",
                parameters: vec![ParamSpec {
                    name: "query",
                    description: "topic or query to search the web for",
                }],
            },
            site: None,
            max_results,
        }
    }

    pub fn finance(provider: Arc<dyn SearchProvider>, max_results: usize) -> Self {
        Self {
            provider,
            spec: ToolSpec {
                name: "search_yf",
                description: "Search financial news (Yahoo Finance only).",
                parameters: vec![ParamSpec {
                    name: "query",
                    description: "financial topic to search for",
                }],
            },
            site: Some(FINANCE_SITE),
            max_results,
        }
    }

    fn scoped_query(&self, query: &str) -> String {
        match self.site {
            Some(site) => format!("{} {}", site, query),
            None => query.to_string(),
        }
    }
}

#[async_trait::async_trait]
impl Tool for SearchTool {
    fn spec(&self) -> ToolSpec {
        self.spec.clone()
    }

    async fn execute(&self, args: &Map<String, Value>) -> Result<String> {
        let query = self.scoped_query(require_str(args, "query")?);
        info!(tool_name = %self.spec.name, query = %query, "Searching");

        let hits = self.provider.search(&query, self.max_results).await?;
        Ok(format_hits(&hits))
    }
}
