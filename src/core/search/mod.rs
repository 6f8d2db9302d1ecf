//! Web search backends with one result shape.

mod searxng;
mod serpapi;
mod tavily;

use std::fmt::Write as _;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use searxng::{SearxngConfig, DEV_PROXY_ENV};
pub use serpapi::SerpApiConfig;
pub use tavily::TavilyConfig;

pub const DEFAULT_MAX_RESULTS: usize = 5;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    pub title: String,
    pub url: String,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
}

#[derive(Error, Debug)]
pub enum SearchError {
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("search API returned status {status}: {body}")]
    Http { status: u16, body: String },

    #[error("failed to parse search results: {0}")]
    Parse(String),

    #[error("search provider not configured: {0}")]
    NotConfigured(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchDepth {
    #[default]
    Basic,
    Advanced,
}

impl SearchDepth {
    pub fn as_str(self) -> &'static str {
        match self {
            SearchDepth::Basic => "basic",
            SearchDepth::Advanced => "advanced",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchLimits {
    pub max_results: usize,
    pub depth: SearchDepth,
}

impl Default for SearchLimits {
    fn default() -> Self {
        Self {
            max_results: DEFAULT_MAX_RESULTS,
            depth: SearchDepth::Basic,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum SearchBackend {
    Tavily(TavilyConfig),
    #[serde(rename = "serpapi")]
    SerpApi(SerpApiConfig),
    Searxng(SearxngConfig),
}

impl SearchBackend {
    pub fn name(&self) -> &'static str {
        match self {
            SearchBackend::Tavily(_) => "tavily",
            SearchBackend::SerpApi(_) => "serpapi",
            SearchBackend::Searxng(_) => "searxng",
        }
    }
}

/// One configured search backend bound to an HTTP client.
#[derive(Debug, Clone)]
pub struct SearchProvider {
    client: reqwest::Client,
    backend: SearchBackend,
}

impl SearchProvider {
    pub fn new(client: reqwest::Client, backend: SearchBackend) -> Self {
        Self { client, backend }
    }

    pub fn name(&self) -> &'static str {
        self.backend.name()
    }

    /// Runs one query. An empty list is a successful outcome.
    pub async fn search(
        &self,
        query: &str,
        limits: &SearchLimits,
    ) -> Result<Vec<SearchResult>, SearchError> {
        let mut results = match &self.backend {
            SearchBackend::Tavily(config) => {
                tavily::search(&self.client, config, query, limits).await?
            }
            SearchBackend::SerpApi(config) => {
                serpapi::search(&self.client, config, query, limits).await?
            }
            SearchBackend::Searxng(config) => {
                let dev_proxy = std::env::var(DEV_PROXY_ENV).ok();
                searxng::search(&self.client, config, dev_proxy.as_deref(), query, limits).await?
            }
        };
        results.truncate(limits.max_results);
        Ok(results)
    }
}

/// Reads a secret from the named environment variable, falling back to the inline value.
pub(crate) fn resolve_secret(
    inline: Option<&str>,
    env_var: Option<&str>,
    label: &str,
) -> Result<String, SearchError> {
    env_var
        .and_then(|name| std::env::var(name).ok())
        .or_else(|| inline.map(str::to_owned))
        .filter(|value| !value.trim().is_empty())
        .ok_or_else(|| SearchError::NotConfigured(format!("{label} API key")))
}

pub(crate) async fn check_status(
    response: reqwest::Response,
) -> Result<reqwest::Response, SearchError> {
    if response.status().is_success() {
        return Ok(response);
    }
    let status = response.status().as_u16();
    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "<no body>".to_string());
    Err(SearchError::Http { status, body })
}

/// Renders results as the instruction block handed to the model.
///
/// Returns an empty string when there is nothing to inject.
pub fn format_context(results: &[SearchResult]) -> String {
    if results.is_empty() {
        return String::new();
    }

    let mut context = String::from(
        "The following web search results may help answer the user's latest message. \
Use them where relevant and cite sources by URL.\n",
    );
    for (index, result) in results.iter().enumerate() {
        let _ = write!(
            context,
            "\n[{}] {}\nURL: {}\n{}\n",
            index + 1,
            result.title,
            result.url,
            result.content.trim()
        );
    }
    context
}
