use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::{check_status, resolve_secret, SearchError, SearchLimits, SearchResult};
use crate::utils::url::construct_api_url;

const DEFAULT_BASE_URL: &str = "https://api.tavily.com";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TavilyConfig {
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub api_key_env: Option<String>,
    #[serde(default)]
    pub base_url: Option<String>,
}

#[derive(Serialize)]
struct TavilyRequest<'a> {
    api_key: &'a str,
    query: &'a str,
    max_results: usize,
    search_depth: &'a str,
}

#[derive(Deserialize)]
struct TavilyResponse {
    #[serde(default)]
    results: Vec<TavilyResult>,
}

#[derive(Deserialize)]
struct TavilyResult {
    #[serde(default)]
    title: String,
    #[serde(default)]
    url: String,
    #[serde(default)]
    content: String,
    #[serde(default)]
    score: Option<f64>,
}

pub(super) async fn search(
    client: &Client,
    config: &TavilyConfig,
    query: &str,
    limits: &SearchLimits,
) -> Result<Vec<SearchResult>, SearchError> {
    let api_key = resolve_secret(
        config.api_key.as_deref(),
        config.api_key_env.as_deref(),
        "tavily",
    )?;
    let base_url = config.base_url.as_deref().unwrap_or(DEFAULT_BASE_URL);

    let response = client
        .post(construct_api_url(base_url, "search"))
        .json(&TavilyRequest {
            api_key: &api_key,
            query,
            max_results: limits.max_results,
            search_depth: limits.depth.as_str(),
        })
        .send()
        .await?;
    let body: TavilyResponse = check_status(response)
        .await?
        .json()
        .await
        .map_err(|err| SearchError::Parse(err.to_string()))?;

    Ok(body
        .results
        .into_iter()
        .map(|r| SearchResult {
            title: r.title,
            url: r.url,
            content: r.content,
            score: r.score,
        })
        .collect())
}
