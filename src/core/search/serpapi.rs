use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::{check_status, resolve_secret, SearchError, SearchLimits, SearchResult};
use crate::utils::url::construct_api_url;

const DEFAULT_BASE_URL: &str = "https://serpapi.com";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SerpApiConfig {
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub api_key_env: Option<String>,
    #[serde(default)]
    pub base_url: Option<String>,
    /// SerpApi engine name; defaults to `google`.
    #[serde(default)]
    pub engine: Option<String>,
}

#[derive(Deserialize)]
struct SerpApiResponse {
    #[serde(default)]
    organic_results: Vec<OrganicResult>,
}

#[derive(Deserialize)]
struct OrganicResult {
    #[serde(default)]
    title: String,
    #[serde(default)]
    link: String,
    #[serde(default)]
    snippet: String,
    #[serde(default)]
    position: Option<u32>,
}

fn rank_score(position: Option<u32>) -> Option<f64> {
    position.filter(|rank| *rank > 0).map(|rank| 1.0 / f64::from(rank))
}

pub(super) async fn search(
    client: &Client,
    config: &SerpApiConfig,
    query: &str,
    limits: &SearchLimits,
) -> Result<Vec<SearchResult>, SearchError> {
    let api_key = resolve_secret(
        config.api_key.as_deref(),
        config.api_key_env.as_deref(),
        "serpapi",
    )?;
    let base_url = config.base_url.as_deref().unwrap_or(DEFAULT_BASE_URL);
    let engine = config.engine.as_deref().unwrap_or("google");
    let num = limits.max_results.to_string();

    let response = client
        .get(construct_api_url(base_url, "search.json"))
        .query(&[
            ("q", query),
            ("api_key", api_key.as_str()),
            ("engine", engine),
            ("num", num.as_str()),
        ])
        .send()
        .await?;
    let body: SerpApiResponse = check_status(response)
        .await?
        .json()
        .await
        .map_err(|err| SearchError::Parse(err.to_string()))?;

    Ok(body
        .organic_results
        .into_iter()
        .map(|r| SearchResult {
            title: r.title,
            url: r.link,
            content: r.snippet,
            score: rank_score(r.position),
        })
        .collect())
}
