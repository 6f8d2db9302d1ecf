use reqwest::{Client, Url};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{check_status, SearchError, SearchLimits, SearchResult};
use crate::utils::url::{construct_api_url, ensure_scheme};

/// Base URL of a local development proxy that forwards to the instance.
pub const DEV_PROXY_ENV: &str = "CHATGATE_SEARXNG_DEV_PROXY";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearxngConfig {
    pub url: String,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    /// Prefix a CORS proxy expects in front of the URL-encoded target.
    #[serde(default)]
    pub cors_proxy: Option<String>,
}

#[derive(Deserialize)]
struct SearxngResponse {
    #[serde(default)]
    results: Vec<SearxngResult>,
}

#[derive(Deserialize)]
struct SearxngResult {
    #[serde(default)]
    title: String,
    #[serde(default)]
    url: String,
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    score: Option<f64>,
}

/// Picks the request URL: an explicit CORS proxy wins, then the development
/// proxy from the environment, then the instance itself.
pub(super) fn search_endpoint(
    config: &SearxngConfig,
    dev_proxy: Option<&str>,
    query: &str,
) -> Result<String, SearchError> {
    let params = [("q", query), ("format", "json"), ("pageno", "1")];
    let instance = ensure_scheme(&config.url);

    if let Some(proxy) = config.cors_proxy.as_deref().filter(|p| !p.trim().is_empty()) {
        let target = Url::parse_with_params(&construct_api_url(&instance, "search"), params)
            .map_err(|err| SearchError::NotConfigured(format!("searxng url: {err}")))?;
        return Ok(format!("{}{}", proxy.trim(), urlencoding::encode(target.as_str())));
    }

    let base = match dev_proxy.filter(|p| !p.trim().is_empty()) {
        Some(proxy) => ensure_scheme(proxy),
        None => instance,
    };
    let url = Url::parse_with_params(&construct_api_url(&base, "search"), params)
        .map_err(|err| SearchError::NotConfigured(format!("searxng url: {err}")))?;
    Ok(url.into())
}

pub(super) async fn search(
    client: &Client,
    config: &SearxngConfig,
    dev_proxy: Option<&str>,
    query: &str,
    limits: &SearchLimits,
) -> Result<Vec<SearchResult>, SearchError> {
    if config.url.trim().is_empty() {
        return Err(SearchError::NotConfigured("searxng url".to_string()));
    }
    let endpoint = search_endpoint(config, dev_proxy, query)?;
    debug!(endpoint = %endpoint, "Querying SearXNG");

    let mut request = client.get(endpoint);
    if let (Some(user), Some(pass)) = (&config.username, &config.password) {
        request = request.basic_auth(user, Some(pass));
    }

    let response = check_status(request.send().await?).await?;
    let body: SearxngResponse = response
        .json()
        .await
        .map_err(|err| SearchError::Parse(err.to_string()))?;

    Ok(body
        .results
        .into_iter()
        .take(limits.max_results)
        .map(|r| SearchResult {
            title: r.title,
            url: r.url,
            content: r.content.unwrap_or_default(),
            score: r.score,
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config(url: &str) -> SearxngConfig {
        SearxngConfig {
            url: url.to_string(),
            ..SearxngConfig::default()
        }
    }

    #[test]
    fn direct_endpoint_adds_scheme_and_query() {
        let url = search_endpoint(&config("search.example.org/"), None, "a b").unwrap();
        assert_eq!(
            url,
            "https://search.example.org/search?q=a+b&format=json&pageno=1"
        );

        let url = search_endpoint(&config("localhost:8888"), None, "x").unwrap();
        assert!(url.starts_with("http://localhost:8888/search?"));
    }

    #[test]
    fn cors_proxy_wraps_the_encoded_target() {
        let mut cfg = config("https://search.example.org");
        cfg.cors_proxy = Some("https://corsproxy.io/?".to_string());

        let url = search_endpoint(&cfg, Some("http://localhost:5173/searxng"), "q").unwrap();
        assert_eq!(
            url,
            "https://corsproxy.io/?https%3A%2F%2Fsearch.example.org%2Fsearch%3Fq%3Dq%26format%3Djson%26pageno%3D1"
        );
    }

    #[test]
    fn dev_proxy_replaces_the_instance_base() {
        let url = search_endpoint(
            &config("https://search.example.org"),
            Some("http://localhost:5173/searxng"),
            "q",
        )
        .unwrap();
        assert_eq!(
            url,
            "http://localhost:5173/searxng/search?q=q&format=json&pageno=1"
        );
    }

    #[tokio::test]
    async fn sends_basic_auth_and_truncates() {
        let server = MockServer::start().await;
        let results: Vec<_> = (1..=7)
            .map(|i| json!({"title": format!("r{i}"), "url": format!("https://e/{i}"), "content": "c"}))
            .collect();
        Mock::given(method("GET"))
            .and(path("/search"))
            .and(query_param("q", "private"))
            .and(query_param("format", "json"))
            // "user:pass" in base64
            .and(header("authorization", "Basic dXNlcjpwYXNz"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"results": results})))
            .expect(1)
            .mount(&server)
            .await;

        let cfg = SearxngConfig {
            url: server.uri(),
            username: Some("user".into()),
            password: Some("pass".into()),
            cors_proxy: None,
        };
        let limits = SearchLimits {
            max_results: 2,
            ..SearchLimits::default()
        };
        let found = search(&Client::new(), &cfg, None, "private", &limits)
            .await
            .unwrap();

        assert_eq!(found.len(), 2);
        assert_eq!(found[1].title, "r2");
    }

    #[tokio::test]
    async fn missing_content_becomes_empty_text() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "results": [{"title": "t", "url": "https://e", "content": null}]
            })))
            .mount(&server)
            .await;

        let found = search(
            &Client::new(),
            &config(&server.uri()),
            None,
            "q",
            &SearchLimits::default(),
        )
        .await
        .unwrap();
        assert_eq!(found[0].content, "");
    }
}
