//! Model-negotiated web search.
//!
//! Before the streaming call, the model is asked (without streaming) whether it
//! wants to run `web_search`. Whatever it asks for is searched and folded into a
//! context block; if the negotiation itself fails, the raw user text is searched
//! instead so a broken negotiation never blocks the answer.

use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::core::chat_stream::send_request;
use crate::core::error::GatewayError;
use crate::core::message::Message;
use crate::core::protocol::{BackendConfig, ToolInvocation, ToolResult};
use crate::core::search::{format_context, SearchLimits, SearchProvider, SearchResult};

/// A capability offered to the model during negotiation.
#[derive(Debug, Clone, Copy)]
pub struct ToolCatalogEntry {
    pub name: &'static str,
    pub description: &'static str,
    schema: fn() -> Value,
}

impl ToolCatalogEntry {
    pub fn parameter_schema(&self) -> Value {
        (self.schema)()
    }
}

pub const WEB_SEARCH_TOOL_NAME: &str = "web_search";

pub const WEB_SEARCH_TOOL: ToolCatalogEntry = ToolCatalogEntry {
    name: WEB_SEARCH_TOOL_NAME,
    description: "Search the web for current or factual information that is not in the \
conversation. Use it for recent events, live data, or facts you are unsure about.",
    schema: web_search_schema,
};

pub const TOOL_CATALOG: &[ToolCatalogEntry] = &[WEB_SEARCH_TOOL];

fn web_search_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "query": {
                "type": "string",
                "description": "The search query"
            }
        },
        "required": ["query"]
    })
}

#[derive(Deserialize)]
struct WebSearchArguments {
    query: String,
}

/// What the negotiation decided to search for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchPlan {
    /// The model answered without asking for a tool.
    Declined,
    /// One query per `web_search` invocation, in order.
    Queries(Vec<String>),
    /// Negotiation failed or is unsupported; search the user text verbatim.
    Fallback(String),
}

impl SearchPlan {
    pub fn queries(&self) -> Vec<&str> {
        match self {
            SearchPlan::Declined => Vec::new(),
            SearchPlan::Queries(queries) => queries.iter().map(String::as_str).collect(),
            SearchPlan::Fallback(text) => vec![text.as_str()],
        }
    }
}

/// Reads the search queries out of a completed negotiation.
///
/// Invocations of other tools are ignored. If the model asked for `web_search`
/// but none of its argument payloads is usable, the plan falls back to the
/// user text.
pub fn plan_from_tool_result(result: &ToolResult, user_text: &str) -> SearchPlan {
    let invocations: Vec<&ToolInvocation> = result
        .tool_calls
        .iter()
        .filter(|call| call.tool_name == WEB_SEARCH_TOOL_NAME)
        .collect();
    if invocations.is_empty() {
        return SearchPlan::Declined;
    }

    let queries: Vec<String> = invocations
        .iter()
        .filter_map(
            |call| match serde_json::from_str::<WebSearchArguments>(&call.arguments_json) {
                Ok(args) if !args.query.trim().is_empty() => Some(args.query),
                Ok(_) => None,
                Err(err) => {
                    debug!(call_id = %call.id, error = %err, "Unusable web_search arguments");
                    None
                }
            },
        )
        .collect();

    if queries.is_empty() {
        SearchPlan::Fallback(user_text.to_string())
    } else {
        SearchPlan::Queries(queries)
    }
}

pub struct ToolOrchestrator<'a> {
    client: &'a reqwest::Client,
    search: &'a SearchProvider,
    limits: SearchLimits,
}

impl<'a> ToolOrchestrator<'a> {
    pub fn new(
        client: &'a reqwest::Client,
        search: &'a SearchProvider,
        limits: SearchLimits,
    ) -> Self {
        Self {
            client,
            search,
            limits,
        }
    }

    /// Runs the non-streaming tool round-trip.
    ///
    /// `Ok(None)` means the protocol cannot negotiate.
    pub async fn negotiate(
        &self,
        backend: &BackendConfig,
        history: &[Message],
    ) -> Result<Option<ToolResult>, GatewayError> {
        let Some(request) =
            backend
                .protocol
                .build_negotiation_request(backend, history, TOOL_CATALOG)?
        else {
            return Ok(None);
        };

        debug!(protocol = %backend.protocol, model = %backend.model, "Negotiating tool use");
        let response = send_request(self.client, request).await?;
        let body = response.text().await?;
        backend.protocol.extract_tool_result(&body).map(Some)
    }

    /// `history` must already end with the user's new message.
    pub async fn plan(
        &self,
        backend: &BackendConfig,
        history: &[Message],
        user_text: &str,
    ) -> SearchPlan {
        match self.negotiate(backend, history).await {
            Ok(Some(result)) => {
                let plan = plan_from_tool_result(&result, user_text);
                debug!(plan = ?plan, "Tool negotiation finished");
                plan
            }
            Ok(None) => {
                debug!(
                    protocol = %backend.protocol,
                    "Protocol has no tool negotiation; searching directly"
                );
                SearchPlan::Fallback(user_text.to_string())
            }
            Err(err) => {
                warn!(error = %err, "Tool negotiation failed; falling back to a direct search");
                SearchPlan::Fallback(user_text.to_string())
            }
        }
    }

    /// Runs every planned query; a failing query contributes no results.
    pub async fn execute(&self, plan: &SearchPlan) -> Vec<SearchResult> {
        let mut results = Vec::new();
        for query in plan.queries() {
            match self.search.search(query, &self.limits).await {
                Ok(found) => {
                    debug!(
                        provider = self.search.name(),
                        query,
                        count = found.len(),
                        "Search finished"
                    );
                    results.extend(found);
                }
                Err(err) => {
                    warn!(provider = self.search.name(), query, error = %err, "Search failed");
                }
            }
        }
        results
    }

    /// Negotiates, searches, and formats. Empty when nothing should be injected.
    pub async fn search_context(
        &self,
        backend: &BackendConfig,
        history: &[Message],
        user_text: &str,
    ) -> String {
        let plan = self.plan(backend, history, user_text).await;
        let results = self.execute(&plan).await;
        format_context(&results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::protocol::ProtocolKind;
    use crate::core::search::{SearchBackend, TavilyConfig};
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn invocation(name: &str, args: &str) -> ToolInvocation {
        ToolInvocation {
            id: "call".into(),
            tool_name: name.into(),
            arguments_json: args.into(),
        }
    }

    fn backend(server: &MockServer, protocol: ProtocolKind) -> BackendConfig {
        BackendConfig {
            base_url: server.uri(),
            api_key: "key".into(),
            model: "model".into(),
            protocol,
        }
    }

    fn tavily(server: &MockServer) -> SearchProvider {
        SearchProvider::new(
            reqwest::Client::new(),
            SearchBackend::Tavily(TavilyConfig {
                api_key: Some("tvly".into()),
                api_key_env: None,
                base_url: Some(format!("{}/tavily", server.uri())),
            }),
        )
    }

    #[test]
    fn catalog_has_exactly_web_search() {
        assert_eq!(TOOL_CATALOG.len(), 1);
        assert_eq!(TOOL_CATALOG[0].name, "web_search");
        let schema = TOOL_CATALOG[0].parameter_schema();
        assert_eq!(schema["required"], json!(["query"]));
        assert_eq!(schema["properties"]["query"]["type"], json!("string"));
    }

    #[test]
    fn plan_reads_queries_from_web_search_calls() {
        let result = ToolResult {
            content: String::new(),
            tool_calls: vec![
                invocation("web_search", r#"{"query":"first"}"#),
                invocation("calculator", r#"{"expr":"1+1"}"#),
                invocation("web_search", r#"{"query":"second"}"#),
            ],
        };
        assert_eq!(
            plan_from_tool_result(&result, "user text"),
            SearchPlan::Queries(vec!["first".into(), "second".into()])
        );
    }

    #[test]
    fn plan_without_calls_is_declined() {
        let result = ToolResult {
            content: "I know this one.".into(),
            tool_calls: vec![invocation("calculator", "{}")],
        };
        assert_eq!(plan_from_tool_result(&result, "q"), SearchPlan::Declined);
        assert!(SearchPlan::Declined.queries().is_empty());
    }

    #[test]
    fn plan_with_only_broken_arguments_falls_back() {
        let result = ToolResult {
            content: String::new(),
            tool_calls: vec![
                invocation("web_search", "{not json"),
                invocation("web_search", r#"{"query":"  "}"#),
            ],
        };
        assert_eq!(
            plan_from_tool_result(&result, "raw text"),
            SearchPlan::Fallback("raw text".into())
        );
    }

    #[tokio::test]
    async fn negotiated_query_drives_exactly_one_search() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(body_partial_json(json!({"stream": false, "tool_choice": "auto"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "choices": [{"message": {"role": "assistant", "content": null, "tool_calls": [{
                    "id": "call_1", "type": "function",
                    "function": {
                        "name": "web_search",
                        "arguments": "{\"query\":\"today's weather\"}"
                    }
                }]}}]
            })))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/tavily/search"))
            .and(body_partial_json(json!({"query": "today's weather"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "results": [{
                    "title": "Forecast",
                    "url": "https://weather.example",
                    "content": "Sunny"
                }]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = reqwest::Client::new();
        let search = tavily(&server);
        let orchestrator = ToolOrchestrator::new(&client, &search, SearchLimits::default());
        let history = vec![Message::user("what should I wear?")];

        let context = orchestrator
            .search_context(
                &backend(&server, ProtocolKind::OpenAi),
                &history,
                "what should I wear?",
            )
            .await;

        assert!(context.contains("[1] Forecast"));
        assert!(context.contains("Sunny"));
    }

    #[tokio::test]
    async fn failed_negotiation_searches_the_raw_user_text() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/messages"))
            .respond_with(ResponseTemplate::new(503).set_body_string("overloaded"))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/tavily/search"))
            .and(body_partial_json(json!({"query": "Who won the match last night?"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"results": []})))
            .expect(1)
            .mount(&server)
            .await;

        let client = reqwest::Client::new();
        let search = tavily(&server);
        let orchestrator = ToolOrchestrator::new(&client, &search, SearchLimits::default());
        let text = "Who won the match last night?";

        let plan = orchestrator
            .plan(
                &backend(&server, ProtocolKind::Anthropic),
                &[Message::user(text)],
                text,
            )
            .await;
        assert_eq!(plan, SearchPlan::Fallback(text.to_string()));
        assert!(orchestrator.execute(&plan).await.is_empty());
    }

    #[tokio::test]
    async fn gemini_skips_negotiation_and_searches_directly() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/tavily/search"))
            .and(body_partial_json(json!({"query": "latest rust release"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "results": [{
                    "title": "Rust 1.90",
                    "url": "https://blog.rust-lang.org",
                    "content": "Released"
                }]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = reqwest::Client::new();
        let search = tavily(&server);
        let orchestrator = ToolOrchestrator::new(&client, &search, SearchLimits::default());
        let context = orchestrator
            .search_context(
                &backend(&server, ProtocolKind::Gemini),
                &[Message::user("latest rust release")],
                "latest rust release",
            )
            .await;

        assert!(context.contains("Rust 1.90"));
        // only the search endpoint was hit
        assert_eq!(server.received_requests().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn search_failures_leave_an_empty_context() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/tavily/search"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let client = reqwest::Client::new();
        let search = tavily(&server);
        let orchestrator = ToolOrchestrator::new(&client, &search, SearchLimits::default());
        let results = orchestrator
            .execute(&SearchPlan::Fallback("anything".into()))
            .await;
        assert!(results.is_empty());
    }
}
