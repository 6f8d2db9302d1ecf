//! Backend wire protocols behind one dispatch point.
//!
//! Each [`ProtocolKind`] knows how to shape a streaming request, how to shape the
//! non-streaming tool negotiation request (where supported), how to pull a text
//! delta out of one decoded frame, and how to read a completed negotiation reply.
//! Adding a backend means adding a variant and a sibling module; the orchestrator
//! only ever talks to `ProtocolKind`.

mod anthropic;
mod gemini;
mod openai;

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::core::error::GatewayError;
use crate::core::message::Message;
use crate::core::tools::ToolCatalogEntry;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ProtocolKind {
    /// Token-delta SSE (`choices[0].delta.content`), terminated by `[DONE]`.
    #[default]
    #[serde(rename = "openai")]
    OpenAi,
    /// Content-block SSE (`content_block_delta` events).
    #[serde(rename = "anthropic")]
    Anthropic,
    /// Whole-JSON SSE (`candidates[0].content.parts[0].text`).
    #[serde(rename = "gemini")]
    Gemini,
}

impl ProtocolKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ProtocolKind::OpenAi => "openai",
            ProtocolKind::Anthropic => "anthropic",
            ProtocolKind::Gemini => "gemini",
        }
    }

    pub fn supports_tool_negotiation(self) -> bool {
        !matches!(self, ProtocolKind::Gemini)
    }

    pub fn build_stream_request(
        self,
        backend: &BackendConfig,
        messages: &[Message],
    ) -> Result<HttpRequest, GatewayError> {
        match self {
            ProtocolKind::OpenAi => openai::stream_request(backend, messages),
            ProtocolKind::Anthropic => anthropic::stream_request(backend, messages),
            ProtocolKind::Gemini => gemini::stream_request(backend, messages),
        }
    }

    /// Returns `Ok(None)` for protocols that cannot negotiate tools.
    pub fn build_negotiation_request(
        self,
        backend: &BackendConfig,
        messages: &[Message],
        tools: &[ToolCatalogEntry],
    ) -> Result<Option<HttpRequest>, GatewayError> {
        match self {
            ProtocolKind::OpenAi => openai::negotiation_request(backend, messages, tools).map(Some),
            ProtocolKind::Anthropic => {
                anthropic::negotiation_request(backend, messages, tools).map(Some)
            }
            ProtocolKind::Gemini => Ok(None),
        }
    }

    /// Pulls the text token out of one frame payload; `None` for frames with no text.
    pub fn extract_delta(self, frame: &str) -> Option<String> {
        let delta = match self {
            ProtocolKind::OpenAi => openai::extract_delta(frame),
            ProtocolKind::Anthropic => anthropic::extract_delta(frame),
            ProtocolKind::Gemini => gemini::extract_delta(frame),
        };
        delta.filter(|text| !text.is_empty())
    }

    pub fn extract_tool_result(self, body: &str) -> Result<ToolResult, GatewayError> {
        match self {
            ProtocolKind::OpenAi => openai::extract_tool_result(body),
            ProtocolKind::Anthropic => anthropic::extract_tool_result(body),
            ProtocolKind::Gemini => Err(GatewayError::Parse(
                "gemini does not support tool negotiation".to_string(),
            )),
        }
    }
}

impl fmt::Display for ProtocolKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A backend resolved for one turn.
#[derive(Clone, PartialEq, Eq)]
pub struct BackendConfig {
    pub base_url: String,
    pub api_key: String,
    pub model: String,
    pub protocol: ProtocolKind,
}

impl fmt::Debug for BackendConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BackendConfig")
            .field("base_url", &self.base_url)
            .field("api_key", &"<redacted>")
            .field("model", &self.model)
            .field("protocol", &self.protocol)
            .finish()
    }
}

/// A fully shaped outbound POST.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub url: String,
    pub headers: Vec<(&'static str, String)>,
    pub body: Value,
}

impl HttpRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    pub fn into_builder(self, client: &reqwest::Client) -> reqwest::RequestBuilder {
        let mut request = client
            .post(self.url)
            .header("Content-Type", "application/json");
        for (name, value) in self.headers {
            request = request.header(name, value);
        }
        request.json(&self.body)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolInvocation {
    pub id: String,
    pub tool_name: String,
    pub arguments_json: String,
}

/// The outcome of a completed non-streaming call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ToolResult {
    pub content: String,
    pub tool_calls: Vec<ToolInvocation>,
}

fn encode_body<T: Serialize>(body: &T) -> Result<Value, GatewayError> {
    serde_json::to_value(body).map_err(|err| GatewayError::Encode(err.to_string()))
}

fn parse_body<'a, T: Deserialize<'a>>(body: &'a str) -> Result<T, GatewayError> {
    serde_json::from_str(body).map_err(|err| GatewayError::Parse(err.to_string()))
}
