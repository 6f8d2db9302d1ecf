use super::{encode_body, parse_body, BackendConfig, HttpRequest, ToolInvocation, ToolResult};
use crate::api::anthropic::{
    AnthropicMessage, AnthropicTool, ContentBlock, MessagesRequest, MessagesResponse, StreamEvent,
    ANTHROPIC_VERSION,
};
use crate::core::error::GatewayError;
use crate::core::message::{split_leading_system, Message, Role};
use crate::core::tools::ToolCatalogEntry;
use crate::utils::url::construct_api_url;

const STREAM_MAX_TOKENS: u32 = 4096;
const NEGOTIATION_MAX_TOKENS: u32 = 1024;

fn build(backend: &BackendConfig, request: &MessagesRequest) -> Result<HttpRequest, GatewayError> {
    Ok(HttpRequest {
        url: construct_api_url(&backend.base_url, "v1/messages"),
        headers: vec![
            ("x-api-key", backend.api_key.clone()),
            ("anthropic-version", ANTHROPIC_VERSION.to_string()),
        ],
        body: encode_body(request)?,
    })
}

fn request_for(
    backend: &BackendConfig,
    messages: &[Message],
    max_tokens: u32,
    stream: bool,
    tools: Option<Vec<AnthropicTool>>,
) -> MessagesRequest {
    let (system, rest) = split_leading_system(messages);
    let messages = rest
        .iter()
        .map(|message| AnthropicMessage {
            // Only user and assistant turns are accepted in `messages`.
            role: match message.role {
                Role::Assistant => "assistant",
                Role::User | Role::System => "user",
            }
            .to_string(),
            content: message.content.clone(),
        })
        .collect();

    MessagesRequest {
        model: backend.model.clone(),
        max_tokens,
        system: system.map(str::to_owned),
        messages,
        stream,
        tools,
    }
}

pub(super) fn stream_request(
    backend: &BackendConfig,
    messages: &[Message],
) -> Result<HttpRequest, GatewayError> {
    let request = request_for(backend, messages, STREAM_MAX_TOKENS, true, None);
    build(backend, &request)
}

pub(super) fn negotiation_request(
    backend: &BackendConfig,
    messages: &[Message],
    tools: &[ToolCatalogEntry],
) -> Result<HttpRequest, GatewayError> {
    let tools = tools
        .iter()
        .map(|tool| AnthropicTool {
            name: tool.name.to_string(),
            description: tool.description.to_string(),
            input_schema: tool.parameter_schema(),
        })
        .collect();
    let request = request_for(backend, messages, NEGOTIATION_MAX_TOKENS, false, Some(tools));
    build(backend, &request)
}

pub(super) fn extract_delta(frame: &str) -> Option<String> {
    let event = serde_json::from_str::<StreamEvent>(frame).ok()?;
    if event.kind != "content_block_delta" {
        return None;
    }
    event.delta?.text
}

pub(super) fn extract_tool_result(body: &str) -> Result<ToolResult, GatewayError> {
    let response: MessagesResponse = parse_body(body)?;
    let mut result = ToolResult::default();

    for block in response.content {
        match block {
            ContentBlock::Text { text } => result.content.push_str(&text),
            ContentBlock::ToolUse { id, name, input } => {
                let arguments_json = serde_json::to_string(&input)
                    .map_err(|err| GatewayError::Parse(err.to_string()))?;
                result.tool_calls.push(ToolInvocation {
                    id,
                    tool_name: name,
                    arguments_json,
                });
            }
            ContentBlock::Other => {}
        }
    }

    Ok(result)
}
