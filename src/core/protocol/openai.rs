use super::{encode_body, parse_body, BackendConfig, HttpRequest, ToolInvocation, ToolResult};
use crate::api::{
    ChatCompletion, ChatMessage, ChatRequest, ChatResponse, ChatToolDefinition, ChatToolFunction,
};
use crate::core::error::GatewayError;
use crate::core::message::Message;
use crate::core::tools::ToolCatalogEntry;
use crate::utils::url::construct_api_url;

fn api_messages(messages: &[Message]) -> Vec<ChatMessage> {
    messages
        .iter()
        .map(|message| ChatMessage {
            role: message.role.as_str().to_string(),
            content: message.content.clone(),
        })
        .collect()
}

fn build(backend: &BackendConfig, request: &ChatRequest) -> Result<HttpRequest, GatewayError> {
    Ok(HttpRequest {
        url: construct_api_url(&backend.base_url, "chat/completions"),
        headers: vec![("Authorization", format!("Bearer {}", backend.api_key))],
        body: encode_body(request)?,
    })
}

pub(super) fn stream_request(
    backend: &BackendConfig,
    messages: &[Message],
) -> Result<HttpRequest, GatewayError> {
    let request = ChatRequest {
        model: backend.model.clone(),
        messages: api_messages(messages),
        stream: true,
        tools: None,
        tool_choice: None,
    };
    build(backend, &request)
}

pub(super) fn negotiation_request(
    backend: &BackendConfig,
    messages: &[Message],
    tools: &[ToolCatalogEntry],
) -> Result<HttpRequest, GatewayError> {
    let definitions = tools
        .iter()
        .map(|tool| ChatToolDefinition {
            kind: "function".to_string(),
            function: ChatToolFunction {
                name: tool.name.to_string(),
                description: Some(tool.description.to_string()),
                parameters: tool.parameter_schema(),
            },
        })
        .collect();

    let request = ChatRequest {
        model: backend.model.clone(),
        messages: api_messages(messages),
        stream: false,
        tools: Some(definitions),
        tool_choice: Some("auto".to_string()),
    };
    build(backend, &request)
}

pub(super) fn extract_delta(frame: &str) -> Option<String> {
    let response = serde_json::from_str::<ChatResponse>(frame).ok()?;
    response.choices.into_iter().next()?.delta.content
}

pub(super) fn extract_tool_result(body: &str) -> Result<ToolResult, GatewayError> {
    let completion: ChatCompletion = parse_body(body)?;
    let message = completion
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| GatewayError::Parse("completion has no choices".to_string()))?
        .message;

    let tool_calls = message
        .tool_calls
        .unwrap_or_default()
        .into_iter()
        .map(|call| ToolInvocation {
            id: call.id,
            tool_name: call.function.name,
            arguments_json: call.function.arguments,
        })
        .collect();

    Ok(ToolResult {
        content: message.content.unwrap_or_default(),
        tool_calls,
    })
}
