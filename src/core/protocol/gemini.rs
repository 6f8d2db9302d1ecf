use super::{encode_body, BackendConfig, HttpRequest};
use crate::api::gemini::{Content, GenerateContentRequest, GenerateContentResponse};
use crate::core::error::GatewayError;
use crate::core::message::{split_leading_system, Message, Role};
use crate::utils::url::construct_api_url;

pub(super) fn stream_request(
    backend: &BackendConfig,
    messages: &[Message],
) -> Result<HttpRequest, GatewayError> {
    let (system, rest) = split_leading_system(messages);
    let contents = rest
        .iter()
        .map(|message| {
            let role = match message.role {
                Role::Assistant => "model",
                Role::User | Role::System => "user",
            };
            Content::text(Some(role), message.content.clone())
        })
        .collect();

    let request = GenerateContentRequest {
        contents,
        system_instruction: system.map(|text| Content::text(None, text)),
    };

    let endpoint = format!(
        "v1beta/models/{}:streamGenerateContent?key={}&alt=sse",
        backend.model,
        urlencoding::encode(&backend.api_key)
    );

    Ok(HttpRequest {
        url: construct_api_url(&backend.base_url, &endpoint),
        headers: Vec::new(),
        body: encode_body(&request)?,
    })
}

pub(super) fn extract_delta(frame: &str) -> Option<String> {
    let response = serde_json::from_str::<GenerateContentResponse>(frame).ok()?;
    response
        .candidates
        .into_iter()
        .next()?
        .content?
        .parts
        .into_iter()
        .next()?
        .text
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::protocol::ProtocolKind;
    use serde_json::json;

    fn backend() -> BackendConfig {
        BackendConfig {
            base_url: "https://generativelanguage.googleapis.com/".into(),
            api_key: "g-key".into(),
            model: "gemini-test".into(),
            protocol: ProtocolKind::Gemini,
        }
    }

    #[test]
    fn stream_request_uses_query_key_and_model_role() {
        let messages = vec![
            Message::system("be terse"),
            Message::user("hi"),
            Message::assistant("hello"),
        ];
        let request = stream_request(&backend(), &messages).unwrap();

        assert_eq!(
            request.url,
            "https://generativelanguage.googleapis.com/v1beta/models/gemini-test:streamGenerateContent?key=g-key&alt=sse"
        );
        assert!(request.headers.is_empty());
        assert_eq!(
            request.body,
            json!({
                "contents": [
                    {"role": "user", "parts": [{"text": "hi"}]},
                    {"role": "model", "parts": [{"text": "hello"}]}
                ],
                "systemInstruction": {"parts": [{"text": "be terse"}]}
            })
        );
    }

    #[test]
    fn stream_request_omits_system_instruction_without_system_message() {
        let request = stream_request(&backend(), &[Message::user("hi")]).unwrap();
        assert!(request.body.get("systemInstruction").is_none());
    }

    #[test]
    fn extract_delta_reads_first_candidate_part() {
        let frame = r#"{"candidates":[{"content":{"role":"model","parts":[{"text":"Bonjour"}]}}]}"#;
        assert_eq!(extract_delta(frame).as_deref(), Some("Bonjour"));
        assert_eq!(extract_delta(r#"{"candidates":[{"finishReason":"STOP"}]}"#), None);
        assert_eq!(extract_delta(r#"{"usageMetadata":{}}"#), None);
    }
}
