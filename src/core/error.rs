use std::time::Duration;

use thiserror::Error;

use crate::core::session::SessionId;

/// Errors surfaced by a gateway turn or one of its HTTP round-trips.
#[derive(Error, Debug)]
pub enum GatewayError {
    /// The request never produced a response (DNS, connect, TLS, reset mid-body).
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The backend answered with a non-2xx status.
    #[error("API request failed with status {status}: {body}")]
    Http { status: u16, body: String },

    /// A non-streaming response body did not match the backend's schema.
    #[error("failed to parse response: {0}")]
    Parse(String),

    /// An outbound body could not be serialized.
    #[error("failed to encode request: {0}")]
    Encode(String),

    /// The response carried no readable body.
    #[error("response had no body")]
    MissingBody,

    #[error("stream idle for {}s", .0.as_secs())]
    IdleTimeout(Duration),

    #[error("no backend selected for this session")]
    NoBackend,

    #[error("session {0} is already streaming")]
    SessionBusy(SessionId),

    #[error("unknown session {0}")]
    UnknownSession(SessionId),
}

impl GatewayError {
    /// Text written into the assistant message when a turn fails.
    pub fn transcript_text(&self) -> String {
        match self {
            GatewayError::Http { body, .. } => format_api_error(body),
            other => format!("Error: {other}"),
        }
    }
}

fn extract_error_summary(value: &serde_json::Value) -> Option<String> {
    let summary = value
        .pointer("/error/message")
        .and_then(|v| v.as_str())
        .map(str::to_owned)
        .or_else(|| {
            value.get("error").and_then(|v| match v {
                serde_json::Value::String(s) => Some(s.to_string()),
                _ => None,
            })
        })
        .or_else(|| {
            // Gemini wraps errors in a one-element array.
            value
                .pointer("/0/error/message")
                .and_then(|v| v.as_str())
                .map(str::to_owned)
        })
        .or_else(|| {
            value
                .get("message")
                .and_then(|v| v.as_str().map(str::to_owned))
        });

    summary.map(|text| {
        let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");
        collapsed.trim().to_string()
    })
}

/// Renders an API error body as a readable fenced block with a one-line summary.
pub fn format_api_error(error_text: &str) -> String {
    let trimmed = error_text.trim();

    if trimmed.is_empty() {
        return "API Error:\n```\n<empty>\n```".to_string();
    }

    if let Ok(json_value) = serde_json::from_str::<serde_json::Value>(trimmed) {
        if let Ok(pretty_json) = serde_json::to_string_pretty(&json_value) {
            if let Some(summary) = extract_error_summary(&json_value) {
                if !summary.is_empty() {
                    return format!("API Error: {}\n```json\n{}\n```", summary, pretty_json);
                }
            }
            return format!("API Error:\n```json\n{}\n```", pretty_json);
        }
    }

    if trimmed.starts_with('<') && trimmed.ends_with('>') {
        format!("API Error:\n```xml\n{}\n```", trimmed)
    } else {
        format!("API Error:\n```\n{}\n```", trimmed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_api_error_prettifies_json_with_summary() {
        let raw = r#"{"error":{"message":"model overloaded","type":"invalid_request_error"}}"#;
        let formatted = format_api_error(raw);

        let expected = r#"API Error: model overloaded
```json
{
  "error": {
    "message": "model overloaded",
    "type": "invalid_request_error"
  }
}
```"#;
        assert_eq!(formatted, expected);
    }

    #[test]
    fn format_api_error_reads_gemini_array_errors() {
        let raw = r#"[{"error":{"code":400,"message":"API key not valid."}}]"#;
        let formatted = format_api_error(raw);
        assert!(formatted.starts_with("API Error: API key not valid.\n```json\n"));
    }

    #[test]
    fn format_api_error_handles_json_without_summary() {
        let formatted = format_api_error(r#"{"status":"failed"}"#);
        assert_eq!(
            formatted,
            "API Error:\n```json\n{\n  \"status\": \"failed\"\n}\n```"
        );
    }

    #[test]
    fn format_api_error_handles_xml_plaintext_and_empty() {
        assert_eq!(
            format_api_error("<error>bad</error>"),
            "API Error:\n```xml\n<error>bad</error>\n```"
        );
        assert_eq!(
            format_api_error("api failure"),
            "API Error:\n```\napi failure\n```"
        );
        assert_eq!(format_api_error("   "), "API Error:\n```\n<empty>\n```");
    }

    #[test]
    fn http_errors_render_their_body() {
        let err = GatewayError::Http {
            status: 401,
            body: r#"{"error":{"message":"bad key"}}"#.to_string(),
        };
        assert!(err.to_string().contains("401"));
        assert!(err.transcript_text().starts_with("API Error: bad key"));
    }

    #[test]
    fn other_errors_are_plain_text() {
        assert_eq!(
            GatewayError::MissingBody.transcript_text(),
            "Error: response had no body"
        );
        assert_eq!(
            GatewayError::IdleTimeout(Duration::from_secs(30)).transcript_text(),
            "Error: stream idle for 30s"
        );
    }
}
