//! Wire types and configuration for the completion endpoint.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Request body: `{"model": ..., "prompt": ...}`.
#[derive(Debug, Clone, Serialize)]
pub struct CompletionRequest<'a> {
    pub model: &'a str,
    pub prompt: &'a str,
}

/// Success body: `{"text": ...}`.
#[derive(Debug, Clone, Deserialize)]
pub struct CompletionResponse {
    #[serde(default)]
    pub text: Option<String>,
}

/// Error body, either `{"error": {"message": ...}}` or a bare
/// `{"message": ...}`.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiErrorBody {
    #[serde(default)]
    pub error: Option<ApiErrorDetail>,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiErrorDetail {
    #[serde(default)]
    pub message: Option<String>,
}

impl ApiErrorBody {
    pub fn message(&self) -> Option<&str> {
        self.error
            .as_ref()
            .and_then(|e| e.message.as_deref())
            .or(self.message.as_deref())
    }
}

/// Explicit configuration constructed at startup and handed to the client.
#[derive(Debug, Clone)]
pub struct CompletionConfig {
    /// Full URL of the completion endpoint.
    pub endpoint: String,
    /// Model name sent with every request.
    pub model: String,
    /// Bearer token for the endpoint.
    pub api_key: String,
    /// Bound on each request; a single attempt, no retry.
    pub timeout: Duration,
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            model: "gemini-1.5-flash".to_string(),
            api_key: String::new(),
            timeout: Duration::from_secs(30),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_serializes_model_and_prompt() {
        let request = CompletionRequest {
            model: "gemini-1.5-flash",
            prompt: "hello",
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["model"], "gemini-1.5-flash");
        assert_eq!(json["prompt"], "hello");
    }

    #[test]
    fn response_deserializes_text() {
        let response: CompletionResponse = serde_json::from_str(r#"{"text": "hi there"}"#).unwrap();
        assert_eq!(response.text.as_deref(), Some("hi there"));
    }

    #[test]
    fn response_tolerates_missing_text() {
        let response: CompletionResponse = serde_json::from_str("{}").unwrap();
        assert!(response.text.is_none());
    }

    #[test]
    fn error_body_prefers_nested_message() {
        let body: ApiErrorBody =
            serde_json::from_str(r#"{"error": {"message": "quota exceeded"}, "message": "outer"}"#)
                .unwrap();
        assert_eq!(body.message(), Some("quota exceeded"));
    }

    #[test]
    fn error_body_falls_back_to_bare_message() {
        let body: ApiErrorBody = serde_json::from_str(r#"{"message": "bad request"}"#).unwrap();
        assert_eq!(body.message(), Some("bad request"));
    }

    #[test]
    fn config_defaults() {
        let config = CompletionConfig::default();
        assert_eq!(config.model, "gemini-1.5-flash");
        assert_eq!(config.timeout, Duration::from_secs(30));
        assert!(config.endpoint.is_empty());
    }
}
