//! HTTP implementation of the completion interface.

use async_trait::async_trait;
use tracing::debug;

use aide_foundation::CompletionError;

use crate::types::{ApiErrorBody, CompletionConfig, CompletionRequest, CompletionResponse};
use crate::CompletionClient;

pub struct HttpCompletionClient {
    client: reqwest::Client,
    config: CompletionConfig,
}

impl HttpCompletionClient {
    /// Build a client from explicit configuration.
    ///
    /// Fails fast on missing endpoint or API key so misconfiguration is
    /// caught at startup rather than on the first command.
    pub fn new(config: CompletionConfig) -> Result<Self, CompletionError> {
        if config.endpoint.is_empty() {
            return Err(CompletionError::Config(
                "completion endpoint is required".to_string(),
            ));
        }
        if config.api_key.is_empty() {
            return Err(CompletionError::Config(
                "completion API key is required".to_string(),
            ));
        }
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| CompletionError::Config(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { client, config })
    }

    pub fn config(&self) -> &CompletionConfig {
        &self.config
    }
}

#[async_trait]
impl CompletionClient for HttpCompletionClient {
    async fn complete(&self, prompt: &str) -> Result<String, CompletionError> {
        debug!(
            target: "completion",
            "Requesting completion (model: {}, prompt: {} chars)",
            self.config.model,
            prompt.len()
        );

        let request = CompletionRequest {
            model: &self.config.model,
            prompt,
        };

        let response = self
            .client
            .post(&self.config.endpoint)
            .bearer_auth(&self.config.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    CompletionError::Timeout
                } else {
                    CompletionError::Network(e.to_string())
                }
            })?;

        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
            return Err(CompletionError::Auth {
                status: status.as_u16(),
            });
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(api_error(status.as_u16(), &body));
        }

        let body = response
            .text()
            .await
            .map_err(|e| CompletionError::Network(e.to_string()))?;
        parse_success_body(&body)
    }
}

fn parse_success_body(body: &str) -> Result<String, CompletionError> {
    let parsed: CompletionResponse = serde_json::from_str(body).map_err(|e| {
        CompletionError::Api {
            status: 200,
            message: format!("malformed response body: {e}"),
        }
    })?;
    match parsed.text {
        Some(text) if !text.trim().is_empty() => Ok(text),
        _ => Err(CompletionError::EmptyResponse),
    }
}

fn api_error(status: u16, body: &str) -> CompletionError {
    let message = serde_json::from_str::<ApiErrorBody>(body)
        .ok()
        .and_then(|b| b.message().map(str::to_string))
        .unwrap_or_else(|| "no error detail provided".to_string());
    CompletionError::Api { status, message }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn config() -> CompletionConfig {
        CompletionConfig {
            endpoint: "https://example.invalid/v1/complete".to_string(),
            api_key: "test-key".to_string(),
            model: "test-model".to_string(),
            timeout: Duration::from_secs(5),
        }
    }

    #[test]
    fn new_rejects_missing_endpoint() {
        let result = HttpCompletionClient::new(CompletionConfig {
            endpoint: String::new(),
            ..config()
        });
        assert!(matches!(result, Err(CompletionError::Config(_))));
    }

    #[test]
    fn new_rejects_missing_api_key() {
        let result = HttpCompletionClient::new(CompletionConfig {
            api_key: String::new(),
            ..config()
        });
        assert!(matches!(result, Err(CompletionError::Config(_))));
    }

    #[test]
    fn new_accepts_complete_config() {
        assert!(HttpCompletionClient::new(config()).is_ok());
    }

    #[test]
    fn success_body_yields_text() {
        let text = parse_success_body(r#"{"text": "hi there"}"#).unwrap();
        assert_eq!(text, "hi there");
    }

    #[test]
    fn empty_text_maps_to_empty_response() {
        assert!(matches!(
            parse_success_body(r#"{"text": "   "}"#),
            Err(CompletionError::EmptyResponse)
        ));
        assert!(matches!(
            parse_success_body("{}"),
            Err(CompletionError::EmptyResponse)
        ));
    }

    #[test]
    fn malformed_body_maps_to_api_error() {
        assert!(matches!(
            parse_success_body("not json"),
            Err(CompletionError::Api { .. })
        ));
    }

    #[test]
    fn api_error_extracts_server_message() {
        let err = api_error(429, r#"{"error": {"message": "rate limited"}}"#);
        match err {
            CompletionError::Api { status, message } => {
                assert_eq!(status, 429);
                assert_eq!(message, "rate limited");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn api_error_tolerates_garbage_bodies() {
        let err = api_error(500, "<html>oops</html>");
        match err {
            CompletionError::Api { status, message } => {
                assert_eq!(status, 500);
                assert!(!message.is_empty());
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
