//! # Chat Transport Module
//!
//! The HTTP boundary of the AI lane. [`ChatTransport`] is the seam the
//! enricher is generic over; [`OpenAiTransport`] is the production
//! implementation against an OpenAI-compatible `/chat/completions` endpoint.

use crate::ai::model::RawChatResponse;
use crate::config::AiConfig;
use crate::enrichment_errors::AiError;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::Client;
use serde::Serialize;
use std::future::Future;
use std::time::Duration;
use tracing::debug;

const MAX_ERROR_BODY_CHARS: usize = 500;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RequestMessage {
    pub role: String,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResponseFormat {
    #[serde(rename = "type")]
    pub kind: String,
}

/// Structured-output chat request
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatRequest {
    pub model: String,
    pub temperature: f32,
    pub response_format: ResponseFormat,
    pub messages: Vec<RequestMessage>,
}

impl ChatRequest {
    /// Zero-temperature JSON-object request with a system and a user message
    pub fn json_object(model: &str, system: &str, user: &str) -> Self {
        Self {
            model: model.to_string(),
            temperature: 0.0,
            response_format: ResponseFormat {
                kind: "json_object".to_string(),
            },
            messages: vec![
                RequestMessage {
                    role: "system".to_string(),
                    content: system.to_string(),
                },
                RequestMessage {
                    role: "user".to_string(),
                    content: user.to_string(),
                },
            ],
        }
    }

    /// All message text, used for token estimation
    pub fn prompt_text(&self) -> String {
        self.messages
            .iter()
            .map(|m| m.content.as_str())
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Sends one chat-completion request
///
/// A non-2xx reply must surface as [`AiError::Status`] so callers can react
/// to HTTP 429.
pub trait ChatTransport: Send + Sync {
    fn complete(&self, request: &ChatRequest) -> impl Future<Output = Result<RawChatResponse, AiError>> + Send;
}

/// OpenAI-compatible HTTP transport
#[derive(Debug, Clone)]
pub struct OpenAiTransport {
    client: Client,
    endpoint: String,
}

impl OpenAiTransport {
    /// Build the client with bearer auth and the configured timeout
    pub fn new(config: &AiConfig) -> Result<Self, AiError> {
        let key = config.api_key.as_deref().unwrap_or_default().trim();
        let mut headers = HeaderMap::new();
        let auth = HeaderValue::from_str(&format!("Bearer {key}"))
            .map_err(|e| AiError::Http(format!("invalid API key header: {e}")))?;
        headers.insert(AUTHORIZATION, auth);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .default_headers(headers)
            .build()?;
        Ok(Self {
            client,
            endpoint: format!("{}/chat/completions", config.base_url.trim_end_matches('/')),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

impl ChatTransport for OpenAiTransport {
    async fn complete(&self, request: &ChatRequest) -> Result<RawChatResponse, AiError> {
        let response = self.client.post(&self.endpoint).json(request).send().await?;
        let status = response.status();
        debug!(status = status.as_u16(), model = %request.model, "Chat completion response");

        let body = response.text().await?;
        if !status.is_success() {
            return Err(AiError::Status {
                status: status.as_u16(),
                body: body.chars().take(MAX_ERROR_BODY_CHARS).collect(),
            });
        }
        Ok(serde_json::from_str(&body)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_shape() {
        let request = ChatRequest::json_object("gpt-4o-mini", "system", "user");
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["temperature"], 0.0);
        assert_eq!(json["response_format"]["type"], "json_object");
        assert_eq!(json["messages"][0]["role"], "system");
        assert_eq!(json["messages"][1]["content"], "user");
        assert_eq!(request.prompt_text(), "system\nuser");
    }

    #[test]
    fn test_endpoint_trims_slash() {
        let config = AiConfig {
            api_key: Some("sk-test".into()),
            base_url: "http://localhost:8080/v1/".into(),
            ..AiConfig::default()
        };
        let transport = OpenAiTransport::new(&config).unwrap();
        assert_eq!(transport.endpoint(), "http://localhost:8080/v1/chat/completions");
    }
}
