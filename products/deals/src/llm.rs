//! Chat-completion collaborator used for deal extraction and context
//! summaries.
//!
//! The engine depends only on [`LlmClient`]; [`OpenAiClient`] is the
//! production implementation and is constructed once at startup from an
//! [`LlmConfig`].

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::instrument;

pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com";
pub const DEFAULT_OPENAI_MODEL: &str = "gpt-4o";

#[derive(Clone, Debug)]
pub struct LlmConfig {
    pub api_key: String,
    pub base_url: String,
    pub model: String,
    pub timeout_secs: u64,
}

impl LlmConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: DEFAULT_OPENAI_BASE_URL.to_string(),
            model: DEFAULT_OPENAI_MODEL.to_string(),
            timeout_secs: 120,
        }
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }
}

/// A single system + user exchange.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChatRequest {
    pub system: String,
    pub user: String,
    pub json_response: bool,
    pub max_tokens: Option<u32>,
}

impl ChatRequest {
    pub fn new(system: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            system: system.into(),
            user: user.into(),
            json_response: false,
            max_tokens: None,
        }
    }

    /// Ask the provider for a JSON object response.
    pub fn json(mut self) -> Self {
        self.json_response = true;
        self
    }

    pub fn max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }
}

#[derive(Error, Debug)]
pub enum LlmError {
    #[error("authentication failed: {message}")]
    Authentication { message: String },

    #[error("rate limit exceeded: {message}")]
    RateLimit {
        message: String,
        retry_after: Option<u64>,
    },

    #[error("invalid request: {message}")]
    InvalidRequest { message: String },

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("network error: {source}")]
    Network {
        #[from]
        source: reqwest::Error,
    },

    #[error("provider returned no content")]
    EmptyResponse,
}

#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Run one completion and return the assistant text.
    async fn complete(&self, request: ChatRequest) -> Result<String, LlmError>;

    fn model_name(&self) -> &str;
}

pub struct OpenAiClient {
    config: LlmConfig,
    http: reqwest::Client,
}

impl OpenAiClient {
    pub fn new(config: LlmConfig) -> Result<Self, LlmError> {
        if config.api_key.trim().is_empty() {
            return Err(LlmError::Authentication {
                message: "API key cannot be empty".to_string(),
            });
        }
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self { config, http })
    }

    fn completions_url(&self) -> String {
        format!(
            "{}/v1/chat/completions",
            self.config.base_url.trim_end_matches('/')
        )
    }
}

#[async_trait]
impl LlmClient for OpenAiClient {
    #[instrument(name = "llm.complete", skip_all, fields(model = %self.config.model))]
    async fn complete(&self, request: ChatRequest) -> Result<String, LlmError> {
        let body = ChatCompletionRequest::from_request(&self.config.model, &request);
        let response = self
            .http
            .post(self.completions_url())
            .bearer_auth(&self.config.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            let parsed: ChatCompletionResponse = response.json().await?;
            return parsed.into_content();
        }

        let retry_after = response
            .headers()
            .get("retry-after")
            .and_then(|h| h.to_str().ok())
            .and_then(|s| s.parse::<u64>().ok());
        let text = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());
        Err(status_error(status, &text, retry_after))
    }

    fn model_name(&self) -> &str {
        &self.config.model
    }
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<WireMessage<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    temperature: f32,
}

impl<'a> ChatCompletionRequest<'a> {
    fn from_request(model: &'a str, request: &'a ChatRequest) -> Self {
        Self {
            model,
            messages: vec![
                WireMessage {
                    role: "system",
                    content: &request.system,
                },
                WireMessage {
                    role: "user",
                    content: &request.user,
                },
            ],
            response_format: request.json_response.then(|| ResponseFormat {
                kind: "json_object",
            }),
            max_tokens: request.max_tokens,
            temperature: 0.2,
        }
    }
}

#[derive(Debug, Serialize)]
struct WireMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

impl ChatCompletionResponse {
    fn into_content(self) -> Result<String, LlmError> {
        self.choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .filter(|content| !content.trim().is_empty())
            .ok_or(LlmError::EmptyResponse)
    }
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
}

fn status_error(status: StatusCode, body: &str, retry_after: Option<u64>) -> LlmError {
    let message = serde_json::from_str::<ErrorResponse>(body)
        .map(|parsed| parsed.error.message)
        .unwrap_or_else(|_| body.to_string());
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => LlmError::Authentication { message },
        StatusCode::TOO_MANY_REQUESTS => LlmError::RateLimit {
            message,
            retry_after,
        },
        StatusCode::BAD_REQUEST | StatusCode::PAYLOAD_TOO_LARGE => {
            LlmError::InvalidRequest { message }
        }
        other => LlmError::Api {
            status: other.as_u16(),
            message,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_requests_set_response_format() {
        let request = ChatRequest::new("sys", "user").json().max_tokens(300);
        let wire = ChatCompletionRequest::from_request("gpt-4o", &request);
        let value = serde_json::to_value(&wire).unwrap();
        assert_eq!(value["response_format"]["type"], "json_object");
        assert_eq!(value["max_tokens"], 300);
        assert_eq!(value["messages"][0]["role"], "system");
        assert_eq!(value["messages"][1]["content"], "user");
    }

    #[test]
    fn plain_requests_omit_response_format() {
        let request = ChatRequest::new("sys", "user");
        let wire = ChatCompletionRequest::from_request("gpt-4o", &request);
        let value = serde_json::to_value(&wire).unwrap();
        assert!(value.get("response_format").is_none());
        assert!(value.get("max_tokens").is_none());
    }

    #[test]
    fn first_choice_content_is_returned() {
        let parsed: ChatCompletionResponse = serde_json::from_str(
            r#"{"choices":[{"message":{"role":"assistant","content":"{\"isDeal\":true}"}}]}"#,
        )
        .unwrap();
        assert_eq!(parsed.into_content().unwrap(), r#"{"isDeal":true}"#);
    }

    #[test]
    fn blank_content_is_an_empty_response() {
        let parsed: ChatCompletionResponse =
            serde_json::from_str(r#"{"choices":[{"message":{"content":"  "}}]}"#).unwrap();
        assert!(matches!(parsed.into_content(), Err(LlmError::EmptyResponse)));
        let none: ChatCompletionResponse = serde_json::from_str(r#"{"choices":[]}"#).unwrap();
        assert!(matches!(none.into_content(), Err(LlmError::EmptyResponse)));
    }

    #[test]
    fn statuses_map_to_error_kinds() {
        let body = r#"{"error":{"message":"slow down"}}"#;
        match status_error(StatusCode::TOO_MANY_REQUESTS, body, Some(12)) {
            LlmError::RateLimit {
                message,
                retry_after,
            } => {
                assert_eq!(message, "slow down");
                assert_eq!(retry_after, Some(12));
            }
            other => panic!("unexpected {other:?}"),
        }
        assert!(matches!(
            status_error(StatusCode::UNAUTHORIZED, "nope", None),
            LlmError::Authentication { .. }
        ));
        assert!(matches!(
            status_error(StatusCode::BAD_GATEWAY, "upstream", None),
            LlmError::Api { status: 502, .. }
        ));
    }

    #[test]
    fn empty_api_key_is_rejected() {
        assert!(matches!(
            OpenAiClient::new(LlmConfig::new("  ")),
            Err(LlmError::Authentication { .. })
        ));
    }
}
