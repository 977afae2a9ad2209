//! Anthropic Messages API client behind the [`LanguageModel`] seam.

use std::time::Duration;

use async_trait::async_trait;
use backon::{ExponentialBuilder, Retryable};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

use super::language_model::{Completion, CompletionRequest, LanguageModel};

const MESSAGES_URL: &str = "https://api.anthropic.com/v1/messages";
const API_VERSION: &str = "2023-06-01";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(180);
pub const DEFAULT_MODEL: &str = "claude-sonnet-4-20250514";

#[derive(Debug, Clone, Error)]
pub enum ClaudeApiError {
    #[error("could not reach the Claude API: {0}")]
    Transport(String),
    #[error("Claude API request timed out")]
    Timeout,
    #[error("Claude API returned {status}: {body}")]
    Http { status: u16, body: String },
    #[error("Claude API rate limit reached")]
    RateLimited,
    #[error("Claude API rejected the API key")]
    InvalidApiKey,
    #[error("unexpected Claude API response: {0}")]
    Serde(String),
    #[error("missing api key: configure one in AI settings or set ANTHROPIC_API_KEY")]
    MissingApiKey,
}

impl ClaudeApiError {
    /// Network failures, timeouts, 429 and 5xx; anything else fails fast.
    pub fn should_retry(&self) -> bool {
        match self {
            Self::Transport(_) | Self::Timeout | Self::RateLimited => true,
            Self::Http { status, .. } => *status >= 500,
            Self::InvalidApiKey | Self::Serde(_) | Self::MissingApiKey => false,
        }
    }

    fn from_status(status: StatusCode, body: String) -> Self {
        match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Self::InvalidApiKey,
            StatusCode::TOO_MANY_REQUESTS => Self::RateLimited,
            other => Self::Http {
                status: other.as_u16(),
                body,
            },
        }
    }
}

impl From<reqwest::Error> for ClaudeApiError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Self::Timeout
        } else if e.is_decode() {
            Self::Serde(e.to_string())
        } else {
            Self::Transport(e.to_string())
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

#[derive(Debug, Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    messages: &'a [Message],
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ResponseBlock {
    Text { text: String },
    #[serde(other)]
    Unsupported,
}

#[derive(Debug, Deserialize)]
struct TokenUsage {
    input_tokens: u32,
    output_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    model: String,
    content: Vec<ResponseBlock>,
    usage: TokenUsage,
}

impl MessagesResponse {
    fn into_completion(self) -> Result<Completion, ClaudeApiError> {
        let text: String = self
            .content
            .into_iter()
            .filter_map(|block| match block {
                ResponseBlock::Text { text } => Some(text),
                ResponseBlock::Unsupported => None,
            })
            .collect();
        if text.is_empty() {
            return Err(ClaudeApiError::Serde("response had no text content".to_string()));
        }
        Ok(Completion {
            text,
            model: self.model,
            input_tokens: self.usage.input_tokens,
            output_tokens: self.usage.output_tokens,
        })
    }
}

#[derive(Debug, Clone)]
pub struct ClaudeApiClient {
    http: Client,
    api_key: String,
    model: String,
    max_retries: usize,
}

impl ClaudeApiClient {
    pub fn new(api_key: String, model: Option<String>) -> Result<Self, ClaudeApiError> {
        if api_key.trim().is_empty() {
            return Err(ClaudeApiError::MissingApiKey);
        }
        let http = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .user_agent(concat!("saas-builder/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            http,
            api_key,
            model: model
                .filter(|m| !m.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            max_retries: 0,
        })
    }

    /// Retry transient failures up to `max_retries` times; 0 sends once.
    pub fn with_max_retries(mut self, max_retries: usize) -> Self {
        self.max_retries = max_retries;
        self
    }

    async fn post(&self, body: &MessagesRequest<'_>) -> Result<MessagesResponse, ClaudeApiError> {
        let response = self
            .http
            .post(MESSAGES_URL)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", API_VERSION)
            .json(body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(ClaudeApiError::from_status(status, text));
        }
        Ok(response.json::<MessagesResponse>().await?)
    }
}

#[async_trait]
impl LanguageModel for ClaudeApiClient {
    fn model(&self) -> &str {
        &self.model
    }

    async fn complete(&self, request: CompletionRequest) -> Result<Completion, ClaudeApiError> {
        let body = MessagesRequest {
            model: &self.model,
            max_tokens: request.max_tokens,
            messages: &request.messages,
            system: request.system.as_deref(),
            temperature: request.temperature,
        };

        let response = if self.max_retries == 0 {
            self.post(&body).await?
        } else {
            let backoff = ExponentialBuilder::default()
                .with_min_delay(Duration::from_secs(1))
                .with_max_delay(Duration::from_secs(30))
                .with_max_times(self.max_retries)
                .with_jitter();
            (|| self.post(&body))
                .retry(backoff)
                .when(ClaudeApiError::should_retry)
                .notify(|e, wait| {
                    warn!(model = %self.model, "Retrying Claude call in {:.1}s: {}", wait.as_secs_f64(), e)
                })
                .await?
        };
        response.into_completion()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retry_classification() {
        assert!(ClaudeApiError::Timeout.should_retry());
        assert!(ClaudeApiError::from_status(StatusCode::TOO_MANY_REQUESTS, String::new()).should_retry());
        assert!(ClaudeApiError::from_status(StatusCode::from_u16(529).unwrap(), String::new()).should_retry());
        assert!(!ClaudeApiError::from_status(StatusCode::BAD_REQUEST, String::new()).should_retry());
        assert!(matches!(
            ClaudeApiError::from_status(StatusCode::UNAUTHORIZED, String::new()),
            ClaudeApiError::InvalidApiKey
        ));
    }

    #[test]
    fn test_completion_joins_text_blocks_only() {
        let response: MessagesResponse = serde_json::from_str(
            r#"{
                "id": "msg_1",
                "model": "claude-sonnet-4-20250514",
                "stop_reason": "end_turn",
                "usage": {"input_tokens": 10, "output_tokens": 20},
                "content": [
                    {"type": "thinking", "thinking": "..."},
                    {"type": "text", "text": "<html>"},
                    {"type": "text", "text": "</html>"}
                ]
            }"#,
        )
        .unwrap();
        let completion = response.into_completion().unwrap();
        assert_eq!(completion.text, "<html></html>");
        assert_eq!(completion.tokens_used(), 30);
    }

    #[test]
    fn test_empty_content_is_an_error() {
        let response: MessagesResponse = serde_json::from_str(
            r#"{"model": "m", "usage": {"input_tokens": 1, "output_tokens": 0}, "content": []}"#,
        )
        .unwrap();
        assert!(matches!(response.into_completion(), Err(ClaudeApiError::Serde(_))));
    }

    #[test]
    fn test_request_body_shape() {
        let messages = vec![Message::user("hi")];
        let body = MessagesRequest {
            model: DEFAULT_MODEL,
            max_tokens: 100,
            messages: &messages,
            system: None,
            temperature: Some(0.2),
        };
        let json = serde_json::to_value(&body).unwrap();
        assert!(json.get("system").is_none());
        assert_eq!(json["messages"][0]["role"], "user");
        assert!((json["temperature"].as_f64().unwrap() - 0.2).abs() < 1e-6);
    }

    #[test]
    fn test_blank_key_and_model() {
        assert!(matches!(
            ClaudeApiClient::new("  ".to_string(), None),
            Err(ClaudeApiError::MissingApiKey)
        ));
        let client = ClaudeApiClient::new("sk-test".to_string(), Some(" ".to_string())).unwrap();
        assert_eq!(client.model(), DEFAULT_MODEL);
    }
}
