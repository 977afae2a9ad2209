//! Seam between the generators and the LLM provider.

use std::sync::Arc;

use async_trait::async_trait;
use db::models::ai_settings::AiSettings;

use super::claude_api::{ClaudeApiClient, ClaudeApiError, Message};

/// Everything needed for a single completion call
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub messages: Vec<Message>,
    pub system: Option<String>,
    pub max_tokens: u32,
    pub temperature: Option<f32>,
}

impl CompletionRequest {
    pub fn single(prompt: impl Into<String>, system: Option<String>, max_tokens: u32) -> Self {
        Self {
            messages: vec![Message::user(prompt)],
            system,
            max_tokens,
            temperature: None,
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }
}

/// Text returned by the model together with its token accounting
#[derive(Debug, Clone)]
pub struct Completion {
    pub text: String,
    pub model: String,
    pub input_tokens: u32,
    pub output_tokens: u32,
}

impl Completion {
    pub fn tokens_used(&self) -> u32 {
        self.input_tokens + self.output_tokens
    }
}

#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Model identifier used for pricing and usage records
    fn model(&self) -> &str;

    async fn complete(&self, request: CompletionRequest) -> Result<Completion, ClaudeApiError>;
}

/// Builds the model client for one generation from the current settings.
pub trait LanguageModelProvider: Send + Sync {
    /// `api_key` overrides the stored key for this call only.
    fn build(
        &self,
        settings: &AiSettings,
        api_key: Option<&str>,
    ) -> Result<Arc<dyn LanguageModel>, ClaudeApiError>;
}

/// Claude client from settings; key precedence is request override, stored key, then
/// `ANTHROPIC_API_KEY`.
#[derive(Debug, Default, Clone)]
pub struct ClaudeProvider;

impl LanguageModelProvider for ClaudeProvider {
    fn build(
        &self,
        settings: &AiSettings,
        api_key: Option<&str>,
    ) -> Result<Arc<dyn LanguageModel>, ClaudeApiError> {
        let key = api_key
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .map(str::to_string)
            .or_else(|| settings.api_key.clone())
            .or_else(|| std::env::var("ANTHROPIC_API_KEY").ok())
            .ok_or(ClaudeApiError::MissingApiKey)?;

        let client = ClaudeApiClient::new(key, Some(settings.model.clone()))?
            .with_max_retries(usize::try_from(settings.max_retries).unwrap_or(0));
        Ok(Arc::new(client))
    }
}
