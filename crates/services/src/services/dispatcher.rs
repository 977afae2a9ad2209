//! Single path for every AI generation: cost ceiling check, model call, usage record.

use std::sync::Arc;

use db::models::{
    ai_settings::AiSettings,
    ai_usage::{AiUsage, CreateAiUsage},
};
use sqlx::SqlitePool;
use strum_macros::Display;
use thiserror::Error;
use tracing::{debug, info, warn};
use utils::text::current_month;

use super::{
    claude_api::ClaudeApiError,
    language_model::{Completion, CompletionRequest, LanguageModelProvider},
    pricing::estimate_cost,
};

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error(
        "Monthly AI cost limit reached: ${usage:.2} used of ${limit:.2}. \
         Raise cost_limit_monthly in AI settings to continue."
    )]
    CostLimitExceeded { usage: f64, limit: f64 },
    #[error(transparent)]
    ClaudeApi(#[from] ClaudeApiError),
    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

/// Progress of one generation request, logged at debug level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "snake_case")]
pub enum GenerationStage {
    Idle,
    PromptBuilt,
    ApiCalled,
    ResponseReceived,
    Parsed,
    ParseFailed,
    Persisted,
    ErrorReturned,
}

impl GenerationStage {
    pub fn log(self, endpoint: &str) {
        debug!(endpoint, stage = %self, "Generation stage");
    }
}

/// One prompt to send
#[derive(Debug, Clone)]
pub struct Dispatch {
    /// Usage-log label, e.g. `generate-reserved-page`
    pub endpoint: &'static str,
    pub prompt: String,
    pub system: Option<String>,
    /// Per-request key that overrides the stored one
    pub api_key: Option<String>,
}

impl Dispatch {
    pub fn new(endpoint: &'static str, prompt: impl Into<String>) -> Self {
        Self {
            endpoint,
            prompt: prompt.into(),
            system: None,
            api_key: None,
        }
    }

    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    pub fn with_api_key(mut self, api_key: Option<String>) -> Self {
        self.api_key = api_key;
        self
    }
}

#[derive(Debug, Clone)]
pub struct DispatchOutcome {
    pub completion: Completion,
    pub estimated_cost: f64,
    /// Month-to-date spend including this call
    pub monthly_usage: f64,
}

impl DispatchOutcome {
    pub fn tokens_used(&self) -> u32 {
        self.completion.tokens_used()
    }
}

#[derive(Clone)]
pub struct AiDispatcher {
    pool: SqlitePool,
    provider: Arc<dyn LanguageModelProvider>,
}

impl AiDispatcher {
    pub fn new(pool: SqlitePool, provider: Arc<dyn LanguageModelProvider>) -> Self {
        Self { pool, provider }
    }

    /// Reject when this month's spend has reached the limit.
    pub fn check_budget(settings: &AiSettings, month: &str) -> Result<(), DispatchError> {
        if settings.is_over_budget(month) {
            return Err(DispatchError::CostLimitExceeded {
                usage: settings.usage_for_month(month),
                limit: settings.cost_limit_monthly,
            });
        }
        Ok(())
    }

    pub async fn dispatch(&self, request: Dispatch) -> Result<DispatchOutcome, DispatchError> {
        let endpoint = request.endpoint;
        let month = current_month();
        let settings = AiSettings::get(&self.pool).await?;

        if let Err(e) = Self::check_budget(&settings, &month) {
            warn!(endpoint, "Generation rejected: {}", e);
            GenerationStage::ErrorReturned.log(endpoint);
            return Err(e);
        }

        let model = self.provider.build(&settings, request.api_key.as_deref())?;
        let completion_request = CompletionRequest::single(
            request.prompt,
            request.system,
            u32::try_from(settings.max_tokens).unwrap_or(u32::MAX),
        )
        .with_temperature(settings.temperature as f32);

        GenerationStage::ApiCalled.log(endpoint);
        let completion = match model.complete(completion_request).await {
            Ok(c) => c,
            Err(e) => {
                warn!(endpoint, model = model.model(), "Model call failed: {}", e);
                GenerationStage::ErrorReturned.log(endpoint);
                return Err(e.into());
            }
        };
        GenerationStage::ResponseReceived.log(endpoint);

        let estimated_cost =
            estimate_cost(&completion.model, completion.input_tokens, completion.output_tokens);
        let monthly_usage = AiUsage::record(
            &self.pool,
            &CreateAiUsage {
                endpoint: endpoint.to_string(),
                model: completion.model.clone(),
                input_tokens: i64::from(completion.input_tokens),
                output_tokens: i64::from(completion.output_tokens),
                estimated_cost,
            },
            &month,
        )
        .await?;

        info!(
            endpoint,
            model = %completion.model,
            tokens = completion.tokens_used(),
            estimated_cost,
            monthly_usage,
            "AI generation completed"
        );

        Ok(DispatchOutcome {
            completion,
            estimated_cost,
            monthly_usage,
        })
    }
}
