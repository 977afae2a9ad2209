use std::{path::Path, sync::Arc};

use async_trait::async_trait;
use db::DBService;
use services::services::{
    ai_settings::import_legacy_settings,
    language_model::{ClaudeProvider, LanguageModelProvider},
    prompt_context::PromptContext,
};
use tracing::info;
use utils::{
    assets::{LEGACY_AI_SETTINGS_FILE, data_dir, database_path},
    text::current_month,
};

use crate::{Deployment, DeploymentError};

/// Single-process deployment backed by a SQLite file in the data directory.
#[derive(Clone)]
pub struct LocalDeployment {
    db: DBService,
    prompt_context: Arc<PromptContext>,
    language_models: Arc<dyn LanguageModelProvider>,
}

impl LocalDeployment {
    /// Load prompt context from `data_dir` and import legacy settings found there.
    pub async fn from_parts(db: DBService, data_dir: &Path) -> Result<Self, DeploymentError> {
        let prompt_context = PromptContext::load(data_dir).await?;
        info!(
            reserved_pages = prompt_context.rules.len(),
            "Prompt context loaded"
        );

        import_legacy_settings(
            &db.pool,
            &data_dir.join(LEGACY_AI_SETTINGS_FILE),
            &current_month(),
        )
        .await?;

        Ok(Self {
            db,
            prompt_context: Arc::new(prompt_context),
            language_models: Arc::new(ClaudeProvider),
        })
    }

    /// In-memory database with the embedded prompt defaults.
    pub async fn new_in_memory() -> Result<Self, DeploymentError> {
        Ok(Self {
            db: DBService::new_in_memory().await?,
            prompt_context: Arc::new(PromptContext::defaults()?),
            language_models: Arc::new(ClaudeProvider),
        })
    }

    /// Replace how model clients are built (tests, alternative providers).
    pub fn with_language_models(mut self, provider: Arc<dyn LanguageModelProvider>) -> Self {
        self.language_models = provider;
        self
    }
}

#[async_trait]
impl Deployment for LocalDeployment {
    async fn new() -> Result<Self, DeploymentError> {
        let db = DBService::new(&database_path()).await?;
        Self::from_parts(db, &data_dir()).await
    }

    fn db(&self) -> &DBService {
        &self.db
    }

    fn prompt_context(&self) -> &Arc<PromptContext> {
        &self.prompt_context
    }

    fn language_models(&self) -> &Arc<dyn LanguageModelProvider> {
        &self.language_models
    }
}
