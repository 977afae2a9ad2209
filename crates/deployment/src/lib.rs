use std::sync::Arc;

use async_trait::async_trait;
use db::DBService;
use services::services::{
    ai_settings::AiSettingsError,
    dispatcher::AiDispatcher,
    language_model::LanguageModelProvider,
    page_generator::PageGenerator,
    prompt_context::{PromptContext, PromptContextError},
    reserved_page::ReservedPageService,
    structured_backend::StructuredBackendGenerator,
};
use thiserror::Error;

mod local;

pub use local::LocalDeployment;

#[derive(Debug, Error)]
pub enum DeploymentError {
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
    #[error(transparent)]
    PromptContext(#[from] PromptContextError),
    #[error(transparent)]
    AiSettings(#[from] AiSettingsError),
}

#[async_trait]
pub trait Deployment: Clone + Send + Sync + 'static {
    async fn new() -> Result<Self, DeploymentError>;

    fn db(&self) -> &DBService;

    fn prompt_context(&self) -> &Arc<PromptContext>;

    fn language_models(&self) -> &Arc<dyn LanguageModelProvider>;

    fn dispatcher(&self) -> AiDispatcher {
        AiDispatcher::new(self.db().pool.clone(), self.language_models().clone())
    }

    fn reserved_pages(&self) -> ReservedPageService {
        ReservedPageService::new(
            self.db().pool.clone(),
            self.dispatcher(),
            self.prompt_context().clone(),
        )
    }

    fn structured_backend(&self) -> StructuredBackendGenerator {
        StructuredBackendGenerator::new(self.db().pool.clone(), self.dispatcher())
    }

    fn page_generator(&self) -> PageGenerator {
        PageGenerator::new(
            self.db().pool.clone(),
            self.dispatcher(),
            self.prompt_context().clone(),
        )
    }
}
