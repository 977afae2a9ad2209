use axum::Router;
use serde::Serialize;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{DeploymentImpl, error::ApiError};

pub mod ai;
pub mod ai_builder;
pub mod health;
pub mod integrations;
pub mod logic_pages;
pub mod oauth;
pub mod pages;
pub mod telegram;

/// Flat success body of the generation endpoints: `{success: true, ...fields}`.
#[derive(Debug, Serialize)]
pub struct Generated<T> {
    success: bool,
    #[serde(flatten)]
    data: T,
}

impl<T> Generated<T> {
    pub fn new(data: T) -> Self {
        Self {
            success: true,
            data,
        }
    }
}

/// Reject values that are not absolute http(s) URLs.
pub(crate) fn require_http_url(field: &str, value: &str) -> Result<(), ApiError> {
    let value = value.trim();
    if value.starts_with("http://") || value.starts_with("https://") {
        Ok(())
    } else {
        Err(ApiError::BadRequest(format!(
            "{field} must start with http:// or https://"
        )))
    }
}

pub fn router(deployment: DeploymentImpl) -> Router {
    let api = Router::new()
        .merge(health::router(&deployment))
        .merge(pages::router(&deployment))
        .merge(logic_pages::router(&deployment))
        .merge(ai::router(&deployment))
        .merge(ai_builder::router(&deployment))
        .merge(integrations::router(&deployment))
        .merge(oauth::router(&deployment))
        .merge(telegram::router(&deployment));

    Router::new()
        .nest("/api", api)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(deployment)
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    };

    use async_trait::async_trait;
    use axum::{
        body::Body,
        http::{Method, Request, StatusCode},
    };
    use db::models::ai_settings::AiSettings;
    use http_body_util::BodyExt;
    use serde_json::Value;
    use services::services::{
        claude_api::ClaudeApiError,
        language_model::{Completion, CompletionRequest, LanguageModel, LanguageModelProvider},
    };
    use tower::ServiceExt;

    use crate::DeploymentImpl;

    /// Answers every prompt with the same text and counts the calls.
    pub struct StubModel {
        text: String,
        calls: AtomicUsize,
    }

    impl StubModel {
        pub fn new(text: &str) -> Arc<Self> {
            Arc::new(Self {
                text: text.to_string(),
                calls: AtomicUsize::new(0),
            })
        }

        pub fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl LanguageModel for StubModel {
        fn model(&self) -> &str {
            "claude-sonnet-4-20250514"
        }

        async fn complete(&self, _request: CompletionRequest) -> Result<Completion, ClaudeApiError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(Completion {
                text: self.text.clone(),
                model: self.model().to_string(),
                input_tokens: 1000,
                output_tokens: 500,
            })
        }
    }

    pub struct StubProvider(pub Arc<StubModel>);

    impl LanguageModelProvider for StubProvider {
        fn build(
            &self,
            _settings: &AiSettings,
            _api_key: Option<&str>,
        ) -> Result<Arc<dyn LanguageModel>, ClaudeApiError> {
            Ok(self.0.clone())
        }
    }

    /// In-memory deployment whose model always answers `text`.
    pub async fn deployment(text: &str) -> (DeploymentImpl, Arc<StubModel>) {
        let model = StubModel::new(text);
        let deployment = DeploymentImpl::new_in_memory()
            .await
            .unwrap()
            .with_language_models(Arc::new(StubProvider(model.clone())));
        (deployment, model)
    }

    pub async fn send(
        deployment: &DeploymentImpl,
        method: Method,
        uri: &str,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let request = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(body) => request
                .header("content-type", "application/json")
                .body(Body::from(body.to_string())),
            None => request.body(Body::empty()),
        }
        .unwrap();

        let response = super::router(deployment.clone()).oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, json)
    }
}
