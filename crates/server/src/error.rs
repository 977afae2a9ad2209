use axum::{
    Json,
    extract::rejection::{JsonRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::{Map, Value, json};
use services::services::{
    claude_api::ClaudeApiError, dispatcher::DispatchError, logic_pages::LogicPageError,
    oauth::OAuthError, page_generator::PageGeneratorError, reserved_page::ReservedPageError,
    structured_backend::StructuredBackendError, ui_preview::UiPreviewError,
    webhook::WebhookError,
};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Database(#[from] sqlx::Error),
    #[error(transparent)]
    Dispatch(#[from] DispatchError),
    #[error(transparent)]
    ReservedPage(#[from] ReservedPageError),
    #[error(transparent)]
    StructuredBackend(#[from] StructuredBackendError),
    #[error(transparent)]
    PageGenerator(#[from] PageGeneratorError),
    #[error(transparent)]
    UiPreview(#[from] UiPreviewError),
    #[error(transparent)]
    LogicPage(#[from] LogicPageError),
    #[error(transparent)]
    OAuth(#[from] OAuthError),
    #[error(transparent)]
    Webhook(#[from] WebhookError),
    #[error("Invalid request body: {}", .0.body_text())]
    InvalidBody(#[from] JsonRejection),
    #[error("Invalid query string: {}", .0.body_text())]
    InvalidQuery(#[from] QueryRejection),
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    NotFound(String),
}

/// Status, message and extra top-level fields of an error body
struct ErrorBody {
    status: StatusCode,
    message: String,
    extras: Map<String, Value>,
}

impl ErrorBody {
    fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            extras: Map::new(),
        }
    }

    fn with(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.extras.insert(key.to_string(), value.into());
        self
    }
}

fn database(err: &sqlx::Error) -> ErrorBody {
    if db::is_unique_violation(err) {
        return ErrorBody::new(StatusCode::CONFLICT, "A record with this slug or name already exists");
    }
    match err {
        sqlx::Error::RowNotFound => ErrorBody::new(StatusCode::NOT_FOUND, "Record not found"),
        other => {
            tracing::error!("Database error: {}", other);
            ErrorBody::new(StatusCode::INTERNAL_SERVER_ERROR, "Database error")
        }
    }
}

fn claude_api(err: &ClaudeApiError) -> ErrorBody {
    match err {
        ClaudeApiError::Http { status, body } => {
            let code = if (400..500).contains(status) {
                StatusCode::BAD_REQUEST
            } else {
                StatusCode::INTERNAL_SERVER_ERROR
            };
            ErrorBody::new(code, format!("Claude API request failed with status {status}"))
                .with("details", body.as_str())
        }
        ClaudeApiError::InvalidApiKey
        | ClaudeApiError::RateLimited
        | ClaudeApiError::MissingApiKey => {
            ErrorBody::new(StatusCode::BAD_REQUEST, "Claude API request rejected")
                .with("details", err.to_string())
        }
        ClaudeApiError::Transport(_) | ClaudeApiError::Timeout | ClaudeApiError::Serde(_) => {
            ErrorBody::new(StatusCode::INTERNAL_SERVER_ERROR, "Claude API request failed")
                .with("details", err.to_string())
        }
    }
}

fn dispatch(err: &DispatchError) -> ErrorBody {
    match err {
        DispatchError::CostLimitExceeded { usage, limit } => {
            ErrorBody::new(StatusCode::BAD_REQUEST, err.to_string())
                .with("current_month_usage", *usage)
                .with("cost_limit_monthly", *limit)
        }
        DispatchError::ClaudeApi(e) => claude_api(e),
        DispatchError::Database(e) => database(e),
    }
}

fn raw_response_failure(message: String, raw_response: &str) -> ErrorBody {
    ErrorBody::new(StatusCode::INTERNAL_SERVER_ERROR, message).with("raw_response", raw_response)
}

impl ApiError {
    fn body(&self) -> ErrorBody {
        let bad_request = || ErrorBody::new(StatusCode::BAD_REQUEST, self.to_string());
        let not_found = || ErrorBody::new(StatusCode::NOT_FOUND, self.to_string());

        match self {
            ApiError::Database(e) => database(e),
            ApiError::Dispatch(e) => dispatch(e),
            ApiError::ReservedPage(e) => match e {
                ReservedPageError::MissingPrompt | ReservedPageError::NothingToIterate(_) => {
                    bad_request()
                }
                ReservedPageError::UnknownPageType {
                    available_types, ..
                } => bad_request().with("availableTypes", available_types.clone()),
                ReservedPageError::EmptyResponse { raw_response } => {
                    raw_response_failure(e.to_string(), raw_response)
                }
                ReservedPageError::NotFound(_) => not_found(),
                ReservedPageError::Dispatch(e) => dispatch(e),
                ReservedPageError::Database(e) => database(e),
            },
            ApiError::StructuredBackend(e) => match e {
                StructuredBackendError::MissingPrompt => bad_request(),
                StructuredBackendError::LogicPageNotFound(_) => not_found(),
                StructuredBackendError::Parse(_) | StructuredBackendError::MissingKeys { .. } => {
                    raw_response_failure(
                        format!("Failed to parse structured code: {e}"),
                        e.raw_response().unwrap_or_default(),
                    )
                }
                StructuredBackendError::Dispatch(e) => dispatch(e),
                StructuredBackendError::Database(e) => database(e),
            },
            ApiError::PageGenerator(e) => match e {
                PageGeneratorError::MissingPrompt => bad_request(),
                PageGeneratorError::PageNotFound(_) => not_found(),
                PageGeneratorError::Parse(failure) => raw_response_failure(
                    format!("Failed to parse page content: {}", failure.reason),
                    &failure.raw_response,
                ),
                PageGeneratorError::Dispatch(e) => dispatch(e),
                PageGeneratorError::Database(e) => database(e),
            },
            ApiError::UiPreview(_) => bad_request(),
            ApiError::LogicPage(e) => match e {
                LogicPageError::NotFound(_) => not_found(),
                LogicPageError::InvalidTransition { .. } | LogicPageError::InputsNotObject => {
                    bad_request()
                }
                LogicPageError::MissingInputs(missing) => {
                    bad_request().with("missing_fields", missing.clone())
                }
                LogicPageError::Database(e) => database(e),
            },
            ApiError::OAuth(e) => match e {
                OAuthError::ServiceNotFound(_) | OAuthError::ConnectionNotFound(_) => not_found(),
                OAuthError::ServiceDisabled(_) | OAuthError::InvalidUrl(_) => bad_request(),
                OAuthError::TokenExpired(_) => ErrorBody::new(StatusCode::GONE, self.to_string()),
                OAuthError::Database(e) => database(e),
            },
            ApiError::Webhook(e) => match e {
                WebhookError::NotTriggered { .. } | WebhookError::Disabled { .. } => bad_request(),
                WebhookError::InvalidHeaders(_) => {
                    tracing::error!("Stored webhook headers are invalid: {}", e);
                    ErrorBody::new(StatusCode::INTERNAL_SERVER_ERROR, self.to_string())
                }
            },
            ApiError::InvalidBody(_) | ApiError::InvalidQuery(_) | ApiError::BadRequest(_) => {
                bad_request()
            }
            ApiError::NotFound(_) => not_found(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = self.body();
        if body.status.is_server_error() {
            tracing::warn!(status = %body.status, "Request failed: {}", self);
        }

        let mut payload = json!({ "success": false, "message": body.message });
        if let Value::Object(map) = &mut payload {
            map.extend(body.extras);
        }
        (body.status, Json(payload)).into_response()
    }
}
