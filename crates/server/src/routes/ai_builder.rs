use axum::{
    Router,
    extract::State,
    response::Json as ResponseJson,
    routing::post,
};
use deployment::Deployment;
use services::services::{
    structured_backend::{GenerateStructuredBackendRequest, GeneratedBackend},
    ui_preview::{self, GenerateUiPreviewRequest, UiPreview},
};
use tracing::debug;

use super::Generated;
use crate::{DeploymentImpl, error::ApiError, extract::JsonBody};

/// POST /api/ai-builder/generate-structured-backend
pub async fn generate_structured_backend(
    State(deployment): State<DeploymentImpl>,
    JsonBody(payload): JsonBody<GenerateStructuredBackendRequest>,
) -> Result<ResponseJson<Generated<GeneratedBackend>>, ApiError> {
    let generated = deployment.structured_backend().generate(&payload).await?;
    Ok(ResponseJson(Generated::new(generated)))
}

/// POST /api/ai-builder/generate-ui-preview
/// Deterministic; no model call
pub async fn generate_ui_preview(
    JsonBody(payload): JsonBody<GenerateUiPreviewRequest>,
) -> Result<ResponseJson<Generated<UiPreview>>, ApiError> {
    let preview = ui_preview::generate_preview(&payload)?;
    debug!(
        preview_type = %preview.preview_type,
        components = payload.frontend_config.components.len(),
        "UI preview rendered"
    );
    Ok(ResponseJson(Generated::new(preview)))
}

pub fn router(_deployment: &DeploymentImpl) -> Router<DeploymentImpl> {
    Router::new().nest(
        "/ai-builder",
        Router::new()
            .route("/generate-structured-backend", post(generate_structured_backend))
            .route("/generate-ui-preview", post(generate_ui_preview)),
    )
}
