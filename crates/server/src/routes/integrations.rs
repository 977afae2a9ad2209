use axum::{
    Router,
    extract::{Path, State},
    response::Json as ResponseJson,
    routing::{get, post},
};
use db::models::integration::{CreateIntegration, Integration, UpdateIntegration};
use deployment::Deployment;
use services::services::webhook::{self, PreviewWebhookRequest, RenderedWebhook};
use tracing::info;
use utils::response::ApiResponse;
use uuid::Uuid;

use super::require_http_url;
use crate::{DeploymentImpl, error::ApiError, extract::JsonBody};

const METHODS: [&str; 5] = ["GET", "POST", "PUT", "PATCH", "DELETE"];

fn check_target(url: Option<&str>, method: Option<&str>) -> Result<(), ApiError> {
    if let Some(url) = url {
        require_http_url("url", url)?;
    }
    if let Some(method) = method.map(|m| m.trim().to_uppercase()) {
        if !method.is_empty() && !METHODS.contains(&method.as_str()) {
            return Err(ApiError::BadRequest(format!("Unsupported method '{method}'")));
        }
    }
    Ok(())
}

async fn load_integration(deployment: &DeploymentImpl, id: Uuid) -> Result<Integration, ApiError> {
    Integration::find_by_id(&deployment.db().pool, id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Integration {id} not found")))
}

pub async fn list_integrations(
    State(deployment): State<DeploymentImpl>,
) -> Result<ResponseJson<ApiResponse<Vec<Integration>>>, ApiError> {
    let integrations = Integration::find_all(&deployment.db().pool).await?;
    Ok(ResponseJson(ApiResponse::success(integrations)))
}

pub async fn get_integration(
    State(deployment): State<DeploymentImpl>,
    Path(id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<Integration>>, ApiError> {
    Ok(ResponseJson(ApiResponse::success(
        load_integration(&deployment, id).await?,
    )))
}

pub async fn create_integration(
    State(deployment): State<DeploymentImpl>,
    JsonBody(payload): JsonBody<CreateIntegration>,
) -> Result<ResponseJson<ApiResponse<Integration>>, ApiError> {
    if payload.name.trim().is_empty() {
        return Err(ApiError::BadRequest("name is required".to_string()));
    }
    check_target(Some(&payload.url), payload.method.as_deref())?;

    let integration = Integration::create(&deployment.db().pool, &payload, Uuid::new_v4()).await?;
    info!(
        integration_id = %integration.id,
        name = %integration.name,
        events = %integration.trigger_events,
        "Integration created"
    );
    Ok(ResponseJson(ApiResponse::success(integration)))
}

pub async fn update_integration(
    State(deployment): State<DeploymentImpl>,
    Path(id): Path<Uuid>,
    JsonBody(payload): JsonBody<UpdateIntegration>,
) -> Result<ResponseJson<ApiResponse<Integration>>, ApiError> {
    check_target(payload.url.as_deref(), payload.method.as_deref())?;
    let integration = Integration::update(&deployment.db().pool, id, &payload)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Integration {id} not found")))?;
    Ok(ResponseJson(ApiResponse::success(integration)))
}

pub async fn delete_integration(
    State(deployment): State<DeploymentImpl>,
    Path(id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<()>>, ApiError> {
    if Integration::delete(&deployment.db().pool, id).await? == 0 {
        return Err(ApiError::NotFound(format!("Integration {id} not found")));
    }
    Ok(ResponseJson(ApiResponse::success(())))
}

/// POST /api/integrations/{id}/preview
/// The request this integration would send for an event
pub async fn preview_integration(
    State(deployment): State<DeploymentImpl>,
    Path(id): Path<Uuid>,
    JsonBody(payload): JsonBody<PreviewWebhookRequest>,
) -> Result<ResponseJson<ApiResponse<RenderedWebhook>>, ApiError> {
    let integration = load_integration(&deployment, id).await?;
    let rendered = webhook::preview(&integration, &payload)?;
    Ok(ResponseJson(ApiResponse::success(rendered)))
}

pub async fn integrations_for_event(
    State(deployment): State<DeploymentImpl>,
    Path(event): Path<String>,
) -> Result<ResponseJson<ApiResponse<Vec<Integration>>>, ApiError> {
    let integrations = Integration::find_enabled_for_event(&deployment.db().pool, &event).await?;
    Ok(ResponseJson(ApiResponse::success(integrations)))
}

pub fn router(_deployment: &DeploymentImpl) -> Router<DeploymentImpl> {
    Router::new().nest(
        "/integrations",
        Router::new()
            .route("/", get(list_integrations).post(create_integration))
            .route("/events/{event}", get(integrations_for_event))
            .route(
                "/{id}",
                get(get_integration)
                    .put(update_integration)
                    .delete(delete_integration),
            )
            .route("/{id}/preview", post(preview_integration)),
    )
}
