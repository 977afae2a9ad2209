use axum::{
    Router,
    extract::{Path, State},
    response::Json as ResponseJson,
    routing::{get, post},
};
use db::models::{
    ai_settings::{AiSettings, UpdateAiSettings},
    ai_usage::{AiUsage, MAX_USAGE_RECORDS},
    reserved_page::ReservedPageOverride,
};
use deployment::Deployment;
use serde::{Deserialize, Serialize};
use services::services::{
    ai_settings::{AiSettingsView, UsageSummary},
    reserved_page::{GenerateReservedPageRequest, GeneratedReservedPage, ReservedPageSummary},
};
use tracing::info;
use ts_rs::TS;
use utils::{response::ApiResponse, text::current_month};

use super::Generated;
use crate::{DeploymentImpl, error::ApiError, extract::{JsonBody, QueryParams}};

const DEFAULT_USAGE_LIMIT: i64 = 50;

#[derive(Debug, Deserialize)]
pub struct UsageQuery {
    pub limit: Option<i64>,
}

#[derive(Debug, Serialize, TS)]
pub struct UsageReport {
    pub summary: UsageSummary,
    pub total_records: i64,
    pub records: Vec<AiUsage>,
}

/// POST /api/ai/generate-reserved-page
pub async fn generate_reserved_page(
    State(deployment): State<DeploymentImpl>,
    JsonBody(payload): JsonBody<GenerateReservedPageRequest>,
) -> Result<ResponseJson<Generated<GeneratedReservedPage>>, ApiError> {
    let generated = deployment.reserved_pages().generate(&payload).await?;
    Ok(ResponseJson(Generated::new(generated)))
}

pub async fn list_reserved_pages(
    State(deployment): State<DeploymentImpl>,
) -> Result<ResponseJson<ApiResponse<Vec<ReservedPageSummary>>>, ApiError> {
    let pages = deployment.reserved_pages().list().await?;
    Ok(ResponseJson(ApiResponse::success(pages)))
}

pub async fn get_reserved_page(
    State(deployment): State<DeploymentImpl>,
    Path(page_type): Path<String>,
) -> Result<ResponseJson<ApiResponse<ReservedPageOverride>>, ApiError> {
    let saved = deployment.reserved_pages().get(&page_type).await?;
    Ok(ResponseJson(ApiResponse::success(saved)))
}

/// DELETE /api/ai/reserved-pages/{page_type}
/// Restore the built-in page
pub async fn reset_reserved_page(
    State(deployment): State<DeploymentImpl>,
    Path(page_type): Path<String>,
) -> Result<ResponseJson<ApiResponse<()>>, ApiError> {
    deployment.reserved_pages().reset(&page_type).await?;
    Ok(ResponseJson(ApiResponse::success(())))
}

pub async fn get_settings(
    State(deployment): State<DeploymentImpl>,
) -> Result<ResponseJson<ApiResponse<AiSettingsView>>, ApiError> {
    let settings = AiSettings::get(&deployment.db().pool).await?;
    Ok(ResponseJson(ApiResponse::success(AiSettingsView::new(
        &settings,
        &current_month(),
    ))))
}

fn validate_settings(update: &UpdateAiSettings) -> Result<(), ApiError> {
    let invalid = |msg: &str| Err(ApiError::BadRequest(msg.to_string()));
    if update.model.as_deref().is_some_and(|m| m.trim().is_empty()) {
        return invalid("model cannot be empty");
    }
    if update.max_tokens.is_some_and(|t| t <= 0) {
        return invalid("max_tokens must be positive");
    }
    if update.temperature.is_some_and(|t| !(0.0..=1.0).contains(&t)) {
        return invalid("temperature must be between 0 and 1");
    }
    if update.cost_limit_monthly.is_some_and(|c| c < 0.0 || !c.is_finite()) {
        return invalid("cost_limit_monthly must be a non-negative number");
    }
    if update.max_retries.is_some_and(|r| !(0..=10).contains(&r)) {
        return invalid("max_retries must be between 0 and 10");
    }
    Ok(())
}

pub async fn update_settings(
    State(deployment): State<DeploymentImpl>,
    JsonBody(payload): JsonBody<UpdateAiSettings>,
) -> Result<ResponseJson<ApiResponse<AiSettingsView>>, ApiError> {
    validate_settings(&payload)?;
    let settings = AiSettings::update(&deployment.db().pool, &payload).await?;
    info!(
        model = %settings.model,
        cost_limit_monthly = settings.cost_limit_monthly,
        api_key_changed = payload.api_key.is_some(),
        "AI settings updated"
    );
    Ok(ResponseJson(ApiResponse::success(AiSettingsView::new(
        &settings,
        &current_month(),
    ))))
}

/// GET /api/ai/usage?limit=
pub async fn get_usage(
    State(deployment): State<DeploymentImpl>,
    QueryParams(query): QueryParams<UsageQuery>,
) -> Result<ResponseJson<ApiResponse<UsageReport>>, ApiError> {
    let pool = &deployment.db().pool;
    let limit = query.limit.unwrap_or(DEFAULT_USAGE_LIMIT).clamp(1, MAX_USAGE_RECORDS);
    let settings = AiSettings::get(pool).await?;

    Ok(ResponseJson(ApiResponse::success(UsageReport {
        summary: UsageSummary::new(&settings, &current_month()),
        total_records: AiUsage::count(pool).await?,
        records: AiUsage::find_recent(pool, limit).await?,
    })))
}

pub fn router(_deployment: &DeploymentImpl) -> Router<DeploymentImpl> {
    Router::new().nest(
        "/ai",
        Router::new()
            .route("/generate-reserved-page", post(generate_reserved_page))
            .route("/reserved-pages", get(list_reserved_pages))
            .route(
                "/reserved-pages/{page_type}",
                get(get_reserved_page).delete(reset_reserved_page),
            )
            .route("/settings", get(get_settings).put(update_settings))
            .route("/usage", get(get_usage)),
    )
}
