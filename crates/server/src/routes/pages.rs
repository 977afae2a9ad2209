use axum::{
    Router,
    extract::{Path, State},
    response::Json as ResponseJson,
    routing::{get, post},
};
use db::models::page::{CreatePage, Page, UpdatePage};
use deployment::Deployment;
use services::services::page_generator::{GeneratePageRequest, GeneratedPage};
use tracing::info;
use utils::{response::ApiResponse, text::is_valid_slug};
use uuid::Uuid;

use crate::{DeploymentImpl, error::ApiError, extract::JsonBody};

fn check_slug(slug: &str) -> Result<(), ApiError> {
    if is_valid_slug(slug) {
        Ok(())
    } else {
        Err(ApiError::BadRequest(format!(
            "Invalid slug '{slug}': use lowercase letters, digits and hyphens"
        )))
    }
}

async fn load_page(deployment: &DeploymentImpl, id: Uuid) -> Result<Page, ApiError> {
    Page::find_by_id(&deployment.db().pool, id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Page {id} not found")))
}

pub async fn list_pages(
    State(deployment): State<DeploymentImpl>,
) -> Result<ResponseJson<ApiResponse<Vec<Page>>>, ApiError> {
    let pages = Page::find_all(&deployment.db().pool).await?;
    Ok(ResponseJson(ApiResponse::success(pages)))
}

pub async fn get_page(
    State(deployment): State<DeploymentImpl>,
    Path(id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<Page>>, ApiError> {
    Ok(ResponseJson(ApiResponse::success(load_page(&deployment, id).await?)))
}

pub async fn get_page_by_slug(
    State(deployment): State<DeploymentImpl>,
    Path(slug): Path<String>,
) -> Result<ResponseJson<ApiResponse<Page>>, ApiError> {
    let page = Page::find_by_slug(&deployment.db().pool, &slug)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Page '{slug}' not found")))?;
    Ok(ResponseJson(ApiResponse::success(page)))
}

pub async fn create_page(
    State(deployment): State<DeploymentImpl>,
    JsonBody(payload): JsonBody<CreatePage>,
) -> Result<ResponseJson<ApiResponse<Page>>, ApiError> {
    if payload.title.trim().is_empty() {
        return Err(ApiError::BadRequest("title is required".to_string()));
    }
    check_slug(&payload.slug)?;

    let page = Page::create(&deployment.db().pool, &payload, Uuid::new_v4()).await?;
    info!(page_id = %page.id, slug = %page.slug, "Page created");
    Ok(ResponseJson(ApiResponse::success(page)))
}

pub async fn update_page(
    State(deployment): State<DeploymentImpl>,
    Path(id): Path<Uuid>,
    JsonBody(payload): JsonBody<UpdatePage>,
) -> Result<ResponseJson<ApiResponse<Page>>, ApiError> {
    if let Some(slug) = &payload.slug {
        check_slug(slug)?;
    }
    let page = Page::update(&deployment.db().pool, id, &payload)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Page {id} not found")))?;
    Ok(ResponseJson(ApiResponse::success(page)))
}

pub async fn delete_page(
    State(deployment): State<DeploymentImpl>,
    Path(id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<()>>, ApiError> {
    if Page::delete(&deployment.db().pool, id).await? == 0 {
        return Err(ApiError::NotFound(format!("Page {id} not found")));
    }
    info!(page_id = %id, "Page deleted");
    Ok(ResponseJson(ApiResponse::success(())))
}

/// POST /api/pages/{id}/generate
/// Regenerate the page's html/css/js from a prompt
pub async fn generate_page(
    State(deployment): State<DeploymentImpl>,
    Path(id): Path<Uuid>,
    JsonBody(payload): JsonBody<GeneratePageRequest>,
) -> Result<ResponseJson<ApiResponse<GeneratedPage>>, ApiError> {
    let generated = deployment.page_generator().generate(id, &payload).await?;
    Ok(ResponseJson(ApiResponse::success(generated)))
}

pub fn router(_deployment: &DeploymentImpl) -> Router<DeploymentImpl> {
    Router::new().nest(
        "/pages",
        Router::new()
            .route("/", get(list_pages).post(create_page))
            .route("/slug/{slug}", get(get_page_by_slug))
            .route("/{id}", get(get_page).put(update_page).delete(delete_page))
            .route("/{id}/generate", post(generate_page)),
    )
}
