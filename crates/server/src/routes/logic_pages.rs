use axum::{
    Router,
    extract::{Path, State},
    response::Json as ResponseJson,
    routing::{get, put},
};
use db::models::logic_page::{
    CreateLogicPage, CreateLogicPageExecution, LogicPage, LogicPageExecution, LogicPageStatus,
    UpdateLogicPage,
};
use deployment::Deployment;
use serde::Deserialize;
use services::services::logic_pages::{
    self, EXECUTION_HISTORY_LIMIT, LogicPageError, LogicPageWithInputs,
};
use tracing::info;
use ts_rs::TS;
use utils::{response::ApiResponse, text::is_valid_slug};
use uuid::Uuid;

use crate::{DeploymentImpl, error::ApiError, extract::JsonBody};

#[derive(Debug, Deserialize, TS)]
pub struct UpdateLogicPageStatus {
    pub status: LogicPageStatus,
}

fn check_fields(title: Option<&str>, slug: Option<&str>) -> Result<(), ApiError> {
    if title.is_some_and(|t| t.trim().is_empty()) {
        return Err(ApiError::BadRequest("title is required".to_string()));
    }
    if let Some(slug) = slug.filter(|s| !is_valid_slug(s)) {
        return Err(ApiError::BadRequest(format!(
            "Invalid slug '{slug}': use lowercase letters, digits and hyphens"
        )));
    }
    Ok(())
}

async fn load_logic_page(deployment: &DeploymentImpl, id: Uuid) -> Result<LogicPage, ApiError> {
    Ok(LogicPage::find_by_id(&deployment.db().pool, id)
        .await?
        .ok_or(LogicPageError::NotFound(id))?)
}

pub async fn list_logic_pages(
    State(deployment): State<DeploymentImpl>,
) -> Result<ResponseJson<ApiResponse<Vec<LogicPageWithInputs>>>, ApiError> {
    let pages = LogicPage::find_all(&deployment.db().pool).await?;
    Ok(ResponseJson(ApiResponse::success(
        pages.into_iter().map(LogicPageWithInputs::from).collect(),
    )))
}

pub async fn get_logic_page(
    State(deployment): State<DeploymentImpl>,
    Path(id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<LogicPageWithInputs>>, ApiError> {
    let page = load_logic_page(&deployment, id).await?;
    Ok(ResponseJson(ApiResponse::success(page.into())))
}

pub async fn create_logic_page(
    State(deployment): State<DeploymentImpl>,
    JsonBody(payload): JsonBody<CreateLogicPage>,
) -> Result<ResponseJson<ApiResponse<LogicPageWithInputs>>, ApiError> {
    check_fields(Some(&payload.title), Some(&payload.slug))?;
    let page = LogicPage::create(&deployment.db().pool, &payload, Uuid::new_v4()).await?;
    info!(logic_page_id = %page.id, slug = %page.slug, inputs = payload.inputs.len(), "Logic page created");
    Ok(ResponseJson(ApiResponse::success(page.into())))
}

pub async fn update_logic_page(
    State(deployment): State<DeploymentImpl>,
    Path(id): Path<Uuid>,
    JsonBody(payload): JsonBody<UpdateLogicPage>,
) -> Result<ResponseJson<ApiResponse<LogicPageWithInputs>>, ApiError> {
    check_fields(payload.title.as_deref(), payload.slug.as_deref())?;
    let page = LogicPage::update(&deployment.db().pool, id, &payload)
        .await?
        .ok_or(LogicPageError::NotFound(id))?;
    Ok(ResponseJson(ApiResponse::success(page.into())))
}

pub async fn delete_logic_page(
    State(deployment): State<DeploymentImpl>,
    Path(id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<()>>, ApiError> {
    if LogicPage::delete(&deployment.db().pool, id).await? == 0 {
        return Err(LogicPageError::NotFound(id).into());
    }
    info!(logic_page_id = %id, "Logic page deleted");
    Ok(ResponseJson(ApiResponse::success(())))
}

/// PUT /api/logic-pages/{id}/status
pub async fn update_logic_page_status(
    State(deployment): State<DeploymentImpl>,
    Path(id): Path<Uuid>,
    JsonBody(payload): JsonBody<UpdateLogicPageStatus>,
) -> Result<ResponseJson<ApiResponse<LogicPageWithInputs>>, ApiError> {
    let page = logic_pages::transition(&deployment.db().pool, id, payload.status).await?;
    Ok(ResponseJson(ApiResponse::success(page.into())))
}

pub async fn list_executions(
    State(deployment): State<DeploymentImpl>,
    Path(id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<Vec<LogicPageExecution>>>, ApiError> {
    load_logic_page(&deployment, id).await?;
    let executions =
        LogicPageExecution::find_by_logic_page_id(&deployment.db().pool, id, EXECUTION_HISTORY_LIMIT)
            .await?;
    Ok(ResponseJson(ApiResponse::success(executions)))
}

pub async fn record_execution(
    State(deployment): State<DeploymentImpl>,
    Path(id): Path<Uuid>,
    JsonBody(payload): JsonBody<CreateLogicPageExecution>,
) -> Result<ResponseJson<ApiResponse<LogicPageExecution>>, ApiError> {
    let execution = logic_pages::record_execution(&deployment.db().pool, id, &payload).await?;
    Ok(ResponseJson(ApiResponse::success(execution)))
}

pub fn router(_deployment: &DeploymentImpl) -> Router<DeploymentImpl> {
    Router::new().nest(
        "/logic-pages",
        Router::new()
            .route("/", get(list_logic_pages).post(create_logic_page))
            .route(
                "/{id}",
                get(get_logic_page)
                    .put(update_logic_page)
                    .delete(delete_logic_page),
            )
            .route("/{id}/status", put(update_logic_page_status))
            .route(
                "/{id}/executions",
                get(list_executions).post(record_execution),
            ),
    )
}

#[cfg(test)]
mod tests {
    use axum::http::{Method, StatusCode};
    use serde_json::{Value, json};

    use crate::{
        DeploymentImpl,
        routes::test_support::{deployment, send},
    };

    async fn create_bmi(deployment: &DeploymentImpl) -> String {
        let (status, body) = send(
            deployment,
            Method::POST,
            "/api/logic-pages",
            Some(json!({
                "title": "BMI Calculator",
                "slug": "bmi",
                "inputs": [
                    {"name": "height", "label": "Height (cm)", "type": "number", "required": true},
                    {"name": "weight", "label": "Weight (kg)", "type": "number", "required": true}
                ]
            })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        body["data"]["id"].as_str().unwrap().to_string()
    }

    #[tokio::test]
    async fn test_inputs_round_trip_in_order() {
        let (deployment, _) = deployment("").await;
        let id = create_bmi(&deployment).await;

        let (status, body) =
            send(&deployment, Method::GET, &format!("/api/logic-pages/{id}"), None).await;
        assert_eq!(status, StatusCode::OK);
        let names: Vec<&str> = body["data"]["inputs"]
            .as_array()
            .unwrap()
            .iter()
            .map(|f| f["name"].as_str().unwrap())
            .collect();
        assert_eq!(names, vec!["height", "weight"]);
        assert_eq!(body["data"]["inputs"][0]["type"], "number");
        assert_eq!(body["data"]["status"], "draft");
    }

    #[tokio::test]
    async fn test_status_cannot_skip_forward() {
        let (deployment, _) = deployment("").await;
        let id = create_bmi(&deployment).await;
        let uri = format!("/api/logic-pages/{id}/status");

        let (status, _) = send(&deployment, Method::PUT, &uri, Some(json!({"status": "published"}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        let (status, body) =
            send(&deployment, Method::PUT, &uri, Some(json!({"status": "building"}))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["status"], "building");
    }

    #[tokio::test]
    async fn test_executions_validate_required_inputs() {
        let (deployment, _) = deployment("").await;
        let id = create_bmi(&deployment).await;
        let uri = format!("/api/logic-pages/{id}/executions");

        let (status, body) = send(
            &deployment,
            Method::POST,
            &uri,
            Some(json!({"inputs": {"height": 180}, "duration_ms": 4})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["missing_fields"], json!(["weight"]));

        let (status, _) = send(
            &deployment,
            Method::POST,
            &uri,
            Some(json!({"inputs": {"height": 180, "weight": 75}, "output": {"bmi": 23.1}, "duration_ms": 4})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let (_, body) = send(&deployment, Method::GET, &uri, None).await;
        assert_eq!(body["data"].as_array().map(Vec::len), Some(1));
        assert_ne!(body["data"][0]["output_json"], Value::Null);
    }
}
