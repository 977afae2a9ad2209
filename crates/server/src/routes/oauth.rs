use axum::{
    Router,
    extract::{Path, State},
    response::Json as ResponseJson,
    routing::get,
};
use db::models::oauth::{
    CreateOAuthConnection, CreateOAuthService, OAuthConnection, OAuthService, UpdateOAuthService,
};
use deployment::Deployment;
use serde::Deserialize;
use services::services::oauth::{
    self, AccessToken, AuthorizeQuery, AuthorizeUrl, OAuthConnectionView, OAuthError,
};
use tracing::info;
use utils::response::ApiResponse;
use uuid::Uuid;

use super::require_http_url;
use crate::{DeploymentImpl, error::ApiError, extract::{JsonBody, QueryParams}};

#[derive(Debug, Deserialize)]
pub struct ConnectionsQuery {
    pub subscriber_id: Option<String>,
}

async fn load_service(deployment: &DeploymentImpl, id: Uuid) -> Result<OAuthService, ApiError> {
    Ok(OAuthService::find_by_id(&deployment.db().pool, id)
        .await?
        .ok_or(OAuthError::ServiceNotFound(id))?)
}

async fn load_connection(
    deployment: &DeploymentImpl,
    id: Uuid,
) -> Result<OAuthConnection, ApiError> {
    Ok(OAuthConnection::find_by_id(&deployment.db().pool, id)
        .await?
        .ok_or(OAuthError::ConnectionNotFound(id))?)
}

pub async fn list_services(
    State(deployment): State<DeploymentImpl>,
) -> Result<ResponseJson<ApiResponse<Vec<OAuthService>>>, ApiError> {
    let services = OAuthService::find_all(&deployment.db().pool).await?;
    Ok(ResponseJson(ApiResponse::success(services)))
}

pub async fn get_service(
    State(deployment): State<DeploymentImpl>,
    Path(id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<OAuthService>>, ApiError> {
    Ok(ResponseJson(ApiResponse::success(
        load_service(&deployment, id).await?,
    )))
}

pub async fn create_service(
    State(deployment): State<DeploymentImpl>,
    JsonBody(payload): JsonBody<CreateOAuthService>,
) -> Result<ResponseJson<ApiResponse<OAuthService>>, ApiError> {
    if payload.name.trim().is_empty() || payload.client_id.trim().is_empty() {
        return Err(ApiError::BadRequest(
            "name and client_id are required".to_string(),
        ));
    }
    require_http_url("authorization_url", &payload.authorization_url)?;
    require_http_url("token_url", &payload.token_url)?;

    let service = OAuthService::create(&deployment.db().pool, &payload, Uuid::new_v4()).await?;
    info!(service_id = %service.id, name = %service.name, "OAuth service created");
    Ok(ResponseJson(ApiResponse::success(service)))
}

pub async fn update_service(
    State(deployment): State<DeploymentImpl>,
    Path(id): Path<Uuid>,
    JsonBody(payload): JsonBody<UpdateOAuthService>,
) -> Result<ResponseJson<ApiResponse<OAuthService>>, ApiError> {
    if let Some(url) = &payload.authorization_url {
        require_http_url("authorization_url", url)?;
    }
    if let Some(url) = &payload.token_url {
        require_http_url("token_url", url)?;
    }
    let service = OAuthService::update(&deployment.db().pool, id, &payload)
        .await?
        .ok_or(OAuthError::ServiceNotFound(id))?;
    Ok(ResponseJson(ApiResponse::success(service)))
}

pub async fn delete_service(
    State(deployment): State<DeploymentImpl>,
    Path(id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<()>>, ApiError> {
    if OAuthService::delete(&deployment.db().pool, id).await? == 0 {
        return Err(OAuthError::ServiceNotFound(id).into());
    }
    info!(service_id = %id, "OAuth service deleted");
    Ok(ResponseJson(ApiResponse::success(())))
}

/// GET /api/oauth/services/{id}/authorize?subscriber_id=&redirect_uri=
pub async fn authorize(
    State(deployment): State<DeploymentImpl>,
    Path(id): Path<Uuid>,
    QueryParams(query): QueryParams<AuthorizeQuery>,
) -> Result<ResponseJson<ApiResponse<AuthorizeUrl>>, ApiError> {
    let service = load_service(&deployment, id).await?;
    let url = oauth::authorization_url(&service, &query)?;
    Ok(ResponseJson(ApiResponse::success(url)))
}

pub async fn list_connections(
    State(deployment): State<DeploymentImpl>,
    QueryParams(query): QueryParams<ConnectionsQuery>,
) -> Result<ResponseJson<ApiResponse<Vec<OAuthConnectionView>>>, ApiError> {
    let connections =
        OAuthConnection::find_all(&deployment.db().pool, query.subscriber_id.as_deref()).await?;
    Ok(ResponseJson(ApiResponse::success(
        connections.iter().map(OAuthConnectionView::from).collect(),
    )))
}

pub async fn get_connection(
    State(deployment): State<DeploymentImpl>,
    Path(id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<OAuthConnectionView>>, ApiError> {
    let connection = load_connection(&deployment, id).await?;
    Ok(ResponseJson(ApiResponse::success((&connection).into())))
}

pub async fn create_connection(
    State(deployment): State<DeploymentImpl>,
    JsonBody(payload): JsonBody<CreateOAuthConnection>,
) -> Result<ResponseJson<ApiResponse<OAuthConnectionView>>, ApiError> {
    if payload.subscriber_id.trim().is_empty() || payload.access_token.trim().is_empty() {
        return Err(ApiError::BadRequest(
            "subscriber_id and access_token are required".to_string(),
        ));
    }
    let connection = oauth::create_connection(&deployment.db().pool, &payload).await?;
    Ok(ResponseJson(ApiResponse::success((&connection).into())))
}

/// GET /api/oauth/connections/{id}/token
/// The unmasked access token; 410 once it has expired
pub async fn get_access_token(
    State(deployment): State<DeploymentImpl>,
    Path(id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<AccessToken>>, ApiError> {
    let connection = load_connection(&deployment, id).await?;
    let token = oauth::access_token_at(&connection, chrono::Utc::now())?;
    Ok(ResponseJson(ApiResponse::success(token)))
}

pub async fn delete_connection(
    State(deployment): State<DeploymentImpl>,
    Path(id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<()>>, ApiError> {
    if OAuthConnection::delete(&deployment.db().pool, id).await? == 0 {
        return Err(OAuthError::ConnectionNotFound(id).into());
    }
    Ok(ResponseJson(ApiResponse::success(())))
}

pub fn router(_deployment: &DeploymentImpl) -> Router<DeploymentImpl> {
    Router::new().nest(
        "/oauth",
        Router::new()
            .route("/services", get(list_services).post(create_service))
            .route(
                "/services/{id}",
                get(get_service).put(update_service).delete(delete_service),
            )
            .route("/services/{id}/authorize", get(authorize))
            .route(
                "/connections",
                get(list_connections).post(create_connection),
            )
            .route(
                "/connections/{id}",
                get(get_connection).delete(delete_connection),
            )
            .route("/connections/{id}/token", get(get_access_token)),
    )
}

#[cfg(test)]
mod tests {
    use axum::http::{Method, StatusCode};
    use chrono::{Duration, Utc};
    use serde_json::{Value, json};
    use uuid::Uuid;

    use crate::{
        DeploymentImpl,
        routes::test_support::{deployment, send},
    };

    async fn create_google(deployment: &DeploymentImpl) -> String {
        let (status, body) = send(
            deployment,
            Method::POST,
            "/api/oauth/services",
            Some(json!({
                "name": "google",
                "display_name": "Google",
                "authorization_url": "https://accounts.google.com/o/oauth2/v2/auth",
                "token_url": "https://oauth2.googleapis.com/token",
                "scopes": ["openid", "email"],
                "client_id": "client-123",
                "client_secret": "very-secret"
            })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"].get("client_secret"), None);
        body["data"]["id"].as_str().unwrap().to_string()
    }

    #[tokio::test]
    async fn test_authorize_url() {
        let (deployment, _) = deployment("").await;
        let id = create_google(&deployment).await;

        let (status, body) = send(
            &deployment,
            Method::GET,
            &format!(
                "/api/oauth/services/{id}/authorize?subscriber_id=sub-1&redirect_uri=https%3A%2F%2Fapp.example.com%2Fcb"
            ),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let url = body["data"]["url"].as_str().unwrap();
        assert!(url.starts_with("https://accounts.google.com/o/oauth2/v2/auth?"));
        assert!(url.contains("response_type=code"));
        assert!(url.contains("client_id=client-123"));
        assert_ne!(body["data"]["state"], Value::Null);
    }

    #[tokio::test]
    async fn test_connections_mask_and_expire() {
        let (deployment, _) = deployment("").await;

        let (status, _) = send(
            &deployment,
            Method::POST,
            "/api/oauth/connections",
            Some(json!({
                "service_id": Uuid::new_v4(),
                "subscriber_id": "sub-1",
                "access_token": "token"
            })),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let service_id = create_google(&deployment).await;
        let (status, body) = send(
            &deployment,
            Method::POST,
            "/api/oauth/connections",
            Some(json!({
                "service_id": service_id,
                "subscriber_id": "sub-1",
                "access_token": "ya29.a0AfH6SMBverylongtoken",
                "expires_at": Utc::now() - Duration::minutes(5)
            })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["access_token"], "********oken");
        assert_eq!(body["data"]["expired"], true);
        let id = body["data"]["id"].as_str().unwrap().to_string();

        let (status, _) = send(
            &deployment,
            Method::GET,
            &format!("/api/oauth/connections/{id}/token"),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::GONE);

        let (_, body) = send(
            &deployment,
            Method::GET,
            "/api/oauth/connections?subscriber_id=sub-1",
            None,
        )
        .await;
        assert_eq!(body["data"].as_array().map(Vec::len), Some(1));

        let (status, _) = send(
            &deployment,
            Method::DELETE,
            &format!("/api/oauth/connections/{id}"),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
    }
}
