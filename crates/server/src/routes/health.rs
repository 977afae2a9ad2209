use axum::{Router, response::Json as ResponseJson, routing::get};
use utils::response::ApiResponse;

use crate::DeploymentImpl;

pub async fn health_check() -> ResponseJson<ApiResponse<String>> {
    ResponseJson(ApiResponse::success("ok".to_string()))
}

pub fn router(_deployment: &DeploymentImpl) -> Router<DeploymentImpl> {
    Router::new().route("/health", get(health_check))
}

#[cfg(test)]
mod tests {
    use axum::http::{Method, StatusCode};

    use crate::routes::test_support::{deployment, send};

    #[tokio::test]
    async fn test_health() {
        let (deployment, _) = deployment("").await;
        let (status, body) = send(&deployment, Method::GET, "/api/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        assert_eq!(body["data"], "ok");
    }
}
