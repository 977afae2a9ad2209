use std::collections::HashMap;

use axum::{
    Router,
    extract::{Path, State},
    response::Json as ResponseJson,
    routing::get,
};
use db::models::telegram_bot::{CreateTelegramBot, TelegramBot, UpdateTelegramBot};
use deployment::Deployment;
use services::services::telegram::{self, NotificationDecision, TelegramBotView};
use tracing::info;
use utils::response::ApiResponse;
use uuid::Uuid;

use crate::{DeploymentImpl, error::ApiError, extract::{JsonBody, QueryParams}};

fn not_found(id: Uuid) -> ApiError {
    ApiError::NotFound(format!("Telegram bot {id} not found"))
}

async fn load_bot(deployment: &DeploymentImpl, id: Uuid) -> Result<TelegramBot, ApiError> {
    TelegramBot::find_by_id(&deployment.db().pool, id)
        .await?
        .ok_or_else(|| not_found(id))
}

pub async fn list_bots(
    State(deployment): State<DeploymentImpl>,
) -> Result<ResponseJson<ApiResponse<Vec<TelegramBotView>>>, ApiError> {
    let bots = TelegramBot::find_all(&deployment.db().pool).await?;
    Ok(ResponseJson(ApiResponse::success(
        bots.iter().map(TelegramBotView::from).collect(),
    )))
}

pub async fn get_bot(
    State(deployment): State<DeploymentImpl>,
    Path(id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<TelegramBotView>>, ApiError> {
    let bot = load_bot(&deployment, id).await?;
    Ok(ResponseJson(ApiResponse::success((&bot).into())))
}

pub async fn create_bot(
    State(deployment): State<DeploymentImpl>,
    JsonBody(payload): JsonBody<CreateTelegramBot>,
) -> Result<ResponseJson<ApiResponse<TelegramBotView>>, ApiError> {
    if [&payload.name, &payload.bot_token, &payload.chat_id]
        .iter()
        .any(|v| v.trim().is_empty())
    {
        return Err(ApiError::BadRequest(
            "name, bot_token and chat_id are required".to_string(),
        ));
    }
    let bot = TelegramBot::create(&deployment.db().pool, &payload, Uuid::new_v4()).await?;
    info!(
        bot_id = %bot.id,
        name = %bot.name,
        events = payload.notification_settings.len(),
        "Telegram bot created"
    );
    Ok(ResponseJson(ApiResponse::success((&bot).into())))
}

pub async fn update_bot(
    State(deployment): State<DeploymentImpl>,
    Path(id): Path<Uuid>,
    JsonBody(payload): JsonBody<UpdateTelegramBot>,
) -> Result<ResponseJson<ApiResponse<TelegramBotView>>, ApiError> {
    let bot = TelegramBot::update(&deployment.db().pool, id, &payload)
        .await?
        .ok_or_else(|| not_found(id))?;
    Ok(ResponseJson(ApiResponse::success((&bot).into())))
}

pub async fn delete_bot(
    State(deployment): State<DeploymentImpl>,
    Path(id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<()>>, ApiError> {
    if TelegramBot::delete(&deployment.db().pool, id).await? == 0 {
        return Err(not_found(id));
    }
    Ok(ResponseJson(ApiResponse::success(())))
}

/// GET /api/telegram-bots/{id}/events/{event}?var=value
/// Whether and when the bot would notify, with the rendered message
pub async fn decide_notification(
    State(deployment): State<DeploymentImpl>,
    Path((id, event)): Path<(Uuid, String)>,
    QueryParams(variables): QueryParams<HashMap<String, String>>,
) -> Result<ResponseJson<ApiResponse<NotificationDecision>>, ApiError> {
    let bot = load_bot(&deployment, id).await?;
    Ok(ResponseJson(ApiResponse::success(telegram::decide(
        &bot, &event, &variables,
    ))))
}

pub fn router(_deployment: &DeploymentImpl) -> Router<DeploymentImpl> {
    Router::new().nest(
        "/telegram-bots",
        Router::new()
            .route("/", get(list_bots).post(create_bot))
            .route("/{id}", get(get_bot).put(update_bot).delete(delete_bot))
            .route("/{id}/events/{event}", get(decide_notification)),
    )
}

#[cfg(test)]
mod tests {
    use axum::http::{Method, StatusCode};
    use serde_json::{Value, json};

    use crate::routes::test_support::{deployment, send};

    #[tokio::test]
    async fn test_bot_masks_token_and_decides() {
        let (deployment, _) = deployment("").await;
        let (status, body) = send(
            &deployment,
            Method::POST,
            "/api/telegram-bots",
            Some(json!({
                "name": "ops",
                "bot_token": "123456:ABCdefGhIJKlmNoPQRsTUVwxyZ",
                "chat_id": "-1001",
                "notification_settings": {
                    "user.signup": {"enabled": true, "timing": "immediate",
                                    "template": "Welcome {{email}}"},
                    "invoice.paid": {"enabled": true, "timing": "daily"}
                }
            })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["bot_token"], "********wxyZ");
        let id = body["data"]["id"].as_str().unwrap().to_string();

        let (status, body) = send(
            &deployment,
            Method::GET,
            &format!("/api/telegram-bots/{id}/events/user.signup?email=a%40b.co"),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["notify"], true);
        assert_eq!(body["data"]["timing"], "immediate");
        assert_eq!(body["data"]["message"], "Welcome a@b.co");

        let (_, body) = send(
            &deployment,
            Method::GET,
            &format!("/api/telegram-bots/{id}/events/user.deleted"),
            None,
        )
        .await;
        assert_eq!(body["data"]["notify"], false);
        assert_ne!(body["data"]["reason"], Value::Null);
    }
}
