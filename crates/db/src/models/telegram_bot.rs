use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool};
use strum_macros::{Display, EnumString};
use ts_rs::TS;
use uuid::Uuid;

/// When a notification for an event should go out
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, TS, EnumString, Display, Default)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum NotificationTiming {
    #[default]
    Immediate,
    Hourly,
    Daily,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, TS)]
pub struct EventNotification {
    pub enabled: bool,
    #[serde(default)]
    pub timing: NotificationTiming,
    /// Message with `{{variable}}` placeholders; a generic message is used when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template: Option<String>,
}

pub type NotificationSettings = BTreeMap<String, EventNotification>;

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
pub struct TelegramBot {
    pub id: Uuid,
    pub name: String,
    pub bot_token: String,
    pub chat_id: String,
    pub enabled: bool,
    pub notification_settings: String, // JSON-serialized NotificationSettings
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TelegramBot {
    pub fn parsed_settings(&self) -> NotificationSettings {
        serde_json::from_str(&self.notification_settings).unwrap_or_default()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct CreateTelegramBot {
    pub name: String,
    pub bot_token: String,
    pub chat_id: String,
    pub enabled: Option<bool>,
    #[serde(default)]
    pub notification_settings: NotificationSettings,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
pub struct UpdateTelegramBot {
    pub name: Option<String>,
    pub bot_token: Option<String>,
    pub chat_id: Option<String>,
    pub enabled: Option<bool>,
    pub notification_settings: Option<NotificationSettings>,
}

fn encode_settings(settings: &NotificationSettings) -> Result<String, sqlx::Error> {
    serde_json::to_string(settings).map_err(|e| sqlx::Error::Protocol(e.to_string()))
}

const BOT_COLUMNS: &str =
    "id, name, bot_token, chat_id, enabled, notification_settings, created_at, updated_at";

impl TelegramBot {
    pub async fn find_all(pool: &SqlitePool) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, TelegramBot>(&format!(
            "SELECT {BOT_COLUMNS} FROM telegram_bots ORDER BY name"
        ))
        .fetch_all(pool)
        .await
    }

    pub async fn find_by_id(pool: &SqlitePool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, TelegramBot>(&format!(
            "SELECT {BOT_COLUMNS} FROM telegram_bots WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(pool)
        .await
    }

    pub async fn find_by_name(pool: &SqlitePool, name: &str) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, TelegramBot>(&format!(
            "SELECT {BOT_COLUMNS} FROM telegram_bots WHERE name = $1"
        ))
        .bind(name)
        .fetch_optional(pool)
        .await
    }

    pub async fn create(
        pool: &SqlitePool,
        data: &CreateTelegramBot,
        id: Uuid,
    ) -> Result<Self, sqlx::Error> {
        let settings = encode_settings(&data.notification_settings)?;
        sqlx::query_as::<_, TelegramBot>(&format!(
            r#"INSERT INTO telegram_bots (id, name, bot_token, chat_id, enabled, notification_settings)
               VALUES ($1, $2, $3, $4, $5, $6)
               RETURNING {BOT_COLUMNS}"#
        ))
        .bind(id)
        .bind(&data.name)
        .bind(&data.bot_token)
        .bind(&data.chat_id)
        .bind(data.enabled.unwrap_or(true))
        .bind(settings)
        .fetch_one(pool)
        .await
    }

    pub async fn update(
        pool: &SqlitePool,
        id: Uuid,
        data: &UpdateTelegramBot,
    ) -> Result<Option<Self>, sqlx::Error> {
        let Some(existing) = Self::find_by_id(pool, id).await? else {
            return Ok(None);
        };

        let settings = match &data.notification_settings {
            Some(s) => encode_settings(s)?,
            None => existing.notification_settings.clone(),
        };

        sqlx::query_as::<_, TelegramBot>(&format!(
            r#"UPDATE telegram_bots
               SET name = $2, bot_token = $3, chat_id = $4, enabled = $5,
                   notification_settings = $6, updated_at = datetime('now', 'subsec')
               WHERE id = $1
               RETURNING {BOT_COLUMNS}"#
        ))
        .bind(id)
        .bind(data.name.as_ref().unwrap_or(&existing.name))
        .bind(data.bot_token.as_ref().unwrap_or(&existing.bot_token))
        .bind(data.chat_id.as_ref().unwrap_or(&existing.chat_id))
        .bind(data.enabled.unwrap_or(existing.enabled))
        .bind(settings)
        .fetch_optional(pool)
        .await
    }

    pub async fn delete(pool: &SqlitePool, id: Uuid) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM telegram_bots WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected())
    }
}
