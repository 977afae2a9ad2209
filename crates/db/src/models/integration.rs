use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool};
use ts_rs::TS;
use uuid::Uuid;

/// Outgoing webhook fired when one of its trigger events happens
#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
pub struct Integration {
    pub id: Uuid,
    pub name: String,
    pub url: String,
    pub method: String,
    pub headers_template: String, // JSON object, values may contain {{variable}}
    pub body_template: String,
    pub trigger_events: String, // comma-joined event names
    pub enabled: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Integration {
    pub fn events(&self) -> Vec<String> {
        self.trigger_events
            .split(',')
            .map(str::trim)
            .filter(|e| !e.is_empty())
            .map(str::to_string)
            .collect()
    }

    pub fn listens_for(&self, event: &str) -> bool {
        self.events().iter().any(|e| e == event)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct CreateIntegration {
    pub name: String,
    pub url: String,
    pub method: Option<String>,
    #[serde(default)]
    #[ts(type = "Record<string, string>")]
    pub headers: serde_json::Map<String, serde_json::Value>,
    pub body_template: Option<String>,
    #[serde(default)]
    pub trigger_events: Vec<String>,
    pub enabled: Option<bool>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
pub struct UpdateIntegration {
    pub name: Option<String>,
    pub url: Option<String>,
    pub method: Option<String>,
    #[ts(type = "Record<string, string> | null")]
    pub headers: Option<serde_json::Map<String, serde_json::Value>>,
    pub body_template: Option<String>,
    pub trigger_events: Option<Vec<String>>,
    pub enabled: Option<bool>,
}

fn join_events(events: &[String]) -> String {
    events
        .iter()
        .map(|e| e.trim())
        .filter(|e| !e.is_empty())
        .collect::<Vec<_>>()
        .join(",")
}

fn normalize_method(method: Option<&str>) -> String {
    method
        .map(|m| m.trim().to_uppercase())
        .filter(|m| !m.is_empty())
        .unwrap_or_else(|| "POST".to_string())
}

const INTEGRATION_COLUMNS: &str = "id, name, url, method, headers_template, body_template, \
                                   trigger_events, enabled, created_at, updated_at";

impl Integration {
    pub async fn find_all(pool: &SqlitePool) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Integration>(&format!(
            "SELECT {INTEGRATION_COLUMNS} FROM integrations ORDER BY name"
        ))
        .fetch_all(pool)
        .await
    }

    pub async fn find_by_id(pool: &SqlitePool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Integration>(&format!(
            "SELECT {INTEGRATION_COLUMNS} FROM integrations WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(pool)
        .await
    }

    pub async fn find_by_name(pool: &SqlitePool, name: &str) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Integration>(&format!(
            "SELECT {INTEGRATION_COLUMNS} FROM integrations WHERE name = $1"
        ))
        .bind(name)
        .fetch_optional(pool)
        .await
    }

    /// Enabled integrations whose trigger list contains `event`.
    pub async fn find_enabled_for_event(
        pool: &SqlitePool,
        event: &str,
    ) -> Result<Vec<Self>, sqlx::Error> {
        // LIKE narrows the scan; listens_for does the exact match.
        let candidates = sqlx::query_as::<_, Integration>(&format!(
            r#"SELECT {INTEGRATION_COLUMNS} FROM integrations
               WHERE enabled = 1 AND trigger_events LIKE '%' || $1 || '%'
               ORDER BY name"#
        ))
        .bind(event)
        .fetch_all(pool)
        .await?;

        Ok(candidates
            .into_iter()
            .filter(|integration| integration.listens_for(event))
            .collect())
    }

    pub async fn create(
        pool: &SqlitePool,
        data: &CreateIntegration,
        id: Uuid,
    ) -> Result<Self, sqlx::Error> {
        let headers = serde_json::Value::Object(data.headers.clone()).to_string();
        sqlx::query_as::<_, Integration>(&format!(
            r#"INSERT INTO integrations
                   (id, name, url, method, headers_template, body_template, trigger_events, enabled)
               VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
               RETURNING {INTEGRATION_COLUMNS}"#
        ))
        .bind(id)
        .bind(&data.name)
        .bind(&data.url)
        .bind(normalize_method(data.method.as_deref()))
        .bind(headers)
        .bind(data.body_template.as_deref().unwrap_or_default())
        .bind(join_events(&data.trigger_events))
        .bind(data.enabled.unwrap_or(true))
        .fetch_one(pool)
        .await
    }

    pub async fn update(
        pool: &SqlitePool,
        id: Uuid,
        data: &UpdateIntegration,
    ) -> Result<Option<Self>, sqlx::Error> {
        let Some(existing) = Self::find_by_id(pool, id).await? else {
            return Ok(None);
        };

        let method = match &data.method {
            Some(m) => normalize_method(Some(m)),
            None => existing.method.clone(),
        };
        let headers = match &data.headers {
            Some(h) => serde_json::Value::Object(h.clone()).to_string(),
            None => existing.headers_template.clone(),
        };
        let trigger_events = match &data.trigger_events {
            Some(events) => join_events(events),
            None => existing.trigger_events.clone(),
        };

        sqlx::query_as::<_, Integration>(&format!(
            r#"UPDATE integrations
               SET name = $2, url = $3, method = $4, headers_template = $5, body_template = $6,
                   trigger_events = $7, enabled = $8, updated_at = datetime('now', 'subsec')
               WHERE id = $1
               RETURNING {INTEGRATION_COLUMNS}"#
        ))
        .bind(id)
        .bind(data.name.as_ref().unwrap_or(&existing.name))
        .bind(data.url.as_ref().unwrap_or(&existing.url))
        .bind(method)
        .bind(headers)
        .bind(data.body_template.as_ref().unwrap_or(&existing.body_template))
        .bind(trigger_events)
        .bind(data.enabled.unwrap_or(existing.enabled))
        .fetch_optional(pool)
        .await
    }

    pub async fn delete(pool: &SqlitePool, id: Uuid) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM integrations WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::DBService;

    fn slack(events: &[&str]) -> CreateIntegration {
        CreateIntegration {
            name: "slack".to_string(),
            url: "https://hooks.example.com/{{workspace}}".to_string(),
            method: Some("post".to_string()),
            headers: serde_json::Map::new(),
            body_template: Some(r#"{"text": "New signup {{user.email}}"}"#.to_string()),
            trigger_events: events.iter().map(|e| e.to_string()).collect(),
            enabled: None,
        }
    }

    #[tokio::test]
    async fn test_trigger_events_are_comma_joined() {
        let db = DBService::new_in_memory().await.unwrap();
        let integration = Integration::create(
            &db.pool,
            &slack(&["user.signup", " subscription.created ", ""]),
            Uuid::new_v4(),
        )
        .await
        .unwrap();

        assert_eq!(integration.trigger_events, "user.signup,subscription.created");
        assert_eq!(integration.method, "POST");
        assert!(integration.listens_for("subscription.created"));
        assert!(!integration.listens_for("subscription"));
    }

    #[tokio::test]
    async fn test_find_enabled_for_event_matches_exact_names() {
        let db = DBService::new_in_memory().await.unwrap();
        let integration = Integration::create(&db.pool, &slack(&["user.signup.confirmed"]), Uuid::new_v4())
            .await
            .unwrap();

        assert!(Integration::find_enabled_for_event(&db.pool, "user.signup")
            .await
            .unwrap()
            .is_empty());
        assert_eq!(
            Integration::find_enabled_for_event(&db.pool, "user.signup.confirmed")
                .await
                .unwrap()
                .len(),
            1
        );

        Integration::update(
            &db.pool,
            integration.id,
            &UpdateIntegration {
                enabled: Some(false),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        assert!(Integration::find_enabled_for_event(&db.pool, "user.signup.confirmed")
            .await
            .unwrap()
            .is_empty());
    }
}
