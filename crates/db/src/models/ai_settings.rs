use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{Executor, FromRow, Sqlite, SqlitePool};
use ts_rs::TS;

/// Settings for AI generation, stored as the single row of `ai_settings`
#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
pub struct AiSettings {
    #[serde(skip_serializing)]
    #[ts(skip)]
    pub api_key: Option<String>,
    pub model: String,
    pub max_tokens: i64,
    pub temperature: f64,
    pub cost_limit_monthly: f64,
    pub current_month_usage: f64,
    pub usage_month: String, // YYYY-MM
    pub max_retries: i64,
    pub updated_at: DateTime<Utc>,
}

impl AiSettings {
    /// Usage counted against the limit for `month`; a stale month counts as zero.
    pub fn usage_for_month(&self, month: &str) -> f64 {
        if self.usage_month == month {
            self.current_month_usage
        } else {
            0.0
        }
    }

    pub fn is_over_budget(&self, month: &str) -> bool {
        self.usage_for_month(month) >= self.cost_limit_monthly
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
pub struct UpdateAiSettings {
    pub api_key: Option<String>,
    pub model: Option<String>,
    pub max_tokens: Option<i64>,
    pub temperature: Option<f64>,
    pub cost_limit_monthly: Option<f64>,
    pub max_retries: Option<i64>,
}

const SETTINGS_COLUMNS: &str = "api_key, model, max_tokens, temperature, cost_limit_monthly, \
                                current_month_usage, usage_month, max_retries, updated_at";

impl AiSettings {
    pub async fn get(pool: &SqlitePool) -> Result<Self, sqlx::Error> {
        // Row 1 is seeded by the initial migration; re-create it if someone deleted it.
        sqlx::query("INSERT OR IGNORE INTO ai_settings (id) VALUES (1)")
            .execute(pool)
            .await?;

        sqlx::query_as::<_, AiSettings>(&format!(
            "SELECT {SETTINGS_COLUMNS} FROM ai_settings WHERE id = 1"
        ))
        .fetch_one(pool)
        .await
    }

    pub async fn update(pool: &SqlitePool, data: &UpdateAiSettings) -> Result<Self, sqlx::Error> {
        let existing = Self::get(pool).await?;

        // An empty key clears the stored one.
        let api_key = match &data.api_key {
            Some(key) if key.trim().is_empty() => None,
            Some(key) => Some(key.trim().to_string()),
            None => existing.api_key,
        };

        sqlx::query_as::<_, AiSettings>(&format!(
            r#"UPDATE ai_settings
               SET api_key = $1, model = $2, max_tokens = $3, temperature = $4,
                   cost_limit_monthly = $5, max_retries = $6,
                   updated_at = datetime('now', 'subsec')
               WHERE id = 1
               RETURNING {SETTINGS_COLUMNS}"#
        ))
        .bind(api_key)
        .bind(data.model.as_ref().unwrap_or(&existing.model))
        .bind(data.max_tokens.unwrap_or(existing.max_tokens))
        .bind(data.temperature.unwrap_or(existing.temperature))
        .bind(data.cost_limit_monthly.unwrap_or(existing.cost_limit_monthly))
        .bind(data.max_retries.unwrap_or(existing.max_retries))
        .fetch_one(pool)
        .await
    }

    /// Add `cost` to the running total for `month`, resetting it when the month changed.
    /// Returns the new monthly total. Runs as one statement, so concurrent callers cannot
    /// lose updates.
    pub async fn add_month_usage<'e, E>(executor: E, month: &str, cost: f64) -> Result<f64, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        sqlx::query_scalar::<_, f64>(
            r#"UPDATE ai_settings
               SET current_month_usage = CASE WHEN usage_month = $1
                                              THEN current_month_usage + $2
                                              ELSE $2 END,
                   usage_month = $1,
                   updated_at = datetime('now', 'subsec')
               WHERE id = 1
               RETURNING current_month_usage"#,
        )
        .bind(month)
        .bind(cost)
        .fetch_one(executor)
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::DBService;

    #[tokio::test]
    async fn test_defaults_are_seeded() {
        let db = DBService::new_in_memory().await.unwrap();
        let settings = AiSettings::get(&db.pool).await.unwrap();
        assert!(settings.api_key.is_none());
        assert_eq!(settings.max_tokens, 8192);
        assert_eq!(settings.current_month_usage, 0.0);
    }

    #[tokio::test]
    async fn test_update_is_partial_and_blank_key_clears() {
        let db = DBService::new_in_memory().await.unwrap();
        let updated = AiSettings::update(
            &db.pool,
            &UpdateAiSettings {
                api_key: Some(" sk-ant-test ".to_string()),
                cost_limit_monthly: Some(5.0),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        assert_eq!(updated.api_key.as_deref(), Some("sk-ant-test"));
        assert_eq!(updated.cost_limit_monthly, 5.0);
        assert_eq!(updated.max_tokens, 8192);

        let cleared = AiSettings::update(
            &db.pool,
            &UpdateAiSettings {
                api_key: Some(String::new()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        assert!(cleared.api_key.is_none());
        assert_eq!(cleared.cost_limit_monthly, 5.0);
    }

    #[tokio::test]
    async fn test_month_usage_accumulates_and_rolls_over() {
        let db = DBService::new_in_memory().await.unwrap();
        assert_eq!(AiSettings::add_month_usage(&db.pool, "2026-01", 1.5).await.unwrap(), 1.5);
        assert_eq!(AiSettings::add_month_usage(&db.pool, "2026-01", 0.5).await.unwrap(), 2.0);
        assert_eq!(AiSettings::add_month_usage(&db.pool, "2026-02", 0.25).await.unwrap(), 0.25);

        let settings = AiSettings::get(&db.pool).await.unwrap();
        assert_eq!(settings.usage_month, "2026-02");
        assert_eq!(settings.usage_for_month("2026-02"), 0.25);
        assert_eq!(settings.usage_for_month("2026-03"), 0.0);
    }

    #[test]
    fn test_over_budget_boundary() {
        let settings = AiSettings {
            api_key: None,
            model: "claude-sonnet-4-20250514".to_string(),
            max_tokens: 1024,
            temperature: 0.7,
            cost_limit_monthly: 10.0,
            current_month_usage: 10.0,
            usage_month: "2026-05".to_string(),
            max_retries: 0,
            updated_at: Utc::now(),
        };
        assert!(settings.is_over_budget("2026-05"));
        assert!(!settings.is_over_budget("2026-06"));
    }
}
