use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool};
use ts_rs::TS;
use uuid::Uuid;

use super::ai_settings::AiSettings;

/// Number of usage records kept; older rows are pruned on insert.
pub const MAX_USAGE_RECORDS: i64 = 1000;

/// One AI generation call and what it cost
#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
pub struct AiUsage {
    pub id: Uuid,
    pub endpoint: String,
    pub model: String,
    pub input_tokens: i64,
    pub output_tokens: i64,
    pub estimated_cost: f64,
    pub created_at: DateTime<Utc>,
}

impl AiUsage {
    pub fn tokens_used(&self) -> i64 {
        self.input_tokens + self.output_tokens
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct CreateAiUsage {
    pub endpoint: String,
    pub model: String,
    pub input_tokens: i64,
    pub output_tokens: i64,
    pub estimated_cost: f64,
}

impl AiUsage {
    /// Append a usage record, prune beyond [`MAX_USAGE_RECORDS`] and bump the monthly total,
    /// all in one transaction. Returns the new monthly total.
    pub async fn record(
        pool: &SqlitePool,
        data: &CreateAiUsage,
        month: &str,
    ) -> Result<f64, sqlx::Error> {
        let mut tx = pool.begin().await?;

        sqlx::query(
            r#"INSERT INTO ai_usage (id, endpoint, model, input_tokens, output_tokens, estimated_cost)
               VALUES ($1, $2, $3, $4, $5, $6)"#,
        )
        .bind(Uuid::new_v4())
        .bind(&data.endpoint)
        .bind(&data.model)
        .bind(data.input_tokens)
        .bind(data.output_tokens)
        .bind(data.estimated_cost)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r#"DELETE FROM ai_usage
               WHERE rowid NOT IN (SELECT rowid FROM ai_usage ORDER BY rowid DESC LIMIT $1)"#,
        )
        .bind(MAX_USAGE_RECORDS)
        .execute(&mut *tx)
        .await?;

        let monthly_total = AiSettings::add_month_usage(&mut *tx, month, data.estimated_cost).await?;

        tx.commit().await?;
        Ok(monthly_total)
    }

    pub async fn find_recent(pool: &SqlitePool, limit: i64) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, AiUsage>(
            r#"SELECT id, endpoint, model, input_tokens, output_tokens, estimated_cost, created_at
               FROM ai_usage
               ORDER BY rowid DESC
               LIMIT $1"#,
        )
        .bind(limit)
        .fetch_all(pool)
        .await
    }

    pub async fn count(pool: &SqlitePool) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM ai_usage")
            .fetch_one(pool)
            .await
    }
}
