use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool};
use ts_rs::TS;

/// AI-customised HTML replacing the built-in version of a reserved page
#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
pub struct ReservedPageOverride {
    pub page_type: String,
    pub html_code: String,
    pub prompt: String,
    pub iteration_type: String,
    pub iterations: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ReservedPageOverride {
    pub async fn find_all(pool: &SqlitePool) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, ReservedPageOverride>(
            r#"SELECT page_type, html_code, prompt, iteration_type, iterations, created_at, updated_at
               FROM reserved_page_overrides
               ORDER BY page_type"#,
        )
        .fetch_all(pool)
        .await
    }

    pub async fn find_by_page_type(
        pool: &SqlitePool,
        page_type: &str,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, ReservedPageOverride>(
            r#"SELECT page_type, html_code, prompt, iteration_type, iterations, created_at, updated_at
               FROM reserved_page_overrides
               WHERE page_type = $1"#,
        )
        .bind(page_type)
        .fetch_optional(pool)
        .await
    }

    /// Insert or overwrite the override; last write wins.
    pub async fn upsert(
        pool: &SqlitePool,
        page_type: &str,
        html_code: &str,
        prompt: &str,
        iteration_type: &str,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, ReservedPageOverride>(
            r#"INSERT INTO reserved_page_overrides (page_type, html_code, prompt, iteration_type)
               VALUES ($1, $2, $3, $4)
               ON CONFLICT(page_type) DO UPDATE SET
                   html_code = excluded.html_code,
                   prompt = excluded.prompt,
                   iteration_type = excluded.iteration_type,
                   iterations = reserved_page_overrides.iterations + 1,
                   updated_at = datetime('now', 'subsec')
               RETURNING page_type, html_code, prompt, iteration_type, iterations, created_at, updated_at"#,
        )
        .bind(page_type)
        .bind(html_code)
        .bind(prompt)
        .bind(iteration_type)
        .fetch_one(pool)
        .await
    }

    pub async fn delete(pool: &SqlitePool, page_type: &str) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM reserved_page_overrides WHERE page_type = $1")
            .bind(page_type)
            .execute(pool)
            .await?;
        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::DBService;

    #[tokio::test]
    async fn test_upsert_overwrites_and_counts_iterations() {
        let db = DBService::new_in_memory().await.unwrap();

        let first = ReservedPageOverride::upsert(&db.pool, "customer-login", "<form>v1</form>", "dark", "new")
            .await
            .unwrap();
        assert_eq!(first.iterations, 1);

        let second =
            ReservedPageOverride::upsert(&db.pool, "customer-login", "<form>v2</form>", "rounder", "iterate")
                .await
                .unwrap();
        assert_eq!(second.iterations, 2);
        assert_eq!(second.html_code, "<form>v2</form>");
        assert_eq!(second.iteration_type, "iterate");

        assert_eq!(ReservedPageOverride::find_all(&db.pool).await.unwrap().len(), 1);
        assert_eq!(
            ReservedPageOverride::delete(&db.pool, "customer-login").await.unwrap(),
            1
        );
    }
}
