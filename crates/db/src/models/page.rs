use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool, Type};
use strum_macros::{Display, EnumString};
use ts_rs::TS;
use uuid::Uuid;

/// Who may view a published page
#[derive(
    Debug, Clone, Copy, Type, Serialize, Deserialize, PartialEq, TS, EnumString, Display, Default,
)]
#[sqlx(type_name = "access_level", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum AccessLevel {
    #[default]
    Public,
    Subscribers,
    Admin,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
pub struct Page {
    pub id: Uuid,
    pub slug: String,
    pub title: String,
    pub html_content: String,
    pub css_content: String,
    pub js_content: String,
    pub is_published: bool,
    pub access_level: AccessLevel,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct CreatePage {
    pub slug: String,
    pub title: String,
    pub html_content: Option<String>,
    pub css_content: Option<String>,
    pub js_content: Option<String>,
    pub is_published: Option<bool>,
    pub access_level: Option<AccessLevel>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
pub struct UpdatePage {
    pub slug: Option<String>,
    pub title: Option<String>,
    pub html_content: Option<String>,
    pub css_content: Option<String>,
    pub js_content: Option<String>,
    pub is_published: Option<bool>,
    pub access_level: Option<AccessLevel>,
}

const PAGE_COLUMNS: &str = "id, slug, title, html_content, css_content, js_content, \
                            is_published, access_level, created_at, updated_at";

impl Page {
    pub async fn find_all(pool: &SqlitePool) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Page>(&format!(
            "SELECT {PAGE_COLUMNS} FROM pages ORDER BY created_at DESC"
        ))
        .fetch_all(pool)
        .await
    }

    pub async fn find_by_id(pool: &SqlitePool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Page>(&format!("SELECT {PAGE_COLUMNS} FROM pages WHERE id = $1"))
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    pub async fn find_by_slug(pool: &SqlitePool, slug: &str) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Page>(&format!("SELECT {PAGE_COLUMNS} FROM pages WHERE slug = $1"))
            .bind(slug)
            .fetch_optional(pool)
            .await
    }

    pub async fn create(pool: &SqlitePool, data: &CreatePage, id: Uuid) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, Page>(&format!(
            r#"INSERT INTO pages (id, slug, title, html_content, css_content, js_content, is_published, access_level)
               VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
               RETURNING {PAGE_COLUMNS}"#
        ))
        .bind(id)
        .bind(&data.slug)
        .bind(&data.title)
        .bind(data.html_content.as_deref().unwrap_or_default())
        .bind(data.css_content.as_deref().unwrap_or_default())
        .bind(data.js_content.as_deref().unwrap_or_default())
        .bind(data.is_published.unwrap_or(false))
        .bind(data.access_level.unwrap_or_default())
        .fetch_one(pool)
        .await
    }

    /// Apply the provided fields over the stored row. Returns `None` if the page is gone.
    pub async fn update(
        pool: &SqlitePool,
        id: Uuid,
        data: &UpdatePage,
    ) -> Result<Option<Self>, sqlx::Error> {
        let Some(existing) = Self::find_by_id(pool, id).await? else {
            return Ok(None);
        };

        sqlx::query_as::<_, Page>(&format!(
            r#"UPDATE pages
               SET slug = $2, title = $3, html_content = $4, css_content = $5, js_content = $6,
                   is_published = $7, access_level = $8, updated_at = datetime('now', 'subsec')
               WHERE id = $1
               RETURNING {PAGE_COLUMNS}"#
        ))
        .bind(id)
        .bind(data.slug.as_ref().unwrap_or(&existing.slug))
        .bind(data.title.as_ref().unwrap_or(&existing.title))
        .bind(data.html_content.as_ref().unwrap_or(&existing.html_content))
        .bind(data.css_content.as_ref().unwrap_or(&existing.css_content))
        .bind(data.js_content.as_ref().unwrap_or(&existing.js_content))
        .bind(data.is_published.unwrap_or(existing.is_published))
        .bind(data.access_level.unwrap_or(existing.access_level))
        .fetch_optional(pool)
        .await
    }

    /// Overwrite the generated content of a page (AI iteration). No history is kept.
    pub async fn update_content(
        pool: &SqlitePool,
        id: Uuid,
        html: &str,
        css: &str,
        js: &str,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Page>(&format!(
            r#"UPDATE pages
               SET html_content = $2, css_content = $3, js_content = $4,
                   updated_at = datetime('now', 'subsec')
               WHERE id = $1
               RETURNING {PAGE_COLUMNS}"#
        ))
        .bind(id)
        .bind(html)
        .bind(css)
        .bind(js)
        .fetch_optional(pool)
        .await
    }

    pub async fn delete(pool: &SqlitePool, id: Uuid) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM pages WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{DBService, is_unique_violation};

    fn create_page(slug: &str) -> CreatePage {
        CreatePage {
            slug: slug.to_string(),
            title: "Pricing".to_string(),
            html_content: Some("<h1>Pricing</h1>".to_string()),
            css_content: None,
            js_content: None,
            is_published: None,
            access_level: None,
        }
    }

    #[tokio::test]
    async fn test_create_and_find_by_slug() {
        let db = DBService::new_in_memory().await.unwrap();
        let page = Page::create(&db.pool, &create_page("pricing"), Uuid::new_v4())
            .await
            .unwrap();

        assert_eq!(page.access_level, AccessLevel::Public);
        assert!(!page.is_published);

        let found = Page::find_by_slug(&db.pool, "pricing").await.unwrap().unwrap();
        assert_eq!(found.id, page.id);
        assert_eq!(found.html_content, "<h1>Pricing</h1>");
    }

    #[tokio::test]
    async fn test_duplicate_slug_is_rejected() {
        let db = DBService::new_in_memory().await.unwrap();
        Page::create(&db.pool, &create_page("pricing"), Uuid::new_v4())
            .await
            .unwrap();
        let err = Page::create(&db.pool, &create_page("pricing"), Uuid::new_v4())
            .await
            .unwrap_err();
        assert!(is_unique_violation(&err));
    }

    #[tokio::test]
    async fn test_partial_update_keeps_other_fields() {
        let db = DBService::new_in_memory().await.unwrap();
        let page = Page::create(&db.pool, &create_page("pricing"), Uuid::new_v4())
            .await
            .unwrap();

        let updated = Page::update(
            &db.pool,
            page.id,
            &UpdatePage {
                is_published: Some(true),
                access_level: Some(AccessLevel::Subscribers),
                ..Default::default()
            },
        )
        .await
        .unwrap()
        .unwrap();

        assert!(updated.is_published);
        assert_eq!(updated.access_level, AccessLevel::Subscribers);
        assert_eq!(updated.title, "Pricing");
        assert_eq!(updated.html_content, "<h1>Pricing</h1>");
    }

    #[tokio::test]
    async fn test_update_missing_page_returns_none() {
        let db = DBService::new_in_memory().await.unwrap();
        let result = Page::update(&db.pool, Uuid::new_v4(), &UpdatePage::default())
            .await
            .unwrap();
        assert!(result.is_none());
    }
}
