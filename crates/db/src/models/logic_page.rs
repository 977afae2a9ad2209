use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool, Type};
use strum_macros::{Display, EnumString};
use ts_rs::TS;
use uuid::Uuid;

/// Lifecycle of a logic page: draft → building → testing → published
#[derive(
    Debug,
    Clone,
    Copy,
    Type,
    Serialize,
    Deserialize,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    TS,
    EnumString,
    Display,
    Default,
)]
#[sqlx(type_name = "logic_page_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum LogicPageStatus {
    #[default]
    Draft,
    Building,
    Testing,
    Published,
}

impl LogicPageStatus {
    pub fn next(self) -> Option<Self> {
        match self {
            Self::Draft => Some(Self::Building),
            Self::Building => Some(Self::Testing),
            Self::Testing => Some(Self::Published),
            Self::Published => None,
        }
    }

    /// One step forward, or back to any earlier stage.
    pub fn can_transition_to(self, target: Self) -> bool {
        target <= self || self.next() == Some(target)
    }
}

/// An input field rendered on the logic page and passed to its backend function
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
pub struct InputField {
    pub name: String,
    pub label: String,
    #[serde(rename = "type", alias = "field_type")]
    pub field_type: String,
    #[serde(default)]
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub placeholder: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<Vec<String>>,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
pub struct LogicPage {
    pub id: Uuid,
    pub title: String,
    pub slug: String,
    pub description: Option<String>,
    pub inputs_json: String, // JSON-serialized Vec<InputField>
    pub backend_code: String,
    pub frontend_html: String,
    pub frontend_css: String,
    pub frontend_js: String,
    pub status: LogicPageStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl LogicPage {
    /// Parse the inputs_json column. Malformed JSON yields an empty list.
    pub fn inputs(&self) -> Vec<InputField> {
        serde_json::from_str(&self.inputs_json).unwrap_or_default()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct CreateLogicPage {
    pub title: String,
    pub slug: String,
    pub description: Option<String>,
    #[serde(default)]
    pub inputs: Vec<InputField>,
    pub backend_code: Option<String>,
    pub frontend_html: Option<String>,
    pub frontend_css: Option<String>,
    pub frontend_js: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
pub struct UpdateLogicPage {
    pub title: Option<String>,
    pub slug: Option<String>,
    pub description: Option<String>,
    pub inputs: Option<Vec<InputField>>,
    pub backend_code: Option<String>,
    pub frontend_html: Option<String>,
    pub frontend_css: Option<String>,
    pub frontend_js: Option<String>,
}

/// One recorded invocation of a logic page's backend function
#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
pub struct LogicPageExecution {
    pub id: Uuid,
    pub logic_page_id: Uuid,
    pub inputs_json: String,
    pub output_json: Option<String>,
    pub error_message: Option<String>,
    pub duration_ms: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct CreateLogicPageExecution {
    pub inputs: serde_json::Value,
    pub output: Option<serde_json::Value>,
    pub error: Option<String>,
    #[serde(default)]
    pub duration_ms: i64,
}

const LOGIC_PAGE_COLUMNS: &str = "id, title, slug, description, inputs_json, backend_code, \
                                  frontend_html, frontend_css, frontend_js, status, \
                                  created_at, updated_at";

fn encode_inputs(inputs: &[InputField]) -> Result<String, sqlx::Error> {
    serde_json::to_string(inputs).map_err(|e| sqlx::Error::Protocol(e.to_string()))
}

impl LogicPage {
    pub async fn find_all(pool: &SqlitePool) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, LogicPage>(&format!(
            "SELECT {LOGIC_PAGE_COLUMNS} FROM logic_pages ORDER BY created_at DESC"
        ))
        .fetch_all(pool)
        .await
    }

    pub async fn find_by_id(pool: &SqlitePool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, LogicPage>(&format!(
            "SELECT {LOGIC_PAGE_COLUMNS} FROM logic_pages WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(pool)
        .await
    }

    pub async fn find_by_slug(pool: &SqlitePool, slug: &str) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, LogicPage>(&format!(
            "SELECT {LOGIC_PAGE_COLUMNS} FROM logic_pages WHERE slug = $1"
        ))
        .bind(slug)
        .fetch_optional(pool)
        .await
    }

    pub async fn create(
        pool: &SqlitePool,
        data: &CreateLogicPage,
        id: Uuid,
    ) -> Result<Self, sqlx::Error> {
        let inputs_json = encode_inputs(&data.inputs)?;
        sqlx::query_as::<_, LogicPage>(&format!(
            r#"INSERT INTO logic_pages
                   (id, title, slug, description, inputs_json, backend_code,
                    frontend_html, frontend_css, frontend_js)
               VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
               RETURNING {LOGIC_PAGE_COLUMNS}"#
        ))
        .bind(id)
        .bind(&data.title)
        .bind(&data.slug)
        .bind(&data.description)
        .bind(inputs_json)
        .bind(data.backend_code.as_deref().unwrap_or_default())
        .bind(data.frontend_html.as_deref().unwrap_or_default())
        .bind(data.frontend_css.as_deref().unwrap_or_default())
        .bind(data.frontend_js.as_deref().unwrap_or_default())
        .fetch_one(pool)
        .await
    }

    pub async fn update(
        pool: &SqlitePool,
        id: Uuid,
        data: &UpdateLogicPage,
    ) -> Result<Option<Self>, sqlx::Error> {
        let Some(existing) = Self::find_by_id(pool, id).await? else {
            return Ok(None);
        };

        let inputs_json = match &data.inputs {
            Some(inputs) => encode_inputs(inputs)?,
            None => existing.inputs_json.clone(),
        };

        sqlx::query_as::<_, LogicPage>(&format!(
            r#"UPDATE logic_pages
               SET title = $2, slug = $3, description = $4, inputs_json = $5,
                   backend_code = $6, frontend_html = $7, frontend_css = $8, frontend_js = $9,
                   updated_at = datetime('now', 'subsec')
               WHERE id = $1
               RETURNING {LOGIC_PAGE_COLUMNS}"#
        ))
        .bind(id)
        .bind(data.title.as_ref().unwrap_or(&existing.title))
        .bind(data.slug.as_ref().unwrap_or(&existing.slug))
        .bind(data.description.as_ref().or(existing.description.as_ref()))
        .bind(inputs_json)
        .bind(data.backend_code.as_ref().unwrap_or(&existing.backend_code))
        .bind(data.frontend_html.as_ref().unwrap_or(&existing.frontend_html))
        .bind(data.frontend_css.as_ref().unwrap_or(&existing.frontend_css))
        .bind(data.frontend_js.as_ref().unwrap_or(&existing.frontend_js))
        .fetch_optional(pool)
        .await
    }

    pub async fn update_status(
        pool: &SqlitePool,
        id: Uuid,
        status: LogicPageStatus,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, LogicPage>(&format!(
            r#"UPDATE logic_pages
               SET status = $2, updated_at = datetime('now', 'subsec')
               WHERE id = $1
               RETURNING {LOGIC_PAGE_COLUMNS}"#
        ))
        .bind(id)
        .bind(status)
        .fetch_optional(pool)
        .await
    }

    /// Store AI-generated backend code; a draft page moves to building.
    pub async fn save_backend_code(
        pool: &SqlitePool,
        id: Uuid,
        backend_code: &str,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, LogicPage>(&format!(
            r#"UPDATE logic_pages
               SET backend_code = $2,
                   status = CASE WHEN status = 'draft' THEN 'building' ELSE status END,
                   updated_at = datetime('now', 'subsec')
               WHERE id = $1
               RETURNING {LOGIC_PAGE_COLUMNS}"#
        ))
        .bind(id)
        .bind(backend_code)
        .fetch_optional(pool)
        .await
    }

    pub async fn delete(pool: &SqlitePool, id: Uuid) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM logic_pages WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected())
    }
}

impl LogicPageExecution {
    pub async fn create(
        pool: &SqlitePool,
        logic_page_id: Uuid,
        data: &CreateLogicPageExecution,
    ) -> Result<Self, sqlx::Error> {
        let inputs_json = data.inputs.to_string();
        let output_json = data.output.as_ref().map(|v| v.to_string());
        sqlx::query_as::<_, LogicPageExecution>(
            r#"INSERT INTO logic_page_executions
                   (id, logic_page_id, inputs_json, output_json, error_message, duration_ms)
               VALUES ($1, $2, $3, $4, $5, $6)
               RETURNING id, logic_page_id, inputs_json, output_json, error_message,
                         duration_ms, created_at"#,
        )
        .bind(Uuid::new_v4())
        .bind(logic_page_id)
        .bind(inputs_json)
        .bind(output_json)
        .bind(&data.error)
        .bind(data.duration_ms)
        .fetch_one(pool)
        .await
    }

    pub async fn find_by_logic_page_id(
        pool: &SqlitePool,
        logic_page_id: Uuid,
        limit: i64,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, LogicPageExecution>(
            r#"SELECT id, logic_page_id, inputs_json, output_json, error_message,
                      duration_ms, created_at
               FROM logic_page_executions
               WHERE logic_page_id = $1
               ORDER BY created_at DESC, rowid DESC
               LIMIT $2"#,
        )
        .bind(logic_page_id)
        .bind(limit)
        .fetch_all(pool)
        .await
    }
}
