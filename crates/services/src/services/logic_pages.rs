//! Logic page lifecycle: status transitions and execution logging.

use db::models::logic_page::{
    CreateLogicPageExecution, InputField, LogicPage, LogicPageExecution, LogicPageStatus,
};
use serde::Serialize;
use sqlx::SqlitePool;
use thiserror::Error;
use tracing::info;
use ts_rs::TS;
use uuid::Uuid;

/// Executions returned by the history endpoint
pub const EXECUTION_HISTORY_LIMIT: i64 = 50;

#[derive(Debug, Error)]
pub enum LogicPageError {
    #[error("logic page {0} not found")]
    NotFound(Uuid),
    #[error("cannot move a logic page from {from} to {to}")]
    InvalidTransition {
        from: LogicPageStatus,
        to: LogicPageStatus,
    },
    #[error("inputs must be a JSON object")]
    InputsNotObject,
    #[error("missing required inputs: {}", .0.join(", "))]
    MissingInputs(Vec<String>),
    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

/// Logic page with its input fields decoded
#[derive(Debug, Clone, Serialize, TS)]
pub struct LogicPageWithInputs {
    #[serde(flatten)]
    #[ts(flatten)]
    pub page: LogicPage,
    pub inputs: Vec<InputField>,
}

impl From<LogicPage> for LogicPageWithInputs {
    fn from(page: LogicPage) -> Self {
        let inputs = page.inputs();
        Self { page, inputs }
    }
}

/// Check `inputs` carries a non-empty value for every required field.
pub fn validate_inputs(fields: &[InputField], inputs: &serde_json::Value) -> Result<(), LogicPageError> {
    let object = inputs.as_object().ok_or(LogicPageError::InputsNotObject)?;
    let missing: Vec<String> = fields
        .iter()
        .filter(|field| field.required)
        .filter(|field| match object.get(&field.name) {
            None | Some(serde_json::Value::Null) => true,
            Some(serde_json::Value::String(s)) => s.trim().is_empty(),
            Some(serde_json::Value::Array(items)) => items.is_empty(),
            Some(_) => false,
        })
        .map(|field| field.name.clone())
        .collect();

    if missing.is_empty() {
        Ok(())
    } else {
        Err(LogicPageError::MissingInputs(missing))
    }
}

pub async fn transition(
    pool: &SqlitePool,
    id: Uuid,
    target: LogicPageStatus,
) -> Result<LogicPage, LogicPageError> {
    let page = LogicPage::find_by_id(pool, id)
        .await?
        .ok_or(LogicPageError::NotFound(id))?;
    if !page.status.can_transition_to(target) {
        return Err(LogicPageError::InvalidTransition {
            from: page.status,
            to: target,
        });
    }

    let updated = LogicPage::update_status(pool, id, target)
        .await?
        .ok_or(LogicPageError::NotFound(id))?;
    info!(logic_page_id = %id, from = %page.status, to = %target, "Logic page status changed");
    Ok(updated)
}

pub async fn record_execution(
    pool: &SqlitePool,
    id: Uuid,
    data: &CreateLogicPageExecution,
) -> Result<LogicPageExecution, LogicPageError> {
    let page = LogicPage::find_by_id(pool, id)
        .await?
        .ok_or(LogicPageError::NotFound(id))?;
    validate_inputs(&page.inputs(), &data.inputs)?;
    Ok(LogicPageExecution::create(pool, id, data).await?)
}

#[cfg(test)]
mod tests {
    use db::{DBService, models::logic_page::CreateLogicPage};
    use serde_json::json;

    use super::*;

    fn field(name: &str, required: bool) -> InputField {
        InputField {
            name: name.to_string(),
            label: name.to_uppercase(),
            field_type: "text".to_string(),
            required,
            placeholder: None,
            options: None,
        }
    }

    async fn create_page(db: &DBService) -> LogicPage {
        LogicPage::create(
            &db.pool,
            &CreateLogicPage {
                title: "BMI".to_string(),
                slug: "bmi".to_string(),
                description: None,
                inputs: vec![field("height", true), field("weight", true), field("note", false)],
                backend_code: None,
                frontend_html: None,
                frontend_css: None,
                frontend_js: None,
            },
            Uuid::new_v4(),
        )
        .await
        .unwrap()
    }

    #[test]
    fn test_validate_inputs_reports_missing_required() {
        let fields = vec![field("height", true), field("weight", true), field("note", false)];
        assert!(validate_inputs(&fields, &json!({"height": 180, "weight": "75"})).is_ok());

        match validate_inputs(&fields, &json!({"height": "  ", "note": "x"})) {
            Err(LogicPageError::MissingInputs(missing)) => assert_eq!(missing, vec!["height", "weight"]),
            other => panic!("unexpected result: {other:?}"),
        }
        assert!(matches!(
            validate_inputs(&fields, &json!([1, 2])),
            Err(LogicPageError::InputsNotObject)
        ));
    }

    #[tokio::test]
    async fn test_transitions_step_forward_or_back() {
        let db = DBService::new_in_memory().await.unwrap();
        let page = create_page(&db).await;

        assert!(matches!(
            transition(&db.pool, page.id, LogicPageStatus::Testing).await,
            Err(LogicPageError::InvalidTransition { .. })
        ));
        let building = transition(&db.pool, page.id, LogicPageStatus::Building).await.unwrap();
        assert_eq!(building.status, LogicPageStatus::Building);
        let draft = transition(&db.pool, page.id, LogicPageStatus::Draft).await.unwrap();
        assert_eq!(draft.status, LogicPageStatus::Draft);
    }

    #[tokio::test]
    async fn test_record_execution_validates_and_lists_newest_first() {
        let db = DBService::new_in_memory().await.unwrap();
        let page = create_page(&db).await;

        let err = record_execution(
            &db.pool,
            page.id,
            &CreateLogicPageExecution {
                inputs: json!({"height": 180}),
                output: None,
                error: None,
                duration_ms: 3,
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, LogicPageError::MissingInputs(_)));

        for bmi in [22.1, 23.4] {
            record_execution(
                &db.pool,
                page.id,
                &CreateLogicPageExecution {
                    inputs: json!({"height": 180, "weight": 75}),
                    output: Some(json!({"bmi": bmi})),
                    error: None,
                    duration_ms: 12,
                },
            )
            .await
            .unwrap();
        }

        let history = LogicPageExecution::find_by_logic_page_id(&db.pool, page.id, EXECUTION_HISTORY_LIMIT)
            .await
            .unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].output_json.as_deref(), Some(r#"{"bmi":23.4}"#));
    }

    #[test]
    fn test_view_includes_parsed_inputs() {
        let page = LogicPage {
            id: Uuid::new_v4(),
            title: "BMI".to_string(),
            slug: "bmi".to_string(),
            description: None,
            inputs_json: r#"[{"name":"height","label":"Height","type":"number","required":true}]"#
                .to_string(),
            backend_code: String::new(),
            frontend_html: String::new(),
            frontend_css: String::new(),
            frontend_js: String::new(),
            status: LogicPageStatus::Draft,
            created_at: chrono::Utc::now(),
            updated_at: chrono::Utc::now(),
        };
        let json = serde_json::to_value(LogicPageWithInputs::from(page)).unwrap();
        assert_eq!(json["slug"], "bmi");
        assert_eq!(json["inputs"][0]["type"], "number");
    }
}
