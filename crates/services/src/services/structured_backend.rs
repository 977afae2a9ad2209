//! Generation of logic-page backend functions as a structured JSON envelope.

use std::fmt::Write as _;

use chrono::{DateTime, Utc};
use db::models::logic_page::{InputField, LogicPage};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use thiserror::Error;
use tracing::info;
use ts_rs::TS;
use uuid::Uuid;

use super::{
    dispatcher::{AiDispatcher, Dispatch, DispatchError, GenerationStage},
    response_parser::{ParseFailure, parse_json_envelope},
};

const ENDPOINT: &str = "generate-structured-backend";
const REQUIRED_KEYS: [&str; 3] = ["functionName", "code", "description"];

const SYSTEM_PROMPT: &str = "You write self-contained async JavaScript functions for a no-code \
SaaS builder. You answer with a single JSON object and nothing else.";

#[derive(Debug, Error)]
pub enum StructuredBackendError {
    #[error("prompt is required")]
    MissingPrompt,
    #[error("logic page {0} not found")]
    LogicPageNotFound(Uuid),
    #[error(transparent)]
    Parse(#[from] ParseFailure),
    #[error("response is missing required keys: {}", missing.join(", "))]
    MissingKeys {
        missing: Vec<String>,
        raw_response: String,
    },
    #[error(transparent)]
    Dispatch(#[from] DispatchError),
    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

impl StructuredBackendError {
    /// Completion text to hand back when the envelope could not be used
    pub fn raw_response(&self) -> Option<&str> {
        match self {
            Self::Parse(failure) => Some(&failure.raw_response),
            Self::MissingKeys { raw_response, .. } => Some(raw_response),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
pub struct GenerateStructuredBackendRequest {
    #[serde(default)]
    pub prompt: String,
    #[serde(default)]
    pub input_fields: Vec<InputField>,
    #[serde(default)]
    pub oauth_services: Vec<String>,
    /// Overrides the stored key for this request
    #[serde(default)]
    pub api_key: Option<String>,
    /// When set, the generated code is saved on this logic page
    #[serde(default)]
    pub logic_page_id: Option<Uuid>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, TS)]
#[serde(rename_all = "camelCase")]
pub struct StructuredCode {
    pub function_name: String,
    pub code: String,
    pub description: String,
    #[serde(default)]
    #[ts(type = "unknown")]
    pub input_schema: serde_json::Value,
    #[serde(default)]
    #[ts(type = "unknown")]
    pub output_schema: serde_json::Value,
}

#[derive(Debug, Clone, Serialize, TS)]
pub struct GenerationMetadata {
    pub model: String,
    pub tokens_used: u32,
    pub estimated_cost: f64,
    pub monthly_usage: f64,
    pub generated_at: DateTime<Utc>,
    pub logic_page_id: Option<Uuid>,
}

#[derive(Debug, Clone, Serialize, TS)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedBackend {
    pub structured_code: StructuredCode,
    pub metadata: GenerationMetadata,
}

/// Read the envelope, salvaging an embedded object, and check the required keys.
pub fn parse_structured_code(text: &str) -> Result<StructuredCode, StructuredBackendError> {
    let value: serde_json::Value = parse_json_envelope(text)?;

    let missing: Vec<String> = REQUIRED_KEYS
        .iter()
        .filter(|key| {
            value
                .get(**key)
                .and_then(|v| v.as_str())
                .is_none_or(|s| s.trim().is_empty())
        })
        .map(|key| key.to_string())
        .collect();
    if !missing.is_empty() {
        return Err(StructuredBackendError::MissingKeys {
            missing,
            raw_response: text.to_string(),
        });
    }

    serde_json::from_value(value).map_err(|e| {
        StructuredBackendError::Parse(ParseFailure {
            reason: e.to_string(),
            raw_response: text.to_string(),
        })
    })
}

pub fn build_prompt(request: &GenerateStructuredBackendRequest) -> String {
    let mut p = String::new();
    let _ = write!(p, "Write a backend function for this tool:\n{}\n", request.prompt.trim());

    if request.input_fields.is_empty() {
        p.push_str("\nThe function takes no user inputs.\n");
    } else {
        p.push_str("\n## Inputs (available as `inputs.<name>`)\n");
        for field in &request.input_fields {
            let _ = writeln!(
                p,
                "- {} ({}{}): {}",
                field.name,
                field.field_type,
                if field.required { ", required" } else { "" },
                field.label
            );
        }
    }

    if !request.oauth_services.is_empty() {
        p.push_str("\n## Connected OAuth services\n");
        p.push_str("Access tokens are available as `context.oauth[<service>].accessToken`:\n");
        for service in &request.oauth_services {
            let _ = writeln!(p, "- {service}");
        }
    }

    p.push_str(
        "\n## Output\nRespond with one JSON object with these keys:\n\
         - functionName: camelCase name of the function\n\
         - code: the full source of `async function <functionName>(inputs, context)` returning \
         a JSON-serialisable result\n\
         - description: one sentence describing what it does\n\
         - inputSchema: JSON Schema of `inputs`\n\
         - outputSchema: JSON Schema of the returned value\n",
    );
    p
}

#[derive(Clone)]
pub struct StructuredBackendGenerator {
    pool: SqlitePool,
    dispatcher: AiDispatcher,
}

impl StructuredBackendGenerator {
    pub fn new(pool: SqlitePool, dispatcher: AiDispatcher) -> Self {
        Self { pool, dispatcher }
    }

    pub async fn generate(
        &self,
        request: &GenerateStructuredBackendRequest,
    ) -> Result<GeneratedBackend, StructuredBackendError> {
        GenerationStage::Idle.log(ENDPOINT);
        if request.prompt.trim().is_empty() {
            return Err(StructuredBackendError::MissingPrompt);
        }
        if let Some(id) = request.logic_page_id {
            if LogicPage::find_by_id(&self.pool, id).await?.is_none() {
                return Err(StructuredBackendError::LogicPageNotFound(id));
            }
        }

        let prompt = build_prompt(request);
        GenerationStage::PromptBuilt.log(ENDPOINT);

        let outcome = self
            .dispatcher
            .dispatch(
                Dispatch::new(ENDPOINT, prompt)
                    .with_system(SYSTEM_PROMPT)
                    .with_api_key(request.api_key.clone()),
            )
            .await?;

        let structured_code = match parse_structured_code(&outcome.completion.text) {
            Ok(code) => code,
            Err(e) => {
                GenerationStage::ParseFailed.log(ENDPOINT);
                return Err(e);
            }
        };
        GenerationStage::Parsed.log(ENDPOINT);

        if let Some(id) = request.logic_page_id {
            LogicPage::save_backend_code(&self.pool, id, &structured_code.code)
                .await?
                .ok_or(StructuredBackendError::LogicPageNotFound(id))?;
            GenerationStage::Persisted.log(ENDPOINT);
        }

        info!(
            function_name = %structured_code.function_name,
            logic_page_id = ?request.logic_page_id,
            "Structured backend generated"
        );

        Ok(GeneratedBackend {
            structured_code,
            metadata: GenerationMetadata {
                model: outcome.completion.model.clone(),
                tokens_used: outcome.tokens_used(),
                estimated_cost: outcome.estimated_cost,
                monthly_usage: outcome.monthly_usage,
                generated_at: Utc::now(),
                logic_page_id: request.logic_page_id,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use db::{
        DBService,
        models::logic_page::{CreateLogicPage, LogicPageStatus},
    };

    use super::*;
    use crate::services::language_model::testing::{CannedModel, CannedProvider};

    const ENVELOPE: &str = r#"{"functionName": "convertCurrency", "code": "async function convertCurrency(inputs) { return { total: inputs.amount * 2 }; }", "description": "Doubles the amount", "inputSchema": {"type": "object"}, "outputSchema": {"type": "object"}}"#;

    fn request(prompt: &str) -> GenerateStructuredBackendRequest {
        GenerateStructuredBackendRequest {
            prompt: prompt.to_string(),
            input_fields: vec![InputField {
                name: "amount".to_string(),
                label: "Amount".to_string(),
                field_type: "number".to_string(),
                required: true,
                placeholder: None,
                options: None,
            }],
            oauth_services: vec!["google".to_string()],
            api_key: None,
            logic_page_id: None,
        }
    }

    #[test]
    fn test_malformed_json_with_embedded_block_is_salvaged() {
        let text = format!("Sure, here it is:\n{ENVELOPE}\nHope this helps!");
        let code = parse_structured_code(&text).unwrap();
        assert_eq!(code.function_name, "convertCurrency");
        assert_eq!(code.input_schema["type"], "object");
    }

    #[test]
    fn test_missing_required_keys_reported_with_raw_text() {
        let text = r#"{"functionName": "x", "code": ""}"#;
        match parse_structured_code(text).unwrap_err() {
            StructuredBackendError::MissingKeys {
                missing,
                raw_response,
            } => {
                assert_eq!(missing, vec!["code", "description"]);
                assert_eq!(raw_response, text);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_unparseable_text_keeps_raw_response() {
        let err = parse_structured_code("I'm sorry, I can't do that.").unwrap_err();
        assert_eq!(err.raw_response(), Some("I'm sorry, I can't do that."));
    }

    #[test]
    fn test_prompt_lists_inputs_and_services() {
        let prompt = build_prompt(&request("Convert currency"));
        assert!(prompt.contains("- amount (number, required): Amount"));
        assert!(prompt.contains("- google"));
        assert!(prompt.contains("functionName"));
    }

    #[tokio::test]
    async fn test_generated_code_saved_on_logic_page() {
        let db = DBService::new_in_memory().await.unwrap();
        let model = CannedModel::new(format!("```json\n{ENVELOPE}\n```"));
        let generator = StructuredBackendGenerator::new(
            db.pool.clone(),
            AiDispatcher::new(db.pool.clone(), Arc::new(CannedProvider(model.clone()))),
        );

        let page = LogicPage::create(
            &db.pool,
            &CreateLogicPage {
                title: "Converter".to_string(),
                slug: "converter".to_string(),
                description: None,
                inputs: vec![],
                backend_code: None,
                frontend_html: None,
                frontend_css: None,
                frontend_js: None,
            },
            Uuid::new_v4(),
        )
        .await
        .unwrap();

        let mut req = request("Convert currency");
        req.logic_page_id = Some(page.id);
        let generated = generator.generate(&req).await.unwrap();
        assert_eq!(generated.metadata.tokens_used, 1500);

        let reloaded = LogicPage::find_by_id(&db.pool, page.id).await.unwrap().unwrap();
        assert_eq!(reloaded.backend_code, generated.structured_code.code);
        assert_eq!(reloaded.status, LogicPageStatus::Building);

        req.logic_page_id = Some(Uuid::new_v4());
        assert!(matches!(
            generator.generate(&req).await,
            Err(StructuredBackendError::LogicPageNotFound(_))
        ));
        assert_eq!(model.calls(), 1);
    }
}
