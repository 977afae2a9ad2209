//! AI generation of reserved pages (login, signup, dashboard, ...) under fixed rules.

use std::{fmt::Write as _, sync::Arc};

use chrono::{DateTime, Utc};
use db::models::reserved_page::ReservedPageOverride;
use regex::Regex;
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use strum_macros::{Display, EnumString};
use thiserror::Error;
use tracing::{info, warn};
use ts_rs::TS;

use super::{
    dispatcher::{AiDispatcher, Dispatch, DispatchError, GenerationStage},
    prompt_context::{AiContext, PromptContext, RequiredElement, ReservedPageRule},
    response_parser::extract_html,
};

const ENDPOINT: &str = "generate-reserved-page";

#[derive(Debug, Error)]
pub enum ReservedPageError {
    #[error("prompt is required")]
    MissingPrompt,
    #[error("Unknown reserved page type: {page_type}")]
    UnknownPageType {
        page_type: String,
        available_types: Vec<String>,
    },
    #[error("{0} requires existing HTML: pass context.current_html or generate the page first")]
    NothingToIterate(IterationType),
    #[error("model response contained no HTML")]
    EmptyResponse { raw_response: String },
    #[error("no saved override for {0}")]
    NotFound(String),
    #[error(transparent)]
    Dispatch(#[from] DispatchError),
    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, TS, Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum IterationType {
    #[default]
    New,
    Iterate,
    Styling,
}

#[derive(Debug, Clone, Deserialize, TS)]
pub struct GenerateReservedPageRequest {
    #[serde(rename = "pageType")]
    pub page_type: String,
    #[serde(default)]
    pub prompt: String,
    /// Free-form; `current_html` is used as the base for iterate/styling.
    #[serde(default)]
    #[ts(type = "Record<string, unknown> | null")]
    pub context: Option<serde_json::Value>,
    #[serde(default)]
    pub iteration_type: IterationType,
    #[serde(rename = "layoutAnalysis", default)]
    #[ts(type = "unknown")]
    pub layout_analysis: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, TS)]
pub struct GeneratedReservedPage {
    pub page_type: String,
    pub html_code: String,
    pub tokens_used: u32,
    pub estimated_cost: f64,
    pub monthly_usage: f64,
    pub iteration_type: IterationType,
    pub iterations: i64,
    /// Required selectors not found in the generated HTML
    pub missing_elements: Vec<String>,
}

#[derive(Debug, Clone, Serialize, TS)]
pub struct ReservedPageSummary {
    pub page_type: String,
    pub name: String,
    pub description: String,
    pub required_elements: Vec<RequiredElement>,
    pub has_override: bool,
    pub iterations: i64,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Clone)]
pub struct ReservedPageService {
    pool: SqlitePool,
    dispatcher: AiDispatcher,
    context: Arc<PromptContext>,
}

impl ReservedPageService {
    pub fn new(pool: SqlitePool, dispatcher: AiDispatcher, context: Arc<PromptContext>) -> Self {
        Self {
            pool,
            dispatcher,
            context,
        }
    }

    fn rule(&self, page_type: &str) -> Result<&ReservedPageRule, ReservedPageError> {
        self.context
            .rule(page_type)
            .ok_or_else(|| ReservedPageError::UnknownPageType {
                page_type: page_type.to_string(),
                available_types: self.context.available_types(),
            })
    }

    pub async fn generate(
        &self,
        request: &GenerateReservedPageRequest,
    ) -> Result<GeneratedReservedPage, ReservedPageError> {
        GenerationStage::Idle.log(ENDPOINT);
        let rule = self.rule(&request.page_type)?;
        if request.prompt.trim().is_empty() {
            return Err(ReservedPageError::MissingPrompt);
        }

        let current_html = match request.iteration_type {
            IterationType::New => None,
            kind => Some(self.current_html(request).await?.ok_or(ReservedPageError::NothingToIterate(kind))?),
        };

        let prompt = build_prompt(
            &request.page_type,
            rule,
            &self.context.context,
            request,
            current_html.as_deref(),
        );
        GenerationStage::PromptBuilt.log(ENDPOINT);

        let outcome = self.dispatcher.dispatch(Dispatch::new(ENDPOINT, prompt.clone())).await?;

        let html_code = extract_html(&outcome.completion.text);
        if html_code.is_empty() {
            GenerationStage::ParseFailed.log(ENDPOINT);
            return Err(ReservedPageError::EmptyResponse {
                raw_response: outcome.completion.text,
            });
        }
        GenerationStage::Parsed.log(ENDPOINT);

        let missing_elements = missing_elements(&html_code, &rule.required_elements);
        if !missing_elements.is_empty() {
            warn!(
                page_type = %request.page_type,
                missing = ?missing_elements,
                "Generated page is missing required elements"
            );
        }

        let saved = ReservedPageOverride::upsert(
            &self.pool,
            &request.page_type,
            &html_code,
            &request.prompt,
            &request.iteration_type.to_string(),
        )
        .await?;
        GenerationStage::Persisted.log(ENDPOINT);

        info!(
            page_type = %request.page_type,
            iteration_type = %request.iteration_type,
            iterations = saved.iterations,
            "Reserved page generated"
        );

        Ok(GeneratedReservedPage {
            page_type: request.page_type.clone(),
            html_code,
            tokens_used: outcome.tokens_used(),
            estimated_cost: outcome.estimated_cost,
            monthly_usage: outcome.monthly_usage,
            iteration_type: request.iteration_type,
            iterations: saved.iterations,
            missing_elements,
        })
    }

    /// HTML to iterate on: `context.current_html` when given, else the saved override.
    async fn current_html(
        &self,
        request: &GenerateReservedPageRequest,
    ) -> Result<Option<String>, ReservedPageError> {
        let from_context = request
            .context
            .as_ref()
            .and_then(|c| c.get("current_html"))
            .and_then(|v| v.as_str())
            .filter(|html| !html.trim().is_empty());
        if let Some(html) = from_context {
            return Ok(Some(html.to_string()));
        }
        Ok(ReservedPageOverride::find_by_page_type(&self.pool, &request.page_type)
            .await?
            .map(|o| o.html_code))
    }

    pub async fn list(&self) -> Result<Vec<ReservedPageSummary>, ReservedPageError> {
        let overrides = ReservedPageOverride::find_all(&self.pool).await?;
        Ok(self
            .context
            .rules
            .iter()
            .map(|(page_type, rule)| {
                let saved = overrides.iter().find(|o| &o.page_type == page_type);
                ReservedPageSummary {
                    page_type: page_type.clone(),
                    name: rule.name.clone(),
                    description: rule.description.clone(),
                    required_elements: rule.required_elements.clone(),
                    has_override: saved.is_some(),
                    iterations: saved.map_or(0, |o| o.iterations),
                    updated_at: saved.map(|o| o.updated_at),
                }
            })
            .collect())
    }

    pub async fn get(&self, page_type: &str) -> Result<ReservedPageOverride, ReservedPageError> {
        self.rule(page_type)?;
        ReservedPageOverride::find_by_page_type(&self.pool, page_type)
            .await?
            .ok_or_else(|| ReservedPageError::NotFound(page_type.to_string()))
    }

    /// Drop the saved override so the default page is served again.
    pub async fn reset(&self, page_type: &str) -> Result<(), ReservedPageError> {
        self.rule(page_type)?;
        if ReservedPageOverride::delete(&self.pool, page_type).await? == 0 {
            return Err(ReservedPageError::NotFound(page_type.to_string()));
        }
        info!(page_type, "Reserved page override removed");
        Ok(())
    }
}

pub fn build_prompt(
    page_type: &str,
    rule: &ReservedPageRule,
    context: &AiContext,
    request: &GenerateReservedPageRequest,
    current_html: Option<&str>,
) -> String {
    let mut p = String::new();
    let _ = writeln!(
        p,
        "You are generating the \"{}\" reserved page ({page_type}) of a SaaS application.",
        rule.name
    );
    if !rule.description.is_empty() {
        let _ = writeln!(p, "{}", rule.description);
    }

    let _ = write!(p, "\n## Request\n{}\n", request.prompt.trim());

    if !rule.required_elements.is_empty() {
        p.push_str("\n## Required elements (keep these selectors exactly)\n");
        for element in &rule.required_elements {
            let _ = writeln!(p, "- `{}`: {}", element.selector, element.description);
        }
    }

    if !context.routes.is_empty() {
        p.push_str("\n## Allowed routes (link only to these)\n");
        for (route, description) in &context.routes {
            let _ = writeln!(p, "- {route}: {description}");
        }
    }

    if !rule.api_endpoints.is_empty() || !context.api_endpoints.is_empty() {
        p.push_str("\n## Verified API endpoints (call only these)\n");
        for endpoint in &rule.api_endpoints {
            let _ = writeln!(p, "- {endpoint}");
        }
        for endpoint in &context.api_endpoints {
            let _ = writeln!(p, "- {} {}: {}", endpoint.method, endpoint.path, endpoint.description);
        }
    }

    if !rule.minimal_functionality.is_empty() {
        p.push_str("\n## Minimal functionality (must keep working)\n");
        for item in &rule.minimal_functionality {
            let _ = writeln!(p, "- {item}");
        }
    }

    if !context.global_rules.is_empty() {
        p.push_str("\n## Global rules\n");
        for item in &context.global_rules {
            let _ = writeln!(p, "- {item}");
        }
    }

    if let Some(layout) = request.layout_analysis.as_ref().filter(|v| !v.is_null()) {
        let layout = serde_json::to_string_pretty(layout).unwrap_or_default();
        let _ = write!(p, "\n## Layout analysis\n```json\n{layout}\n```\n");
    }

    let extra_context = request.context.as_ref().and_then(|c| c.as_object()).map(|obj| {
        obj.iter()
            .filter(|(k, _)| k.as_str() != "current_html")
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect::<serde_json::Map<_, _>>()
    });
    if let Some(extra) = extra_context.filter(|m| !m.is_empty()) {
        let extra = serde_json::to_string_pretty(&extra).unwrap_or_default();
        let _ = write!(p, "\n## Additional context\n```json\n{extra}\n```\n");
    }

    p.push_str("\n## Task\n");
    match (request.iteration_type, current_html) {
        (IterationType::Styling, Some(html)) => {
            let _ = write!(
                p,
                "Change ONLY the styling (CSS, classes, colors, spacing, typography) of the page \
                 below. Do not add, remove or reorder elements and do not change any script.\n\
                 ```html\n{html}\n```\n"
            );
        }
        (IterationType::Iterate, Some(html)) => {
            let _ = write!(
                p,
                "Modify the existing page below according to the request. Keep every required \
                 element and all minimal functionality.\n```html\n{html}\n```\n"
            );
        }
        _ => p.push_str("Create the page from scratch.\n"),
    }

    p.push_str(
        "\n## Output\nReturn only the complete HTML document starting with <!DOCTYPE html>. \
         No explanations.\n",
    );
    p
}

/// Selectors from `required` with no match in `html`. Understands `#id`, `.class`,
/// `[attr=value]` and bare tag names.
pub fn missing_elements(html: &str, required: &[RequiredElement]) -> Vec<String> {
    required
        .iter()
        .filter(|element| !selector_present(html, &element.selector))
        .map(|element| element.selector.clone())
        .collect()
}

fn selector_present(html: &str, selector: &str) -> bool {
    let selector = selector.trim();
    let pattern = if let Some(id) = selector.strip_prefix('#') {
        format!(r#"(?i)\bid\s*=\s*["']?{}(?:["'\s>/]|$)"#, regex::escape(id))
    } else if let Some(class) = selector.strip_prefix('.') {
        format!(
            r#"(?i)\bclass\s*=\s*["'](?:[^"']*\s)?{}(?:\s[^"']*)?["']"#,
            regex::escape(class)
        )
    } else if let Some(attr) = selector.strip_prefix('[').and_then(|s| s.strip_suffix(']')) {
        match attr.split_once('=') {
            Some((name, value)) => format!(
                r#"(?i)\b{}\s*=\s*["']?{}["']?"#,
                regex::escape(name.trim()),
                regex::escape(value.trim().trim_matches(|c| c == '"' || c == '\''))
            ),
            None => format!(r"(?i)\b{}\b", regex::escape(attr.trim())),
        }
    } else {
        format!(r"(?i)<{}\b", regex::escape(selector))
    };

    Regex::new(&pattern)
        .map(|re| re.is_match(html))
        .unwrap_or_else(|_| html.contains(selector))
}
