//! AI iteration on custom pages: the model rewrites a page's HTML, CSS and JS.

use std::{fmt::Write as _, sync::Arc};

use db::models::page::Page;
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use thiserror::Error;
use tracing::info;
use ts_rs::TS;
use uuid::Uuid;

use super::{
    dispatcher::{AiDispatcher, Dispatch, DispatchError, GenerationStage},
    prompt_context::PromptContext,
    response_parser::{ParseFailure, parse_json_envelope},
};

const ENDPOINT: &str = "generate-page";

#[derive(Debug, Error)]
pub enum PageGeneratorError {
    #[error("prompt is required")]
    MissingPrompt,
    #[error("page {0} not found")]
    PageNotFound(Uuid),
    #[error(transparent)]
    Parse(#[from] ParseFailure),
    #[error(transparent)]
    Dispatch(#[from] DispatchError),
    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

#[derive(Debug, Clone, Deserialize, TS)]
pub struct GeneratePageRequest {
    #[serde(default)]
    pub prompt: String,
}

#[derive(Debug, Clone, Deserialize)]
struct PageContentEnvelope {
    html: String,
    #[serde(default)]
    css: String,
    #[serde(default)]
    js: String,
}

#[derive(Debug, Clone, Serialize, TS)]
pub struct GeneratedPage {
    pub page: Page,
    pub tokens_used: u32,
    pub estimated_cost: f64,
    pub monthly_usage: f64,
}

#[derive(Clone)]
pub struct PageGenerator {
    pool: SqlitePool,
    dispatcher: AiDispatcher,
    context: Arc<PromptContext>,
}

impl PageGenerator {
    pub fn new(pool: SqlitePool, dispatcher: AiDispatcher, context: Arc<PromptContext>) -> Self {
        Self {
            pool,
            dispatcher,
            context,
        }
    }

    pub async fn generate(
        &self,
        page_id: Uuid,
        request: &GeneratePageRequest,
    ) -> Result<GeneratedPage, PageGeneratorError> {
        GenerationStage::Idle.log(ENDPOINT);
        if request.prompt.trim().is_empty() {
            return Err(PageGeneratorError::MissingPrompt);
        }
        let page = Page::find_by_id(&self.pool, page_id)
            .await?
            .ok_or(PageGeneratorError::PageNotFound(page_id))?;

        let prompt = self.build_prompt(&page, &request.prompt);
        GenerationStage::PromptBuilt.log(ENDPOINT);

        let outcome = self.dispatcher.dispatch(Dispatch::new(ENDPOINT, prompt)).await?;

        let content: PageContentEnvelope = match parse_json_envelope(&outcome.completion.text) {
            Ok(content) => content,
            Err(e) => {
                GenerationStage::ParseFailed.log(ENDPOINT);
                return Err(e.into());
            }
        };
        GenerationStage::Parsed.log(ENDPOINT);

        // Last write wins; the page is not versioned.
        let page = Page::update_content(&self.pool, page_id, &content.html, &content.css, &content.js)
            .await?
            .ok_or(PageGeneratorError::PageNotFound(page_id))?;
        GenerationStage::Persisted.log(ENDPOINT);
        info!(page_id = %page_id, slug = %page.slug, "Page content regenerated");

        Ok(GeneratedPage {
            page,
            tokens_used: outcome.tokens_used(),
            estimated_cost: outcome.estimated_cost,
            monthly_usage: outcome.monthly_usage,
        })
    }

    fn build_prompt(&self, page: &Page, instructions: &str) -> String {
        let mut p = String::new();
        let _ = write!(
            p,
            "You are editing the page \"{}\" served at /p/{}.\n\n## Request\n{}\n",
            page.title,
            page.slug,
            instructions.trim()
        );

        if !page.html_content.trim().is_empty() {
            let _ = write!(
                p,
                "\n## Current content\n```html\n{}\n```\n```css\n{}\n```\n```js\n{}\n```\n",
                page.html_content, page.css_content, page.js_content
            );
        }

        let context = &self.context.context;
        if !context.routes.is_empty() {
            p.push_str("\n## Site routes\n");
            for (route, description) in &context.routes {
                let _ = writeln!(p, "- {route}: {description}");
            }
        }
        if !context.global_rules.is_empty() {
            p.push_str("\n## Rules\n");
            for rule in &context.global_rules {
                let _ = writeln!(p, "- {rule}");
            }
        }

        p.push_str(
            "\n## Output\nRespond with one JSON object {\"html\": ..., \"css\": ..., \"js\": ...}. \
             `html` is the body markup only; put styles in `css` and scripts in `js`.\n",
        );
        p
    }
}

#[cfg(test)]
mod tests {
    use db::{DBService, models::page::CreatePage};

    use super::*;
    use crate::services::language_model::testing::{CannedModel, CannedProvider};

    async fn setup(text: &str) -> (DBService, Arc<CannedModel>, PageGenerator, Page) {
        let db = DBService::new_in_memory().await.unwrap();
        let model = CannedModel::new(text);
        let generator = PageGenerator::new(
            db.pool.clone(),
            AiDispatcher::new(db.pool.clone(), Arc::new(CannedProvider(model.clone()))),
            Arc::new(PromptContext::defaults().unwrap()),
        );
        let page = Page::create(
            &db.pool,
            &CreatePage {
                slug: "pricing".to_string(),
                title: "Pricing".to_string(),
                html_content: Some("<h1>Old</h1>".to_string()),
                css_content: None,
                js_content: None,
                is_published: None,
                access_level: None,
            },
            Uuid::new_v4(),
        )
        .await
        .unwrap();
        (db, model, generator, page)
    }

    #[tokio::test]
    async fn test_generate_overwrites_content() {
        let text = r#"Updated: {"html": "<h1>New</h1>", "css": "h1 { color: red; }", "js": ""}"#;
        let (_db, model, generator, page) = setup(text).await;

        let generated = generator
            .generate(page.id, &GeneratePageRequest { prompt: "Make it red".to_string() })
            .await
            .unwrap();
        assert_eq!(generated.page.html_content, "<h1>New</h1>");
        assert_eq!(generated.page.css_content, "h1 { color: red; }");
        assert!(model.last_prompt().unwrap().contains("<h1>Old</h1>"));
    }

    #[tokio::test]
    async fn test_unparseable_response_leaves_page_untouched() {
        let (db, _model, generator, page) = setup("Sorry, no.").await;
        let err = generator
            .generate(page.id, &GeneratePageRequest { prompt: "Make it red".to_string() })
            .await
            .unwrap_err();
        assert!(matches!(err, PageGeneratorError::Parse(_)));

        let reloaded = Page::find_by_id(&db.pool, page.id).await.unwrap().unwrap();
        assert_eq!(reloaded.html_content, "<h1>Old</h1>");
    }

    #[tokio::test]
    async fn test_unknown_page_is_not_dispatched() {
        let (_db, model, generator, _page) = setup("{}").await;
        let err = generator
            .generate(Uuid::new_v4(), &GeneratePageRequest { prompt: "x".to_string() })
            .await
            .unwrap_err();
        assert!(matches!(err, PageGeneratorError::PageNotFound(_)));
        assert_eq!(model.calls(), 0);
    }
}
