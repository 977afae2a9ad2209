//! Static inputs for prompt construction: reserved-page rules and the site context
//! (routes, verified API endpoints, global rules).

use std::{collections::BTreeMap, path::Path};

use rust_embed::Embed;
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use thiserror::Error;
use tracing::{debug, info};
use ts_rs::TS;
use utils::assets::{AI_CONTEXT_FILE, RESERVED_PAGE_RULES_FILE};

#[derive(Embed)]
#[folder = "assets/"]
struct DefaultPromptAssets;

#[derive(Debug, Error)]
pub enum PromptContextError {
    #[error("failed to read {file}: {source}")]
    Io {
        file: String,
        source: std::io::Error,
    },
    #[error("invalid JSON in {file}: {source}")]
    Json {
        file: String,
        source: serde_json::Error,
    },
    #[error("embedded default {0} is missing")]
    MissingDefault(String),
}

/// A DOM element the generated page must contain
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, TS)]
pub struct RequiredElement {
    pub selector: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct ReservedPageRule {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub required_elements: Vec<RequiredElement>,
    #[serde(default)]
    pub api_endpoints: Vec<String>,
    /// Behaviour that must survive every iteration
    #[serde(default)]
    pub minimal_functionality: Vec<String>,
}

/// Page type (e.g. `customer-login`) → rule
pub type ReservedPageRules = BTreeMap<String, ReservedPageRule>;

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct ApiEndpoint {
    pub method: String,
    pub path: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
pub struct AiContext {
    /// Route path → description
    #[serde(default)]
    pub routes: BTreeMap<String, String>,
    #[serde(default)]
    pub api_endpoints: Vec<ApiEndpoint>,
    #[serde(default)]
    pub global_rules: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct PromptContext {
    pub rules: ReservedPageRules,
    pub context: AiContext,
}

impl PromptContext {
    /// Load both files from `data_dir`, using the embedded defaults for any that are absent.
    pub async fn load(data_dir: &Path) -> Result<Self, PromptContextError> {
        let rules = load_json(data_dir, RESERVED_PAGE_RULES_FILE).await?;
        let context = load_json(data_dir, AI_CONTEXT_FILE).await?;
        Ok(Self { rules, context })
    }

    /// Embedded defaults only
    pub fn defaults() -> Result<Self, PromptContextError> {
        Ok(Self {
            rules: embedded_default(RESERVED_PAGE_RULES_FILE)?,
            context: embedded_default(AI_CONTEXT_FILE)?,
        })
    }

    pub fn rule(&self, page_type: &str) -> Option<&ReservedPageRule> {
        self.rules.get(page_type)
    }

    /// Configured reserved page types, sorted
    pub fn available_types(&self) -> Vec<String> {
        self.rules.keys().cloned().collect()
    }
}

async fn load_json<T: DeserializeOwned>(data_dir: &Path, file: &str) -> Result<T, PromptContextError> {
    let path = data_dir.join(file);
    match tokio::fs::read_to_string(&path).await {
        Ok(content) => {
            info!(path = %path.display(), "Loaded prompt context file");
            serde_json::from_str(&content).map_err(|source| PromptContextError::Json {
                file: path.display().to_string(),
                source,
            })
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!(file, "Prompt context file absent, using embedded default");
            embedded_default(file)
        }
        Err(source) => Err(PromptContextError::Io {
            file: path.display().to_string(),
            source,
        }),
    }
}

fn embedded_default<T: DeserializeOwned>(file: &str) -> Result<T, PromptContextError> {
    let asset = DefaultPromptAssets::get(file)
        .ok_or_else(|| PromptContextError::MissingDefault(file.to_string()))?;
    serde_json::from_slice(&asset.data).map_err(|source| PromptContextError::Json {
        file: file.to_string(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_embedded_defaults_parse() {
        let ctx = PromptContext::defaults().unwrap();
        assert_eq!(
            ctx.available_types(),
            vec!["checkout", "customer-dashboard", "customer-login", "customer-signup"]
        );
        let login = ctx.rule("customer-login").unwrap();
        assert!(login.required_elements.iter().any(|e| e.selector == "#login-form"));
        assert!(!ctx.context.api_endpoints.is_empty());
        assert!(ctx.context.routes.contains_key("/login"));
    }

    #[tokio::test]
    async fn test_data_dir_file_overrides_default() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join(RESERVED_PAGE_RULES_FILE),
            r##"{"pricing": {"name": "Pricing", "required_elements": [{"selector": "#plans"}]}}"##,
        )
        .unwrap();

        let ctx = PromptContext::load(dir.path()).await.unwrap();
        assert_eq!(ctx.available_types(), vec!["pricing"]);
        // ai-context.json was absent, so the embedded one is used
        assert!(!ctx.context.global_rules.is_empty());
    }

    #[tokio::test]
    async fn test_invalid_file_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(AI_CONTEXT_FILE), "{not json").unwrap();
        assert!(matches!(
            PromptContext::load(dir.path()).await,
            Err(PromptContextError::Json { .. })
        ));
    }
}
