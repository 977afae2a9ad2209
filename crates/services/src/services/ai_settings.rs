//! Read models over the AI settings row and the one-time import of the legacy JSON file.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use db::models::ai_settings::{AiSettings, UpdateAiSettings};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use thiserror::Error;
use tracing::{info, warn};
use ts_rs::TS;
use utils::text::mask_secret;

#[derive(Debug, Error)]
pub enum AiSettingsError {
    #[error(transparent)]
    Database(#[from] sqlx::Error),
    #[error("failed to read legacy settings: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid legacy settings file: {0}")]
    Json(#[from] serde_json::Error),
}

/// Settings as returned to the admin UI; the API key is masked.
#[derive(Debug, Clone, Serialize, TS)]
pub struct AiSettingsView {
    pub api_key_configured: bool,
    pub api_key_masked: Option<String>,
    pub model: String,
    pub max_tokens: i64,
    pub temperature: f64,
    pub cost_limit_monthly: f64,
    pub current_month_usage: f64,
    pub usage_month: String,
    pub max_retries: i64,
    pub updated_at: DateTime<Utc>,
}

impl AiSettingsView {
    pub fn new(settings: &AiSettings, month: &str) -> Self {
        Self {
            api_key_configured: settings.api_key.is_some(),
            api_key_masked: settings.api_key.as_deref().map(mask_secret),
            model: settings.model.clone(),
            max_tokens: settings.max_tokens,
            temperature: settings.temperature,
            cost_limit_monthly: settings.cost_limit_monthly,
            current_month_usage: settings.usage_for_month(month),
            usage_month: month.to_string(),
            max_retries: settings.max_retries,
            updated_at: settings.updated_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, TS)]
pub struct UsageSummary {
    pub usage_month: String,
    pub current_month_usage: f64,
    pub cost_limit_monthly: f64,
    pub remaining_budget: f64,
}

impl UsageSummary {
    pub fn new(settings: &AiSettings, month: &str) -> Self {
        let used = settings.usage_for_month(month);
        Self {
            usage_month: month.to_string(),
            current_month_usage: used,
            cost_limit_monthly: settings.cost_limit_monthly,
            remaining_budget: (settings.cost_limit_monthly - used).max(0.0),
        }
    }
}

/// Shape of the old `ai-settings.json`
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LegacySettingsFile {
    #[serde(alias = "api_key")]
    api_key: Option<String>,
    model: Option<String>,
    #[serde(alias = "max_tokens")]
    max_tokens: Option<i64>,
    temperature: Option<f64>,
    #[serde(alias = "cost_limit_monthly")]
    cost_limit_monthly: Option<f64>,
    #[serde(alias = "current_month_usage")]
    current_month_usage: Option<f64>,
}

fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut renamed = path.as_os_str().to_owned();
    renamed.push(suffix);
    PathBuf::from(renamed)
}

/// Import `path` into the settings row when the row has never been configured (no key and
/// no usage). The file is renamed to `*.imported` afterwards, or to `*.ignored` when the row
/// was already configured, so it is only looked at once.
/// Returns whether anything was imported.
pub async fn import_legacy_settings(
    pool: &SqlitePool,
    path: &Path,
    month: &str,
) -> Result<bool, AiSettingsError> {
    let content = match tokio::fs::read_to_string(path).await {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(false),
        Err(e) => return Err(e.into()),
    };

    let current = AiSettings::get(pool).await?;
    if current.api_key.is_some() || current.current_month_usage > 0.0 {
        let ignored = with_suffix(path, ".ignored");
        tokio::fs::rename(path, &ignored).await?;
        warn!(
            path = %path.display(),
            moved_to = %ignored.display(),
            "Legacy AI settings file ignored; settings already configured"
        );
        return Ok(false);
    }

    let legacy: LegacySettingsFile = serde_json::from_str(&content)?;
    AiSettings::update(
        pool,
        &UpdateAiSettings {
            api_key: legacy.api_key,
            model: legacy.model,
            max_tokens: legacy.max_tokens,
            temperature: legacy.temperature,
            cost_limit_monthly: legacy.cost_limit_monthly,
            max_retries: None,
        },
    )
    .await?;
    if let Some(usage) = legacy.current_month_usage.filter(|u| *u > 0.0) {
        AiSettings::add_month_usage(pool, month, usage).await?;
    }

    tokio::fs::rename(path, with_suffix(path, ".imported")).await?;

    info!(path = %path.display(), "Imported legacy AI settings");
    Ok(true)
}
