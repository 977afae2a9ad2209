//! Rendering of webhook integrations into concrete HTTP requests. Delivery happens
//! elsewhere; this only produces what would be sent.

use std::collections::{BTreeMap, HashMap};

use db::models::integration::Integration;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use ts_rs::TS;
use utils::template;

#[derive(Debug, Error)]
pub enum WebhookError {
    #[error("integration '{integration}' is not triggered by event '{event}'")]
    NotTriggered { integration: String, event: String },
    #[error("integration '{integration}' is disabled")]
    Disabled { integration: String },
    #[error("invalid headers template: {0}")]
    InvalidHeaders(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Deserialize, TS)]
pub struct PreviewWebhookRequest {
    pub event: String,
    /// Nested object; `{"user": {"email": ..}}` is available as `{{user.email}}`
    #[serde(default)]
    pub variables: serde_json::Value,
}

#[derive(Debug, Clone, Serialize, TS)]
pub struct RenderedWebhook {
    pub url: String,
    pub method: String,
    pub headers: BTreeMap<String, String>,
    pub body: String,
    /// Placeholders left in the output because no variable matched
    pub unresolved: Vec<String>,
}

pub fn render_request(
    integration: &Integration,
    variables: &HashMap<String, String>,
) -> Result<RenderedWebhook, WebhookError> {
    let header_templates: serde_json::Map<String, serde_json::Value> =
        if integration.headers_template.trim().is_empty() {
            serde_json::Map::new()
        } else {
            serde_json::from_str(&integration.headers_template)?
        };

    let headers: BTreeMap<String, String> = header_templates
        .into_iter()
        .map(|(name, value)| {
            let value = match value {
                serde_json::Value::String(s) => s,
                other => other.to_string(),
            };
            (name, template::render(&value, variables))
        })
        .collect();

    let url = template::render(&integration.url, variables);
    let body = template::render(&integration.body_template, variables);

    let mut unresolved = template::placeholders(&url);
    for text in headers.values().chain(std::iter::once(&body)) {
        for name in template::placeholders(text) {
            if !unresolved.contains(&name) {
                unresolved.push(name);
            }
        }
    }

    Ok(RenderedWebhook {
        url,
        method: integration.method.clone(),
        headers,
        body,
        unresolved,
    })
}

/// The request `integration` would send for `request.event`. The event name itself is
/// available as `{{event}}` unless the caller supplies one.
pub fn preview(
    integration: &Integration,
    request: &PreviewWebhookRequest,
) -> Result<RenderedWebhook, WebhookError> {
    if !integration.enabled {
        return Err(WebhookError::Disabled {
            integration: integration.name.clone(),
        });
    }
    if !integration.listens_for(&request.event) {
        return Err(WebhookError::NotTriggered {
            integration: integration.name.clone(),
            event: request.event.clone(),
        });
    }

    let mut variables = template::variables_from_json(&request.variables);
    variables
        .entry("event".to_string())
        .or_insert_with(|| request.event.clone());
    render_request(integration, &variables)
}
