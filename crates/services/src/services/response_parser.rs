//! Turning model completions into HTML or JSON envelopes.

use std::sync::OnceLock;

use regex::Regex;
use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::debug;

/// The completion could not be read as the expected JSON envelope.
#[derive(Debug, Clone, Error)]
#[error("could not parse model response as JSON: {reason}")]
pub struct ParseFailure {
    pub reason: String,
    /// The untouched completion text, returned to the caller for inspection.
    pub raw_response: String,
}

fn object_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    // Outermost brace pair: first `{` through last `}`.
    RE.get_or_init(|| Regex::new(r"(?s)\{.*\}").expect("valid regex"))
}

/// Contents of the first fenced code block (preferring one tagged `lang`), or the
/// trimmed text when there is no fence.
pub fn strip_code_fence<'a>(text: &'a str, lang: &str) -> &'a str {
    let text = text.trim();

    let tagged = format!("```{lang}");
    if let Some(start) = text.find(&tagged) {
        let content_start = start + tagged.len();
        if let Some(end) = text[content_start..].find("```") {
            return text[content_start..content_start + end].trim();
        }
    }

    if let Some(start) = text.find("```") {
        let content_start = start + 3;
        // Skip past any language identifier on the same line
        let content_start = text[content_start..]
            .find('\n')
            .map(|i| content_start + i + 1)
            .unwrap_or(content_start);
        if let Some(end) = text[content_start..].find("```") {
            return text[content_start..content_start + end].trim();
        }
    }

    text
}

/// The first `{...}` block embedded in `text`, if any.
pub fn salvage_object(text: &str) -> Option<&str> {
    object_regex().find(text).map(|m| m.as_str())
}

/// Parse a JSON envelope out of a completion: the text as-is, then the contents of a
/// code fence, then the first `{...}` block found anywhere in it.
pub fn parse_json_envelope<T: DeserializeOwned>(text: &str) -> Result<T, ParseFailure> {
    let direct_err = match serde_json::from_str::<T>(text.trim()) {
        Ok(value) => return Ok(value),
        Err(e) => e,
    };

    let fenced = strip_code_fence(text, "json");
    if fenced != text.trim() {
        if let Ok(value) = serde_json::from_str::<T>(fenced) {
            return Ok(value);
        }
    }

    let Some(candidate) = salvage_object(fenced).or_else(|| salvage_object(text)) else {
        return Err(ParseFailure {
            reason: direct_err.to_string(),
            raw_response: text.to_string(),
        });
    };

    debug!(len = candidate.len(), "Salvaging embedded JSON object from response");
    serde_json::from_str::<T>(candidate).map_err(|e| ParseFailure {
        reason: e.to_string(),
        raw_response: text.to_string(),
    })
}

/// HTML document from a completion: unfenced, and trimmed to the `<!DOCTYPE`/`<html`
/// through `</html>` span when the model wrapped it in prose.
pub fn extract_html(text: &str) -> String {
    let body = strip_code_fence(text, "html");
    let lower = body.to_ascii_lowercase();

    let start = lower
        .find("<!doctype")
        .or_else(|| lower.find("<html"))
        .unwrap_or(0);
    let end = lower
        .rfind("</html>")
        .map(|i| i + "</html>".len())
        .filter(|&end| end > start)
        .unwrap_or(body.len());

    body[start..end].trim().to_string()
}
