//! `{{variable}}` placeholder substitution used by webhook and notification templates.

use std::{collections::HashMap, sync::OnceLock};

use regex::{Captures, Regex};

fn placeholder_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\{\{\s*([A-Za-z0-9_.\-]+)\s*\}\}").expect("valid placeholder regex"))
}

/// Replace every `{{name}}` with its value. Placeholders without a value are left intact.
pub fn render(template: &str, variables: &HashMap<String, String>) -> String {
    placeholder_regex()
        .replace_all(template, |caps: &Captures| {
            variables
                .get(&caps[1])
                .cloned()
                .unwrap_or_else(|| caps[0].to_string())
        })
        .into_owned()
}

/// Names of all placeholders in `template`, in order of first appearance.
pub fn placeholders(template: &str) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    for caps in placeholder_regex().captures_iter(template) {
        let name = caps[1].to_string();
        if !names.contains(&name) {
            names.push(name);
        }
    }
    names
}

/// Flatten a JSON object into template variables; nested keys are joined with `.`.
pub fn variables_from_json(value: &serde_json::Value) -> HashMap<String, String> {
    let mut out = HashMap::new();
    flatten_into(&mut out, None, value);
    out
}

fn flatten_into(out: &mut HashMap<String, String>, prefix: Option<&str>, value: &serde_json::Value) {
    match value {
        serde_json::Value::Object(map) => {
            for (key, nested) in map {
                let name = match prefix {
                    Some(p) => format!("{p}.{key}"),
                    None => key.clone(),
                };
                flatten_into(out, Some(&name), nested);
            }
        }
        serde_json::Value::String(s) => {
            if let Some(p) = prefix {
                out.insert(p.to_string(), s.clone());
            }
        }
        serde_json::Value::Null => {
            if let Some(p) = prefix {
                out.insert(p.to_string(), String::new());
            }
        }
        other => {
            if let Some(p) = prefix {
                out.insert(p.to_string(), other.to_string());
            }
        }
    }
}
