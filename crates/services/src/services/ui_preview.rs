//! Template-driven preview source for a logic page's frontend: React component, static
//! HTML document, or a prompt for an external builder.

use std::{fmt::Write as _, str::FromStr};

use convert_case::{Case, Casing};
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};
use thiserror::Error;
use ts_rs::TS;
use utils::text::escape_html;

#[derive(Debug, Error)]
pub enum UiPreviewError {
    #[error("Unsupported previewType '{0}'; expected react, html or lovable")]
    UnsupportedPreviewType(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum PreviewType {
    React,
    Html,
    Lovable,
}

#[derive(Debug, Clone, Default, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
pub struct GenerateUiPreviewRequest {
    #[serde(default)]
    pub frontend_config: FrontendConfig,
    #[serde(default)]
    pub page_data: PageData,
    #[serde(default)]
    pub preview_type: String,
}

#[derive(Debug, Clone, Default, Deserialize, TS)]
pub struct PageData {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub slug: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, TS)]
pub struct FrontendConfig {
    #[serde(default, alias = "fields")]
    pub components: Vec<ComponentConfig>,
    #[serde(default)]
    pub styling: Styling,
    #[serde(default, alias = "submitText")]
    pub submit_label: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, TS)]
pub struct ComponentConfig {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default, alias = "type")]
    pub field_type: String,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub placeholder: Option<String>,
    #[serde(default)]
    pub field_options: Option<FieldOptions>,
}

/// Per-field render rules
#[derive(Debug, Clone, Default, Deserialize, TS)]
pub struct FieldOptions {
    #[serde(default)]
    pub options: Option<Vec<FieldOption>>,
    #[serde(default)]
    pub rows: Option<u32>,
    #[serde(default)]
    pub min: Option<f64>,
    #[serde(default)]
    pub max: Option<f64>,
    #[serde(default)]
    pub step: Option<f64>,
}

/// A select/radio option: a bare string or an object with `value` and/or `label`.
#[derive(Debug, Clone, Deserialize, TS)]
#[serde(untagged)]
pub enum FieldOption {
    Plain(String),
    Labeled {
        #[serde(default)]
        label: Option<String>,
        #[serde(default)]
        value: Option<serde_json::Value>,
    },
    Other(serde_json::Value),
}

fn scalar_text(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Null => String::new(),
        other => other.to_string(),
    }
}

impl FieldOption {
    fn value(&self) -> String {
        match self {
            Self::Plain(s) => s.clone(),
            Self::Labeled { value: Some(value), .. } => scalar_text(value),
            Self::Labeled { value: None, label } => label.clone().unwrap_or_default(),
            Self::Other(value) => scalar_text(value),
        }
    }

    fn label(&self) -> String {
        match self {
            Self::Labeled { label: Some(label), .. } if !label.trim().is_empty() => label.clone(),
            _ => self.value(),
        }
    }
}

/// Tailwind class overrides; absent keys use the defaults below.
#[derive(Debug, Clone, Default, Deserialize, TS)]
pub struct Styling {
    pub container: Option<String>,
    pub heading: Option<String>,
    pub description: Option<String>,
    pub form: Option<String>,
    pub label: Option<String>,
    pub input: Option<String>,
    pub button: Option<String>,
    pub output: Option<String>,
}

const DEFAULT_CONTAINER: &str = "max-w-2xl mx-auto p-6";
const DEFAULT_HEADING: &str = "text-2xl font-bold text-gray-900 mb-2";
const DEFAULT_DESCRIPTION: &str = "text-gray-600 mb-6";
const DEFAULT_FORM: &str = "space-y-4";
const DEFAULT_LABEL: &str = "block text-sm font-medium text-gray-700 mb-1";
const DEFAULT_INPUT: &str = "w-full px-3 py-2 border border-gray-300 rounded-md focus:outline-none focus:ring-2 focus:ring-blue-500";
const DEFAULT_BUTTON: &str = "px-4 py-2 bg-blue-600 text-white rounded-md hover:bg-blue-700 disabled:opacity-50";
const DEFAULT_OUTPUT: &str = "mt-6 p-4 bg-gray-50 rounded-md text-sm";

/// Styling with defaults applied
struct Classes<'a> {
    container: &'a str,
    heading: &'a str,
    description: &'a str,
    form: &'a str,
    label: &'a str,
    input: &'a str,
    button: &'a str,
    output: &'a str,
}

impl<'a> Classes<'a> {
    fn from(styling: &'a Styling) -> Self {
        let pick = |value: &'a Option<String>, default: &'static str| -> &'a str {
            value.as_deref().filter(|s| !s.trim().is_empty()).unwrap_or(default)
        };
        Self {
            container: pick(&styling.container, DEFAULT_CONTAINER),
            heading: pick(&styling.heading, DEFAULT_HEADING),
            description: pick(&styling.description, DEFAULT_DESCRIPTION),
            form: pick(&styling.form, DEFAULT_FORM),
            label: pick(&styling.label, DEFAULT_LABEL),
            input: pick(&styling.input, DEFAULT_INPUT),
            button: pick(&styling.button, DEFAULT_BUTTON),
            output: pick(&styling.output, DEFAULT_OUTPUT),
        }
    }
}

#[derive(Debug, Clone, Serialize, TS)]
#[serde(rename_all = "camelCase")]
pub struct UiPreview {
    pub preview_type: PreviewType,
    pub preview_code: String,
    pub preview_instructions: String,
}

/// How a component is rendered
enum FieldKind<'a> {
    Input(&'a str),
    TextArea,
    Select,
    Checkbox,
    Radio,
}

fn field_kind(field_type: &str) -> FieldKind<'static> {
    match field_type.trim().to_ascii_lowercase().as_str() {
        "email" => FieldKind::Input("email"),
        "password" => FieldKind::Input("password"),
        "number" => FieldKind::Input("number"),
        "date" => FieldKind::Input("date"),
        "url" => FieldKind::Input("url"),
        "tel" | "phone" => FieldKind::Input("tel"),
        "color" => FieldKind::Input("color"),
        "file" => FieldKind::Input("file"),
        "textarea" => FieldKind::TextArea,
        "select" | "dropdown" => FieldKind::Select,
        "checkbox" | "boolean" => FieldKind::Checkbox,
        "radio" => FieldKind::Radio,
        _ => FieldKind::Input("text"),
    }
}

/// A component with its derived name and label
struct Field<'a> {
    name: String,
    label: String,
    config: &'a ComponentConfig,
}

impl<'a> Field<'a> {
    fn options(&self) -> &'a [FieldOption] {
        self.config
            .field_options
            .as_ref()
            .and_then(|o| o.options.as_deref())
            .unwrap_or_default()
    }

    fn numeric_attrs(&self) -> String {
        let mut attrs = String::new();
        if let Some(opts) = &self.config.field_options {
            for (attr, value) in [("min", opts.min), ("max", opts.max), ("step", opts.step)] {
                if let Some(v) = value {
                    let _ = write!(attrs, " {attr}=\"{v}\"");
                }
            }
        }
        attrs
    }

    fn rows(&self) -> u32 {
        self.config
            .field_options
            .as_ref()
            .and_then(|o| o.rows)
            .unwrap_or(4)
    }
}

fn fields(config: &FrontendConfig) -> Vec<Field<'_>> {
    config
        .components
        .iter()
        .enumerate()
        .map(|(i, component)| {
            let label = component
                .label
                .clone()
                .filter(|l| !l.trim().is_empty())
                .or_else(|| component.name.clone())
                .unwrap_or_else(|| format!("Field {}", i + 1));
            let name = component
                .name
                .clone()
                .filter(|n| !n.trim().is_empty())
                .unwrap_or_else(|| label.to_case(Case::Snake));
            let name = sanitize_identifier(&name, i);
            Field {
                name,
                label,
                config: component,
            }
        })
        .collect()
}

fn sanitize_identifier(raw: &str, index: usize) -> String {
    let cleaned: String = raw
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect();
    match cleaned.chars().next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => cleaned,
        Some(_) => format!("field_{cleaned}"),
        None => format!("field_{}", index + 1),
    }
}

/// PascalCase component name derived from the page title
pub fn component_name(title: &str) -> String {
    let cleaned: String = title
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { ' ' })
        .collect();
    let pascal = cleaned.to_case(Case::Pascal);
    match pascal.chars().next() {
        Some(c) if c.is_ascii_alphabetic() => format!("{pascal}Page"),
        Some(_) => format!("Page{pascal}"),
        None => "GeneratedPage".to_string(),
    }
}

/// Escape text placed between JSX tags, where braces start expressions.
fn escape_jsx(text: &str) -> String {
    escape_html(text).replace('{', "&#123;").replace('}', "&#125;")
}

pub fn generate_preview(request: &GenerateUiPreviewRequest) -> Result<UiPreview, UiPreviewError> {
    let preview_type = PreviewType::from_str(request.preview_type.trim())
        .map_err(|_| UiPreviewError::UnsupportedPreviewType(request.preview_type.clone()))?;
    Ok(render(preview_type, &request.frontend_config, &request.page_data))
}

pub fn render(preview_type: PreviewType, config: &FrontendConfig, page: &PageData) -> UiPreview {
    let title = page
        .title
        .as_deref()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .unwrap_or("Untitled Page");
    let (preview_code, preview_instructions) = match preview_type {
        PreviewType::React => {
            let name = component_name(title);
            (
                render_react(&name, title, config, page),
                format!(
                    "Save as {name}.jsx and render <{name} />. Requires React 18 and Tailwind CSS."
                ),
            )
        }
        PreviewType::Html => (
            render_html(title, config, page),
            "Save as an .html file and open it in a browser. Tailwind is loaded from its CDN."
                .to_string(),
        ),
        PreviewType::Lovable => (
            render_lovable(title, config, page),
            "Paste this prompt into Lovable to scaffold the page.".to_string(),
        ),
    };
    UiPreview {
        preview_type,
        preview_code,
        preview_instructions,
    }
}

fn render_react(name: &str, title: &str, config: &FrontendConfig, page: &PageData) -> String {
    let classes = Classes::from(&config.styling);
    let fields = fields(config);

    let initial_state = fields
        .iter()
        .map(|f| match field_kind(&f.config.field_type) {
            FieldKind::Checkbox => format!("{}: false", f.name),
            _ => format!("{}: ''", f.name),
        })
        .collect::<Vec<_>>()
        .join(", ");

    let mut out = String::new();
    let _ = write!(
        out,
        r#"import React, {{ useState }} from 'react';

export default function {name}() {{
  const [formData, setFormData] = useState({{ {initial_state} }});
  const [result, setResult] = useState(null);

  const handleChange = (e) => {{
    const {{ name, value, type, checked }} = e.target;
    setFormData((prev) => ({{ ...prev, [name]: type === 'checkbox' ? checked : value }}));
  }};

  const handleSubmit = (e) => {{
    e.preventDefault();
    setResult(formData);
  }};

  return (
    <div className="{container}">
      <h1 className="{heading}">{title}</h1>
"#,
        container = classes.container,
        heading = classes.heading,
        title = escape_jsx(title),
    );
    if let Some(description) = page.description.as_deref().filter(|d| !d.trim().is_empty()) {
        let _ = writeln!(
            out,
            "      <p className=\"{}\">{}</p>",
            classes.description,
            escape_jsx(description)
        );
    }
    let _ = writeln!(out, "      <form onSubmit={{handleSubmit}} className=\"{}\">", classes.form);

    for field in &fields {
        out.push_str(&react_field(field, &classes));
    }

    let _ = write!(
        out,
        r#"        <button type="submit" className="{button}">{submit}</button>
      </form>
      {{result && (
        <pre className="{output}">{{JSON.stringify(result, null, 2)}}</pre>
      )}}
    </div>
  );
}}
"#,
        button = classes.button,
        submit = escape_jsx(config.submit_label.as_deref().unwrap_or("Submit")),
        output = classes.output,
    );
    out
}

fn react_field(field: &Field<'_>, classes: &Classes<'_>) -> String {
    let name = &field.name;
    let label = escape_jsx(&field.label);
    let required = if field.config.required { " required" } else { "" };
    let placeholder = field
        .config
        .placeholder
        .as_deref()
        .map(|p| format!(" placeholder=\"{}\"", escape_html(p)))
        .unwrap_or_default();

    let mut out = String::from("        <div>\n");
    match field_kind(&field.config.field_type) {
        FieldKind::Checkbox => {
            let _ = writeln!(
                out,
                "          <label className=\"inline-flex items-center gap-2\">\n            \
                 <input type=\"checkbox\" name=\"{name}\" checked={{formData.{name}}} onChange={{handleChange}}{required} />\n            \
                 <span>{label}</span>\n          </label>"
            );
        }
        FieldKind::Radio => {
            let _ = writeln!(out, "          <span className=\"{}\">{label}</span>", classes.label);
            for option in field.options() {
                let value = escape_html(&option.value());
                let _ = writeln!(
                    out,
                    "          <label className=\"inline-flex items-center gap-2 mr-4\">\n            \
                     <input type=\"radio\" name=\"{name}\" value=\"{value}\" checked={{formData.{name} === \"{value}\"}} onChange={{handleChange}} />\n            \
                     <span>{}</span>\n          </label>",
                    escape_jsx(&option.label())
                );
            }
        }
        kind => {
            let _ = writeln!(
                out,
                "          <label htmlFor=\"{name}\" className=\"{}\">{label}</label>",
                classes.label
            );
            let common = format!(
                "id=\"{name}\" name=\"{name}\" value={{formData.{name}}} onChange={{handleChange}} className=\"{}\"{required}",
                classes.input
            );
            match kind {
                FieldKind::TextArea => {
                    let _ = writeln!(
                        out,
                        "          <textarea {common} rows={{{}}}{placeholder} />",
                        field.rows()
                    );
                }
                FieldKind::Select => {
                    let _ = writeln!(out, "          <select {common}>");
                    for option in field.options() {
                        let _ = writeln!(
                            out,
                            "            <option value=\"{}\">{}</option>",
                            escape_html(&option.value()),
                            escape_jsx(&option.label())
                        );
                    }
                    out.push_str("          </select>\n");
                }
                FieldKind::Input(input_type) => {
                    let _ = writeln!(
                        out,
                        "          <input type=\"{input_type}\" {common}{placeholder}{} />",
                        field.numeric_attrs()
                    );
                }
                FieldKind::Checkbox | FieldKind::Radio => {}
            }
        }
    }
    out.push_str("        </div>\n");
    out
}

fn render_html(title: &str, config: &FrontendConfig, page: &PageData) -> String {
    let classes = Classes::from(&config.styling);
    let title = escape_html(title);

    let mut out = String::new();
    let _ = write!(
        out,
        r#"<!DOCTYPE html>
<html lang="en">
<head>
  <meta charset="UTF-8">
  <meta name="viewport" content="width=device-width, initial-scale=1.0">
  <title>{title}</title>
  <script src="https://cdn.tailwindcss.com"></script>
</head>
<body class="bg-white">
  <div class="{container}">
    <h1 class="{heading}">{title}</h1>
"#,
        container = classes.container,
        heading = classes.heading,
    );
    if let Some(description) = page.description.as_deref().filter(|d| !d.trim().is_empty()) {
        let _ = writeln!(
            out,
            "    <p class=\"{}\">{}</p>",
            classes.description,
            escape_html(description)
        );
    }
    let _ = writeln!(out, "    <form id=\"logic-page-form\" class=\"{}\">", classes.form);

    for field in fields(config) {
        out.push_str(&html_field(&field, &classes));
    }

    let _ = write!(
        out,
        r#"      <button type="submit" class="{button}">{submit}</button>
    </form>
    <pre id="result" class="{output} hidden"></pre>
  </div>
  <script>
    document.getElementById('logic-page-form').addEventListener('submit', function (event) {{
      event.preventDefault();
      const data = Object.fromEntries(new FormData(event.target).entries());
      const result = document.getElementById('result');
      result.textContent = JSON.stringify(data, null, 2);
      result.classList.remove('hidden');
    }});
  </script>
</body>
</html>
"#,
        button = classes.button,
        submit = escape_html(config.submit_label.as_deref().unwrap_or("Submit")),
        output = classes.output,
    );
    out
}

fn html_field(field: &Field<'_>, classes: &Classes<'_>) -> String {
    let name = &field.name;
    let label = escape_html(&field.label);
    let required = if field.config.required { " required" } else { "" };
    let placeholder = field
        .config
        .placeholder
        .as_deref()
        .map(|p| format!(" placeholder=\"{}\"", escape_html(p)))
        .unwrap_or_default();

    let mut out = String::from("      <div>\n");
    match field_kind(&field.config.field_type) {
        FieldKind::Checkbox => {
            let _ = writeln!(
                out,
                "        <label class=\"inline-flex items-center gap-2\">\
                 <input type=\"checkbox\" name=\"{name}\" value=\"true\"{required}> <span>{label}</span></label>"
            );
        }
        FieldKind::Radio => {
            let _ = writeln!(out, "        <span class=\"{}\">{label}</span>", classes.label);
            for option in field.options() {
                let _ = writeln!(
                    out,
                    "        <label class=\"inline-flex items-center gap-2 mr-4\">\
                     <input type=\"radio\" name=\"{name}\" value=\"{}\"> <span>{}</span></label>",
                    escape_html(&option.value()),
                    escape_html(&option.label())
                );
            }
        }
        kind => {
            let _ = writeln!(
                out,
                "        <label for=\"{name}\" class=\"{}\">{label}</label>",
                classes.label
            );
            let common = format!("id=\"{name}\" name=\"{name}\" class=\"{}\"{required}", classes.input);
            match kind {
                FieldKind::TextArea => {
                    let _ = writeln!(
                        out,
                        "        <textarea {common} rows=\"{}\"{placeholder}></textarea>",
                        field.rows()
                    );
                }
                FieldKind::Select => {
                    let _ = write!(out, "        <select {common}>");
                    for option in field.options() {
                        let _ = write!(
                            out,
                            "\n          <option value=\"{}\">{}</option>",
                            escape_html(&option.value()),
                            escape_html(&option.label())
                        );
                    }
                    if !field.options().is_empty() {
                        out.push_str("\n        ");
                    }
                    out.push_str("</select>\n");
                }
                FieldKind::Input(input_type) => {
                    let _ = writeln!(
                        out,
                        "        <input type=\"{input_type}\" {common}{placeholder}{}>",
                        field.numeric_attrs()
                    );
                }
                FieldKind::Checkbox | FieldKind::Radio => {}
            }
        }
    }
    out.push_str("      </div>\n");
    out
}

fn render_lovable(title: &str, config: &FrontendConfig, page: &PageData) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "Build a single-page React + Tailwind CSS tool called \"{title}\"."
    );
    if let Some(description) = page.description.as_deref().filter(|d| !d.trim().is_empty()) {
        let _ = writeln!(out, "Purpose: {description}");
    }

    let fields = fields(config);
    if fields.is_empty() {
        out.push_str("\nThe page has no inputs; show a single action button.\n");
    } else {
        out.push_str("\nThe page shows a form with these fields, in order:\n");
        for (i, field) in fields.iter().enumerate() {
            let kind = match field_kind(&field.config.field_type) {
                FieldKind::Input(t) => format!("{t} input"),
                FieldKind::TextArea => "multi-line text area".to_string(),
                FieldKind::Select => "dropdown".to_string(),
                FieldKind::Checkbox => "checkbox".to_string(),
                FieldKind::Radio => "radio group".to_string(),
            };
            let _ = write!(out, "{}. \"{}\" (`{}`): {kind}", i + 1, field.label, field.name);
            if field.config.required {
                out.push_str(", required");
            }
            let options: Vec<String> = field.options().iter().map(FieldOption::label).collect();
            if !options.is_empty() {
                let _ = write!(out, ", options: {}", options.join(", "));
            }
            if let Some(placeholder) = &field.config.placeholder {
                let _ = write!(out, ", placeholder \"{placeholder}\"");
            }
            out.push('\n');
        }
    }

    let classes = Classes::from(&config.styling);
    let _ = write!(
        out,
        "\nSubmit button label: \"{}\". After submitting, show the result as formatted JSON \
         below the form.\n\nStyling (Tailwind classes):\n- container: {}\n- heading: {}\n\
         - inputs: {}\n- labels: {}\n- button: {}\n- result panel: {}\n",
        config.submit_label.as_deref().unwrap_or("Submit"),
        classes.container,
        classes.heading,
        classes.input,
        classes.label,
        classes.button,
        classes.output,
    );
    out
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn request(preview_type: &str, config: serde_json::Value) -> GenerateUiPreviewRequest {
        serde_json::from_value(json!({
            "frontendConfig": config,
            "pageData": {"title": "Currency Converter", "description": "Convert amounts"},
            "previewType": preview_type,
        }))
        .unwrap()
    }

    fn sample_config() -> serde_json::Value {
        json!({
            "components": [
                {"name": "amount", "label": "Amount", "field_type": "number", "required": true,
                 "field_options": {"min": 0, "step": 0.01}},
                {"name": "currency", "label": "Currency", "field_type": "select",
                 "field_options": {"options": ["USD", {"label": "Euro", "value": "EUR"}]}},
                {"label": "Notes", "field_type": "textarea"},
                {"name": "mystery", "label": "Mystery", "field_type": "hologram"}
            ],
            "styling": {"button": "btn-primary"}
        })
    }

    #[test]
    fn test_every_preview_type_includes_title() {
        for preview_type in ["react", "html", "lovable"] {
            let preview = generate_preview(&request(preview_type, sample_config())).unwrap();
            assert!(!preview.preview_code.is_empty());
            assert!(
                preview.preview_code.contains("Currency Converter"),
                "{preview_type} preview is missing the title"
            );
            assert!(!preview.preview_instructions.is_empty());
        }
    }

    #[test]
    fn test_select_without_options_renders_empty_select() {
        let config = json!({"components": [
            {"name": "plan", "label": "Plan", "field_type": "select"},
            {"name": "tier", "label": "Tier", "field_type": "select", "field_options": {}}
        ]});

        let html = generate_preview(&request("html", config.clone())).unwrap().preview_code;
        assert!(html.contains(r#"<select id="plan" name="plan""#));
        assert!(!html.contains("<option"));
        assert_eq!(html.matches("</select>").count(), 2);

        let react = generate_preview(&request("react", config)).unwrap().preview_code;
        assert_eq!(react.matches("</select>").count(), 2);
        assert!(!react.contains("<option"));
    }

    #[test]
    fn test_unknown_field_type_falls_back_to_text_input() {
        let html = generate_preview(&request("html", sample_config())).unwrap().preview_code;
        assert!(html.contains(r#"<input type="text" id="mystery""#));
        assert!(html.contains(r#"<input type="number" id="amount""#));
        assert!(html.contains(r#"min="0" step="0.01""#));
        assert!(html.contains(r#"<option value="EUR">Euro</option>"#));
        assert!(html.contains(r#"name="notes""#));
    }

    #[test]
    fn test_option_objects_without_label_use_value() {
        let config = json!({"components": [{
            "name": "currency", "label": "Currency", "field_type": "select",
            "field_options": {"options": [{"value": "usd"}, {"label": "Euro"}, {"value": 3}, 7]}
        }]});

        let html = generate_preview(&request("html", config.clone())).unwrap().preview_code;
        assert!(html.contains(r#"<option value="usd">usd</option>"#));
        assert!(html.contains(r#"<option value="Euro">Euro</option>"#));
        assert!(html.contains(r#"<option value="3">3</option>"#));
        assert!(html.contains(r#"<option value="7">7</option>"#));
        assert!(!html.contains("&quot;value&quot;"));

        let react = generate_preview(&request("react", config)).unwrap().preview_code;
        assert!(!react.contains("&quot;value&quot;"));
        assert!(react.contains("usd"));
    }

    #[test]
    fn test_missing_styling_keys_use_defaults() {
        let html = generate_preview(&request("html", sample_config())).unwrap().preview_code;
        assert!(html.contains(r#"class="btn-primary""#));
        assert!(html.contains(DEFAULT_INPUT));
        assert!(html.contains(DEFAULT_CONTAINER));
    }

    #[test]
    fn test_react_component_name_and_escaping() {
        let req: GenerateUiPreviewRequest = serde_json::from_value(json!({
            "frontendConfig": {"components": [{"label": "Cost {USD}", "field_type": "text"}]},
            "pageData": {"title": "tip calculator <beta>"},
            "previewType": "REACT",
        }))
        .unwrap();
        let preview = generate_preview(&req).unwrap();
        assert_eq!(preview.preview_type, PreviewType::React);
        assert!(preview.preview_code.contains("export default function TipCalculatorBetaPage()"));
        assert!(preview.preview_code.contains("tip calculator &lt;beta&gt;"));
        assert!(preview.preview_code.contains("Cost &#123;USD&#125;"));
    }

    #[test]
    fn test_component_name_edge_cases() {
        assert_eq!(component_name("Currency Converter"), "CurrencyConverterPage");
        assert!(component_name("3d viewer").starts_with("Page3"));
        assert_eq!(component_name("!!!"), "GeneratedPage");
    }

    #[test]
    fn test_unsupported_preview_type() {
        assert!(matches!(
            generate_preview(&request("vue", json!({}))),
            Err(UiPreviewError::UnsupportedPreviewType(t)) if t == "vue"
        ));
    }

    #[test]
    fn test_missing_title_uses_placeholder() {
        let preview = render(PreviewType::Html, &FrontendConfig::default(), &PageData::default());
        assert!(preview.preview_code.contains("<title>Untitled Page</title>"));
    }
}
