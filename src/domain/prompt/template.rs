//! Prompt template parsing and rendering
//!
//! Placeholders use the `{name}` syntax. `{{` and `}}` produce literal braces,
//! so JSON examples can be embedded in a template.

use std::collections::{HashMap, HashSet};

use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use thiserror::Error;

/// Matches brace escapes or a `{name}` placeholder
static TOKEN_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\{\{|\}\}|\{([A-Za-z_][A-Za-z0-9_]*)\}").expect("valid template pattern")
});

/// Template processing errors
#[derive(Debug, Clone, Error, PartialEq)]
pub enum TemplateError {
    #[error("Missing required variable: {name}")]
    MissingVariable { name: String },
}

/// Values available to a template, usually conversation state
pub type TemplateState = HashMap<String, serde_json::Value>;

/// A parsed prompt template
#[derive(Debug, Clone)]
pub struct PromptTemplate {
    content: String,
    variables: Vec<String>,
}

impl PromptTemplate {
    /// Parse a template string and extract its placeholder names
    pub fn parse(content: impl Into<String>) -> Self {
        let content = content.into();
        let mut variables = Vec::new();
        let mut seen = HashSet::new();

        for cap in TOKEN_PATTERN.captures_iter(&content) {
            if let Some(name) = cap.get(1) {
                if seen.insert(name.as_str().to_string()) {
                    variables.push(name.as_str().to_string());
                }
            }
        }

        Self { content, variables }
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    /// Placeholder names in order of first appearance
    pub fn variables(&self) -> &[String] {
        &self.variables
    }

    /// Substitute every placeholder from `state`.
    ///
    /// String values are inserted verbatim, anything else as compact JSON.
    pub fn render(&self, state: &TemplateState) -> Result<String, TemplateError> {
        if let Some(missing) = self.variables.iter().find(|v| !state.contains_key(*v)) {
            return Err(TemplateError::MissingVariable {
                name: missing.clone(),
            });
        }

        let rendered = TOKEN_PATTERN.replace_all(&self.content, |cap: &Captures| {
            match cap.get(1) {
                Some(name) => state
                    .get(name.as_str())
                    .map(value_to_text)
                    .unwrap_or_default(),
                None if &cap[0] == "{{" => "{".to_string(),
                None => "}".to_string(),
            }
        });

        Ok(rendered.into_owned())
    }
}

fn value_to_text(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Render a template string directly
pub fn render_template(template: &str, state: &TemplateState) -> Result<String, TemplateError> {
    PromptTemplate::parse(template).render(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn state(pairs: &[(&str, serde_json::Value)]) -> TemplateState {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn test_parse_no_variables() {
        let template = PromptTemplate::parse("Hello, world!");
        assert!(template.variables().is_empty());
    }

    #[test]
    fn test_parse_duplicate_variables() {
        let template = PromptTemplate::parse("{name} and {name} again, {other}");
        assert_eq!(template.variables(), ["name", "other"]);
    }

    #[test]
    fn test_render_string_and_json_values() {
        let template = PromptTemplate::parse("Hello {name}, you have {count} tasks: {tags}");
        let result = template
            .render(&state(&[
                ("name", json!("Alice")),
                ("count", json!(3)),
                ("tags", json!(["a", "b"])),
            ]))
            .unwrap();

        assert_eq!(result, r#"Hello Alice, you have 3 tasks: ["a","b"]"#);
    }

    #[test]
    fn test_render_missing_variable() {
        let template = PromptTemplate::parse("Hello, {name}!");

        assert_eq!(
            template.render(&TemplateState::new()),
            Err(TemplateError::MissingVariable {
                name: "name".to_string()
            })
        );
    }

    #[test]
    fn test_escaped_braces_are_literal() {
        let result = render_template(
            r#"Reply as {{"answer": "<text>"}} for {topic}"#,
            &state(&[("topic", json!("rust"))]),
        )
        .unwrap();

        assert_eq!(result, r#"Reply as {"answer": "<text>"} for rust"#);
    }

    #[test]
    fn test_substituted_values_are_not_reparsed() {
        let result = render_template("{a}", &state(&[("a", json!("{b}"))])).unwrap();
        assert_eq!(result, "{b}");
    }
}
