use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;

use crate::types::schema::slugify;
use crate::types::{PropertyMap, ValidationResult, ValidationWarning, WarningCode};

// Matches {{name}} or {{name | filter}}
static PLACEHOLDER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{\{([^{}]+)\}\}").unwrap());

/// Renders a note type's body template with property values.
///
/// The rendered text is the result's `data`; unresolved placeholders are
/// warnings and never block success.
pub trait TemplateRenderer: Send + Sync {
    fn render(&self, content: &str, variables: &PropertyMap) -> ValidationResult<String>;
}

/// `{{var}}` substitution with a handful of string filters.
///
/// Supports:
/// - Simple variables: `{{title}}`
/// - Filters: `{{title | slugify}}` (also lowercase, uppercase, trim)
#[derive(Debug, Clone, Copy, Default)]
pub struct SimpleTemplateRenderer;

impl SimpleTemplateRenderer {
    pub fn new() -> Self {
        Self
    }
}

impl TemplateRenderer for SimpleTemplateRenderer {
    fn render(&self, content: &str, variables: &PropertyMap) -> ValidationResult<String> {
        let mut unresolved = Vec::new();
        let rendered = PLACEHOLDER_RE.replace_all(content, |caps: &regex::Captures<'_>| {
            let expr = caps[1].trim();
            let (name, filter) = match expr.split_once('|') {
                Some((name, filter)) => (name.trim(), Some(filter.trim())),
                None => (expr, None),
            };

            match variables.get(name) {
                Some(value) => {
                    let text = value_to_text(value);
                    match filter {
                        Some(filter) => apply_filter(&text, filter),
                        None => text,
                    }
                }
                None => {
                    unresolved.push(name.to_string());
                    caps[0].to_string()
                }
            }
        });

        let mut result = ValidationResult::success(rendered.into_owned());
        for name in unresolved {
            result.add_warning(
                ValidationWarning::new(
                    WarningCode::UnresolvedPlaceholder,
                    format!("no value for placeholder '{}'", name),
                )
                .with_property(name),
            );
        }
        result
    }
}

fn value_to_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Array(items) => items.iter().map(value_to_text).collect::<Vec<_>>().join(", "),
        other => other.to_string(),
    }
}

/// Apply a filter to a value.
fn apply_filter(value: &str, filter: &str) -> String {
    match filter {
        "slugify" => slugify(value),
        "lowercase" | "lower" => value.to_lowercase(),
        "uppercase" | "upper" => value.to_uppercase(),
        "trim" => value.trim().to_string(),
        _ => value.to_string(), // Unknown filter, return unchanged
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn vars(value: Value) -> PropertyMap {
        match value {
            Value::Object(m) => m,
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_render_simple_variables() {
        let result = SimpleTemplateRenderer
            .render("# {{title}}\n\nBy {{ author }}", &vars(json!({"title": "Hi", "author": "Ann"})));
        assert!(result.valid);
        assert!(result.warnings.is_empty());
        assert_eq!(result.data.as_deref(), Some("# Hi\n\nBy Ann"));
    }

    #[test]
    fn test_render_non_text_values() {
        let result = SimpleTemplateRenderer.render(
            "{{count}} {{done}} {{tags}} [{{empty}}]",
            &vars(json!({"count": 3, "done": true, "tags": ["a", "b"], "empty": null})),
        );
        assert_eq!(result.data.as_deref(), Some("3 true a, b []"));
    }

    #[test]
    fn test_render_with_filters() {
        let v = vars(json!({"title": "Hello World"}));
        let result = SimpleTemplateRenderer.render("{{title | slugify}}/{{title|upper}}", &v);
        assert_eq!(result.data.as_deref(), Some("hello-world/HELLO WORLD"));

        // Unknown filter returns value unchanged
        let result = SimpleTemplateRenderer.render("{{title | unknown}}", &v);
        assert_eq!(result.data.as_deref(), Some("Hello World"));
    }

    #[test]
    fn test_unknown_placeholder_left_intact_with_warning() {
        let result = SimpleTemplateRenderer.render("{{missing | slugify}} and {{title}}", &vars(json!({"title": "x"})));
        assert!(result.valid);
        assert_eq!(result.data.as_deref(), Some("{{missing | slugify}} and x"));
        assert_eq!(result.warnings.len(), 1);
        assert_eq!(result.warnings[0].code, WarningCode::UnresolvedPlaceholder);
        assert_eq!(result.warnings[0].property.as_deref(), Some("missing"));
    }
}
