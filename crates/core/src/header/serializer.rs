//! Header serialization back to document text.

use serde_json::Value;

use super::parser::{HeaderError, header_span, parse_lines, parse_scalar, split_entry};
use crate::types::schema::PropertyMap;

/// Serialize a header and body back into a document.
///
/// An empty header produces the body alone.
pub fn serialize_document(header: &PropertyMap, body: &str) -> String {
    if header.is_empty() {
        return body.to_string();
    }
    format!("{}{}", serialize_header(header), body)
}

/// Serialize header fields, delimiters included.
///
/// Flat text, number and boolean values round-trip through
/// [`super::extract_header`]; lists render inline and nested objects as
/// JSON text, both lossily. Keys that would not re-parse are quoted.
pub fn serialize_header(header: &PropertyMap) -> String {
    let mut out = String::from("---\n");
    for (key, value) in header {
        let key = render_key(key);
        let rendered = render_value(value);
        if rendered.is_empty() {
            out.push_str(&format!("{}:\n", key));
        } else {
            out.push_str(&format!("{}: {}\n", key, rendered));
        }
    }
    out.push_str("---\n");
    out
}

/// Rewrite header values in place, one line at a time.
///
/// `update` sees the key and parsed value of every `key: value` line and
/// returns a replacement, or `None` to leave the line alone. Only the value
/// part of replaced lines changes; comments, block list items, quoting and
/// the body are kept byte for byte. Returns `None` when nothing changed.
pub fn patch_header_values(
    content: &str,
    mut update: impl FnMut(&str, &Value) -> Option<Value>,
) -> Result<Option<String>, HeaderError> {
    let Some(span) = header_span(content) else {
        return Ok(None);
    };
    let raw = &content[span.clone()];
    parse_lines(raw)?;

    let mut out = String::with_capacity(content.len() + 16);
    out.push_str(&content[..span.start]);
    let mut changed = false;

    for line in raw.split_inclusive('\n') {
        let text = line.trim_end_matches(['\n', '\r']);
        let ending = &line[text.len()..];
        let trimmed = text.trim();

        let entry = if trimmed.is_empty() || trimmed.starts_with('#') {
            None
        } else {
            split_entry(text)
        };
        let replacement = entry.and_then(|(key, value_start)| {
            update(&key, &parse_scalar(&text[value_start..])).map(|v| (value_start, v))
        });

        match replacement {
            Some((value_start, value)) => {
                let rendered = render_value(&value);
                out.push_str(&text[..value_start]);
                if !rendered.is_empty() {
                    out.push(' ');
                    out.push_str(&rendered);
                }
                out.push_str(ending);
                changed = true;
            }
            None => out.push_str(line),
        }
    }

    out.push_str(&content[span.end..]);
    Ok(changed.then_some(out))
}

fn render_key(key: &str) -> String {
    let needs_quotes = key.trim() != key
        || key.starts_with(['#', '"', '\''])
        || key.contains([':', '\n', '\r']);

    if needs_quotes {
        serde_json::to_string(key).unwrap_or_else(|_| format!("\"{}\"", key))
    } else {
        key.to_string()
    }
}

fn render_value(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => render_string(s, false),
        Value::Array(items) => {
            let parts: Vec<String> = items
                .iter()
                .map(|item| match item {
                    Value::String(s) => render_string(s, true),
                    Value::Array(_) | Value::Object(_) => {
                        render_string(&item.to_string(), true)
                    }
                    other => render_value(other),
                })
                .collect();
            format!("[{}]", parts.join(", "))
        }
        Value::Object(_) => value.to_string(),
    }
}

/// Render a string bare when it re-parses to itself, quoted otherwise.
fn render_string(s: &str, in_list: bool) -> String {
    let needs_quotes = s.trim() != s
        || s.contains(['[', ']', '\n', '\r'])
        || (in_list && s.contains(','))
        || parse_scalar(s) != Value::String(s.to_string());

    if needs_quotes {
        serde_json::to_string(s).unwrap_or_else(|_| format!("\"{}\"", s))
    } else {
        s.to_string()
    }
}
