//! Header extraction from raw document text.

use std::ops::Range;

use serde_json::Value;
use thiserror::Error;

use crate::types::schema::{PropertyMap, parse_number};

/// Errors that can occur during header parsing.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HeaderError {
    #[error("unterminated list on header line {line}: {text}")]
    UnterminatedList { line: usize, text: String },
}

/// Result of splitting a header from a document.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ExtractedHeader {
    /// Parsed key/value pairs, in document order.
    pub header: PropertyMap,
    /// The document body (everything after the header).
    pub body: String,
    /// Header text between the delimiters, if a header was present.
    pub raw: Option<String>,
}

impl ExtractedHeader {
    pub fn has_header(&self) -> bool {
        self.raw.is_some()
    }
}

/// Extract the header block from document content.
///
/// A document without a leading `---` block (or whose block is never closed)
/// has an empty header and its whole content as body.
pub fn extract_header(content: &str) -> Result<ExtractedHeader, HeaderError> {
    let Some(span) = header_span(content) else {
        return Ok(ExtractedHeader {
            header: PropertyMap::new(),
            body: content.to_string(),
            raw: None,
        });
    };

    let raw = &content[span.clone()];

    // Calculate body start (skip closing --- and following newline)
    let after_closing = &content[span.end..];
    let after_closing = after_closing.trim_start_matches(|c| c != '\n' && c != '\r');
    let body = after_closing
        .strip_prefix('\n')
        .or_else(|| after_closing.strip_prefix("\r\n"))
        .unwrap_or(after_closing)
        .to_string();

    let header = parse_lines(raw)?;

    Ok(ExtractedHeader { header, body, raw: Some(raw.to_string()) })
}

/// Byte range of the header text between the `---` delimiters.
pub(crate) fn header_span(content: &str) -> Option<Range<usize>> {
    let after_first = content.trim_start().strip_prefix("---")?;
    let after_newline =
        after_first.strip_prefix('\n').or_else(|| after_first.strip_prefix("\r\n"))?;
    let start = content.len() - after_newline.len();
    let end = start + find_closing_delimiter(after_newline)?;
    Some(start..end)
}

/// Find the byte position of the closing `---` line.
fn find_closing_delimiter(content: &str) -> Option<usize> {
    let mut pos = 0;
    for line in content.split_inclusive('\n') {
        if line.trim() == "---" {
            return Some(pos);
        }
        pos += line.len();
    }
    None
}

pub(crate) fn parse_lines(raw: &str) -> Result<PropertyMap, HeaderError> {
    let mut header = PropertyMap::new();

    for (idx, line) in raw.lines().enumerate() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }

        let Some((key, value_start)) = split_entry(line) else {
            if has_unterminated_list(trimmed) {
                return Err(unterminated(idx, trimmed));
            }
            continue;
        };

        let value = line[value_start..].trim();
        if !is_quoted(value) && has_unterminated_list(value) {
            return Err(unterminated(idx, trimmed));
        }
        if key.is_empty() {
            continue;
        }

        header.insert(key, parse_scalar(value));
    }

    Ok(header)
}

/// Split a header line into its key and the byte offset where the value
/// starts. Keys may be quoted to carry a `:` or a leading `#`.
pub(crate) fn split_entry(line: &str) -> Option<(String, usize)> {
    let rest = line.trim_start();
    let indent = line.len() - rest.len();

    if let Some(quote @ ('"' | '\'')) = rest.chars().next()
        && let Some(end) = closing_quote(rest, quote)
    {
        let after = &rest[end + 1..];
        let gap = after.len() - after.trim_start().len();
        if after[gap..].starts_with(':') {
            let key = match parse_scalar(&rest[..=end]) {
                Value::String(s) => s,
                other => other.to_string(),
            };
            return Some((key, indent + end + 1 + gap + 1));
        }
    }

    let colon = rest.find(':')?;
    Some((rest[..colon].trim().to_string(), indent + colon + 1))
}

/// Byte index of the quote closing the one at the start of `s`.
fn closing_quote(s: &str, quote: char) -> Option<usize> {
    let mut chars = s.char_indices().skip(1).peekable();
    while let Some((i, c)) = chars.next() {
        if quote == '"' && c == '\\' {
            chars.next();
        } else if c == quote {
            if quote == '\'' && chars.peek().is_some_and(|&(_, next)| next == '\'') {
                chars.next();
            } else {
                return Some(i);
            }
        }
    }
    None
}

fn unterminated(idx: usize, text: &str) -> HeaderError {
    HeaderError::UnterminatedList { line: idx + 1, text: text.to_string() }
}

fn has_unterminated_list(s: &str) -> bool {
    s.contains('[') && !s.contains(']')
}

fn is_quoted(s: &str) -> bool {
    s.len() >= 2
        && ((s.starts_with('"') && s.ends_with('"')) || (s.starts_with('\'') && s.ends_with('\'')))
}

/// Parse a single header value: quoted string, integer, decimal, boolean,
/// inline list or bare string. An empty value is null.
pub fn parse_scalar(raw: &str) -> Value {
    let value = raw.trim();
    if value.is_empty() {
        return Value::Null;
    }

    if value.len() >= 2 && value.starts_with('"') && value.ends_with('"') {
        return serde_json::from_str::<String>(value)
            .map(Value::String)
            .unwrap_or_else(|_| Value::String(value[1..value.len() - 1].to_string()));
    }
    if value.len() >= 2 && value.starts_with('\'') && value.ends_with('\'') {
        return Value::String(value[1..value.len() - 1].replace("''", "'"));
    }

    if let Some(inner) = value.strip_prefix('[').and_then(|v| v.strip_suffix(']')) {
        return Value::Array(split_list_items(inner).into_iter().map(parse_scalar).collect());
    }

    if value.eq_ignore_ascii_case("true") {
        return Value::Bool(true);
    }
    if value.eq_ignore_ascii_case("false") {
        return Value::Bool(false);
    }

    parse_number(value).unwrap_or_else(|| Value::String(value.to_string()))
}

/// Split inline list content on commas that are not inside quotes.
fn split_list_items(inner: &str) -> Vec<&str> {
    let mut items = Vec::new();
    let mut quote: Option<char> = None;
    let mut escaped = false;
    let mut start = 0;

    for (i, c) in inner.char_indices() {
        match quote {
            Some('"') if escaped => escaped = false,
            Some('"') if c == '\\' => escaped = true,
            Some(q) if c == q => quote = None,
            Some(_) => {}
            None if c == '"' || c == '\'' => quote = Some(c),
            None if c == ',' => {
                items.push(inner[start..i].trim());
                start = i + 1;
            }
            None => {}
        }
    }
    items.push(inner[start..].trim());

    if items.len() == 1 && items[0].is_empty() {
        return vec![];
    }
    items
}
