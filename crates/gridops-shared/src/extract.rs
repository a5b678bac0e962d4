//! Structured-output extraction from free-form backend text.
//!
//! Backend replies are unreliable prose. Extraction here is permissive on
//! input and strict on output: a payload is either a complete JSON object or
//! absent, never partially parsed.

use serde_json::{Map, Value};

const FENCE: &str = "```";

/// A JSON object recovered from backend text.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct StructuredPayload(Map<String, Value>);

impl StructuredPayload {
    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    /// String value of `key`. Null, missing and non-string values are `None`.
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(Value::as_str)
    }

    pub fn get_str_or<'a>(&'a self, key: &str, default: &'a str) -> &'a str {
        self.get_str(key).unwrap_or(default)
    }

    /// Number value of `key`, also accepting numeric strings.
    pub fn get_f64(&self, key: &str) -> Option<f64> {
        match self.0.get(key)? {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// Non-blank textual value of `key`; numbers are rendered as text.
    pub fn get_text(&self, key: &str) -> Option<String> {
        let text = match self.0.get(key)? {
            Value::String(s) => s.trim().to_string(),
            Value::Number(n) => n.to_string(),
            Value::Bool(b) => b.to_string(),
            _ => return None,
        };
        if text.is_empty() {
            None
        } else {
            Some(text)
        }
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }
}

/// Outcome of parsing backend text into a payload.
#[derive(Debug, Clone, PartialEq)]
pub enum Extracted {
    Payload(StructuredPayload),
    /// No usable object; carries the raw text for diagnostics.
    Malformed(String),
}

impl Extracted {
    pub fn payload(self) -> Option<StructuredPayload> {
        match self {
            Extracted::Payload(p) => Some(p),
            Extracted::Malformed(_) => None,
        }
    }
}

/// Parse backend text into a tagged result.
pub fn parse_structured(text: &str) -> Extracted {
    match extract_json(text) {
        Some(payload) => Extracted::Payload(payload),
        None => Extracted::Malformed(text.to_string()),
    }
}

/// Byte span of the first balanced `{ ... }` in `text`.
///
/// Braces inside JSON string literals are ignored.
fn first_object_span(text: &str) -> Option<(usize, usize)> {
    let start = text.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, ch) in text[start..].char_indices() {
        if in_string {
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == '"' {
                in_string = false;
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some((start, start + offset + ch.len_utf8()));
                }
            }
            _ => {}
        }
    }
    None
}

/// Extract the first JSON object embedded anywhere in `text`.
///
/// Returns `None` when there is no balanced object, when it does not parse,
/// or when it parses to something other than an object.
pub fn extract_json(text: &str) -> Option<StructuredPayload> {
    let (start, end) = first_object_span(text)?;
    match serde_json::from_str::<Value>(&text[start..end]) {
        Ok(Value::Object(map)) => Some(StructuredPayload(map)),
        _ => None,
    }
}

/// Body of the first fence tagged `language`, e.g. a ```` ```sql ```` block.
fn tagged_fence_body<'a>(text: &'a str, language: &str) -> Option<&'a str> {
    let lower = text.to_ascii_lowercase();
    let opener = format!("{}{}", FENCE, language.to_ascii_lowercase());
    let mut search_from = 0;

    while let Some(rel) = lower[search_from..].find(&opener) {
        let tag_end = search_from + rel + opener.len();
        // The tag must end here: "```sqlite" is not a "```sql" fence.
        let next = text[tag_end..].chars().next();
        if next.map_or(true, |c| c.is_whitespace()) {
            let body_start = tag_end;
            let body_end = text[body_start..]
                .find(FENCE)
                .map(|e| body_start + e)?;
            return Some(&text[body_start..body_end]);
        }
        search_from = tag_end;
    }
    None
}

/// Remove every fence marker, plus a `language` tag directly following one.
fn strip_fences(text: &str, language: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(pos) = rest.find(FENCE) {
        out.push_str(&rest[..pos]);
        rest = &rest[pos + FENCE.len()..];
        if rest.len() >= language.len()
            && rest.is_char_boundary(language.len())
            && rest[..language.len()].eq_ignore_ascii_case(language)
            && rest[language.len()..]
                .chars()
                .next()
                .map_or(true, |c| c.is_whitespace())
        {
            rest = &rest[language.len()..];
        }
    }
    out.push_str(rest);
    out
}

/// Extract a fenced code block tagged `language`.
///
/// Without such a block, stray fence markers are stripped and the trimmed
/// remainder is returned as a best-effort fallback. Blank results are `None`.
pub fn extract_code_fence(text: &str, language: &str) -> Option<String> {
    let candidate = match tagged_fence_body(text, language) {
        Some(body) => body.trim().to_string(),
        None => strip_fences(text, language).trim().to_string(),
    };
    if candidate.is_empty() {
        None
    } else {
        Some(candidate)
    }
}
