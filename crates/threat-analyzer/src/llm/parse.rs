//! Structured-JSON extraction from mixed LLM output.
//!
//! Models frequently wrap JSON in prose or markdown fences. Extraction
//! strips fences, then walks the first balanced object or array while
//! tracking string context and escapes, so braces inside quoted strings
//! never affect the depth counter.

use std::sync::OnceLock;

use regex::Regex;
use serde_json::Value;

use super::provider::{LlmErrorKind, LlmFailure};

fn fence_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"```(?:[A-Za-z0-9_-]+)?\s*([\s\S]*?)```").expect("valid regex"))
}

/// Remove triple-backtick fences (with or without a language tag).
fn strip_fences(text: &str) -> String {
    text.replace("```json", "").replace("```", "")
}

/// Find the first balanced `{...}` or `[...]` slice, ignoring delimiters
/// inside quoted strings (including escaped quotes).
fn first_balanced_slice(text: &str, open: char, close: char) -> Option<&str> {
    let start = text.find(open)?;
    let mut depth: usize = 0;
    let mut in_string = false;
    let mut escaped = false;
    for (offset, c) in text[start..].char_indices() {
        if in_string {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }
        if c == '"' {
            in_string = true;
        } else if c == open {
            depth += 1;
        } else if c == close {
            // depth cannot underflow: the scan starts at the first `open`
            // and string delimiters are consumed above
            depth = depth.saturating_sub(1);
            if depth == 0 {
                return Some(&text[start..start + offset + c.len_utf8()]);
            }
        }
    }
    None
}

/// Extract the first JSON value from mixed text.
///
/// Returns `Empty` for blank input and `InvalidJson` when no parseable
/// object or array can be found.
pub fn extract_json(provider: &str, text: &str) -> Result<Value, LlmFailure> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(LlmFailure::new(
            LlmErrorKind::Empty,
            provider,
            "Empty response",
        ));
    }

    let cleaned = strip_fences(trimmed);
    for (open, close) in [('{', '}'), ('[', ']')] {
        if let Some(slice) = first_balanced_slice(&cleaned, open, close) {
            if let Ok(value) = serde_json::from_str(slice) {
                return Ok(value);
            }
        }
    }

    // Fenced-block fallback on the raw text.
    if let Some(captures) = fence_regex().captures(trimmed) {
        if let Ok(value) = serde_json::from_str(captures[1].trim()) {
            return Ok(value);
        }
    }

    Err(LlmFailure::new(
        LlmErrorKind::InvalidJson,
        provider,
        "Invalid JSON response",
    ))
}
