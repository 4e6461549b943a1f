//! Locate a JSON value inside free-form model output.
//!
//! Models wrap structured answers in prose ("Sure! Here is the result: {...}")
//! or markdown fences. [`locate_json`] tries, in order:
//!
//! 1. the whole (trimmed) text,
//! 2. each fenced code block (```` ```json ```` or a bare ```` ``` ````),
//! 3. the first balanced `{...}` or `[...]` substring that parses.
//!
//! The balanced scan tracks string literals and escapes, so braces inside
//! JSON strings do not end a candidate early.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

static FENCE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"```(?:json|JSON)?[ \t]*\r?\n?([\s\S]*?)```").expect("fence pattern is a valid regex")
});

/// Find the first JSON value embedded in `text`.
pub fn locate_json(text: &str) -> Option<Value> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return None;
    }

    if let Ok(value) = serde_json::from_str::<Value>(trimmed) {
        return Some(value);
    }

    for captures in FENCE.captures_iter(text) {
        if let Some(body) = captures.get(1) {
            if let Ok(value) = serde_json::from_str::<Value>(body.as_str().trim()) {
                return Some(value);
            }
        }
    }

    balanced_candidates(text).find_map(|candidate| serde_json::from_str(candidate).ok())
}

/// Balanced `{..}` / `[..]` substrings, ordered by start position.
///
/// One pass with a stack of open groups. A mismatched closer fails every
/// group still open. Quotes only open strings inside a group, so quoted
/// prose around the JSON does not hide it.
fn balanced_candidates(text: &str) -> impl Iterator<Item = &str> + '_ {
    let mut open: Vec<(usize, char)> = Vec::new();
    let mut spans: Vec<(usize, usize)> = Vec::new();
    let mut in_string = false;
    let mut escaped = false;

    for (idx, c) in text.char_indices() {
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

        match c {
            '"' if !open.is_empty() => in_string = true,
            '{' => open.push((idx, '}')),
            '[' => open.push((idx, ']')),
            '}' | ']' => match open.pop() {
                Some((start, closer)) if closer == c => spans.push((start, idx + c.len_utf8())),
                Some(_) => open.clear(),
                None => {}
            },
            _ => {}
        }
    }

    spans.sort_unstable_by_key(|(start, _)| *start);
    spans.into_iter().map(move |(start, end)| &text[start..end])
}
