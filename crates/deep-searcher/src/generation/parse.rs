//! Parsing structured replies out of free-form LLM output

use regex::Regex;
use std::sync::OnceLock;

fn think_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"(?s)<think>.*?</think>").expect("Invalid regex"))
}

fn fence_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"(?s)```[a-zA-Z]*\s*(.*?)```").expect("Invalid regex"))
}

/// Remove `<think>…</think>` reasoning blocks emitted by reasoning models
pub fn strip_reasoning(text: &str) -> String {
    let stripped = think_pattern().replace_all(text, "");
    // An unterminated block means the reply was cut off inside the reasoning
    match stripped.find("<think>") {
        Some(pos) => stripped[..pos].trim().to_string(),
        None => stripped.trim().to_string(),
    }
}

/// Parse a JSON list of strings from an LLM reply
///
/// Reasoning blocks and code fences are ignored; the outermost `[...]` span is parsed.
/// Returns `None` when no list can be recovered. Blank entries are dropped.
pub fn parse_string_list(reply: &str) -> Option<Vec<String>> {
    let cleaned = strip_reasoning(reply);
    let body = fence_pattern()
        .captures(&cleaned)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str())
        .unwrap_or(cleaned.as_str());

    let start = body.find('[')?;
    let end = body.rfind(']')?;
    if end < start {
        return None;
    }

    let items: Vec<String> = serde_json::from_str(&body[start..=end]).ok()?;
    Some(
        items
            .into_iter()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect(),
    )
}
