//! Shared plumbing for interpreting model replies.

use serde::Serialize;

const SNIPPET_CHARS: usize = 120;

/// Appended to a prompt when the first reply failed schema parsing.
pub(crate) const STRICT_JSON_DIRECTIVE: &str = "Your previous reply could not be parsed. \
Respond with ONLY one JSON object matching the requested schema. No prose, no code fences.";

/// Pull the first JSON object out of a reply that may wrap it in code
/// fences or surrounding prose.
pub(crate) fn extract_json(text: &str) -> Option<&str> {
    if let Some(start) = text.find("```json") {
        let rest = &text[start + "```json".len()..];
        if let Some(end) = rest.find("```") {
            let candidate = rest[..end].trim();
            if !candidate.is_empty() {
                return Some(candidate);
            }
        }
    }

    if let Some(start) = text.find("```\n{") {
        let rest = &text[start + "```\n".len()..];
        if let Some(end) = rest.find("```") {
            let candidate = rest[..end].trim();
            if !candidate.is_empty() {
                return Some(candidate);
            }
        }
    }

    let open = text.find('{')?;
    let close = text.rfind('}')?;
    if close > open {
        return Some(&text[open..=close]);
    }

    None
}

pub(crate) fn clamp_unit(value: f64) -> f64 {
    value.clamp(0.0, 1.0)
}

/// JSON-encode a value for prompt interpolation. Our own types cannot fail
/// to serialize, so a fault degrades to an empty object instead of aborting
/// the run.
pub(crate) fn encode_json<T: Serialize>(value: &T) -> String {
    serde_json::to_string(value).unwrap_or_else(|_| "{}".to_string())
}

/// Short quote of a reply for error text. Keeps diagnostics useful without
/// echoing whole completions into logs and persisted outcomes.
pub(crate) fn reply_snippet(reply: &str) -> String {
    let trimmed = reply.trim();
    if trimmed.chars().count() <= SNIPPET_CHARS {
        return trimmed.to_string();
    }
    let cut: String = trimmed.chars().take(SNIPPET_CHARS).collect();
    format!("{cut}...")
}
