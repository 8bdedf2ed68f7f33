use serde::de::DeserializeOwned;

use crate::error::AgentError;

/// Extract the first JSON object from model output that may carry prose or
/// a fenced code block around it.
///
/// Tried in order: the whole trimmed text, the first fenced block (with or
/// without a language tag), then the first balanced `{ ... }` span.
pub fn extract_json(text: &str) -> Result<String, AgentError> {
    let trimmed = text.trim();

    let candidates = [
        Some(trimmed.to_string()).filter(|t| t.starts_with('{')),
        fenced_block(trimmed),
        first_object(trimmed),
    ];

    candidates
        .into_iter()
        .flatten()
        .find(|candidate| serde_json::from_str::<serde_json::Value>(candidate).is_ok_and(|v| v.is_object()))
        .ok_or_else(|| {
            AgentError::Parse(format!(
                "No JSON object found in model output (length={})",
                text.len()
            ))
        })
}

/// Parse model output into `T`, tolerating surrounding text.
pub fn parse_structured<T: DeserializeOwned>(raw: &str) -> Result<T, AgentError> {
    let json = extract_json(raw)?;
    serde_json::from_str(&json)
        .map_err(|e| AgentError::Parse(format!("{e} in {json}")))
}

/// Body of the first ``` fenced block. The language tag, if any, runs to the
/// end of the opening line.
fn fenced_block(text: &str) -> Option<String> {
    let open = text.find("```")?;
    let after_fence = &text[open + 3..];
    let body_start = after_fence.find('\n')? + 1;
    let body = &after_fence[body_start..];
    let close = body.find("```")?;
    Some(body[..close].trim().to_string())
}

/// First balanced `{ ... }` span, skipping braces inside string literals.
fn first_object(text: &str) -> Option<String> {
    let start = text.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, ch) in text[start..].char_indices() {
        if in_string {
            match ch {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(text[start..=start + offset].to_string());
                }
            }
            _ => {}
        }
    }
    None
}
