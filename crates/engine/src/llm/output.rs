//! Structured-output handling for model responses.
//!
//! Providers return free text even when asked for JSON; models wrap payloads
//! in prose or markdown fences. Extraction is tolerant, validation is not:
//! output that cannot be parsed into a JSON object is reported as invalid,
//! never propagated as a raw parse error.

use regex::Regex;
use serde_json::Value;

/// Attempt to pull a JSON value out of model output. Tries, in order: the
/// whole text, a fenced ```json block, the first balanced `{...}` span.
pub fn extract_json(text: &str) -> Option<Value> {
    let trimmed = text.trim();

    if let Ok(value) = serde_json::from_str::<Value>(trimmed) {
        return Some(value);
    }

    let fence = Regex::new(r"```(?:json)?\s*([\s\S]*?)```").ok()?;
    if let Some(captures) = fence.captures(trimmed) {
        if let Some(block) = captures.get(1) {
            if let Ok(value) = serde_json::from_str::<Value>(block.as_str().trim()) {
                return Some(value);
            }
        }
    }

    first_balanced_object(trimmed).and_then(|span| serde_json::from_str::<Value>(span).ok())
}

/// Parse model output expected to be a JSON object. The error string becomes
/// the `llm_output_invalid` failure message.
pub fn parse_structured(text: &str) -> std::result::Result<Value, String> {
    match extract_json(text) {
        Some(value @ Value::Object(_)) => Ok(value),
        Some(other) => Err(format!(
            "expected a JSON object, got {}",
            json_type_name(&other)
        )),
        None => Err("model output contains no parseable JSON".to_string()),
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// First `{...}` span with balanced braces, respecting string literals.
fn first_balanced_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let bytes = text.as_bytes();
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, &byte) in bytes[start..].iter().enumerate() {
        if in_string {
            if escaped {
                escaped = false;
            } else if byte == b'\\' {
                escaped = true;
            } else if byte == b'"' {
                in_string = false;
            }
            continue;
        }
        match byte {
            b'"' => in_string = true,
            b'{' => depth += 1,
            b'}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..start + offset + 1]);
                }
            }
            _ => {}
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_clean_json() {
        let value = parse_structured(r#"{"score": 72, "tier": "warm"}"#).unwrap();
        assert_eq!(value["score"], 72);
    }

    #[test]
    fn parses_fenced_json() {
        let text = "Here is the analysis:\n```json\n{\"quality_score\": 61.5}\n```\nLet me know.";
        let value = parse_structured(text).unwrap();
        assert_eq!(value["quality_score"], 61.5);
    }

    #[test]
    fn parses_json_embedded_in_prose() {
        let text = "Sure! The result is {\"valid\": true, \"note\": \"has } in string\"} as requested.";
        let value = parse_structured(text).unwrap();
        assert_eq!(value["valid"], true);
        assert_eq!(value["note"], "has } in string");
    }

    #[test]
    fn rejects_non_object_json() {
        let err = parse_structured("[1, 2, 3]").unwrap_err();
        assert!(err.contains("an array"));
    }

    #[test]
    fn rejects_plain_prose() {
        let err = parse_structured("I could not produce an analysis for this response.").unwrap_err();
        assert!(err.contains("no parseable JSON"));
    }

    #[test]
    fn rejects_unbalanced_braces() {
        assert!(parse_structured("{\"oops\": ").is_err());
    }

    #[test]
    fn extract_prefers_whole_text() {
        let value = extract_json(" {\"a\": 1} ").unwrap();
        assert_eq!(value, json!({"a": 1}));
    }
}
