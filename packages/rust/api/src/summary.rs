//! Compact payload summaries for error messages. Request bodies carry whole
//! texts, so failures report shapes and sizes instead of the raw payload.

use serde_json::{Map, Value};

/// Longest string echoed verbatim.
const MAX_INLINE_STRING: usize = 200;

/// Keys of nested objects worth echoing in a summary.
const FOCUS_KEYS: &[&str] = &[
    "type",
    "title",
    "language",
    "date",
    "bdrc",
    "category_id",
    "source",
    "colophon",
    "incipit_title",
    "copyright",
    "license",
];

/// Summarize a request body for display.
pub fn summarize_payload(payload: &Value) -> Value {
    let Value::Object(map) = payload else {
        return summarize_value(payload);
    };
    let summary: Map<String, Value> = map
        .iter()
        .map(|(key, value)| {
            let summarized = match key.as_str() {
                "content" => Value::String(format!(
                    "<content length={}>",
                    value.as_str().map_or(0, |s| s.chars().count())
                )),
                "annotation" => Value::String(format!(
                    "<annotation count={}>",
                    value.as_array().map_or(0, Vec::len)
                )),
                _ => summarize_value(value),
            };
            (key.clone(), summarized)
        })
        .collect();
    Value::Object(summary)
}

fn summarize_value(value: &Value) -> Value {
    match value {
        Value::String(s) if s.chars().count() > MAX_INLINE_STRING => {
            Value::String(format!("<string length={}>", s.chars().count()))
        }
        Value::Array(items) => Value::String(format!("<list length={}>", items.len())),
        Value::Object(map) => {
            let focused: Map<String, Value> = map
                .iter()
                .filter(|(key, _)| FOCUS_KEYS.contains(&key.as_str()))
                .map(|(key, v)| (key.clone(), summarize_value(v)))
                .collect();
            if !focused.is_empty() {
                return Value::Object(focused);
            }
            let keys: Vec<&str> = map.keys().take(6).map(String::as_str).collect();
            let more = if map.len() > 6 { "..." } else { "" };
            Value::String(format!("<dict keys={keys:?}{more}>"))
        }
        other => other.clone(),
    }
}
