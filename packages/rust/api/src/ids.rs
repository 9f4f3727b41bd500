//! Identifier extraction from create responses.
//!
//! The API is not consistent about where it puts the new id, so we search:
//! a bare string, a Mongo-style `{"$oid": ...}`, the known id keys in
//! order, then every nested value depth-first.

use serde_json::Value;

const ID_KEYS: &[&str] = &["id", "text_id", "textId", "instance_id", "instanceId"];

/// Find the first identifier in a response body.
pub fn extract_id(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Object(map) => {
            let oid = map.get("$oid").and_then(Value::as_str);
            if let Some(oid) = oid.filter(|oid| !oid.is_empty()) {
                return Some(oid.to_string());
            }
            ID_KEYS
                .iter()
                .filter_map(|key| map.get(*key))
                .chain(map.values())
                .find_map(extract_id)
        }
        Value::Array(items) => items.iter().find_map(extract_id),
        _ => None,
    }
}
