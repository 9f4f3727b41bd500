//! Value normalization applied before anything is written or submitted.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{Result, TextLoaderError};

// ---------------------------------------------------------------------------
// Content
// ---------------------------------------------------------------------------

/// Text content as found in source and payload files: a single string, or
/// (possibly nested) segments. The API only accepts the single-string form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Content {
    Text(String),
    Segments(Vec<Option<Content>>),
}

impl Default for Content {
    fn default() -> Self {
        Self::Text(String::new())
    }
}

impl Content {
    /// Flatten depth-first, drop nulls, and join with `\n`.
    pub fn normalize(&self) -> String {
        match self {
            Self::Text(text) => text.clone(),
            Self::Segments(_) => {
                let mut parts = Vec::new();
                self.collect_parts(&mut parts);
                parts.join("\n")
            }
        }
    }

    fn collect_parts<'a>(&'a self, parts: &mut Vec<&'a str>) {
        match self {
            Self::Text(text) => parts.push(text),
            Self::Segments(segments) => {
                for segment in segments.iter().flatten() {
                    segment.collect_parts(parts);
                }
            }
        }
    }

    /// Interpret an arbitrary JSON value as content. `null` is empty content.
    pub fn from_value(value: &Value) -> Result<Self> {
        if value.is_null() {
            return Ok(Self::default());
        }
        serde_json::from_value(value.clone()).map_err(|_| {
            TextLoaderError::validation("content must be a string or array of strings")
        })
    }
}

/// Normalize an optional JSON content value to the submitted string form.
pub fn normalize_content(value: Option<&Value>) -> Result<String> {
    match value {
        None => Ok(String::new()),
        Some(v) => Ok(Content::from_value(v)?.normalize()),
    }
}

// ---------------------------------------------------------------------------
// Copyright
// ---------------------------------------------------------------------------

/// Map the spellings seen in the corpus onto the API's copyright labels.
pub fn normalize_copyright(value: &Value) -> Value {
    let Some(raw) = value.as_str() else {
        return value.clone();
    };
    let label = match raw.trim().to_lowercase().as_str() {
        "unknown" | "unk" => "Unknown",
        "in copyright" | "in-copyright" => "In copyright",
        "public domain" | "public_domain" | "public-domain" => "Public domain",
        _ => return value.clone(),
    };
    Value::String(label.to_string())
}

// ---------------------------------------------------------------------------
// Metadata cleaning
// ---------------------------------------------------------------------------

/// Recursively drop blank strings, nulls, empty objects and empty arrays.
///
/// Empty arrays under a key listed in `preserve_empty` survive at any depth.
pub fn clean_metadata(value: &Value, preserve_empty: &[&str]) -> Value {
    match value {
        Value::Object(map) => {
            let mut cleaned = Map::new();
            for (key, item) in map {
                if is_blank_string(item) {
                    continue;
                }
                let item = clean_metadata(item, preserve_empty);
                match &item {
                    Value::Null => continue,
                    Value::Object(m) if m.is_empty() => continue,
                    Value::Array(a) if a.is_empty() => {
                        if preserve_empty.contains(&key.as_str()) {
                            cleaned.insert(key.clone(), item);
                        }
                        continue;
                    }
                    _ => {}
                }
                cleaned.insert(key.clone(), item);
            }
            Value::Object(cleaned)
        }
        Value::Array(items) => Value::Array(
            items
                .iter()
                .map(|item| clean_metadata(item, preserve_empty))
                .filter(|item| !is_empty_value(item))
                .collect(),
        ),
        other => other.clone(),
    }
}

fn is_blank_string(value: &Value) -> bool {
    matches!(value, Value::String(s) if s.trim().is_empty())
}

fn is_empty_value(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Object(m) => m.is_empty(),
        Value::Array(a) => a.is_empty(),
        _ => false,
    }
}

// ---------------------------------------------------------------------------
// Titles
// ---------------------------------------------------------------------------

/// Pick the display title from an incipit title that may be a plain string
/// or a language map. Prefers `bo`, then `en`, then `zh`, then any value.
/// Blank titles count as missing.
pub fn pick_title(incipit_title: Option<&Value>) -> Option<String> {
    match incipit_title? {
        Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
        Value::Object(map) => ["bo", "en", "zh"]
            .iter()
            .filter_map(|key| map.get(*key))
            .chain(map.values())
            .find_map(non_empty_str)
            .map(str::to_string),
        _ => None,
    }
}

fn non_empty_str(value: &Value) -> Option<&str> {
    value.as_str().filter(|s| !s.trim().is_empty())
}
