//! Shape of the corpus files in the source directory.

use serde::Deserialize;
use serde_json::{Map, Value};
use textloader_shared::Content;

/// One source file: a root text plus its translations.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SourceDocument {
    /// Only the first root text is used.
    #[serde(default)]
    pub root_texts: Option<Vec<SourceEntry>>,
    #[serde(default)]
    pub translations: Option<Vec<SourceEntry>>,
}

impl SourceDocument {
    pub fn root(&self) -> Option<&SourceEntry> {
        self.root_texts.as_deref().and_then(<[SourceEntry]>::first)
    }

    pub fn translations(&self) -> &[SourceEntry] {
        self.translations.as_deref().unwrap_or_default()
    }
}

/// A root text or translation entry.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SourceEntry {
    #[serde(default)]
    pub metadata: Option<Map<String, Value>>,
    #[serde(default)]
    pub content: Option<Content>,
    #[serde(default)]
    pub segment_annotation: Option<Vec<Value>>,
    #[serde(default)]
    pub target_annotation: Option<Vec<Value>>,
    #[serde(default)]
    pub alignment_annotation: Option<Vec<Value>>,
}

impl SourceEntry {
    /// Metadata field lookup; missing metadata behaves like an empty object.
    pub fn meta(&self, key: &str) -> Option<&Value> {
        self.metadata.as_ref().and_then(|m| m.get(key))
    }

    /// Whether the metadata object has `key` at all (even as `null`).
    pub fn has_meta(&self, key: &str) -> bool {
        self.metadata.as_ref().is_some_and(|m| m.contains_key(key))
    }
}
