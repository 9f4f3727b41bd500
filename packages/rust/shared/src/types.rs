//! Core domain types for the per-text `input_json` folders.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::normalize::Content;

/// Metadata file written for every text folder.
pub const TEXT_METADATA_FILE: &str = "text_metadata.json";

/// Instance payload file written for every text folder.
pub const INSTANCE_PAYLOAD_FILE: &str = "instance_payload.json";

/// Translation payloads, written only when the text has translations.
pub const TRANSLATION_PAYLOADS_FILE: &str = "translation_payloads.json";

/// Translation plan written by the uploader next to the payloads, with
/// `instance_id` filled in.
pub const TRANSLATION_PLAN_FILE: &str = "translation_plan.json";

// ---------------------------------------------------------------------------
// Text metadata
// ---------------------------------------------------------------------------

/// Localized title of a text. `en` is always set by the builder.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LocalizedTitle {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bo: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub en: Option<String>,
    /// Other languages added by hand.
    #[serde(flatten)]
    pub other: Map<String, Value>,
}

/// `text_metadata.json`: the body of the create-text request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TextMetadata {
    #[serde(rename = "type", default)]
    pub text_type: Option<Value>,
    #[serde(default)]
    pub title: LocalizedTitle,
    #[serde(default)]
    pub language: Option<Value>,
    #[serde(default)]
    pub date: Option<Value>,
    /// BDRC work id; the registry lookup key. Kept as found so that a
    /// non-string id still reaches the create request.
    #[serde(default)]
    pub bdrc: Option<Value>,
    #[serde(default)]
    pub category_id: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contributions: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub license: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub copyright: Option<Value>,
    /// Fields added by the operator that the builder does not know about.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl TextMetadata {
    /// The BDRC id, if it is a non-blank string.
    pub fn bdrc_id(&self) -> Option<&str> {
        self.bdrc
            .as_ref()
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|b| !b.is_empty())
    }
}

// ---------------------------------------------------------------------------
// Instance payload
// ---------------------------------------------------------------------------

/// Descriptive metadata attached to an instance.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InstanceMetadata {
    #[serde(rename = "type", default)]
    pub instance_type: Option<Value>,
    #[serde(default)]
    pub source: Option<Value>,
    #[serde(default)]
    pub colophon: Option<Value>,
    #[serde(default)]
    pub incipit_title: Option<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// `instance_payload.json`: content and attributes of the canonical text.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InstancePayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<InstanceMetadata>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub annotation: Option<Value>,
    /// Content as stored on disk; may still be segmented.
    #[serde(default)]
    pub content: Option<Content>,
    /// Other top-level fields, forwarded with the create request.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

// ---------------------------------------------------------------------------
// Translation payloads
// ---------------------------------------------------------------------------

/// A `{start, end}` character span.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Span {
    pub start: Value,
    pub end: Value,
}

/// One segmentation entry; the span is passed through untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentSpan {
    pub span: Value,
}

/// A span with its position in the source annotation list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexedSpan {
    pub span: Span,
    pub index: usize,
}

/// An alignment span pointing at target segments by index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlignedSpan {
    pub span: Span,
    pub index: usize,
    pub alignment_index: Vec<usize>,
}

/// Author reference by person id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Author {
    pub person_id: Value,
}

/// One entry of `translation_payloads.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranslationPayload {
    pub language: Option<Value>,
    pub content: Content,
    pub title: String,
    pub source: Option<Value>,
    pub category_id: Option<Value>,
    pub segmentation: Vec<SegmentSpan>,
    pub target_annotation: Vec<IndexedSpan>,
    pub alignment_annotation: Vec<AlignedSpan>,
    pub copyright: Option<Value>,
    pub license: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<Author>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn text_metadata_keeps_unknown_fields() {
        let raw = json!({
            "type": "root",
            "title": {"bo": "བོད", "en": "Tibet", "zh": "西藏"},
            "language": "bo",
            "date": null,
            "bdrc": " W1KG123 ",
            "category_id": "cat-1",
            "alt_titles": ["x"]
        });
        let meta: TextMetadata = serde_json::from_value(raw).unwrap();
        assert_eq!(meta.bdrc_id(), Some("W1KG123"));
        assert_eq!(meta.title.other["zh"], "西藏");
        assert_eq!(meta.extra["alt_titles"], json!(["x"]));
        assert!(meta.contributions.is_none());

        let back = serde_json::to_value(&meta).unwrap();
        assert_eq!(back["alt_titles"], json!(["x"]));
        assert!(back.get("contributions").is_none());
        assert!(back["date"].is_null());
    }

    #[test]
    fn blank_bdrc_is_absent() {
        let meta = TextMetadata {
            bdrc: Some(json!("   ")),
            ..Default::default()
        };
        assert_eq!(meta.bdrc_id(), None);
    }

    #[test]
    fn non_string_bdrc_parses_without_an_id() {
        let meta: TextMetadata = serde_json::from_value(json!({"bdrc": 12345})).unwrap();
        assert_eq!(meta.bdrc_id(), None);
        assert_eq!(serde_json::to_value(&meta).unwrap()["bdrc"], 12345);
    }

    #[test]
    fn instance_payload_accepts_segmented_content() {
        let raw = json!({
            "metadata": {"type": "diplomatic", "source": "BDRC"},
            "annotation": [],
            "content": ["line one", ["line two"], null],
            "instance_id": "I-old",
            "reviewed_by": "editor"
        });
        let payload: InstancePayload = serde_json::from_value(raw).unwrap();
        assert_eq!(payload.extra["reviewed_by"], "editor");
        assert_eq!(payload.extra["instance_id"], "I-old");
        assert_eq!(payload.content.unwrap().normalize(), "line one\nline two");
        assert_eq!(
            payload.metadata.unwrap().instance_type,
            Some(json!("diplomatic"))
        );
    }
}
