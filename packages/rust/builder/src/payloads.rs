//! Source entry → API payload conversion.

use serde_json::Value;
use textloader_shared::{
    AlignedSpan, Author, Content, IndexedSpan, InstanceMetadata, InstancePayload, LocalizedTitle,
    SegmentSpan, Span, TextMetadata, TranslationPayload, normalize_copyright, pick_title,
};
use tracing::warn;

use crate::source::SourceEntry;

/// Build `text_metadata.json` from the root text's metadata.
///
/// `fallback_title` (the source file stem) fills `title.en` when the
/// incipit title has no English form.
pub fn build_text_metadata(root: &SourceEntry, fallback_title: &str) -> TextMetadata {
    let incipit = root.meta("incipit_title").and_then(Value::as_object);
    let localized = |lang: &str| {
        incipit
            .and_then(|m| m.get(lang))
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    };

    let title = LocalizedTitle {
        bo: localized("bo"),
        en: localized("en").or_else(|| Some(fallback_title.to_string())),
        ..Default::default()
    };

    let bdrc = root.meta("bdrc").filter(|v| !v.is_null()).cloned();
    if let Some(other) = bdrc.as_ref().filter(|v| !v.is_string()) {
        warn!(bdrc = %other, "non-string bdrc id cannot be looked up");
    }

    TextMetadata {
        text_type: Some(meta_or_null(root, "text_type")),
        title,
        language: Some(meta_or_null(root, "language")),
        date: Some(meta_or_null(root, "date")),
        bdrc,
        category_id: Some(meta_or_null(root, "category_id")),
        contributions: root
            .has_meta("contributions")
            .then(|| meta_or_null(root, "contributions")),
        license: root
            .has_meta("license")
            .then(|| meta_or_null(root, "license")),
        copyright: root
            .has_meta("copyright")
            .then(|| normalize_copyright(&meta_or_null(root, "copyright"))),
        extra: Default::default(),
    }
}

/// Build `instance_payload.json`. Content is written as found; segments
/// are joined only at upload time.
pub fn build_instance_payload(root: &SourceEntry) -> InstancePayload {
    InstancePayload {
        metadata: Some(InstanceMetadata {
            instance_type: Some(meta_or_null(root, "instance_type")),
            source: Some(meta_or_null(root, "source")),
            colophon: Some(meta_or_null(root, "colophon")),
            incipit_title: Some(meta_or_null(root, "incipit_title")),
            extra: Default::default(),
        }),
        annotation: Some(Value::Array(
            root.segment_annotation.clone().unwrap_or_default(),
        )),
        content: Some(root.content.clone().unwrap_or_default()),
        extra: Default::default(),
    }
}

/// Build one entry of `translation_payloads.json`.
pub fn build_translation_payload(entry: &SourceEntry, fallback_title: &str) -> TranslationPayload {
    let title = pick_title(entry.meta("incipit_title")).unwrap_or_else(|| fallback_title.into());

    let author = entry
        .meta("contributions")
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .find_map(|c| c.get("person_id").filter(|id| is_truthy(id)))
        .map(|person_id| Author {
            person_id: person_id.clone(),
        });

    let segmentation = entry
        .segment_annotation
        .iter()
        .flatten()
        .filter_map(|seg| seg.as_object()?.get("span"))
        .map(|span| SegmentSpan { span: span.clone() })
        .collect();

    // `index` is the position in the source list, skipped entries included.
    let target_annotation = entry
        .target_annotation
        .iter()
        .flatten()
        .enumerate()
        .filter_map(|(index, raw)| Some(IndexedSpan { span: span_of(raw)?, index }))
        .collect();

    let alignment_annotation = entry
        .alignment_annotation
        .iter()
        .flatten()
        .enumerate()
        .filter_map(|(index, raw)| {
            Some(AlignedSpan {
                span: span_of(raw)?,
                index,
                alignment_index: vec![index],
            })
        })
        .collect();

    TranslationPayload {
        language: Some(meta_or_null(entry, "language")),
        content: entry.content.clone().unwrap_or_default(),
        title,
        source: Some(meta_or_null(entry, "source")),
        category_id: Some(meta_or_null(entry, "category_id")),
        segmentation,
        target_annotation,
        alignment_annotation,
        copyright: Some(normalize_copyright(&meta_or_null(entry, "copyright"))),
        license: Some(meta_or_null(entry, "license")),
        author,
    }
}

fn meta_or_null(entry: &SourceEntry, key: &str) -> Value {
    entry.meta(key).cloned().unwrap_or(Value::Null)
}

fn span_of(raw: &Value) -> Option<Span> {
    let obj = raw.as_object()?;
    Some(Span {
        start: obj.get("start")?.clone(),
        end: obj.get("end")?.clone(),
    })
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::String(s) => !s.is_empty(),
        Value::Number(n) => n.as_f64() != Some(0.0),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn entry(raw: Value) -> SourceEntry {
        serde_json::from_value(raw).unwrap()
    }

    #[test]
    fn text_metadata_from_root() {
        let root = entry(json!({
            "metadata": {
                "text_type": "root",
                "incipit_title": {"bo": "ཤེས་རབ་སྙིང་པོ", "zh": "心經"},
                "language": "bo",
                "bdrc": "W1KG1234",
                "category_id": "cat-7",
                "copyright": "public-domain",
                "contributions": []
            }
        }));
        let meta = build_text_metadata(&root, "heart-sutra");

        assert_eq!(meta.title.bo.as_deref(), Some("ཤེས་རབ་སྙིང་པོ"));
        assert_eq!(meta.title.en.as_deref(), Some("heart-sutra"));
        assert_eq!(meta.bdrc_id(), Some("W1KG1234"));
        assert_eq!(meta.copyright, Some(json!("Public domain")));
        assert_eq!(meta.contributions, Some(json!([])));
        assert!(meta.license.is_none());

        let written = serde_json::to_value(&meta).unwrap();
        assert_eq!(written["type"], "root");
        assert!(written["date"].is_null());
        assert!(written.get("license").is_none());
    }

    #[test]
    fn non_string_bdrc_is_kept() {
        let root = entry(json!({"metadata": {"bdrc": 12345}}));
        let meta = build_text_metadata(&root, "x");
        assert_eq!(meta.bdrc, Some(json!(12345)));
        assert_eq!(meta.bdrc_id(), None);

        let root = entry(json!({"metadata": {"bdrc": null}}));
        assert_eq!(build_text_metadata(&root, "x").bdrc, None);
    }

    #[test]
    fn instance_payload_keeps_segments() {
        let root = entry(json!({
            "metadata": {"instance_type": "diplomatic", "colophon": "end"},
            "content": ["one", "two"],
            "segment_annotation": [{"span": {"start": 0, "end": 3}}]
        }));
        let payload = build_instance_payload(&root);
        let written = serde_json::to_value(&payload).unwrap();

        assert_eq!(written["content"], json!(["one", "two"]));
        assert_eq!(written["metadata"]["type"], "diplomatic");
        assert!(written["metadata"]["source"].is_null());
        assert_eq!(written["annotation"].as_array().unwrap().len(), 1);
    }

    #[test]
    fn instance_payload_defaults() {
        let payload = build_instance_payload(&SourceEntry::default());
        let written = serde_json::to_value(&payload).unwrap();
        assert_eq!(written["content"], "");
        assert_eq!(written["annotation"], json!([]));
    }

    #[test]
    fn translation_payload_annotations_keep_source_index() {
        let tr = entry(json!({
            "metadata": {
                "language": "en",
                "incipit_title": {"en": "Heart Sutra"},
                "contributions": [{"role": "translator"}, {"person_id": "P42"}],
                "copyright": "unknown"
            },
            "content": "Thus have I heard.",
            "segment_annotation": [{"span": {"start": 0, "end": 5}}, {"nospan": true}],
            "target_annotation": [{"start": 0}, {"start": 0, "end": 9}],
            "alignment_annotation": [{"start": 0, "end": 4}, "bogus", {"start": 5, "end": 9}]
        }));
        let payload = build_translation_payload(&tr, "fallback");

        assert_eq!(payload.title, "Heart Sutra");
        assert_eq!(payload.author, Some(Author { person_id: json!("P42") }));
        assert_eq!(payload.copyright, Some(json!("Unknown")));
        assert_eq!(payload.segmentation.len(), 1);

        assert_eq!(payload.target_annotation.len(), 1);
        assert_eq!(payload.target_annotation[0].index, 1);

        let indexes: Vec<usize> = payload.alignment_annotation.iter().map(|a| a.index).collect();
        assert_eq!(indexes, vec![0, 2]);
        assert_eq!(payload.alignment_annotation[1].alignment_index, vec![2]);
    }

    #[test]
    fn translation_title_falls_back_to_file_stem() {
        let payload = build_translation_payload(&SourceEntry::default(), "T1");
        assert_eq!(payload.title, "T1");
        assert!(payload.author.is_none());
        let written = serde_json::to_value(&payload).unwrap();
        assert!(written.get("author").is_none());
        assert!(written["license"].is_null());
    }
}
