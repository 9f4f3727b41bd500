//! Translation uploader: submit each entry of a translation plan to its
//! instance's translation endpoint.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{Map, Value, json};
use tracing::{info, instrument, warn};

use textloader_api::TextApiClient;
use textloader_shared::{ApiSettings, Content, Result, TextLoaderError, ensure_list, load_json};

use crate::input::{pacing, window};
use crate::progress::BatchProgress;
use crate::uploader::ItemStatus;

/// Annotation fields removed by `--strip-annotations`.
const ANNOTATION_KEYS: &[&str] = &["segmentation", "target_annotation", "alignment_annotation"];

/// Configuration for [`upload_translations`].
#[derive(Debug, Clone)]
pub struct TranslationUploadConfig {
    pub plan_path: PathBuf,
    pub api: ApiSettings,
    /// Record entries without `instance_id` as skipped instead of failed.
    pub skip_missing_instance_id: bool,
    pub strip_annotations: bool,
    /// Added as `author.person_id` to entries without an author.
    pub author_person_id: Option<String>,
    pub dry_run: bool,
    pub start: usize,
    pub limit: Option<usize>,
    pub sleep_seconds: f64,
}

impl TranslationUploadConfig {
    pub fn new(plan_path: impl Into<PathBuf>, api: ApiSettings) -> Self {
        Self {
            plan_path: plan_path.into(),
            api,
            skip_missing_instance_id: false,
            strip_annotations: false,
            author_person_id: None,
            dry_run: false,
            start: 0,
            limit: None,
            sleep_seconds: 0.0,
        }
    }
}

/// Outcome of one plan entry.
#[derive(Debug, Clone, Serialize)]
pub struct TranslationRecord {
    pub index: usize,
    pub status: ItemStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instance_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response: Option<Value>,
    /// Planned body, recorded on dry runs.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload: Option<Value>,
}

impl TranslationRecord {
    fn new(index: usize, status: ItemStatus) -> Self {
        Self {
            index,
            status,
            instance_id: None,
            language: None,
            message: None,
            error: None,
            response: None,
            payload: None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TranslationReport {
    pub generated_at: DateTime<Utc>,
    pub items: Vec<TranslationRecord>,
}

impl TranslationReport {
    pub fn count(&self, status: ItemStatus) -> usize {
        self.items.iter().filter(|r| r.status == status).count()
    }
}

/// Upload every entry of the plan file in order.
///
/// A missing or malformed plan file is an `Err`; problems with individual
/// entries are recorded and the batch continues.
#[instrument(skip_all, fields(plan = %config.plan_path.display(), dry_run = config.dry_run))]
pub async fn upload_translations(
    config: &TranslationUploadConfig,
    progress: &dyn BatchProgress,
) -> Result<TranslationReport> {
    let plan: Value = load_json(&config.plan_path).map_err(|e| {
        TextLoaderError::config(format!(
            "cannot read translation plan {}: {e}",
            config.plan_path.display()
        ))
    })?;
    let entries = window(
        ensure_list(plan).into_iter().enumerate().collect(),
        config.start,
        config.limit,
    );
    let pause = pacing(config.sleep_seconds)?;
    let client = TextApiClient::new(config.api.clone())?;

    progress.phase(if config.dry_run {
        "Planning translations"
    } else {
        "Uploading translations"
    });
    let total = entries.len();
    let mut records = Vec::with_capacity(total);
    for (i, (index, entry)) in entries.iter().enumerate() {
        progress.item_started(&format!("plan[{index}]"), i + 1, total);

        let record = upload_entry(&client, config, *index, entry).await;
        match record.status {
            ItemStatus::Failed => warn!(
                index,
                error = record.error.as_deref().unwrap_or_default(),
                "translation failed"
            ),
            ItemStatus::Skipped => info!(index, "skipping (missing instance_id)"),
            ItemStatus::Uploaded => {
                info!(index, instance_id = ?record.instance_id, "translation uploaded")
            }
            ItemStatus::Planned => {}
        }

        let posted = matches!(record.status, ItemStatus::Uploaded)
            || (record.status == ItemStatus::Failed && record.instance_id.is_some());
        records.push(record);
        if let Some(pause) = pause.filter(|_| posted && i + 1 < total) {
            tokio::time::sleep(pause).await;
        }
    }

    let report = TranslationReport {
        generated_at: Utc::now(),
        items: records,
    };
    progress.done(&format!(
        "{} uploaded, {} skipped, {} failed, {} planned",
        report.count(ItemStatus::Uploaded),
        report.count(ItemStatus::Skipped),
        report.count(ItemStatus::Failed),
        report.count(ItemStatus::Planned)
    ));
    Ok(report)
}

async fn upload_entry(
    client: &TextApiClient,
    config: &TranslationUploadConfig,
    index: usize,
    entry: &Value,
) -> TranslationRecord {
    let Some(entry) = entry.as_object() else {
        return TranslationRecord {
            error: Some("item must be a JSON object".into()),
            ..TranslationRecord::new(index, ItemStatus::Failed)
        };
    };

    let instance_id = match entry.get("instance_id") {
        Some(Value::String(id)) => Some(id.trim().to_string()),
        Some(Value::Number(id)) => Some(id.to_string()),
        _ => None,
    }
    .filter(|id| !id.is_empty());
    let Some(instance_id) = instance_id else {
        return if config.skip_missing_instance_id {
            TranslationRecord {
                message: Some("missing instance_id".into()),
                ..TranslationRecord::new(index, ItemStatus::Skipped)
            }
        } else {
            TranslationRecord {
                error: Some("missing required 'instance_id'".into()),
                ..TranslationRecord::new(index, ItemStatus::Failed)
            }
        };
    };

    let mut record = TranslationRecord {
        instance_id: Some(instance_id.clone()),
        ..TranslationRecord::new(index, ItemStatus::Failed)
    };
    let payload = match build_translation_body(
        entry,
        config.strip_annotations,
        config.author_person_id.as_deref(),
    ) {
        Ok(payload) => payload,
        Err(e) => {
            record.error = Some(e.to_string());
            return record;
        }
    };
    record.language = payload.get("language").cloned();

    if config.dry_run {
        record.status = ItemStatus::Planned;
        record.payload = Some(payload);
        return record;
    }

    match client.create_translation(&instance_id, &payload).await {
        Ok(response) => {
            record.status = ItemStatus::Uploaded;
            record.response = response.body;
        }
        Err(e) => record.error = Some(e.to_string()),
    }
    record
}

/// Build the submitted body for one plan entry: its `translation` object
/// when present, otherwise the entry without `instance_id`.
pub fn build_translation_body(
    entry: &Map<String, Value>,
    strip_annotations: bool,
    author_person_id: Option<&str>,
) -> Result<Value> {
    let mut payload = match entry.get("translation") {
        Some(Value::Object(translation)) => translation.clone(),
        _ => {
            let mut payload = entry.clone();
            payload.remove("instance_id");
            payload
        }
    };

    let content = payload
        .get("content")
        .ok_or_else(|| TextLoaderError::validation("missing required 'content'"))?;
    let content = Content::from_value(content)?.normalize();
    payload.insert("content".into(), Value::String(content));

    if strip_annotations {
        for key in ANNOTATION_KEYS {
            payload.remove(*key);
        }
    }
    if let Some(person_id) = author_person_id.filter(|_| !payload.contains_key("author")) {
        payload.insert("author".into(), json!({ "person_id": person_id }));
    }
    Ok(Value::Object(payload))
}
