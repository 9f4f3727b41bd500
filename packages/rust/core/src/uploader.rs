//! Uploader: create a text and its instance on the API for each item.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{info, instrument, warn};

use textloader_api::{BdrcLookup, TextApiClient};
use textloader_shared::{
    ApiSettings, InstanceMetadata, Result, TRANSLATION_PAYLOADS_FILE, TRANSLATION_PLAN_FILE,
    TextLoaderError, clean_metadata, load_json, write_json,
};

use crate::cache::BdrcCache;
use crate::checker::ALREADY_PRESENT;
use crate::input::{BatchItem, InputSelection, collect_items, pacing, window};
use crate::progress::BatchProgress;

/// Configuration for [`upload_texts`].
#[derive(Debug, Clone)]
pub struct UploadConfig {
    pub selection: InputSelection,
    pub api: ApiSettings,
    /// Skip items whose BDRC id already exists on the API.
    pub skip_existing: bool,
    /// Answer existence from this cache instead of live lookups.
    pub bdrc_cache: Option<PathBuf>,
    /// Build and record payloads without creating anything.
    pub dry_run: bool,
    pub start: usize,
    pub limit: Option<usize>,
    /// Pause after each item that reached the create endpoints.
    pub sleep_seconds: f64,
    /// Instance metadata used when an item has none.
    pub instance_metadata: Option<PathBuf>,
    /// Write `translation_plan.json` next to `translation_payloads.json`.
    pub write_translation_plan: bool,
}

impl UploadConfig {
    pub fn new(selection: InputSelection, api: ApiSettings) -> Self {
        Self {
            selection,
            api,
            skip_existing: false,
            bdrc_cache: None,
            dry_run: false,
            start: 0,
            limit: None,
            sleep_seconds: 0.0,
            instance_metadata: None,
            write_translation_plan: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemStatus {
    Uploaded,
    Skipped,
    Failed,
    /// Dry run: payloads were built but not sent.
    Planned,
}

/// Outcome of one item.
#[derive(Debug, Clone, Serialize)]
pub struct UploadRecord {
    pub index: usize,
    pub folder: String,
    pub status: ItemStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bdrc: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instance_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text_response: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instance_response: Option<Value>,
    /// Submitted (or, in a dry run, planned) bodies.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text_payload: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instance_payload: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub translation_plan: Option<PathBuf>,
}

impl UploadRecord {
    fn new(item: &BatchItem, status: ItemStatus) -> Self {
        Self {
            index: item.index,
            folder: item.label.clone(),
            status,
            bdrc: None,
            text_id: None,
            instance_id: None,
            message: None,
            error: None,
            text_response: None,
            instance_response: None,
            text_payload: None,
            instance_payload: None,
            translation_plan: None,
        }
    }

    fn failed(item: &BatchItem, error: impl Into<String>) -> Self {
        Self {
            error: Some(error.into()),
            ..Self::new(item, ItemStatus::Failed)
        }
    }
}

/// Result of one upload run.
#[derive(Debug, Clone, Serialize)]
pub struct UploadReport {
    pub generated_at: DateTime<Utc>,
    pub items: Vec<UploadRecord>,
    /// Created instance ids, in item order.
    pub instance_ids: Vec<String>,
}

impl UploadReport {
    pub fn count(&self, status: ItemStatus) -> usize {
        self.items.iter().filter(|r| r.status == status).count()
    }
}

/// Cleaned bodies for one item.
struct PreparedItem {
    bdrc: Option<String>,
    text: Value,
    instance: Value,
}

struct Uploader<'a> {
    client: TextApiClient,
    config: &'a UploadConfig,
    cache: Option<BdrcCache>,
    default_metadata: Option<InstanceMetadata>,
}

/// Upload every selected item in order.
///
/// `Err` is returned only for configuration problems found before the first
/// item: a missing input path, unreadable plan, cache, or instance metadata
/// file, or an invalid client setup. Everything else is a per-item record.
#[instrument(skip_all, fields(dry_run = config.dry_run, skip_existing = config.skip_existing))]
pub async fn upload_texts(
    config: &UploadConfig,
    progress: &dyn BatchProgress,
) -> Result<UploadReport> {
    let items = window(collect_items(&config.selection)?, config.start, config.limit);
    let pause = pacing(config.sleep_seconds)?;

    let cache = config.bdrc_cache.as_deref().map(BdrcCache::load).transpose()?;
    if let Some(cache) = &cache {
        info!(entries = cache.len(), "loaded BDRC cache");
    }
    let default_metadata = config
        .instance_metadata
        .as_deref()
        .map(|path| {
            load_json::<InstanceMetadata>(path).map_err(|e| {
                TextLoaderError::config(format!(
                    "cannot read instance metadata {}: {e}",
                    path.display()
                ))
            })
        })
        .transpose()?;

    let uploader = Uploader {
        client: TextApiClient::new(config.api.clone())?,
        config,
        cache,
        default_metadata,
    };

    progress.phase(if config.dry_run { "Planning uploads" } else { "Uploading texts" });
    let total = items.len();
    let mut records = Vec::with_capacity(total);
    for (i, item) in items.iter().enumerate() {
        progress.item_started(&item.label, i + 1, total);
        info!(index = item.index, folder = %item.label, "starting upload");

        let record = uploader.upload_item(item).await;
        match record.status {
            ItemStatus::Failed => warn!(
                index = record.index,
                folder = %record.folder,
                error = record.error.as_deref().unwrap_or_default(),
                "upload failed"
            ),
            ItemStatus::Skipped => info!(index = record.index, bdrc = ?record.bdrc, "skipped (bdrc exists)"),
            ItemStatus::Uploaded => info!(
                index = record.index,
                text_id = ?record.text_id,
                instance_id = ?record.instance_id,
                "uploaded"
            ),
            ItemStatus::Planned => {}
        }

        let reached_api = matches!(record.status, ItemStatus::Uploaded | ItemStatus::Failed);
        records.push(record);
        if let Some(pause) = pause.filter(|_| reached_api && !config.dry_run && i + 1 < total) {
            tokio::time::sleep(pause).await;
        }
    }

    let instance_ids = records
        .iter()
        .filter_map(|r| r.instance_id.clone())
        .collect();
    let report = UploadReport {
        generated_at: Utc::now(),
        items: records,
        instance_ids,
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

impl Uploader<'_> {
    async fn upload_item(&self, item: &BatchItem) -> UploadRecord {
        let prepared = match prepare(item, self.default_metadata.as_ref()) {
            Ok(prepared) => prepared,
            Err(e) => return UploadRecord::failed(item, e.to_string()),
        };

        if self.config.skip_existing {
            let Some(bdrc) = prepared.bdrc.as_deref() else {
                return UploadRecord::failed(item, "missing required 'bdrc' in text");
            };
            match self.bdrc_exists(bdrc).await {
                Ok(true) => {
                    return UploadRecord {
                        bdrc: prepared.bdrc.clone(),
                        text_id: self
                            .cache
                            .as_ref()
                            .and_then(|c| c.get(bdrc))
                            .and_then(|e| e.text_id.clone()),
                        message: Some(ALREADY_PRESENT.to_string()),
                        ..UploadRecord::new(item, ItemStatus::Skipped)
                    };
                }
                Ok(false) => {}
                Err(e) => {
                    return UploadRecord {
                        bdrc: prepared.bdrc.clone(),
                        ..UploadRecord::failed(item, format!("bdrc lookup failed: {e}"))
                    };
                }
            }
        }

        if self.config.dry_run {
            return UploadRecord {
                bdrc: prepared.bdrc,
                text_payload: Some(prepared.text),
                instance_payload: Some(prepared.instance),
                ..UploadRecord::new(item, ItemStatus::Planned)
            };
        }

        self.create(item, prepared).await
    }

    async fn bdrc_exists(&self, bdrc: &str) -> Result<bool> {
        if let Some(cache) = &self.cache {
            return Ok(cache.is_found(bdrc));
        }
        let lookup = self.client.get_text_by_bdrc(bdrc).await?;
        Ok(matches!(lookup, BdrcLookup::Found { .. }))
    }

    async fn create(&self, item: &BatchItem, prepared: PreparedItem) -> UploadRecord {
        let mut record = UploadRecord {
            bdrc: prepared.bdrc.clone(),
            ..UploadRecord::new(item, ItemStatus::Failed)
        };

        let text = match self.client.create_text(&prepared.text).await {
            Ok(response) => response,
            Err(e) => {
                record.error = Some(e.to_string());
                return record;
            }
        };
        let Some(text_id) = text.id() else {
            record.error = Some(format!("could not find text_id in response: {}", text.raw));
            record.text_response = text.body;
            return record;
        };
        info!(index = item.index, %text_id, "text created");
        record.text_id = Some(text_id.clone());
        record.text_response = text.body;

        let instance = match self.client.create_instance(&text_id, &prepared.instance).await {
            Ok(response) => response,
            Err(e) => {
                record.error = Some(e.to_string());
                return record;
            }
        };
        record.status = ItemStatus::Uploaded;
        record.instance_id = instance.id();
        record.instance_response = instance.body;

        let Some(instance_id) = record.instance_id.clone() else {
            warn!(index = item.index, "instance response carries no id");
            record.message = Some("instance created but no id found in response".to_string());
            return record;
        };

        let Some(folder) = item.folder_path().filter(|_| self.config.write_translation_plan) else {
            return record;
        };
        match write_translation_plan(folder, &instance_id) {
            Ok(plan) => record.translation_plan = plan,
            Err(e) => {
                warn!(index = item.index, error = %e, "translation plan not written");
                record.error = Some(format!("translation plan not written: {e}"));
            }
        }
        record
    }
}

/// Read, clean and normalize the bodies of one item.
fn prepare(item: &BatchItem, default_metadata: Option<&InstanceMetadata>) -> Result<PreparedItem> {
    let metadata = item.text_metadata()?;
    let bdrc = metadata.bdrc_id().map(str::to_string);
    let text = clean_metadata(&to_value(&metadata)?, &["contributions"]);

    let instance = item.instance_payload(default_metadata)?;
    let mut body: Map<String, Value> = instance.extra;
    body.remove("instance_id");
    if let Some(meta) = &instance.metadata {
        let cleaned = clean_metadata(&to_value(meta)?, &[]);
        if cleaned.as_object().is_some_and(|m| !m.is_empty()) {
            body.insert("metadata".into(), cleaned);
        }
    }
    if let Some(annotation) = instance.annotation {
        body.insert("annotation".into(), annotation);
    }
    let content = instance.content.unwrap_or_default().normalize();
    body.insert("content".into(), Value::String(content));

    Ok(PreparedItem {
        bdrc,
        text,
        instance: Value::Object(body),
    })
}

fn to_value<T: Serialize>(value: &T) -> Result<Value> {
    serde_json::to_value(value).map_err(|e| TextLoaderError::validation(e.to_string()))
}

/// Write `translation_plan.json` beside the folder's translation payloads,
/// adding `instance_id` to entries that lack one. The payload file itself
/// is left untouched. Returns `None` when the folder has no translations.
pub fn write_translation_plan(folder: &Path, instance_id: &str) -> Result<Option<PathBuf>> {
    let payloads_path = folder.join(TRANSLATION_PAYLOADS_FILE);
    if !payloads_path.is_file() {
        return Ok(None);
    }
    let Value::Array(entries) = load_json::<Value>(&payloads_path)? else {
        return Err(TextLoaderError::validation(format!(
            "expected a list in {}",
            payloads_path.display()
        )));
    };

    let mut plan = Vec::with_capacity(entries.len());
    for entry in entries {
        let Value::Object(mut entry) = entry else {
            return Err(TextLoaderError::validation(format!(
                "invalid translation entry in {}",
                payloads_path.display()
            )));
        };
        entry
            .entry("instance_id")
            .or_insert_with(|| Value::String(instance_id.to_string()));
        plan.push(Value::Object(entry));
    }

    let plan_path = folder.join(TRANSLATION_PLAN_FILE);
    write_json(&plan_path, &plan)?;
    Ok(Some(plan_path))
}
