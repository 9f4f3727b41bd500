//! Input selection shared by the checker and the uploader: one folder, all
//! folders under a root, or an upload plan file.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde_json::Value;
use textloader_shared::{
    Content, INSTANCE_PAYLOAD_FILE, InstanceMetadata, InstancePayload, Result, TEXT_METADATA_FILE,
    TextLoaderError, TextMetadata, ensure_list, load_json,
};

/// Where the items of a batch come from.
#[derive(Debug, Clone)]
pub enum InputSelection {
    /// A single `input_json/<title>` folder.
    Folder(PathBuf),
    /// Every subfolder of a root, in name order.
    All(PathBuf),
    /// An upload plan file (list of `{text, instance | content}` items).
    Plan(PathBuf),
}

/// One unit of work in a batch, not yet read beyond what selection needs.
#[derive(Debug, Clone)]
pub struct BatchItem {
    /// Position in the full selection (before any start/limit window).
    pub index: usize,
    /// Folder name, or `plan[<index>]` for plan items.
    pub label: String,
    source: ItemSource,
}

#[derive(Debug, Clone)]
enum ItemSource {
    Folder(PathBuf),
    Plan(Value),
}

/// Resolve a selection into ordered batch items.
///
/// Missing paths and unreadable plan files are configuration errors.
/// Problems inside a single folder surface later, per item.
pub fn collect_items(selection: &InputSelection) -> Result<Vec<BatchItem>> {
    match selection {
        InputSelection::Folder(folder) => {
            if !folder.is_dir() {
                return Err(TextLoaderError::config(format!(
                    "missing input folder: {}",
                    folder.display()
                )));
            }
            Ok(vec![BatchItem::folder(0, folder.clone())])
        }
        InputSelection::All(root) => {
            if !root.is_dir() {
                return Err(TextLoaderError::config(format!(
                    "missing input root directory: {}",
                    root.display()
                )));
            }
            let entries = std::fs::read_dir(root).map_err(|e| TextLoaderError::io(root, e))?;
            let mut folders: Vec<PathBuf> = entries
                .filter_map(|entry| entry.ok().map(|e| e.path()))
                .filter(|p| p.is_dir())
                .collect();
            folders.sort();
            Ok(folders
                .into_iter()
                .enumerate()
                .map(|(index, folder)| BatchItem::folder(index, folder))
                .collect())
        }
        InputSelection::Plan(path) => {
            let plan: Value = load_json(path).map_err(|e| {
                TextLoaderError::config(format!("cannot read plan {}: {e}", path.display()))
            })?;
            Ok(ensure_list(plan)
                .into_iter()
                .enumerate()
                .map(|(index, entry)| BatchItem {
                    index,
                    label: format!("plan[{index}]"),
                    source: ItemSource::Plan(entry),
                })
                .collect())
        }
    }
}

/// Apply the `--start` / `--limit` window.
pub fn window<T>(items: Vec<T>, start: usize, limit: Option<usize>) -> Vec<T> {
    let items = items.into_iter().skip(start);
    match limit {
        Some(limit) => items.take(limit).collect(),
        None => items.collect(),
    }
}

/// Validate `--sleep-seconds`; zero means no pause.
pub fn pacing(sleep_seconds: f64) -> Result<Option<Duration>> {
    let pause = Duration::try_from_secs_f64(sleep_seconds).map_err(|_| {
        TextLoaderError::config(format!("invalid sleep duration: {sleep_seconds}"))
    })?;
    Ok((!pause.is_zero()).then_some(pause))
}

impl BatchItem {
    fn folder(index: usize, folder: PathBuf) -> Self {
        let label = folder
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| folder.display().to_string());
        Self {
            index,
            label,
            source: ItemSource::Folder(folder),
        }
    }

    /// The folder backing this item, if it came from one.
    pub fn folder_path(&self) -> Option<&Path> {
        match &self.source {
            ItemSource::Folder(path) => Some(path),
            ItemSource::Plan(_) => None,
        }
    }

    /// Read the text metadata: `text_metadata.json`, or the plan's `text` object.
    pub fn text_metadata(&self) -> Result<TextMetadata> {
        match &self.source {
            ItemSource::Folder(folder) => {
                let path = folder.join(TEXT_METADATA_FILE);
                if !path.is_file() {
                    return Err(TextLoaderError::validation(format!(
                        "missing {}",
                        path.display()
                    )));
                }
                load_json(&path)
            }
            ItemSource::Plan(entry) => {
                let text = entry
                    .as_object()
                    .ok_or_else(|| TextLoaderError::validation("item must be a JSON object"))?
                    .get("text")
                    .filter(|t| t.is_object())
                    .ok_or_else(|| TextLoaderError::validation("item must include a 'text' object"))?;
                serde_json::from_value(text.clone())
                    .map_err(|e| TextLoaderError::parse(format!("invalid 'text' object: {e}")))
            }
        }
    }

    /// Read the instance payload: `instance_payload.json`, the plan's
    /// `instance` object, or one assembled from the plan's `content`.
    ///
    /// `default_metadata` fills in a missing `metadata`.
    pub fn instance_payload(
        &self,
        default_metadata: Option<&InstanceMetadata>,
    ) -> Result<InstancePayload> {
        let mut payload: InstancePayload = match &self.source {
            ItemSource::Folder(folder) => {
                let path = folder.join(INSTANCE_PAYLOAD_FILE);
                if !path.is_file() {
                    return Err(TextLoaderError::validation(format!(
                        "missing {}",
                        path.display()
                    )));
                }
                load_json(&path)?
            }
            ItemSource::Plan(entry) => {
                let item = entry
                    .as_object()
                    .ok_or_else(|| TextLoaderError::validation("item must be a JSON object"))?;
                match item.get("instance") {
                    Some(instance) if instance.is_object() => serde_json::from_value(instance.clone())
                        .map_err(|e| {
                            TextLoaderError::parse(format!("invalid 'instance' object: {e}"))
                        })?,
                    _ => {
                        let content = item.get("content").ok_or_else(|| {
                            TextLoaderError::validation("item must include 'instance' or 'content'")
                        })?;
                        InstancePayload {
                            metadata: None,
                            annotation: item.get("annotation").cloned(),
                            content: Some(Content::from_value(content)?),
                            extra: Default::default(),
                        }
                    }
                }
            }
        };
        if payload.metadata.is_none() {
            payload.metadata = default_metadata.cloned();
        }
        Ok(payload)
    }

    /// Path of `name` inside the item's folder.
    pub fn folder_file(&self, name: &str) -> Option<PathBuf> {
        self.folder_path().map(|f| f.join(name))
    }
}
