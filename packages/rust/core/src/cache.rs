//! BDRC lookup cache file.
//!
//! One JSON object keyed by BDRC id. Written (additively) by the checker,
//! read by the uploader so `--skip-existing-bdrc` needs no network lookups.

use std::collections::BTreeMap;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use textloader_shared::{Result, TextLoaderError, ensure_list, load_json, write_json};

/// Cached lookup result for one BDRC id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    /// `true` only for a confirmed match.
    pub exists: bool,
    /// HTTP status of the lookup, when one was received.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
    /// Id of the existing text on the API.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text_id: Option<String>,
    /// Folder the id was read from.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub folder: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Why the lookup failed; such entries never count as found.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checked_at: Option<DateTime<Utc>>,
}

impl CacheEntry {
    pub fn found(&self) -> bool {
        self.exists && self.error.is_none()
    }
}

/// In-memory view of a cache file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BdrcCache {
    entries: BTreeMap<String, CacheEntry>,
}

impl BdrcCache {
    /// Load a cache file. Unreadable or malformed files are configuration errors.
    pub fn load(path: &Path) -> Result<Self> {
        let raw: Value = load_json(path).map_err(|e| {
            TextLoaderError::config(format!("cannot read BDRC cache {}: {e}", path.display()))
        })?;
        Self::from_value(raw).map_err(|e| {
            TextLoaderError::config(format!("invalid BDRC cache {}: {e}", path.display()))
        })
    }

    /// Parse either the keyed form or the older list-of-records form.
    pub fn from_value(raw: Value) -> Result<Self> {
        let keyed = matches!(&raw, Value::Object(map)
            if !map.get("items").is_some_and(Value::is_array) && !map.get("bdrc").is_some_and(Value::is_string));
        if keyed {
            let entries: BTreeMap<String, CacheEntry> = serde_json::from_value(raw)
                .map_err(|e| TextLoaderError::parse(e.to_string()))?;
            return Ok(Self { entries });
        }

        let mut cache = Self::default();
        for record in ensure_list(raw) {
            let Some(bdrc) = record.get("bdrc").and_then(Value::as_str) else {
                continue;
            };
            let entry = CacheEntry {
                exists: record.get("exists") == Some(&Value::Bool(true)),
                status: record
                    .get("status")
                    .and_then(Value::as_u64)
                    .and_then(|s| u16::try_from(s).ok()),
                text_id: None,
                folder: None,
                message: record
                    .get("message")
                    .and_then(Value::as_str)
                    .map(str::to_string),
                error: None,
                checked_at: None,
            };
            cache.entries.insert(bdrc.to_string(), entry);
        }
        Ok(cache)
    }

    pub fn insert(&mut self, bdrc: impl Into<String>, entry: CacheEntry) {
        self.entries.insert(bdrc.into(), entry);
    }

    pub fn get(&self, bdrc: &str) -> Option<&CacheEntry> {
        self.entries.get(bdrc)
    }

    /// Whether the cache records `bdrc` as already present on the API.
    pub fn is_found(&self, bdrc: &str) -> bool {
        self.get(bdrc).is_some_and(CacheEntry::found)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &CacheEntry)> {
        self.entries.iter()
    }

    /// Overlay `other` onto this cache; same-key entries are replaced.
    pub fn merge(&mut self, other: BdrcCache) {
        self.entries.extend(other.entries);
    }

    /// Write this cache to `path`, keeping entries already in the file that
    /// this run did not touch. Returns the merged cache.
    pub fn save_merged(&self, path: &Path) -> Result<BdrcCache> {
        let mut merged = if path.exists() {
            Self::load(path)?
        } else {
            Self::default()
        };
        merged.merge(self.clone());
        write_json(path, &merged.entries)?;
        debug!(path = %path.display(), entries = merged.len(), "saved BDRC cache");
        Ok(merged)
    }
}
