//! Registry checker: look up each item's BDRC id on the text API.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use tracing::{info, instrument, warn};

use textloader_api::{BdrcLookup, TextApiClient, extract_id};
use textloader_shared::{ApiSettings, Result};

use crate::cache::{BdrcCache, CacheEntry};
use crate::input::{BatchItem, InputSelection, collect_items};
use crate::progress::BatchProgress;

/// Message recorded for ids the API already holds.
pub const ALREADY_PRESENT: &str = "these bdrc are already present";

/// Configuration for [`check_bdrc`].
#[derive(Debug, Clone)]
pub struct CheckConfig {
    pub selection: InputSelection,
    pub api: ApiSettings,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckOutcome {
    Found,
    NotFound,
    Error,
}

/// Result of one lookup.
#[derive(Debug, Clone, Serialize)]
pub struct CheckRecord {
    pub index: usize,
    pub folder: String,
    pub bdrc: Option<String>,
    pub outcome: CheckOutcome,
    pub exists: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Body of the lookup response for found ids.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
}

impl CheckRecord {
    fn new(item: &BatchItem, bdrc: Option<String>, outcome: CheckOutcome) -> Self {
        Self {
            index: item.index,
            folder: item.label.clone(),
            bdrc,
            outcome,
            exists: outcome == CheckOutcome::Found,
            status: None,
            text_id: None,
            message: None,
            error: None,
            metadata: None,
        }
    }

    fn failed(item: &BatchItem, bdrc: Option<String>, error: impl Into<String>) -> Self {
        Self {
            error: Some(error.into()),
            ..Self::new(item, bdrc, CheckOutcome::Error)
        }
    }
}

/// Ordered lookup results of one run.
#[derive(Debug, Clone, Serialize)]
pub struct CheckReport {
    pub checked_at: DateTime<Utc>,
    pub items: Vec<CheckRecord>,
}

impl CheckReport {
    pub fn count(&self, outcome: CheckOutcome) -> usize {
        self.items.iter().filter(|r| r.outcome == outcome).count()
    }

    /// Cache entries for every record that carries a BDRC id.
    pub fn to_cache(&self) -> BdrcCache {
        let mut cache = BdrcCache::default();
        for record in &self.items {
            let Some(bdrc) = &record.bdrc else {
                continue;
            };
            cache.insert(
                bdrc.clone(),
                CacheEntry {
                    exists: record.exists,
                    status: record.status,
                    text_id: record.text_id.clone(),
                    folder: Some(record.folder.clone()),
                    message: record.message.clone(),
                    error: record.error.clone(),
                    checked_at: Some(self.checked_at),
                },
            );
        }
        cache
    }
}

/// Look up every selected item. Only an unusable selection or client
/// configuration is an `Err`; lookup failures become `error` records.
#[instrument(skip_all)]
pub async fn check_bdrc(config: &CheckConfig, progress: &dyn BatchProgress) -> Result<CheckReport> {
    let items = collect_items(&config.selection)?;
    let client = TextApiClient::new(config.api.clone())?;

    progress.phase("Checking BDRC ids");
    let total = items.len();
    let mut records = Vec::with_capacity(total);
    for (i, item) in items.iter().enumerate() {
        progress.item_started(&item.label, i + 1, total);
        let record = check_item(&client, item).await;
        match record.outcome {
            CheckOutcome::Found => info!(index = record.index, bdrc = ?record.bdrc, "already present"),
            CheckOutcome::NotFound => info!(index = record.index, bdrc = ?record.bdrc, "not found"),
            CheckOutcome::Error => warn!(
                index = record.index,
                folder = %record.folder,
                error = record.error.as_deref().unwrap_or_default(),
                "lookup failed"
            ),
        }
        records.push(record);
    }

    let report = CheckReport {
        checked_at: Utc::now(),
        items: records,
    };
    progress.done(&format!(
        "{} found, {} not found, {} errors",
        report.count(CheckOutcome::Found),
        report.count(CheckOutcome::NotFound),
        report.count(CheckOutcome::Error)
    ));
    Ok(report)
}

async fn check_item(client: &TextApiClient, item: &BatchItem) -> CheckRecord {
    let metadata = match item.text_metadata() {
        Ok(metadata) => metadata,
        Err(e) => return CheckRecord::failed(item, None, e.to_string()),
    };
    let Some(bdrc) = metadata.bdrc_id().map(str::to_string) else {
        return CheckRecord::failed(item, None, "missing required 'bdrc' in text");
    };

    match client.get_text_by_bdrc(&bdrc).await {
        Ok(BdrcLookup::Found { status, body }) => CheckRecord {
            status: Some(status),
            text_id: body.as_ref().and_then(extract_id),
            message: Some(ALREADY_PRESENT.to_string()),
            metadata: body,
            ..CheckRecord::new(item, Some(bdrc), CheckOutcome::Found)
        },
        Ok(BdrcLookup::NotFound { status }) => CheckRecord {
            status: Some(status),
            ..CheckRecord::new(item, Some(bdrc), CheckOutcome::NotFound)
        },
        Err(e) => CheckRecord {
            status: e.status(),
            ..CheckRecord::failed(item, Some(bdrc), e.to_string())
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::SilentProgress;
    use serde_json::json;
    use std::path::{Path, PathBuf};
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn temp_root() -> PathBuf {
        let dir = std::env::temp_dir().join(format!("tl-check-test-{}", uuid::Uuid::now_v7()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn write_folder(root: &Path, name: &str, text: Value) {
        let folder = root.join(name);
        std::fs::create_dir_all(&folder).unwrap();
        std::fs::write(folder.join("text_metadata.json"), text.to_string()).unwrap();
    }

    #[tokio::test]
    async fn test_records_every_outcome_without_aborting() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v2/texts/W1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "T-1"})))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v2/texts/W2"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v2/texts/W3"))
            .respond_with(ResponseTemplate::new(404))
            .expect(1)
            .mount(&server)
            .await;

        let root = temp_root();
        write_folder(&root, "a", json!({"bdrc": "W1"}));
        write_folder(&root, "b", json!({"bdrc": "W2"}));
        write_folder(&root, "c", json!({"title": {"en": "no id"}}));
        write_folder(&root, "d", json!({"bdrc": "W3"}));
        std::fs::create_dir_all(root.join("e")).unwrap();

        let config = CheckConfig {
            selection: InputSelection::All(root.clone()),
            api: ApiSettings::with_base_url(&server.uri()).unwrap(),
        };
        let report = check_bdrc(&config, &SilentProgress).await.unwrap();

        let outcomes: Vec<_> = report.items.iter().map(|r| r.outcome).collect();
        assert_eq!(
            outcomes,
            vec![
                CheckOutcome::Found,
                CheckOutcome::Error,
                CheckOutcome::Error,
                CheckOutcome::NotFound,
                CheckOutcome::Error,
            ]
        );
        assert_eq!(report.items[0].text_id.as_deref(), Some("T-1"));
        assert_eq!(report.items[0].message.as_deref(), Some(ALREADY_PRESENT));
        assert_eq!(report.items[1].status, Some(500));
        assert!(report.items[2].error.as_deref().unwrap().contains("bdrc"));
        assert!(report.items[4].error.as_deref().unwrap().contains("text_metadata.json"));

        let cache = report.to_cache();
        assert_eq!(cache.len(), 3);
        assert!(cache.is_found("W1"));
        assert!(!cache.is_found("W2"));
        assert!(!cache.is_found("W3"));
        assert_eq!(cache.get("W1").unwrap().folder.as_deref(), Some("a"));

        let _ = std::fs::remove_dir_all(&root);
    }

    #[tokio::test]
    async fn test_transport_error_is_recorded() {
        let root = temp_root();
        write_folder(&root, "T1", json!({"bdrc": "W1"}));

        // Nothing listens on port 9 in the test environment.
        let config = CheckConfig {
            selection: InputSelection::Folder(root.join("T1")),
            api: ApiSettings::with_base_url("http://127.0.0.1:9").unwrap(),
        };
        let report = check_bdrc(&config, &SilentProgress).await.unwrap();
        assert_eq!(report.items.len(), 1);
        assert_eq!(report.items[0].outcome, CheckOutcome::Error);
        assert!(!report.items[0].exists);
        assert!(report.items[0].status.is_none());

        let _ = std::fs::remove_dir_all(&root);
    }

    #[tokio::test]
    async fn test_missing_folder_is_fatal() {
        let config = CheckConfig {
            selection: InputSelection::Folder(temp_root().join("missing")),
            api: ApiSettings::with_base_url("http://127.0.0.1:9").unwrap(),
        };
        assert!(check_bdrc(&config, &SilentProgress).await.is_err());
    }
}
