//! Build step: source corpus JSON files → one `input_json/<title>/` folder per text.
//!
//! Each folder gets `text_metadata.json` and `instance_payload.json`, plus
//! `translation_payloads.json` when the source carries translations. Output
//! is fully rewritten on every run, so unchanged sources give byte-identical
//! folders.

mod payloads;
mod source;

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;
use tracing::{info, instrument, warn};

use textloader_shared::{
    INSTANCE_PAYLOAD_FILE, Result, TEXT_METADATA_FILE, TRANSLATION_PAYLOADS_FILE, TextLoaderError,
    load_json, pick_title, write_json,
};

pub use payloads::{build_instance_payload, build_text_metadata, build_translation_payload};
pub use source::{SourceDocument, SourceEntry};

// ---------------------------------------------------------------------------
// Config & report
// ---------------------------------------------------------------------------

/// Configuration for [`build_input_json`].
#[derive(Debug, Clone)]
pub struct BuildConfig {
    /// Directory containing the source `*.json` files.
    pub source_dir: PathBuf,
    /// Directory receiving one folder per text.
    pub output_dir: PathBuf,
}

/// What happened to one source file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BuildStatus {
    Written,
    Skipped,
    Failed,
}

/// Per-source-file outcome.
#[derive(Debug, Clone, Serialize)]
pub struct BuildRecord {
    /// Source file name.
    pub source: String,
    pub status: BuildStatus,
    /// Output folder name, once known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub folder: Option<String>,
    /// Files written into the folder.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub files: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Ordered outcomes of one build run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct BuildReport {
    pub items: Vec<BuildRecord>,
}

impl BuildReport {
    pub fn count(&self, status: BuildStatus) -> usize {
        self.items.iter().filter(|r| r.status == status).count()
    }
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

/// Convert every source file under `config.source_dir`.
///
/// A missing source directory is fatal; anything wrong with a single file
/// is recorded in the report and the run moves on.
#[instrument(skip_all, fields(source_dir = %config.source_dir.display()))]
pub fn build_input_json(config: &BuildConfig) -> Result<BuildReport> {
    let sources = list_source_files(&config.source_dir)?;
    info!(files = sources.len(), output_dir = %config.output_dir.display(), "building input folders");

    let mut report = BuildReport::default();
    let mut claimed: HashMap<String, String> = HashMap::new();

    for path in sources {
        let source = file_name(&path);
        let record = match build_one(&path, &config.output_dir) {
            Ok(Built::Written { folder, files }) => {
                if let Some(previous) = claimed.insert(folder.clone(), source.clone()) {
                    warn!(%folder, %previous, current = %source, "two sources map to the same folder; later one wins");
                }
                info!(%source, %folder, "wrote folder");
                BuildRecord {
                    source,
                    status: BuildStatus::Written,
                    folder: Some(folder),
                    files,
                    reason: None,
                }
            }
            Ok(Built::NoRootText) => BuildRecord {
                source,
                status: BuildStatus::Skipped,
                folder: None,
                files: Vec::new(),
                reason: Some("no root_texts".into()),
            },
            Err(e) => {
                warn!(%source, error = %e, "failed to build folder");
                BuildRecord {
                    source,
                    status: BuildStatus::Failed,
                    folder: None,
                    files: Vec::new(),
                    reason: Some(e.to_string()),
                }
            }
        };
        report.items.push(record);
    }

    info!(
        written = report.count(BuildStatus::Written),
        skipped = report.count(BuildStatus::Skipped),
        failed = report.count(BuildStatus::Failed),
        "build finished"
    );
    Ok(report)
}

enum Built {
    Written { folder: String, files: Vec<String> },
    NoRootText,
}

fn build_one(path: &Path, output_dir: &Path) -> Result<Built> {
    let document: SourceDocument = load_json(path)?;
    let Some(root) = document.root() else {
        return Ok(Built::NoRootText);
    };

    let base_title = path
        .file_stem()
        .map(|s| s.to_string_lossy().trim().to_string())
        .unwrap_or_default();
    let title = pick_title(root.meta("incipit_title")).unwrap_or_else(|| base_title.clone());
    let folder = sanitize_folder_name(&title);
    let folder_path = output_dir.join(&folder);

    let text_metadata = build_text_metadata(root, &base_title);
    let instance = build_instance_payload(root);
    let translations: Vec<_> = document
        .translations()
        .iter()
        .map(|t| build_translation_payload(t, &base_title))
        .collect();

    write_json(&folder_path.join(TEXT_METADATA_FILE), &text_metadata)?;
    write_json(&folder_path.join(INSTANCE_PAYLOAD_FILE), &instance)?;
    let mut files = vec![TEXT_METADATA_FILE.to_string(), INSTANCE_PAYLOAD_FILE.to_string()];
    let translations_path = folder_path.join(TRANSLATION_PAYLOADS_FILE);
    if !translations.is_empty() {
        write_json(&translations_path, &translations)?;
        files.push(TRANSLATION_PAYLOADS_FILE.to_string());
    } else if translations_path.is_file() {
        // Left over from an earlier build of the same folder.
        std::fs::remove_file(&translations_path)
            .map_err(|e| TextLoaderError::io(&translations_path, e))?;
    }

    Ok(Built::Written { folder, files })
}

/// Source files in name order: regular files with a `.json` extension (any case).
fn list_source_files(source_dir: &Path) -> Result<Vec<PathBuf>> {
    if !source_dir.is_dir() {
        return Err(TextLoaderError::config(format!(
            "missing source directory: {}",
            source_dir.display()
        )));
    }
    let entries = std::fs::read_dir(source_dir).map_err(|e| TextLoaderError::io(source_dir, e))?;

    let mut files: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.is_file())
        .filter(|p| {
            p.extension()
                .is_some_and(|ext| ext.to_string_lossy().eq_ignore_ascii_case("json"))
        })
        .collect();
    files.sort();
    Ok(files)
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default()
}

/// Turn a title into a portable folder name.
pub fn sanitize_folder_name(name: &str) -> String {
    static FORBIDDEN_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r#"[\\/:*?"<>|]"#).expect("valid regex"));
    static WHITESPACE_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"\s+").expect("valid regex"));

    let cleaned = FORBIDDEN_RE.replace_all(name.trim(), "_");
    let cleaned = WHITESPACE_RE.replace_all(&cleaned, " ");
    if cleaned.is_empty() {
        "untitled".to_string()
    } else {
        cleaned.into_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn temp_dir() -> PathBuf {
        let dir = std::env::temp_dir().join(format!("tl-builder-test-{}", uuid::Uuid::now_v7()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn setup() -> (PathBuf, BuildConfig) {
        let tmp = temp_dir();
        let config = BuildConfig {
            source_dir: tmp.join("json"),
            output_dir: tmp.join("input_json"),
        };
        std::fs::create_dir_all(&config.source_dir).unwrap();
        (tmp, config)
    }

    fn write_source(config: &BuildConfig, name: &str, body: serde_json::Value) {
        std::fs::write(config.source_dir.join(name), body.to_string()).unwrap();
    }

    fn read_tree(dir: &Path) -> Vec<(String, Vec<u8>)> {
        let mut out = Vec::new();
        let mut folders: Vec<_> = std::fs::read_dir(dir).unwrap().map(|e| e.unwrap().path()).collect();
        folders.sort();
        for folder in folders {
            let mut files: Vec<_> = std::fs::read_dir(&folder).unwrap().map(|e| e.unwrap().path()).collect();
            files.sort();
            for f in files {
                let rel = f.strip_prefix(dir).unwrap().to_string_lossy().to_string();
                out.push((rel, std::fs::read(&f).unwrap()));
            }
        }
        out
    }

    #[test]
    fn sanitize_examples() {
        assert_eq!(sanitize_folder_name("  a/b:c  "), "a_b_c");
        assert_eq!(sanitize_folder_name("many   inner\tspaces"), "many inner spaces");
        assert_eq!(sanitize_folder_name("   "), "untitled");
        assert_eq!(sanitize_folder_name("ཤེས་རབ།"), "ཤེས་རབ།");
    }

    #[test]
    fn single_text_without_translations() {
        let (tmp, config) = setup();
        write_source(
            &config,
            "T1.json",
            json!({"root_texts": [{"metadata": {"incipit_title": "T1"}, "content": "body"}]}),
        );

        let report = build_input_json(&config).unwrap();
        assert_eq!(report.count(BuildStatus::Written), 1);

        let folder = config.output_dir.join("T1");
        assert!(folder.join(TEXT_METADATA_FILE).is_file());
        assert!(folder.join(INSTANCE_PAYLOAD_FILE).is_file());
        assert!(!folder.join(TRANSLATION_PAYLOADS_FILE).exists());

        let _ = std::fs::remove_dir_all(&tmp);
    }

    #[test]
    fn translations_written_when_present() {
        let (tmp, config) = setup();
        write_source(
            &config,
            "heart.json",
            json!({
                "root_texts": [{"metadata": {"incipit_title": {"en": "Heart"}}, "content": ["a", "b"]}],
                "translations": [{"metadata": {"language": "en"}, "content": "x"}]
            }),
        );

        build_input_json(&config).unwrap();
        let file = config.output_dir.join("Heart").join(TRANSLATION_PAYLOADS_FILE);
        let written: serde_json::Value = load_json(&file).unwrap();
        assert_eq!(written.as_array().unwrap().len(), 1);
        assert_eq!(written[0]["title"], "heart");

        let _ = std::fs::remove_dir_all(&tmp);
    }

    #[test]
    fn blank_title_falls_back_to_file_stem() {
        let (tmp, config) = setup();
        write_source(
            &config,
            "Heart Sutra.json",
            json!({
                "root_texts": [{"metadata": {"incipit_title": ""}, "content": "a"}],
                "translations": [{"metadata": {"language": "en", "incipit_title": ""}, "content": "x"}]
            }),
        );

        let report = build_input_json(&config).unwrap();
        assert_eq!(report.items[0].folder.as_deref(), Some("Heart Sutra"));
        let file = config.output_dir.join("Heart Sutra").join(TRANSLATION_PAYLOADS_FILE);
        let written: serde_json::Value = load_json(&file).unwrap();
        assert_eq!(written[0]["title"], "Heart Sutra");
        assert!(!config.output_dir.join("untitled").exists());

        let _ = std::fs::remove_dir_all(&tmp);
    }

    #[test]
    fn dropped_translations_remove_old_payloads() {
        let (tmp, config) = setup();
        write_source(
            &config,
            "T1.json",
            json!({
                "root_texts": [{"metadata": {"incipit_title": "T1"}, "content": "a"}],
                "translations": [{"metadata": {"language": "en"}, "content": "x"}]
            }),
        );
        build_input_json(&config).unwrap();
        let file = config.output_dir.join("T1").join(TRANSLATION_PAYLOADS_FILE);
        assert!(file.is_file());

        write_source(
            &config,
            "T1.json",
            json!({"root_texts": [{"metadata": {"incipit_title": "T1"}, "content": "a"}]}),
        );
        let report = build_input_json(&config).unwrap();
        assert_eq!(report.count(BuildStatus::Written), 1);
        assert_eq!(report.items[0].files.len(), 2);
        assert!(!file.exists());

        let _ = std::fs::remove_dir_all(&tmp);
    }

    #[test]
    fn rerun_is_byte_identical() {
        let (tmp, config) = setup();
        write_source(
            &config,
            "a.json",
            json!({
                "root_texts": [{
                    "metadata": {"incipit_title": {"bo": "ཀ", "en": "Ka"}, "bdrc": "W1", "extra": {"z": 1, "a": 2}},
                    "content": ["one", "two"],
                    "segment_annotation": [{"span": {"start": 0, "end": 3}}]
                }],
                "translations": [{"metadata": {"language": "en"}, "content": "x"}]
            }),
        );
        write_source(&config, "b.json", json!({"root_texts": [{"content": "alone"}]}));

        build_input_json(&config).unwrap();
        let first = read_tree(&config.output_dir);
        build_input_json(&config).unwrap();
        let second = read_tree(&config.output_dir);

        assert_eq!(first.len(), 5);
        assert_eq!(first, second);

        let _ = std::fs::remove_dir_all(&tmp);
    }

    #[test]
    fn bad_file_does_not_abort_batch() {
        let (tmp, config) = setup();
        std::fs::write(config.source_dir.join("a_broken.json"), "{ nope").unwrap();
        write_source(&config, "b_empty.json", json!({"root_texts": []}));
        write_source(&config, "c_good.JSON", json!({"root_texts": [{"content": "ok"}]}));
        std::fs::write(config.source_dir.join("notes.txt"), "ignored").unwrap();

        let report = build_input_json(&config).unwrap();
        let statuses: Vec<_> = report.items.iter().map(|r| r.status).collect();
        assert_eq!(
            statuses,
            vec![BuildStatus::Failed, BuildStatus::Skipped, BuildStatus::Written]
        );
        assert!(report.items[0].reason.as_deref().unwrap().contains("invalid JSON"));
        assert_eq!(report.items[2].folder.as_deref(), Some("c_good"));

        let _ = std::fs::remove_dir_all(&tmp);
    }

    #[test]
    fn missing_source_dir_is_fatal() {
        let tmp = temp_dir();
        let config = BuildConfig {
            source_dir: tmp.join("does-not-exist"),
            output_dir: tmp.join("out"),
        };
        let err = build_input_json(&config).unwrap_err();
        assert!(matches!(err, TextLoaderError::Config { .. }));
        let _ = std::fs::remove_dir_all(&tmp);
    }
}
