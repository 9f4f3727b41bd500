//! JSON file helpers shared by every tool.

use std::io::Write;
use std::path::Path;

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;

use crate::error::{Result, TextLoaderError};

/// Read and deserialize a JSON file.
pub fn load_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let content = std::fs::read_to_string(path).map_err(|e| TextLoaderError::io(path, e))?;
    serde_json::from_str(&content)
        .map_err(|e| TextLoaderError::parse(format!("invalid JSON in {}: {e}", path.display())))
}

/// Render a value the way every textloader file is written: two-space
/// indentation, UTF-8 kept as-is, trailing newline.
pub fn to_pretty_json<T: Serialize>(data: &T) -> Result<String> {
    let mut json = serde_json::to_string_pretty(data)
        .map_err(|e| TextLoaderError::validation(format!("JSON serialization failed: {e}")))?;
    json.push('\n');
    Ok(json)
}

/// Write a JSON file (pretty-printed), creating parent directories.
pub fn write_json<T: Serialize>(path: &Path, data: &T) -> Result<()> {
    let json = to_pretty_json(data)?;
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| TextLoaderError::io(parent, e))?;
    }
    std::fs::write(path, json).map_err(|e| TextLoaderError::io(path, e))?;
    debug!(path = %path.display(), "wrote JSON file");
    Ok(())
}

/// Write to `path` when given, otherwise to stdout.
pub fn write_json_or_stdout<T: Serialize>(path: Option<&Path>, data: &T) -> Result<()> {
    match path {
        Some(path) => write_json(path, data),
        None => {
            let json = to_pretty_json(data)?;
            let mut stdout = std::io::stdout().lock();
            stdout
                .write_all(json.as_bytes())
                .and_then(|()| stdout.flush())
                .map_err(|e| TextLoaderError::io("<stdout>", e))
        }
    }
}

/// Accept a list, an `{"items": [...]}` wrapper, or a single object.
pub fn ensure_list(data: Value) -> Vec<Value> {
    match data {
        Value::Array(items) => items,
        Value::Object(mut map) if map.get("items").is_some_and(Value::is_array) => {
            match map.remove("items") {
                Some(Value::Array(items)) => items,
                _ => Vec::new(),
            }
        }
        other => vec![other],
    }
}
