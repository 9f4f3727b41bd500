//! Application configuration for textloader.
//!
//! User config lives at `~/.textloader/textloader.toml`.
//! CLI flags override environment variables, which override config file
//! values, which override defaults.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{Result, TextLoaderError};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "textloader.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".textloader";

/// Base URL of the text API when nothing else is configured.
pub const DEFAULT_BASE_URL: &str = "https://api-aq25662yyq-uc.a.run.app";

// ---------------------------------------------------------------------------
// Config structs (matching textloader.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Remote text API settings.
    #[serde(default)]
    pub api: ApiConfig,

    /// Default filesystem locations.
    #[serde(default)]
    pub paths: PathsConfig,

    /// Upload pacing.
    #[serde(default)]
    pub upload: UploadDefaults,
}

/// `[api]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Base URL of the text API.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Per-request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Name of the env var holding the API token (never store the token itself).
    #[serde(default = "default_token_env")]
    pub token_env: String,

    /// Header that carries the token.
    #[serde(default = "default_auth_header")]
    pub auth_header: String,

    /// Optional scheme prefix for the token, e.g. `Bearer`.
    #[serde(default)]
    pub auth_scheme: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_secs: default_timeout_secs(),
            token_env: default_token_env(),
            auth_header: default_auth_header(),
            auth_scheme: String::new(),
        }
    }
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.into()
}
fn default_timeout_secs() -> u64 {
    60
}
fn default_token_env() -> String {
    "TEXT_API_TOKEN".into()
}
fn default_auth_header() -> String {
    "Authorization".into()
}

/// `[paths]` section. Relative paths resolve against the working directory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    /// Directory holding the source corpus JSON files.
    #[serde(default = "default_source_dir")]
    pub source_dir: String,

    /// Root holding one folder per text.
    #[serde(default = "default_input_root")]
    pub input_root: String,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            source_dir: default_source_dir(),
            input_root: default_input_root(),
        }
    }
}

fn default_source_dir() -> String {
    "json".into()
}
fn default_input_root() -> String {
    "input_json".into()
}

/// `[upload]` section.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UploadDefaults {
    /// Pause between items, in seconds.
    #[serde(default)]
    pub sleep_seconds: f64,
}

// ---------------------------------------------------------------------------
// API settings (runtime, merged from config + env + CLI flags)
// ---------------------------------------------------------------------------

/// Runtime connection settings shared by every networked tool.
#[derive(Debug, Clone)]
pub struct ApiSettings {
    /// Base URL of the text API.
    pub base_url: Url,
    /// Per-request timeout in seconds.
    pub timeout_secs: u64,
    /// API token, if any.
    pub token: Option<String>,
    /// Header that carries the token.
    pub auth_header: String,
    /// Scheme prefix for the token (empty for a bare token).
    pub auth_scheme: String,
}

impl ApiSettings {
    /// Resolve settings from a loaded config, reading the token from the
    /// env var named by `api.token_env`.
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let token = std::env::var(&config.api.token_env)
            .ok()
            .filter(|t| !t.is_empty());
        Ok(Self {
            base_url: parse_base_url(&config.api.base_url)?,
            timeout_secs: config.api.timeout_secs,
            token,
            auth_header: config.api.auth_header.clone(),
            auth_scheme: config.api.auth_scheme.clone(),
        })
    }

    /// Settings pointing at `base_url` with default timeout and no auth.
    pub fn with_base_url(base_url: &str) -> Result<Self> {
        let config = AppConfig::default();
        Ok(Self {
            base_url: parse_base_url(base_url)?,
            timeout_secs: config.api.timeout_secs,
            token: None,
            auth_header: config.api.auth_header,
            auth_scheme: config.api.auth_scheme,
        })
    }

    /// Join API path segments onto the base URL, e.g. `["v2", "texts", id]`.
    ///
    /// Each segment is percent-encoded, so ids containing `/` stay one segment.
    pub fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base_url.clone();
        {
            let mut path = url.path_segments_mut().map_err(|_| {
                TextLoaderError::config(format!("base URL cannot be a base: {}", self.base_url))
            })?;
            path.pop_if_empty();
            path.extend(segments);
        }
        Ok(url)
    }

    /// The `(header, value)` pair to send, when a token is configured.
    pub fn auth_header_pair(&self) -> Option<(String, String)> {
        let token = self.token.as_deref()?;
        let value = if self.auth_scheme.is_empty() {
            token.to_string()
        } else {
            format!("{} {token}", self.auth_scheme)
        };
        Some((self.auth_header.clone(), value))
    }
}

fn parse_base_url(raw: &str) -> Result<Url> {
    if raw.trim().is_empty() {
        return Err(TextLoaderError::config(
            "missing --base-url or TEXT_API_BASE_URL",
        ));
    }
    Url::parse(raw.trim())
        .map_err(|e| TextLoaderError::config(format!("invalid base URL '{raw}': {e}")))
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.textloader/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| TextLoaderError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.textloader/textloader.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| TextLoaderError::io(path, e))?;

    toml::from_str(&content)
        .map_err(|e| TextLoaderError::config(format!("failed to parse {}: {e}", path.display())))
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| TextLoaderError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| TextLoaderError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| TextLoaderError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}
