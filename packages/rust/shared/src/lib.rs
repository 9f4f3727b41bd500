//! Shared types, error model, and configuration for textloader.
//!
//! This crate is the foundation depended on by all other textloader crates.
//! It provides:
//! - [`TextLoaderError`]: the unified error type
//! - Folder payload types ([`TextMetadata`], [`InstancePayload`], [`TranslationPayload`])
//! - Content and metadata normalization ([`Content`], [`clean_metadata`])
//! - Configuration ([`AppConfig`], [`ApiSettings`], config loading)

pub mod config;
pub mod error;
pub mod json;
pub mod normalize;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    ApiConfig, ApiSettings, AppConfig, DEFAULT_BASE_URL, PathsConfig, UploadDefaults, config_dir,
    config_file_path, init_config, load_config, load_config_from,
};
pub use error::{Result, TextLoaderError};
pub use json::{ensure_list, load_json, to_pretty_json, write_json, write_json_or_stdout};
pub use normalize::{Content, clean_metadata, normalize_content, normalize_copyright, pick_title};
pub use types::{
    AlignedSpan, Author, INSTANCE_PAYLOAD_FILE, IndexedSpan, InstanceMetadata, InstancePayload,
    LocalizedTitle, SegmentSpan, Span, TEXT_METADATA_FILE, TRANSLATION_PAYLOADS_FILE,
    TRANSLATION_PLAN_FILE, TextMetadata, TranslationPayload,
};
