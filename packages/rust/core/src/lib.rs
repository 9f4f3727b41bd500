//! Batch tools for textloader.
//!
//! This crate holds the three network-facing batch loops (registry check,
//! text upload, translation upload) and the state they share: input
//! selection, the BDRC cache file, and progress reporting. Every loop
//! processes items strictly one after another and returns an ordered
//! per-item report.

pub mod cache;
pub mod checker;
pub mod input;
pub mod progress;
pub mod translations;
pub mod uploader;

pub use cache::{BdrcCache, CacheEntry};
pub use checker::{CheckConfig, CheckOutcome, CheckRecord, CheckReport, check_bdrc};
pub use input::{BatchItem, InputSelection, collect_items};
pub use progress::{BatchProgress, SilentProgress};
pub use translations::{
    TranslationRecord, TranslationReport, TranslationUploadConfig, build_translation_body,
    upload_translations,
};
pub use uploader::{
    ItemStatus, UploadConfig, UploadRecord, UploadReport, upload_texts, write_translation_plan,
};
