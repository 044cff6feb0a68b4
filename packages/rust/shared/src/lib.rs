//! Shared types, error model, and configuration for lexcrawl.
//!
//! This crate is the foundation depended on by all other lexcrawl crates.
//! It provides:
//! - [`LexcrawlError`]: the unified error type
//! - Domain types ([`SourceRecord`], [`ChunkRecord`], [`DocumentChunk`], [`SourceId`])
//! - Configuration ([`AppConfig`], [`HarvestConfig`], config loading)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, ArchiveConfig, DefaultsConfig, FetchConfig, HarvestConfig, config_dir,
    config_file_path, expand_home, init_config, load_config, load_config_from, validate_archive,
};
pub use error::{ErrorKind, LexcrawlError, Result};
pub use types::{
    ArticleKind, ChunkMetadata, ChunkRecord, DocumentChunk, DocumentType, JobStatus,
    OFFICIAL_PUBLICATION, SOURCE_LOCALE, SourceDraft, SourceId, SourceRecord, Translation,
    Translations, content_hash,
};
