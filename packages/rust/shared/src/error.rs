//! Error types for lexcrawl.
//!
//! Library crates use [`LexcrawlError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;

/// Top-level error type for all lexcrawl operations.
#[derive(Debug, thiserror::Error)]
pub enum LexcrawlError {
    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// The URL does not belong to any known page layout. Fatal for that URL.
    #[error("unrecognized URL shape: {url}")]
    Classification { url: String },

    /// The page loaded but the document could not be extracted from it.
    #[error("extraction error: {message}")]
    Extraction { message: String },

    /// A write collided with existing rows (chunk already present, or a
    /// retry target that already has chunks).
    #[error("persistence conflict: {message}")]
    PersistenceConflict { message: String },

    /// Network/HTTP error while loading a page.
    #[error("fetch error: {0}")]
    Fetch(String),

    /// A page load exceeded its time budget.
    #[error("timed out after {secs}s loading {url}")]
    Timeout { url: String, secs: u64 },

    /// HTML or value parsing error.
    #[error("parse error: {message}")]
    Parse { message: String },

    /// Database or storage layer error.
    #[error("storage error: {0}")]
    Storage(String),

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Invalid input (date range, identifiers, templates, etc.).
    #[error("validation error: {message}")]
    Validation { message: String },

    /// The run was stopped by the user before it finished.
    #[error("workflow interrupted by user")]
    Interrupted,
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, LexcrawlError>;

/// Coarse error category, used for outcome tallies and log fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Classification,
    Extraction,
    Conflict,
    Transient,
    Storage,
    Other,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Classification => "classification",
            Self::Extraction => "extraction",
            Self::Conflict => "conflict",
            Self::Transient => "transient",
            Self::Storage => "storage",
            Self::Other => "other",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl LexcrawlError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a classification error for the given URL.
    pub fn classification(url: impl Into<String>) -> Self {
        Self::Classification { url: url.into() }
    }

    /// Create an extraction error from any displayable message.
    pub fn extraction(msg: impl Into<String>) -> Self {
        Self::Extraction {
            message: msg.into(),
        }
    }

    /// Create a persistence conflict from any displayable message.
    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::PersistenceConflict {
            message: msg.into(),
        }
    }

    /// Create a parse error from any displayable message.
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse {
            message: msg.into(),
        }
    }

    /// Create a validation error from any displayable message.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
        }
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Network failures and timeouts. Never retried within one invocation.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Fetch(_) | Self::Timeout { .. })
    }

    /// Errors that concern a single document and must not abort its siblings.
    pub fn is_document_scoped(&self) -> bool {
        matches!(
            self,
            Self::Classification { .. }
                | Self::Extraction { .. }
                | Self::PersistenceConflict { .. }
                | Self::Fetch(_)
                | Self::Timeout { .. }
        )
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Classification { .. } => ErrorKind::Classification,
            Self::Extraction { .. } => ErrorKind::Extraction,
            Self::PersistenceConflict { .. } => ErrorKind::Conflict,
            Self::Fetch(_) | Self::Timeout { .. } => ErrorKind::Transient,
            Self::Storage(_) => ErrorKind::Storage,
            _ => ErrorKind::Other,
        }
    }
}
