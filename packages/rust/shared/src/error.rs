//! Error types for orderpack.
//!
//! Library crates use [`OrderpackError`] via `thiserror`.
//! The CLI app wraps this with `color-eyre` for rich diagnostics.
//!
//! Two variants are never meant to reach the caller of the pipeline:
//! [`OrderpackError::Fetch`] and [`OrderpackError::DocumentParse`] are
//! absorbed inside the merge engine as per-document error pages.

use std::path::PathBuf;

/// Top-level error type for all orderpack operations.
#[derive(Debug, thiserror::Error)]
pub enum OrderpackError {
    /// Document retrieval failed (transport error or non-success status).
    /// Recovered per-document inside the merge engine.
    #[error("fetch error for document {document_id}: {reason}")]
    Fetch {
        document_id: String,
        reason: String,
    },

    /// Fetched bytes could not be parsed as a PDF document.
    /// Recovered per-document inside the merge engine.
    #[error("parse error for document {name}: {reason}")]
    DocumentParse { name: String, reason: String },

    /// Code image generation failed on both the URL path and the raw
    /// payload fallback. Absorbed by the orchestrator.
    #[error("code generation error: {0}")]
    CodeGeneration(String),

    /// Cover composition failed. Fatal: aborts the whole pipeline.
    #[error("cover build error: {0}")]
    Cover(String),

    /// Assembling or serializing the merged container failed (not a
    /// per-document issue). Fatal.
    #[error("merge error: {0}")]
    Merge(String),

    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Data validation error (bad order record, invalid URL, etc.).
    #[error("validation error: {message}")]
    Validation { message: String },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, OrderpackError>;

impl OrderpackError {
    /// Create a fetch error carrying the document identifier.
    pub fn fetch(document_id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Fetch {
            document_id: document_id.into(),
            reason: reason.into(),
        }
    }

    /// Create a document parse error carrying the display name.
    pub fn document_parse(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::DocumentParse {
            name: name.into(),
            reason: reason.into(),
        }
    }

    /// Create a cover build error from any displayable message.
    pub fn cover(msg: impl Into<String>) -> Self {
        Self::Cover(msg.into())
    }

    /// Create a merge error from any displayable message.
    pub fn merge(msg: impl Into<String>) -> Self {
        Self::Merge(msg.into())
    }

    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
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

    /// Whether this error is recovered locally inside the merge engine
    /// rather than propagated to the pipeline caller.
    pub fn is_document_local(&self) -> bool {
        matches!(self, Self::Fetch { .. } | Self::DocumentParse { .. })
    }
}
