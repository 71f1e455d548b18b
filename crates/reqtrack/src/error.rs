//! Error types for fatal conditions.
//!
//! Only conditions that make a whole result meaningless surface here.
//! Degraded, per-item failures are collected as [`crate::Diagnostics`].

use std::path::PathBuf;

/// Errors that abort a reqtrack operation.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("invalid target URL {url:?}: {reason}")]
    InvalidTarget { url: String, reason: String },

    #[error("navigation to {url} failed: {reason}")]
    Navigation { url: String, reason: String },

    #[error("browser error: {0}")]
    Browser(String),

    #[error("script of {size} bytes exceeds the {limit}-byte analysis ceiling")]
    ScriptTooLarge { size: usize, limit: usize },

    #[error("script nests {depth} levels deep, over the {limit}-level analysis limit")]
    ScriptTooDeep { depth: usize, limit: usize },

    #[error("failed to parse script: {0}")]
    ScriptParse(String),

    #[error("cannot access archive {}: {source}", path.display())]
    ArchiveFile {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("archive I/O error: {0}")]
    ArchiveIo(#[from] std::io::Error),

    #[error("malformed archive: {0}")]
    ArchiveFormat(String),

    #[error("archive JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Convenience result type.
pub type Result<T> = std::result::Result<T, Error>;
