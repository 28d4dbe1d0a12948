//! Error types for devhop operations.

use std::path::PathBuf;

/// Exit code for usage and configuration problems.
pub const EXIT_USAGE: i32 = 1;
/// Exit code for unreachable hosts and failures on the remote side.
pub const EXIT_REMOTE: i32 = 2;

/// All errors that can occur while resolving, picking, dispatching or merging.
#[derive(Debug, thiserror::Error)]
pub enum HopError {
    // ─────────────────────────────────────────────────────────────────────
    // Configuration Errors
    // ─────────────────────────────────────────────────────────────────────
    #[error("Config file not found at {0} (run `devhop --settings` to create one)")]
    ConfigMissing(PathBuf),

    #[error("Config file invalid: {path}: {details}")]
    ConfigInvalid { path: PathBuf, details: String },

    #[error("{0}")]
    Usage(String),

    // ─────────────────────────────────────────────────────────────────────
    // Selection Errors
    // ─────────────────────────────────────────────────────────────────────
    #[error("Nothing to choose from: {prompt}")]
    NoItems { prompt: String },

    #[error("Selection cancelled: {prompt}")]
    SelectionCancelled { prompt: String },

    // ─────────────────────────────────────────────────────────────────────
    // Remote Errors
    // ─────────────────────────────────────────────────────────────────────
    #[error("Host unreachable: {target}: {details}")]
    RemoteUnreachable { target: String, details: String },

    #[error("Remote command failed: {details}")]
    RemoteExecution { details: String },

    // ─────────────────────────────────────────────────────────────────────
    // I/O Errors
    // ─────────────────────────────────────────────────────────────────────
    #[error("Cannot update {path}: {source}")]
    MergeIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("I/O error: {context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },
}

impl HopError {
    pub fn exit_code(&self) -> i32 {
        match self {
            HopError::RemoteUnreachable { .. } | HopError::RemoteExecution { .. } => EXIT_REMOTE,
            _ => EXIT_USAGE,
        }
    }

    pub(crate) fn invalid(path: impl Into<PathBuf>, details: impl Into<String>) -> Self {
        HopError::ConfigInvalid {
            path: path.into(),
            details: details.into(),
        }
    }

    pub(crate) fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        HopError::Io {
            context: context.into(),
            source,
        }
    }
}

/// Convenience type alias for Results using HopError.
pub type Result<T> = std::result::Result<T, HopError>;
