use std::path::PathBuf;

use thiserror::Error;

/// Unified error type for registry-watch operations
#[derive(Error, Debug)]
pub enum WatchError {
    #[error("Failed to read manifest {path}: {source}")]
    ManifestRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse manifest {path}: {source}")]
    ManifestParse {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("Failed to write manifest {path}: {source}")]
    ManifestWrite {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Registry operation failed: {0}")]
    Registry(String),

    #[error("Config patch failed: {0}")]
    Patch(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Convenience type alias for Results in registry-watch
pub type Result<T> = std::result::Result<T, WatchError>;

impl WatchError {
    /// Create a registry error with context
    pub fn registry(msg: impl Into<String>) -> Self {
        WatchError::Registry(msg.into())
    }

    /// Create a config patch error with context
    pub fn patch(msg: impl Into<String>) -> Self {
        WatchError::Patch(msg.into())
    }

    /// Create a configuration error with context
    pub fn config(msg: impl Into<String>) -> Self {
        WatchError::Config(msg.into())
    }

    /// Whether this error must abort the whole run.
    ///
    /// Only registry failures are scoped to a single service; everything else
    /// would leave the manifest and the patched document out of sync.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, WatchError::Registry(_))
    }
}
