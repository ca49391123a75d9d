//! Error types for content resolution.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while resolving content nodes.
#[derive(Debug, Error)]
pub enum TreeError {
    /// Path does not exist (or is not addressable).
    #[error("Path not found: {path}")]
    NotFound { path: PathBuf },

    /// A sidecar config file exists but cannot be used.
    #[error("Invalid config {path}: {message}")]
    Config { path: PathBuf, message: String },

    /// Generic I/O error.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl TreeError {
    /// Create an I/O error with path context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        let path = path.into();
        match source.kind() {
            std::io::ErrorKind::NotFound => Self::NotFound { path },
            _ => Self::Io { path, source },
        }
    }

    /// Create a config error.
    pub fn config(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::Config {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Whether this error means the path does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}
