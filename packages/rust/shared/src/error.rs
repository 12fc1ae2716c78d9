//! Error types for csv2md.
//!
//! Library crates use [`Csv2MdError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;

/// Top-level error type for all csv2md operations.
#[derive(Debug, thiserror::Error)]
pub enum Csv2MdError {
    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// The raw grid does not follow the fixed metadata/dataset layout.
    #[error("structure error: {message}")]
    Structure { message: String },

    /// An edit or append referenced an unknown column or a forbidden row.
    #[error("validation error: {message}")]
    Validation { message: String },

    /// A requested table does not exist in the document.
    #[error("not found: {message}")]
    NotFound { message: String },

    /// Network/HTTP error while talking to GitHub or downloading a file.
    #[error("network error: {0}")]
    Network(String),

    /// A background decode or download task panicked or was cancelled.
    #[error("task error: {0}")]
    Task(String),

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, Csv2MdError>;

impl Csv2MdError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a structure error from any displayable message.
    pub fn structure(msg: impl Into<String>) -> Self {
        Self::Structure {
            message: msg.into(),
        }
    }

    /// Create a validation error from any displayable message.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
        }
    }

    /// Create a not-found error from any displayable message.
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound {
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
}
