//! Domain error types for the fstests runner.
//!
//! Uses thiserror for ergonomic error handling with automatic Display implementations.

use std::path::PathBuf;

use crate::config::ConfigError;

/// Application-level errors.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// An external command could not be spawned or waited on
    #[error("Command fault running '{program}': {source}")]
    CommandFault {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// The results artifact is missing or malformed
    #[error("Results artifact error: {0}")]
    Artifact(String),

    /// A test identifier has an empty path or an empty segment
    #[error("Invalid test identifier: '{0}'")]
    InvalidTestIdentifier(String),

    /// A test identifier needs a node to be both a leaf and a group
    #[error("Conflicting test identifier: '{0}'")]
    ConflictingTestIdentifier(String),

    /// KernelCI API request failed
    #[error("API error: {0}")]
    Api(String),

    /// Local filesystem operation failed
    #[error("Filesystem error at {path}: {source}")]
    FileSystem {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Report (de)serialization failed
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Invalid run configuration
    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl AppError {
    /// Wrap an I/O error with the path it happened on.
    pub fn fs(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        AppError::FileSystem {
            path: path.into(),
            source,
        }
    }
}

/// Convenience type alias for Results with AppError.
pub type AppResult<T> = Result<T, AppError>;

// Conversion implementations for common error types

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Serialization(format!("JSON error: {}", err))
    }
}

impl From<quick_xml::Error> for AppError {
    fn from(err: quick_xml::Error) -> Self {
        AppError::Artifact(format!("XML parsing error: {}", err))
    }
}

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        AppError::Api(err.to_string())
    }
}
