//! Application-wide error types.

use std::path::{Path, PathBuf};

use thiserror::Error;

/// Application-wide result type.
pub type Result<T> = std::result::Result<T, Error>;

/// Application-wide error type.
///
/// Failures of a single metric's search are [`LocateError`](crate::locator::LocateError)
/// and never surface here; everything in this enum fails the run.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Checkpoint error: {op} {path}: {message}")]
    Persistence {
        op: &'static str,
        path: PathBuf,
        message: String,
    },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Fetcher error: {0}")]
    Fetcher(#[from] hiscores_client::FetchError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

impl Error {
    pub fn persistence(op: &'static str, path: &Path, message: impl ToString) -> Self {
        Self::Persistence {
            op,
            path: path.to_path_buf(),
            message: message.to_string(),
        }
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    /// Whether the run must stop because checkpoint state could be lost.
    pub fn is_persistence(&self) -> bool {
        matches!(self, Self::Persistence { .. })
    }
}
