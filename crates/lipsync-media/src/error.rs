//! Error types for input staging.

use std::path::PathBuf;
use thiserror::Error;

use lipsync_models::JobId;

/// Result type for fetch operations.
pub type FetchResult<T> = Result<T, FetchError>;

/// Result type for workspace operations.
pub type WorkspaceResult<T> = Result<T, WorkspaceError>;

/// Errors raised while staging an input asset.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Failed to reach {url}: {message}")]
    Unreachable { url: String, message: String },

    #[error("{url} returned HTTP {status}")]
    Status { url: String, status: u16 },

    #[error("Fetching {0} timed out")]
    Timeout(String),

    #[error("{0} has no content")]
    EmptyBody(String),

    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    #[error("Cannot read {path}: {message}")]
    NotReadable { path: PathBuf, message: String },

    #[error("Refusing to overwrite {0}")]
    DestinationExists(PathBuf),

    #[error("Failed to configure HTTP client: {0}")]
    Client(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl FetchError {
    pub fn unreachable(url: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Unreachable {
            url: url.into(),
            message: message.into(),
        }
    }

    /// Check if a retry could succeed.
    ///
    /// Network failures, timeouts, 5xx and 429 responses are transient; a
    /// 4xx, an empty body or a missing local file will not change on retry.
    pub fn is_retryable(&self) -> bool {
        match self {
            FetchError::Unreachable { .. } | FetchError::Timeout(_) => true,
            FetchError::Status { status, .. } => *status >= 500 || *status == 429,
            _ => false,
        }
    }
}

/// Errors raised by the workspace manager.
#[derive(Debug, Error)]
pub enum WorkspaceError {
    /// Another job already owns this workspace. Indicates an id-generation bug.
    #[error("Workspace for job {0} already exists")]
    Conflict(JobId),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
