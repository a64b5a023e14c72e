//! Inference error types.

use std::path::PathBuf;
use thiserror::Error;

pub type InferenceResult<T> = Result<T, InferenceError>;

#[derive(Debug, Error)]
pub enum InferenceError {
    #[error("Inference engine failed: {message}")]
    Engine { message: String },

    #[error("Inference engine unavailable: {0}")]
    Unavailable(String),

    #[error("Inference timed out after {0} seconds")]
    Timeout(u64),

    #[error("Inference produced no output at {0}")]
    MissingOutput(PathBuf),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Invalid engine response: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Inference task aborted: {0}")]
    Join(String),

    #[error("Inference pool is closed")]
    PoolClosed,
}

impl InferenceError {
    pub fn engine(message: impl Into<String>) -> Self {
        Self::Engine {
            message: message.into(),
        }
    }
}
