//! Worker error types.

use thiserror::Error;

pub type WorkerResult<T> = Result<T, WorkerError>;

/// Startup and transport failures. Job failures are reported as payloads.
#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Storage error: {0}")]
    Storage(#[from] lipsync_storage::StorageError),

    #[error("Inference client error: {0}")]
    Inference(#[from] lipsync_inference::InferenceError),

    #[error("Pipeline error: {0}")]
    Pipeline(#[from] lipsync_pipeline::PipelineError),

    #[error("Queue error: {0}")]
    Queue(#[from] lipsync_queue::QueueError),
}

impl WorkerError {
    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }
}
