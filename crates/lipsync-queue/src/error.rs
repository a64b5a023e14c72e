//! Queue error types.

use thiserror::Error;

pub type QueueResult<T> = Result<T, QueueError>;

#[derive(Debug, Error)]
pub enum QueueError {
    #[error("Cannot open Redis client: {0}")]
    ConnectionFailed(String),

    #[error("Failed to add job to stream: {0}")]
    EnqueueFailed(String),

    /// The handler output could not be recorded; the message stays pending.
    #[error("Failed to record result for message {message_id}: {source}")]
    RespondFailed {
        message_id: String,
        #[source]
        source: redis::RedisError,
    },

    #[error(transparent)]
    Redis(#[from] redis::RedisError),

    #[error("Payload encoding error: {0}")]
    Payload(#[from] serde_json::Error),
}

impl QueueError {
    pub fn connection_failed(msg: impl Into<String>) -> Self {
        Self::ConnectionFailed(msg.into())
    }

    pub fn enqueue_failed(msg: impl Into<String>) -> Self {
        Self::EnqueueFailed(msg.into())
    }

    pub fn respond_failed(message_id: impl Into<String>, source: redis::RedisError) -> Self {
        Self::RespondFailed {
            message_id: message_id.into(),
            source,
        }
    }
}
