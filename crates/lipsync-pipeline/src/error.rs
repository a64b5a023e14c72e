//! Job-boundary error taxonomy.

use lipsync_inference::InferenceError;
use lipsync_media::{AssetKind, FetchError, WorkspaceError};
use lipsync_models::{FailureKind, JobId, ModelError};
use lipsync_storage::StorageError;
use thiserror::Error;

pub type PipelineResult<T> = Result<T, PipelineError>;

/// Why a job failed.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Invalid request: {0}")]
    Validation(#[from] ModelError),

    #[error("Failed to fetch {asset}: {source}")]
    Fetch {
        asset: &'static str,
        #[source]
        source: FetchError,
    },

    #[error("{0}")]
    Inference(InferenceError),

    #[error("Failed to publish result: {0}")]
    Publish(#[source] StorageError),

    #[error("Workspace for job {0} already exists")]
    WorkspaceConflict(JobId),

    #[error("{stage} timed out after {seconds} seconds")]
    Timeout { stage: &'static str, seconds: u64 },

    #[error("Internal error: {0}")]
    Internal(String),
}

impl PipelineError {
    pub fn fetch(kind: AssetKind, source: FetchError, timeout_secs: u64) -> Self {
        match source {
            FetchError::Timeout(_) => Self::Timeout {
                stage: "fetch",
                seconds: timeout_secs,
            },
            source => Self::Fetch {
                asset: kind.as_str(),
                source,
            },
        }
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Failure kind recorded on the job.
    pub fn kind(&self) -> FailureKind {
        match self {
            PipelineError::Validation(_) => FailureKind::Validation,
            PipelineError::Fetch { .. } => FailureKind::Fetch,
            PipelineError::Inference(_) => FailureKind::Inference,
            PipelineError::Publish(_) => FailureKind::Publish,
            PipelineError::WorkspaceConflict(_) => FailureKind::WorkspaceConflict,
            PipelineError::Timeout { .. } => FailureKind::Timeout,
            PipelineError::Internal(_) => FailureKind::Internal,
        }
    }

    /// Whether the coordinator may retry the failed operation.
    ///
    /// Inference is never retried; fetch and publish retry transient
    /// failures and their own timeouts.
    pub fn is_retryable(&self) -> bool {
        match self {
            PipelineError::Fetch { source, .. } => source.is_retryable(),
            PipelineError::Publish(e) => e.is_retryable(),
            PipelineError::Timeout { stage, .. } => *stage != "inference",
            _ => false,
        }
    }
}

impl From<InferenceError> for PipelineError {
    fn from(err: InferenceError) -> Self {
        match err {
            InferenceError::Timeout(seconds) => Self::Timeout {
                stage: "inference",
                seconds,
            },
            other => Self::Inference(other),
        }
    }
}

impl From<WorkspaceError> for PipelineError {
    fn from(err: WorkspaceError) -> Self {
        match err {
            WorkspaceError::Conflict(job_id) => Self::WorkspaceConflict(job_id),
            WorkspaceError::Io(e) => Self::Internal(format!("workspace: {}", e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kinds() {
        assert_eq!(
            PipelineError::from(ModelError::MissingField("audio")).kind(),
            FailureKind::Validation
        );
        assert_eq!(
            PipelineError::from(InferenceError::engine("boom")).kind(),
            FailureKind::Inference
        );
        assert_eq!(
            PipelineError::from(InferenceError::Timeout(10)).kind(),
            FailureKind::Timeout
        );
        assert_eq!(
            PipelineError::from(WorkspaceError::Conflict(JobId::new())).kind(),
            FailureKind::WorkspaceConflict
        );
    }

    #[test]
    fn test_fetch_timeout_becomes_timeout() {
        let err = PipelineError::fetch(AssetKind::Audio, FetchError::Timeout("http://x".into()), 60);
        assert!(matches!(err, PipelineError::Timeout { stage: "fetch", seconds: 60 }));
        assert!(err.is_retryable());
    }

    #[test]
    fn test_retry_classification() {
        let not_found = PipelineError::fetch(
            AssetKind::Video,
            FetchError::Status {
                url: "http://x/v.mp4".into(),
                status: 404,
            },
            60,
        );
        assert!(!not_found.is_retryable());

        let unavailable = PipelineError::fetch(
            AssetKind::Video,
            FetchError::Status {
                url: "http://x/v.mp4".into(),
                status: 503,
            },
            60,
        );
        assert!(unavailable.is_retryable());

        assert!(PipelineError::Publish(StorageError::upload_failed("slow down")).is_retryable());
        assert!(!PipelineError::Publish(StorageError::invalid_key("../x")).is_retryable());
        assert!(!PipelineError::from(InferenceError::engine("x")).is_retryable());
        assert!(!PipelineError::from(InferenceError::Timeout(5)).is_retryable());
    }

    #[test]
    fn test_inference_message_is_kept() {
        let err = PipelineError::from(InferenceError::engine("no face detected"));
        assert_eq!(err.to_string(), "Inference engine failed: no face detected");
    }
}
