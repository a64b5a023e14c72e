//! Structured job logging.

use lipsync_models::{JobId, JobOrigin, JobStatus};
use tracing::{error, info, Span};

/// Logs job lifecycle events with `job_id` and `operation` fields attached.
#[derive(Debug, Clone)]
pub struct JobLogger {
    job_id: String,
    operation: String,
}

impl JobLogger {
    pub fn new(job_id: &JobId, origin: JobOrigin) -> Self {
        Self {
            job_id: job_id.to_string(),
            operation: format!("lipsync_{}", origin.as_str()),
        }
    }

    pub fn log_start(&self, message: &str) {
        info!(
            job_id = %self.job_id,
            operation = %self.operation,
            "Job started: {}", message
        );
    }

    /// Log entry into a pipeline stage.
    pub fn log_stage(&self, status: JobStatus) {
        info!(
            job_id = %self.job_id,
            operation = %self.operation,
            stage = status.as_str(),
            "Job stage: {}", status
        );
    }

    pub fn log_failure(&self, status: JobStatus, message: &str) {
        error!(
            job_id = %self.job_id,
            operation = %self.operation,
            "Job {}: {}", status, message
        );
    }

    pub fn log_completion(&self, message: &str) {
        info!(
            job_id = %self.job_id,
            operation = %self.operation,
            "Job completed: {}", message
        );
    }

    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    pub fn operation(&self) -> &str {
        &self.operation
    }

    /// Span wrapping every stage of the job.
    pub fn create_span(&self) -> Span {
        tracing::info_span!(
            "job",
            job_id = %self.job_id,
            operation = %self.operation
        )
    }
}
