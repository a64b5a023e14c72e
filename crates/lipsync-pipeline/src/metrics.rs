//! Pipeline metrics.

use metrics::{counter, histogram};

/// Metric names as constants for consistency.
pub mod names {
    pub const JOBS_TOTAL: &str = "lipsync_jobs_total";
    pub const JOBS_FAILED_TOTAL: &str = "lipsync_jobs_failed_total";
    pub const STAGE_DURATION_SECONDS: &str = "lipsync_stage_duration_seconds";
    pub const JOB_DURATION_SECONDS: &str = "lipsync_job_duration_seconds";
    pub const RETRIES_TOTAL: &str = "lipsync_retries_total";
}

/// Record a finished job.
pub fn record_job_outcome(origin: &str, outcome: &str, duration_secs: f64) {
    let labels = [("origin", origin.to_string()), ("outcome", outcome.to_string())];
    counter!(names::JOBS_TOTAL, &labels).increment(1);
    histogram!(names::JOB_DURATION_SECONDS, &labels).record(duration_secs);
}

/// Record a failed job by failure kind.
pub fn record_job_failure(origin: &str, kind: &str) {
    let labels = [("origin", origin.to_string()), ("kind", kind.to_string())];
    counter!(names::JOBS_FAILED_TOTAL, &labels).increment(1);
}

/// Record how long a stage took.
pub fn record_stage_duration(stage: &str, duration_secs: f64) {
    let labels = [("stage", stage.to_string())];
    histogram!(names::STAGE_DURATION_SECONDS, &labels).record(duration_secs);
}

/// Record a retry attempt.
pub fn record_retry(operation: &str) {
    let labels = [("operation", operation.to_string())];
    counter!(names::RETRIES_TOTAL, &labels).increment(1);
}
