//! Job status state machine.
//!
//! A job moves strictly forward through
//! `Admitted -> Fetching -> Invoking -> Publishing -> Succeeded`, and any
//! non-terminal state may drop into `Failed`. `Succeeded` and `Failed` are
//! terminal.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Why a job ended in `Failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Malformed or missing request fields.
    Validation,
    /// An input asset could not be staged.
    Fetch,
    /// The external inference engine failed.
    Inference,
    /// The storage backend rejected the result.
    Publish,
    /// Two jobs resolved to the same workspace.
    WorkspaceConflict,
    /// A stage exceeded its time bound.
    Timeout,
    /// Local I/O or task failure not attributable to a stage.
    Internal,
}

impl FailureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureKind::Validation => "validation",
            FailureKind::Fetch => "fetch",
            FailureKind::Inference => "inference",
            FailureKind::Publish => "publish",
            FailureKind::WorkspaceConflict => "workspace_conflict",
            FailureKind::Timeout => "timeout",
            FailureKind::Internal => "internal",
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Pipeline stage of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(tag = "state", content = "reason", rename_all = "snake_case")]
pub enum JobStatus {
    /// Request accepted, not yet validated.
    #[default]
    Admitted,
    /// Input assets are being staged into the workspace.
    Fetching,
    /// The inference engine is producing the output.
    Invoking,
    /// The output is being uploaded.
    Publishing,
    /// Output published.
    Succeeded,
    /// Job failed.
    Failed(FailureKind),
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Admitted => "admitted",
            JobStatus::Fetching => "fetching",
            JobStatus::Invoking => "invoking",
            JobStatus::Publishing => "publishing",
            JobStatus::Succeeded => "succeeded",
            JobStatus::Failed(_) => "failed",
        }
    }

    /// Check if this is a terminal state (no more transitions allowed).
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Succeeded | JobStatus::Failed(_))
    }

    /// Check whether `next` is a legal successor of this state.
    pub fn can_transition_to(&self, next: &JobStatus) -> bool {
        match (self, next) {
            (from, JobStatus::Failed(_)) => !from.is_terminal(),
            (JobStatus::Admitted, JobStatus::Fetching)
            | (JobStatus::Fetching, JobStatus::Invoking)
            | (JobStatus::Invoking, JobStatus::Publishing)
            | (JobStatus::Publishing, JobStatus::Succeeded) => true,
            _ => false,
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobStatus::Failed(kind) => write!(f, "failed({})", kind),
            other => write!(f, "{}", other.as_str()),
        }
    }
}
