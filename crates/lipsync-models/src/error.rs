//! Model validation errors.

use thiserror::Error;

use crate::job_status::JobStatus;

/// Result type for model validation.
pub type ModelResult<T> = Result<T, ModelError>;

/// Errors raised while validating job inputs or advancing job state.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ModelError {
    #[error("{0} is required")]
    MissingField(&'static str),

    #[error("Invalid {field}: {reason}")]
    InvalidField { field: &'static str, reason: String },

    #[error("Invalid job id: {0}")]
    InvalidJobId(String),

    #[error("Invalid status transition from {from} to {to}")]
    InvalidTransition { from: JobStatus, to: JobStatus },
}

impl ModelError {
    pub fn invalid_field(field: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidField {
            field,
            reason: reason.into(),
        }
    }
}
