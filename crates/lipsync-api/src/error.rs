//! API error types.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use lipsync_models::FailureKind;
use lipsync_pipeline::PipelineError;
use serde::Serialize;
use thiserror::Error;

use crate::config::ApiConfig;

pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Invalid or missing auth header")]
    Unauthorized,

    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Pipeline(#[from] PipelineError),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Configuration error: {0}")]
    Config(String),

    /// An internal error with its detail withheld.
    #[error("An internal error occurred")]
    Redacted(StatusCode),
}

impl ApiError {
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::BadRequest(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Withhold internal details when running in production.
    pub fn for_environment(self, config: &ApiConfig) -> Self {
        if config.is_production() && self.is_internal() {
            ApiError::Redacted(self.status_code())
        } else {
            self
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Redacted(status) => *status,
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Pipeline(e) => match e.kind() {
                FailureKind::Validation | FailureKind::Fetch => StatusCode::BAD_REQUEST,
                FailureKind::Timeout => StatusCode::GATEWAY_TIMEOUT,
                FailureKind::Inference
                | FailureKind::Publish
                | FailureKind::WorkspaceConflict
                | FailureKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
            },
            ApiError::Internal(_) | ApiError::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn is_internal(&self) -> bool {
        match self {
            ApiError::Internal(_) | ApiError::Config(_) => true,
            ApiError::Pipeline(e) => matches!(
                e.kind(),
                FailureKind::WorkspaceConflict | FailureKind::Internal
            ),
            _ => false,
        }
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    detail: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let detail = self.to_string();
        (status, Json(ErrorResponse { detail })).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lipsync_models::ModelError;

    #[test]
    fn test_status_mapping() {
        assert_eq!(ApiError::Unauthorized.status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            ApiError::from(PipelineError::from(ModelError::MissingField("audio"))).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::from(PipelineError::Timeout {
                stage: "inference",
                seconds: 3600
            })
            .status_code(),
            StatusCode::GATEWAY_TIMEOUT
        );
        assert_eq!(
            ApiError::from(PipelineError::internal("disk full")).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_production_redacts_internal_details() {
        let mut config = ApiConfig::with_secret("s");
        config.environment = "production".to_string();

        let err = ApiError::from(PipelineError::internal("disk /var/lib/x full"))
            .for_environment(&config);
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.to_string(), "An internal error occurred");

        let err = ApiError::from(PipelineError::from(ModelError::MissingField("audio")))
            .for_environment(&config);
        assert_eq!(err.to_string(), "Invalid request: audio is required");
    }

    #[test]
    fn test_development_keeps_internal_details() {
        let config = ApiConfig::with_secret("s");
        let err = ApiError::from(PipelineError::internal("disk full")).for_environment(&config);
        assert_eq!(err.to_string(), "Internal error: disk full");
    }
}
