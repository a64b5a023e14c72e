//! Lip-sync generation handler.

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::Json;
use lipsync_models::{GenerateRequest, GenerateResponse};
use tracing::info;
use validator::{Validate, ValidationErrors};

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

/// `POST /generate`: run one job to completion and return the stored object name.
///
/// The `auth` header is checked by middleware before this handler runs.
pub async fn generate(
    State(state): State<AppState>,
    payload: Result<Json<GenerateRequest>, JsonRejection>,
) -> ApiResult<Json<GenerateResponse>> {
    run_generate(&state, payload)
        .await
        .map_err(|e| e.for_environment(&state.config))
}

async fn run_generate(
    state: &AppState,
    payload: Result<Json<GenerateRequest>, JsonRejection>,
) -> ApiResult<Json<GenerateResponse>> {
    let Json(body) = payload.map_err(|e| ApiError::bad_request(e.body_text()))?;
    body.validate()
        .map_err(|e| ApiError::bad_request(validation_message(&e)))?;

    let request = body.into_job_request();
    let coordinator = state.coordinator.clone();

    // Detached so a dropped connection still runs cleanup to completion
    let report = tokio::spawn(async move { coordinator.run(request).await })
        .await
        .map_err(|e| ApiError::internal(format!("job task failed: {}", e)))?;

    let reference = report.outcome?;
    info!(job_id = %report.job.id, output = %reference, "Generation succeeded");

    Ok(Json(GenerateResponse {
        output: reference.object_name().to_string(),
    }))
}

/// First message per field, sorted by field name.
fn validation_message(errors: &ValidationErrors) -> String {
    let mut fields: Vec<_> = errors.field_errors().into_iter().collect();
    fields.sort_by(|a, b| a.0.cmp(&b.0));

    fields
        .into_iter()
        .filter_map(|(field, errs)| {
            errs.first().map(|err| {
                err.message
                    .as_ref()
                    .map(|m| m.to_string())
                    .unwrap_or_else(|| format!("{} is invalid", field))
            })
        })
        .collect::<Vec<_>>()
        .join("; ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_message_lists_missing_fields() {
        let request = GenerateRequest::default();
        let errors = request.validate().unwrap_err();
        assert_eq!(
            validation_message(&errors),
            "audio is required; video is required"
        );
    }

    #[test]
    fn test_validation_message_rejects_non_url() {
        let request = GenerateRequest {
            audio: Some("/srv/audio.wav".to_string()),
            video: Some("https://cdn.example.com/v.mp4".to_string()),
        };
        let errors = request.validate().unwrap_err();
        assert_eq!(validation_message(&errors), "audio must be a URL");
    }
}
