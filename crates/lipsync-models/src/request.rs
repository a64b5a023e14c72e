//! Wire schemas for the HTTP and queue front-ends.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::job::{JobId, JobOrigin, JobParameters, JobRequest, DEFAULT_GUIDANCE_SCALE, DEFAULT_INFERENCE_STEPS, DEFAULT_SEED};

/// Body of `POST /generate`.
///
/// Fields are optional at the serde layer so a missing field surfaces as a
/// validation error rather than a deserialization rejection.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema, Validate)]
pub struct GenerateRequest {
    /// Audio track URL
    #[serde(default)]
    #[validate(
        required(message = "audio is required"),
        length(min = 1, max = 2048, message = "audio must be 1-2048 characters"),
        url(message = "audio must be a URL")
    )]
    pub audio: Option<String>,

    /// Video URL
    #[serde(default)]
    #[validate(
        required(message = "video is required"),
        length(min = 1, max = 2048, message = "video must be 1-2048 characters"),
        url(message = "video must be a URL")
    )]
    pub video: Option<String>,
}

impl GenerateRequest {
    /// Convert into a coordinator request with default parameters.
    pub fn into_job_request(self) -> JobRequest {
        JobRequest::new(JobOrigin::Http, self.video, self.audio)
    }
}

/// Success body of `POST /generate`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct GenerateResponse {
    /// Storage object name of the result
    pub output: String,
}

/// Inputs of a queue job.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct QueueJobInput {
    #[serde(default)]
    pub video: Option<String>,
    #[serde(default)]
    pub audio: Option<String>,
    #[serde(default)]
    pub guidance_scale: Option<f64>,
    #[serde(default)]
    pub inference_steps: Option<u32>,
    #[serde(default)]
    pub seed: Option<i64>,
}

impl QueueJobInput {
    pub fn parameters(&self) -> JobParameters {
        JobParameters {
            inference_steps: self.inference_steps.unwrap_or(DEFAULT_INFERENCE_STEPS),
            guidance_scale: self.guidance_scale.unwrap_or(DEFAULT_GUIDANCE_SCALE),
            seed: self.seed.unwrap_or(DEFAULT_SEED),
        }
    }
}

/// Envelope delivered to the queue handler: `{"id"?: ..., "input": {...}}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueJob {
    /// Caller-supplied job id
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<JobId>,
    pub input: QueueJobInput,
}

impl QueueJob {
    pub fn new(input: QueueJobInput) -> Self {
        Self { id: None, input }
    }

    pub fn into_job_request(self) -> JobRequest {
        let parameters = self.input.parameters();
        JobRequest::new(JobOrigin::Queue, self.input.video, self.input.audio)
            .with_job_id(self.id)
            .with_parameters(parameters)
    }
}

/// Result returned by the queue handler. Failures are data, never panics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(untagged)]
pub enum QueueOutput {
    Success { output_path: String },
    Failure { error: String },
}

impl QueueOutput {
    pub fn success(output_path: impl Into<String>) -> Self {
        Self::Success {
            output_path: output_path.into(),
        }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self::Failure {
            error: error.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, QueueOutput::Success { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_request_validation() {
        let request: GenerateRequest =
            serde_json::from_str(r#"{"audio": "https://x.io/a.wav", "video": "https://x.io/v.mp4"}"#).unwrap();
        assert!(request.validate().is_ok());

        let missing: GenerateRequest = serde_json::from_str(r#"{"audio": "https://x.io/a.wav"}"#).unwrap();
        let errors = missing.validate().unwrap_err();
        assert!(errors.field_errors().contains_key("video"));

        let not_url: GenerateRequest =
            serde_json::from_str(r#"{"audio": "a.wav", "video": "https://x.io/v.mp4"}"#).unwrap();
        assert!(not_url.validate().is_err());
    }

    #[test]
    fn test_queue_job_defaults() {
        let job: QueueJob =
            serde_json::from_str(r#"{"input": {"video": "v.mp4", "audio": "a.wav", "seed": 42}}"#).unwrap();
        let params = job.input.parameters();
        assert_eq!(params.seed, 42);
        assert_eq!(params.inference_steps, 20);
        assert_eq!(params.guidance_scale, 1.5);
        assert!(job.id.is_none());

        let request = job.into_job_request();
        assert_eq!(request.origin, JobOrigin::Queue);
        assert_eq!(request.video.as_deref(), Some("v.mp4"));
    }

    #[test]
    fn test_queue_output_shape() {
        let ok = serde_json::to_value(QueueOutput::success("/tmp/out/output_42.mp4")).unwrap();
        assert_eq!(ok, serde_json::json!({"output_path": "/tmp/out/output_42.mp4"}));

        let err = serde_json::to_value(QueueOutput::failure("boom")).unwrap();
        assert_eq!(err, serde_json::json!({"error": "boom"}));
    }
}
