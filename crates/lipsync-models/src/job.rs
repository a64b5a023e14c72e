//! Job definitions.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::error::{ModelError, ModelResult};
use crate::job_status::{FailureKind, JobStatus};
use crate::source::SourceLocation;
use crate::storage::StorageReference;

/// Maximum length of a caller-supplied job id.
const MAX_JOB_ID_LENGTH: usize = 128;

/// Default number of diffusion steps.
pub const DEFAULT_INFERENCE_STEPS: u32 = 20;

/// Default classifier-free guidance scale.
pub const DEFAULT_GUIDANCE_SCALE: f64 = 1.5;

/// Default random seed.
pub const DEFAULT_SEED: i64 = 1247;

/// Upper bound on diffusion steps accepted from callers.
pub const MAX_INFERENCE_STEPS: u32 = 1000;

/// Unique identifier for a job.
///
/// Job ids name workspace directories and storage keys, so only
/// `[A-Za-z0-9_-]` is accepted.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct JobId(String);

impl JobId {
    /// Generate a new random job ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Validate a caller-supplied id.
    pub fn parse(s: impl Into<String>) -> ModelResult<Self> {
        let s = s.into();
        let valid = !s.is_empty()
            && s.len() <= MAX_JOB_ID_LENGTH
            && s.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');

        if valid {
            Ok(Self(s))
        } else {
            Err(ModelError::InvalidJobId(s))
        }
    }

    /// Get the inner string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<String> for JobId {
    type Error = ModelError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::parse(s)
    }
}

impl From<JobId> for String {
    fn from(id: JobId) -> Self {
        id.0
    }
}

/// Inference parameters chosen by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct JobParameters {
    /// Number of diffusion steps (positive)
    pub inference_steps: u32,
    /// Guidance scale (positive, finite)
    pub guidance_scale: f64,
    /// Random seed
    pub seed: i64,
}

impl Default for JobParameters {
    fn default() -> Self {
        Self {
            inference_steps: DEFAULT_INFERENCE_STEPS,
            guidance_scale: DEFAULT_GUIDANCE_SCALE,
            seed: DEFAULT_SEED,
        }
    }
}

impl JobParameters {
    pub fn validate(&self) -> ModelResult<()> {
        if self.inference_steps == 0 || self.inference_steps > MAX_INFERENCE_STEPS {
            return Err(ModelError::invalid_field(
                "inference_steps",
                format!("must be between 1 and {}", MAX_INFERENCE_STEPS),
            ));
        }

        if !self.guidance_scale.is_finite() || self.guidance_scale <= 0.0 {
            return Err(ModelError::invalid_field(
                "guidance_scale",
                "must be a positive number",
            ));
        }

        Ok(())
    }
}

/// File name the inference engine writes its output to.
pub fn output_file_name(seed: i64) -> String {
    format!("output_{}.mp4", seed)
}

/// Which front-end admitted a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobOrigin {
    /// Synchronous `POST /generate`.
    Http,
    /// Queue-driven serverless handler.
    Queue,
}

impl JobOrigin {
    /// Whether sources may name files on the local filesystem.
    pub fn allows_local_sources(&self) -> bool {
        matches!(self, JobOrigin::Queue)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            JobOrigin::Http => "http",
            JobOrigin::Queue => "queue",
        }
    }
}

/// Raw request handed from a front-end to the coordinator.
#[derive(Debug, Clone)]
pub struct JobRequest {
    /// Caller-supplied id, if any
    pub job_id: Option<JobId>,
    pub video: Option<String>,
    pub audio: Option<String>,
    pub parameters: JobParameters,
    pub origin: JobOrigin,
}

impl JobRequest {
    pub fn new(origin: JobOrigin, video: Option<String>, audio: Option<String>) -> Self {
        Self {
            job_id: None,
            video,
            audio,
            parameters: JobParameters::default(),
            origin,
        }
    }

    pub fn with_job_id(mut self, job_id: Option<JobId>) -> Self {
        self.job_id = job_id;
        self
    }

    pub fn with_parameters(mut self, parameters: JobParameters) -> Self {
        self.parameters = parameters;
        self
    }
}

/// One request to turn a (video, audio) pair into a lip-synced video.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    /// Unique job ID
    pub id: JobId,
    /// Admitting front-end
    pub origin: JobOrigin,
    /// Raw video source as submitted
    pub video_source: String,
    /// Raw audio source as submitted
    pub audio_source: String,
    /// Inference parameters
    pub parameters: JobParameters,
    /// Current status
    pub status: JobStatus,
    /// Set on success
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_reference: Option<StorageReference>,
    /// Set on failure
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Job {
    /// Admit a request, assigning its id.
    pub fn admit(request: JobRequest) -> Self {
        let now = Utc::now();
        Self {
            id: request.job_id.unwrap_or_default(),
            origin: request.origin,
            video_source: request.video.unwrap_or_default(),
            audio_source: request.audio.unwrap_or_default(),
            parameters: request.parameters,
            status: JobStatus::Admitted,
            output_reference: None,
            error: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Validate sources and parameters, returning the parsed (video, audio) pair.
    pub fn validate(&self) -> ModelResult<(SourceLocation, SourceLocation)> {
        let allow_local = self.origin.allows_local_sources();
        let video = SourceLocation::parse("video", &self.video_source, allow_local)?;
        let audio = SourceLocation::parse("audio", &self.audio_source, allow_local)?;
        self.parameters.validate()?;
        Ok((video, audio))
    }

    /// Move to the next stage.
    pub fn advance(&mut self, next: JobStatus) -> ModelResult<()> {
        if !self.status.can_transition_to(&next) {
            return Err(ModelError::InvalidTransition {
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Record success.
    pub fn succeed(&mut self, reference: StorageReference) -> ModelResult<()> {
        self.advance(JobStatus::Succeeded)?;
        self.output_reference = Some(reference);
        Ok(())
    }

    /// Record failure.
    pub fn fail(&mut self, kind: FailureKind, message: impl Into<String>) -> ModelResult<()> {
        self.advance(JobStatus::Failed(kind))?;
        self.error = Some(message.into());
        Ok(())
    }
}
