//! Engine request/response types.

use std::path::{Path, PathBuf};

use lipsync_models::JobParameters;
use serde::{Deserialize, Serialize};

pub const DEFAULT_CHECKPOINT_PATH: &str = "checkpoints/latentsync_unet.pt";
pub const DEFAULT_UNET_CONFIG_PATH: &str = "configs/unet/stage2.yaml";

/// Fixed deployment constants shared by every invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelConstants {
    pub checkpoint_path: PathBuf,
    pub unet_config_path: PathBuf,
}

impl Default for ModelConstants {
    fn default() -> Self {
        Self {
            checkpoint_path: PathBuf::from(DEFAULT_CHECKPOINT_PATH),
            unet_config_path: PathBuf::from(DEFAULT_UNET_CONFIG_PATH),
        }
    }
}

impl ModelConstants {
    /// Load from `CHECKPOINT_PATH` / `UNET_CONFIG_PATH`, absolutized against
    /// the current directory.
    pub fn from_env() -> Self {
        let checkpoint = std::env::var("CHECKPOINT_PATH")
            .unwrap_or_else(|_| DEFAULT_CHECKPOINT_PATH.to_string());
        let unet_config = std::env::var("UNET_CONFIG_PATH")
            .unwrap_or_else(|_| DEFAULT_UNET_CONFIG_PATH.to_string());

        Self {
            checkpoint_path: absolutize(&checkpoint),
            unet_config_path: absolutize(&unet_config),
        }
    }
}

fn absolutize(path: &str) -> PathBuf {
    std::path::absolute(path).unwrap_or_else(|_| PathBuf::from(path))
}

/// Everything the engine needs for one job.
///
/// Built once per job from the job's own parameters; fields are private so
/// the value cannot change between construction and invocation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComputeInvocationSpec {
    checkpoint_path: PathBuf,
    unet_config_path: PathBuf,
    video_path: PathBuf,
    audio_path: PathBuf,
    video_out_path: PathBuf,
    inference_steps: u32,
    guidance_scale: f64,
    seed: i64,
}

impl ComputeInvocationSpec {
    pub fn new(
        constants: &ModelConstants,
        parameters: &JobParameters,
        video_path: impl Into<PathBuf>,
        audio_path: impl Into<PathBuf>,
        video_out_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            checkpoint_path: constants.checkpoint_path.clone(),
            unet_config_path: constants.unet_config_path.clone(),
            video_path: video_path.into(),
            audio_path: audio_path.into(),
            video_out_path: video_out_path.into(),
            inference_steps: parameters.inference_steps,
            guidance_scale: parameters.guidance_scale,
            seed: parameters.seed,
        }
    }

    pub fn checkpoint_path(&self) -> &Path {
        &self.checkpoint_path
    }

    pub fn unet_config_path(&self) -> &Path {
        &self.unet_config_path
    }

    pub fn video_path(&self) -> &Path {
        &self.video_path
    }

    pub fn audio_path(&self) -> &Path {
        &self.audio_path
    }

    pub fn video_out_path(&self) -> &Path {
        &self.video_out_path
    }

    pub fn inference_steps(&self) -> u32 {
        self.inference_steps
    }

    pub fn guidance_scale(&self) -> f64 {
        self.guidance_scale
    }

    pub fn seed(&self) -> i64 {
        self.seed
    }
}

/// Body returned by `POST /inference`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InferenceResponse {
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Health check response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: Option<String>,
}
