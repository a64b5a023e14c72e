//! Pipeline configuration.

use std::path::PathBuf;
use std::time::Duration;

use lipsync_inference::{InvokerConfig, ModelConstants};
use lipsync_media::FetchConfig;

use crate::retry::RetryConfig;

/// Settings shared by both front-ends.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Root under which per-job workspaces are created
    pub work_dir: PathBuf,
    /// Checkpoint and model config handed to every invocation
    pub model: ModelConstants,
    pub fetch: FetchConfig,
    pub fetch_retry: RetryConfig,
    pub publish_retry: RetryConfig,
    /// Deadline for one upload attempt
    pub publish_timeout: Duration,
    pub invoker: InvokerConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            work_dir: PathBuf::from("/tmp/lipsync"),
            model: ModelConstants::default(),
            fetch: FetchConfig::default(),
            fetch_retry: RetryConfig::default(),
            publish_retry: RetryConfig::default(),
            publish_timeout: Duration::from_secs(300),
            invoker: InvokerConfig::default(),
        }
    }
}

impl PipelineConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        Self {
            work_dir: std::env::var("WORK_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("/tmp/lipsync")),
            model: ModelConstants::from_env(),
            fetch: FetchConfig::from_env(),
            fetch_retry: RetryConfig::from_env("FETCH_MAX_RETRIES"),
            publish_retry: RetryConfig::from_env("PUBLISH_MAX_RETRIES"),
            publish_timeout: Duration::from_secs(
                std::env::var("PUBLISH_TIMEOUT_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(300),
            ),
            invoker: InvokerConfig::from_env(),
        }
    }
}
