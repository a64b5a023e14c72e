//! Worker configuration.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use lipsync_pipeline::PipelineConfig;

use crate::error::{WorkerError, WorkerResult};

/// Where queue results are published.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultStoreKind {
    /// Files under `OUTPUT_DIR`; `output_path` is an absolute path
    Local,
    /// Cloudflare R2; `output_path` is `bucket/key`
    R2,
}

impl FromStr for ResultStoreKind {
    type Err = WorkerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "local" => Ok(ResultStoreKind::Local),
            "r2" => Ok(ResultStoreKind::R2),
            other => Err(WorkerError::config_error(format!(
                "RESULT_STORE must be 'local' or 'r2', got '{}'",
                other
            ))),
        }
    }
}

/// Worker configuration.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Maximum concurrent jobs pulled from the queue
    pub max_concurrent_jobs: usize,
    /// Graceful shutdown timeout
    pub shutdown_timeout: Duration,
    pub result_store: ResultStoreKind,
    /// Root of the local result store
    pub output_dir: PathBuf,
    /// Port for the Prometheus scrape endpoint, if enabled
    pub metrics_port: Option<u16>,
    pub pipeline: PipelineConfig,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            max_concurrent_jobs: 2,
            shutdown_timeout: Duration::from_secs(30),
            result_store: ResultStoreKind::Local,
            output_dir: PathBuf::from("./temp"),
            metrics_port: Some(9091),
            pipeline: PipelineConfig::default(),
        }
    }
}

impl WorkerConfig {
    /// Create config from environment variables.
    pub fn from_env() -> WorkerResult<Self> {
        let result_store = match std::env::var("RESULT_STORE") {
            Ok(value) => value.parse()?,
            Err(_) => ResultStoreKind::Local,
        };

        let metrics_enabled = std::env::var("METRICS_ENABLED")
            .map(|v| v != "false" && v != "0")
            .unwrap_or(true);

        Ok(Self {
            max_concurrent_jobs: std::env::var("WORKER_MAX_JOBS")
                .ok()
                .and_then(|s| s.parse().ok())
                .filter(|n: &usize| *n > 0)
                .unwrap_or(2),
            shutdown_timeout: Duration::from_secs(
                std::env::var("WORKER_SHUTDOWN_TIMEOUT")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(30),
            ),
            result_store,
            output_dir: std::env::var("OUTPUT_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("./temp")),
            metrics_port: metrics_enabled.then(|| {
                std::env::var("WORKER_METRICS_PORT")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(9091)
            }),
            pipeline: PipelineConfig::from_env(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_result_store_parsing() {
        assert_eq!("local".parse::<ResultStoreKind>().unwrap(), ResultStoreKind::Local);
        assert_eq!(" R2 ".parse::<ResultStoreKind>().unwrap(), ResultStoreKind::R2);
        assert!("s3".parse::<ResultStoreKind>().is_err());
    }

    #[test]
    fn test_defaults() {
        let config = WorkerConfig::default();
        assert_eq!(config.max_concurrent_jobs, 2);
        assert_eq!(config.result_store, ResultStoreKind::Local);
        assert_eq!(config.output_dir, PathBuf::from("./temp"));
    }
}
