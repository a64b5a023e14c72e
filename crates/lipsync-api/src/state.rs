//! Application state.

use std::sync::Arc;

use lipsync_inference::{HttpInferenceEngine, InferenceEngine, InferenceInvoker};
use lipsync_pipeline::{PipelineConfig, PipelineCoordinator};
use lipsync_storage::{ObjectStore, R2Client};

use crate::config::ApiConfig;
use crate::error::{ApiError, ApiResult};

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ApiConfig>,
    pub coordinator: Arc<PipelineCoordinator>,
}

impl AppState {
    pub fn new(config: ApiConfig, coordinator: PipelineCoordinator) -> Self {
        Self {
            config: Arc::new(config),
            coordinator: Arc::new(coordinator),
        }
    }

    /// Build state from explicit collaborators.
    pub fn with_parts(
        config: ApiConfig,
        pipeline: &PipelineConfig,
        engine: Arc<dyn InferenceEngine>,
        store: Arc<dyn ObjectStore>,
    ) -> ApiResult<Self> {
        let invoker = InferenceInvoker::new(engine, pipeline.invoker.clone());
        let coordinator = PipelineCoordinator::new(pipeline, invoker, store)?;
        Ok(Self::new(config, coordinator))
    }

    /// Build state from environment: R2 for results, HTTP inference engine.
    pub fn from_env(config: ApiConfig) -> ApiResult<Self> {
        let pipeline = PipelineConfig::from_env();

        let store = R2Client::from_env().map_err(|e| ApiError::config(e.to_string()))?;
        let engine =
            HttpInferenceEngine::from_env().map_err(|e| ApiError::config(e.to_string()))?;

        Self::with_parts(config, &pipeline, Arc::new(engine), Arc::new(store))
    }
}
