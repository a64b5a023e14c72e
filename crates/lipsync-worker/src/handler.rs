//! Serverless job handler.

use std::sync::Arc;

use lipsync_inference::{InferenceEngine, InferenceInvoker};
use lipsync_models::{QueueJob, QueueOutput};
use lipsync_pipeline::PipelineCoordinator;
use lipsync_storage::{LocalStore, ObjectStore, R2Client};
use serde_json::{json, Value};
use tracing::{error, info, warn};

use crate::config::{ResultStoreKind, WorkerConfig};
use crate::error::WorkerResult;

/// Handles one queued job payload.
///
/// Input: `{"id"?: ..., "input": {"video", "audio", "guidance_scale"?,
/// "inference_steps"?, "seed"?}}`. Output: `{"output_path": ...}` or
/// `{"error": ...}`. Every failure, including a panic inside the job, comes
/// back as an error payload.
#[derive(Clone)]
pub struct ServerlessHandler {
    coordinator: Arc<PipelineCoordinator>,
}

impl ServerlessHandler {
    pub fn new(coordinator: Arc<PipelineCoordinator>) -> Self {
        Self { coordinator }
    }

    /// Build the result store and coordinator described by `config`.
    pub fn from_config(config: &WorkerConfig, engine: Arc<dyn InferenceEngine>) -> WorkerResult<Self> {
        let store: Arc<dyn ObjectStore> = match config.result_store {
            ResultStoreKind::Local => Arc::new(LocalStore::new(&config.output_dir)?),
            ResultStoreKind::R2 => Arc::new(R2Client::from_env()?),
        };
        info!(
            "Publishing queue results to {:?} store '{}'",
            store.backend(),
            store.bucket()
        );

        let invoker = InferenceInvoker::new(engine, config.pipeline.invoker.clone());
        let coordinator = PipelineCoordinator::new(&config.pipeline, invoker, store)?;

        Ok(Self::new(Arc::new(coordinator)))
    }

    pub fn coordinator(&self) -> &Arc<PipelineCoordinator> {
        &self.coordinator
    }

    pub async fn handle(&self, event: Value) -> Value {
        match self.handle_job(event).await {
            QueueOutput::Success { output_path } => json!({ "output_path": output_path }),
            QueueOutput::Failure { error } => json!({ "error": error }),
        }
    }

    /// Typed form of [`handle`](Self::handle).
    pub async fn handle_job(&self, event: Value) -> QueueOutput {
        let job: QueueJob = match serde_json::from_value(event) {
            Ok(job) => job,
            Err(e) => {
                warn!("Rejected malformed job payload: {}", e);
                return QueueOutput::failure(format!("Invalid job payload: {}", e));
            }
        };

        let coordinator = Arc::clone(&self.coordinator);
        let request = job.into_job_request();

        // Run detached so the job finishes and cleans up even if this
        // future is dropped.
        let task = tokio::spawn(async move { coordinator.run(request).await });

        match task.await {
            Ok(report) => match report.outcome {
                Ok(reference) => QueueOutput::success(reference.location()),
                Err(e) => QueueOutput::failure(e.to_string()),
            },
            Err(join_error) => {
                error!("Job task aborted: {}", join_error);
                QueueOutput::failure(format!("Job aborted: {}", join_error))
            }
        }
    }
}
