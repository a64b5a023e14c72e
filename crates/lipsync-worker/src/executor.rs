//! Stream executor.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use lipsync_queue::{JobQueue, QueueMessage, QueueResult};
use serde_json::Value;
use tokio::sync::Semaphore;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::config::WorkerConfig;
use crate::error::WorkerResult;
use crate::handler::ServerlessHandler;

/// Records the handler output for a consumed message.
#[async_trait]
pub trait ResultSink: Send + Sync {
    async fn respond(&self, message: &QueueMessage, output: &Value) -> QueueResult<()>;
}

#[async_trait]
impl ResultSink for JobQueue {
    async fn respond(&self, message: &QueueMessage, output: &Value) -> QueueResult<()> {
        JobQueue::respond(self, message, output).await
    }
}

/// Pulls jobs from the queue and runs them through the handler.
pub struct JobExecutor {
    config: WorkerConfig,
    queue: Arc<JobQueue>,
    handler: ServerlessHandler,
    job_semaphore: Arc<Semaphore>,
    shutdown: tokio::sync::watch::Sender<bool>,
    consumer_name: String,
}

impl JobExecutor {
    pub fn new(config: WorkerConfig, queue: JobQueue, handler: ServerlessHandler) -> Self {
        let job_semaphore = Arc::new(Semaphore::new(config.max_concurrent_jobs));
        let (shutdown, _) = tokio::sync::watch::channel(false);
        let consumer_name = format!("worker-{}", Uuid::new_v4());

        Self {
            config,
            queue: Arc::new(queue),
            handler,
            job_semaphore,
            shutdown,
            consumer_name,
        }
    }

    /// Consume until shutdown is signalled, then wait for in-flight jobs.
    pub async fn run(&self) -> WorkerResult<()> {
        info!(
            "Starting job executor '{}' with {} max concurrent jobs",
            self.consumer_name, self.config.max_concurrent_jobs
        );

        self.queue.init().await?;

        let mut shutdown_rx = self.shutdown.subscribe();

        loop {
            tokio::select! {
                _ = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        info!("Shutdown signal received, stopping executor");
                        break;
                    }
                }
                result = self.consume_jobs() => {
                    if let Err(e) = result {
                        error!("Error consuming jobs: {}", e);
                        tokio::time::sleep(Duration::from_secs(5)).await;
                    }
                }
            }
        }

        info!("Waiting for in-flight jobs to complete...");
        if tokio::time::timeout(self.config.shutdown_timeout, self.wait_for_jobs())
            .await
            .is_err()
        {
            warn!(
                "In-flight jobs still running after {:?}; they stay pending in the stream",
                self.config.shutdown_timeout
            );
        }

        info!("Job executor stopped");
        Ok(())
    }

    async fn consume_jobs(&self) -> WorkerResult<()> {
        let available = self.job_semaphore.available_permits();
        if available == 0 {
            tokio::time::sleep(Duration::from_millis(100)).await;
            return Ok(());
        }

        let messages = self
            .queue
            .consume(&self.consumer_name, 1000, available.min(5))
            .await?;

        if messages.is_empty() {
            return Ok(());
        }

        debug!("Consumed {} jobs from queue", messages.len());

        for message in messages {
            let Ok(permit) = self.job_semaphore.clone().acquire_owned().await else {
                break;
            };
            let sink: Arc<dyn ResultSink> = self.queue.clone();
            let handler = self.handler.clone();

            tokio::spawn(async move {
                let _permit = permit;
                Self::execute_job(handler, sink, message).await;
            });
        }

        Ok(())
    }

    async fn execute_job(handler: ServerlessHandler, sink: Arc<dyn ResultSink>, message: QueueMessage) {
        let id = message.result_id();
        info!("Executing job {}", id);

        let output = handler.handle(message.payload.clone()).await;
        if output.get("error").is_some() {
            warn!("Job {} failed: {}", id, output["error"]);
        } else {
            info!("Job {} completed successfully", id);
        }

        if let Err(e) = sink.respond(&message, &output).await {
            error!("Failed to store result for job {}: {}", id, e);
        }
    }

    async fn wait_for_jobs(&self) {
        while self.job_semaphore.available_permits() < self.config.max_concurrent_jobs {
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
    }

    /// Signal shutdown.
    pub fn shutdown(&self) {
        let _ = self.shutdown.send(true);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::WorkerConfig;
    use lipsync_inference::testing::FakeEngine;
    use lipsync_pipeline::PipelineConfig;
    use serde_json::json;
    use std::sync::Mutex;
    use tempfile::TempDir;

    #[derive(Default)]
    struct RecordingSink {
        responses: Mutex<Vec<(String, Value)>>,
    }

    #[async_trait]
    impl ResultSink for RecordingSink {
        async fn respond(&self, message: &QueueMessage, output: &Value) -> QueueResult<()> {
            self.responses
                .lock()
                .unwrap()
                .push((message.message_id.clone(), output.clone()));
            Ok(())
        }
    }

    struct FailingSink;

    #[async_trait]
    impl ResultSink for FailingSink {
        async fn respond(&self, _message: &QueueMessage, _output: &Value) -> QueueResult<()> {
            Err(lipsync_queue::QueueError::connection_failed("redis down"))
        }
    }

    fn handler(engine: FakeEngine, dirs: &TempDir) -> ServerlessHandler {
        let config = WorkerConfig {
            output_dir: dirs.path().join("out"),
            pipeline: PipelineConfig {
                work_dir: dirs.path().join("work"),
                ..Default::default()
            },
            ..Default::default()
        };
        ServerlessHandler::from_config(&config, Arc::new(engine)).unwrap()
    }

    fn message(dirs: &TempDir, id: &str) -> QueueMessage {
        let video = dirs.path().join("v.mp4");
        let audio = dirs.path().join("a.wav");
        std::fs::write(&video, b"video").unwrap();
        std::fs::write(&audio, b"audio").unwrap();
        QueueMessage {
            message_id: "1700000000000-0".to_string(),
            payload: json!({ "id": id, "input": { "video": video, "audio": audio, "seed": 7 } }),
        }
    }

    #[tokio::test]
    async fn test_execute_job_responds_with_output_path() {
        let dirs = TempDir::new().unwrap();
        let sink = Arc::new(RecordingSink::default());

        JobExecutor::execute_job(
            handler(FakeEngine::succeeding(), &dirs),
            sink.clone(),
            message(&dirs, "job-7"),
        )
        .await;

        let responses = sink.responses.lock().unwrap();
        assert_eq!(responses.len(), 1);
        assert_eq!(responses[0].0, "1700000000000-0");
        let path = responses[0].1["output_path"].as_str().unwrap();
        assert!(path.ends_with("job-7/output_7.mp4"));
        assert!(std::path::Path::new(path).exists());
    }

    #[tokio::test]
    async fn test_execute_job_responds_with_error() {
        let dirs = TempDir::new().unwrap();
        let sink = Arc::new(RecordingSink::default());

        JobExecutor::execute_job(
            handler(FakeEngine::failing("segfault in renderer"), &dirs),
            sink.clone(),
            message(&dirs, "job-8"),
        )
        .await;

        let responses = sink.responses.lock().unwrap();
        assert_eq!(responses.len(), 1);
        assert!(responses[0].1.get("output_path").is_none());
        assert!(responses[0].1["error"]
            .as_str()
            .unwrap()
            .contains("segfault in renderer"));
    }

    #[tokio::test]
    async fn test_execute_job_survives_sink_failure() {
        let dirs = TempDir::new().unwrap();
        let engine = Arc::new(FakeEngine::succeeding());
        let config = WorkerConfig {
            output_dir: dirs.path().join("out"),
            pipeline: PipelineConfig {
                work_dir: dirs.path().join("work"),
                ..Default::default()
            },
            ..Default::default()
        };
        let handler = ServerlessHandler::from_config(&config, engine.clone()).unwrap();

        JobExecutor::execute_job(handler, Arc::new(FailingSink), message(&dirs, "job-9")).await;

        assert_eq!(engine.call_count(), 1);
    }
}
