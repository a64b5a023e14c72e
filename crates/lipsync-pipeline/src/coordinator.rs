//! Pipeline coordinator.
//!
//! Drives one job through `Admitted -> Fetching -> Invoking -> Publishing ->
//! Succeeded`. Any stage error moves the job to `Failed(kind)`. The
//! workspace is allocated only after validation and released on every path
//! out of the job. After an inference timeout the job fails at once, but its
//! workspace is released only when the engine call actually returns.

use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use lipsync_inference::{ComputeInvocationSpec, InferenceInvoker, ModelConstants, PendingCall};
use lipsync_media::{AssetFetcher, AssetKind, Workspace, WorkspaceManager};
use lipsync_models::{Job, JobRequest, JobStatus, SourceLocation, StorageReference};
use lipsync_storage::{result_key, ObjectStore};
use tracing::{info, warn, Instrument};

use crate::config::PipelineConfig;
use crate::error::{PipelineError, PipelineResult};
use crate::logging::JobLogger;
use crate::metrics::{record_job_failure, record_job_outcome, record_stage_duration};
use crate::publisher::ResultPublisher;
use crate::retry::{with_retry, RetryConfig};

/// Terminal state of one job.
#[derive(Debug)]
pub struct JobReport {
    /// The job in its terminal status
    pub job: Job,
    pub outcome: PipelineResult<StorageReference>,
}

impl JobReport {
    pub fn is_success(&self) -> bool {
        self.outcome.is_ok()
    }
}

/// Runs jobs end to end. Cheap to share behind an `Arc`.
pub struct PipelineCoordinator {
    workspaces: WorkspaceManager,
    fetcher: AssetFetcher,
    fetch_retry: RetryConfig,
    fetch_timeout_secs: u64,
    model: ModelConstants,
    invoker: InferenceInvoker,
    publisher: ResultPublisher,
}

impl PipelineCoordinator {
    pub fn new(
        config: &PipelineConfig,
        invoker: InferenceInvoker,
        store: Arc<dyn ObjectStore>,
    ) -> PipelineResult<Self> {
        let fetcher = AssetFetcher::new(config.fetch.clone())
            .map_err(|e| PipelineError::internal(e.to_string()))?;

        Ok(Self {
            workspaces: WorkspaceManager::new(&config.work_dir),
            fetcher,
            fetch_retry: config.fetch_retry.clone(),
            fetch_timeout_secs: config.fetch.timeout.as_secs(),
            model: config.model.clone(),
            invoker,
            publisher: ResultPublisher::new(store, config.publish_retry.clone(), config.publish_timeout),
        })
    }

    pub fn invoker(&self) -> &InferenceInvoker {
        &self.invoker
    }

    pub fn workspaces(&self) -> &WorkspaceManager {
        &self.workspaces
    }

    pub fn publisher(&self) -> &ResultPublisher {
        &self.publisher
    }

    /// Run one request to a terminal state.
    ///
    /// Never panics on job failure; the failure is carried in the report.
    pub async fn run(&self, request: JobRequest) -> JobReport {
        let mut job = Job::admit(request);
        let logger = JobLogger::new(&job.id, job.origin);
        let span = logger.create_span();

        async move {
            let started = Instant::now();
            logger.log_start(&format!(
                "video={} audio={}",
                job.video_source, job.audio_source
            ));

            let outcome = self.execute(&mut job, &logger).await;
            let origin = job.origin.as_str();

            match &outcome {
                Ok(reference) => {
                    if let Err(e) = job.succeed(reference.clone()) {
                        warn!("Could not record success: {}", e);
                    }
                    logger.log_completion(&reference.to_string());
                    record_job_outcome(origin, "succeeded", started.elapsed().as_secs_f64());
                }
                Err(err) => {
                    let kind = err.kind();
                    if let Err(e) = job.fail(kind, err.to_string()) {
                        warn!("Could not record failure: {}", e);
                    }
                    logger.log_failure(job.status, &err.to_string());
                    record_job_outcome(origin, "failed", started.elapsed().as_secs_f64());
                    record_job_failure(origin, kind.as_str());
                }
            }

            JobReport { job, outcome }
        }
        .instrument(span)
        .await
    }

    async fn execute(&self, job: &mut Job, logger: &JobLogger) -> PipelineResult<StorageReference> {
        let (video, audio) = job.validate()?;

        let workspace = self.workspaces.allocate(&job.id).await?;
        let mut pending = None;
        let result = self
            .execute_in(job, &workspace, &video, &audio, logger, &mut pending)
            .await;

        match pending {
            Some(call) => release_after(call, workspace),
            None => {
                workspace.release().await;
            }
        }

        result
    }

    async fn execute_in(
        &self,
        job: &mut Job,
        workspace: &Workspace,
        video: &SourceLocation,
        audio: &SourceLocation,
        logger: &JobLogger,
        pending: &mut Option<PendingCall>,
    ) -> PipelineResult<StorageReference> {
        advance(job, JobStatus::Fetching, logger)?;
        let video_path = workspace.input_path(AssetKind::Video, video);
        let audio_path = workspace.input_path(AssetKind::Audio, audio);

        let stage_start = Instant::now();
        tokio::try_join!(
            self.fetch(AssetKind::Video, video, &video_path),
            self.fetch(AssetKind::Audio, audio, &audio_path),
        )?;
        record_stage_duration("fetch", stage_start.elapsed().as_secs_f64());

        advance(job, JobStatus::Invoking, logger)?;
        let spec = ComputeInvocationSpec::new(
            &self.model,
            &job.parameters,
            video_path,
            audio_path,
            workspace.output_path(job.parameters.seed),
        );

        let stage_start = Instant::now();
        let invocation = self.invoker.invoke(spec).await;
        *pending = invocation.pending;
        let output = invocation.result?;
        record_stage_duration("inference", stage_start.elapsed().as_secs_f64());

        advance(job, JobStatus::Publishing, logger)?;
        let key = result_key(job.origin, &job.id, job.parameters.seed);

        let stage_start = Instant::now();
        let reference = self.publisher.publish(&output, &key).await?;
        record_stage_duration("publish", stage_start.elapsed().as_secs_f64());

        Ok(reference)
    }

    async fn fetch(&self, kind: AssetKind, source: &SourceLocation, destination: &Path) -> PipelineResult<u64> {
        with_retry(&self.fetch_retry, "fetch", || async {
            self.fetcher
                .fetch(source, destination)
                .await
                .map_err(|e| PipelineError::fetch(kind, e, self.fetch_timeout_secs))
        })
        .await
    }
}

/// Keep the workspace until the timed-out engine call returns, then release it.
fn release_after(call: PendingCall, workspace: Workspace) {
    info!(
        job_id = %workspace.job_id(),
        "Holding workspace until the timed-out inference call returns"
    );
    tokio::spawn(async move {
        call.finished().await;
        workspace.release().await;
    });
}

fn advance(job: &mut Job, next: JobStatus, logger: &JobLogger) -> PipelineResult<()> {
    job.advance(next)
        .map_err(|e| PipelineError::internal(e.to_string()))?;
    logger.log_stage(next);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use lipsync_inference::testing::{FakeEngine, FAKE_OUTPUT};
    use lipsync_inference::InvokerConfig;
    use lipsync_models::{FailureKind, JobId, JobOrigin, JobParameters, StorageBackend};
    use lipsync_storage::LocalStore;
    use std::time::Duration;
    use tempfile::TempDir;

    struct Harness {
        _dirs: (TempDir, TempDir, TempDir),
        inputs: std::path::PathBuf,
        work_dir: std::path::PathBuf,
        store_root: std::path::PathBuf,
        engine: Arc<FakeEngine>,
        coordinator: Arc<PipelineCoordinator>,
    }

    fn harness(engine: FakeEngine, invoker_timeout: Duration) -> Harness {
        let inputs = TempDir::new().unwrap();
        let work = TempDir::new().unwrap();
        let store_dir = TempDir::new().unwrap();

        std::fs::write(inputs.path().join("v.mp4"), b"video-bytes").unwrap();
        std::fs::write(inputs.path().join("a.wav"), b"audio-bytes").unwrap();

        let mut config = PipelineConfig {
            work_dir: work.path().join("jobs"),
            ..Default::default()
        };
        config.fetch_retry = config.fetch_retry.with_base_delay(Duration::from_millis(1));
        config.publish_retry = config.publish_retry.with_base_delay(Duration::from_millis(1));

        let engine = Arc::new(engine);
        let invoker = InferenceInvoker::new(
            engine.clone(),
            InvokerConfig {
                pool_size: 1,
                timeout: invoker_timeout,
            },
        );
        let store = Arc::new(LocalStore::new(store_dir.path()).unwrap());
        let coordinator = PipelineCoordinator::new(&config, invoker, store).unwrap();

        Harness {
            inputs: inputs.path().to_path_buf(),
            work_dir: config.work_dir.clone(),
            store_root: store_dir.path().to_path_buf(),
            _dirs: (inputs, work, store_dir),
            engine,
            coordinator: Arc::new(coordinator),
        }
    }

    fn queue_request(h: &Harness, params: JobParameters) -> JobRequest {
        JobRequest::new(
            JobOrigin::Queue,
            Some(h.inputs.join("v.mp4").display().to_string()),
            Some(h.inputs.join("a.wav").display().to_string()),
        )
        .with_parameters(params)
    }

    fn workspace_count(h: &Harness) -> usize {
        match std::fs::read_dir(&h.work_dir) {
            Ok(entries) => entries.count(),
            Err(_) => 0,
        }
    }

    #[tokio::test]
    async fn test_success_publishes_and_cleans_up() {
        let h = harness(FakeEngine::succeeding(), Duration::from_secs(5));
        let params = JobParameters {
            seed: 42,
            ..Default::default()
        };
        let request = queue_request(&h, params).with_job_id(Some(JobId::parse("job-ok").unwrap()));

        let report = h.coordinator.run(request).await;

        assert!(report.is_success(), "{:?}", report.outcome);
        assert_eq!(report.job.status, JobStatus::Succeeded);
        let reference = report.job.output_reference.clone().unwrap();
        assert_eq!(reference.backend, StorageBackend::Local);
        assert_eq!(reference.object_name(), "job-ok/output_42.mp4");

        let published = h.store_root.join("job-ok/output_42.mp4");
        assert_eq!(std::fs::read(&published).unwrap(), FAKE_OUTPUT);
        assert!(!h.work_dir.join("job-ok").exists());
        assert_eq!(workspace_count(&h), 0);
    }

    #[tokio::test]
    async fn test_engine_receives_workspace_paths() {
        let h = harness(FakeEngine::succeeding(), Duration::from_secs(5));
        let request = queue_request(&h, JobParameters::default())
            .with_job_id(Some(JobId::parse("paths").unwrap()));

        h.coordinator.run(request).await;

        let calls = h.engine.calls();
        assert_eq!(calls.len(), 1);
        let ws = h.work_dir.join("paths");
        assert_eq!(calls[0].video_path(), ws.join("video.mp4"));
        assert_eq!(calls[0].audio_path(), ws.join("audio.wav"));
        assert_eq!(calls[0].video_out_path(), ws.join("output_1247.mp4"));
        assert_eq!(calls[0].inference_steps(), 20);
        assert_eq!(calls[0].guidance_scale(), 1.5);
    }

    #[tokio::test]
    async fn test_engine_failure_cleans_up() {
        let h = harness(FakeEngine::failing("CUDA out of memory"), Duration::from_secs(5));

        let report = h.coordinator.run(queue_request(&h, JobParameters::default())).await;

        assert_eq!(report.job.status, JobStatus::Failed(FailureKind::Inference));
        assert!(report.job.error.as_deref().unwrap().contains("CUDA out of memory"));
        assert!(report.job.output_reference.is_none());
        assert_eq!(workspace_count(&h), 0);
        assert!(std::fs::read_dir(&h.store_root).unwrap().next().is_none());
    }

    #[tokio::test]
    async fn test_missing_output_is_inference_failure() {
        let h = harness(FakeEngine::without_output(), Duration::from_secs(5));

        let report = h.coordinator.run(queue_request(&h, JobParameters::default())).await;

        assert_eq!(report.job.status, JobStatus::Failed(FailureKind::Inference));
        assert_eq!(workspace_count(&h), 0);
    }

    #[tokio::test]
    async fn test_validation_failure_allocates_nothing() {
        let h = harness(FakeEngine::succeeding(), Duration::from_secs(5));
        let request = JobRequest::new(
            JobOrigin::Queue,
            Some(h.inputs.join("v.mp4").display().to_string()),
            None,
        );

        let report = h.coordinator.run(request).await;

        assert_eq!(report.job.status, JobStatus::Failed(FailureKind::Validation));
        assert_eq!(report.job.error.as_deref(), Some("Invalid request: audio is required"));
        assert!(!h.work_dir.exists());
        assert_eq!(h.engine.call_count(), 0);
    }

    #[tokio::test]
    async fn test_http_jobs_reject_local_paths() {
        let h = harness(FakeEngine::succeeding(), Duration::from_secs(5));
        let request = JobRequest::new(
            JobOrigin::Http,
            Some(h.inputs.join("v.mp4").display().to_string()),
            Some(h.inputs.join("a.wav").display().to_string()),
        );

        let report = h.coordinator.run(request).await;

        assert_eq!(report.job.status, JobStatus::Failed(FailureKind::Validation));
        assert_eq!(h.engine.call_count(), 0);
    }

    #[tokio::test]
    async fn test_fetch_failure_cleans_up() {
        let h = harness(FakeEngine::succeeding(), Duration::from_secs(5));
        let request = JobRequest::new(
            JobOrigin::Queue,
            Some(h.inputs.join("missing.mp4").display().to_string()),
            Some(h.inputs.join("a.wav").display().to_string()),
        );

        let report = h.coordinator.run(request).await;

        assert_eq!(report.job.status, JobStatus::Failed(FailureKind::Fetch));
        assert_eq!(h.engine.call_count(), 0);
        assert_eq!(workspace_count(&h), 0);
    }

    async fn wait_for_release(h: &Harness, id: &str) {
        for _ in 0..100 {
            if !h.work_dir.join(id).exists() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        panic!("workspace {} was never released", id);
    }

    #[tokio::test]
    async fn test_inference_timeout() {
        let h = harness(
            FakeEngine::succeeding().with_delay(Duration::from_millis(300)),
            Duration::from_millis(50),
        );
        let request = queue_request(&h, JobParameters::default())
            .with_job_id(Some(JobId::parse("slow").unwrap()));

        let report = h.coordinator.run(request).await;

        assert_eq!(report.job.status, JobStatus::Failed(FailureKind::Timeout));
        wait_for_release(&h, "slow").await;
        assert_eq!(workspace_count(&h), 0);
    }

    #[tokio::test]
    async fn test_timed_out_engine_keeps_workspace_until_it_returns() {
        let h = harness(
            FakeEngine::succeeding().with_delay(Duration::from_millis(400)),
            Duration::from_millis(50),
        );
        let id = JobId::parse("late").unwrap();

        let report = h
            .coordinator
            .run(queue_request(&h, JobParameters::default()).with_job_id(Some(id.clone())))
            .await;
        assert_eq!(report.job.status, JobStatus::Failed(FailureKind::Timeout));

        // Engine still busy: its inputs and output directory must survive
        assert_eq!(h.coordinator.invoker().available_permits(), 0);
        let ws = h.work_dir.join("late");
        assert!(ws.exists());
        assert!(ws.join("video.mp4").exists());
        assert!(ws.join("audio.wav").exists());

        // Resubmitting the same id cannot share the busy directory
        let retry = h
            .coordinator
            .run(queue_request(&h, JobParameters::default()).with_job_id(Some(id)))
            .await;
        assert_eq!(retry.job.status, JobStatus::Failed(FailureKind::WorkspaceConflict));

        wait_for_release(&h, "late").await;
        assert_eq!(h.coordinator.invoker().available_permits(), 1);
        assert_eq!(workspace_count(&h), 0);
    }

    #[tokio::test]
    async fn test_duplicate_job_id_conflicts() {
        let h = harness(
            FakeEngine::succeeding().with_delay(Duration::from_millis(200)),
            Duration::from_secs(5),
        );
        let id = JobId::parse("dup").unwrap();

        let first = {
            let coordinator = h.coordinator.clone();
            let request = queue_request(&h, JobParameters::default()).with_job_id(Some(id.clone()));
            tokio::spawn(async move { coordinator.run(request).await })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;

        let second = h
            .coordinator
            .run(queue_request(&h, JobParameters::default()).with_job_id(Some(id)))
            .await;
        assert_eq!(second.job.status, JobStatus::Failed(FailureKind::WorkspaceConflict));

        let first = first.await.unwrap();
        assert!(first.is_success());
        assert_eq!(workspace_count(&h), 0);
    }

    #[tokio::test]
    async fn test_concurrent_jobs_keep_their_own_parameters() {
        let h = harness(
            FakeEngine::succeeding().with_delay(Duration::from_millis(20)),
            Duration::from_secs(5),
        );

        let handles: Vec<_> = (1..=4)
            .map(|i| {
                let coordinator = h.coordinator.clone();
                let params = JobParameters {
                    inference_steps: 10 * i,
                    guidance_scale: i as f64,
                    seed: i as i64,
                };
                let request = queue_request(&h, params);
                tokio::spawn(async move { coordinator.run(request).await })
            })
            .collect();

        let mut reports = Vec::new();
        for handle in handles {
            reports.push(handle.await.unwrap());
        }

        let calls = h.engine.calls();
        assert_eq!(calls.len(), 4);
        assert_eq!(h.engine.max_concurrency(), 1);

        for report in &reports {
            assert!(report.is_success());
            let call = calls
                .iter()
                .find(|c| c.video_out_path().starts_with(h.work_dir.join(report.job.id.as_str())))
                .unwrap();
            assert_eq!(call.guidance_scale(), report.job.parameters.guidance_scale);
            assert_eq!(call.inference_steps(), report.job.parameters.inference_steps);
            assert_eq!(call.seed(), report.job.parameters.seed);
        }

        let mut dirs: Vec<_> = calls
            .iter()
            .map(|c| c.video_out_path().parent().unwrap().to_path_buf())
            .collect();
        dirs.sort();
        dirs.dedup();
        assert_eq!(dirs.len(), 4);
        assert_eq!(workspace_count(&h), 0);
    }
}
