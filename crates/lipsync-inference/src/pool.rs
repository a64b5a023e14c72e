//! Admission-controlled engine invocation.
//!
//! At most `pool_size` engine calls run at once; further callers wait on the
//! semaphore. Each call runs on its own task that owns the permit, so a job
//! that hits the deadline is failed immediately while the permit stays held
//! until the engine actually finishes. The still-running call is handed back
//! as a [`PendingCall`] so the caller can keep the engine's files alive until
//! it returns.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use metrics::{gauge, histogram};
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::engine::InferenceEngine;
use crate::error::{InferenceError, InferenceResult};
use crate::types::ComputeInvocationSpec;

const INFLIGHT_GAUGE: &str = "lipsync_inference_in_flight";
const WAITING_GAUGE: &str = "lipsync_inference_waiting";
const DURATION_HISTOGRAM: &str = "lipsync_inference_duration_seconds";

/// Invoker configuration.
#[derive(Debug, Clone)]
pub struct InvokerConfig {
    /// Number of engine calls allowed at once (compute units available)
    pub pool_size: usize,
    /// Deadline for one engine call, not counting time spent queued
    pub timeout: Duration,
}

impl Default for InvokerConfig {
    fn default() -> Self {
        Self {
            pool_size: 1,
            timeout: Duration::from_secs(3600),
        }
    }
}

impl InvokerConfig {
    pub fn from_env() -> Self {
        Self {
            pool_size: std::env::var("INFERENCE_POOL_SIZE")
                .ok()
                .and_then(|s| s.parse().ok())
                .filter(|n: &usize| *n > 0)
                .unwrap_or(1),
            timeout: Duration::from_secs(
                std::env::var("INFERENCE_TIMEOUT_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(3600),
            ),
        }
    }
}

/// Increments a gauge for as long as it lives.
struct GaugeGuard(&'static str);

impl GaugeGuard {
    fn new(name: &'static str) -> Self {
        gauge!(name).increment(1.0);
        Self(name)
    }
}

impl Drop for GaugeGuard {
    fn drop(&mut self) {
        gauge!(self.0).decrement(1.0);
    }
}

/// Engine call that outlived its deadline.
#[derive(Debug)]
pub struct PendingCall {
    handle: JoinHandle<InferenceResult<()>>,
}

impl PendingCall {
    /// Wait for the engine to return. The pool permit is free afterwards.
    pub async fn finished(self) {
        match self.handle.await {
            Ok(Ok(())) => debug!("Timed-out inference call finished"),
            Ok(Err(e)) => debug!("Timed-out inference call failed: {}", e),
            Err(e) => warn!("Timed-out inference task aborted: {}", e),
        }
    }
}

/// Outcome of [`InferenceInvoker::invoke`].
#[derive(Debug)]
pub struct Invocation {
    /// Output path, or why there is none
    pub result: InferenceResult<PathBuf>,
    /// Set when the deadline passed while the engine was still running
    pub pending: Option<PendingCall>,
}

/// Runs engine calls through a bounded pool.
#[derive(Clone)]
pub struct InferenceInvoker {
    engine: Arc<dyn InferenceEngine>,
    permits: Arc<Semaphore>,
    config: InvokerConfig,
}

impl InferenceInvoker {
    pub fn new(engine: Arc<dyn InferenceEngine>, config: InvokerConfig) -> Self {
        let pool_size = config.pool_size.max(1);
        Self {
            engine,
            permits: Arc::new(Semaphore::new(pool_size)),
            config: InvokerConfig { pool_size, ..config },
        }
    }

    pub fn engine(&self) -> &Arc<dyn InferenceEngine> {
        &self.engine
    }

    pub fn pool_size(&self) -> usize {
        self.config.pool_size
    }

    /// Compute units not currently in use.
    pub fn available_permits(&self) -> usize {
        self.permits.available_permits()
    }

    /// Run the engine for one job and verify it produced a non-empty file.
    ///
    /// On timeout the result is [`InferenceError::Timeout`] and `pending`
    /// carries the engine call, which keeps running and keeps its permit.
    pub async fn invoke(&self, spec: ComputeInvocationSpec) -> Invocation {
        let permit = {
            let _waiting = GaugeGuard::new(WAITING_GAUGE);
            match self.permits.clone().acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => {
                    return Invocation {
                        result: Err(InferenceError::PoolClosed),
                        pending: None,
                    }
                }
            }
        };

        let output = spec.video_out_path().to_path_buf();
        let engine = Arc::clone(&self.engine);
        let started = Instant::now();

        debug!(
            engine = engine.name(),
            seed = spec.seed(),
            "Invoking inference engine for {}",
            output.display()
        );

        let mut task = tokio::spawn(async move {
            let _permit = permit;
            let _in_flight = GaugeGuard::new(INFLIGHT_GAUGE);
            engine.run(&spec).await
        });

        let (result, pending) = match tokio::time::timeout(self.config.timeout, &mut task).await {
            Ok(Ok(result)) => (result, None),
            Ok(Err(join_error)) => (Err(InferenceError::Join(join_error.to_string())), None),
            Err(_) => {
                warn!(
                    "Inference exceeded {}s; the engine call continues in the background",
                    self.config.timeout.as_secs()
                );
                (
                    Err(InferenceError::Timeout(self.config.timeout.as_secs())),
                    Some(PendingCall { handle: task }),
                )
            }
        };

        histogram!(DURATION_HISTOGRAM).record(started.elapsed().as_secs_f64());

        let result = match result {
            Ok(()) => verify_output(&output).await.map(|()| output),
            Err(e) => Err(e),
        };

        if let Ok(path) = &result {
            info!(
                "Inference produced {} in {:.1}s",
                path.display(),
                started.elapsed().as_secs_f64()
            );
        }

        Invocation { result, pending }
    }
}

async fn verify_output(path: &std::path::Path) -> InferenceResult<()> {
    match tokio::fs::metadata(path).await {
        Ok(meta) if meta.is_file() && meta.len() > 0 => Ok(()),
        _ => Err(InferenceError::MissingOutput(path.to_path_buf())),
    }
}
