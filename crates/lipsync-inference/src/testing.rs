//! In-process engine for tests.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use crate::engine::InferenceEngine;
use crate::error::{InferenceError, InferenceResult};
use crate::types::ComputeInvocationSpec;

/// Bytes written as the fake output video.
pub const FAKE_OUTPUT: &[u8] = b"\x00\x00\x00\x18ftypmp42fake-lipsync-output";

#[derive(Debug, Clone)]
enum Behavior {
    Succeed,
    Fail(String),
    NoOutput,
}

/// Engine that records every invocation it receives.
///
/// Depending on how it was built it writes [`FAKE_OUTPUT`] to the invocation's
/// output path, fails with a fixed message, or returns success without
/// writing anything.
#[derive(Debug)]
pub struct FakeEngine {
    behavior: Behavior,
    delay: Option<Duration>,
    healthy: AtomicBool,
    calls: Mutex<Vec<ComputeInvocationSpec>>,
    active: AtomicUsize,
    max_active: AtomicUsize,
}

impl FakeEngine {
    fn with_behavior(behavior: Behavior) -> Self {
        Self {
            behavior,
            delay: None,
            healthy: AtomicBool::new(true),
            calls: Mutex::new(Vec::new()),
            active: AtomicUsize::new(0),
            max_active: AtomicUsize::new(0),
        }
    }

    pub fn succeeding() -> Self {
        Self::with_behavior(Behavior::Succeed)
    }

    pub fn failing(message: impl Into<String>) -> Self {
        Self::with_behavior(Behavior::Fail(message.into()))
    }

    pub fn without_output() -> Self {
        Self::with_behavior(Behavior::NoOutput)
    }

    /// Sleep this long inside every call.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn set_healthy(&self, healthy: bool) {
        self.healthy.store(healthy, Ordering::SeqCst);
    }

    pub fn calls(&self) -> Vec<ComputeInvocationSpec> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().map(|c| c.len()).unwrap_or_default()
    }

    /// Highest number of calls observed running at the same time.
    pub fn max_concurrency(&self) -> usize {
        self.max_active.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl InferenceEngine for FakeEngine {
    fn name(&self) -> &str {
        "fake"
    }

    async fn run(&self, spec: &ComputeInvocationSpec) -> InferenceResult<()> {
        let active = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active.fetch_max(active, Ordering::SeqCst);

        if let Ok(mut calls) = self.calls.lock() {
            calls.push(spec.clone());
        }

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let result = match &self.behavior {
            Behavior::Succeed => tokio::fs::write(spec.video_out_path(), FAKE_OUTPUT)
                .await
                .map_err(|e| InferenceError::engine(e.to_string())),
            Behavior::Fail(message) => Err(InferenceError::engine(message.clone())),
            Behavior::NoOutput => Ok(()),
        };

        self.active.fetch_sub(1, Ordering::SeqCst);
        result
    }

    async fn health_check(&self) -> InferenceResult<bool> {
        Ok(self.healthy.load(Ordering::SeqCst))
    }
}
