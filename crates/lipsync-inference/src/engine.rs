//! The external compute step.

use async_trait::async_trait;

use crate::error::InferenceResult;
use crate::types::ComputeInvocationSpec;

/// A lip-sync inference engine.
///
/// `run` must either write a complete video to `spec.video_out_path()` or
/// return an error. Implementations are called through
/// [`InferenceInvoker`](crate::InferenceInvoker), which limits concurrency.
#[async_trait]
pub trait InferenceEngine: Send + Sync {
    /// Short name for logs.
    fn name(&self) -> &str;

    async fn run(&self, spec: &ComputeInvocationSpec) -> InferenceResult<()>;

    async fn health_check(&self) -> InferenceResult<bool>;
}
