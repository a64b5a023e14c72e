//! Lip-sync job pipeline.
//!
//! `PipelineCoordinator::run` takes one admitted request through
//! validation, asset staging, inference and publication, and always
//! releases the job's workspace before returning. Both front-ends (HTTP and
//! queue) call into the same coordinator.

pub mod config;
pub mod coordinator;
pub mod error;
pub mod logging;
pub mod metrics;
pub mod publisher;
pub mod retry;

pub use config::PipelineConfig;
pub use coordinator::{JobReport, PipelineCoordinator};
pub use error::{PipelineError, PipelineResult};
pub use logging::JobLogger;
pub use publisher::ResultPublisher;
pub use retry::{with_retry, RetryConfig};
