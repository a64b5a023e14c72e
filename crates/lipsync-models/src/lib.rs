//! Shared data models for the lip-sync job pipeline.
//!
//! This crate provides Serde-serializable types for:
//! - Jobs, job identifiers and inference parameters
//! - The job status state machine
//! - Input source locations (remote URLs and local paths)
//! - Storage references returned after publishing
//! - Wire schemas for the HTTP and queue front-ends

pub mod error;
pub mod job;
pub mod job_status;
pub mod request;
pub mod source;
pub mod storage;

pub use error::{ModelError, ModelResult};
pub use job::{output_file_name, Job, JobId, JobOrigin, JobParameters, JobRequest};
pub use job_status::{FailureKind, JobStatus};
pub use request::{GenerateRequest, GenerateResponse, QueueJob, QueueJobInput, QueueOutput};
pub use source::SourceLocation;
pub use storage::{StorageBackend, StorageReference};
