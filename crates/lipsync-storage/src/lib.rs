//! Result storage for the lip-sync pipeline.
//!
//! This crate provides:
//! - The `ObjectStore` put/get abstraction used by the publisher
//! - Cloudflare R2 storage over the S3 API
//! - A local-filesystem store for serverless deployments
//! - Deterministic object key layouts derived from job ids

pub mod client;
pub mod error;
pub mod keys;
pub mod local;
pub mod store;

pub use client::{R2Client, R2Config};
pub use error::{StorageError, StorageResult};
pub use keys::{result_key, ObjectKeyLayout};
pub use local::LocalStore;
pub use store::{validate_key, ObjectStore, VIDEO_CONTENT_TYPE};
