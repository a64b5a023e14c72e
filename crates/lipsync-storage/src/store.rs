//! Object store abstraction.

use std::path::Path;

use async_trait::async_trait;
use lipsync_models::{StorageBackend, StorageReference};

use crate::error::{StorageError, StorageResult};

/// Content type of published results.
pub const VIDEO_CONTENT_TYPE: &str = "video/mp4";

/// Maximum object key length accepted by S3-compatible backends.
const MAX_KEY_LENGTH: usize = 1024;

/// Blob store with whole-object put/get semantics.
///
/// A put to an existing key replaces the object, so retried publishes of the
/// same job never duplicate results.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Backend kind, used to build references.
    fn backend(&self) -> StorageBackend;

    /// Bucket (or root directory) that references point into.
    fn bucket(&self) -> &str;

    /// Upload a local file under `key`.
    async fn put_file(&self, path: &Path, key: &str, content_type: &str) -> StorageResult<StorageReference>;

    /// Fetch an object's bytes.
    async fn get_bytes(&self, key: &str) -> StorageResult<Vec<u8>>;

    /// Verify the backend is reachable and the bucket (or root) usable.
    async fn check_connectivity(&self) -> StorageResult<()>;

    /// Reference for `key` in this store.
    fn reference(&self, key: &str) -> StorageReference {
        StorageReference::new(self.backend(), self.bucket(), key)
    }
}

/// Reject keys that could escape a bucket or directory root.
pub fn validate_key(key: &str) -> StorageResult<()> {
    let bad = key.is_empty()
        || key.len() > MAX_KEY_LENGTH
        || key.starts_with('/')
        || key.contains('\\')
        || key.split('/').any(|part| part.is_empty() || part == "." || part == "..");

    if bad {
        Err(StorageError::invalid_key(key))
    } else {
        Ok(())
    }
}
