//! Published result references.

use std::fmt;
use std::path::Path;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Backend that holds a published object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum StorageBackend {
    /// Cloudflare R2 (S3 API).
    R2,
    /// Local filesystem directory.
    Local,
}

/// Opaque handle to a published result: a bucket plus an object key.
///
/// For the local backend the bucket is the absolute root directory.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
pub struct StorageReference {
    pub backend: StorageBackend,
    pub bucket: String,
    pub key: String,
}

impl StorageReference {
    pub fn new(backend: StorageBackend, bucket: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            backend,
            bucket: bucket.into(),
            key: key.into(),
        }
    }

    /// Object name within the bucket.
    pub fn object_name(&self) -> &str {
        &self.key
    }

    /// Full location: `bucket/key` for R2, an absolute path for local storage.
    pub fn location(&self) -> String {
        match self.backend {
            StorageBackend::R2 => format!("{}/{}", self.bucket, self.key),
            StorageBackend::Local => Path::new(&self.bucket).join(&self.key).display().to_string(),
        }
    }
}

impl fmt::Display for StorageReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.location())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_r2_location() {
        let reference = StorageReference::new(StorageBackend::R2, "results", "abc.mp4");
        assert_eq!(reference.location(), "results/abc.mp4");
        assert_eq!(reference.object_name(), "abc.mp4");
    }

    #[test]
    fn test_local_location() {
        let reference = StorageReference::new(StorageBackend::Local, "/srv/out", "job-1/output_42.mp4");
        assert_eq!(reference.location(), "/srv/out/job-1/output_42.mp4");
    }
}
