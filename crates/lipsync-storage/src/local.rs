//! Local filesystem object store.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use lipsync_models::{StorageBackend, StorageReference};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{StorageError, StorageResult};
use crate::store::{validate_key, ObjectStore};

/// Object store rooted at a local directory.
///
/// Objects are written to a temp file next to the destination and renamed
/// into place, so readers never observe a partially written result and a
/// second put of the same key replaces the first.
#[derive(Debug, Clone)]
pub struct LocalStore {
    root: PathBuf,
    root_display: String,
}

impl LocalStore {
    /// Create a store rooted at `root` (made absolute).
    pub fn new(root: impl AsRef<Path>) -> StorageResult<Self> {
        let root = std::path::absolute(root.as_ref())?;
        let root_display = root.display().to_string();
        Ok(Self { root, root_display })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn object_path(&self, key: &str) -> StorageResult<PathBuf> {
        validate_key(key)?;
        Ok(self.root.join(key))
    }
}

#[async_trait]
impl ObjectStore for LocalStore {
    fn backend(&self) -> StorageBackend {
        StorageBackend::Local
    }

    fn bucket(&self) -> &str {
        &self.root_display
    }

    async fn put_file(&self, path: &Path, key: &str, _content_type: &str) -> StorageResult<StorageReference> {
        let dest = self.object_path(key)?;
        debug!("Storing {} at {}", path.display(), dest.display());

        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let tmp = dest.with_extension(format!("{}.tmp", Uuid::new_v4().simple()));
        if let Err(e) = tokio::fs::copy(path, &tmp).await {
            if let Err(cleanup) = tokio::fs::remove_file(&tmp).await {
                if cleanup.kind() != std::io::ErrorKind::NotFound {
                    warn!("Failed to remove temp file {}: {}", tmp.display(), cleanup);
                }
            }
            return Err(StorageError::upload_failed(format!(
                "copy {} failed: {}",
                path.display(),
                e
            )));
        }

        if let Err(e) = tokio::fs::rename(&tmp, &dest).await {
            if let Err(cleanup) = tokio::fs::remove_file(&tmp).await {
                warn!("Failed to remove temp file {}: {}", tmp.display(), cleanup);
            }
            return Err(StorageError::upload_failed(format!(
                "rename into {} failed: {}",
                dest.display(),
                e
            )));
        }

        info!("Stored {} at {}", path.display(), dest.display());
        Ok(self.reference(key))
    }

    async fn get_bytes(&self, key: &str) -> StorageResult<Vec<u8>> {
        let path = self.object_path(key)?;
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(StorageError::not_found(key)),
            Err(e) => Err(StorageError::DownloadFailed(e.to_string())),
        }
    }

    /// Create the root if needed and confirm it is a directory.
    async fn check_connectivity(&self) -> StorageResult<()> {
        tokio::fs::create_dir_all(&self.root).await?;
        let meta = tokio::fs::metadata(&self.root).await?;
        if !meta.is_dir() {
            return Err(StorageError::config_error(format!(
                "{} is not a directory",
                self.root.display()
            )));
        }
        Ok(())
    }
}
