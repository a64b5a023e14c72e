//! Per-job workspaces.
//!
//! Every job gets its own directory `{root}/{job_id}`. Allocation fails if the
//! directory already exists, so two jobs can never share one. A `Workspace`
//! is released explicitly with [`Workspace::release`]; if it is dropped
//! without being released (panic, cancelled future) the directory is removed
//! synchronously in `Drop`. Removal failures are logged, never returned.

use std::path::{Path, PathBuf};

use lipsync_models::{output_file_name, JobId, SourceLocation};
use tracing::{debug, info, warn};

use crate::error::{WorkspaceError, WorkspaceResult};

/// Kind of staged input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssetKind {
    Video,
    Audio,
}

impl AssetKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AssetKind::Video => "video",
            AssetKind::Audio => "audio",
        }
    }

    fn default_extension(&self) -> &'static str {
        match self {
            AssetKind::Video => "mp4",
            AssetKind::Audio => "wav",
        }
    }
}

/// Allocates job workspaces under a root directory.
#[derive(Debug, Clone)]
pub struct WorkspaceManager {
    root: PathBuf,
}

impl WorkspaceManager {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory a job's workspace lives in.
    pub fn path_for(&self, job_id: &JobId) -> PathBuf {
        self.root.join(job_id.as_str())
    }

    /// Create the workspace for `job_id`.
    ///
    /// Returns [`WorkspaceError::Conflict`] if the directory already exists.
    pub async fn allocate(&self, job_id: &JobId) -> WorkspaceResult<Workspace> {
        tokio::fs::create_dir_all(&self.root).await?;

        let dir = self.path_for(job_id);
        match tokio::fs::create_dir(&dir).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                return Err(WorkspaceError::Conflict(job_id.clone()));
            }
            Err(e) => return Err(WorkspaceError::Io(e)),
        }

        debug!(job_id = %job_id, "Allocated workspace {}", dir.display());

        Ok(Workspace {
            job_id: job_id.clone(),
            dir,
            released: false,
        })
    }
}

/// Exclusively owned directory for one job.
#[derive(Debug)]
pub struct Workspace {
    job_id: JobId,
    dir: PathBuf,
    released: bool,
}

impl Workspace {
    pub fn job_id(&self) -> &JobId {
        &self.job_id
    }

    pub fn path(&self) -> &Path {
        &self.dir
    }

    /// Where a staged input of `kind` goes, keeping the source's extension.
    pub fn input_path(&self, kind: AssetKind, source: &SourceLocation) -> PathBuf {
        let ext = source
            .extension()
            .unwrap_or_else(|| kind.default_extension().to_string());
        self.dir.join(format!("{}.{}", kind.as_str(), ext))
    }

    /// Where the inference engine writes its output.
    pub fn output_path(&self, seed: i64) -> PathBuf {
        self.dir.join(output_file_name(seed))
    }

    /// Recursively delete the workspace.
    ///
    /// Returns `false` if the directory could not be removed; the failure is
    /// logged and otherwise ignored.
    pub async fn release(mut self) -> bool {
        self.released = true;

        match tokio::fs::remove_dir_all(&self.dir).await {
            Ok(()) => {
                info!(job_id = %self.job_id, "Released workspace {}", self.dir.display());
                true
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => true,
            Err(e) => {
                warn!(
                    job_id = %self.job_id,
                    "Failed to remove workspace {}: {}",
                    self.dir.display(),
                    e
                );
                false
            }
        }
    }
}

impl Drop for Workspace {
    fn drop(&mut self) {
        if self.released {
            return;
        }

        warn!(
            job_id = %self.job_id,
            "Workspace dropped without release, removing {}",
            self.dir.display()
        );

        if let Err(e) = std::fs::remove_dir_all(&self.dir) {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!(
                    job_id = %self.job_id,
                    "Failed to remove workspace {}: {}",
                    self.dir.display(),
                    e
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_allocate_and_release() {
        let root = TempDir::new().unwrap();
        let manager = WorkspaceManager::new(root.path().join("jobs"));
        let job_id = JobId::new();

        let workspace = manager.allocate(&job_id).await.unwrap();
        let dir = workspace.path().to_path_buf();
        assert!(dir.is_dir());
        assert_eq!(dir, manager.path_for(&job_id));

        tokio::fs::write(workspace.output_path(42), b"out").await.unwrap();
        assert!(workspace.release().await);
        assert!(!dir.exists());
    }

    #[tokio::test]
    async fn test_allocate_conflict() {
        let root = TempDir::new().unwrap();
        let manager = WorkspaceManager::new(root.path());
        let job_id = JobId::parse("same-id").unwrap();

        let first = manager.allocate(&job_id).await.unwrap();
        let err = manager.allocate(&job_id).await.unwrap_err();
        assert!(matches!(err, WorkspaceError::Conflict(id) if id == job_id));

        first.release().await;
    }

    #[tokio::test]
    async fn test_distinct_jobs_get_distinct_dirs() {
        let root = TempDir::new().unwrap();
        let manager = WorkspaceManager::new(root.path());

        let a = manager.allocate(&JobId::new()).await.unwrap();
        let b = manager.allocate(&JobId::new()).await.unwrap();
        assert_ne!(a.path(), b.path());
        assert_ne!(a.output_path(1), b.output_path(1));

        a.release().await;
        b.release().await;
    }

    #[tokio::test]
    async fn test_drop_without_release_cleans_up() {
        let root = TempDir::new().unwrap();
        let manager = WorkspaceManager::new(root.path());

        let workspace = manager.allocate(&JobId::new()).await.unwrap();
        let dir = workspace.path().to_path_buf();
        drop(workspace);

        assert!(!dir.exists());
    }

    #[tokio::test]
    async fn test_release_tolerates_missing_dir() {
        let root = TempDir::new().unwrap();
        let manager = WorkspaceManager::new(root.path());

        let workspace = manager.allocate(&JobId::new()).await.unwrap();
        std::fs::remove_dir_all(workspace.path()).unwrap();
        assert!(workspace.release().await);
    }

    #[test]
    fn test_input_paths() {
        let workspace = Workspace {
            job_id: JobId::parse("j").unwrap(),
            dir: PathBuf::from("/tmp/ws/j"),
            released: true,
        };
        let video = SourceLocation::parse("video", "https://x.io/clip.mov", false).unwrap();
        let audio = SourceLocation::parse("audio", "https://x.io/speech", false).unwrap();

        assert_eq!(workspace.input_path(AssetKind::Video, &video), PathBuf::from("/tmp/ws/j/video.mov"));
        assert_eq!(workspace.input_path(AssetKind::Audio, &audio), PathBuf::from("/tmp/ws/j/audio.wav"));
        assert_eq!(workspace.output_path(42), PathBuf::from("/tmp/ws/j/output_42.mp4"));
    }
}
