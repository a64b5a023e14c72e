//! Result publication.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use lipsync_models::StorageReference;
use lipsync_storage::{ObjectStore, VIDEO_CONTENT_TYPE};
use tracing::info;

use crate::error::{PipelineError, PipelineResult};
use crate::retry::{with_retry, RetryConfig};

/// Uploads produced videos to the configured object store.
///
/// Every attempt writes the same key, so a retry replaces a partially
/// accepted upload instead of adding a second object.
#[derive(Clone)]
pub struct ResultPublisher {
    store: Arc<dyn ObjectStore>,
    retry: RetryConfig,
    timeout: Duration,
}

impl ResultPublisher {
    pub fn new(store: Arc<dyn ObjectStore>, retry: RetryConfig, timeout: Duration) -> Self {
        Self {
            store,
            retry,
            timeout,
        }
    }

    pub fn store(&self) -> &Arc<dyn ObjectStore> {
        &self.store
    }

    pub async fn publish(&self, local_path: &Path, key: &str) -> PipelineResult<StorageReference> {
        let reference = with_retry(&self.retry, "publish", || async {
            match tokio::time::timeout(
                self.timeout,
                self.store.put_file(local_path, key, VIDEO_CONTENT_TYPE),
            )
            .await
            {
                Ok(Ok(reference)) => Ok(reference),
                Ok(Err(e)) => Err(PipelineError::Publish(e)),
                Err(_) => Err(PipelineError::Timeout {
                    stage: "publish",
                    seconds: self.timeout.as_secs(),
                }),
            }
        })
        .await?;

        info!("Published result to {}", reference);
        Ok(reference)
    }
}
