//! Asset fetching into a job workspace.
//!
//! Remote sources are streamed over HTTP(S); local sources are checked for
//! existence, type and readability and then copied. Either way exactly one
//! file is created at the destination, and a failed attempt leaves nothing
//! behind. Retries are the caller's concern.

use std::path::Path;
use std::time::Duration;

use lipsync_models::SourceLocation;
use reqwest::Client;
use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};
use url::Url;

use crate::error::{FetchError, FetchResult};

/// Configuration for the asset fetcher.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// Whole-request timeout for one fetch attempt
    pub timeout: Duration,
    /// TCP/TLS connect timeout
    pub connect_timeout: Duration,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(60),
            connect_timeout: Duration::from_secs(10),
        }
    }
}

impl FetchConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        Self {
            timeout: Duration::from_secs(
                std::env::var("FETCH_TIMEOUT_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(60),
            ),
            connect_timeout: Duration::from_secs(
                std::env::var("FETCH_CONNECT_TIMEOUT_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(10),
            ),
        }
    }
}

/// Stages input assets into a workspace.
#[derive(Debug, Clone)]
pub struct AssetFetcher {
    http: Client,
}

impl AssetFetcher {
    /// Create a new fetcher.
    pub fn new(config: FetchConfig) -> FetchResult<Self> {
        let http = Client::builder()
            .timeout(config.timeout)
            .connect_timeout(config.connect_timeout)
            .build()
            .map_err(|e| FetchError::Client(e.to_string()))?;

        Ok(Self { http })
    }

    /// Stage `source` at `destination`, returning the number of bytes written.
    pub async fn fetch(&self, source: &SourceLocation, destination: &Path) -> FetchResult<u64> {
        let result = match source {
            SourceLocation::Remote(url) => self.fetch_remote(url, destination).await,
            SourceLocation::Local(path) => stage_local(path, destination).await,
        };

        if let Ok(bytes) = result {
            info!("Staged {} ({} bytes) at {}", source, bytes, destination.display());
        }

        result
    }

    async fn fetch_remote(&self, url: &Url, destination: &Path) -> FetchResult<u64> {
        debug!("Fetching {}", url);

        let mut response = self
            .http
            .get(url.clone())
            .send()
            .await
            .map_err(|e| classify_reqwest_error(url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let mut file = create_destination(destination).await?;

        let copied: FetchResult<u64> = async {
            let mut written = 0u64;
            while let Some(chunk) = response
                .chunk()
                .await
                .map_err(|e| classify_reqwest_error(url, e))?
            {
                file.write_all(&chunk).await?;
                written += chunk.len() as u64;
            }
            file.flush().await?;
            Ok(written)
        }
        .await;
        drop(file);

        finish_destination(destination, copied, url.as_str()).await
    }
}

/// Validate a local source and copy it to `destination`.
async fn stage_local(path: &Path, destination: &Path) -> FetchResult<u64> {
    let metadata = match tokio::fs::metadata(path).await {
        Ok(metadata) => metadata,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(FetchError::FileNotFound(path.to_path_buf()));
        }
        Err(e) => {
            return Err(FetchError::NotReadable {
                path: path.to_path_buf(),
                message: e.to_string(),
            });
        }
    };

    if !metadata.is_file() {
        return Err(FetchError::NotReadable {
            path: path.to_path_buf(),
            message: "not a regular file".to_string(),
        });
    }

    if metadata.len() == 0 {
        return Err(FetchError::EmptyBody(path.display().to_string()));
    }

    let mut source = File::open(path).await.map_err(|e| FetchError::NotReadable {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;

    let mut file = create_destination(destination).await?;

    let copied: FetchResult<u64> = async {
        let written = tokio::io::copy(&mut source, &mut file).await?;
        file.flush().await?;
        Ok(written)
    }
    .await;
    drop(file);

    finish_destination(destination, copied, &path.display().to_string()).await
}

/// Create the destination file, refusing to clobber an existing one.
async fn create_destination(destination: &Path) -> FetchResult<File> {
    OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(destination)
        .await
        .map_err(|e| {
            if e.kind() == std::io::ErrorKind::AlreadyExists {
                FetchError::DestinationExists(destination.to_path_buf())
            } else {
                FetchError::Io(e)
            }
        })
}

/// Remove the destination unless the copy produced a non-empty file.
async fn finish_destination(destination: &Path, copied: FetchResult<u64>, origin: &str) -> FetchResult<u64> {
    let outcome = match copied {
        Ok(0) => Err(FetchError::EmptyBody(origin.to_string())),
        other => other,
    };

    if outcome.is_err() {
        if let Err(e) = tokio::fs::remove_file(destination).await {
            warn!("Failed to remove partial file {}: {}", destination.display(), e);
        }
    }

    outcome
}

fn classify_reqwest_error(url: &Url, error: reqwest::Error) -> FetchError {
    if error.is_timeout() {
        FetchError::Timeout(url.to_string())
    } else if let Some(status) = error.status() {
        FetchError::Status {
            url: url.to_string(),
            status: status.as_u16(),
        }
    } else {
        FetchError::unreachable(url.as_str(), error.to_string())
    }
}
