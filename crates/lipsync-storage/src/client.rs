//! R2 client implementation.

use std::path::Path;

use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_credential_types::Credentials;
use aws_sdk_s3::config::{Builder, Region};
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use lipsync_models::{StorageBackend, StorageReference};
use tracing::{debug, info};

use crate::error::{StorageError, StorageResult};
use crate::store::{validate_key, ObjectStore};

/// Configuration for R2 client.
#[derive(Clone)]
pub struct R2Config {
    /// R2 endpoint URL (S3 API endpoint)
    pub endpoint_url: String,
    /// Access key ID
    pub access_key_id: String,
    /// Secret access key
    pub secret_access_key: String,
    /// Bucket name
    pub bucket_name: String,
    /// Region (usually "auto" for R2)
    pub region: String,
}

impl std::fmt::Debug for R2Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("R2Config")
            .field("endpoint_url", &self.endpoint_url)
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"<redacted>")
            .field("bucket_name", &self.bucket_name)
            .field("region", &self.region)
            .finish()
    }
}

impl R2Config {
    /// Create config from environment variables.
    ///
    /// The endpoint is derived from `R2_ACCOUNT_ID` unless `R2_ENDPOINT_URL`
    /// is set explicitly.
    pub fn from_env() -> StorageResult<Self> {
        let account_id = required_env("R2_ACCOUNT_ID")?;
        let endpoint_url = std::env::var("R2_ENDPOINT_URL")
            .ok()
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| endpoint_for_account(&account_id));

        Ok(Self {
            endpoint_url,
            access_key_id: required_env("R2_ACCESS_KEY_ID")?,
            secret_access_key: required_env("R2_SECRET_ACCESS_KEY")?,
            bucket_name: required_env("R2_BUCKET_NAME")?,
            region: std::env::var("R2_REGION").unwrap_or_else(|_| "auto".to_string()),
        })
    }
}

fn required_env(name: &str) -> StorageResult<String> {
    std::env::var(name)
        .ok()
        .filter(|s| !s.is_empty())
        .ok_or_else(|| StorageError::config_error(format!("{} not set", name)))
}

/// S3 API endpoint for an R2 account.
pub fn endpoint_for_account(account_id: &str) -> String {
    format!("https://{}.r2.cloudflarestorage.com", account_id)
}

/// Cloudflare R2 storage client.
#[derive(Clone)]
pub struct R2Client {
    client: Client,
    bucket: String,
}

impl R2Client {
    /// Create a new R2 client from configuration.
    pub fn new(config: R2Config) -> Self {
        let credentials = Credentials::new(
            &config.access_key_id,
            &config.secret_access_key,
            None,
            None,
            "r2",
        );

        let sdk_config = Builder::new()
            .behavior_version(BehaviorVersion::latest())
            .endpoint_url(&config.endpoint_url)
            .region(Region::new(config.region))
            .credentials_provider(credentials)
            .force_path_style(true)
            .build();

        Self {
            client: Client::from_conf(sdk_config),
            bucket: config.bucket_name,
        }
    }

    /// Create from environment variables.
    pub fn from_env() -> StorageResult<Self> {
        Ok(Self::new(R2Config::from_env()?))
    }

    /// Upload a file to R2.
    pub async fn upload_file(&self, path: &Path, key: &str, content_type: &str) -> StorageResult<()> {
        validate_key(key)?;
        debug!("Uploading {} to {}", path.display(), key);

        let body = ByteStream::from_path(path)
            .await
            .map_err(|e| StorageError::upload_failed(e.to_string()))?;

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(body)
            .content_type(content_type)
            .send()
            .await
            .map_err(|e| StorageError::upload_failed(e.to_string()))?;

        info!("Uploaded {} to {}/{}", path.display(), self.bucket, key);
        Ok(())
    }

    /// Download object as bytes.
    pub async fn download_bytes(&self, key: &str) -> StorageResult<Vec<u8>> {
        debug!("Downloading {}", key);

        let response = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| {
                if e.to_string().contains("NoSuchKey") {
                    StorageError::not_found(key)
                } else {
                    StorageError::DownloadFailed(e.to_string())
                }
            })?;

        let bytes = response
            .body
            .collect()
            .await
            .map_err(|e| StorageError::DownloadFailed(e.to_string()))?
            .into_bytes()
            .to_vec();

        Ok(bytes)
    }
}

#[async_trait]
impl ObjectStore for R2Client {
    fn backend(&self) -> StorageBackend {
        StorageBackend::R2
    }

    fn bucket(&self) -> &str {
        &self.bucket
    }

    async fn put_file(&self, path: &Path, key: &str, content_type: &str) -> StorageResult<StorageReference> {
        self.upload_file(path, key, content_type).await?;
        Ok(self.reference(key))
    }

    async fn get_bytes(&self, key: &str) -> StorageResult<Vec<u8>> {
        self.download_bytes(key).await
    }

    /// Head the bucket.
    async fn check_connectivity(&self) -> StorageResult<()> {
        self.client
            .head_bucket()
            .bucket(&self.bucket)
            .send()
            .await
            .map_err(|e| StorageError::AwsSdk(format!("R2 connectivity check failed: {}", e)))?;
        Ok(())
    }
}
