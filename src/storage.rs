use async_trait::async_trait;
use aws_sdk_s3 as s3;
use s3::presigning::PresigningConfig;
use std::sync::Arc;
use std::time::Duration;

use crate::error::{AppError, Result};

/// StorageService
///
/// Contract for the object store holding call recordings. Binaries never pass through this
/// server: clients PUT to a presigned upload URL and GET from a presigned read URL.
#[async_trait]
pub trait StorageService: Send + Sync {
    /// Creates the configured bucket if missing. Only called in `Env::Local`.
    async fn ensure_bucket_exists(&self);

    /// Signed PUT URL for `key`, pinned to `content_type`, valid for `ttl`.
    async fn presigned_upload_url(
        &self,
        key: &str,
        content_type: &str,
        ttl: Duration,
    ) -> Result<String>;

    /// Signed GET URL for `key`, valid for `ttl`.
    async fn presigned_read_url(&self, key: &str, ttl: Duration) -> Result<String>;
}

/// S3StorageClient
///
/// AWS SDK client pointed at any S3-compatible endpoint (MinIO locally).
/// Path-style addressing is required for MinIO.
#[derive(Clone)]
pub struct S3StorageClient {
    client: s3::Client,
    bucket_name: String,
}

impl S3StorageClient {
    pub async fn new(
        endpoint: &str,
        region: &str,
        access_key: &str,
        secret_key: &str,
        bucket: &str,
    ) -> Self {
        let credentials =
            s3::config::Credentials::new(access_key, secret_key, None, None, "static");

        let config = s3::Config::builder()
            .credentials_provider(credentials)
            .endpoint_url(endpoint)
            .region(s3::config::Region::new(region.to_string()))
            .behavior_version_latest()
            .force_path_style(true)
            .build();

        Self {
            client: s3::Client::from_conf(config),
            bucket_name: bucket.to_string(),
        }
    }
}

fn presigning(ttl: Duration) -> Result<PresigningConfig> {
    PresigningConfig::expires_in(ttl).map_err(|e| AppError::Storage(e.to_string()))
}

#[async_trait]
impl StorageService for S3StorageClient {
    async fn ensure_bucket_exists(&self) {
        if let Err(e) = self
            .client
            .create_bucket()
            .bucket(&self.bucket_name)
            .send()
            .await
        {
            // Already-exists comes back as an error too.
            tracing::debug!("create_bucket: {:?}", e);
        }
    }

    async fn presigned_upload_url(
        &self,
        key: &str,
        content_type: &str,
        ttl: Duration,
    ) -> Result<String> {
        let req = self
            .client
            .put_object()
            .bucket(&self.bucket_name)
            .key(key)
            .content_type(content_type)
            .presigned(presigning(ttl)?)
            .await
            .map_err(|e| AppError::Storage(e.to_string()))?;

        Ok(req.uri().to_string())
    }

    async fn presigned_read_url(&self, key: &str, ttl: Duration) -> Result<String> {
        let req = self
            .client
            .get_object()
            .bucket(&self.bucket_name)
            .key(key)
            .presigned(presigning(ttl)?)
            .await
            .map_err(|e| AppError::Storage(e.to_string()))?;

        Ok(req.uri().to_string())
    }
}

/// Strips empty, `.` and `..` segments so a client-supplied name cannot escape its prefix.
pub fn sanitize_key(key: &str) -> String {
    key.split('/')
        .filter(|segment| !segment.is_empty() && *segment != ".." && *segment != ".")
        .collect::<Vec<_>>()
        .join("/")
}

/// MockStorageService
///
/// In-memory stand-in used by the test suites. Returns deterministic local URLs.
#[derive(Clone, Default)]
pub struct MockStorageService {
    /// When true, all operations return a simulated failure.
    pub should_fail: bool,
}

impl MockStorageService {
    pub fn new() -> Self {
        Self { should_fail: false }
    }

    pub fn new_failing() -> Self {
        Self { should_fail: true }
    }

    fn url(&self, key: &str, ttl: Duration) -> Result<String> {
        if self.should_fail {
            return Err(AppError::Storage(
                "Mock Storage Error: Simulation requested".to_string(),
            ));
        }
        Ok(format!(
            "http://localhost:9000/mock-bucket/{}?expires={}&signature=fake",
            sanitize_key(key),
            ttl.as_secs()
        ))
    }
}

#[async_trait]
impl StorageService for MockStorageService {
    async fn ensure_bucket_exists(&self) {}

    async fn presigned_upload_url(
        &self,
        key: &str,
        _content_type: &str,
        ttl: Duration,
    ) -> Result<String> {
        self.url(key, ttl)
    }

    async fn presigned_read_url(&self, key: &str, ttl: Duration) -> Result<String> {
        self.url(key, ttl)
    }
}

/// StorageState
///
/// Shared handle to the storage backend held in `AppState`.
pub type StorageState = Arc<dyn StorageService>;
