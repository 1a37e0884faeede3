use async_trait::async_trait;
use s3::creds::Credentials;
use s3::error::S3Error;
use s3::{Bucket, Region};

/// Outcome of reading one artifact.
///
/// A missing artifact is the normal "not done yet" answer while a job runs, so
/// it is a variant of its own rather than an error.
#[derive(Debug)]
pub enum ArtifactProbe {
    Found(Vec<u8>),
    NotFound,
    Fault(StorageError),
}

/// Durable blob storage addressed by hierarchical path.
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    async fn put(&self, path: &str, data: &[u8], content_type: &str) -> Result<(), StorageError>;

    async fn get(&self, path: &str) -> ArtifactProbe;
}

/// Client for Cloudflare R2 object storage (S3-compatible).
pub struct R2Client {
    bucket: Box<Bucket>,
}

impl R2Client {
    pub fn new(
        bucket_name: &str,
        endpoint: &str,
        access_key: &str,
        secret_key: &str,
    ) -> Result<Self, StorageError> {
        let region = Region::Custom {
            region: "auto".to_string(),
            endpoint: endpoint.to_string(),
        };

        let credentials =
            Credentials::new(Some(access_key), Some(secret_key), None, None, None)
                .map_err(|e| StorageError::Config(e.to_string()))?;

        let bucket = Bucket::new(bucket_name, region, credentials)
            .map_err(|e| StorageError::Config(e.to_string()))?
            .with_path_style();

        Ok(Self { bucket })
    }
}

#[async_trait]
impl ArtifactStore for R2Client {
    async fn put(&self, path: &str, data: &[u8], content_type: &str) -> Result<(), StorageError> {
        let response = self
            .bucket
            .put_object_with_content_type(path, data, content_type)
            .await
            .map_err(StorageError::S3)?;

        let status = response.status_code();
        if !(200..300).contains(&status) {
            return Err(StorageError::Status(status));
        }

        tracing::debug!(path = %path, size = data.len(), "Artifact written");
        Ok(())
    }

    async fn get(&self, path: &str) -> ArtifactProbe {
        match self.bucket.get_object(path).await {
            Ok(response) => match response.status_code() {
                200..=299 => ArtifactProbe::Found(response.to_vec()),
                404 => ArtifactProbe::NotFound,
                status => ArtifactProbe::Fault(StorageError::Status(status)),
            },
            Err(S3Error::HttpFailWithBody(404, _)) => ArtifactProbe::NotFound,
            Err(e) => ArtifactProbe::Fault(StorageError::S3(e)),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("S3 operation failed: {0}")]
    S3(#[from] S3Error),

    #[error("Object store returned status {0}")]
    Status(u16),

    #[error("Storage configuration error: {0}")]
    Config(String),

    #[error("Storage backend unavailable: {0}")]
    Unavailable(String),
}
