use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;

/// Source image retrieval.
#[async_trait]
pub trait ImageSource: Send + Sync {
    async fn fetch(&self, image_ref: &str) -> Result<Vec<u8>, FetchError>;
}

/// Downloads source images over HTTP(S).
pub struct HttpImageSource {
    http: Client,
}

impl HttpImageSource {
    pub fn new() -> Result<Self, FetchError> {
        let http = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(FetchError::Http)?;
        Ok(Self { http })
    }
}

#[async_trait]
impl ImageSource for HttpImageSource {
    async fn fetch(&self, image_ref: &str) -> Result<Vec<u8>, FetchError> {
        let response = self.http.get(image_ref).send().await.map_err(FetchError::Http)?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }

        let bytes = response.bytes().await.map_err(FetchError::Http)?;
        tracing::debug!(image_ref = %image_ref, size = bytes.len(), "Source image fetched");
        Ok(bytes.to_vec())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Image source returned status {0}")]
    Status(u16),
}
