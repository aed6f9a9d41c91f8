use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use super::{CollaboratorError, ImageFetcher};

/// Downloads images over HTTP with a bounded timeout.
#[derive(Debug, Clone)]
pub struct HttpImageFetcher {
    client: reqwest::Client,
}

impl HttpImageFetcher {
    pub fn new(timeout: Duration) -> Result<Self, CollaboratorError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| CollaboratorError::Unavailable(format!("failed to build http client: {e}")))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl ImageFetcher for HttpImageFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, CollaboratorError> {
        let resp = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| CollaboratorError::Unavailable(e.to_string()))?;

        let status = resp.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(CollaboratorError::NotFound(url.to_string()));
        }
        if !status.is_success() {
            return Err(CollaboratorError::Rejected(format!("GET {url} returned {status}")));
        }

        let bytes = resp
            .bytes()
            .await
            .map_err(|e| CollaboratorError::Unavailable(e.to_string()))?;
        debug!(url, size = bytes.len(), "image fetched");
        Ok(bytes.to_vec())
    }
}
