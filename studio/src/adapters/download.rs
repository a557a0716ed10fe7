//! Buffered HTTP byte fetch with timeout (thumbnails, sample audio).

use std::time::Duration;

use super::AdapterError;

pub struct HttpDownloader {
    client: reqwest::Client,
}

impl Default for HttpDownloader {
    fn default() -> Self {
        Self::new()
    }
}

impl HttpDownloader {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }

    /// Fetches the full body. Non-2xx statuses are adapter errors.
    pub async fn fetch_bytes(
        &self,
        url: &str,
        timeout: Duration,
    ) -> Result<Vec<u8>, AdapterError> {
        let response = self
            .client
            .get(url)
            .timeout(timeout)
            .send()
            .await?
            .error_for_status()?;
        Ok(response.bytes().await?.to_vec())
    }
}
