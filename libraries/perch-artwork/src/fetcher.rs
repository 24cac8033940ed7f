//! The network seam for artwork downloads.

use crate::error::Result;
use async_trait::async_trait;
use std::time::Duration;

/// Downloads raw image bytes. The cache never talks to the network directly,
/// so tests can count and fake downloads.
#[async_trait]
pub trait ImageFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, String>;
}

/// Production fetcher backed by a shared HTTP client.
pub struct HttpImageFetcher {
    client: reqwest::Client,
}

impl HttpImageFetcher {
    /// Build the shared HTTP client. Fails when the client cannot be
    /// constructed (e.g. TLS backend initialization).
    pub fn new() -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl ImageFetcher for HttpImageFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, String> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|err| err.to_string())?
            .error_for_status()
            .map_err(|err| err.to_string())?;
        let bytes = response.bytes().await.map_err(|err| err.to_string())?;
        Ok(bytes.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_shared_client() {
        assert!(HttpImageFetcher::new().is_ok());
    }
}
