use crate::signed_url::redact;
use async_trait::async_trait;
use std::path::Path;
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("request to {url} failed: {message}")]
    Request { url: String, message: String },
    #[error("{url} answered with HTTP {status}")]
    Status { url: String, status: u16 },
    #[error("failed to write {path}: {source}")]
    Write {
        path: String,
        source: std::io::Error,
    },
}

/// Transfers one document to disk. Does not check for a prior copy; callers
/// skip completed targets before calling.
#[async_trait]
pub trait DocumentFetcher: Send + Sync {
    /// Returns the number of bytes written.
    async fn fetch(&self, url: &str, destination: &Path) -> Result<u64, FetchError>;
}

pub struct HttpFetcher {
    client: reqwest::Client,
    timeout: Duration,
}

impl HttpFetcher {
    pub fn new(timeout: Duration) -> Self {
        Self {
            client: reqwest::Client::new(),
            timeout,
        }
    }
}

#[async_trait]
impl DocumentFetcher for HttpFetcher {
    async fn fetch(&self, url: &str, destination: &Path) -> Result<u64, FetchError> {
        let shown = redact(url);
        tracing::debug!(url = %shown, "fetching document");

        let response = self
            .client
            .get(url)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| FetchError::Request {
                url: shown.clone(),
                message: e.without_url().to_string(),
            })?;

        if !response.status().is_success() {
            return Err(FetchError::Status {
                url: shown,
                status: response.status().as_u16(),
            });
        }

        // reqwest error text embeds the full URL, signature included.
        let body = response.bytes().await.map_err(|e| FetchError::Request {
            url: shown.clone(),
            message: e.without_url().to_string(),
        })?;

        tokio::fs::write(destination, &body)
            .await
            .map_err(|source| FetchError::Write {
                path: destination.display().to_string(),
                source,
            })?;

        Ok(body.len() as u64)
    }
}
