//! Cover image download.

use reqwest::{header::CONTENT_TYPE, Client};
use std::path::Path;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, warn};

use crate::metrics;

#[derive(Debug, Error)]
pub enum CoverError {
    #[error("Cover request timed out after {0} seconds")]
    Timeout(u64),

    #[error("Cover request failed: {0}")]
    Http(String),

    #[error("Cover server returned HTTP {0}")]
    Status(u16),

    #[error("Failed to write cover: {0}")]
    Io(#[from] std::io::Error),
}

/// Downloads cover images next to organized files.
pub struct CoverFetcher {
    client: Client,
    timeout_secs: u64,
}

impl CoverFetcher {
    pub fn new(timeout_secs: u64) -> Result<Self, CoverError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| CoverError::Http(e.to_string()))?;
        Ok(Self {
            client,
            timeout_secs,
        })
    }

    /// Fetch `url` into `destination`. Returns the number of bytes written.
    ///
    /// Redirects are followed. A non-image content type is logged but the body
    /// is still written.
    pub async fn fetch(&self, url: &str, destination: &Path) -> Result<u64, CoverError> {
        let start = Instant::now();
        let result = self.fetch_inner(url, destination).await;
        metrics::EXTERNAL_SERVICE_DURATION
            .with_label_values(&["cover", "fetch"])
            .observe(start.elapsed().as_secs_f64());
        result
    }

    async fn fetch_inner(&self, url: &str, destination: &Path) -> Result<u64, CoverError> {
        let response = self.client.get(url).send().await.map_err(|e| {
            if e.is_timeout() {
                CoverError::Timeout(self.timeout_secs)
            } else {
                CoverError::Http(e.to_string())
            }
        })?;

        if !response.status().is_success() {
            return Err(CoverError::Status(response.status().as_u16()));
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_string();
        if !content_type.starts_with("image/") {
            warn!(url = %url, content_type = %content_type, "Cover URL did not return an image content type");
        }

        let bytes = response.bytes().await.map_err(|e| {
            if e.is_timeout() {
                CoverError::Timeout(self.timeout_secs)
            } else {
                CoverError::Http(e.to_string())
            }
        })?;

        if let Some(parent) = destination.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(destination, &bytes).await?;

        debug!(url = %url, path = %destination.display(), bytes = bytes.len(), "Saved cover");
        Ok(bytes.len() as u64)
    }
}
