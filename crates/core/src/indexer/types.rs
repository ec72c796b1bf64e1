//! Types for indexer aggregator operations.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur when talking to an indexer aggregator.
#[derive(Debug, Clone, Error)]
pub enum IndexerError {
    #[error("Authentication failed - check API key")]
    Auth,

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Server error (HTTP {status}): {message}")]
    Server { status: u16, message: String },

    #[error("Request timeout after {0} seconds")]
    Timeout(u64),

    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Unexpected response shape or status.
    #[error("Protocol error: {0}")]
    Protocol(String),
}

impl IndexerError {
    /// Whether retrying the same request later could succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            IndexerError::Timeout(_)
                | IndexerError::ConnectionFailed(_)
                | IndexerError::Server { .. }
        )
    }
}

/// Transfer protocol of a release.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    Usenet,
    Torrent,
    #[default]
    #[serde(other)]
    Unknown,
}

impl Protocol {
    pub fn as_str(&self) -> &'static str {
        match self {
            Protocol::Usenet => "usenet",
            Protocol::Torrent => "torrent",
            Protocol::Unknown => "unknown",
        }
    }
}

/// A single release returned by an indexer search. Not persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    pub guid: String,
    pub title: String,
    /// Indexer name.
    pub indexer: String,
    /// Indexer's numeric id within the aggregator.
    pub indexer_id: i64,
    pub size: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub publish_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seeders: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub peers: Option<u32>,
    #[serde(default)]
    pub protocol: Protocol,
    #[serde(default)]
    pub download_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub info_url: Option<String>,
}

/// Reference returned when the indexer pushes a release to its own download client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmittedJob {
    pub job_id: String,
}

/// Client for an indexer aggregator (Prowlarr-style API).
#[async_trait]
pub trait IndexerClient: Send + Sync {
    /// Client name for logging.
    fn name(&self) -> &str;

    /// Search releases. `category` is a Newznab category id.
    async fn search(
        &self,
        query: &str,
        category: Option<u32>,
        limit: u32,
    ) -> Result<Vec<SearchResult>, IndexerError>;

    /// Resolve a proxy release link to the indexer's real download URL.
    async fn resolve_download_url(&self, indexer_id: i64, guid: &str)
        -> Result<String, IndexerError>;

    /// Ask the aggregator to send the release to its configured download client.
    async fn submit_to_remote_client(
        &self,
        indexer_id: i64,
        guid: &str,
    ) -> Result<SubmittedJob, IndexerError>;

    /// Check that the API is reachable and the key is accepted.
    async fn test_connection(&self) -> bool;
}
