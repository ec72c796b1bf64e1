//! Types for download client operations.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;

use crate::config::DownloadClientConfig;
use crate::indexer::Protocol;

/// Errors that can occur during download client operations.
#[derive(Debug, Clone, Error)]
pub enum DownloadClientError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Authentication failed - check API key")]
    AuthenticationFailed,

    /// The client answered but reported an error.
    #[error("API error: {0}")]
    ApiError(String),

    #[error("Request timeout")]
    Timeout,

    #[error("Unsupported download client: {0}")]
    Unsupported(String),
}

/// Local interpretation of a client-specific job status string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RemoteJobState {
    Completed,
    InProgress,
    Failed,
    Unknown,
}

impl RemoteJobState {
    /// Map a raw status string (case-insensitive) to a local state.
    ///
    /// History post-processing states (verifying, repairing, extracting...)
    /// count as in progress.
    pub fn from_status(status: &str) -> Self {
        match status.to_ascii_lowercase().as_str() {
            "completed" => RemoteJobState::Completed,
            "downloading" | "queued" | "paused" | "fetching" | "grabbing" | "verifying"
            | "repairing" | "extracting" | "moving" | "running" | "checking" | "quickcheck"
            | "propagating" => RemoteJobState::InProgress,
            "failed" | "deleted" => RemoteJobState::Failed,
            _ => RemoteJobState::Unknown,
        }
    }
}

/// Status of a job on the download client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobStatus {
    pub job_id: String,
    pub name: String,
    /// Raw status string as reported by the client.
    pub status: String,
    /// Progress percentage (0-100).
    pub progress: f64,
    pub mb_left: f64,
    pub mb_total: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_left: Option<String>,
    /// Final storage path, known once the job is in history.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

impl JobStatus {
    pub fn state(&self) -> RemoteJobState {
        RemoteJobState::from_status(&self.status)
    }
}

/// Download client (e.g. SABnzbd).
#[async_trait]
pub trait DownloadClient: Send + Sync {
    /// Client name for logging.
    fn name(&self) -> &str;

    /// Whether this client can fetch releases of the given protocol.
    fn supports(&self, protocol: Protocol) -> bool;

    /// Queue a download by URL. Returns the client job id when the client reports one.
    async fn submit(
        &self,
        url: &str,
        category: &str,
        name: &str,
    ) -> Result<Option<String>, DownloadClientError>;

    /// Look a job up in the queue, then in history. `None` when it is in neither.
    async fn job_status(&self, job_id: &str) -> Result<Option<JobStatus>, DownloadClientError>;

    /// Remove a job. Returns whether the client confirmed the removal.
    async fn delete_job(&self, job_id: &str) -> Result<bool, DownloadClientError>;

    /// Check that the client answers its API.
    async fn test_connection(&self) -> bool;
}

/// Builds a client for a stored download client configuration.
pub trait DownloadClientFactory: Send + Sync {
    fn create(
        &self,
        config: &DownloadClientConfig,
    ) -> Result<Arc<dyn DownloadClient>, DownloadClientError>;
}
