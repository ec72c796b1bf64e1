//! Types for download orchestration.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::attempt::{AttemptError, BlacklistEntry, DownloadAttempt};
use crate::catalog::CatalogError;
use crate::download_client::DownloadClientError;
use crate::indexer::IndexerError;

/// Errors from download orchestration.
#[derive(Debug, Error)]
pub enum DownloadError {
    /// The media already has a SENT or DOWNLOADING attempt.
    #[error("Media {0} already has an active download; delete it first")]
    ActiveDownloadExists(String),

    #[error("{0}")]
    ConfigurationMissing(String),

    #[error("{0}")]
    Validation(String),

    #[error("{client} does not support {protocol} downloads")]
    UnsupportedProtocol { client: String, protocol: String },

    #[error("{0}")]
    UrlResolution(String),

    #[error("Indexer error: {0}")]
    Indexer(#[from] IndexerError),

    #[error("Download client error: {0}")]
    DownloadClient(#[from] DownloadClientError),

    #[error("Download attempt not found: {0}")]
    NotFound(String),

    /// Submission failed after the attempt row was created; the attempt is FAILED.
    #[error("Failed to initiate download: {source}")]
    InitiationFailed {
        attempt_id: String,
        #[source]
        source: Box<DownloadError>,
    },

    #[error(transparent)]
    Store(#[from] AttemptError),

    #[error(transparent)]
    Catalog(#[from] CatalogError),
}

impl DownloadError {
    /// Short machine-readable kind recorded in `DownloadAttempt::error_type`.
    pub fn error_type(&self) -> &'static str {
        match self {
            DownloadError::ActiveDownloadExists(_) => "active_download_exists",
            DownloadError::ConfigurationMissing(_) => "configuration_missing",
            DownloadError::Validation(_) => "validation_error",
            DownloadError::UnsupportedProtocol { .. } => "unsupported_protocol",
            DownloadError::UrlResolution(_) | DownloadError::Indexer(_) => "indexer_error",
            DownloadError::DownloadClient(_) => "download_client_error",
            DownloadError::NotFound(_) => "not_found",
            DownloadError::InitiationFailed { source, .. } => source.error_type(),
            DownloadError::Store(_) | DownloadError::Catalog(_) => "storage_error",
        }
    }
}

/// Result of deleting an attempt. Partial cleanup failures show up as warnings
/// in `messages`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteOutcome {
    pub success: bool,
    pub messages: Vec<String>,
}

/// Result of blacklisting the release behind an attempt.
#[derive(Debug, Clone, Serialize)]
pub struct BlacklistOutcome {
    pub attempt: DownloadAttempt,
    pub entry: BlacklistEntry,
    /// False when the release was already blacklisted for this media.
    pub created: bool,
}
