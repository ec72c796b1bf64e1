//! Submission strategies: straight to a download client, or through the indexer.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, warn};

use crate::attempt::AttemptStatus;
use crate::catalog::MediaItem;
use crate::config::{DownloadClientConfig, SubmissionMode};
use crate::download_client::DownloadClient;
use crate::indexer::{IndexerClient, Protocol, SearchResult};

use super::resolve::resolve_download_url;
use super::types::DownloadError;

/// What a successful submission produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Submission {
    /// Status the attempt moves to.
    pub status: AttemptStatus,
    pub job_id: Option<String>,
}

/// Hands a release to whatever will download it.
#[async_trait]
pub trait Submitter: Send + Sync {
    fn mode(&self) -> SubmissionMode;

    /// Name of the download client the job lands on, when it can be polled.
    fn client_name(&self) -> Option<String>;

    fn supports(&self, protocol: Protocol) -> bool;

    /// Name used for protocol errors.
    fn display_name(&self) -> String;

    async fn submit(
        &self,
        media: &MediaItem,
        result: &SearchResult,
    ) -> Result<Submission, DownloadError>;

    /// Best-effort removal of a job this submitter created.
    async fn cancel(&self, job_id: &str) -> bool;
}

/// Resolve the fetchable URL and queue it on a configured download client.
pub struct DirectSubmitter {
    indexer: Arc<dyn IndexerClient>,
    client: Arc<dyn DownloadClient>,
    config: DownloadClientConfig,
    indexer_host: Option<String>,
}

impl DirectSubmitter {
    pub fn new(
        indexer: Arc<dyn IndexerClient>,
        client: Arc<dyn DownloadClient>,
        config: DownloadClientConfig,
        indexer_host: Option<String>,
    ) -> Self {
        Self {
            indexer,
            client,
            config,
            indexer_host,
        }
    }
}

#[async_trait]
impl Submitter for DirectSubmitter {
    fn mode(&self) -> SubmissionMode {
        SubmissionMode::Direct
    }

    fn client_name(&self) -> Option<String> {
        Some(self.config.name.clone())
    }

    fn supports(&self, protocol: Protocol) -> bool {
        self.client.supports(protocol)
    }

    fn display_name(&self) -> String {
        format!("Download client '{}'", self.config.name)
    }

    async fn submit(
        &self,
        media: &MediaItem,
        result: &SearchResult,
    ) -> Result<Submission, DownloadError> {
        let url =
            resolve_download_url(result, self.indexer.as_ref(), self.indexer_host.as_deref())
                .await?;

        let job_id = self
            .client
            .submit(&url, &self.config.category, &media.title)
            .await?;

        info!(
            client = %self.config.name,
            job_id = ?job_id,
            release = %result.title,
            "Queued release on download client"
        );

        Ok(Submission {
            status: AttemptStatus::Downloading,
            job_id,
        })
    }

    async fn cancel(&self, job_id: &str) -> bool {
        match self.client.delete_job(job_id).await {
            Ok(removed) => removed,
            Err(e) => {
                warn!(job_id = %job_id, error = %e, "Failed to cancel download job");
                false
            }
        }
    }
}

/// Ask the indexer aggregator to push the release to its own download client.
///
/// The resulting job lives on a client this process does not talk to, so the
/// attempt carries no download client reference and is never polled.
pub struct IndexerSubmitter {
    indexer: Arc<dyn IndexerClient>,
}

impl IndexerSubmitter {
    pub fn new(indexer: Arc<dyn IndexerClient>) -> Self {
        Self { indexer }
    }
}

#[async_trait]
impl Submitter for IndexerSubmitter {
    fn mode(&self) -> SubmissionMode {
        SubmissionMode::Indexer
    }

    fn client_name(&self) -> Option<String> {
        None
    }

    fn supports(&self, protocol: Protocol) -> bool {
        matches!(protocol, Protocol::Usenet | Protocol::Torrent)
    }

    fn display_name(&self) -> String {
        format!("Indexer '{}'", self.indexer.name())
    }

    async fn submit(
        &self,
        _media: &MediaItem,
        result: &SearchResult,
    ) -> Result<Submission, DownloadError> {
        let job = self
            .indexer
            .submit_to_remote_client(result.indexer_id, &result.guid)
            .await?;

        info!(
            indexer = %self.indexer.name(),
            job_id = %job.job_id,
            release = %result.title,
            "Indexer accepted release for download"
        );

        Ok(Submission {
            status: AttemptStatus::Sent,
            job_id: Some(job.job_id),
        })
    }

    async fn cancel(&self, _job_id: &str) -> bool {
        false
    }
}
