//! Download orchestrator.
//!
//! Owns the attempt lifecycle from initiation to deletion:
//! - at most one SENT/DOWNLOADING attempt per media item
//! - attempts are created PENDING before anything remote happens
//! - submission failures leave a FAILED attempt behind and the media untouched

use std::path::Path;
use std::sync::Arc;

use tracing::{debug, error, info, warn};

use crate::attempt::{
    AttemptError, AttemptStatus, AttemptStore, BlacklistReason, DownloadAttempt, NewAttempt,
    NewBlacklistEntry,
};
use crate::catalog::{CatalogError, MediaCatalog, MediaItem, MediaRef, MediaStatus};
use crate::config::{ConfigResolver, SubmissionMode};
use crate::download_client::{DownloadClientFactory, DownloadClients};
use crate::indexer::{IndexerClient, SearchResult};
use crate::metrics;

use super::resolve::is_http;
use super::submitter::{DirectSubmitter, IndexerSubmitter, Submitter};
use super::types::{BlacklistOutcome, DeleteOutcome, DownloadError};

const ACTIVE: &[AttemptStatus] = &[AttemptStatus::Sent, AttemptStatus::Downloading];

/// Statuses that keep a media item out of WANTED.
const HOLDING: &[AttemptStatus] = &[
    AttemptStatus::Sent,
    AttemptStatus::Downloading,
    AttemptStatus::Downloaded,
];

/// Starts, blacklists and deletes download attempts.
pub struct DownloadOrchestrator {
    attempts: Arc<dyn AttemptStore>,
    catalog: Arc<dyn MediaCatalog>,
    indexer: Arc<dyn IndexerClient>,
    resolver: Arc<dyn ConfigResolver>,
    clients: DownloadClients,
}

impl DownloadOrchestrator {
    pub fn new(
        attempts: Arc<dyn AttemptStore>,
        catalog: Arc<dyn MediaCatalog>,
        indexer: Arc<dyn IndexerClient>,
        resolver: Arc<dyn ConfigResolver>,
        factory: Arc<dyn DownloadClientFactory>,
    ) -> Self {
        let clients = DownloadClients::new(resolver.clone(), factory);
        Self {
            attempts,
            catalog,
            indexer,
            resolver,
            clients,
        }
    }

    /// Start downloading a release for a media item.
    pub async fn initiate(
        &self,
        media: &MediaItem,
        result: &SearchResult,
    ) -> Result<DownloadAttempt, DownloadError> {
        let media_ref = media.media_ref();
        let mode = self.resolver.submission_mode();

        if self.attempts.exists_with_status(&media_ref, ACTIVE, None)? {
            metrics::DOWNLOADS_INITIATED
                .with_label_values(&["rejected", mode.as_str()])
                .inc();
            return Err(DownloadError::ActiveDownloadExists(media_ref.to_string()));
        }

        let submitter = match self.submitter(mode) {
            Ok(s) => s,
            Err(e) => {
                metrics::DOWNLOADS_INITIATED
                    .with_label_values(&["rejected", mode.as_str()])
                    .inc();
                return Err(e);
            }
        };

        let mut attempt = self.attempts.create(NewAttempt {
            media: media_ref.clone(),
            indexer: result.indexer.clone(),
            indexer_id: result.indexer_id.to_string(),
            release_title: result.title.clone(),
            download_url: result.download_url.clone(),
            file_size: Some(result.size),
            seeders: result.seeders,
            leechers: result.peers,
            download_client: submitter.client_name(),
        })?;

        info!(
            attempt_id = %attempt.id,
            media = %media_ref,
            release = %result.title,
            mode = mode.as_str(),
            "Initiating download"
        );

        let submission = match self.validate(submitter.as_ref(), result) {
            Ok(()) => submitter.submit(media, result).await,
            Err(e) => Err(e),
        };

        let submission = match submission {
            Ok(s) => s,
            Err(e) => {
                warn!(attempt_id = %attempt.id, error = %e, "Download initiation failed");
                attempt.fail(e.error_type(), format!("Failed to initiate download: {}", e));
                self.attempts.save(&attempt)?;
                metrics::DOWNLOADS_INITIATED
                    .with_label_values(&["failed", mode.as_str()])
                    .inc();
                return Err(DownloadError::InitiationFailed {
                    attempt_id: attempt.id,
                    source: Box::new(e),
                });
            }
        };

        attempt.status = submission.status;
        attempt.download_client_job_id = submission.job_id.clone();
        attempt.clear_error();

        let attempt = match self.attempts.save(&attempt) {
            Ok(saved) => saved,
            Err(AttemptError::ActiveExists(m)) => {
                // Another initiation for the same media won the race.
                warn!(attempt_id = %attempt.id, media = %m, "Concurrent download claimed this media");
                if let Some(job_id) = &submission.job_id {
                    submitter.cancel(job_id).await;
                }
                attempt.fail(
                    "active_download_exists",
                    "Another download became active for this media",
                );
                self.attempts.save(&attempt)?;
                metrics::DOWNLOADS_INITIATED
                    .with_label_values(&["rejected", mode.as_str()])
                    .inc();
                return Err(DownloadError::ActiveDownloadExists(m));
            }
            Err(e) => return Err(e.into()),
        };

        self.catalog
            .update_status(&media_ref, MediaStatus::Downloading)?;

        metrics::DOWNLOADS_INITIATED
            .with_label_values(&["success", mode.as_str()])
            .inc();
        info!(
            attempt_id = %attempt.id,
            status = attempt.status.as_str(),
            job_id = ?attempt.download_client_job_id,
            "Download initiated"
        );

        Ok(attempt)
    }

    /// Delete an attempt with best-effort cleanup of its remote job and files.
    ///
    /// Only a missing attempt is an error; every cleanup problem becomes a
    /// warning in the returned messages.
    pub async fn delete(&self, attempt_id: &str) -> Result<DeleteOutcome, DownloadError> {
        let attempt = self.get(attempt_id)?;
        let mut messages = Vec::new();

        if attempt.status.is_active() {
            self.cancel_remote(&attempt, &mut messages).await;
        }

        if let Some(path) = &attempt.raw_file_path {
            remove_file(path, "Raw file", &mut messages);
        }
        if let Some(path) = &attempt.post_processed_file_path {
            remove_file(path, "Post-processed file", &mut messages);
        }

        self.attempts.delete(&attempt.id)?;
        metrics::ATTEMPTS_DELETED.inc();

        if !self
            .attempts
            .exists_with_status(&attempt.media, HOLDING, None)?
        {
            self.reset_media(&attempt, &mut messages)?;
        }

        info!(attempt_id = %attempt.id, warnings = messages.len(), "Deleted download attempt");

        Ok(DeleteOutcome {
            success: true,
            messages,
        })
    }

    /// Put the media back to WANTED once nothing holds a download for it.
    ///
    /// Applies when the deleted attempt held the download, or when the media
    /// is still marked DOWNLOADING/DOWNLOADED by an attempt that failed later.
    fn reset_media(
        &self,
        attempt: &DownloadAttempt,
        messages: &mut Vec<String>,
    ) -> Result<(), DownloadError> {
        let media = match self.catalog.get(&attempt.media) {
            Ok(media) => media,
            Err(CatalogError::NotFound(_)) => {
                debug!(media = %attempt.media, "Media gone, skipping status reset");
                return Ok(());
            }
            Err(e) => return Err(e.into()),
        };
        let stale = matches!(
            media.status,
            MediaStatus::Downloading | MediaStatus::Downloaded
        );
        if HOLDING.contains(&attempt.status) || stale {
            self.catalog
                .update_status(&attempt.media, MediaStatus::Wanted)?;
            messages.push("Media status reset to WANTED".to_string());
        }
        Ok(())
    }

    /// Blacklist the release behind an attempt and mark the attempt BLACKLISTED.
    ///
    /// Blacklisting the same release twice keeps the first entry.
    pub async fn blacklist(
        &self,
        attempt_id: &str,
        reason: BlacklistReason,
        details: &str,
    ) -> Result<BlacklistOutcome, DownloadError> {
        let mut attempt = self.get(attempt_id)?;

        let (entry, created) = self.attempts.blacklist(NewBlacklistEntry {
            media: attempt.media.clone(),
            indexer: attempt.indexer.clone(),
            indexer_id: attempt.indexer_id.clone(),
            release_title: attempt.release_title.clone(),
            download_url: attempt.download_url.clone(),
            reason,
            reason_details: details.to_string(),
        })?;

        attempt.status = AttemptStatus::Blacklisted;
        let attempt = self.attempts.save(&attempt)?;

        metrics::BLACKLISTED_TOTAL
            .with_label_values(&[reason.as_str()])
            .inc();
        info!(
            attempt_id = %attempt.id,
            release = %attempt.release_title,
            reason = reason.as_str(),
            created,
            "Blacklisted release"
        );

        Ok(BlacklistOutcome {
            attempt,
            entry,
            created,
        })
    }

    /// All attempts for a media item, newest first.
    pub fn attempts_for_media(
        &self,
        media: &MediaRef,
    ) -> Result<Vec<DownloadAttempt>, DownloadError> {
        Ok(self.attempts.list_for_media(media)?)
    }

    pub fn get(&self, attempt_id: &str) -> Result<DownloadAttempt, DownloadError> {
        self.attempts
            .get(attempt_id)?
            .ok_or_else(|| DownloadError::NotFound(attempt_id.to_string()))
    }

    fn submitter(&self, mode: SubmissionMode) -> Result<Box<dyn Submitter>, DownloadError> {
        match mode {
            SubmissionMode::Indexer => Ok(Box::new(IndexerSubmitter::new(self.indexer.clone()))),
            SubmissionMode::Direct => {
                let (config, client) = self.clients.preferred()?.ok_or_else(|| {
                    DownloadError::ConfigurationMissing(
                        "No enabled download client configuration found".to_string(),
                    )
                })?;
                let indexer_host = self.resolver.indexer().map(|c| c.host);
                Ok(Box::new(DirectSubmitter::new(
                    self.indexer.clone(),
                    client,
                    config,
                    indexer_host,
                )))
            }
        }
    }

    /// Indexer submission goes by guid, so only direct mode checks the URL.
    fn validate(&self, submitter: &dyn Submitter, result: &SearchResult) -> Result<(), DownloadError> {
        let direct = submitter.mode() == SubmissionMode::Direct;
        if direct && result.download_url.trim().is_empty() {
            return Err(DownloadError::Validation(
                "Download URL is missing from search result".to_string(),
            ));
        }
        if !submitter.supports(result.protocol) {
            return Err(DownloadError::UnsupportedProtocol {
                client: submitter.display_name(),
                protocol: result.protocol.as_str().to_string(),
            });
        }
        if direct && !is_http(&result.download_url) {
            return Err(DownloadError::Validation(format!(
                "Invalid download URL format: {}",
                result.download_url
            )));
        }
        Ok(())
    }

    async fn cancel_remote(&self, attempt: &DownloadAttempt, messages: &mut Vec<String>) {
        let (Some(name), Some(job_id)) = (&attempt.download_client, &attempt.download_client_job_id)
        else {
            return;
        };

        let client = match self.clients.named(name) {
            Ok(Some(client)) => client,
            Ok(None) => {
                messages.push(format!(
                    "Warning: Could not remove download from {}: client is no longer configured",
                    name
                ));
                return;
            }
            Err(e) => {
                messages.push(format!("Warning: Error removing download from {}: {}", name, e));
                return;
            }
        };

        match client.delete_job(job_id).await {
            Ok(true) => messages.push(format!("Download removed from {}", name)),
            Ok(false) => messages.push(format!("Warning: Could not remove download from {}", name)),
            Err(e) => {
                error!(job_id = %job_id, error = %e, "Failed to remove remote job");
                messages.push(format!("Warning: Error removing download from {}: {}", name, e));
            }
        }
    }
}

fn remove_file(path: &str, label: &str, messages: &mut Vec<String>) {
    let path = Path::new(path);
    if !path.is_file() {
        return;
    }
    match std::fs::remove_file(path) {
        Ok(()) => messages.push(format!("{} deleted", label)),
        Err(e) => messages.push(format!(
            "Warning: Could not delete {}: {}",
            label.to_lowercase(),
            e
        )),
    }
}
