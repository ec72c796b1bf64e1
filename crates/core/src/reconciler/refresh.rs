//! Reconcile download attempts with their remote job state.

use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::attempt::{AttemptError, AttemptStatus, AttemptStore, DownloadAttempt};
use crate::catalog::{CatalogError, MediaCatalog, MediaRef, MediaStatus};
use crate::config::ConfigResolver;
use crate::download_client::{
    DownloadClientError, DownloadClientFactory, DownloadClients, JobStatus, RemoteJobState,
};
use crate::metrics;

/// Errors from reconciliation. Remote failures are never errors; they are
/// recorded on the attempt instead.
#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error("Download attempt not found: {0}")]
    NotFound(String),

    #[error(transparent)]
    Store(#[from] AttemptError),

    #[error(transparent)]
    Catalog(#[from] CatalogError),
}

/// An attempt together with its live download progress.
#[derive(Debug, Clone, Serialize)]
pub struct AttemptProgress {
    pub attempt: DownloadAttempt,
    /// Percentage (0-100). 0.0 when the client could not be asked.
    pub progress: f64,
}

/// Polls download clients and folds job state into attempt and media status.
pub struct StatusReconciler {
    attempts: Arc<dyn AttemptStore>,
    catalog: Arc<dyn MediaCatalog>,
    clients: DownloadClients,
}

impl StatusReconciler {
    pub fn new(
        attempts: Arc<dyn AttemptStore>,
        catalog: Arc<dyn MediaCatalog>,
        resolver: Arc<dyn ConfigResolver>,
        factory: Arc<dyn DownloadClientFactory>,
    ) -> Self {
        Self {
            attempts,
            catalog,
            clients: DownloadClients::new(resolver, factory),
        }
    }

    /// Bring an attempt in line with its remote job.
    ///
    /// No-op for attempts without a client reference or job id, and for
    /// blacklisted attempts. Repeating a refresh against an unchanged remote
    /// state changes nothing.
    pub async fn refresh(&self, attempt_id: &str) -> Result<DownloadAttempt, ReconcileError> {
        let (attempt, _) = self.reconcile(attempt_id).await?;
        Ok(attempt)
    }

    /// Refresh an attempt and report the remote progress seen while doing so.
    pub async fn status_with_progress(
        &self,
        attempt_id: &str,
    ) -> Result<AttemptProgress, ReconcileError> {
        let (attempt, job) = self.reconcile(attempt_id).await?;
        let progress = match job {
            Some(job) => job.progress,
            None if attempt.status == AttemptStatus::Downloaded => 100.0,
            None => 0.0,
        };
        Ok(AttemptProgress { attempt, progress })
    }

    async fn reconcile(
        &self,
        attempt_id: &str,
    ) -> Result<(DownloadAttempt, Option<JobStatus>), ReconcileError> {
        let mut attempt = self
            .attempts
            .get(attempt_id)?
            .ok_or_else(|| ReconcileError::NotFound(attempt_id.to_string()))?;

        let (Some(client_name), Some(job_id)) = (
            attempt.download_client.clone(),
            attempt.download_client_job_id.clone(),
        ) else {
            debug!(attempt_id = %attempt.id, "No download client job to poll yet");
            metrics::RECONCILIATIONS.with_label_values(&["skipped"]).inc();
            return Ok((attempt, None));
        };

        if attempt.status == AttemptStatus::Blacklisted {
            metrics::RECONCILIATIONS.with_label_values(&["skipped"]).inc();
            return Ok((attempt, None));
        }

        let job = match self.poll(&client_name, &job_id).await {
            Ok(job) => job,
            Err(e) => {
                warn!(attempt_id = %attempt.id, job_id = %job_id, error = %e, "Status check failed");
                attempt.set_error("status_check_error", e.to_string());
                let attempt = self.attempts.save(&attempt)?;
                metrics::RECONCILIATIONS.with_label_values(&["error"]).inc();
                return Ok((attempt, None));
            }
        };

        let attempt = self.apply(attempt, job.as_ref())?;
        Ok((attempt, job))
    }

    async fn poll(
        &self,
        client_name: &str,
        job_id: &str,
    ) -> Result<Option<JobStatus>, DownloadClientError> {
        let client = self.clients.named(client_name)?.ok_or_else(|| {
            DownloadClientError::Unsupported(format!(
                "download client '{}' is no longer configured",
                client_name
            ))
        })?;
        client.job_status(job_id).await
    }

    fn apply(
        &self,
        mut attempt: DownloadAttempt,
        job: Option<&JobStatus>,
    ) -> Result<DownloadAttempt, ReconcileError> {
        let Some(job) = job else {
            if !attempt.status.is_active() {
                metrics::RECONCILIATIONS.with_label_values(&["unchanged"]).inc();
                return Ok(attempt);
            }
            info!(attempt_id = %attempt.id, "Remote job vanished from queue and history");
            attempt.fail(
                "not_found",
                "Download not found in download client queue or history",
            );
            metrics::RECONCILIATIONS.with_label_values(&["not_found"]).inc();
            return Ok(self.attempts.save(&attempt)?);
        };

        match job.state() {
            RemoteJobState::Completed if attempt.status != AttemptStatus::Downloaded => {
                attempt.status = AttemptStatus::Downloaded;
                attempt.clear_error();
                if let Some(path) = &job.path {
                    attempt.raw_file_path = Some(path.clone());
                }
                let attempt = self.attempts.save(&attempt)?;
                self.set_media_status(&attempt.media, MediaStatus::Downloaded)?;
                info!(attempt_id = %attempt.id, path = ?attempt.raw_file_path, "Download completed");
                metrics::RECONCILIATIONS.with_label_values(&["downloaded"]).inc();
                Ok(attempt)
            }
            RemoteJobState::InProgress
                if matches!(
                    attempt.status,
                    AttemptStatus::Pending | AttemptStatus::Sent | AttemptStatus::Failed
                ) =>
            {
                if attempt.status == AttemptStatus::Failed
                    && self.attempts.exists_with_status(
                        &attempt.media,
                        &[AttemptStatus::Sent, AttemptStatus::Downloading],
                        Some(&attempt.id),
                    )?
                {
                    debug!(attempt_id = %attempt.id, "Another attempt holds the active slot; failed attempt left as is");
                    metrics::RECONCILIATIONS.with_label_values(&["unchanged"]).inc();
                    return Ok(attempt);
                }
                if attempt.status == AttemptStatus::Failed {
                    info!(attempt_id = %attempt.id, status = %job.status, "Failed attempt is downloading again");
                }
                attempt.status = AttemptStatus::Downloading;
                attempt.clear_error();
                let attempt = self.attempts.save(&attempt)?;
                self.set_media_status(&attempt.media, MediaStatus::Downloading)?;
                metrics::RECONCILIATIONS.with_label_values(&["downloading"]).inc();
                Ok(attempt)
            }
            RemoteJobState::Failed if attempt.status != AttemptStatus::Failed => {
                attempt.fail(
                    "download_failed",
                    format!("Download client status: {}", job.status),
                );
                info!(attempt_id = %attempt.id, status = %job.status, "Download failed remotely");
                metrics::RECONCILIATIONS.with_label_values(&["failed"]).inc();
                Ok(self.attempts.save(&attempt)?)
            }
            RemoteJobState::InProgress
                if attempt.status.is_active() && attempt.error_type.is_some() =>
            {
                // Polling works again; drop a stale status check error.
                attempt.clear_error();
                metrics::RECONCILIATIONS.with_label_values(&["unchanged"]).inc();
                Ok(self.attempts.save(&attempt)?)
            }
            state => {
                debug!(attempt_id = %attempt.id, ?state, status = %job.status, "Attempt already up to date");
                metrics::RECONCILIATIONS.with_label_values(&["unchanged"]).inc();
                Ok(attempt)
            }
        }
    }

    /// Move the media to `status` unless it is already there. A missing media
    /// item is logged and skipped.
    fn set_media_status(&self, media: &MediaRef, status: MediaStatus) -> Result<(), ReconcileError> {
        match self.catalog.get(media) {
            Ok(item) if item.status == status => Ok(()),
            Ok(_) => Ok(self.catalog.update_status(media, status)?),
            Err(CatalogError::NotFound(_)) => {
                warn!(media = %media, "Media item missing during reconciliation");
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attempt::{NewAttempt, SqliteAttemptStore};
    use crate::catalog::{MediaItem, MediaKind, SqliteMediaCatalog};
    use crate::config::StaticConfigResolver;
    use crate::testing::{fixtures, MockDownloadClient, MockDownloadClientFactory};

    struct Setup {
        reconciler: StatusReconciler,
        attempts: Arc<SqliteAttemptStore>,
        catalog: Arc<SqliteMediaCatalog>,
        client: Arc<MockDownloadClient>,
        media: MediaItem,
    }

    fn setup() -> Setup {
        let attempts = Arc::new(SqliteAttemptStore::in_memory().unwrap());
        let catalog = Arc::new(SqliteMediaCatalog::in_memory().unwrap());
        let client = Arc::new(MockDownloadClient::new());
        let reconciler = StatusReconciler::new(
            attempts.clone(),
            catalog.clone(),
            Arc::new(StaticConfigResolver::new(fixtures::config())),
            Arc::new(MockDownloadClientFactory::new(client.clone())),
        );
        let media = catalog
            .create(MediaKind::Book, &fixtures::media_request("Dune", &["Frank Herbert"]))
            .unwrap();
        Setup {
            reconciler,
            attempts,
            catalog,
            client,
            media,
        }
    }

    /// A DOWNLOADING attempt tracked on "sab" as `job_id`.
    fn downloading(s: &Setup, job_id: Option<&str>) -> DownloadAttempt {
        let mut attempt = s
            .attempts
            .create(NewAttempt {
                media: s.media.media_ref(),
                indexer: "NZBgeek".into(),
                indexer_id: "4".into(),
                release_title: "Dune".into(),
                download_url: "https://indexer.example/get/g1".into(),
                file_size: None,
                seeders: None,
                leechers: None,
                download_client: Some("sab".into()),
            })
            .unwrap();
        attempt.status = AttemptStatus::Downloading;
        attempt.download_client_job_id = job_id.map(str::to_string);
        s.catalog
            .update_status(&s.media.media_ref(), MediaStatus::Downloading)
            .unwrap();
        s.attempts.save(&attempt).unwrap()
    }

    #[tokio::test]
    async fn test_completed_marks_downloaded_once() {
        let s = setup();
        let attempt = downloading(&s, Some("nzo_1"));
        s.client
            .set_job_status("nzo_1", "Completed", Some("/downloads/books/Dune"))
            .await;

        let first = s.reconciler.refresh(&attempt.id).await.unwrap();
        assert_eq!(first.status, AttemptStatus::Downloaded);
        assert_eq!(first.raw_file_path.as_deref(), Some("/downloads/books/Dune"));
        assert_eq!(
            s.catalog.get(&s.media.media_ref()).unwrap().status,
            MediaStatus::Downloaded
        );

        let second = s.reconciler.refresh(&attempt.id).await.unwrap();
        assert_eq!(second.status, AttemptStatus::Downloaded);
        assert_eq!(second.updated_at, first.updated_at);
    }

    #[tokio::test]
    async fn test_missing_job_fails_active_attempt() {
        let s = setup();
        let attempt = downloading(&s, Some("nzo_gone"));

        let refreshed = s.reconciler.refresh(&attempt.id).await.unwrap();

        assert_eq!(refreshed.status, AttemptStatus::Failed);
        assert_eq!(refreshed.error_type.as_deref(), Some("not_found"));
    }

    #[tokio::test]
    async fn test_remote_failure_marks_download_failed() {
        let s = setup();
        let attempt = downloading(&s, Some("nzo_1"));
        s.client.set_job_status("nzo_1", "Failed", None).await;

        let refreshed = s.reconciler.refresh(&attempt.id).await.unwrap();

        assert_eq!(refreshed.status, AttemptStatus::Failed);
        assert_eq!(refreshed.error_type.as_deref(), Some("download_failed"));
        assert_eq!(
            refreshed.error_reason.as_deref(),
            Some("Download client status: Failed")
        );
    }

    #[tokio::test]
    async fn test_job_reappearing_revives_failed_attempt() {
        let s = setup();
        let attempt = downloading(&s, Some("nzo_1"));

        let vanished = s.reconciler.refresh(&attempt.id).await.unwrap();
        assert_eq!(vanished.status, AttemptStatus::Failed);
        assert_eq!(vanished.error_type.as_deref(), Some("not_found"));

        s.client.set_job_status("nzo_1", "Downloading", None).await;
        let revived = s.reconciler.refresh(&attempt.id).await.unwrap();

        assert_eq!(revived.status, AttemptStatus::Downloading);
        assert_eq!(revived.error_type, None);
        assert_eq!(
            s.catalog.get(&s.media.media_ref()).unwrap().status,
            MediaStatus::Downloading
        );
    }

    #[tokio::test]
    async fn test_failed_attempt_keeps_error_while_slot_is_taken() {
        let s = setup();
        let mut stale = downloading(&s, Some("nzo_old"));
        stale.fail("download_failed", "Download client status: Failed");
        let stale = s.attempts.save(&stale).unwrap();
        let current = downloading(&s, Some("nzo_new"));
        s.client.set_job_status("nzo_old", "Queued", None).await;

        let refreshed = s.reconciler.refresh(&stale.id).await.unwrap();

        assert_eq!(refreshed.status, AttemptStatus::Failed);
        assert_eq!(refreshed.error_type.as_deref(), Some("download_failed"));
        assert_eq!(
            s.attempts.get(&current.id).unwrap().unwrap().status,
            AttemptStatus::Downloading
        );
    }

    #[tokio::test]
    async fn test_poll_error_is_recorded_not_raised() {
        let s = setup();
        let attempt = downloading(&s, Some("nzo_1"));
        s.client
            .set_status_error(Some(DownloadClientError::Timeout))
            .await;

        let refreshed = s.reconciler.refresh(&attempt.id).await.unwrap();

        assert_eq!(refreshed.status, AttemptStatus::Downloading);
        assert_eq!(refreshed.error_type.as_deref(), Some("status_check_error"));

        s.client.set_status_error(None).await;
        s.client.set_job_status("nzo_1", "Downloading", None).await;
        let recovered = s.reconciler.refresh(&attempt.id).await.unwrap();
        assert_eq!(recovered.error_type, None);
    }

    #[tokio::test]
    async fn test_no_job_id_is_a_noop() {
        let s = setup();
        let attempt = downloading(&s, None);

        let refreshed = s.reconciler.refresh(&attempt.id).await.unwrap();

        assert_eq!(refreshed.status, AttemptStatus::Downloading);
        assert_eq!(s.client.status_call_count().await, 0);
    }

    #[tokio::test]
    async fn test_progress_reported() {
        let s = setup();
        let attempt = downloading(&s, Some("nzo_1"));
        s.client.set_job_status("nzo_1", "Downloading", None).await;

        let status = s.reconciler.status_with_progress(&attempt.id).await.unwrap();
        assert_eq!(status.attempt.status, AttemptStatus::Downloading);
        assert_eq!(status.progress, 50.0);

        s.client
            .set_status_error(Some(DownloadClientError::ConnectionFailed("down".into())))
            .await;
        let status = s.reconciler.status_with_progress(&attempt.id).await.unwrap();
        assert_eq!(status.progress, 0.0);
    }

    #[tokio::test]
    async fn test_unknown_attempt() {
        let s = setup();
        let err = s.reconciler.refresh("missing").await.unwrap_err();
        assert!(matches!(err, ReconcileError::NotFound(_)));
    }
}
