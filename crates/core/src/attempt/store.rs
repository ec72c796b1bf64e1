//! Attempt storage trait and error type.

use thiserror::Error;

use crate::catalog::MediaRef;

use super::{AttemptStatus, BlacklistEntry, DownloadAttempt, NewAttempt, NewBlacklistEntry};

/// Error type for attempt and blacklist operations.
#[derive(Debug, Error)]
pub enum AttemptError {
    #[error("Download attempt not found: {0}")]
    NotFound(String),

    /// The store refused a second SENT/DOWNLOADING attempt for the same media.
    #[error("Media {0} already has an active download")]
    ActiveExists(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Trait for download attempt and blacklist storage backends.
pub trait AttemptStore: Send + Sync {
    /// Create a new attempt in `pending` status.
    fn create(&self, request: NewAttempt) -> Result<DownloadAttempt, AttemptError>;

    /// Get an attempt by ID.
    fn get(&self, id: &str) -> Result<Option<DownloadAttempt>, AttemptError>;

    /// All attempts for a media item, newest first.
    fn list_for_media(&self, media: &MediaRef) -> Result<Vec<DownloadAttempt>, AttemptError>;

    /// Whether the media has any attempt in one of the given statuses,
    /// optionally ignoring one attempt.
    fn exists_with_status(
        &self,
        media: &MediaRef,
        statuses: &[AttemptStatus],
        excluding: Option<&str>,
    ) -> Result<bool, AttemptError>;

    /// Persist every mutable field of the attempt and bump `updated_at`.
    fn save(&self, attempt: &DownloadAttempt) -> Result<DownloadAttempt, AttemptError>;

    /// Permanently delete an attempt. Returns the deleted attempt.
    fn delete(&self, id: &str) -> Result<DownloadAttempt, AttemptError>;

    /// Insert a blacklist entry unless one exists for the same
    /// (media, indexer, indexer_id). Returns the stored entry and whether it was created.
    fn blacklist(&self, entry: NewBlacklistEntry) -> Result<(BlacklistEntry, bool), AttemptError>;

    /// Whether a release is blacklisted for the media.
    fn is_blacklisted(
        &self,
        media: &MediaRef,
        indexer: &str,
        indexer_id: &str,
    ) -> Result<bool, AttemptError>;

    /// All blacklist entries for a media item, newest first.
    fn blacklist_for_media(&self, media: &MediaRef) -> Result<Vec<BlacklistEntry>, AttemptError>;
}
