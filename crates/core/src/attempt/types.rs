//! Download attempt and blacklist types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::catalog::MediaRef;

use super::AttemptError;

/// Status of a download attempt.
///
/// ```text
/// Pending ─┬─> Sent ────────┬─> Downloaded
///          └─> Downloading ─┼─> Failed
///                           └─> Blacklisted
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptStatus {
    Pending,
    Sent,
    Downloading,
    Downloaded,
    Failed,
    Blacklisted,
}

impl AttemptStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AttemptStatus::Pending => "pending",
            AttemptStatus::Sent => "sent",
            AttemptStatus::Downloading => "downloading",
            AttemptStatus::Downloaded => "downloaded",
            AttemptStatus::Failed => "failed",
            AttemptStatus::Blacklisted => "blacklisted",
        }
    }

    /// Whether the attempt occupies the media's single active-download slot.
    pub fn is_active(&self) -> bool {
        matches!(self, AttemptStatus::Sent | AttemptStatus::Downloading)
    }
}

impl FromStr for AttemptStatus {
    type Err = AttemptError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "pending" => AttemptStatus::Pending,
            "sent" => AttemptStatus::Sent,
            "downloading" => AttemptStatus::Downloading,
            "downloaded" => AttemptStatus::Downloaded,
            "failed" => AttemptStatus::Failed,
            "blacklisted" => AttemptStatus::Blacklisted,
            other => {
                return Err(AttemptError::Internal(format!(
                    "unknown attempt status: {}",
                    other
                )))
            }
        })
    }
}

/// Status of the post-processing stages for an attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PostProcessStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl PostProcessStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PostProcessStatus::Pending => "pending",
            PostProcessStatus::Processing => "processing",
            PostProcessStatus::Completed => "completed",
            PostProcessStatus::Failed => "failed",
        }
    }
}

impl FromStr for PostProcessStatus {
    type Err = AttemptError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "pending" => PostProcessStatus::Pending,
            "processing" => PostProcessStatus::Processing,
            "completed" => PostProcessStatus::Completed,
            "failed" => PostProcessStatus::Failed,
            other => {
                return Err(AttemptError::Internal(format!(
                    "unknown post-process status: {}",
                    other
                )))
            }
        })
    }
}

/// Why a release was blacklisted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlacklistReason {
    FailedDownload,
    WrongFile,
    Corrupted,
    LowQuality,
    #[default]
    Manual,
}

impl BlacklistReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            BlacklistReason::FailedDownload => "failed_download",
            BlacklistReason::WrongFile => "wrong_file",
            BlacklistReason::Corrupted => "corrupted",
            BlacklistReason::LowQuality => "low_quality",
            BlacklistReason::Manual => "manual",
        }
    }
}

impl FromStr for BlacklistReason {
    type Err = AttemptError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "failed_download" => BlacklistReason::FailedDownload,
            "wrong_file" => BlacklistReason::WrongFile,
            "corrupted" => BlacklistReason::Corrupted,
            "low_quality" => BlacklistReason::LowQuality,
            "manual" => BlacklistReason::Manual,
            other => {
                return Err(AttemptError::Internal(format!(
                    "unknown blacklist reason: {}",
                    other
                )))
            }
        })
    }
}

/// One tracked try at downloading a specific release for a media item.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DownloadAttempt {
    pub id: String,
    pub media: MediaRef,
    /// Indexer name as reported by the aggregator.
    pub indexer: String,
    /// Indexer's numeric id, kept as text.
    pub indexer_id: String,
    pub release_title: String,
    pub download_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_size: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seeders: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub leechers: Option<u32>,
    pub status: AttemptStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_reason: Option<String>,
    /// Name of the download client config the job was submitted to.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub download_client: Option<String>,
    /// Job id on the download client (SABnzbd nzo_id).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub download_client_job_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw_file_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub post_processed_file_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub post_process_status: Option<PostProcessStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub post_process_error_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub post_process_error_reason: Option<String>,
    pub attempted_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl DownloadAttempt {
    /// Record an error on the attempt without touching its status.
    pub fn set_error(&mut self, error_type: &str, reason: impl Into<String>) {
        self.error_type = Some(error_type.to_string());
        self.error_reason = Some(reason.into());
    }

    pub fn clear_error(&mut self) {
        self.error_type = None;
        self.error_reason = None;
    }

    /// Mark the attempt failed with the given error.
    pub fn fail(&mut self, error_type: &str, reason: impl Into<String>) {
        self.status = AttemptStatus::Failed;
        self.set_error(error_type, reason);
    }
}

/// Data captured when an attempt is first created.
#[derive(Debug, Clone)]
pub struct NewAttempt {
    pub media: MediaRef,
    pub indexer: String,
    pub indexer_id: String,
    pub release_title: String,
    pub download_url: String,
    pub file_size: Option<u64>,
    pub seeders: Option<u32>,
    pub leechers: Option<u32>,
    pub download_client: Option<String>,
}

/// A release permanently suppressed for one media item.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlacklistEntry {
    pub id: String,
    pub media: MediaRef,
    pub indexer: String,
    pub indexer_id: String,
    pub release_title: String,
    pub download_url: String,
    pub reason: BlacklistReason,
    pub reason_details: String,
    pub blacklisted_at: DateTime<Utc>,
}

/// Request to blacklist a release.
#[derive(Debug, Clone)]
pub struct NewBlacklistEntry {
    pub media: MediaRef,
    pub indexer: String,
    pub indexer_id: String,
    pub release_title: String,
    pub download_url: String,
    pub reason: BlacklistReason,
    pub reason_details: String,
}
