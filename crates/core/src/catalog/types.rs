//! Types for the media catalog (wanted books and audiobooks).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Kind of media tracked by the catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaKind {
    Book,
    Audiobook,
}

impl MediaKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaKind::Book => "book",
            MediaKind::Audiobook => "audiobook",
        }
    }

    /// Newznab category used when searching indexers for this kind.
    pub fn search_category(&self) -> u32 {
        match self {
            MediaKind::Book => 7000,
            MediaKind::Audiobook => 3030,
        }
    }
}

impl FromStr for MediaKind {
    type Err = CatalogError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "book" => Ok(MediaKind::Book),
            "audiobook" => Ok(MediaKind::Audiobook),
            other => Err(CatalogError::Internal(format!("unknown media kind: {}", other))),
        }
    }
}

/// Tagged reference to a media item. Attempts and blacklist entries point at
/// media through this pair so books and audiobooks share one table.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MediaRef {
    pub kind: MediaKind,
    pub id: String,
}

impl MediaRef {
    pub fn new(kind: MediaKind, id: impl Into<String>) -> Self {
        Self {
            kind,
            id: id.into(),
        }
    }
}

impl fmt::Display for MediaRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind.as_str(), self.id)
    }
}

/// Lifecycle status of a media item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaStatus {
    Wanted,
    Searching,
    Downloading,
    Downloaded,
    PostProcessedSuccess,
    PostProcessedFailed,
    Archived,
}

impl MediaStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaStatus::Wanted => "wanted",
            MediaStatus::Searching => "searching",
            MediaStatus::Downloading => "downloading",
            MediaStatus::Downloaded => "downloaded",
            MediaStatus::PostProcessedSuccess => "post_processed_success",
            MediaStatus::PostProcessedFailed => "post_processed_failed",
            MediaStatus::Archived => "archived",
        }
    }
}

impl FromStr for MediaStatus {
    type Err = CatalogError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "wanted" => MediaStatus::Wanted,
            "searching" => MediaStatus::Searching,
            "downloading" => MediaStatus::Downloading,
            "downloaded" => MediaStatus::Downloaded,
            "post_processed_success" => MediaStatus::PostProcessedSuccess,
            "post_processed_failed" => MediaStatus::PostProcessedFailed,
            "archived" => MediaStatus::Archived,
            other => {
                return Err(CatalogError::Internal(format!(
                    "unknown media status: {}",
                    other
                )))
            }
        })
    }
}

/// A wanted book or audiobook.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaItem {
    pub id: String,
    pub kind: MediaKind,
    pub title: String,
    /// Authors in credit order. "Last, First" entries are kept verbatim.
    pub authors: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub series: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub series_index: Option<f64>,
    pub status: MediaStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub isbn: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub isbn13: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub publication_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub publisher: Option<String>,
    #[serde(default)]
    pub genres: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cover_url: Option<String>,
    /// Local cover image written next to the library file.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cover_path: Option<String>,
    /// Where the organized file (or audiobook directory) lives in the library.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub library_path: Option<String>,
    /// Metadata provider the item was added from, with its id there.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub external_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl MediaItem {
    pub fn media_ref(&self) -> MediaRef {
        MediaRef::new(self.kind, self.id.clone())
    }
}

/// Request to add a media item to the catalog.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreateMediaRequest {
    pub title: String,
    #[serde(default)]
    pub authors: Vec<String>,
    #[serde(default)]
    pub series: Option<String>,
    #[serde(default)]
    pub series_index: Option<f64>,
    #[serde(default)]
    pub isbn: Option<String>,
    #[serde(default)]
    pub isbn13: Option<String>,
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub publication_date: Option<String>,
    #[serde(default)]
    pub publisher: Option<String>,
    #[serde(default)]
    pub genres: Vec<String>,
    #[serde(default)]
    pub cover_url: Option<String>,
    /// Unique per kind together with `external_id` when both are set.
    #[serde(default)]
    pub provider: Option<String>,
    #[serde(default)]
    pub external_id: Option<String>,
}

/// Errors from catalog operations.
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Already exists: {0}")]
    AlreadyExists(String),

    #[error("Internal error: {0}")]
    Internal(String),
}
