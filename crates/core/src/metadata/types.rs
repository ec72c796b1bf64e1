//! Types for bibliographic metadata providers.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use thiserror::Error;

use crate::catalog::{CreateMediaRequest, MediaKind};

/// Errors from a metadata provider.
#[derive(Debug, Clone, Error)]
pub enum MetadataError {
    #[error("Request timeout after {0} seconds")]
    Timeout(u64),

    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Server error (HTTP {status}): {message}")]
    Server { status: u16, message: String },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Protocol error: {0}")]
    Protocol(String),
}

/// Kind of identifier accepted by [`MetadataProvider::fetch_by_identifier`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdentifierType {
    Isbn,
    Isbn13,
    OpenlibraryId,
}

impl IdentifierType {
    pub fn as_str(&self) -> &'static str {
        match self {
            IdentifierType::Isbn => "isbn",
            IdentifierType::Isbn13 => "isbn13",
            IdentifierType::OpenlibraryId => "openlibrary_id",
        }
    }

    /// Guess the type of a bare ISBN from its digit count.
    pub fn for_isbn(value: &str) -> Option<Self> {
        let digits = value.chars().filter(|c| c.is_ascii_alphanumeric()).count();
        match digits {
            10 => Some(IdentifierType::Isbn),
            13 => Some(IdentifierType::Isbn13),
            _ => None,
        }
    }
}

impl FromStr for IdentifierType {
    type Err = MetadataError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "isbn" => Ok(IdentifierType::Isbn),
            "isbn13" => Ok(IdentifierType::Isbn13),
            "openlibrary_id" => Ok(IdentifierType::OpenlibraryId),
            other => Err(MetadataError::Protocol(format!(
                "unknown identifier type: {}",
                other
            ))),
        }
    }
}

/// Normalized book metadata as returned by any provider.
///
/// Audiobook-only fields stay empty for providers that do not know them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BookMetadata {
    /// Provider name that produced this record.
    pub provider: String,
    /// Provider-local id (OpenLibrary work or edition key).
    pub provider_id: String,
    pub title: String,
    #[serde(default)]
    pub authors: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub publisher: Option<String>,
    /// `YYYY-MM-DD`; year-only sources are pinned to January 1st.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub publication_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cover_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    #[serde(default)]
    pub genres: Vec<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub isbn: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub isbn13: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_count: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub edition: Option<String>,
    #[serde(default)]
    pub narrators: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_seconds: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bitrate: Option<u32>,
}

impl BookMetadata {
    /// Catalog request for a wanted item described by this record.
    pub fn to_create_request(&self) -> CreateMediaRequest {
        CreateMediaRequest {
            title: self.title.clone(),
            authors: self.authors.clone(),
            isbn: self.isbn.clone(),
            isbn13: self.isbn13.clone(),
            language: self.language.clone(),
            description: self.description.clone(),
            publication_date: self.publication_date.clone(),
            publisher: self.publisher.clone(),
            genres: self.genres.clone(),
            cover_url: self.cover_url.clone(),
            provider: Some(self.provider.clone()),
            external_id: Some(self.provider_id.clone()),
            ..Default::default()
        }
    }
}

/// A source of bibliographic metadata (OpenLibrary and the like).
#[async_trait]
pub trait MetadataProvider: Send + Sync {
    /// Configured provider name, stored with media created from its records.
    fn name(&self) -> &str;

    /// Whether this provider is asked about the given kind.
    fn supports(&self, kind: MediaKind) -> bool;

    /// Free-text search, optionally filtered by language code.
    async fn search(
        &self,
        query: &str,
        kind: MediaKind,
        language: Option<&str>,
    ) -> Result<Vec<BookMetadata>, MetadataError>;

    /// Look up a single record. `Ok(None)` when the provider has no match.
    async fn fetch_by_identifier(
        &self,
        identifier: &str,
        identifier_type: IdentifierType,
    ) -> Result<Option<BookMetadata>, MetadataError>;

    /// Check that the provider answers.
    async fn test_connection(&self) -> bool;
}
