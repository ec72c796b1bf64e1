//! Mock metadata provider for testing.

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::catalog::MediaKind;
use crate::metadata::{BookMetadata, IdentifierType, MetadataError, MetadataProvider};

/// Mock implementation of the MetadataProvider trait.
///
/// Searches return every stored record whose title contains the query
/// (case-insensitive). Identifier lookups match provider id, ISBN or ISBN-13.
#[derive(Debug)]
pub struct MockMetadataProvider {
    name: String,
    kinds: Vec<MediaKind>,
    records: Arc<RwLock<Vec<BookMetadata>>>,
    error: Arc<RwLock<Option<MetadataError>>>,
    searches: Arc<RwLock<Vec<String>>>,
}

impl MockMetadataProvider {
    /// A provider for books and audiobooks.
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            kinds: vec![MediaKind::Book, MediaKind::Audiobook],
            records: Arc::new(RwLock::new(Vec::new())),
            error: Arc::new(RwLock::new(None)),
            searches: Arc::new(RwLock::new(Vec::new())),
        }
    }

    pub fn with_kinds(mut self, kinds: &[MediaKind]) -> Self {
        self.kinds = kinds.to_vec();
        self
    }

    pub async fn add_record(&self, record: BookMetadata) {
        self.records.write().await.push(record);
    }

    /// Fail every call until cleared with `clear_error`.
    pub async fn set_error(&self, error: MetadataError) {
        *self.error.write().await = Some(error);
    }

    pub async fn clear_error(&self) {
        *self.error.write().await = None;
    }

    /// Queries passed to `search`, in call order.
    pub async fn searches(&self) -> Vec<String> {
        self.searches.read().await.clone()
    }

    async fn check_error(&self) -> Result<(), MetadataError> {
        match self.error.read().await.clone() {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl MetadataProvider for MockMetadataProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn supports(&self, kind: MediaKind) -> bool {
        self.kinds.contains(&kind)
    }

    async fn search(
        &self,
        query: &str,
        _kind: MediaKind,
        language: Option<&str>,
    ) -> Result<Vec<BookMetadata>, MetadataError> {
        self.searches.write().await.push(query.to_string());
        self.check_error().await?;

        let needle = query.to_lowercase();
        Ok(self
            .records
            .read()
            .await
            .iter()
            .filter(|r| r.title.to_lowercase().contains(&needle))
            .filter(|r| match (language, r.language.as_deref()) {
                (Some(wanted), Some(lang)) => lang == wanted,
                _ => true,
            })
            .cloned()
            .collect())
    }

    async fn fetch_by_identifier(
        &self,
        identifier: &str,
        identifier_type: IdentifierType,
    ) -> Result<Option<BookMetadata>, MetadataError> {
        self.check_error().await?;

        Ok(self
            .records
            .read()
            .await
            .iter()
            .find(|r| match identifier_type {
                IdentifierType::OpenlibraryId => r.provider_id == identifier,
                IdentifierType::Isbn => r.isbn.as_deref() == Some(identifier),
                IdentifierType::Isbn13 => r.isbn13.as_deref() == Some(identifier),
            })
            .cloned())
    }

    async fn test_connection(&self) -> bool {
        self.error.read().await.is_none()
    }
}
