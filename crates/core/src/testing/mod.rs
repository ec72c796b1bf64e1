//! Testing utilities and mock implementations.
//!
//! Mocks for every remote collaborator (indexer, download client, converter,
//! metadata provider) plus fixtures for media, releases and configuration, so the whole
//! acquisition flow can run without real infrastructure.
//!
//! # Example
//!
//! ```rust,ignore
//! use tomehound_core::testing::{fixtures, MockDownloadClient, MockIndexer};
//!
//! let indexer = MockIndexer::new();
//! indexer
//!     .set_results("Dune Frank Herbert", vec![fixtures::release("g1", "NZBgeek", 1, "Dune")])
//!     .await;
//!
//! let client = MockDownloadClient::new();
//! client.set_job_status("SABnzbd_nzo_1", "Completed", Some("/downloads/Dune")).await;
//! ```

mod mock_converter;
mod mock_download_client;
mod mock_indexer;
mod mock_metadata_provider;

pub use mock_converter::MockConverter;
pub use mock_download_client::{MockDownloadClient, MockDownloadClientFactory, RecordedSubmission};
pub use mock_indexer::{MockIndexer, RecordedSearch};
pub use mock_metadata_provider::MockMetadataProvider;

/// Ready-made domain values for tests.
pub mod fixtures {
    use std::path::Path;

    use chrono::Utc;

    use crate::catalog::{CreateMediaRequest, MediaItem, MediaKind, MediaStatus};
    use crate::config::{
        Config, DownloadClientConfig, DownloadClientKind, IndexerConfig, ProcessingConfig,
    };
    use crate::indexer::{Protocol, SearchResult};
    use crate::metadata::BookMetadata;

    /// A wanted book that is not stored anywhere.
    pub fn book(title: &str, authors: &[&str]) -> MediaItem {
        let now = Utc::now();
        MediaItem {
            id: uuid::Uuid::new_v4().to_string(),
            kind: MediaKind::Book,
            title: title.to_string(),
            authors: authors.iter().map(|a| a.to_string()).collect(),
            series: None,
            series_index: None,
            status: MediaStatus::Wanted,
            isbn: None,
            isbn13: None,
            language: None,
            description: None,
            publication_date: None,
            publisher: None,
            genres: Vec::new(),
            cover_url: None,
            cover_path: None,
            library_path: None,
            provider: None,
            external_id: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Catalog request for a media item with the given title and authors.
    pub fn media_request(title: &str, authors: &[&str]) -> CreateMediaRequest {
        CreateMediaRequest {
            title: title.to_string(),
            authors: authors.iter().map(|a| a.to_string()).collect(),
            ..Default::default()
        }
    }

    /// A provider record with an ISBN-13 and one author.
    pub fn book_metadata(provider: &str, provider_id: &str, title: &str) -> BookMetadata {
        BookMetadata {
            provider: provider.to_string(),
            provider_id: provider_id.to_string(),
            title: title.to_string(),
            authors: vec!["Frank Herbert".to_string()],
            isbn13: Some("9780441172719".to_string()),
            language: Some("eng".to_string()),
            ..Default::default()
        }
    }

    /// A usenet release with a direct download link.
    pub fn release(guid: &str, indexer: &str, indexer_id: i64, title: &str) -> SearchResult {
        SearchResult {
            guid: guid.to_string(),
            title: title.to_string(),
            indexer: indexer.to_string(),
            indexer_id,
            size: 1_048_576,
            publish_date: None,
            seeders: None,
            peers: None,
            protocol: Protocol::Usenet,
            download_url: format!("https://indexer.example/get/{}", guid),
            info_url: None,
        }
    }

    pub fn download_client_config(name: &str) -> DownloadClientConfig {
        DownloadClientConfig {
            name: name.to_string(),
            kind: DownloadClientKind::Sabnzbd,
            host: "sabnzbd".to_string(),
            port: 8080,
            use_ssl: false,
            api_key: "sab-key".to_string(),
            category: "books".to_string(),
            priority: 0,
            enabled: true,
            timeout_secs: 10,
        }
    }

    pub fn indexer_config(name: &str) -> IndexerConfig {
        IndexerConfig {
            name: name.to_string(),
            host: "prowlarr".to_string(),
            port: 9696,
            use_ssl: false,
            base_path: None,
            api_key: "prowlarr-key".to_string(),
            priority: 0,
            enabled: true,
            timeout_secs: 30,
        }
    }

    pub fn processing_config(downloads_root: &Path, library_root: &Path) -> ProcessingConfig {
        ProcessingConfig {
            downloads_root: downloads_root.to_path_buf(),
            library_root: library_root.to_path_buf(),
            converter_path: "ebook-convert".into(),
            enabled: true,
            converter_timeout_secs: 30,
            cover_timeout_secs: 5,
            verify_checksum: true,
        }
    }

    /// One indexer ("prowlarr") and one download client ("sab"), no processing.
    pub fn config() -> Config {
        Config {
            indexers: vec![indexer_config("prowlarr")],
            download_clients: vec![download_client_config("sab")],
            ..Default::default()
        }
    }
}
