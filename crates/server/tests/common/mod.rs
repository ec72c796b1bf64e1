//! Common test utilities for API testing with mocks.
//!
//! This module provides a test fixture that creates an in-process router
//! with mock indexer, download client, converter and metadata provider
//! ("openlibrary") injected, so every route
//! can be exercised without external infrastructure.

#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;

use tomehound_core::{
    testing::{
        MockConverter, MockDownloadClient, MockDownloadClientFactory, MockIndexer,
        MockMetadataProvider,
    },
    AcquisitionService, Config, MediaCatalog, MediaItem, MediaKind, MetadataProvider,
    MetadataProviders, SqliteAttemptStore, SqliteMediaCatalog, StaticConfigResolver,
};

/// Re-export fixtures for test convenience
pub use tomehound_core::testing::fixtures;

/// Test fixture with an in-process router and controllable mocks.
///
/// ```rust,ignore
/// let fixture = TestFixture::new();
/// let media = fixture.add_book("Dune", &["Frank Herbert"]);
/// let response = fixture.post(&format!("/api/v1/media/{}/search", media.id), json!({})).await;
/// assert_eq!(response.status, StatusCode::OK);
/// ```
pub struct TestFixture {
    pub router: Router,
    pub indexer: Arc<MockIndexer>,
    pub client: Arc<MockDownloadClient>,
    pub metadata: Arc<MockMetadataProvider>,
    pub catalog: Arc<SqliteMediaCatalog>,
    pub downloads: PathBuf,
    pub library: PathBuf,
    pub temp_dir: TempDir,
}

/// Response from a test request
#[derive(Debug)]
pub struct TestResponse {
    pub status: StatusCode,
    pub body: Value,
}

impl TestFixture {
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let db_path = temp_dir.path().join("test.db");
        let downloads = temp_dir.path().join("downloads");
        let library = temp_dir.path().join("library");
        std::fs::create_dir_all(&downloads).expect("Failed to create downloads dir");

        let config = Config {
            processing: Some(fixtures::processing_config(&downloads, &library)),
            ..fixtures::config()
        };

        let attempts =
            Arc::new(SqliteAttemptStore::new(&db_path).expect("Failed to create attempt store"));
        let catalog = Arc::new(SqliteMediaCatalog::new(&db_path).expect("Failed to create catalog"));
        let indexer = Arc::new(MockIndexer::new());
        let client = Arc::new(MockDownloadClient::new());
        let metadata = Arc::new(MockMetadataProvider::new("openlibrary"));

        let service = AcquisitionService::new(
            attempts,
            catalog.clone(),
            indexer.clone(),
            Arc::new(StaticConfigResolver::new(config.clone())),
            Arc::new(MockDownloadClientFactory::new(client.clone())),
        )
        .with_converter(Arc::new(MockConverter::new()))
        .with_metadata_providers(MetadataProviders::new(vec![
            metadata.clone() as Arc<dyn MetadataProvider>
        ]));

        let state = Arc::new(tomehound_server::state::AppState::new(config, service));
        let router = tomehound_server::api::create_router(state);

        Self {
            router,
            indexer,
            client,
            metadata,
            catalog,
            downloads,
            library,
            temp_dir,
        }
    }

    pub fn add_book(&self, title: &str, authors: &[&str]) -> MediaItem {
        self.catalog
            .create(MediaKind::Book, &fixtures::media_request(title, authors))
            .expect("Failed to create media")
    }

    pub async fn get(&self, path: &str) -> TestResponse {
        self.request("GET", path, None).await
    }

    pub async fn post(&self, path: &str, body: Value) -> TestResponse {
        self.request("POST", path, Some(body)).await
    }

    /// Send a POST request without a body.
    pub async fn post_empty(&self, path: &str) -> TestResponse {
        self.request("POST", path, None).await
    }

    pub async fn delete(&self, path: &str) -> TestResponse {
        self.request("DELETE", path, None).await
    }

    /// Send a request and return the raw body as text.
    pub async fn get_text(&self, path: &str) -> (StatusCode, String) {
        let request = Request::builder()
            .method("GET")
            .uri(path)
            .body(Body::empty())
            .unwrap();
        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("Failed to send request");
        let status = response.status();
        let bytes = response
            .into_body()
            .collect()
            .await
            .expect("Failed to collect body")
            .to_bytes();
        (status, String::from_utf8_lossy(&bytes).into_owned())
    }

    async fn request(&self, method: &str, path: &str, body: Option<Value>) -> TestResponse {
        let mut request_builder = Request::builder().method(method).uri(path);

        let body = if let Some(json_body) = body {
            request_builder = request_builder.header("Content-Type", "application/json");
            Body::from(serde_json::to_vec(&json_body).unwrap())
        } else {
            Body::empty()
        };

        let request = request_builder.body(body).unwrap();

        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("Failed to send request");

        let status = response.status();
        let body_bytes = response
            .into_body()
            .collect()
            .await
            .expect("Failed to collect body")
            .to_bytes();

        let body: Value = if body_bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&body_bytes).unwrap_or(Value::Null)
        };

        TestResponse { status, body }
    }
}
