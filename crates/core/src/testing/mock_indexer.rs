//! Mock indexer client for testing.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::indexer::{IndexerClient, IndexerError, SearchResult, SubmittedJob};

/// A recorded search call for test assertions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedSearch {
    pub query: String,
    pub category: Option<u32>,
    pub limit: u32,
}

/// Mock implementation of the IndexerClient trait.
///
/// Provides controllable behavior for testing:
/// - Per-query canned results, per-query failures and one-shot failures
/// - Canned download URL resolution keyed by guid
/// - Recorded calls for assertions
///
/// # Example
///
/// ```rust,ignore
/// let indexer = MockIndexer::new();
/// indexer.set_results("Dune", vec![fixtures::release("g1", "NZBgeek", 1, "Dune")]).await;
/// indexer.set_query_error("Dune Frank Herbert", IndexerError::Timeout(30)).await;
/// ```
#[derive(Debug, Default)]
pub struct MockIndexer {
    results: Arc<RwLock<HashMap<String, Vec<SearchResult>>>>,
    query_errors: Arc<RwLock<HashMap<String, IndexerError>>>,
    transient_errors: Arc<RwLock<HashMap<String, IndexerError>>>,
    searches: Arc<RwLock<Vec<RecordedSearch>>>,
    download_urls: Arc<RwLock<HashMap<String, String>>>,
    resolve_calls: Arc<RwLock<Vec<(i64, String)>>>,
    submissions: Arc<RwLock<Vec<(i64, String)>>>,
    next_submit_error: Arc<RwLock<Option<IndexerError>>>,
    unreachable: Arc<RwLock<bool>>,
}

impl MockIndexer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Results returned for an exact query string. Unknown queries return no results.
    pub async fn set_results(&self, query: &str, results: Vec<SearchResult>) {
        self.results
            .write()
            .await
            .insert(query.to_string(), results);
    }

    /// Make every search for this query fail.
    pub async fn set_query_error(&self, query: &str, error: IndexerError) {
        self.query_errors
            .write()
            .await
            .insert(query.to_string(), error);
    }

    /// Make only the next search for this query fail.
    pub async fn set_query_error_once(&self, query: &str, error: IndexerError) {
        self.transient_errors
            .write()
            .await
            .insert(query.to_string(), error);
    }

    /// What `test_connection` reports. Reachable by default.
    pub async fn set_reachable(&self, reachable: bool) {
        *self.unreachable.write().await = !reachable;
    }

    /// URL returned by `resolve_download_url` for a guid. Unknown guids fail with NotFound.
    pub async fn set_download_url(&self, guid: &str, url: &str) {
        self.download_urls
            .write()
            .await
            .insert(guid.to_string(), url.to_string());
    }

    /// Make the next `submit_to_remote_client` call fail.
    pub async fn set_next_submit_error(&self, error: IndexerError) {
        *self.next_submit_error.write().await = Some(error);
    }

    pub async fn recorded_searches(&self) -> Vec<RecordedSearch> {
        self.searches.read().await.clone()
    }

    pub async fn recorded_resolves(&self) -> Vec<(i64, String)> {
        self.resolve_calls.read().await.clone()
    }

    pub async fn recorded_submissions(&self) -> Vec<(i64, String)> {
        self.submissions.read().await.clone()
    }
}

#[async_trait]
impl IndexerClient for MockIndexer {
    fn name(&self) -> &str {
        "mock-indexer"
    }

    async fn search(
        &self,
        query: &str,
        category: Option<u32>,
        limit: u32,
    ) -> Result<Vec<SearchResult>, IndexerError> {
        self.searches.write().await.push(RecordedSearch {
            query: query.to_string(),
            category,
            limit,
        });

        if let Some(error) = self.transient_errors.write().await.remove(query) {
            return Err(error);
        }
        if let Some(error) = self.query_errors.read().await.get(query) {
            return Err(error.clone());
        }

        Ok(self
            .results
            .read()
            .await
            .get(query)
            .cloned()
            .unwrap_or_default())
    }

    async fn resolve_download_url(
        &self,
        indexer_id: i64,
        guid: &str,
    ) -> Result<String, IndexerError> {
        self.resolve_calls
            .write()
            .await
            .push((indexer_id, guid.to_string()));

        self.download_urls
            .read()
            .await
            .get(guid)
            .cloned()
            .ok_or_else(|| IndexerError::NotFound(format!("no download link for {}", guid)))
    }

    async fn submit_to_remote_client(
        &self,
        indexer_id: i64,
        guid: &str,
    ) -> Result<SubmittedJob, IndexerError> {
        if let Some(error) = self.next_submit_error.write().await.take() {
            return Err(error);
        }

        self.submissions
            .write()
            .await
            .push((indexer_id, guid.to_string()));

        Ok(SubmittedJob {
            job_id: format!("indexer-{}", guid),
        })
    }

    async fn test_connection(&self) -> bool {
        !*self.unreachable.read().await
    }
}
