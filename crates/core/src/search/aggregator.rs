//! Fan-out search across ranked queries.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;

use futures::future::join_all;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::attempt::{AttemptError, AttemptStore};
use crate::catalog::MediaItem;
use crate::indexer::{IndexerClient, IndexerError, SearchResult};
use crate::metrics;

use super::dedup::{deduplicate_by_guid, sort_ranked, RankedResult};
use super::queries::build_queries;

/// Maximum results returned per media search, and per indexer query.
pub const MAX_RESULTS: usize = 50;

/// Errors from a media search.
#[derive(Debug, Error)]
pub enum SearchError {
    /// Every query failed; carries the last indexer error.
    #[error("All {attempted} search queries failed: {last_error}")]
    AllQueriesFailed { attempted: usize, last_error: String },

    #[error(transparent)]
    Store(#[from] AttemptError),
}

/// Builds ranked queries for a media item, runs them against the indexer,
/// and merges the hits into one ordered list.
pub struct SearchAggregator {
    indexer: Arc<dyn IndexerClient>,
    attempts: Arc<dyn AttemptStore>,
}

impl SearchAggregator {
    pub fn new(indexer: Arc<dyn IndexerClient>, attempts: Arc<dyn AttemptStore>) -> Self {
        Self { indexer, attempts }
    }

    /// Search releases for a media item.
    ///
    /// Individual query failures are logged and skipped; the search only fails
    /// when every query failed.
    pub async fn search(&self, media: &MediaItem) -> Result<Vec<SearchResult>, SearchError> {
        let start = Instant::now();
        let queries = build_queries(media);
        let category = media.kind.search_category();

        debug!(
            media = %media.media_ref(),
            queries = queries.len(),
            "Running media search"
        );

        let outcomes = join_all(queries.iter().map(|q| async move {
            (q, self.query(&q.query, category).await)
        }))
        .await;

        let mut ranked = Vec::new();
        let mut failures = 0;
        let mut last_error = None;
        for (query, outcome) in outcomes {
            match outcome {
                Ok(results) => {
                    ranked.extend(results.into_iter().map(|result| RankedResult {
                        result,
                        priority: query.priority,
                    }));
                }
                Err(e) => {
                    warn!(
                        query = %query.query,
                        priority = query.priority,
                        error = %e,
                        retryable = e.is_retryable(),
                        "Search query failed, continuing"
                    );
                    metrics::SEARCH_QUERY_FAILURES.inc();
                    failures += 1;
                    last_error = Some(e.to_string());
                }
            }
        }

        if !queries.is_empty() && failures == queries.len() {
            metrics::SEARCHES_TOTAL.with_label_values(&["failed"]).inc();
            return Err(SearchError::AllQueriesFailed {
                attempted: queries.len(),
                last_error: last_error.unwrap_or_default(),
            });
        }

        let deduped = deduplicate_by_guid(ranked);

        let blacklisted: HashSet<(String, String)> = self
            .attempts
            .blacklist_for_media(&media.media_ref())?
            .into_iter()
            .map(|entry| (entry.indexer, entry.indexer_id))
            .collect();

        let before = deduped.len();
        let mut filtered: Vec<RankedResult> = deduped
            .into_iter()
            .filter(|r| {
                !blacklisted.contains(&(r.result.indexer.clone(), r.result.indexer_id.to_string()))
            })
            .collect();
        metrics::BLACKLIST_FILTERED.inc_by((before - filtered.len()) as u64);

        sort_ranked(&mut filtered);
        filtered.truncate(MAX_RESULTS);

        let results: Vec<SearchResult> = filtered.into_iter().map(|r| r.result).collect();

        metrics::SEARCHES_TOTAL.with_label_values(&["success"]).inc();
        metrics::SEARCH_RESULTS
            .with_label_values(&[])
            .observe(results.len() as f64);
        info!(
            media = %media.media_ref(),
            results = results.len(),
            failed_queries = failures,
            duration_ms = start.elapsed().as_millis() as u64,
            "Media search complete"
        );

        Ok(results)
    }

    /// Run one query. A transient failure gets a single second try.
    async fn query(&self, query: &str, category: u32) -> Result<Vec<SearchResult>, IndexerError> {
        match self
            .indexer
            .search(query, Some(category), MAX_RESULTS as u32)
            .await
        {
            Err(e) if e.is_retryable() => {
                debug!(query, error = %e, "Retrying search query");
                self.indexer
                    .search(query, Some(category), MAX_RESULTS as u32)
                    .await
            }
            outcome => outcome,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attempt::{BlacklistReason, NewBlacklistEntry, SqliteAttemptStore};
    use crate::catalog::MediaKind;
    use crate::testing::{fixtures, MockIndexer};

    fn setup() -> (Arc<MockIndexer>, Arc<SqliteAttemptStore>, SearchAggregator) {
        let indexer = Arc::new(MockIndexer::new());
        let store = Arc::new(SqliteAttemptStore::in_memory().unwrap());
        let aggregator = SearchAggregator::new(indexer.clone(), store.clone());
        (indexer, store, aggregator)
    }

    #[tokio::test]
    async fn test_duplicate_guid_keeps_best_ranked_occurrence() {
        let (indexer, _store, aggregator) = setup();
        let media = fixtures::book("Dune", &["Frank Herbert"]);

        indexer
            .set_results("Dune Frank Herbert", vec![fixtures::release("g1", "NZBgeek", 1, "Dune A")])
            .await;
        indexer
            .set_results(
                "Dune",
                vec![
                    fixtures::release("g1", "NZBgeek", 1, "Dune A"),
                    fixtures::release("g2", "DrunkenSlug", 2, "Dune B"),
                ],
            )
            .await;

        let results = aggregator.search(&media).await.unwrap();
        let guids: Vec<&str> = results.iter().map(|r| r.guid.as_str()).collect();
        // g1 came from the priority-1 query so it ranks before g2 (priority 3)
        assert_eq!(guids, vec!["g1", "g2"]);
    }

    #[tokio::test]
    async fn test_uses_kind_category() {
        let (indexer, _store, aggregator) = setup();
        let mut media = fixtures::book("Dune", &[]);
        media.kind = MediaKind::Audiobook;

        aggregator.search(&media).await.unwrap();

        let calls = indexer.recorded_searches().await;
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].category, Some(3030));
        assert_eq!(calls[0].limit, 50);
    }

    #[tokio::test]
    async fn test_blacklisted_result_is_dropped() {
        let (indexer, store, aggregator) = setup();
        let media = fixtures::book("Dune", &[]);

        indexer
            .set_results(
                "Dune",
                vec![
                    fixtures::release("g1", "AAA", 7, "Dune best"),
                    fixtures::release("g2", "BBB", 8, "Dune other"),
                ],
            )
            .await;
        store
            .blacklist(NewBlacklistEntry {
                media: media.media_ref(),
                indexer: "AAA".to_string(),
                indexer_id: "7".to_string(),
                release_title: "Dune best".to_string(),
                download_url: String::new(),
                reason: BlacklistReason::WrongFile,
                reason_details: String::new(),
            })
            .unwrap();

        let results = aggregator.search(&media).await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].guid, "g2");
    }

    #[tokio::test]
    async fn test_partial_failure_returns_remaining_results() {
        let (indexer, _store, aggregator) = setup();
        let media = fixtures::book("Dune", &["Frank Herbert"]);

        indexer
            .set_query_error("Dune Frank Herbert", IndexerError::Timeout(30))
            .await;
        indexer
            .set_results("Dune", vec![fixtures::release("g1", "x", 1, "Dune")])
            .await;

        let results = aggregator.search(&media).await.unwrap();
        assert_eq!(results.len(), 1);
    }

    #[tokio::test]
    async fn test_transient_failure_is_retried_once() {
        let (indexer, _store, aggregator) = setup();
        let media = fixtures::book("Dune", &[]);
        indexer
            .set_query_error_once("Dune", IndexerError::ConnectionFailed("reset".into()))
            .await;
        indexer
            .set_results("Dune", vec![fixtures::release("g1", "x", 1, "Dune")])
            .await;

        let results = aggregator.search(&media).await.unwrap();

        assert_eq!(results.len(), 1);
        assert_eq!(indexer.recorded_searches().await.len(), 2);
    }

    #[tokio::test]
    async fn test_auth_failure_is_not_retried() {
        let (indexer, _store, aggregator) = setup();
        let media = fixtures::book("Dune", &[]);
        indexer.set_query_error("Dune", IndexerError::Auth).await;

        let result = aggregator.search(&media).await;

        assert!(matches!(
            result,
            Err(SearchError::AllQueriesFailed { attempted: 1, .. })
        ));
        assert_eq!(indexer.recorded_searches().await.len(), 1);
    }

    #[tokio::test]
    async fn test_all_queries_failing_is_an_error() {
        let (indexer, _store, aggregator) = setup();
        let media = fixtures::book("Dune", &["Frank Herbert"]);

        for q in ["Dune Frank Herbert", "Frank Herbert Dune", "Dune"] {
            indexer.set_query_error(q, IndexerError::Auth).await;
        }

        let result = aggregator.search(&media).await;
        assert!(matches!(
            result,
            Err(SearchError::AllQueriesFailed { attempted: 3, .. })
        ));
    }

    #[tokio::test]
    async fn test_truncates_to_fifty() {
        let (indexer, _store, aggregator) = setup();
        let media = fixtures::book("Dune", &[]);

        let many: Vec<_> = (0..80)
            .map(|i| fixtures::release(&format!("g{}", i), "idx", i, &format!("Dune {:03}", i)))
            .collect();
        indexer.set_results("Dune", many).await;

        let results = aggregator.search(&media).await.unwrap();
        assert_eq!(results.len(), MAX_RESULTS);
        assert_eq!(results[0].title, "Dune 000");
    }
}
