//! Prometheus metrics for core components.
//!
//! This module provides metrics for:
//! - Search aggregation (queries, results)
//! - Download orchestration and reconciliation
//! - Post-processing (conversion, organization)
//! - External services (indexer, download client, converter)

use once_cell::sync::Lazy;
use prometheus::{HistogramOpts, HistogramVec, IntCounter, IntCounterVec, Opts};

// =============================================================================
// Search
// =============================================================================

/// Media searches total by result.
pub static SEARCHES_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("tomehound_searches_total", "Total media searches"),
        &["result"], // "success", "failed"
    )
    .unwrap()
});

/// Individual indexer queries that failed and were skipped.
pub static SEARCH_QUERY_FAILURES: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "tomehound_search_query_failures_total",
        "Indexer queries that failed during aggregation",
    )
    .unwrap()
});

/// Results returned per media search after dedup, blacklist filter and truncation.
pub static SEARCH_RESULTS: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "tomehound_search_results",
            "Number of results returned per media search",
        )
        .buckets(vec![0.0, 1.0, 5.0, 10.0, 25.0, 50.0]),
        &[],
    )
    .unwrap()
});

/// Releases dropped because they were blacklisted.
pub static BLACKLIST_FILTERED: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "tomehound_blacklist_filtered_total",
        "Search results dropped by the blacklist",
    )
    .unwrap()
});

// =============================================================================
// Downloads
// =============================================================================

/// Download initiations by result and submission mode.
pub static DOWNLOADS_INITIATED: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "tomehound_downloads_initiated_total",
            "Total download initiations",
        ),
        &["result", "mode"], // result: "success", "failed", "rejected"; mode: "direct", "indexer"
    )
    .unwrap()
});

/// Status reconciliations by outcome.
pub static RECONCILIATIONS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "tomehound_reconciliations_total",
            "Download status reconciliations",
        ),
        &["outcome"], // "downloaded", "downloading", "failed", "not_found", "unchanged", "error", "skipped"
    )
    .unwrap()
});

/// Releases blacklisted.
pub static BLACKLISTED_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("tomehound_blacklisted_total", "Releases blacklisted"),
        &["reason"],
    )
    .unwrap()
});

/// Attempts deleted.
pub static ATTEMPTS_DELETED: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "tomehound_attempts_deleted_total",
        "Download attempts deleted",
    )
    .unwrap()
});

// =============================================================================
// Post-processing
// =============================================================================

/// Post-processing stage runs by stage and result.
pub static POST_PROCESS_STAGES: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "tomehound_post_process_stages_total",
            "Post-processing stage runs",
        ),
        &["stage", "result"], // stage: "convert", "organize"; result: "success", "failed"
    )
    .unwrap()
});

/// Ebook conversion duration in seconds.
pub static CONVERSION_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "tomehound_conversion_duration_seconds",
            "Duration of ebook conversions",
        )
        .buckets(vec![0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0, 120.0, 300.0]),
        &["result"],
    )
    .unwrap()
});

/// Soft post-processing failures (sidecar metadata, cover download).
pub static SOFT_FAILURES: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "tomehound_post_process_soft_failures_total",
            "Best-effort post-processing steps that failed",
        ),
        &["step"], // "metadata", "cover"
    )
    .unwrap()
});

// =============================================================================
// External services
// =============================================================================

/// External service request duration.
pub static EXTERNAL_SERVICE_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "tomehound_external_service_duration_seconds",
            "Duration of external service calls",
        )
        .buckets(vec![0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0]),
        &["service", "operation"],
    )
    .unwrap()
});

// =============================================================================
// Helper functions
// =============================================================================

/// Get all core metrics for registration in a registry.
pub fn all_metrics() -> Vec<Box<dyn prometheus::core::Collector>> {
    vec![
        // Search
        Box::new(SEARCHES_TOTAL.clone()),
        Box::new(SEARCH_QUERY_FAILURES.clone()),
        Box::new(SEARCH_RESULTS.clone()),
        Box::new(BLACKLIST_FILTERED.clone()),
        // Downloads
        Box::new(DOWNLOADS_INITIATED.clone()),
        Box::new(RECONCILIATIONS.clone()),
        Box::new(BLACKLISTED_TOTAL.clone()),
        Box::new(ATTEMPTS_DELETED.clone()),
        // Post-processing
        Box::new(POST_PROCESS_STAGES.clone()),
        Box::new(CONVERSION_DURATION.clone()),
        Box::new(SOFT_FAILURES.clone()),
        // External services
        Box::new(EXTERNAL_SERVICE_DURATION.clone()),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_metrics_register() {
        let registry = prometheus::Registry::new();
        for metric in all_metrics() {
            registry.register(metric).unwrap();
        }
        SEARCHES_TOTAL.with_label_values(&["success"]).inc();
        let families = registry.gather();
        assert!(families
            .iter()
            .any(|f| f.get_name() == "tomehound_searches_total"));
    }
}
