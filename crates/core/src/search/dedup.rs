//! Deduplication and ranking of aggregated search results.

use std::collections::HashSet;

use crate::indexer::SearchResult;

/// A result tagged with the priority of the query that produced it.
#[derive(Debug, Clone)]
pub struct RankedResult {
    pub result: SearchResult,
    pub priority: u8,
}

/// Keep the first occurrence of each guid. Input order is preserved.
pub fn deduplicate_by_guid(results: Vec<RankedResult>) -> Vec<RankedResult> {
    let mut seen: HashSet<String> = HashSet::new();
    results
        .into_iter()
        .filter(|r| seen.insert(r.result.guid.clone()))
        .collect()
}

/// Stable sort by (priority, indexer lowercase, title lowercase).
pub fn sort_ranked(results: &mut [RankedResult]) {
    results.sort_by(|a, b| {
        a.priority
            .cmp(&b.priority)
            .then_with(|| {
                a.result
                    .indexer
                    .to_lowercase()
                    .cmp(&b.result.indexer.to_lowercase())
            })
            .then_with(|| {
                a.result
                    .title
                    .to_lowercase()
                    .cmp(&b.result.title.to_lowercase())
            })
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indexer::Protocol;

    fn ranked(guid: &str, indexer: &str, title: &str, priority: u8) -> RankedResult {
        RankedResult {
            result: SearchResult {
                guid: guid.to_string(),
                title: title.to_string(),
                indexer: indexer.to_string(),
                indexer_id: 1,
                size: 0,
                publish_date: None,
                seeders: None,
                peers: None,
                protocol: Protocol::Usenet,
                download_url: String::new(),
                info_url: None,
            },
            priority,
        }
    }

    #[test]
    fn test_dedup_keeps_first_seen() {
        let results = vec![
            ranked("a", "x", "first", 0),
            ranked("b", "x", "other", 1),
            ranked("a", "x", "second", 2),
        ];
        let deduped = deduplicate_by_guid(results);
        assert_eq!(deduped.len(), 2);
        assert_eq!(deduped[0].result.title, "first");
        assert_eq!(deduped[0].priority, 0);
    }

    #[test]
    fn test_sort_breaks_ties_case_insensitively() {
        let mut results = vec![
            ranked("1", "zeta", "A", 1),
            ranked("2", "Alpha", "b title", 1),
            ranked("3", "alpha", "A title", 1),
            ranked("4", "omega", "z", 0),
        ];
        sort_ranked(&mut results);
        let guids: Vec<&str> = results.iter().map(|r| r.result.guid.as_str()).collect();
        assert_eq!(guids, vec!["4", "3", "2", "1"]);
    }

    #[test]
    fn test_sort_is_stable_for_full_ties() {
        let mut results = vec![
            ranked("1", "Indexer", "Same", 2),
            ranked("2", "indexer", "same", 2),
        ];
        sort_ranked(&mut results);
        assert_eq!(results[0].result.guid, "1");
        assert_eq!(results[1].result.guid, "2");
    }
}
