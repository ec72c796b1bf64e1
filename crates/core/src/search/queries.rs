//! Ranked search query construction.

use crate::catalog::MediaItem;

/// A query string with its rank. Lower priority values rank first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchQuery {
    pub query: String,
    pub priority: u8,
}

impl SearchQuery {
    fn new(query: impl Into<String>, priority: u8) -> Self {
        Self {
            query: query.into(),
            priority,
        }
    }
}

/// Build the prioritized queries for a media item, lowest priority first.
///
/// - 0: ISBN / ISBN-13
/// - 1: `"{title} {authors}"`
/// - 2: `"{authors} {title}"`
/// - 3: bare title
///
/// Only the first two non-blank authors are used. Duplicate query strings are
/// dropped, keeping the best-ranked one.
pub fn build_queries(media: &MediaItem) -> Vec<SearchQuery> {
    let mut queries = Vec::new();

    for isbn in [&media.isbn, &media.isbn13].into_iter().flatten() {
        let isbn = isbn.trim();
        if !isbn.is_empty() {
            queries.push(SearchQuery::new(isbn, 0));
        }
    }

    let title = media.title.trim();
    let authors: Vec<&str> = media
        .authors
        .iter()
        .map(|a| a.trim())
        .filter(|a| !a.is_empty())
        .take(2)
        .collect();

    if !title.is_empty() && !authors.is_empty() {
        let author_str = authors.join(" ");
        queries.push(SearchQuery::new(format!("{} {}", title, author_str), 1));
        queries.push(SearchQuery::new(format!("{} {}", author_str, title), 2));
    }

    if !title.is_empty() {
        queries.push(SearchQuery::new(title, 3));
    }

    let mut seen = std::collections::HashSet::new();
    queries.retain(|q| seen.insert(q.query.clone()));
    queries
}
