//! Metadata provider lookups used before adding wanted media.

use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tomehound_core::{BookMetadata, CoreError, MediaKind};

use super::ApiError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct MetadataSearchQuery {
    pub q: String,
    /// `book` (default) or `audiobook`.
    #[serde(default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub language: Option<String>,
    /// Restrict the search to one configured provider.
    #[serde(default)]
    pub provider: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct MetadataSearchResponse {
    pub results: Vec<BookMetadata>,
    pub total: usize,
}

/// Parse an optional `kind` parameter, defaulting to books.
pub(super) fn parse_kind(kind: Option<&str>) -> Result<MediaKind, ApiError> {
    match kind {
        None | Some("") => Ok(MediaKind::Book),
        Some(value) => value
            .parse()
            .map_err(|_| CoreError::Validation(format!("Invalid media kind: {}", value)).into()),
    }
}

pub async fn search(
    State(state): State<Arc<AppState>>,
    Query(query): Query<MetadataSearchQuery>,
) -> Result<Json<MetadataSearchResponse>, ApiError> {
    let kind = parse_kind(query.kind.as_deref())?;
    let results = state
        .service()
        .search_metadata(
            &query.q,
            kind,
            query.language.as_deref().filter(|l| !l.is_empty()),
            query.provider.as_deref().filter(|p| !p.is_empty()),
        )
        .await?;
    Ok(Json(MetadataSearchResponse {
        total: results.len(),
        results,
    }))
}

pub async fn lookup_isbn(
    State(state): State<Arc<AppState>>,
    Path(isbn): Path<String>,
) -> Result<Json<BookMetadata>, ApiError> {
    Ok(Json(state.service().lookup_isbn(&isbn).await?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_kind() {
        assert_eq!(parse_kind(None).unwrap(), MediaKind::Book);
        assert_eq!(parse_kind(Some("audiobook")).unwrap(), MediaKind::Audiobook);
        assert!(parse_kind(Some("comic")).is_err());
    }
}
