//! Media routes: add wanted, status by provider id, search, initiate
//! download, list attempts.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tomehound_core::{
    AddedMedia, BookMetadata, CoreError, DownloadAttempt, ExternalRef, ExternalStatus,
    SearchResult,
};

use super::metadata::parse_kind;
use super::ApiError;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct SearchResponse {
    pub results: Vec<SearchResult>,
    pub total: usize,
}

#[derive(Debug, Serialize)]
pub struct AttemptsResponse {
    pub attempts: Vec<DownloadAttempt>,
}

#[derive(Debug, Deserialize)]
pub struct AddWantedRequest {
    #[serde(default)]
    pub kind: Option<String>,
    /// Record as returned by a metadata search.
    pub metadata: BookMetadata,
}

/// Comma-separated lists of equal length, paired by position.
#[derive(Debug, Deserialize)]
pub struct StatusQuery {
    #[serde(default)]
    pub providers: String,
    #[serde(default)]
    pub external_ids: String,
}

#[derive(Debug, Deserialize)]
pub struct StatusRequest {
    pub items: Vec<ExternalRef>,
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub items: Vec<ExternalStatus>,
}

/// Add a provider record as wanted media. 201 when created, 200 when the
/// record was already wanted as that kind.
pub async fn add_wanted(
    State(state): State<Arc<AppState>>,
    Json(request): Json<AddWantedRequest>,
) -> Result<(StatusCode, Json<AddedMedia>), ApiError> {
    let kind = parse_kind(request.kind.as_deref())?;
    let added = state.service().add_wanted_media(kind, &request.metadata)?;
    let status = if added.created {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    Ok((status, Json(added)))
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

pub async fn status_by_query(
    State(state): State<Arc<AppState>>,
    Query(query): Query<StatusQuery>,
) -> Result<Json<StatusResponse>, ApiError> {
    let providers = split_list(&query.providers);
    let external_ids = split_list(&query.external_ids);
    if providers.is_empty() || providers.len() != external_ids.len() {
        return Err(CoreError::Validation(
            "providers and external_ids must be non-empty lists of equal length".to_string(),
        )
        .into());
    }

    let refs: Vec<ExternalRef> = providers
        .into_iter()
        .zip(external_ids)
        .map(|(provider, external_id)| ExternalRef {
            provider,
            external_id,
        })
        .collect();
    Ok(Json(StatusResponse {
        items: state.service().media_status(&refs)?,
    }))
}

pub async fn status_by_body(
    State(state): State<Arc<AppState>>,
    Json(request): Json<StatusRequest>,
) -> Result<Json<StatusResponse>, ApiError> {
    if request.items.is_empty() {
        return Err(CoreError::Validation("items must not be empty".to_string()).into());
    }
    Ok(Json(StatusResponse {
        items: state.service().media_status(&request.items)?,
    }))
}

/// Search the indexer for releases of a media item.
pub async fn search(
    State(state): State<Arc<AppState>>,
    Path(media_id): Path<String>,
) -> Result<Json<SearchResponse>, ApiError> {
    let results = state.service().search_for_media(&media_id).await?;
    Ok(Json(SearchResponse {
        total: results.len(),
        results,
    }))
}

/// Start downloading the posted release.
pub async fn initiate_download(
    State(state): State<Arc<AppState>>,
    Path(media_id): Path<String>,
    Json(result): Json<SearchResult>,
) -> Result<(StatusCode, Json<DownloadAttempt>), ApiError> {
    let attempt = state
        .service()
        .initiate_download(&media_id, &result)
        .await?;
    Ok((StatusCode::CREATED, Json(attempt)))
}

pub async fn list_attempts(
    State(state): State<Arc<AppState>>,
    Path(media_id): Path<String>,
) -> Result<Json<AttemptsResponse>, ApiError> {
    let attempts = state.service().get_download_attempts(&media_id)?;
    Ok(Json(AttemptsResponse { attempts }))
}
