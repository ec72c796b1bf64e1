//! Attempt-scoped routes: status, blacklist, delete and post-processing.

use axum::{
    extract::{Path, State},
    response::Response,
    Json,
};
use serde::Deserialize;
use std::sync::Arc;
use tomehound_core::{AttemptProgress, BlacklistOutcome, BlacklistReason, DeleteOutcome};

use super::{error::stage_response, ApiError};
use crate::state::AppState;

/// Request body for blacklisting a release. Both fields are optional.
#[derive(Debug, Default, Deserialize)]
pub struct BlacklistBody {
    #[serde(default)]
    pub reason: BlacklistReason,
    #[serde(default)]
    pub details: String,
}

/// Refresh the attempt from its download client and report progress.
pub async fn get_status(
    State(state): State<Arc<AppState>>,
    Path(attempt_id): Path<String>,
) -> Result<Json<AttemptProgress>, ApiError> {
    Ok(Json(state.service().get_download_status(&attempt_id).await?))
}

pub async fn blacklist(
    State(state): State<Arc<AppState>>,
    Path(attempt_id): Path<String>,
    body: Option<Json<BlacklistBody>>,
) -> Result<Json<BlacklistOutcome>, ApiError> {
    let Json(body) = body.unwrap_or_default();
    let outcome = state
        .service()
        .blacklist_release(&attempt_id, body.reason, &body.details)
        .await?;
    Ok(Json(outcome))
}

pub async fn delete_attempt(
    State(state): State<Arc<AppState>>,
    Path(attempt_id): Path<String>,
) -> Result<Json<DeleteOutcome>, ApiError> {
    Ok(Json(state.service().delete_attempt(&attempt_id).await?))
}

pub async fn convert(
    State(state): State<Arc<AppState>>,
    Path(attempt_id): Path<String>,
) -> Response {
    stage_response(state.service().convert_to_canonical(&attempt_id).await)
}

pub async fn organize(
    State(state): State<Arc<AppState>>,
    Path(attempt_id): Path<String>,
) -> Response {
    stage_response(state.service().organize_to_library(&attempt_id).await)
}
