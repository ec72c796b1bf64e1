//! Mapping from core errors to HTTP responses.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use tomehound_core::{CoreError, ErrorKind, StageOutcome};

/// Error body returned by every API route.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub kind: ErrorKind,
}

/// A [`CoreError`] on its way out of a handler.
#[derive(Debug)]
pub struct ApiError(pub CoreError);

impl From<CoreError> for ApiError {
    fn from(e: CoreError) -> Self {
        ApiError(e)
    }
}

/// HTTP status for an error kind.
pub fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::Validation => StatusCode::BAD_REQUEST,
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::ActiveDownloadExists => StatusCode::CONFLICT,
        ErrorKind::RemoteAuth | ErrorKind::RemoteProtocol => StatusCode::BAD_GATEWAY,
        ErrorKind::RemoteTimeout => StatusCode::GATEWAY_TIMEOUT,
        ErrorKind::FileDiscovery
        | ErrorKind::Converter
        | ErrorKind::FileOrganizer
        | ErrorKind::ConfigurationMissing
        | ErrorKind::Storage => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let kind = self.0.kind();
        let status = status_for(kind);
        if status.is_server_error() {
            tracing::error!(kind = kind.as_str(), error = %self.0, "Request failed");
        }
        (
            status,
            Json(ErrorResponse {
                error: self.0.to_string(),
                kind,
            }),
        )
            .into_response()
    }
}

/// Stage outcomes keep their payload; only the status code changes on failure.
pub fn stage_response(outcome: StageOutcome) -> Response {
    let status = match outcome.kind {
        Some(kind) if !outcome.success => status_for(kind),
        _ => StatusCode::OK,
    };
    (status, Json(outcome)).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(status_for(ErrorKind::Validation), StatusCode::BAD_REQUEST);
        assert_eq!(status_for(ErrorKind::NotFound), StatusCode::NOT_FOUND);
        assert_eq!(
            status_for(ErrorKind::ActiveDownloadExists),
            StatusCode::CONFLICT
        );
        assert_eq!(status_for(ErrorKind::RemoteAuth), StatusCode::BAD_GATEWAY);
        assert_eq!(
            status_for(ErrorKind::RemoteTimeout),
            StatusCode::GATEWAY_TIMEOUT
        );
        assert_eq!(
            status_for(ErrorKind::Storage),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
