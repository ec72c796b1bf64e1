//! Error taxonomy at the service boundary.
//!
//! Every module keeps its own error enum; they all fold into [`CoreError`],
//! whose [`ErrorKind`] is what callers branch on.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::attempt::AttemptError;
use crate::catalog::CatalogError;
use crate::download_client::DownloadClientError;
use crate::indexer::IndexerError;
use crate::metadata::MetadataError;
use crate::orchestrator::DownloadError;
use crate::processor::PostProcessError;
use crate::reconciler::ReconcileError;
use crate::search::SearchError;

/// Category of a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Validation,
    NotFound,
    ActiveDownloadExists,
    RemoteAuth,
    RemoteTimeout,
    RemoteProtocol,
    FileDiscovery,
    Converter,
    FileOrganizer,
    ConfigurationMissing,
    Storage,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Validation => "validation",
            ErrorKind::NotFound => "not_found",
            ErrorKind::ActiveDownloadExists => "active_download_exists",
            ErrorKind::RemoteAuth => "remote_auth",
            ErrorKind::RemoteTimeout => "remote_timeout",
            ErrorKind::RemoteProtocol => "remote_protocol",
            ErrorKind::FileDiscovery => "file_discovery",
            ErrorKind::Converter => "converter",
            ErrorKind::FileOrganizer => "file_organizer",
            ErrorKind::ConfigurationMissing => "configuration_missing",
            ErrorKind::Storage => "storage",
        }
    }
}

/// Errors surfaced by the acquisition service.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    ActiveDownloadExists(String),

    #[error("{0}")]
    RemoteAuth(String),

    #[error("{0}")]
    RemoteTimeout(String),

    #[error("{0}")]
    RemoteProtocol(String),

    #[error("{0}")]
    FileDiscovery(String),

    #[error("{0}")]
    Converter(String),

    #[error("{0}")]
    FileOrganizer(String),

    #[error("{0}")]
    ConfigurationMissing(String),

    #[error("{0}")]
    Storage(String),
}

impl CoreError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        let message = message.into();
        match kind {
            ErrorKind::Validation => CoreError::Validation(message),
            ErrorKind::NotFound => CoreError::NotFound(message),
            ErrorKind::ActiveDownloadExists => CoreError::ActiveDownloadExists(message),
            ErrorKind::RemoteAuth => CoreError::RemoteAuth(message),
            ErrorKind::RemoteTimeout => CoreError::RemoteTimeout(message),
            ErrorKind::RemoteProtocol => CoreError::RemoteProtocol(message),
            ErrorKind::FileDiscovery => CoreError::FileDiscovery(message),
            ErrorKind::Converter => CoreError::Converter(message),
            ErrorKind::FileOrganizer => CoreError::FileOrganizer(message),
            ErrorKind::ConfigurationMissing => CoreError::ConfigurationMissing(message),
            ErrorKind::Storage => CoreError::Storage(message),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            CoreError::Validation(_) => ErrorKind::Validation,
            CoreError::NotFound(_) => ErrorKind::NotFound,
            CoreError::ActiveDownloadExists(_) => ErrorKind::ActiveDownloadExists,
            CoreError::RemoteAuth(_) => ErrorKind::RemoteAuth,
            CoreError::RemoteTimeout(_) => ErrorKind::RemoteTimeout,
            CoreError::RemoteProtocol(_) => ErrorKind::RemoteProtocol,
            CoreError::FileDiscovery(_) => ErrorKind::FileDiscovery,
            CoreError::Converter(_) => ErrorKind::Converter,
            CoreError::FileOrganizer(_) => ErrorKind::FileOrganizer,
            CoreError::ConfigurationMissing(_) => ErrorKind::ConfigurationMissing,
            CoreError::Storage(_) => ErrorKind::Storage,
        }
    }
}

pub(crate) fn indexer_kind(e: &IndexerError) -> ErrorKind {
    match e {
        IndexerError::Auth => ErrorKind::RemoteAuth,
        IndexerError::Timeout(_) => ErrorKind::RemoteTimeout,
        _ => ErrorKind::RemoteProtocol,
    }
}

pub(crate) fn download_client_kind(e: &DownloadClientError) -> ErrorKind {
    match e {
        DownloadClientError::AuthenticationFailed => ErrorKind::RemoteAuth,
        DownloadClientError::Timeout => ErrorKind::RemoteTimeout,
        _ => ErrorKind::RemoteProtocol,
    }
}

fn download_kind(e: &DownloadError) -> ErrorKind {
    match e {
        DownloadError::ActiveDownloadExists(_) => ErrorKind::ActiveDownloadExists,
        DownloadError::ConfigurationMissing(_) => ErrorKind::ConfigurationMissing,
        DownloadError::Validation(_) | DownloadError::UnsupportedProtocol { .. } => {
            ErrorKind::Validation
        }
        DownloadError::UrlResolution(_) => ErrorKind::RemoteProtocol,
        DownloadError::Indexer(e) => indexer_kind(e),
        DownloadError::DownloadClient(e) => download_client_kind(e),
        DownloadError::NotFound(_) => ErrorKind::NotFound,
        DownloadError::InitiationFailed { source, .. } => download_kind(source),
        DownloadError::Store(AttemptError::ActiveExists(_)) => ErrorKind::ActiveDownloadExists,
        DownloadError::Store(_) | DownloadError::Catalog(_) => ErrorKind::Storage,
    }
}

impl From<IndexerError> for CoreError {
    fn from(e: IndexerError) -> Self {
        CoreError::new(indexer_kind(&e), e.to_string())
    }
}

impl From<DownloadClientError> for CoreError {
    fn from(e: DownloadClientError) -> Self {
        CoreError::new(download_client_kind(&e), e.to_string())
    }
}

impl From<DownloadError> for CoreError {
    fn from(e: DownloadError) -> Self {
        CoreError::new(download_kind(&e), e.to_string())
    }
}

impl From<AttemptError> for CoreError {
    fn from(e: AttemptError) -> Self {
        let kind = match &e {
            AttemptError::NotFound(_) => ErrorKind::NotFound,
            AttemptError::ActiveExists(_) => ErrorKind::ActiveDownloadExists,
            _ => ErrorKind::Storage,
        };
        CoreError::new(kind, e.to_string())
    }
}

impl From<CatalogError> for CoreError {
    fn from(e: CatalogError) -> Self {
        let kind = match &e {
            CatalogError::NotFound(_) => ErrorKind::NotFound,
            CatalogError::AlreadyExists(_) => ErrorKind::Validation,
            _ => ErrorKind::Storage,
        };
        CoreError::new(kind, e.to_string())
    }
}

impl From<MetadataError> for CoreError {
    fn from(e: MetadataError) -> Self {
        let kind = match &e {
            MetadataError::Timeout(_) => ErrorKind::RemoteTimeout,
            MetadataError::NotFound(_) => ErrorKind::NotFound,
            _ => ErrorKind::RemoteProtocol,
        };
        CoreError::new(kind, e.to_string())
    }
}

impl From<SearchError> for CoreError {
    fn from(e: SearchError) -> Self {
        let kind = match &e {
            SearchError::AllQueriesFailed { .. } => ErrorKind::RemoteProtocol,
            SearchError::Store(_) => ErrorKind::Storage,
        };
        CoreError::new(kind, e.to_string())
    }
}

impl From<ReconcileError> for CoreError {
    fn from(e: ReconcileError) -> Self {
        let kind = match &e {
            ReconcileError::NotFound(_) => ErrorKind::NotFound,
            _ => ErrorKind::Storage,
        };
        CoreError::new(kind, e.to_string())
    }
}

impl From<PostProcessError> for CoreError {
    fn from(e: PostProcessError) -> Self {
        CoreError::new(e.kind(), e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initiation_failure_keeps_source_kind() {
        let e = DownloadError::InitiationFailed {
            attempt_id: "a1".into(),
            source: Box::new(DownloadError::DownloadClient(DownloadClientError::Timeout)),
        };

        let core: CoreError = e.into();

        assert_eq!(core.kind(), ErrorKind::RemoteTimeout);
        assert!(core.to_string().starts_with("Failed to initiate download"));
    }

    #[test]
    fn test_remote_kinds() {
        assert_eq!(CoreError::from(IndexerError::Auth).kind(), ErrorKind::RemoteAuth);
        assert_eq!(
            CoreError::from(IndexerError::Server {
                status: 502,
                message: "bad gateway".into()
            })
            .kind(),
            ErrorKind::RemoteProtocol
        );
        assert_eq!(
            CoreError::from(DownloadClientError::AuthenticationFailed).kind(),
            ErrorKind::RemoteAuth
        );
        assert_eq!(
            CoreError::from(MetadataError::Timeout(10)).kind(),
            ErrorKind::RemoteTimeout
        );
    }

    #[test]
    fn test_kind_round_trip() {
        for kind in [
            ErrorKind::Validation,
            ErrorKind::NotFound,
            ErrorKind::ActiveDownloadExists,
            ErrorKind::Storage,
            ErrorKind::Converter,
        ] {
            assert_eq!(CoreError::new(kind, "x").kind(), kind);
        }
    }
}
