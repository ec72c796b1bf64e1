//! Types for the post-processing pipeline.

use serde::Serialize;
use thiserror::Error;

use crate::attempt::AttemptError;
use crate::catalog::CatalogError;
use crate::converter::ConverterError;
use crate::error::ErrorKind;
use crate::organizer::OrganizerError;

use super::cover::CoverError;
use super::discovery::DiscoveryError;

/// Errors from a post-processing stage.
#[derive(Debug, Error)]
pub enum PostProcessError {
    #[error("Download attempt not found: {0}")]
    AttemptNotFound(String),

    #[error("Media not found: {0}")]
    MediaNotFound(String),

    #[error("No enabled processing configuration found")]
    ConfigurationMissing,

    #[error(transparent)]
    Discovery(#[from] DiscoveryError),

    #[error(transparent)]
    Converter(#[from] ConverterError),

    #[error(transparent)]
    Organizer(#[from] OrganizerError),

    #[error(transparent)]
    Cover(#[from] CoverError),

    #[error(transparent)]
    Store(#[from] AttemptError),

    #[error(transparent)]
    Catalog(#[from] CatalogError),
}

impl PostProcessError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            PostProcessError::AttemptNotFound(_) | PostProcessError::MediaNotFound(_) => {
                ErrorKind::NotFound
            }
            PostProcessError::ConfigurationMissing => ErrorKind::ConfigurationMissing,
            PostProcessError::Discovery(_) => ErrorKind::FileDiscovery,
            PostProcessError::Converter(_) => ErrorKind::Converter,
            PostProcessError::Organizer(_) | PostProcessError::Cover(_) => ErrorKind::FileOrganizer,
            PostProcessError::Store(_) | PostProcessError::Catalog(_) => ErrorKind::Storage,
        }
    }

    /// Whether running the stage again could succeed without changes.
    pub fn is_retryable(&self) -> bool {
        match self {
            PostProcessError::Converter(e) => e.is_retryable(),
            _ => false,
        }
    }

    /// Short machine-readable kind recorded on the attempt.
    pub fn error_type(&self) -> &'static str {
        match self {
            PostProcessError::Converter(e) => e.error_type(),
            PostProcessError::Discovery(_) => "file_discovery_error",
            PostProcessError::Organizer(_) | PostProcessError::Cover(_) => "file_organizer_error",
            other => other.kind().as_str(),
        }
    }
}

/// Result of a post-processing stage, as handed to callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StageOutcome {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<ErrorKind>,
    /// Output of the stage: the canonical file or the library location.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    /// Set on failures a plain rerun may fix, such as a converter timeout.
    pub retryable: bool,
}

impl StageOutcome {
    pub fn succeeded(message: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            success: true,
            message: Some(message.into()),
            error: None,
            kind: None,
            path: Some(path.into()),
            retryable: false,
        }
    }

    pub fn failed(error: &PostProcessError) -> Self {
        Self {
            success: false,
            message: None,
            error: Some(error.to_string()),
            kind: Some(error.kind()),
            path: None,
            retryable: error.is_retryable(),
        }
    }
}
