//! Error types for the converter module.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur during conversion.
#[derive(Debug, Error)]
pub enum ConverterError {
    /// Converter binary not found.
    #[error("ebook-convert not found at: {path}")]
    NotFound { path: PathBuf },

    /// Input file not found.
    #[error("Input file not found: {path}")]
    InputNotFound { path: PathBuf },

    /// Output directory does not exist and could not be created.
    #[error("Failed to create output directory: {path}")]
    OutputDirectoryFailed { path: PathBuf },

    /// Converter exited with a non-zero status.
    #[error("Conversion failed: {reason}")]
    ConversionFailed {
        reason: String,
        /// Captured stderr, or stdout when stderr was empty.
        output: Option<String>,
    },

    /// Converter reported success but wrote nothing.
    #[error("Conversion produced no output file: {path}")]
    OutputMissing { path: PathBuf },

    /// Conversion timed out.
    #[error("Conversion timed out after {timeout_secs} seconds")]
    Timeout { timeout_secs: u64 },

    /// I/O error during conversion.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ConverterError {
    pub fn conversion_failed(reason: impl Into<String>, output: Option<String>) -> Self {
        Self::ConversionFailed {
            reason: reason.into(),
            output,
        }
    }

    /// Short machine-readable kind recorded on the attempt.
    pub fn error_type(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => "converter_not_found",
            Self::Timeout { .. } => "conversion_timeout",
            _ => "conversion_error",
        }
    }

    /// Whether this error is retryable.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Timeout { .. } | Self::Io(_))
    }
}
