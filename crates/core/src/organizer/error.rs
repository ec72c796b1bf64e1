//! Error types for the organizer module.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while organizing files into the library.
#[derive(Debug, Error)]
pub enum OrganizerError {
    /// Source file or directory not found.
    #[error("Source not found: {path}")]
    SourceNotFound { path: PathBuf },

    /// Failed to create a library directory.
    #[error("Failed to create directory: {path}")]
    DirectoryCreationFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Failed to copy file.
    #[error("Failed to copy file from {source} to {destination}")]
    CopyFailed {
        source: PathBuf,
        destination: PathBuf,
        #[source]
        error: std::io::Error,
    },

    /// The copy does not match the source.
    #[error("Checksum mismatch for {path}: expected {expected}, got {actual}")]
    ChecksumMismatch {
        path: PathBuf,
        expected: String,
        actual: String,
    },

    /// A directory source held no audio files.
    #[error("No audio files copied from {path}")]
    NoAudioFiles { path: PathBuf },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl OrganizerError {
    pub fn copy_failed(source: PathBuf, destination: PathBuf, error: std::io::Error) -> Self {
        Self::CopyFailed {
            source,
            destination,
            error,
        }
    }
}
