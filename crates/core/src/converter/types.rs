//! Types for ebook conversion.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Extension of the canonical ebook format, lowercase without the dot.
pub const CANONICAL_EXTENSION: &str = "epub";

/// Whether a file is already in the canonical format.
pub fn is_canonical(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case(CANONICAL_EXTENSION))
        .unwrap_or(false)
}

/// Path of the canonical output for an input, next to the input.
pub fn canonical_output_path(input: &Path) -> PathBuf {
    input.with_extension(CANONICAL_EXTENSION)
}

/// A single conversion request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversionJob {
    /// Usually the attempt id.
    pub job_id: String,
    pub input_path: PathBuf,
    pub output_path: PathBuf,
}

/// Result of a successful conversion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversionResult {
    pub job_id: String,
    pub output_path: PathBuf,
    pub output_size_bytes: u64,
    pub duration_ms: u64,
}
