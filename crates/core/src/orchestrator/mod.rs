//! Download orchestration.
//!
//! Turns a chosen search result into a tracked download attempt:
//! - **Initiation**: enforce one active attempt per media, resolve the URL, submit
//! - **Submission**: straight to a download client, or pushed by the indexer
//! - **Cleanup**: delete attempts with best-effort remote and file cleanup, blacklist releases

mod download;
mod resolve;
mod submitter;
mod types;

pub use download::DownloadOrchestrator;
pub use resolve::resolve_download_url;
pub use submitter::{DirectSubmitter, IndexerSubmitter, Submission, Submitter};
pub use types::{BlacklistOutcome, DeleteOutcome, DownloadError};
