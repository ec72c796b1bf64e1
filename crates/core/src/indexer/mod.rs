//! Indexer aggregator clients.

mod prowlarr;
mod types;

pub use prowlarr::ProwlarrClient;
pub use types::*;
