//! Post-processing: locate the finished download, convert it to EPUB and
//! organize it into the library with cover and OPF sidecars.

mod cover;
mod discovery;
mod metadata;
mod pipeline;
mod types;

pub use cover::{CoverError, CoverFetcher};
pub use discovery::{discover, DiscoveryError};
pub use metadata::{display_author, render_opf, write_opf};
pub use pipeline::PostProcessor;
pub use types::{PostProcessError, StageOutcome};
