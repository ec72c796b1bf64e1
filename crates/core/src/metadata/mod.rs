//! Bibliographic metadata providers used to describe wanted media.

mod openlibrary;
mod registry;
mod types;

pub use openlibrary::OpenLibraryClient;
pub use registry::MetadataProviders;
pub use types::*;
