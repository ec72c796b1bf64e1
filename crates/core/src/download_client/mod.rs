//! Download client abstraction and implementations.

mod registry;
mod sabnzbd;
mod types;

pub use registry::DownloadClients;
pub use sabnzbd::{HttpDownloadClientFactory, SabnzbdClient};
pub use types::*;
