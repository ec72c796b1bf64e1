//! Release repository: download attempts and the per-media blacklist.

mod sqlite_store;
mod store;
mod types;

pub use sqlite_store::SqliteAttemptStore;
pub use store::{AttemptError, AttemptStore};
pub use types::{
    AttemptStatus, BlacklistEntry, BlacklistReason, DownloadAttempt, NewAttempt,
    NewBlacklistEntry, PostProcessStatus,
};
