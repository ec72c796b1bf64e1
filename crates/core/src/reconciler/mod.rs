//! Status reconciliation between download attempts and download clients.

mod refresh;

pub use refresh::{AttemptProgress, ReconcileError, StatusReconciler};
