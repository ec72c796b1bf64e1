//! HTTP adapter for the tomehound acquisition service.

pub mod api;
pub mod metrics;
pub mod state;
