//! Acquisition service: the operations the rest of the application calls.
//!
//! Each operation loads what it needs by id, delegates to the component that
//! owns the behavior, and folds component errors into [`CoreError`].
//! Post-processing stages report through [`StageOutcome`] instead.
//!
//! [`StageOutcome`]: crate::processor::StageOutcome

mod acquisition;

pub use acquisition::{
    AcquisitionService, AddedMedia, ConnectionReport, ExternalRef, ExternalStatus, KindStatus,
    ServiceCheck,
};
