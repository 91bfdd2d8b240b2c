//! Core domain model types for screenflow.
//!
//! This module contains the fundamental types used throughout the crate:
//! - Records and the artifacts that hold them
//! - Stage status and kind enums
//! - Per-stage run reports

mod artifact;
mod record;
mod report;
mod status;

pub use artifact::Artifact;
pub use record::{
    Record, DATA_STATUS_FIELD, DATA_STATUS_MISSING, MISSING_REASON_FIELD, SYMBOL_FIELD,
};
pub use report::StageReport;
pub use status::{StageKind, StageStatus};
