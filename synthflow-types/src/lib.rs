//! Shared DTOs (schemas-as-code) for the synthflow workspace.
//!
//! # Design constraints
//! - These types are intended to be serialized to disk (snapshots, reports).
//! - Be conservative with breaking changes.
//! - Prefer adding optional fields over changing semantics.

pub mod event;
pub mod observation;
pub mod project;
pub mod report;
pub mod snapshot;
pub mod version;

/// Schema identifiers.
pub mod schema {
    pub const SYNTHFLOW_RUN_V1: &str = "synthflow.run.v1";
    pub const SYNTHFLOW_REPORT_V1: &str = "synthflow.report.v1";
}
