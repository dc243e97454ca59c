//! Embeddable orchestration core for synthflow.
//!
//! Provides a clap-free, I/O-abstracted campaign pipeline suitable for
//! driving from the CLI or from another host process.
//!
//! # Port traits
//!
//! All external collaborators sit behind port traits in [`ports`]:
//! - [`GitPort`](ports::GitPort) — repository mutation and tag creation
//! - [`HostPort`](ports::HostPort) — notes, approvals and releases on the
//!   merge-request host
//! - [`LaunchPort`](ports::LaunchPort) — blocking launch of the external
//!   synthesis tool
//! - [`WritePort`](ports::WritePort) — file writes into the archive
//!
//! The [`adapters`] module provides shell/filesystem-backed defaults.
//!
//! # Entry points
//!
//! - [`WorkflowRun`](pipeline::WorkflowRun) — prepare → build → finalize
//! - [`promote`](pipeline::promote) — merge-time promotion of a trial tag

pub mod adapters;
pub mod lock;
pub mod pipeline;
pub mod ports;
pub mod settings;
pub mod snapshot;

// Re-export the domain views so callers don't need synthflow-domain directly.
pub use synthflow_domain::{FsRepoView, HistoryView, RepoView};
