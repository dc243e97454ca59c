//! Domain logic: decide *what* to build and *which* version it becomes.
//!
//! This crate owns change detection (fingerprints and the to-do set) and the
//! version allocation state machine. It does not own *how* builds run; that's
//! the `synthflow-core` pipeline. All repository access goes through the
//! read-only port traits in [`ports`] so everything here is testable against
//! in-memory implementations.

mod changeset;
mod fingerprint;
mod ports;
mod version;

pub use changeset::{ChangeSet, FingerprintMap};
pub use fingerprint::{discover_projects, Fingerprinter, ProjectDecl, DECL_DIR};
pub use ports::{FsRepoView, HistoryView, MemHistoryView, RepoView};
pub use version::VersionAllocator;
