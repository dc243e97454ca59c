//! Port traits abstracting all external collaborators away from the
//! pipeline: the repository, the merge-request host, the synthesis tool and
//! the archive filesystem.

use camino::{Utf8Path, Utf8PathBuf};

/// Repository mutation and tag creation for one campaign's clone.
pub trait GitPort {
    /// Full id of `reference`, `None` when it cannot be resolved.
    fn resolve_ref(&self, reference: &str) -> anyhow::Result<Option<String>>;

    fn fetch(&self) -> anyhow::Result<()>;

    fn checkout(&self, reference: &str) -> anyhow::Result<()>;

    /// Discard every local change, settle on `reference`.
    fn reset_hard(&self, reference: &str) -> anyhow::Result<()>;

    /// Merge `reference` into the current branch. `Ok(false)` means the
    /// merge conflicted and was aborted; the working tree is clean again.
    fn merge(&self, reference: &str) -> anyhow::Result<bool>;

    fn head_sha(&self) -> anyhow::Result<String>;

    /// Annotated, never lightweight: annotated tags take precedence when
    /// several tags point at one commit, which the allocator's history
    /// lookup relies on.
    fn create_annotated_tag(&self, name: &str, message: &str) -> anyhow::Result<()>;
}

/// Outbound surface of the merge-request host.
pub trait HostPort {
    /// Post a textual note against the request.
    fn post_note(&self, request_id: u64, body: &str) -> anyhow::Result<()>;

    fn approve(&self, request_id: u64) -> anyhow::Result<()>;

    /// Publish a release entry for an official tag.
    fn create_release(&self, tag: &str, description: &str) -> anyhow::Result<()>;
}

/// One blocking invocation of the external synthesis tool.
#[derive(Debug, Clone)]
pub struct LaunchSpec {
    pub program: String,
    pub args: Vec<String>,
    pub cwd: Utf8PathBuf,
}

pub trait LaunchPort {
    /// Start the tool and wait for it to exit; `Ok` carries the exit code.
    fn launch(&self, spec: &LaunchSpec) -> anyhow::Result<i32>;
}

/// File-system write operations into the archive and working areas.
pub trait WritePort {
    fn write_file(&self, path: &Utf8Path, contents: &[u8]) -> anyhow::Result<()>;
    fn create_dir_all(&self, path: &Utf8Path) -> anyhow::Result<()>;
}
