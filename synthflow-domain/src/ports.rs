//! Read-only repository and history access.
//!
//! synthflow-domain uses these so it can be tested against in-memory
//! implementations; the shell-backed history adapter lives in
//! `synthflow-core`.

use std::collections::BTreeMap;

use anyhow::Context;
use camino::{Utf8Path, Utf8PathBuf};
use fs_err as fs;
use synthflow_types::version::VersionTag;

/// Read-only view of a checked-out repository.
pub trait RepoView {
    fn root(&self) -> &Utf8Path;

    fn read_to_string(&self, rel: &Utf8Path) -> anyhow::Result<String>;

    fn exists(&self, rel: &Utf8Path) -> bool;

    fn is_dir(&self, rel: &Utf8Path) -> bool;

    /// Entry names of a directory, sorted for deterministic iteration.
    fn list_dir(&self, rel: &Utf8Path) -> anyhow::Result<Vec<String>>;
}

/// Read-only view of revision history and tag history.
pub trait HistoryView {
    /// Abbreviated id of the most recent history entry at `rev` that touched
    /// any of `paths`; `None` when no entry ever touched them.
    fn last_commit_touching(
        &self,
        rev: &str,
        paths: &[Utf8PathBuf],
    ) -> anyhow::Result<Option<String>>;

    /// The most recent tag of any kind.
    fn latest_tag(&self) -> anyhow::Result<Option<VersionTag>>;

    /// The most recent official (non-provisional) tag.
    fn latest_official_tag(&self) -> anyhow::Result<Option<VersionTag>>;
}

/// File-system backed `RepoView`.
#[derive(Debug, Clone)]
pub struct FsRepoView {
    root: Utf8PathBuf,
}

impl FsRepoView {
    pub fn new(root: Utf8PathBuf) -> Self {
        Self { root }
    }

    fn abs(&self, rel: &Utf8Path) -> Utf8PathBuf {
        if rel.is_absolute() {
            rel.to_path_buf()
        } else {
            self.root.join(rel)
        }
    }
}

impl RepoView for FsRepoView {
    fn root(&self) -> &Utf8Path {
        &self.root
    }

    fn read_to_string(&self, rel: &Utf8Path) -> anyhow::Result<String> {
        let abs = self.abs(rel);
        fs::read_to_string(&abs).with_context(|| format!("read {}", abs))
    }

    fn exists(&self, rel: &Utf8Path) -> bool {
        self.abs(rel).exists()
    }

    fn is_dir(&self, rel: &Utf8Path) -> bool {
        self.abs(rel).is_dir()
    }

    fn list_dir(&self, rel: &Utf8Path) -> anyhow::Result<Vec<String>> {
        let abs = self.abs(rel);
        let mut names = Vec::new();
        for entry in fs::read_dir(&abs).with_context(|| format!("list {}", abs))? {
            let entry = entry.with_context(|| format!("list {}", abs))?;
            names.push(entry.file_name().to_string_lossy().to_string());
        }
        names.sort();
        Ok(names)
    }
}

/// In-memory `HistoryView` for tests and embedding.
///
/// `touched` maps a revision name to `(path prefix, commit id)` pairs; a
/// lookup returns the first pair whose prefix matches any queried path.
#[derive(Debug, Clone, Default)]
pub struct MemHistoryView {
    pub touched: BTreeMap<String, Vec<(Utf8PathBuf, String)>>,
    pub tags: Vec<VersionTag>,
}

impl MemHistoryView {
    pub fn record_touch(&mut self, rev: &str, path: impl Into<Utf8PathBuf>, commit: &str) {
        self.touched
            .entry(rev.to_string())
            .or_default()
            .push((path.into(), commit.to_string()));
    }
}

impl HistoryView for MemHistoryView {
    fn last_commit_touching(
        &self,
        rev: &str,
        paths: &[Utf8PathBuf],
    ) -> anyhow::Result<Option<String>> {
        let Some(entries) = self.touched.get(rev) else {
            return Ok(None);
        };
        for (prefix, commit) in entries {
            if paths.iter().any(|p| p.as_str().starts_with(prefix.as_str())) {
                return Ok(Some(commit.clone()));
            }
        }
        Ok(None)
    }

    fn latest_tag(&self) -> anyhow::Result<Option<VersionTag>> {
        Ok(self.tags.last().cloned())
    }

    fn latest_official_tag(&self) -> anyhow::Result<Option<VersionTag>> {
        Ok(self.tags.iter().rev().find(|t| t.is_official()).cloned())
    }
}
