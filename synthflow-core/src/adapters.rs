//! Default shell and filesystem-backed port implementations.

use crate::ports::{GitPort, HostPort, LaunchPort, LaunchSpec, WritePort};
use anyhow::{bail, Context};
use camino::{Utf8Path, Utf8PathBuf};
use std::process::Command;
use std::str::FromStr;
use std::sync::Mutex;
use synthflow_domain::HistoryView;
use synthflow_types::version::VersionTag;
use tracing::{debug, info};

/// Git operations via the `git` binary against one clone.
///
/// Also implements [`HistoryView`], so the same adapter feeds both the
/// pipeline's repository mutations and the domain's fingerprint/tag lookups.
#[derive(Debug, Clone)]
pub struct ShellGitPort {
    repo: Utf8PathBuf,
}

impl ShellGitPort {
    pub fn new(repo: Utf8PathBuf) -> Self {
        Self { repo }
    }

    fn git(&self, args: &[&str]) -> anyhow::Result<String> {
        let output = Command::new("git")
            .args(args)
            .current_dir(&self.repo)
            .output()
            .with_context(|| format!("spawn git {:?} in {}", args, self.repo))?;
        if !output.status.success() {
            bail!(
                "git {:?} failed in {}: {}",
                args,
                self.repo,
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }
}

impl GitPort for ShellGitPort {
    fn resolve_ref(&self, reference: &str) -> anyhow::Result<Option<String>> {
        match self.git(&["rev-parse", "--verify", "--quiet", &format!("{reference}^{{commit}}")]) {
            Ok(sha) if !sha.is_empty() => Ok(Some(sha)),
            _ => Ok(None),
        }
    }

    fn fetch(&self) -> anyhow::Result<()> {
        self.git(&["fetch", "--tags", "--prune", "origin"])
            .map(|_| ())
            .context("fetch origin")
    }

    fn checkout(&self, reference: &str) -> anyhow::Result<()> {
        self.git(&["checkout", reference])
            .map(|_| ())
            .with_context(|| format!("checkout {reference}"))
    }

    fn reset_hard(&self, reference: &str) -> anyhow::Result<()> {
        self.git(&["reset", "--hard", reference])
            .map(|_| ())
            .with_context(|| format!("reset --hard {reference}"))
    }

    fn merge(&self, reference: &str) -> anyhow::Result<bool> {
        match self.git(&["merge", "--no-edit", reference]) {
            Ok(_) => Ok(true),
            Err(merge_err) => {
                debug!(%reference, error = %merge_err, "merge failed, aborting");
                self.git(&["merge", "--abort"])
                    .with_context(|| format!("abort conflicted merge of {reference}"))?;
                Ok(false)
            }
        }
    }

    fn head_sha(&self) -> anyhow::Result<String> {
        self.git(&["rev-parse", "HEAD"]).context("resolve HEAD")
    }

    fn create_annotated_tag(&self, name: &str, message: &str) -> anyhow::Result<()> {
        self.git(&["tag", "-a", name, "-m", message])
            .map(|_| ())
            .with_context(|| format!("create annotated tag {name}"))
    }
}

impl HistoryView for ShellGitPort {
    fn last_commit_touching(
        &self,
        rev: &str,
        paths: &[Utf8PathBuf],
    ) -> anyhow::Result<Option<String>> {
        let mut args = vec!["log", "-1", "--format=%H", rev, "--"];
        for p in paths {
            args.push(p.as_str());
        }
        let sha = self.git(&args)?;
        Ok(if sha.is_empty() { None } else { Some(sha) })
    }

    fn latest_tag(&self) -> anyhow::Result<Option<VersionTag>> {
        Ok(self.sorted_tags()?.into_iter().next())
    }

    fn latest_official_tag(&self) -> anyhow::Result<Option<VersionTag>> {
        Ok(self
            .sorted_tags()?
            .into_iter()
            .find(VersionTag::is_official))
    }
}

impl ShellGitPort {
    /// All parseable version tags, most recent first. Foreign tags are
    /// skipped rather than failing the lookup.
    fn sorted_tags(&self) -> anyhow::Result<Vec<VersionTag>> {
        let out = self.git(&[
            "for-each-ref",
            "--sort=-creatordate",
            "--format=%(refname:short)",
            "refs/tags",
        ])?;
        Ok(out
            .lines()
            .filter_map(|line| VersionTag::from_str(line.trim()).ok())
            .collect())
    }
}

/// Launches the synthesis tool as a blocking child process.
#[derive(Debug, Clone, Default)]
pub struct ProcessLauncher;

impl LaunchPort for ProcessLauncher {
    fn launch(&self, spec: &LaunchSpec) -> anyhow::Result<i32> {
        info!(program = %spec.program, cwd = %spec.cwd, "launching synthesis tool");
        let status = Command::new(&spec.program)
            .args(&spec.args)
            .current_dir(&spec.cwd)
            .status()
            .with_context(|| format!("spawn {} in {}", spec.program, spec.cwd))?;
        Ok(status.code().unwrap_or(-1))
    }
}

/// Filesystem write operations.
#[derive(Debug, Clone, Default)]
pub struct FsWritePort;

impl WritePort for FsWritePort {
    fn write_file(&self, path: &Utf8Path, contents: &[u8]) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("create parent dir for {}", path))?;
        }
        std::fs::write(path, contents).with_context(|| format!("write {}", path))
    }

    fn create_dir_all(&self, path: &Utf8Path) -> anyhow::Result<()> {
        std::fs::create_dir_all(path).with_context(|| format!("create_dir_all {}", path))
    }
}

/// Host adapter that only logs. Used when no host credentials are
/// configured, and as the base of dry runs.
#[derive(Debug, Clone, Default)]
pub struct LogHost;

impl HostPort for LogHost {
    fn post_note(&self, request_id: u64, body: &str) -> anyhow::Result<()> {
        info!(request_id, "note:\n{body}");
        Ok(())
    }

    fn approve(&self, request_id: u64) -> anyhow::Result<()> {
        info!(request_id, "approve");
        Ok(())
    }

    fn create_release(&self, tag: &str, description: &str) -> anyhow::Result<()> {
        info!(%tag, bytes = description.len(), "create release");
        Ok(())
    }
}

/// In-memory host for embedding and tests: records every interaction.
#[derive(Debug, Default)]
pub struct RecordingHost {
    pub notes: Mutex<Vec<(u64, String)>>,
    pub approvals: Mutex<Vec<u64>>,
    pub releases: Mutex<Vec<(String, String)>>,
}

impl RecordingHost {
    pub fn note_bodies(&self) -> Vec<String> {
        self.notes
            .lock()
            .map(|n| n.iter().map(|(_, b)| b.clone()).collect())
            .unwrap_or_default()
    }
}

impl HostPort for RecordingHost {
    fn post_note(&self, request_id: u64, body: &str) -> anyhow::Result<()> {
        if let Ok(mut notes) = self.notes.lock() {
            notes.push((request_id, body.to_string()));
        }
        Ok(())
    }

    fn approve(&self, request_id: u64) -> anyhow::Result<()> {
        if let Ok(mut approvals) = self.approvals.lock() {
            approvals.push(request_id);
        }
        Ok(())
    }

    fn create_release(&self, tag: &str, description: &str) -> anyhow::Result<()> {
        if let Ok(mut releases) = self.releases.lock() {
            releases.push((tag.to_string(), description.to_string()));
        }
        Ok(())
    }
}
