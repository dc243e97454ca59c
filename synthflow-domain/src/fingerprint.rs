//! Project discovery and content fingerprints.
//!
//! A sub-project is a directory under the projects root that carries a
//! `list/` directory of declaration files. Each declaration line names one
//! path (first whitespace-separated token) the project depends on; `#`
//! comments and blank lines are ignored. The fingerprint of a project is the
//! id of the most recent history entry touching any declared path or the
//! project directory itself, so it is stable under no-op changes elsewhere
//! in the repository.

use camino::{Utf8Path, Utf8PathBuf};
use tracing::{debug, warn};

use crate::ports::{HistoryView, RepoView};

/// Name of the per-project declaration directory.
pub const DECL_DIR: &str = "list";

/// A discovered sub-project with its declared relevant-file set.
#[derive(Debug, Clone)]
pub struct ProjectDecl {
    /// Directory name, unique within a campaign.
    pub name: String,

    /// Project directory relative to the repository root.
    pub path: Utf8PathBuf,

    /// Declared paths relative to the repository root, plus the project
    /// directory itself.
    pub declared: Vec<Utf8PathBuf>,
}

/// Scan `projects_root` for buildable sub-projects.
///
/// A directory without a `list/` declaration directory is skipped with a
/// warning and never enters the to-do set.
pub fn discover_projects(
    repo: &dyn RepoView,
    projects_root: &Utf8Path,
) -> anyhow::Result<Vec<ProjectDecl>> {
    let mut projects = Vec::new();

    for name in repo.list_dir(projects_root)? {
        let path = projects_root.join(&name);
        if !repo.is_dir(&path) {
            continue;
        }

        let decl_dir = path.join(DECL_DIR);
        if !repo.is_dir(&decl_dir) {
            warn!(project = %name, "no {DECL_DIR}/ declaration directory, skipping");
            continue;
        }

        let mut declared = Vec::new();
        for file in repo.list_dir(&decl_dir)? {
            let decl_path = decl_dir.join(&file);
            if repo.is_dir(&decl_path) {
                continue;
            }
            let text = repo.read_to_string(&decl_path)?;
            declared.extend(parse_declaration(&path, &text));
        }
        // The project directory itself always counts as relevant.
        declared.push(path.clone());

        debug!(project = %name, files = declared.len(), "discovered project");
        projects.push(ProjectDecl {
            name,
            path,
            declared,
        });
    }

    Ok(projects)
}

/// Parse one declaration file: first token per line, `#` comments and blank
/// lines ignored. Tokens are resolved relative to the project directory.
fn parse_declaration(project_dir: &Utf8Path, text: &str) -> Vec<Utf8PathBuf> {
    let mut paths = Vec::new();
    for line in text.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        if let Some(token) = trimmed.split_whitespace().next() {
            paths.push(project_dir.join(token));
        }
    }
    paths
}

/// Computes per-project fingerprints against a revision.
pub struct Fingerprinter<'a> {
    history: &'a dyn HistoryView,
}

impl<'a> Fingerprinter<'a> {
    pub fn new(history: &'a dyn HistoryView) -> Self {
        Self { history }
    }

    /// Fingerprint of `project` at `rev`: identical declared content yields
    /// an identical value, any touching change yields a different one.
    /// `None` means no history entry ever touched the declared set.
    pub fn fingerprint(
        &self,
        rev: &str,
        project: &ProjectDecl,
    ) -> anyhow::Result<Option<String>> {
        self.history.last_commit_touching(rev, &project.declared)
    }
}
