//! Moves the outputs of a finished synthesis run into the campaign archive
//! and pulls key metrics out of the tool's text reports.

mod summary;

pub use summary::{extract_summary, ReportParseError, SummaryPolicy};

use camino::{Utf8Path, Utf8PathBuf};
use fs_err as fs;
use synthflow_types::report::MetricsBlock;
use thiserror::Error;
use tracing::{debug, info, warn};

/// What to look for in a run directory and how to name the results.
#[derive(Debug, Clone)]
pub struct ArtifactPolicy {
    /// Extension of the output binary, e.g. `bit`.
    pub binary_ext: String,
    /// Globs (relative to the run directory) for report files worth keeping.
    pub report_globs: Vec<String>,
    pub summary: SummaryPolicy,
}

impl Default for ArtifactPolicy {
    fn default() -> Self {
        Self {
            binary_ext: "bit".to_string(),
            report_globs: vec![
                "**/*_utilization_placed.rpt".to_string(),
                "**/*_timing_summary_routed.rpt".to_string(),
            ],
            summary: SummaryPolicy::default(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ArtifactError {
    #[error("no *.{ext} produced under {run_dir}")]
    NoBinary { ext: String, run_dir: Utf8PathBuf },

    #[error("io error on {path}: {message}")]
    Io { path: Utf8PathBuf, message: String },
}

impl ArtifactError {
    fn io(path: &Utf8Path, e: std::io::Error) -> Self {
        ArtifactError::Io {
            path: path.to_path_buf(),
            message: e.to_string(),
        }
    }
}

/// Everything collected from one successful project run.
#[derive(Debug, Clone)]
pub struct CollectedArtifacts {
    /// Archived binary, named `<project>-<tag>.<ext>`.
    pub binary: Utf8PathBuf,
    pub reports: Vec<Utf8PathBuf>,
    pub metrics: Vec<MetricsBlock>,
    /// Parse degradations worth surfacing in the campaign report.
    pub notes: Vec<String>,
}

/// Collect everything from `run_dir` into `archive_dir`.
///
/// The full run directory is copied first for audit, then the first binary
/// match is relocated under its versioned name and the declared reports are
/// copied alongside. Summary extraction failures degrade the metrics but
/// never the collection itself; a missing binary is fatal.
pub fn collect(
    run_dir: &Utf8Path,
    archive_dir: &Utf8Path,
    project: &str,
    tag: &str,
    policy: &ArtifactPolicy,
) -> Result<CollectedArtifacts, ArtifactError> {
    fs::create_dir_all(archive_dir).map_err(|e| ArtifactError::io(archive_dir, e))?;

    let audit_dir = archive_dir.join(format!("{project}-{tag}.run"));
    copy_dir_recursive(run_dir, &audit_dir)?;
    debug!(%audit_dir, "archived run directory");

    let binary_src = first_match(run_dir, &format!("**/*.{}", policy.binary_ext)).ok_or_else(
        || ArtifactError::NoBinary {
            ext: policy.binary_ext.clone(),
            run_dir: run_dir.to_path_buf(),
        },
    )?;
    let binary = archive_dir.join(format!("{project}-{tag}.{}", policy.binary_ext));
    fs::copy(&binary_src, &binary).map_err(|e| ArtifactError::io(&binary_src, e))?;
    info!(src = %binary_src, dst = %binary, "relocated output binary");

    let mut reports = Vec::new();
    for pattern in &policy.report_globs {
        for src in all_matches(run_dir, pattern) {
            let file_name = src.file_name().unwrap_or("report.rpt");
            let dst = archive_dir.join(format!("{project}-{tag}.{file_name}"));
            fs::copy(&src, &dst).map_err(|e| ArtifactError::io(&src, e))?;
            reports.push(dst);
        }
    }

    let mut metrics = Vec::new();
    let mut notes = Vec::new();
    match extract_summary(run_dir, project, &policy.summary) {
        Ok(block) => metrics.push(block),
        Err(err) => {
            warn!(%project, %err, "summary extraction degraded");
            notes.push(format!("{project}: {err}"));
        }
    }

    Ok(CollectedArtifacts {
        binary,
        reports,
        metrics,
        notes,
    })
}

/// Deterministic first match of `pattern` relative to `root`.
pub(crate) fn first_match(root: &Utf8Path, pattern: &str) -> Option<Utf8PathBuf> {
    all_matches(root, pattern).into_iter().next()
}

pub(crate) fn all_matches(root: &Utf8Path, pattern: &str) -> Vec<Utf8PathBuf> {
    let full = root.join(pattern);
    let mut matches: Vec<Utf8PathBuf> = glob::glob(full.as_str())
        .ok()
        .into_iter()
        .flatten()
        .filter_map(|entry| entry.ok())
        .filter_map(|p| Utf8PathBuf::from_path_buf(p).ok())
        .filter(|p| p.is_file())
        .collect();
    matches.sort();
    matches
}

fn copy_dir_recursive(src: &Utf8Path, dst: &Utf8Path) -> Result<(), ArtifactError> {
    fs::create_dir_all(dst).map_err(|e| ArtifactError::io(dst, e))?;
    for entry in fs::read_dir(src).map_err(|e| ArtifactError::io(src, e))? {
        let entry = entry.map_err(|e| ArtifactError::io(src, e))?;
        let name = entry.file_name().to_string_lossy().to_string();
        let from = src.join(&name);
        let to = dst.join(&name);
        if from.is_dir() {
            copy_dir_recursive(&from, &to)?;
        } else {
            fs::copy(&from, &to).map_err(|e| ArtifactError::io(&from, e))?;
        }
    }
    Ok(())
}
