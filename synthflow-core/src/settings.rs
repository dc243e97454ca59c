//! Clap-free settings for a build campaign.
//!
//! Everything configurable lives here and is injected per campaign; there
//! is no global mutable configuration.

use crate::lock::LockOptions;
use camino::Utf8PathBuf;
use synthflow_artifacts::ArtifactPolicy;
use synthflow_monitor::MonitorConfig;

#[derive(Debug, Clone)]
pub struct CampaignSettings {
    /// Clone the campaign mutates (fetch, reset, merge, tag).
    pub repo_root: Utf8PathBuf,

    /// Working area: lock marker, snapshots and status documents live here.
    pub revision_root: Utf8PathBuf,

    /// Archive area for relocated binaries and reports.
    pub archive_root: Utf8PathBuf,

    /// Directory under `repo_root` holding the buildable sub-projects.
    pub projects_dir: Utf8PathBuf,

    /// Branch trial builds must target, e.g. `master`.
    pub protected_branch: String,

    /// Author identity of the automation itself; its own pushes never
    /// trigger campaigns.
    pub automation_user: String,

    /// Synthesis tool invocation, run from each project directory.
    pub synth_program: String,
    pub synth_args: Vec<String>,

    /// Flag appended to `synth_args` when the event requests a build
    /// without embedded timestamps.
    pub no_timestamp_flag: String,

    /// Run directory (markers, logs) relative to each project directory.
    pub run_subdir: Utf8PathBuf,

    pub lock: LockOptions,
    pub monitor: MonitorConfig,
    pub artifacts: ArtifactPolicy,
}

impl Default for CampaignSettings {
    fn default() -> Self {
        Self {
            repo_root: Utf8PathBuf::from("repo"),
            revision_root: Utf8PathBuf::from("work"),
            archive_root: Utf8PathBuf::from("archive"),
            projects_dir: Utf8PathBuf::from("projects"),
            protected_branch: "master".to_string(),
            automation_user: "synthflow".to_string(),
            synth_program: "./synthesize.sh".to_string(),
            synth_args: Vec::new(),
            no_timestamp_flag: "--no-timestamp".to_string(),
            run_subdir: Utf8PathBuf::from("build/runs"),
            lock: LockOptions::default(),
            monitor: MonitorConfig::default(),
            artifacts: ArtifactPolicy::default(),
        }
    }
}
