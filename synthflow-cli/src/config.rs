//! Configuration file loading for synthflow.
//!
//! Discovers and loads `synthflow.toml` from the working directory (or an
//! explicit `--config` path) and turns it into [`CampaignSettings`]. CLI
//! arguments take precedence over file settings.

use anyhow::Context;
use camino::{Utf8Path, Utf8PathBuf};
use fs_err as fs;
use serde::Deserialize;
use std::time::Duration;
use synthflow_core::lock::LockOptions;
use synthflow_core::settings::CampaignSettings;
use synthflow_monitor::{MarkerNames, MonitorConfig};
use tracing::debug;

/// The config file name to search for.
pub const CONFIG_FILE_NAME: &str = "synthflow.toml";

/// Top-level configuration from synthflow.toml.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SynthflowConfig {
    pub paths: PathsConfig,
    pub host: HostConfig,
    pub tool: ToolConfig,
    pub lock: LockConfig,
    pub monitor: MonitorSection,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    pub repo_root: Utf8PathBuf,
    pub revision_root: Utf8PathBuf,
    pub archive_root: Utf8PathBuf,
    pub projects_dir: Utf8PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        let defaults = CampaignSettings::default();
        Self {
            repo_root: defaults.repo_root,
            revision_root: defaults.revision_root,
            archive_root: defaults.archive_root,
            projects_dir: defaults.projects_dir,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HostConfig {
    /// Branch trial builds must target.
    pub protected_branch: String,
    /// The automation's own author identity.
    pub automation_user: String,
}

impl Default for HostConfig {
    fn default() -> Self {
        let defaults = CampaignSettings::default();
        Self {
            protected_branch: defaults.protected_branch,
            automation_user: defaults.automation_user,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ToolConfig {
    pub program: String,
    pub args: Vec<String>,
    pub no_timestamp_flag: String,
    /// Run directory relative to each project directory.
    pub run_subdir: Utf8PathBuf,
}

impl Default for ToolConfig {
    fn default() -> Self {
        let defaults = CampaignSettings::default();
        Self {
            program: defaults.synth_program,
            args: defaults.synth_args,
            no_timestamp_flag: defaults.no_timestamp_flag,
            run_subdir: defaults.run_subdir,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LockConfig {
    pub interval_secs: u64,
    pub timeout_secs: u64,
}

impl Default for LockConfig {
    fn default() -> Self {
        let defaults = LockOptions::default();
        Self {
            interval_secs: defaults.interval.as_secs(),
            timeout_secs: defaults.timeout.as_secs(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MonitorSection {
    pub interval_secs: u64,
    pub retry_budget: u32,
}

impl Default for MonitorSection {
    fn default() -> Self {
        let defaults = MonitorConfig::default();
        Self {
            interval_secs: defaults.interval.as_secs(),
            retry_budget: defaults.retry_budget,
        }
    }
}

impl SynthflowConfig {
    /// Turn the file config into runtime settings. `force_lock` comes from
    /// the CLI only; it is deliberately not a file setting.
    pub fn into_settings(self, force_lock: bool) -> CampaignSettings {
        CampaignSettings {
            repo_root: self.paths.repo_root,
            revision_root: self.paths.revision_root,
            archive_root: self.paths.archive_root,
            projects_dir: self.paths.projects_dir,
            protected_branch: self.host.protected_branch,
            automation_user: self.host.automation_user,
            synth_program: self.tool.program,
            synth_args: self.tool.args,
            no_timestamp_flag: self.tool.no_timestamp_flag,
            run_subdir: self.tool.run_subdir,
            lock: LockOptions {
                interval: Duration::from_secs(self.lock.interval_secs),
                timeout: Duration::from_secs(self.lock.timeout_secs),
                force: force_lock,
            },
            monitor: MonitorConfig {
                interval: Duration::from_secs(self.monitor.interval_secs),
                retry_budget: self.monitor.retry_budget,
                names: MarkerNames::default(),
            },
            artifacts: Default::default(),
        }
    }
}

/// Load and parse a synthflow.toml config file.
pub fn load_config(path: &Utf8Path) -> anyhow::Result<SynthflowConfig> {
    let contents =
        fs::read_to_string(path).with_context(|| format!("read config file {}", path))?;
    parse_config(&contents).with_context(|| format!("parse config file {}", path))
}

pub fn parse_config(contents: &str) -> anyhow::Result<SynthflowConfig> {
    let config: SynthflowConfig = toml::from_str(contents).context("invalid TOML")?;
    Ok(config)
}

/// Load config from `explicit` if given, else from `./synthflow.toml` if it
/// exists, else defaults.
pub fn load_or_default(explicit: Option<&Utf8Path>) -> anyhow::Result<SynthflowConfig> {
    if let Some(path) = explicit {
        return load_config(path);
    }
    let local = Utf8PathBuf::from(CONFIG_FILE_NAME);
    if local.exists() {
        debug!("found config file at {}", local);
        load_config(&local)
    } else {
        debug!("no config file found, using defaults");
        Ok(SynthflowConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn empty_config_yields_defaults() {
        let config = parse_config("").expect("parse");
        let settings = config.into_settings(false);
        assert_eq!(settings.protected_branch, "master");
        assert_eq!(settings.monitor.retry_budget, 20);
        assert!(!settings.lock.force);
    }

    #[test]
    fn sections_override_defaults() {
        let config = parse_config(
            r#"
[paths]
repo_root = "/srv/fw/repo"

[host]
protected_branch = "main"

[tool]
program = "vivado_wrapper.sh"
args = ["-batch"]

[monitor]
interval_secs = 5
retry_budget = 8
"#,
        )
        .expect("parse");
        let settings = config.into_settings(true);
        assert_eq!(settings.repo_root, Utf8PathBuf::from("/srv/fw/repo"));
        assert_eq!(settings.protected_branch, "main");
        assert_eq!(settings.synth_program, "vivado_wrapper.sh");
        assert_eq!(settings.synth_args, vec!["-batch".to_string()]);
        assert_eq!(settings.monitor.interval, Duration::from_secs(5));
        assert_eq!(settings.monitor.retry_budget, 8);
        assert!(settings.lock.force);
    }

    #[test]
    fn malformed_file_is_an_error() {
        assert!(parse_config("not toml at all [").is_err());
    }
}
