//! Per-project lifecycle state within one campaign.

use camino::Utf8PathBuf;
use serde::{Deserialize, Serialize};

/// The closed lifecycle enumeration:
/// `NEW -> {SKIPPED, QUEUED} -> RUNNING -> {SUCCESS, ERROR_*}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProjectState {
    New,
    Skipped,
    Queued,
    Running,
    Success,
    /// The external process could not be started.
    ErrorLaunch,
    /// The monitor's terminal verdict was failure or indeterminate-timeout.
    ErrorBuild,
    /// The expected output artifact was absent despite a success verdict.
    ErrorArtifact,
}

impl ProjectState {
    pub fn is_terminal(self) -> bool {
        !matches!(
            self,
            ProjectState::New | ProjectState::Queued | ProjectState::Running
        )
    }

    pub fn is_failure(self) -> bool {
        matches!(
            self,
            ProjectState::ErrorLaunch | ProjectState::ErrorBuild | ProjectState::ErrorArtifact
        )
    }

    pub fn label(self) -> &'static str {
        match self {
            ProjectState::New => "new",
            ProjectState::Skipped => "skipped",
            ProjectState::Queued => "queued",
            ProjectState::Running => "running",
            ProjectState::Success => "success",
            ProjectState::ErrorLaunch => "error (launch)",
            ProjectState::ErrorBuild => "error (build)",
            ProjectState::ErrorArtifact => "error (artifact)",
        }
    }
}

/// One independently-buildable sub-project tracked through a campaign.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectRecord {
    /// Unique within a campaign.
    pub name: String,

    /// Directory of the project relative to the repository root.
    pub path: Utf8PathBuf,

    pub state: ProjectState,

    /// Fingerprint at the campaign baseline (target branch).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fingerprint_before: Option<String>,

    /// Fingerprint at the candidate revision (merged source).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fingerprint_after: Option<String>,
}

impl ProjectRecord {
    pub fn new(name: impl Into<String>, path: Utf8PathBuf) -> Self {
        Self {
            name: name.into(),
            path,
            state: ProjectState::New,
            fingerprint_before: None,
            fingerprint_after: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_and_failure_classification() {
        assert!(!ProjectState::New.is_terminal());
        assert!(!ProjectState::Queued.is_terminal());
        assert!(!ProjectState::Running.is_terminal());
        assert!(ProjectState::Skipped.is_terminal());
        assert!(ProjectState::Success.is_terminal());
        assert!(ProjectState::ErrorBuild.is_terminal());

        assert!(!ProjectState::Skipped.is_failure());
        assert!(!ProjectState::Success.is_failure());
        assert!(ProjectState::ErrorLaunch.is_failure());
        assert!(ProjectState::ErrorArtifact.is_failure());
    }

    #[test]
    fn state_serializes_snake_case() {
        let v = serde_json::to_value(ProjectState::ErrorArtifact).expect("serialize");
        assert_eq!(v, serde_json::json!("error_artifact"));
    }
}
