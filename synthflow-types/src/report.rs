//! The aggregated campaign report.

use serde::{Deserialize, Serialize};

use crate::project::ProjectRecord;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub schema: String,
    pub request_id: u64,
    pub source_branch: String,
    pub target_branch: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,

    pub started_at: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ended_at: Option<String>,

    /// Every to-do project with its terminal state and fingerprints; the
    /// report always lists all of them regardless of individual failures.
    #[serde(default)]
    pub projects: Vec<ProjectRecord>,

    /// Key metrics extracted from tool reports, per project.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub metrics: Vec<MetricsBlock>,

    /// Free-text notes accumulated during the campaign (warnings, parse
    /// degradations, dry-run markers).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub notes: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsBlock {
    pub project: String,
    pub section: String,

    #[serde(default)]
    pub rows: Vec<MetricRow>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricRow {
    pub name: String,
    pub value: String,
}

impl RunReport {
    pub fn new(request_id: u64, source_branch: &str, target_branch: &str, started_at: String) -> Self {
        Self {
            schema: crate::schema::SYNTHFLOW_REPORT_V1.to_string(),
            request_id,
            source_branch: source_branch.to_string(),
            target_branch: target_branch.to_string(),
            tag: None,
            started_at,
            ended_at: None,
            projects: vec![],
            metrics: vec![],
            notes: vec![],
        }
    }

    /// True when every queued project reached `SUCCESS` (skipped projects do
    /// not count against the verdict).
    pub fn all_green(&self) -> bool {
        self.projects.iter().all(|p| !p.state.is_failure())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::project::ProjectState;
    use camino::Utf8PathBuf;

    fn record(name: &str, state: ProjectState) -> ProjectRecord {
        let mut r = ProjectRecord::new(name, Utf8PathBuf::from(name));
        r.state = state;
        r
    }

    #[test]
    fn all_green_ignores_skipped() {
        let mut report = RunReport::new(1, "feature", "master", "now".to_string());
        report.projects.push(record("a", ProjectState::Success));
        report.projects.push(record("b", ProjectState::Skipped));
        assert!(report.all_green());

        report.projects.push(record("c", ProjectState::ErrorBuild));
        assert!(!report.all_green());
    }
}
