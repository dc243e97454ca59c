//! Versioned snapshot of a campaign, persisted between the trial-build event
//! and the merge-time promotion event.
//!
//! This is an explicit data record keyed by merge-request id, not a
//! serialization of live orchestrator objects: reloading it must never
//! execute behaviour, only restore fingerprints, version state and the
//! report text.

use serde::{Deserialize, Serialize};

use crate::project::ProjectRecord;
use crate::version::{BumpLevel, VersionTag};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSnapshot {
    pub schema: String,
    pub request_id: u64,
    pub source_branch: String,
    pub target_branch: String,
    pub bump_level: BumpLevel,

    /// The provisional tag the trial build was archived under.
    pub tag: VersionTag,

    pub projects: Vec<ProjectRecord>,

    /// Rendered aggregated report, reused as the release note at promotion.
    #[serde(default)]
    pub report_md: String,

    pub created_at: String,
}

impl RunSnapshot {
    pub fn new(
        request_id: u64,
        source_branch: &str,
        target_branch: &str,
        bump_level: BumpLevel,
        tag: VersionTag,
        created_at: String,
    ) -> Self {
        Self {
            schema: crate::schema::SYNTHFLOW_RUN_V1.to_string(),
            request_id,
            source_branch: source_branch.to_string(),
            target_branch: target_branch.to_string(),
            bump_level,
            tag,
            projects: vec![],
            report_md: String::new(),
            created_at,
        }
    }
}
