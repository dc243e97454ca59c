//! Inbound merge-request events and their qualification rules.
//!
//! synthflow is tolerant when reading hook payloads: unknown fields are
//! ignored and optional fields may be absent. The hosting platform should
//! enforce stricter schema compliance; our job is to be useful with payloads
//! "as found".

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::version::BumpLevel;

/// Description markers and title keywords recognised in merge requests.
pub mod markers {
    /// Skips the trial build when present in the description, and forces
    /// merge-time promotion handling regardless of state.
    pub const TEST_MERGE: &str = "TEST_MERGE";
    /// Skip destructive repository reset and tool invocation; synthesize a
    /// placeholder success.
    pub const DRY_RUN: &str = "DRYRUN";
    /// Forwarded to the synthesis tool: do not stamp build time registers.
    pub const NO_TIMESTAMP: &str = "NO_TIME";
    /// Title keyword selecting a minor bump (x.y.z -> x.(y+1).0).
    pub const MINOR_VERSION: &str = "MINOR_VERSION";
    /// Title keyword selecting a major bump (x.y.z -> (x+1).0.0).
    pub const MAJOR_VERSION: &str = "MAJOR_VERSION";
}

/// Merge-request lifecycle state as reported by the hosting platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventState {
    Opened,
    Merged,
    Closed,
    #[serde(other)]
    Other,
}

/// One merge-request update, flattened from the platform's hook payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MergeEvent {
    pub request_id: u64,
    pub source_branch: String,
    pub target_branch: String,
    pub state: EventState,
    pub work_in_progress: bool,

    #[serde(default)]
    pub title: String,

    #[serde(default)]
    pub description: String,

    #[serde(default)]
    pub last_commit_author: String,

    #[serde(default)]
    pub action: String,
}

#[derive(Debug, Error)]
pub enum EventParseError {
    #[error("malformed hook payload: {0}")]
    Json(#[from] serde_json::Error),
}

impl MergeEvent {
    /// Parse a raw merge-request hook payload (the `object_attributes` shape).
    pub fn from_hook_json(payload: &str) -> Result<Self, EventParseError> {
        let hook: HookPayload = serde_json::from_str(payload)?;
        let attrs = hook.object_attributes;
        Ok(MergeEvent {
            request_id: attrs.iid,
            source_branch: attrs.source_branch,
            target_branch: attrs.target_branch,
            state: attrs.state,
            work_in_progress: attrs.work_in_progress,
            title: attrs.title,
            description: attrs.description,
            last_commit_author: attrs
                .last_commit
                .map(|c| c.author.name)
                .unwrap_or_default(),
            action: attrs.action,
        })
    }

    /// Should this event launch a trial build campaign?
    pub fn qualifies_for_trial(&self, protected_branch: &str, automation_user: &str) -> bool {
        self.state == EventState::Opened
            && self.target_branch == protected_branch
            && self.last_commit_author != automation_user
            && !self.work_in_progress
            && self.action != "approved"
            && !self.description.contains(markers::TEST_MERGE)
    }

    /// Should this event promote the trial tag to an official release?
    /// Only merges into the protected branch release anything.
    pub fn qualifies_for_promotion(&self, protected_branch: &str) -> bool {
        self.target_branch == protected_branch
            && ((self.state == EventState::Merged && !self.work_in_progress)
                || self.description.contains(markers::TEST_MERGE))
    }

    /// Bump level selected by reserved title keywords; defaults to patch.
    pub fn bump_level(&self) -> BumpLevel {
        if self.title.contains(markers::MAJOR_VERSION) {
            BumpLevel::Major
        } else if self.title.contains(markers::MINOR_VERSION) {
            BumpLevel::Minor
        } else {
            BumpLevel::Patch
        }
    }

    pub fn dry_run(&self) -> bool {
        self.description.contains(markers::DRY_RUN)
    }

    pub fn no_timestamp(&self) -> bool {
        self.description.contains(markers::NO_TIMESTAMP)
    }
}

// Wire shape of the inbound hook. Private: callers only see `MergeEvent`.

#[derive(Debug, Deserialize)]
struct HookPayload {
    object_attributes: HookAttributes,
}

#[derive(Debug, Deserialize)]
struct HookAttributes {
    iid: u64,
    source_branch: String,
    target_branch: String,
    state: EventState,
    work_in_progress: bool,

    #[serde(default)]
    title: String,

    #[serde(default)]
    description: String,

    #[serde(default)]
    last_commit: Option<HookCommit>,

    #[serde(default)]
    action: String,
}

#[derive(Debug, Deserialize)]
struct HookCommit {
    author: HookAuthor,
}

#[derive(Debug, Deserialize)]
struct HookAuthor {
    name: String,
}
