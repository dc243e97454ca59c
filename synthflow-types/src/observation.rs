//! What the status monitor sees in a synthesis run directory.

use serde::{Deserialize, Serialize};

/// Phase of one synthesis run, derived from marker-file presence.
///
/// Marker precedence is end > error > begin > queued; a directory with no
/// marker at all is indeterminate and treated like queued by the monitor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "phase", rename_all = "snake_case")]
pub enum RunPhase {
    Queued,
    Running {
        /// Parsed out of the begin marker; absent when unparseable.
        pid: Option<u32>,
    },
    Done,
    Error,
    Indeterminate,
}

/// One polling round's view of one run directory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunObservation {
    /// Directory name of the run, e.g. `synth_1`.
    pub run: String,

    #[serde(flatten)]
    pub phase: RunPhase,

    /// Result of the liveness probe, only meaningful while running.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alive: Option<bool>,

    /// Bounded tail of the tool's log file.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub log_tail: Vec<String>,

    /// Fine-grained `phase.subphase` markers, observability only.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub milestones: Vec<String>,
}

impl RunObservation {
    pub fn is_done(&self) -> bool {
        self.phase == RunPhase::Done
    }

    /// Queued, or no marker at all.
    pub fn is_waiting(&self) -> bool {
        matches!(self.phase, RunPhase::Queued | RunPhase::Indeterminate)
    }

    /// Error marker present, or a begin-phase process that vanished without
    /// writing a terminal marker.
    pub fn is_dead(&self) -> bool {
        match self.phase {
            RunPhase::Error => true,
            RunPhase::Running { .. } => self.alive == Some(false),
            _ => false,
        }
    }

    /// A begin-phase process the probe confirmed alive.
    pub fn is_live(&self) -> bool {
        matches!(self.phase, RunPhase::Running { .. }) && self.alive == Some(true)
    }
}
