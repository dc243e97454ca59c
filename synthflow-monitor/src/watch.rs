//! Bounded-retry polling loop over a run directory.

use crate::marker::{scan_run_dir, MarkerNames, MarkerScanError};
use camino::Utf8Path;
use std::collections::BTreeMap;
use std::thread;
use std::time::Duration;
use synthflow_types::observation::{RunObservation, RunPhase};
use tracing::{debug, info, warn};

/// How often to poll and how long to wait for the external tool to show
/// signs of life before giving up.
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    pub interval: Duration,
    /// Consecutive rounds without a live process before the monitor gives up.
    pub retry_budget: u32,
    pub names: MarkerNames,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(30),
            retry_budget: 20,
            names: MarkerNames::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorVerdict {
    /// Every run wrote its end marker.
    AllDone,
    /// The retry budget ran out while runs were still waiting or dead.
    RetriesExhausted,
}

/// Answers "is this pid still a live process?".
pub trait LivenessProbe {
    fn is_alive(&self, pid: u32) -> bool;
}

/// Signal-0 probe against the local process table.
#[derive(Debug, Default)]
pub struct SignalProbe;

impl LivenessProbe for SignalProbe {
    fn is_alive(&self, pid: u32) -> bool {
        nix::sys::signal::kill(nix::unistd::Pid::from_raw(pid as i32), None).is_ok()
    }
}

/// Test double backed by a fixed pid table.
#[derive(Debug, Default)]
pub struct MapProbe {
    alive: BTreeMap<u32, bool>,
}

impl MapProbe {
    pub fn with(mut self, pid: u32, alive: bool) -> Self {
        self.alive.insert(pid, alive);
        self
    }
}

impl LivenessProbe for MapProbe {
    fn is_alive(&self, pid: u32) -> bool {
        self.alive.get(&pid).copied().unwrap_or(false)
    }
}

/// Poll `run_dir` until every run is done or the retry budget is exhausted.
///
/// Each round scans the markers, probes liveness for begin-phase runs, and
/// hands the observations to `on_round` (for status rendering). The budget
/// decrements when nothing is visibly making progress and resets to its
/// maximum whenever a live process is observed, so a slow build is only
/// abandoned after `retry_budget` consecutive idle rounds.
pub fn watch(
    run_dir: &Utf8Path,
    config: &MonitorConfig,
    probe: &dyn LivenessProbe,
    mut on_round: impl FnMut(&[RunObservation]),
) -> Result<MonitorVerdict, MarkerScanError> {
    let mut budget = config.retry_budget;

    loop {
        let mut observations = scan_run_dir(run_dir, &config.names)?;
        for obs in &mut observations {
            if let RunPhase::Running { pid } = obs.phase {
                // A begin marker without a parseable pid cannot be probed;
                // count it as not alive so the budget still drains.
                obs.alive = Some(pid.is_some_and(|pid| probe.is_alive(pid)));
            }
        }

        on_round(&observations);

        if !observations.is_empty() && observations.iter().all(RunObservation::is_done) {
            info!(runs = observations.len(), "all runs done");
            return Ok(MonitorVerdict::AllDone);
        }

        let any_live = observations.iter().any(RunObservation::is_live);
        let any_dead = observations.iter().any(RunObservation::is_dead);
        let all_waiting =
            observations.is_empty() || observations.iter().all(RunObservation::is_waiting);

        if any_live {
            budget = config.retry_budget;
        } else if any_dead || all_waiting {
            budget = budget.saturating_sub(1);
            warn!(budget, any_dead, "no live runs observed");
            if budget == 0 {
                return Ok(MonitorVerdict::RetriesExhausted);
            }
        }

        debug!(budget, runs = observations.len(), "polling round complete");
        thread::sleep(config.interval);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use camino::Utf8PathBuf;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn temp_root() -> (TempDir, Utf8PathBuf) {
        let temp = TempDir::new().expect("temp dir");
        let root = Utf8PathBuf::from_path_buf(temp.path().to_path_buf()).expect("utf8");
        (temp, root)
    }

    fn fast_config(retry_budget: u32) -> MonitorConfig {
        MonitorConfig {
            interval: Duration::ZERO,
            retry_budget,
            names: MarkerNames::default(),
        }
    }

    fn mark(root: &Utf8Path, run: &str, marker: &str, contents: &str) {
        let dir = root.join(run);
        std::fs::create_dir_all(&dir).expect("mkdir");
        std::fs::write(dir.join(marker), contents).expect("write marker");
    }

    #[test]
    fn already_done_returns_immediately() {
        let (_temp, root) = temp_root();
        mark(&root, "synth_1", ".vivado.end.rst", "");
        mark(&root, "impl_1", ".vivado.end.rst", "");

        let mut rounds = 0;
        let verdict = watch(&root, &fast_config(3), &MapProbe::default(), |_| rounds += 1)
            .expect("watch");
        assert_eq!(verdict, MonitorVerdict::AllDone);
        assert_eq!(rounds, 1);
    }

    #[test]
    fn empty_run_dir_exhausts_budget() {
        let (_temp, root) = temp_root();

        let verdict = watch(&root, &fast_config(4), &MapProbe::default(), |_| {})
            .expect("watch");
        assert_eq!(verdict, MonitorVerdict::RetriesExhausted);
    }

    #[test]
    fn queued_runs_exhaust_budget_after_n_rounds() {
        let (_temp, root) = temp_root();
        mark(&root, "synth_1", ".Vivado_Synthesis.queue.rst", "");

        let mut rounds = 0;
        let verdict = watch(&root, &fast_config(5), &MapProbe::default(), |_| rounds += 1)
            .expect("watch");
        assert_eq!(verdict, MonitorVerdict::RetriesExhausted);
        assert_eq!(rounds, 5);
    }

    #[test]
    fn dead_process_drains_budget() {
        let (_temp, root) = temp_root();
        mark(&root, "synth_1", ".vivado.begin.rst", "Pid=\"77\"");

        let probe = MapProbe::default().with(77, false);
        let verdict = watch(&root, &fast_config(2), &probe, |obs| {
            assert_eq!(obs[0].alive, Some(false));
        })
        .expect("watch");
        assert_eq!(verdict, MonitorVerdict::RetriesExhausted);
    }

    #[test]
    fn begin_marker_without_pid_drains_budget() {
        let (_temp, root) = temp_root();
        mark(&root, "synth_1", ".vivado.begin.rst", "started");

        let mut rounds = 0;
        let verdict = watch(&root, &fast_config(2), &MapProbe::default(), |obs| {
            rounds += 1;
            assert_eq!(obs[0].alive, Some(false));
        })
        .expect("watch");
        assert_eq!(verdict, MonitorVerdict::RetriesExhausted);
        assert_eq!(rounds, 2);
    }

    #[test]
    fn live_process_resets_budget_then_finishes() {
        let (_temp, root) = temp_root();
        mark(&root, "synth_1", ".Vivado_Synthesis.queue.rst", "");

        // Rounds 1-2 drain the budget from 3; round 3 shows a live process
        // (reset); round 4 finds the end marker.
        let probe = MapProbe::default().with(42, true);
        let mut rounds = 0;
        let root_for_cb = root.clone();
        let verdict = watch(&root, &fast_config(3), &probe, |_| {
            rounds += 1;
            match rounds {
                2 => mark(&root_for_cb, "synth_1", ".vivado.begin.rst", "Pid=\"42\""),
                3 => mark(&root_for_cb, "synth_1", ".vivado.end.rst", ""),
                _ => {}
            }
        })
        .expect("watch");
        assert_eq!(verdict, MonitorVerdict::AllDone);
        assert_eq!(rounds, 4);
    }

    #[test]
    fn mixed_done_and_running_keeps_polling() {
        let (_temp, root) = temp_root();
        mark(&root, "impl_1", ".vivado.end.rst", "");
        mark(&root, "synth_1", ".vivado.begin.rst", "Pid=\"10\"");

        let probe = MapProbe::default().with(10, true);
        let mut rounds = 0;
        let root_for_cb = root.clone();
        let verdict = watch(&root, &fast_config(2), &probe, |obs| {
            rounds += 1;
            assert_eq!(obs.len(), 2);
            if rounds == 3 {
                mark(&root_for_cb, "synth_1", ".vivado.end.rst", "");
            }
        })
        .expect("watch");
        assert_eq!(verdict, MonitorVerdict::AllDone);
        assert_eq!(rounds, 4);
    }

    #[test]
    fn missing_run_dir_propagates() {
        let (_temp, root) = temp_root();
        let missing = root.join("gone");
        assert!(watch(&missing, &fast_config(1), &MapProbe::default(), |_| {}).is_err());
    }
}
