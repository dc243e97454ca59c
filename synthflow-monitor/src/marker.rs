//! One scan of a run directory: marker files to [`RunObservation`]s.

use camino::{Utf8Path, Utf8PathBuf};
use fs_err as fs;
use regex::Regex;
use std::sync::OnceLock;
use synthflow_types::observation::{RunObservation, RunPhase};
use thiserror::Error;
use tracing::debug;

/// Marker file names within each run directory, as written by the external
/// tool. Defaults match the Vivado protocol.
#[derive(Debug, Clone)]
pub struct MarkerNames {
    pub begin: String,
    pub end: String,
    pub error: String,
    pub queued: String,
    pub log: String,
}

impl Default for MarkerNames {
    fn default() -> Self {
        Self {
            begin: ".vivado.begin.rst".to_string(),
            end: ".vivado.end.rst".to_string(),
            error: ".vivado.error.rst".to_string(),
            queued: ".Vivado_Synthesis.queue.rst".to_string(),
            log: "runme.log".to_string(),
        }
    }
}

impl MarkerNames {
    fn is_primary(&self, file_name: &str) -> bool {
        file_name == self.begin
            || file_name == self.end
            || file_name == self.error
            || file_name == self.queued
    }
}

#[derive(Debug, Error)]
pub enum MarkerScanError {
    #[error("run directory {0} does not exist")]
    MissingRunDir(Utf8PathBuf),

    #[error("io error scanning {path}: {message}")]
    Io { path: Utf8PathBuf, message: String },
}

/// Scan every run subdirectory of `run_dir` once.
///
/// Marker precedence: end > error > begin > queued; a subdirectory without
/// any marker is indeterminate. Liveness is not probed here; the watch loop
/// fills `alive` in for begin-phase runs.
pub fn scan_run_dir(
    run_dir: &Utf8Path,
    names: &MarkerNames,
) -> Result<Vec<RunObservation>, MarkerScanError> {
    if !run_dir.is_dir() {
        return Err(MarkerScanError::MissingRunDir(run_dir.to_path_buf()));
    }

    let io_err = |path: &Utf8Path, e: std::io::Error| MarkerScanError::Io {
        path: path.to_path_buf(),
        message: e.to_string(),
    };

    let mut entries = Vec::new();
    for entry in fs::read_dir(run_dir).map_err(|e| io_err(run_dir, e))? {
        let entry = entry.map_err(|e| io_err(run_dir, e))?;
        entries.push(entry.file_name().to_string_lossy().to_string());
    }
    entries.sort();

    let mut observations = Vec::new();
    for name in entries {
        let dir = run_dir.join(&name);
        if !dir.is_dir() {
            continue;
        }

        let phase = if dir.join(&names.end).is_file() {
            RunPhase::Done
        } else if dir.join(&names.error).is_file() {
            RunPhase::Error
        } else if dir.join(&names.begin).is_file() {
            let text = fs::read_to_string(dir.join(&names.begin))
                .map_err(|e| io_err(&dir, e))?;
            RunPhase::Running {
                pid: parse_pid(&text),
            }
        } else if dir.join(&names.queued).is_file() {
            RunPhase::Queued
        } else {
            RunPhase::Indeterminate
        };

        debug!(run = %name, ?phase, "scanned run directory");
        observations.push(RunObservation {
            run: name,
            phase,
            alive: None,
            log_tail: read_log_tail(&dir, names, phase),
            milestones: collect_milestones(&dir, names).map_err(|e| io_err(&dir, e))?,
        });
    }

    Ok(observations)
}

/// Extract the process id from a begin marker, e.g. `Pid="12345"`.
pub(crate) fn parse_pid(begin_text: &str) -> Option<u32> {
    static PID_RE: OnceLock<Option<Regex>> = OnceLock::new();
    let re = PID_RE.get_or_init(|| Regex::new(r#"Pid="(\d+)""#).ok());
    re.as_ref()?
        .captures(begin_text)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

/// Bounded log tail; the bound depends on how interesting the phase is.
fn read_log_tail(dir: &Utf8Path, names: &MarkerNames, phase: RunPhase) -> Vec<String> {
    let bound = match phase {
        RunPhase::Done => 40,
        RunPhase::Error | RunPhase::Running { .. } => 100,
        RunPhase::Queued | RunPhase::Indeterminate => 20,
    };

    let log_path = dir.join(&names.log);
    match fs::read_to_string(&log_path) {
        Ok(text) => {
            let lines: Vec<&str> = text.lines().collect();
            let start = lines.len().saturating_sub(bound);
            lines[start..].iter().map(|l| l.to_string()).collect()
        }
        Err(_) => vec!["No log file found".to_string()],
    }
}

/// Fine-grained `phase.subphase` markers: every other `.rst` file in the run
/// directory. Observability only, never part of the verdict.
fn collect_milestones(dir: &Utf8Path, names: &MarkerNames) -> std::io::Result<Vec<String>> {
    let mut milestones = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let file_name = entry.file_name().to_string_lossy().to_string();
        if names.is_primary(&file_name) || !file_name.ends_with(".rst") {
            continue;
        }
        let stem = file_name
            .trim_start_matches('.')
            .trim_end_matches(".rst")
            .to_string();
        milestones.push(stem);
    }
    milestones.sort();
    Ok(milestones)
}

#[cfg(test)]
mod tests {
    use super::*;
    use camino::Utf8PathBuf;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn scaffold_run(root: &Utf8Path, run: &str, files: &[(&str, &str)]) {
        let dir = root.join(run);
        std::fs::create_dir_all(&dir).expect("mkdir");
        for (name, contents) in files {
            std::fs::write(dir.join(name), contents).expect("write marker");
        }
    }

    fn temp_root() -> (TempDir, Utf8PathBuf) {
        let temp = TempDir::new().expect("temp dir");
        let root = Utf8PathBuf::from_path_buf(temp.path().to_path_buf()).expect("utf8");
        (temp, root)
    }

    #[test]
    fn missing_run_dir_is_an_error() {
        let (_temp, root) = temp_root();
        let missing = root.join("nope");
        assert!(matches!(
            scan_run_dir(&missing, &MarkerNames::default()),
            Err(MarkerScanError::MissingRunDir(_))
        ));
    }

    #[test]
    fn end_marker_wins_over_everything() {
        let (_temp, root) = temp_root();
        scaffold_run(
            &root,
            "synth_1",
            &[
                (".vivado.end.rst", ""),
                (".vivado.error.rst", ""),
                (".vivado.begin.rst", "Pid=\"99\""),
            ],
        );
        let obs = scan_run_dir(&root, &MarkerNames::default()).expect("scan");
        assert_eq!(obs.len(), 1);
        assert_eq!(obs[0].phase, RunPhase::Done);
    }

    #[test]
    fn error_marker_wins_over_begin() {
        let (_temp, root) = temp_root();
        scaffold_run(
            &root,
            "synth_1",
            &[(".vivado.error.rst", ""), (".vivado.begin.rst", "Pid=\"99\"")],
        );
        let obs = scan_run_dir(&root, &MarkerNames::default()).expect("scan");
        assert_eq!(obs[0].phase, RunPhase::Error);
    }

    #[test]
    fn begin_marker_carries_pid() {
        let (_temp, root) = temp_root();
        scaffold_run(
            &root,
            "impl_1",
            &[(".vivado.begin.rst", "<Process Pid=\"4321\" Host=\"node7\"/>")],
        );
        let obs = scan_run_dir(&root, &MarkerNames::default()).expect("scan");
        assert_eq!(obs[0].phase, RunPhase::Running { pid: Some(4321) });
    }

    #[test]
    fn unparseable_begin_marker_has_no_pid() {
        let (_temp, root) = temp_root();
        scaffold_run(&root, "impl_1", &[(".vivado.begin.rst", "started")]);
        let obs = scan_run_dir(&root, &MarkerNames::default()).expect("scan");
        assert_eq!(obs[0].phase, RunPhase::Running { pid: None });
    }

    #[test]
    fn queue_marker_and_no_marker() {
        let (_temp, root) = temp_root();
        scaffold_run(&root, "a_queued", &[(".Vivado_Synthesis.queue.rst", "")]);
        scaffold_run(&root, "b_bare", &[]);
        let obs = scan_run_dir(&root, &MarkerNames::default()).expect("scan");
        assert_eq!(obs[0].phase, RunPhase::Queued);
        assert_eq!(obs[1].phase, RunPhase::Indeterminate);
    }

    #[test]
    fn log_tail_is_bounded() {
        let (_temp, root) = temp_root();
        let long_log: String = (0..200).map(|i| format!("line {i}\n")).collect();
        scaffold_run(
            &root,
            "synth_1",
            &[(".vivado.end.rst", ""), ("runme.log", long_log.as_str())],
        );
        let obs = scan_run_dir(&root, &MarkerNames::default()).expect("scan");
        assert_eq!(obs[0].log_tail.len(), 40);
        assert_eq!(obs[0].log_tail.last().map(String::as_str), Some("line 199"));
    }

    #[test]
    fn missing_log_is_reported_in_tail() {
        let (_temp, root) = temp_root();
        scaffold_run(&root, "synth_1", &[(".vivado.end.rst", "")]);
        let obs = scan_run_dir(&root, &MarkerNames::default()).expect("scan");
        assert_eq!(obs[0].log_tail, vec!["No log file found".to_string()]);
    }

    #[test]
    fn extra_rst_files_become_milestones() {
        let (_temp, root) = temp_root();
        scaffold_run(
            &root,
            "synth_1",
            &[
                (".vivado.begin.rst", "Pid=\"1\""),
                (".vivado.synth_design.begin.rst", ""),
                (".vivado.opt_design.end.rst", ""),
                ("notes.txt", "not a marker"),
            ],
        );
        let obs = scan_run_dir(&root, &MarkerNames::default()).expect("scan");
        assert_eq!(
            obs[0].milestones,
            vec![
                "vivado.opt_design.end".to_string(),
                "vivado.synth_design.begin".to_string(),
            ]
        );
    }

    #[test]
    fn pid_regex_variants() {
        assert_eq!(parse_pid(r#"Pid="123""#), Some(123));
        assert_eq!(parse_pid("Pid=123"), None);
        assert_eq!(parse_pid(""), None);
    }
}
