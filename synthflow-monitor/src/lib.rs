//! Observes an opaque external synthesis process through the marker files it
//! writes into its run directory.
//!
//! The tool's protocol is purely file-based: presence of a queue/begin/end/
//! error marker signals the phase, the begin marker carries the process id,
//! and a log file accumulates output. [`scan_run_dir`] turns one directory
//! listing into [`RunObservation`]s; [`watch`] re-evaluates at a fixed
//! interval under a bounded retry budget and derives the terminal verdict.

mod marker;
mod watch;

pub use marker::{scan_run_dir, MarkerNames, MarkerScanError};
pub use watch::{watch, LivenessProbe, MapProbe, MonitorConfig, MonitorVerdict, SignalProbe};
