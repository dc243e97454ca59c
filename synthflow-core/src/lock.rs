//! Marker-file mutual exclusion over a revision root.
//!
//! One lock per revision root; campaigns against different roots do not
//! contend. Leaving the marker behind deadlocks every future campaign, so
//! release is a correctness invariant: the guard removes it on drop, on
//! every exit path.

use camino::{Utf8Path, Utf8PathBuf};
use fs_err as fs;
use std::io::Write;
use std::thread;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Marker file created under the revision root while a campaign holds it.
pub const LOCK_FILE: &str = ".synthflow.lock";

#[derive(Debug, Clone)]
pub struct LockOptions {
    /// Poll interval while waiting for the marker to disappear.
    pub interval: Duration,
    pub timeout: Duration,
    /// Take the lock even if the marker exists. Operator recovery only.
    pub force: bool,
}

impl Default for LockOptions {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(5),
            timeout: Duration::from_secs(600),
            force: false,
        }
    }
}

#[derive(Debug, Error)]
pub enum LockError {
    #[error("timed out after {timeout:?} waiting for {path}")]
    Timeout {
        timeout: Duration,
        path: Utf8PathBuf,
    },

    #[error("lock io on {path}: {message}")]
    Io { path: Utf8PathBuf, message: String },
}

/// Held lock; the marker is removed when this is dropped.
#[derive(Debug)]
pub struct LockGuard {
    path: Utf8PathBuf,
    released: bool,
}

impl LockGuard {
    /// Acquire the lock under `revision_root`.
    ///
    /// Polls for the marker's absence, then creates it atomically
    /// (`create_new`), so two pollers that both observed absence still
    /// serialize on creation. With `force` the existing marker is
    /// overwritten.
    pub fn acquire(revision_root: &Utf8Path, opts: &LockOptions) -> Result<LockGuard, LockError> {
        let path = revision_root.join(LOCK_FILE);
        let io_err = |e: std::io::Error| LockError::Io {
            path: path.clone(),
            message: e.to_string(),
        };

        if opts.force {
            warn!(%path, "forcing lock acquisition over existing marker");
            write_marker(&path, true).map_err(io_err)?;
            return Ok(LockGuard {
                path,
                released: false,
            });
        }

        let deadline = Instant::now() + opts.timeout;
        loop {
            match write_marker(&path, false) {
                Ok(()) => {
                    info!(%path, "lock acquired");
                    return Ok(LockGuard {
                        path,
                        released: false,
                    });
                }
                Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                    if Instant::now() >= deadline {
                        return Err(LockError::Timeout {
                            timeout: opts.timeout,
                            path,
                        });
                    }
                    debug!(%path, "lock held elsewhere, waiting");
                    thread::sleep(opts.interval);
                }
                Err(e) => return Err(io_err(e)),
            }
        }
    }

    pub fn path(&self) -> &Utf8Path {
        &self.path
    }

    /// Explicit release; the drop impl covers paths that never get here.
    pub fn release(mut self) -> Result<(), LockError> {
        self.released = true;
        match fs::remove_file(&self.path) {
            Ok(()) => {
                info!(path = %self.path, "lock released");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(LockError::Io {
                path: self.path.clone(),
                message: e.to_string(),
            }),
        }
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        if let Err(e) = fs::remove_file(&self.path) {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!(path = %self.path, error = %e, "failed to remove lock marker on drop");
            }
        }
    }
}

fn write_marker(path: &Utf8Path, overwrite: bool) -> std::io::Result<()> {
    let mut file = fs::OpenOptions::new()
        .write(true)
        .create(overwrite)
        .create_new(!overwrite)
        .truncate(overwrite)
        .open(path)?;
    writeln!(file, "pid={} acquired={}", std::process::id(), chrono::Utc::now())?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;
    use tempfile::TempDir;

    fn temp_root() -> (TempDir, Utf8PathBuf) {
        let temp = TempDir::new().expect("temp dir");
        let root = Utf8PathBuf::from_path_buf(temp.path().to_path_buf()).expect("utf8");
        (temp, root)
    }

    fn fast(timeout_ms: u64) -> LockOptions {
        LockOptions {
            interval: Duration::from_millis(5),
            timeout: Duration::from_millis(timeout_ms),
            force: false,
        }
    }

    #[test]
    fn acquire_creates_marker_and_drop_removes_it() {
        let (_temp, root) = temp_root();
        let marker = root.join(LOCK_FILE);
        {
            let guard = LockGuard::acquire(&root, &fast(100)).expect("acquire");
            assert!(marker.exists());
            drop(guard);
        }
        assert!(!marker.exists());
    }

    #[test]
    fn explicit_release_removes_marker() {
        let (_temp, root) = temp_root();
        let guard = LockGuard::acquire(&root, &fast(100)).expect("acquire");
        guard.release().expect("release");
        assert!(!root.join(LOCK_FILE).exists());
    }

    #[test]
    fn second_acquire_times_out_while_held() {
        let (_temp, root) = temp_root();
        let _guard = LockGuard::acquire(&root, &fast(100)).expect("first");
        let err = LockGuard::acquire(&root, &fast(50)).expect_err("contended");
        assert!(matches!(err, LockError::Timeout { .. }));
    }

    #[test]
    fn force_takes_over_existing_marker() {
        let (_temp, root) = temp_root();
        std::fs::write(root.join(LOCK_FILE), "stale").expect("stale marker");
        let opts = LockOptions {
            force: true,
            ..fast(100)
        };
        let guard = LockGuard::acquire(&root, &opts).expect("forced");
        guard.release().expect("release");
        assert!(!root.join(LOCK_FILE).exists());
    }

    #[test]
    fn contender_proceeds_only_after_release() {
        // Scenario: two campaigns over the same revision root serialize on
        // the lock, verified by elapsed-time ordering.
        let (_temp, root) = temp_root();
        let first = LockGuard::acquire(&root, &fast(1000)).expect("first");

        let (tx, rx) = mpsc::channel();
        let contender_root = root.clone();
        let handle = thread::spawn(move || {
            let started = Instant::now();
            let guard =
                LockGuard::acquire(&contender_root, &fast(1000)).expect("second acquire");
            tx.send(started.elapsed()).expect("send");
            drop(guard);
        });

        let hold = Duration::from_millis(50);
        thread::sleep(hold);
        first.release().expect("release");

        let waited = rx.recv().expect("recv");
        handle.join().expect("join");
        assert!(waited >= hold, "contender entered after {waited:?}");
    }
}
