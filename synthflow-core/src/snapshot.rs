//! Snapshot persistence between the trial-build and promotion events.
//!
//! Snapshots are versioned JSON records keyed by request id, wrapped in an
//! envelope with a content digest. A digest mismatch means the file was
//! edited or corrupted and is a hard error: promotion must never run from
//! doubtful state.

use anyhow::{bail, Context};
use camino::{Utf8Path, Utf8PathBuf};
use fs_err as fs;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use synthflow_types::snapshot::RunSnapshot;
use tracing::debug;

#[derive(Debug, Serialize, Deserialize)]
struct SnapshotEnvelope {
    digest: String,
    record: RunSnapshot,
}

pub fn snapshot_path(revision_root: &Utf8Path, request_id: u64) -> Utf8PathBuf {
    revision_root.join(format!("merge_request_{request_id}.json"))
}

pub fn save_snapshot(revision_root: &Utf8Path, record: &RunSnapshot) -> anyhow::Result<Utf8PathBuf> {
    let path = snapshot_path(revision_root, record.request_id);
    let envelope = SnapshotEnvelope {
        digest: record_digest(record)?,
        record: record.clone(),
    };
    let json = serde_json::to_string_pretty(&envelope).context("serialize snapshot")?;
    fs::write(&path, json).with_context(|| format!("write snapshot {}", path))?;
    debug!(%path, request_id = record.request_id, "snapshot saved");
    Ok(path)
}

pub fn load_snapshot(revision_root: &Utf8Path, request_id: u64) -> anyhow::Result<RunSnapshot> {
    let path = snapshot_path(revision_root, request_id);
    let json = fs::read_to_string(&path).with_context(|| format!("read snapshot {}", path))?;
    let envelope: SnapshotEnvelope =
        serde_json::from_str(&json).with_context(|| format!("parse snapshot {}", path))?;

    let expected = record_digest(&envelope.record)?;
    if envelope.digest != expected {
        bail!("snapshot {} failed its integrity check", path);
    }
    Ok(envelope.record)
}

fn record_digest(record: &RunSnapshot) -> anyhow::Result<String> {
    let canonical = serde_json::to_vec(record).context("serialize snapshot record")?;
    let mut hasher = Sha256::new();
    hasher.update(&canonical);
    Ok(hex::encode(hasher.finalize()))
}
