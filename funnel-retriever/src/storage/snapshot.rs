//! Atomic snapshot persistence for the index store.
//!
//! The on-disk format is a JSON envelope `{version, dimension, entries}`.
//! Writes go to a sibling `.tmp` file followed by an atomic rename, so a
//! reader never observes a half-written snapshot and a crash mid-write
//! leaves the previous snapshot intact.
//!
//! Loading is self-healing and never fails: a missing file yields an empty
//! store, a corrupt file yields an empty store with a warning (the next
//! indexing run rebuilds it), and a legacy snapshot (the bare key → entry
//! map written before the envelope existed) is detected by structural probe
//! and upconverted transparently.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use super::{IndexEntry, IndexStore};

/// Current snapshot format version.
pub const SNAPSHOT_VERSION: u32 = 2;

#[derive(Debug, Deserialize)]
struct SnapshotEnvelope {
    version: u32,
    #[allow(dead_code)]
    dimension: usize,
    entries: BTreeMap<String, IndexEntry>,
}

#[derive(Debug, Serialize)]
struct SnapshotEnvelopeRef<'a> {
    version: u32,
    dimension: usize,
    entries: &'a BTreeMap<String, IndexEntry>,
}

/// Load the snapshot at `path`, returning an empty store when the file is
/// missing or unusable. Entries whose vector length differs from
/// `dimension` are dropped; the next indexing run re-embeds them.
pub async fn load(path: &Path, dimension: usize) -> IndexStore {
    let bytes = match tokio::fs::read(path).await {
        Ok(bytes) => bytes,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            debug!(path = %path.display(), "no snapshot on disk, starting empty");
            return IndexStore::new();
        }
        Err(err) => {
            warn!(path = %path.display(), error = %err, "failed to read snapshot, starting empty");
            return IndexStore::new();
        }
    };

    let value: Value = match serde_json::from_slice(&bytes) {
        Ok(value) => value,
        Err(err) => {
            warn!(path = %path.display(), error = %err, "failed to parse snapshot, starting empty");
            return IndexStore::new();
        }
    };

    let entries = match value.get("version").and_then(Value::as_u64) {
        Some(version) if version > u64::from(SNAPSHOT_VERSION) => {
            warn!(
                path = %path.display(),
                version,
                supported = SNAPSHOT_VERSION,
                "snapshot written by a newer version, starting empty"
            );
            return IndexStore::new();
        }
        Some(_) => match serde_json::from_value::<SnapshotEnvelope>(value) {
            Ok(envelope) => envelope.entries,
            Err(err) => {
                warn!(path = %path.display(), error = %err, "failed to parse snapshot, starting empty");
                return IndexStore::new();
            }
        },
        // No version field: legacy format, a bare key -> entry map.
        None => match serde_json::from_value::<BTreeMap<String, IndexEntry>>(value) {
            Ok(entries) => {
                debug!(path = %path.display(), "upconverting legacy snapshot");
                entries
            }
            Err(err) => {
                warn!(path = %path.display(), error = %err, "failed to parse snapshot, starting empty");
                return IndexStore::new();
            }
        },
    };

    let total = entries.len();
    let kept: BTreeMap<String, IndexEntry> = entries
        .into_iter()
        .filter(|(_, entry)| entry.vector.len() == dimension)
        .collect();
    let dropped = total - kept.len();
    if dropped > 0 {
        warn!(
            dropped,
            dimension, "dropped snapshot entries with mismatched dimension, they will re-embed"
        );
    }
    debug!(path = %path.display(), entries = kept.len(), "loaded snapshot");
    IndexStore::from_entries(kept)
}

/// Persist the store to `path` via temp file + atomic rename. Returns
/// `Ok(false)` without touching the disk when the store has no unsaved
/// changes.
pub async fn save(store: &mut IndexStore, path: &Path, dimension: usize) -> anyhow::Result<bool> {
    if !store.has_unsaved_changes() {
        return Ok(false);
    }

    let envelope = SnapshotEnvelopeRef {
        version: SNAPSHOT_VERSION,
        dimension,
        entries: store.entries(),
    };
    let bytes = serde_json::to_vec(&envelope).context("failed to serialize snapshot")?;

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("failed to create snapshot directory {}", parent.display()))?;
        }
    }

    let temp_path = temp_path_for(path);
    tokio::fs::write(&temp_path, &bytes)
        .await
        .with_context(|| format!("failed to write snapshot temp file {}", temp_path.display()))?;
    tokio::fs::rename(&temp_path, path)
        .await
        .with_context(|| format!("failed to move snapshot into place at {}", path.display()))?;

    store.mark_saved();
    debug!(path = %path.display(), entries = store.len(), "wrote snapshot");
    Ok(true)
}

fn temp_path_for(path: &Path) -> PathBuf {
    let mut os = path.as_os_str().to_owned();
    os.push(".tmp");
    PathBuf::from(os)
}
