//! In-memory index store and its derived search cache.
//!
//! ## Key Components
//!
//! - [`IndexStore`] — ordered map from chunk key to [`IndexEntry`], the only
//!   mutable state of the pipeline. Lexicographic key order makes snapshots
//!   byte-deterministic and gives searches a stable tie-break order.
//! - [`SearchCache`] — flattened key list + row-major vector matrix derived
//!   from the store, tagged with the store generation it was built from.
//!   Stale caches are detected by tag and rebuilt lazily.
//! - [`content_digest`] — the change-detection hash over sanitized chunk text.
//!
//! Persistence of the store lives in [`snapshot`].
//!
//! The store, its snapshot, and the derived matrix are all held in memory
//! and rewritten whole; entries are inserted or wholesale cleared, never
//! individually deleted or compacted. That caps the index at what fits in
//! process memory — an accepted limit, not a defect.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::warn;

pub mod snapshot;

/// Hex-encoded blake3 digest of chunk text.
///
/// This is the only freshness signal the indexer uses: a chunk whose digest
/// matches its stored hash (at the right dimension) is never re-embedded.
pub fn content_digest(text: &str) -> String {
    blake3::hash(text.as_bytes()).to_hex().to_string()
}

/// One indexed chunk: its embedding, content hash, and display snippet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexEntry {
    pub vector: Vec<f32>,
    pub hash: String,
    pub snippet: String,
}

/// Ordered chunk-key → entry map with change tracking.
///
/// Every mutation bumps a generation counter (so derived [`SearchCache`]s can
/// detect staleness without locking) and an unsaved-changes counter (so
/// snapshot writes can be elided when nothing changed).
#[derive(Debug, Default)]
pub struct IndexStore {
    entries: BTreeMap<String, IndexEntry>,
    generation: u64,
    unsaved_changes: usize,
}

impl IndexStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap entries loaded from a snapshot. Starts clean at generation zero.
    pub(crate) fn from_entries(entries: BTreeMap<String, IndexEntry>) -> Self {
        Self {
            entries,
            generation: 0,
            unsaved_changes: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, key: &str) -> Option<&IndexEntry> {
        self.entries.get(key)
    }

    /// The dedup rule: a key is up to date iff it exists, its stored hash
    /// matches `hash`, and its stored vector has length `dimension`.
    pub fn is_current(&self, key: &str, hash: &str, dimension: usize) -> bool {
        self.entries
            .get(key)
            .is_some_and(|entry| entry.hash == hash && entry.vector.len() == dimension)
    }

    /// Insert or replace an entry. Always counts as a change; callers are
    /// expected to have filtered up-to-date chunks with [`Self::is_current`].
    pub fn insert(&mut self, key: String, entry: IndexEntry) {
        self.entries.insert(key, entry);
        self.touch();
    }

    /// Drop every entry. Clearing an already-empty store changes nothing and
    /// does not dirty the snapshot.
    pub fn clear(&mut self) {
        if self.entries.is_empty() {
            return;
        }
        self.entries.clear();
        self.touch();
    }

    pub fn entries(&self) -> &BTreeMap<String, IndexEntry> {
        &self.entries
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn has_unsaved_changes(&self) -> bool {
        self.unsaved_changes > 0
    }

    pub(crate) fn mark_saved(&mut self) {
        self.unsaved_changes = 0;
    }

    fn touch(&mut self) {
        self.generation += 1;
        self.unsaved_changes += 1;
    }
}

/// Flattened view of the store for scoring: parallel key list and row-major
/// vector matrix, in lexicographic key order.
///
/// Built from a store at a specific generation; [`Self::is_current`] compares
/// tags so readers can rebuild lazily instead of blocking writers.
#[derive(Debug)]
pub struct SearchCache {
    keys: Vec<String>,
    matrix: Vec<f32>,
    dimension: usize,
    generation: u64,
}

impl SearchCache {
    /// Flatten the store's vectors into one matrix. Entries whose vector
    /// length differs from `dimension` are skipped with a warning; they are
    /// unsearchable until re-embedded.
    pub fn build(store: &IndexStore, dimension: usize) -> Self {
        let mut keys = Vec::with_capacity(store.len());
        let mut matrix = Vec::with_capacity(store.len() * dimension);
        for (key, entry) in store.entries() {
            if entry.vector.len() != dimension {
                warn!(
                    key,
                    expected = dimension,
                    actual = entry.vector.len(),
                    "skipping entry with mismatched vector length"
                );
                continue;
            }
            keys.push(key.clone());
            matrix.extend_from_slice(&entry.vector);
        }
        Self {
            keys,
            matrix,
            dimension,
            generation: store.generation(),
        }
    }

    pub fn is_current(&self, store: &IndexStore) -> bool {
        self.generation == store.generation()
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn key(&self, row: usize) -> &str {
        &self.keys[row]
    }

    pub fn row(&self, row: usize) -> &[f32] {
        &self.matrix[row * self.dimension..(row + 1) * self.dimension]
    }
}
