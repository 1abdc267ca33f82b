//! Configuration for indexing runs.
//!
//! [`IndexerConfig`] carries everything an [`Indexer`](crate::indexing::Indexer)
//! needs besides the embedding provider: where the corpus lives, where the
//! snapshot file goes, and the knobs of the batching pipeline. Defaults are
//! suitable for interactive use; override them with the `with_*` methods or
//! load overrides from a TOML file via [`FileConfig`].

use std::path::{Path, PathBuf};

use anyhow::{Context, ensure};
use funnel_chunk::DEFAULT_CHUNK_LIMIT;
use funnel_embed::DEFAULT_DIMENSION;
use serde::Deserialize;

use crate::search::FunnelConfig;

/// Chunks per embedding request.
pub const DEFAULT_BATCH_SIZE: usize = 5;

/// Concurrent embedding workers.
pub const DEFAULT_WORKERS: usize = 4;

/// Snapshot checkpoint every this many merged entries.
pub const DEFAULT_CHECKPOINT_INTERVAL: usize = 20;

/// Characters of sanitized chunk text kept as the display snippet.
pub const SNIPPET_LENGTH: usize = 200;

/// Snapshot filename used when no path is configured.
pub const DEFAULT_SNAPSHOT_FILE: &str = "funnel-index.json";

/// Settings for an indexing run.
#[derive(Debug, Clone)]
pub struct IndexerConfig {
    /// Corpus root to scan.
    pub root: PathBuf,
    /// Where the index snapshot is persisted.
    pub snapshot_path: PathBuf,
    /// Embedding dimension every stored vector must have.
    pub dimension: usize,
    /// Chunks per embedding request.
    pub batch_size: usize,
    /// Concurrent embedding workers.
    pub worker_count: usize,
    /// Merged entries between snapshot checkpoints.
    pub checkpoint_interval: usize,
    /// Maximum chunk size in characters.
    pub max_chunk_length: usize,
    /// Shortlist geometry for the two-stage search.
    pub funnel: FunnelConfig,
}

impl IndexerConfig {
    /// Create a config for the given corpus root with default knobs.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            ..Self::default()
        }
    }

    /// Set the snapshot path.
    pub fn with_snapshot_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.snapshot_path = path.into();
        self
    }

    /// Set the embedding dimension.
    pub fn with_dimension(mut self, dimension: usize) -> Self {
        self.dimension = dimension;
        self
    }

    /// Set the number of chunks per embedding request.
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    /// Set the number of concurrent embedding workers.
    pub fn with_workers(mut self, worker_count: usize) -> Self {
        self.worker_count = worker_count;
        self
    }

    /// Set the checkpoint interval in merged entries.
    pub fn with_checkpoint_interval(mut self, interval: usize) -> Self {
        self.checkpoint_interval = interval;
        self
    }

    /// Set the maximum chunk size in characters.
    pub fn with_max_chunk_length(mut self, max_chunk_length: usize) -> Self {
        self.max_chunk_length = max_chunk_length;
        self
    }

    /// Set how many leading dimensions the stage-1 shortlist scores on.
    pub fn with_shortlist_dimension(mut self, dimension: usize) -> Self {
        self.funnel.shortlist_dimension = dimension;
        self
    }

    /// Set the shortlist size as a multiple of `top_k`.
    pub fn with_shortlist_factor(mut self, factor: usize) -> Self {
        self.funnel.shortlist_factor = factor;
        self
    }

    /// Check that the configuration is usable.
    pub fn validate(&self) -> anyhow::Result<()> {
        ensure!(self.dimension > 0, "embedding dimension must be positive");
        ensure!(self.batch_size > 0, "batch size must be positive");
        ensure!(self.worker_count > 0, "worker count must be positive");
        ensure!(
            self.checkpoint_interval > 0,
            "checkpoint interval must be positive"
        );
        ensure!(
            self.max_chunk_length > 0,
            "max chunk length must be positive"
        );
        ensure!(
            self.funnel.shortlist_dimension > 0,
            "shortlist dimension must be positive"
        );
        ensure!(
            self.funnel.shortlist_factor > 0,
            "shortlist factor must be positive"
        );
        Ok(())
    }
}

impl Default for IndexerConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("."),
            snapshot_path: PathBuf::from(DEFAULT_SNAPSHOT_FILE),
            dimension: DEFAULT_DIMENSION,
            batch_size: DEFAULT_BATCH_SIZE,
            worker_count: DEFAULT_WORKERS,
            checkpoint_interval: DEFAULT_CHECKPOINT_INTERVAL,
            max_chunk_length: DEFAULT_CHUNK_LIMIT,
            funnel: FunnelConfig::default(),
        }
    }
}

/// Overrides loaded from a TOML config file.
///
/// Every field is optional; the CLI merges these under its command-line
/// flags (flag > file > default).
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    pub root: Option<PathBuf>,
    pub snapshot: Option<PathBuf>,
    pub dimension: Option<usize>,
    pub batch_size: Option<usize>,
    pub workers: Option<usize>,
    pub checkpoint_interval: Option<usize>,
    pub max_chunk_length: Option<usize>,
    pub shortlist_dimension: Option<usize>,
    pub shortlist_factor: Option<usize>,
    pub api_base: Option<String>,
    pub model: Option<String>,
    pub api_key: Option<String>,
}

impl FileConfig {
    /// Parse a TOML config file.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        toml::from_str(&raw)
            .with_context(|| format!("failed to parse config file {}", path.display()))
    }
}
