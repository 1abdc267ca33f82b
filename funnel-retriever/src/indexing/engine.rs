//! The indexing engine.
//!
//! [`Indexer`] is the one handle over the whole pipeline:
//!
//! ```text
//! walker ──> chunker ──> dedup ──> dispatcher ──> merge ──> store ──> snapshot
//!                        (hash)    (workers)     (single)          (periodic)
//! ```
//!
//! Construction loads the snapshot (or starts empty). `run_indexing` takes
//! `&mut self` and `search` takes `&self`, so the borrow checker guarantees
//! no search observes a half-merged store within one process. There is no
//! global instance; callers own their `Indexer` and drop it when done.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, ensure};
use funnel_chunk::Chunker;
use funnel_embed::EmbeddingProvider;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::config::IndexerConfig;
use crate::indexing::dispatcher::{BatchDispatcher, BatchOutcome, CancelFlag, PendingChunk};
use crate::indexing::walker::scan_files;
use crate::search::{SearchHit, funnel_rank};
use crate::storage::{IndexEntry, IndexStore, SearchCache, content_digest, snapshot};

/// Counters from one indexing run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IndexingReport {
    /// Files considered, after the optional limit.
    pub files_scanned: usize,
    /// Files that could not be read.
    pub files_failed: usize,
    /// Non-empty chunks produced by the chunker.
    pub chunks_planned: usize,
    /// Chunks skipped because the store already had them.
    pub chunks_up_to_date: usize,
    /// Chunks embedded and merged this run.
    pub chunks_embedded: usize,
    /// Batches that failed and contributed nothing.
    pub batches_failed: usize,
    /// Snapshot writes performed.
    pub checkpoints: usize,
}

/// Indexing and search over one corpus, backed by one snapshot file.
pub struct Indexer {
    config: IndexerConfig,
    provider: Arc<dyn EmbeddingProvider>,
    chunker: Chunker,
    store: IndexStore,
    search_cache: RwLock<Option<Arc<SearchCache>>>,
    cancel: CancelFlag,
}

impl Indexer {
    /// Load (or initialize) the index behind `config.snapshot_path`.
    ///
    /// Fails when the config is invalid or the provider's dimension does
    /// not match the configured one; a missing or corrupt snapshot is not
    /// an error, it just means starting empty.
    pub async fn open(
        config: IndexerConfig,
        provider: Arc<dyn EmbeddingProvider>,
    ) -> anyhow::Result<Self> {
        config.validate()?;
        ensure!(
            provider.dimension() == config.dimension,
            "provider dimension {} does not match configured dimension {}",
            provider.dimension(),
            config.dimension
        );

        let store = snapshot::load(&config.snapshot_path, config.dimension).await;
        info!(
            entries = store.len(),
            snapshot = %config.snapshot_path.display(),
            provider = provider.provider_name(),
            "index opened"
        );
        let chunker = Chunker::new(config.max_chunk_length);
        Ok(Self {
            config,
            provider,
            chunker,
            store,
            search_cache: RwLock::new(None),
            cancel: CancelFlag::new(),
        })
    }

    /// A clonable handle that cancels the current (or next) indexing run.
    pub fn cancel_handle(&self) -> CancelFlag {
        self.cancel.clone()
    }

    pub fn entry_count(&self) -> usize {
        self.store.len()
    }

    pub fn config(&self) -> &IndexerConfig {
        &self.config
    }

    /// Incrementally index the corpus: walk, chunk, skip up-to-date chunks,
    /// embed the rest in concurrent batches, merge, checkpoint.
    ///
    /// `limit` caps how many files are processed (in sorted path order).
    /// Per-file read failures and per-batch embedding failures are logged
    /// and skipped; the run itself only fails on invariant violations.
    pub async fn run_indexing(&mut self, limit: Option<usize>) -> anyhow::Result<IndexingReport> {
        let mut report = IndexingReport::default();

        let mut files = scan_files(&self.config.root);
        if let Some(limit) = limit {
            files.truncate(limit);
        }
        report.files_scanned = files.len();
        info!(
            files = files.len(),
            root = %self.config.root.display(),
            "indexing run started"
        );

        let pending = self.plan_chunks(&files, &mut report).await;
        if pending.is_empty() {
            info!(
                up_to_date = report.chunks_up_to_date,
                "index up to date, nothing to embed"
            );
            self.checkpoint(&mut report).await;
            return Ok(report);
        }

        info!(
            chunks = pending.len(),
            batch_size = self.config.batch_size,
            workers = self.config.worker_count,
            provider = self.provider.provider_name(),
            "embedding changed chunks"
        );
        let dispatcher = BatchDispatcher::new(
            Arc::clone(&self.provider),
            self.config.batch_size,
            self.config.worker_count,
            self.cancel.clone(),
        );
        let results = dispatcher.dispatch(pending);

        // Single consumer: this loop is the only writer of the store. The
        // channel closes when every worker has exited.
        let mut since_checkpoint = 0usize;
        while let Ok(outcome) = results.recv_async().await {
            match outcome {
                BatchOutcome::Embedded(chunks) => {
                    for chunk in chunks {
                        debug!(key = %chunk.key, "merged chunk");
                        self.store.insert(
                            chunk.key,
                            IndexEntry {
                                vector: chunk.vector,
                                hash: chunk.hash,
                                snippet: chunk.snippet,
                            },
                        );
                        report.chunks_embedded += 1;
                        since_checkpoint += 1;
                        if since_checkpoint >= self.config.checkpoint_interval {
                            self.checkpoint(&mut report).await;
                            since_checkpoint = 0;
                        }
                    }
                }
                BatchOutcome::Failed => report.batches_failed += 1,
            }
        }

        // Always checkpoint at the end; the save elides the write when the
        // interval checkpoints already caught everything.
        self.checkpoint(&mut report).await;

        if self.cancel.is_cancelled() {
            info!("indexing run cancelled, progress up to the last checkpoint is saved");
        }
        info!(
            embedded = report.chunks_embedded,
            up_to_date = report.chunks_up_to_date,
            failed_batches = report.batches_failed,
            checkpoints = report.checkpoints,
            entries = self.store.len(),
            "indexing run finished"
        );
        Ok(report)
    }

    /// Drop every entry and rebuild the index from scratch; every chunk
    /// re-embeds.
    pub async fn reindex(&mut self, limit: Option<usize>) -> anyhow::Result<IndexingReport> {
        info!(entries = self.store.len(), "clearing index for full rebuild");
        self.store.clear();
        self.run_indexing(limit).await
    }

    /// Two-stage funnel search; returns at most `top_k` hits, best first.
    ///
    /// An empty index returns no hits without calling the provider. A
    /// query-embedding failure is the one search error that reaches the
    /// caller.
    pub async fn search(&self, query: &str, top_k: usize) -> anyhow::Result<Vec<SearchHit>> {
        if self.store.is_empty() {
            debug!("search on empty index");
            return Ok(Vec::new());
        }

        let query_vector = self
            .provider
            .embed_text(query)
            .await
            .context("failed to embed search query")?;
        let cache = self.load_search_cache().await;
        let hits = funnel_rank(&cache, &query_vector, &self.config.funnel, top_k)
            .into_iter()
            .map(|(row, score)| {
                let key = cache.key(row).to_string();
                let snippet = self
                    .store
                    .get(&key)
                    .map(|entry| entry.snippet.clone())
                    .unwrap_or_default();
                SearchHit { key, score, snippet }
            })
            .collect();
        Ok(hits)
    }

    /// Walk the corpus and collect the chunks that need embedding.
    async fn plan_chunks(
        &self,
        files: &[PathBuf],
        report: &mut IndexingReport,
    ) -> Vec<PendingChunk> {
        let mut pending = Vec::new();
        for path in files {
            let raw = match tokio::fs::read(path).await {
                Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
                Err(err) => {
                    warn!(path = %path.display(), error = %err, "failed to read file, skipping");
                    report.files_failed += 1;
                    continue;
                }
            };
            for chunk in self.chunker.chunk(&raw) {
                let text = self.chunker.sanitize(&chunk.text);
                if text.is_empty() {
                    continue;
                }
                report.chunks_planned += 1;
                let key = format!("{}{}", path.display(), chunk.suffix);
                let hash = content_digest(&text);
                if self.store.is_current(&key, &hash, self.config.dimension) {
                    report.chunks_up_to_date += 1;
                    continue;
                }
                pending.push(PendingChunk { key, text });
            }
        }
        pending
    }

    /// Persist the store if it changed. Failures are logged and retried at
    /// the next checkpoint; in-memory progress is never lost to a failed
    /// write.
    async fn checkpoint(&mut self, report: &mut IndexingReport) {
        match snapshot::save(
            &mut self.store,
            &self.config.snapshot_path,
            self.config.dimension,
        )
        .await
        {
            Ok(true) => {
                report.checkpoints += 1;
                info!(entries = self.store.len(), "checkpoint saved");
            }
            Ok(false) => {}
            Err(err) => warn!(error = %err, "checkpoint failed, keeping in-memory progress"),
        }
    }

    /// Lazily (re)build the derived search cache, double-checked so
    /// concurrent searches rebuild it at most once per store generation.
    async fn load_search_cache(&self) -> Arc<SearchCache> {
        {
            let guard = self.search_cache.read().await;
            if let Some(cache) = guard.as_ref() {
                if cache.is_current(&self.store) {
                    return Arc::clone(cache);
                }
            }
        }

        let mut guard = self.search_cache.write().await;
        if let Some(cache) = guard.as_ref() {
            if cache.is_current(&self.store) {
                return Arc::clone(cache);
            }
        }
        debug!(entries = self.store.len(), "rebuilding search cache");
        let cache = Arc::new(SearchCache::build(&self.store, self.config.dimension));
        *guard = Some(Arc::clone(&cache));
        cache
    }
}
