//! Concurrent batch embedding.
//!
//! Pending chunks are split into fixed-size batches and pushed onto a shared
//! queue; a small pool of workers drains the queue, calls the embedding
//! provider, and sends finished batches on a results channel. Workers never
//! touch the index store — the caller's merge loop is the only consumer of
//! the results channel and the only writer of the store, so no store locking
//! is needed during a run.
//!
//! A batch that fails to embed (or fails count/length validation) is logged
//! at error level and contributes nothing; sibling batches are unaffected.
//! Nothing is retried within a run.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use funnel_embed::EmbeddingProvider;
use tracing::{debug, error};

use crate::config::SNIPPET_LENGTH;
use crate::storage::content_digest;

/// Cooperative cancellation for an indexing run.
///
/// Workers check the flag before taking another batch; a batch already being
/// embedded finishes normally, and progress up to the last checkpoint
/// survives.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// A chunk awaiting embedding: its store key and sanitized text.
#[derive(Debug, Clone)]
pub struct PendingChunk {
    pub key: String,
    pub text: String,
}

/// A chunk that came back from the provider, ready to merge.
#[derive(Debug, Clone)]
pub struct EmbeddedChunk {
    pub key: String,
    pub vector: Vec<f32>,
    pub hash: String,
    pub snippet: String,
}

/// The result of one batch.
#[derive(Debug)]
pub enum BatchOutcome {
    Embedded(Vec<EmbeddedChunk>),
    Failed,
}

/// Fans pending chunks out to embedding workers.
pub struct BatchDispatcher {
    provider: Arc<dyn EmbeddingProvider>,
    batch_size: usize,
    worker_count: usize,
    cancel: CancelFlag,
}

impl BatchDispatcher {
    pub fn new(
        provider: Arc<dyn EmbeddingProvider>,
        batch_size: usize,
        worker_count: usize,
        cancel: CancelFlag,
    ) -> Self {
        Self {
            provider,
            batch_size,
            worker_count,
            cancel,
        }
    }

    /// Queue `pending` in batches and spawn the worker pool.
    ///
    /// Returns the results channel; it closes once every worker has exited,
    /// which is how the merge loop knows the run is drained. Batch completion
    /// order is unspecified.
    pub fn dispatch(&self, pending: Vec<PendingChunk>) -> flume::Receiver<BatchOutcome> {
        let mut batches: Vec<Vec<PendingChunk>> = Vec::new();
        let mut iter = pending.into_iter().peekable();
        while iter.peek().is_some() {
            batches.push(iter.by_ref().take(self.batch_size).collect());
        }

        let (result_tx, result_rx) = flume::unbounded();
        if batches.is_empty() {
            return result_rx;
        }

        let worker_count = self.worker_count.min(batches.len()).max(1);
        let (batch_tx, batch_rx) = flume::unbounded();
        for batch in batches {
            // Unbounded and pre-filled, so send never blocks or fails here.
            let _ = batch_tx.send(batch);
        }
        drop(batch_tx);

        debug!(workers = worker_count, "spawning embedding workers");
        for worker_id in 0..worker_count {
            let provider = Arc::clone(&self.provider);
            let batch_rx = batch_rx.clone();
            let result_tx = result_tx.clone();
            let cancel = self.cancel.clone();
            tokio::spawn(async move {
                loop {
                    if cancel.is_cancelled() {
                        debug!(worker_id, "cancellation requested, worker stopping");
                        break;
                    }
                    let Ok(batch) = batch_rx.recv_async().await else {
                        break;
                    };
                    let outcome = process_batch(provider.as_ref(), batch).await;
                    if result_tx.send_async(outcome).await.is_err() {
                        break;
                    }
                }
            });
        }
        result_rx
    }
}

/// Embed one batch and turn it into mergeable records.
///
/// The hash is computed over the exact text that was embedded, and the
/// snippet is its first [`SNIPPET_LENGTH`] characters. Any provider error or
/// contract violation fails the whole batch.
async fn process_batch(provider: &dyn EmbeddingProvider, batch: Vec<PendingChunk>) -> BatchOutcome {
    let texts: Vec<String> = batch.iter().map(|chunk| chunk.text.clone()).collect();
    let vectors = match provider.embed_batch(&texts).await {
        Ok(vectors) => vectors,
        Err(err) => {
            error!(batch_size = batch.len(), error = %err, "embedding batch failed, dropping batch");
            return BatchOutcome::Failed;
        }
    };

    // The provider contract already enforces these; guard the merge against
    // a misbehaving implementation anyway.
    if vectors.len() != batch.len() {
        error!(
            expected = batch.len(),
            received = vectors.len(),
            "embedding batch returned wrong vector count, dropping batch"
        );
        return BatchOutcome::Failed;
    }
    let dimension = provider.dimension();
    if let Some(bad) = vectors.iter().find(|vector| vector.len() != dimension) {
        error!(
            expected = dimension,
            received = bad.len(),
            "embedding batch returned wrong vector length, dropping batch"
        );
        return BatchOutcome::Failed;
    }

    let entries = batch
        .into_iter()
        .zip(vectors)
        .map(|(chunk, vector)| EmbeddedChunk {
            hash: content_digest(&chunk.text),
            snippet: chunk.text.chars().take(SNIPPET_LENGTH).collect(),
            key: chunk.key,
            vector,
        })
        .collect();
    BatchOutcome::Embedded(entries)
}
