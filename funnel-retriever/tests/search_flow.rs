//! Search behavior over an indexed corpus: ranking, tie-breaks, cache
//! refresh after incremental runs, and query failure surfacing.

use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use funnel_embed::{DEFAULT_DIMENSION, EmbedError, EmbeddingProvider, HashProvider};
use funnel_retriever::{Indexer, IndexerConfig};

/// Embeds normally until [`Self::go_offline`] flips it into failure mode.
struct ToggleProvider {
    inner: HashProvider,
    offline: AtomicBool,
}

impl ToggleProvider {
    fn new(dimension: usize) -> Arc<Self> {
        Arc::new(Self {
            inner: HashProvider::new(dimension),
            offline: AtomicBool::new(false),
        })
    }

    fn go_offline(&self) {
        self.offline.store(true, Ordering::Relaxed);
    }
}

#[async_trait]
impl EmbeddingProvider for ToggleProvider {
    async fn embed_batch(&self, texts: &[String]) -> funnel_embed::Result<Vec<Vec<f32>>> {
        if self.offline.load(Ordering::Relaxed) {
            return Err(EmbedError::invalid_config("service offline"));
        }
        self.inner.embed_batch(texts).await
    }

    fn dimension(&self) -> usize {
        self.inner.dimension()
    }

    fn provider_name(&self) -> &str {
        "toggle"
    }
}

fn write_file(dir: &Path, name: &str, contents: &str) {
    fs::create_dir_all(dir).unwrap();
    fs::write(dir.join(name), contents).unwrap();
}

async fn small_indexer(corpus: &Path, snapshot: &Path, dimension: usize) -> Indexer {
    let config = IndexerConfig::new(corpus)
        .with_snapshot_path(snapshot)
        .with_dimension(dimension)
        .with_batch_size(2)
        .with_workers(2);
    Indexer::open(config, Arc::new(HashProvider::new(dimension)))
        .await
        .unwrap()
}

#[tokio::test]
async fn hundred_entries_search_returns_exactly_top_k() {
    let dir = tempfile::tempdir().unwrap();
    let corpus = dir.path().join("corpus");
    let snapshot = dir.path().join("index.json");
    for i in 0..100 {
        write_file(
            &corpus,
            &format!("d{i:03}.txt"),
            &format!("document number {i:03} covering subject {i:03}"),
        );
    }

    // Full default geometry: dimension 768, batches of 5, 4 workers,
    // checkpoint every 20 merges.
    let config = IndexerConfig::new(&corpus).with_snapshot_path(&snapshot);
    let mut indexer = Indexer::open(config, Arc::new(HashProvider::new(DEFAULT_DIMENSION)))
        .await
        .unwrap();
    let report = indexer.run_indexing(None).await.unwrap();
    assert_eq!(report.chunks_embedded, 100);
    assert_eq!(report.checkpoints, 5);

    let hits = indexer
        .search("document number 042 covering subject 042", 5)
        .await
        .unwrap();
    assert_eq!(hits.len(), 5);
    assert!(hits[0].key.ends_with("d042.txt::main"));
    assert!(hits[0].score > 0.999);
    for pair in hits.windows(2) {
        assert!(pair[0].score > pair[1].score);
    }
    for hit in &hits {
        assert!((-1.0001..=1.0001).contains(&hit.score));
    }
}

#[tokio::test]
async fn equal_scores_resolve_in_key_order() {
    let dir = tempfile::tempdir().unwrap();
    let corpus = dir.path().join("corpus");
    for name in ["c.txt", "a.txt", "b.txt"] {
        write_file(&corpus, name, "identical text everywhere");
    }

    let mut indexer = small_indexer(&corpus, &dir.path().join("index.json"), 16).await;
    indexer.run_indexing(None).await.unwrap();

    let hits = indexer.search("identical text everywhere", 3).await.unwrap();
    assert_eq!(hits.len(), 3);
    assert!(hits[0].key.ends_with("a.txt::main"));
    assert!(hits[1].key.ends_with("b.txt::main"));
    assert!(hits[2].key.ends_with("c.txt::main"));
    assert_eq!(hits[0].score, hits[1].score);
    assert_eq!(hits[1].score, hits[2].score);
}

#[tokio::test]
async fn incremental_run_refreshes_search_results() {
    let dir = tempfile::tempdir().unwrap();
    let corpus = dir.path().join("corpus");
    write_file(&corpus, "old.txt", "ancient unrelated matter");

    let mut indexer = small_indexer(&corpus, &dir.path().join("index.json"), 16).await;
    indexer.run_indexing(None).await.unwrap();

    // First search builds the derived cache.
    let before = indexer.search("completely fresh topic", 5).await.unwrap();
    assert_eq!(before.len(), 1);
    assert!(before[0].key.ends_with("old.txt::main"));

    // A new file lands; the next run must invalidate that cache.
    write_file(&corpus, "new.txt", "completely fresh topic");
    indexer.run_indexing(None).await.unwrap();

    let after = indexer.search("completely fresh topic", 5).await.unwrap();
    assert_eq!(after.len(), 2);
    assert!(after[0].key.ends_with("new.txt::main"));
    assert!(after[0].score > 0.999);
}

#[tokio::test]
async fn snippets_carry_the_sanitized_text() {
    let dir = tempfile::tempdir().unwrap();
    let corpus = dir.path().join("corpus");
    write_file(&corpus, "doc.md", "![diagram](arch.png) plain words remain");

    let mut indexer = small_indexer(&corpus, &dir.path().join("index.json"), 16).await;
    indexer.run_indexing(None).await.unwrap();

    let hits = indexer.search("plain words remain", 1).await.unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].snippet, "plain words remain");
    assert!(hits[0].score > 0.999);
}

#[tokio::test]
async fn top_k_beyond_store_size_returns_everything() {
    let dir = tempfile::tempdir().unwrap();
    let corpus = dir.path().join("corpus");
    for (name, text) in [("a.txt", "one"), ("b.txt", "two"), ("c.txt", "three")] {
        write_file(&corpus, name, text);
    }

    let mut indexer = small_indexer(&corpus, &dir.path().join("index.json"), 16).await;
    indexer.run_indexing(None).await.unwrap();

    let hits = indexer.search("two", 10).await.unwrap();
    assert_eq!(hits.len(), 3);
}

#[tokio::test]
async fn repeated_searches_are_deterministic() {
    let dir = tempfile::tempdir().unwrap();
    let corpus = dir.path().join("corpus");
    for i in 0..10 {
        write_file(&corpus, &format!("f{i}.txt"), &format!("subject matter {i}"));
    }

    let mut indexer = small_indexer(&corpus, &dir.path().join("index.json"), 16).await;
    indexer.run_indexing(None).await.unwrap();

    let first = indexer.search("subject matter 3", 4).await.unwrap();
    let second = indexer.search("subject matter 3", 4).await.unwrap();
    let keys = |hits: &[funnel_retriever::SearchHit]| {
        hits.iter().map(|h| h.key.clone()).collect::<Vec<_>>()
    };
    assert_eq!(keys(&first), keys(&second));
    for (a, b) in first.iter().zip(&second) {
        assert_eq!(a.score, b.score);
    }
}

#[tokio::test]
async fn query_embedding_failure_surfaces_as_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let corpus = dir.path().join("corpus");
    write_file(&corpus, "a.txt", "content present");

    let provider = ToggleProvider::new(16);
    let config = IndexerConfig::new(&corpus)
        .with_snapshot_path(dir.path().join("index.json"))
        .with_dimension(16)
        .with_batch_size(2)
        .with_workers(2);
    let mut indexer = Indexer::open(config, provider.clone()).await.unwrap();
    indexer.run_indexing(None).await.unwrap();

    provider.go_offline();
    let result = indexer.search("content present", 3).await;
    assert!(result.is_err());
}
