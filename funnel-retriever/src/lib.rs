//! Semantic indexing and retrieval over a text corpus, with two-stage
//! matryoshka funnel search.
//!
//! The pipeline walks a corpus, chunks each document, skips chunks whose
//! content hash is already indexed, embeds the rest in concurrent batches,
//! and merges the results into an in-memory store that checkpoints to an
//! atomic JSON snapshot. Searches shortlist on the leading 64 embedding
//! dimensions, then rerank the shortlist at full dimension.
//!
//! ## Architecture
//!
//! ```text
//!  corpus ──> walker ──> chunker ──> hash dedup ──> batch workers
//!                                                       │
//!  snapshot <── checkpoints <── merge loop <────────────┘
//!                                   │
//!                              IndexStore ──> SearchCache ──> funnel search
//! ```
//!
//! ## Key Components
//!
//! - [`Indexer`] — the single handle: open, `run_indexing` / `reindex`,
//!   `search`.
//! - [`IndexerConfig`] — knobs with production defaults and `with_*`
//!   overrides.
//! - [`storage`] — the store, its derived search cache, and snapshot I/O.
//! - [`search`] — the two-stage funnel scoring.
//! - [`indexing`] — the walker and the concurrent batch dispatcher.
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use funnel_embed::HashProvider;
//! use funnel_retriever::{Indexer, IndexerConfig};
//!
//! # async fn run() -> anyhow::Result<()> {
//! let config = IndexerConfig::new("./docs").with_dimension(256);
//! let provider = Arc::new(HashProvider::new(256));
//!
//! let mut indexer = Indexer::open(config, provider).await?;
//! indexer.run_indexing(None).await?;
//!
//! for hit in indexer.search("how are snapshots written", 5).await? {
//!     println!("{:.3}  {}", hit.score, hit.key);
//! }
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod indexing;
pub mod search;
pub mod storage;

pub use config::{FileConfig, IndexerConfig};
pub use indexing::{CancelFlag, Indexer, IndexingReport};
pub use search::{FunnelConfig, SearchHit};
pub use storage::{IndexEntry, IndexStore, SearchCache};
