//! Corpus indexing: file discovery, concurrent batch embedding, and the
//! engine that drives them.

pub mod dispatcher;
pub mod engine;
pub mod walker;

pub use dispatcher::{BatchDispatcher, BatchOutcome, CancelFlag, EmbeddedChunk, PendingChunk};
pub use engine::{Indexer, IndexingReport};
pub use walker::scan_files;
