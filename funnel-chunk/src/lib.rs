pub mod text;

// Re-export the chunking entry points for external use
pub use text::{Chunk, Chunker, DEFAULT_CHUNK_LIMIT};
