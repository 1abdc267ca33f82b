//! # funnel-embed
//!
//! The embedding-service boundary for the funnel indexing pipeline. The
//! rest of the workspace is written against the [`EmbeddingProvider`]
//! trait; this crate supplies the two implementations:
//!
//! - [`RemoteProvider`] talks to an OpenAI-compatible `/embeddings`
//!   endpoint and requests truncated (matryoshka) output dimensions, so a
//!   single stored vector serves both the coarse and the fine search
//!   stage.
//! - [`HashProvider`] derives deterministic unit vectors from text hashes
//!   with no network at all, for tests and credential-less operation.
//!
//! ## Quick Start
//!
//! ```no_run
//! use funnel_embed::{EmbedConfig, EmbeddingProvider, RemoteProvider};
//!
//! # async fn example() -> funnel_embed::Result<()> {
//! let provider = RemoteProvider::new(
//!     EmbedConfig::default().with_api_key("sk-..."),
//! )?;
//!
//! let texts = vec!["hello world".to_string()];
//! let vectors = provider.embed_batch(&texts).await?;
//! assert_eq!(vectors[0].len(), provider.dimension());
//! # Ok(())
//! # }
//! ```
//!
//! ## Error Handling
//!
//! All operations return [`Result<T>`] using the crate's [`EmbedError`]
//! type. Contract violations from the service (wrong vector count, wrong
//! dimension) are errors, never partial results, so callers can treat any
//! failed batch as contributing nothing.

pub mod config;
pub mod error;
pub mod provider;

// Re-export main types for easy access
pub use config::{DEFAULT_DIMENSION, EmbedConfig};
pub use error::{EmbedError, Result};
pub use provider::{EmbeddingProvider, HashProvider, RemoteProvider};
