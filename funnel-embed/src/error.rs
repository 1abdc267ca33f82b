//! Error types for the embedding service boundary

/// Result type for embedding operations.
///
/// This is a convenience type alias that uses [`EmbedError`] as the error type.
/// Used throughout the crate for operations that can fail.
pub type Result<T> = std::result::Result<T, EmbedError>;

/// Error type for all embedding operations.
///
/// Covers the failure modes of talking to an embedding service: refusing to
/// construct a client without a credential, transport failures, non-success
/// responses, and responses that break the service contract (wrong vector
/// count or wrong vector dimension). Contract breaks are errors rather than
/// partial results so a caller can never merge a half-valid batch.
#[derive(Debug, thiserror::Error)]
pub enum EmbedError {
    /// No API credential was supplied for a provider that requires one
    #[error("missing API credential for the {provider} embedding provider")]
    MissingCredential { provider: String },

    /// Provider configuration rejected at construction
    #[error("invalid embedding configuration: {message}")]
    InvalidConfig { message: String },

    /// Transport-level failure talking to the embedding service
    #[error("embedding request failed: {source}")]
    Transport {
        #[from]
        source: reqwest::Error,
    },

    /// The service answered with a non-success status
    #[error("embedding service returned HTTP {status}: {body}")]
    Service { status: u16, body: String },

    /// The service returned a different number of vectors than texts sent
    #[error("embedding count mismatch: sent {expected} texts, received {received} vectors")]
    CountMismatch { expected: usize, received: usize },

    /// A returned vector does not have the configured dimension
    #[error("embedding dimension mismatch: expected {expected}, received {received}")]
    DimensionMismatch { expected: usize, received: usize },
}

impl EmbedError {
    /// Create an invalid configuration error with a custom message.
    pub fn invalid_config<S: Into<String>>(message: S) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }

    /// Create a missing credential error naming the provider.
    pub fn missing_credential<S: Into<String>>(provider: S) -> Self {
        Self::MissingCredential {
            provider: provider.into(),
        }
    }
}
