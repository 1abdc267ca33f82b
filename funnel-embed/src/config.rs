//! Configuration for embedding providers

use crate::error::{EmbedError, Result};
use std::time::Duration;

/// Default embedding dimension requested from providers.
pub const DEFAULT_DIMENSION: usize = 768;

/// Default per-request timeout for remote providers.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Configuration for embedding providers.
///
/// The remote provider reads every field; the offline hash provider only
/// uses `dimension`. Credentials are passed in by the composing
/// application, never read from the environment here.
#[derive(Debug, Clone)]
pub struct EmbedConfig {
    /// Base URL of the embeddings API, e.g. `https://api.openai.com/v1`
    pub api_base: String,
    /// Model identifier sent with each request
    pub model: String,
    /// API credential; [`RemoteProvider`](crate::RemoteProvider) refuses to
    /// build without one
    pub api_key: Option<String>,
    /// Requested vector dimension
    pub dimension: usize,
    /// Per-request timeout
    pub timeout: Duration,
}

impl EmbedConfig {
    /// Create a configuration for the given endpoint and model.
    pub fn new(api_base: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            api_base: api_base.into(),
            model: model.into(),
            api_key: None,
            dimension: DEFAULT_DIMENSION,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Set the API credential (builder style)
    pub fn with_api_key(self, api_key: impl Into<String>) -> Self {
        Self {
            api_key: Some(api_key.into()),
            ..self
        }
    }

    /// Set the requested vector dimension (builder style)
    pub fn with_dimension(self, dimension: usize) -> Self {
        Self { dimension, ..self }
    }

    /// Set the per-request timeout (builder style)
    pub fn with_timeout(self, timeout: Duration) -> Self {
        Self { timeout, ..self }
    }

    /// Validate the configuration before building a provider.
    pub fn validate(&self) -> Result<()> {
        if self.api_base.trim().is_empty() {
            return Err(EmbedError::invalid_config("api_base must not be empty"));
        }
        if self.model.trim().is_empty() {
            return Err(EmbedError::invalid_config("model must not be empty"));
        }
        if self.dimension == 0 {
            return Err(EmbedError::invalid_config("dimension must be non-zero"));
        }
        tracing::debug!(
            "Embedding configuration valid: {} at {} dims",
            self.model,
            self.dimension
        );
        Ok(())
    }
}

impl Default for EmbedConfig {
    fn default() -> Self {
        Self::new("https://api.openai.com/v1", "text-embedding-3-small")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = EmbedConfig::default();
        assert_eq!(config.dimension, DEFAULT_DIMENSION);
        assert_eq!(config.timeout, DEFAULT_TIMEOUT);
        assert!(config.api_key.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_builder_methods() {
        let config = EmbedConfig::new("https://embed.example.com/v1", "test-model")
            .with_api_key("sk-test")
            .with_dimension(64)
            .with_timeout(Duration::from_secs(5));

        assert_eq!(config.api_key.as_deref(), Some("sk-test"));
        assert_eq!(config.dimension, 64);
        assert_eq!(config.timeout, Duration::from_secs(5));
    }

    #[test]
    fn test_config_validation_rejects_bad_values() {
        assert!(EmbedConfig::new("", "model").validate().is_err());
        assert!(EmbedConfig::new("https://x", "").validate().is_err());
        assert!(
            EmbedConfig::default()
                .with_dimension(0)
                .validate()
                .is_err()
        );
    }
}
