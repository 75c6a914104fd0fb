//! Configuration for the RAG pipeline.
//!
//! [`RagConfig`] carries the pipeline's tuning parameters and is validated by
//! [`RagConfigBuilder::build`]. [`ServiceConfig`] carries endpoints and
//! credentials for the external collaborators. Both are built once and then
//! handed to the components that need them.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{RagError, Result};

/// How point ids are assigned when chunks are written to the index.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum PointIdStrategy {
    /// A UUIDv5 derived from `(document_id, sequence_index)`.
    ///
    /// Re-ingesting a document overwrites its own points and never those of
    /// another document.
    #[default]
    Deterministic,
    /// The chunk's position within the ingestion run (`0, 1, 2, …`).
    ///
    /// Two documents ingested into the same collection overwrite each other.
    Positional,
}

/// Bounded exponential backoff applied to transient index write failures.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one.
    pub max_attempts: usize,
    /// Delay before the first retry.
    pub min_delay: Duration,
    /// Upper bound for any single delay.
    pub max_delay: Duration,
    /// Growth factor between consecutive delays.
    pub factor: f32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            min_delay: Duration::from_secs(4),
            max_delay: Duration::from_secs(10),
            factor: 2.0,
        }
    }
}

/// Configuration parameters for the RAG pipeline.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RagConfig {
    /// Name of the vector index collection.
    pub collection: String,
    /// Maximum chunk size in characters.
    pub chunk_size: usize,
    /// Number of overlapping characters between consecutive chunks.
    pub chunk_overlap: usize,
    /// Number of matches returned by a query.
    pub top_k: usize,
    /// Number of points written per index request.
    pub upsert_batch_size: usize,
    /// Number of texts sent per embedding request.
    pub embed_batch_size: usize,
    /// Collection dimension used when no embedding has been observed yet.
    pub fallback_dimension: usize,
    /// Static provenance tag for every chunk. Defaults to the document id.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_label: Option<String>,
    /// Point id assignment.
    pub point_ids: PointIdStrategy,
    /// Retry policy for index writes.
    pub retry: RetryPolicy,
}

impl Default for RagConfig {
    fn default() -> Self {
        Self {
            collection: "rag_collection".to_string(),
            chunk_size: 1000,
            chunk_overlap: 150,
            top_k: 3,
            upsert_batch_size: 100,
            embed_batch_size: 16,
            fallback_dimension: 768,
            source_label: None,
            point_ids: PointIdStrategy::default(),
            retry: RetryPolicy::default(),
        }
    }
}

impl RagConfig {
    /// Create a new builder for constructing a [`RagConfig`].
    pub fn builder() -> RagConfigBuilder {
        RagConfigBuilder::default()
    }

    /// Check that the parameters are consistent.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Config`] if:
    /// - `chunk_overlap >= chunk_size`
    /// - `top_k == 0`
    /// - either batch size is zero
    /// - the collection name is empty
    /// - `retry.max_attempts == 0`
    pub fn validate(&self) -> Result<()> {
        if self.chunk_overlap >= self.chunk_size {
            return Err(RagError::Config(format!(
                "chunk_overlap ({}) must be less than chunk_size ({})",
                self.chunk_overlap, self.chunk_size
            )));
        }
        if self.top_k == 0 {
            return Err(RagError::Config("top_k must be greater than zero".to_string()));
        }
        if self.upsert_batch_size == 0 || self.embed_batch_size == 0 {
            return Err(RagError::Config("batch sizes must be greater than zero".to_string()));
        }
        if self.collection.trim().is_empty() {
            return Err(RagError::Config("collection name must not be empty".to_string()));
        }
        if self.retry.max_attempts == 0 {
            return Err(RagError::Config("retry.max_attempts must be at least 1".to_string()));
        }
        Ok(())
    }
}

/// Builder for constructing a validated [`RagConfig`].
#[derive(Debug, Clone, Default)]
pub struct RagConfigBuilder {
    config: RagConfig,
}

impl RagConfigBuilder {
    /// Set the collection name.
    pub fn collection(mut self, name: impl Into<String>) -> Self {
        self.config.collection = name.into();
        self
    }

    /// Set the maximum chunk size in characters.
    pub fn chunk_size(mut self, size: usize) -> Self {
        self.config.chunk_size = size;
        self
    }

    /// Set the overlap between consecutive chunks in characters.
    pub fn chunk_overlap(mut self, overlap: usize) -> Self {
        self.config.chunk_overlap = overlap;
        self
    }

    /// Set the number of matches returned by a query.
    pub fn top_k(mut self, k: usize) -> Self {
        self.config.top_k = k;
        self
    }

    /// Set the number of points written per index request.
    pub fn upsert_batch_size(mut self, size: usize) -> Self {
        self.config.upsert_batch_size = size;
        self
    }

    /// Set the number of texts sent per embedding request.
    pub fn embed_batch_size(mut self, size: usize) -> Self {
        self.config.embed_batch_size = size;
        self
    }

    /// Set the dimension used to create a collection before any embedding exists.
    pub fn fallback_dimension(mut self, dimension: usize) -> Self {
        self.config.fallback_dimension = dimension;
        self
    }

    /// Tag every chunk with a fixed label instead of its document id.
    pub fn source_label(mut self, label: impl Into<String>) -> Self {
        self.config.source_label = Some(label.into());
        self
    }

    /// Set the point id strategy.
    pub fn point_ids(mut self, strategy: PointIdStrategy) -> Self {
        self.config.point_ids = strategy;
        self
    }

    /// Set the retry policy for index writes.
    pub fn retry(mut self, policy: RetryPolicy) -> Self {
        self.config.retry = policy;
        self
    }

    /// Build the [`RagConfig`], validating that parameters are consistent.
    ///
    /// # Errors
    ///
    /// See [`RagConfig::validate`].
    pub fn build(self) -> Result<RagConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

/// Endpoints and credentials for the external collaborators.
#[derive(Clone)]
pub struct ServiceConfig {
    /// Qdrant endpoint (`QDRANT_API_URL`).
    pub qdrant_url: String,
    /// Qdrant API key (`QDRANT_API_KEY`).
    pub qdrant_api_key: String,
    /// Convex deployment URL (`CONVEX_URL`).
    pub convex_url: String,
    /// Gemini API key (`GEMINI_API_KEY`).
    pub gemini_api_key: Option<String>,
    /// OpenAI API key (`OPENAI_API_KEY`).
    pub openai_api_key: Option<String>,
    /// Request and connect timeout for the vector index.
    pub index_timeout: Duration,
}

impl std::fmt::Debug for ServiceConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceConfig")
            .field("qdrant_url", &self.qdrant_url)
            .field("qdrant_api_key", &"<redacted>")
            .field("convex_url", &self.convex_url)
            .field("gemini_api_key", &self.gemini_api_key.as_ref().map(|_| "<redacted>"))
            .field("openai_api_key", &self.openai_api_key.as_ref().map(|_| "<redacted>"))
            .field("index_timeout", &self.index_timeout)
            .finish()
    }
}

impl ServiceConfig {
    /// Default request timeout for the vector index.
    pub const DEFAULT_INDEX_TIMEOUT: Duration = Duration::from_secs(60);

    /// Read the configuration from process environment variables.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Config`] naming the first required variable that is
    /// missing or blank.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read the configuration through an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let optional = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let required = |key: &str| {
            optional(key).ok_or_else(|| {
                RagError::Config(format!("{key} not found in environment variables"))
            })
        };

        Ok(Self {
            qdrant_url: required("QDRANT_API_URL")?,
            qdrant_api_key: required("QDRANT_API_KEY")?,
            convex_url: required("CONVEX_URL")?,
            gemini_api_key: optional("GEMINI_API_KEY"),
            openai_api_key: optional("OPENAI_API_KEY"),
            index_timeout: Self::DEFAULT_INDEX_TIMEOUT,
        })
    }

    /// Return the Gemini API key or a configuration error.
    pub fn require_gemini_key(&self) -> Result<&str> {
        self.gemini_api_key
            .as_deref()
            .ok_or_else(|| RagError::Config("GEMINI_API_KEY not found in environment variables".into()))
    }

    /// Return the OpenAI API key or a configuration error.
    pub fn require_openai_key(&self) -> Result<&str> {
        self.openai_api_key
            .as_deref()
            .ok_or_else(|| RagError::Config("OPENAI_API_KEY not found in environment variables".into()))
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let config = RagConfig::default();
        assert_eq!(config.chunk_size, 1000);
        assert_eq!(config.chunk_overlap, 150);
        assert_eq!(config.top_k, 3);
        assert_eq!(config.upsert_batch_size, 100);
        assert_eq!(config.fallback_dimension, 768);
        assert_eq!(config.collection, "rag_collection");
        assert_eq!(config.retry.max_attempts, 3);
        assert_eq!(config.retry.min_delay, Duration::from_secs(4));
        assert_eq!(config.retry.max_delay, Duration::from_secs(10));
        assert!(RagConfig::builder().build().is_ok());
    }

    #[test]
    fn rejects_overlap_not_below_chunk_size() {
        let err = RagConfig::builder().chunk_size(100).chunk_overlap(100).build().unwrap_err();
        assert!(matches!(err, RagError::Config(_)));

        let err = RagConfig::builder().chunk_size(100).chunk_overlap(150).build().unwrap_err();
        assert!(err.to_string().contains("chunk_overlap (150)"));
    }

    #[test]
    fn rejects_zero_sizes() {
        assert!(RagConfig::builder().top_k(0).build().is_err());
        assert!(RagConfig::builder().upsert_batch_size(0).build().is_err());
        assert!(RagConfig::builder().embed_batch_size(0).build().is_err());
        assert!(RagConfig::builder().collection("  ").build().is_err());
        let retry = RetryPolicy { max_attempts: 0, ..RetryPolicy::default() };
        assert!(RagConfig::builder().retry(retry).build().is_err());
    }

    #[test]
    fn validate_catches_struct_literal_configs() {
        let config = RagConfig { top_k: 0, ..RagConfig::default() };
        assert!(matches!(config.validate(), Err(RagError::Config(_))));
        let config = RagConfig { collection: String::new(), ..RagConfig::default() };
        assert!(config.validate().is_err());
        assert!(RagConfig::default().validate().is_ok());
    }

    #[test]
    fn config_round_trips_through_json() {
        let config = RagConfig::builder()
            .source_label("test_source")
            .point_ids(PointIdStrategy::Positional)
            .build()
            .unwrap();
        let json = serde_json::to_string(&config).unwrap();
        assert!(json.contains("\"point_ids\":\"positional\""));
        let back: RagConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back, config);
    }

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> =
            vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn service_config_requires_index_and_store_settings() {
        let err = ServiceConfig::from_lookup(lookup(&[("QDRANT_API_URL", "http://q:6334")]))
            .unwrap_err();
        assert!(err.to_string().contains("QDRANT_API_KEY"));

        let err = ServiceConfig::from_lookup(lookup(&[
            ("QDRANT_API_URL", "http://q:6334"),
            ("QDRANT_API_KEY", "secret"),
            ("CONVEX_URL", "   "),
        ]))
        .unwrap_err();
        assert!(err.to_string().contains("CONVEX_URL"));
    }

    #[test]
    fn service_config_reads_optional_keys() {
        let config = ServiceConfig::from_lookup(lookup(&[
            ("QDRANT_API_URL", "http://q:6334"),
            ("QDRANT_API_KEY", "secret"),
            ("CONVEX_URL", "https://example.convex.cloud"),
            ("GEMINI_API_KEY", "g-key"),
        ]))
        .unwrap();
        assert_eq!(config.require_gemini_key().unwrap(), "g-key");
        assert!(config.require_openai_key().is_err());
        assert_eq!(config.index_timeout, ServiceConfig::DEFAULT_INDEX_TIMEOUT);

        let debug = format!("{config:?}");
        assert!(!debug.contains("secret"));
        assert!(!debug.contains("g-key"));
    }
}
