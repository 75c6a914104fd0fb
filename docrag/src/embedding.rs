//! Embedding provider trait and the batching, normalizing [`Embedder`] adapter.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::error::{RagError, Result};

/// A provider that generates vector embeddings from text input.
///
/// Implementations wrap specific embedding backends (Gemini, OpenAI, etc.)
/// behind a unified async interface. The default [`embed_batch`](EmbeddingProvider::embed_batch)
/// implementation calls [`embed`](EmbeddingProvider::embed) sequentially;
/// backends that support native batching should override it.
///
/// # Example
///
/// ```rust,ignore
/// use docrag::EmbeddingProvider;
///
/// let provider = MyEmbeddingProvider::new();
/// let embedding = provider.embed("hello world").await?;
/// assert_eq!(embedding.len(), provider.dimensions());
/// ```
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Generate an embedding vector for a single text input.
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Generate embedding vectors for a batch of text inputs.
    ///
    /// The default implementation calls [`embed`](EmbeddingProvider::embed)
    /// sequentially for each input. Override this method if the backend
    /// supports native batch embedding for better throughput.
    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        let mut results = Vec::with_capacity(texts.len());
        for text in texts {
            results.push(self.embed(text).await?);
        }
        Ok(results)
    }

    /// Generate an embedding for a search query.
    ///
    /// Defaults to [`embed`](EmbeddingProvider::embed). Backends that embed
    /// queries and documents asymmetrically should override it.
    async fn embed_query(&self, query: &str) -> Result<Vec<f32>> {
        self.embed(query).await
    }

    /// Return the dimensionality of embeddings produced by this provider.
    fn dimensions(&self) -> usize;

    /// Short provider name used in logs and errors.
    fn name(&self) -> &str {
        "custom"
    }
}

/// Scale `vector` to unit L2 norm in place.
///
/// Returns `false` (leaving the vector untouched) if its norm is zero or not finite.
pub fn l2_normalize(vector: &mut [f32]) -> bool {
    let norm = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm == 0.0 || !norm.is_finite() {
        return false;
    }
    vector.iter_mut().for_each(|x| *x /= norm);
    true
}

/// Maps ordered text batches to ordered, unit-length embeddings.
///
/// Requests are split into batches of `batch_size` texts; the output is
/// index-aligned with the input regardless of batch boundaries. Any provider
/// failure fails the whole call.
#[derive(Clone)]
pub struct Embedder {
    provider: Arc<dyn EmbeddingProvider>,
    batch_size: usize,
}

impl Embedder {
    /// Wrap `provider`, sending at most `batch_size` texts per request.
    pub fn new(provider: Arc<dyn EmbeddingProvider>, batch_size: usize) -> Self {
        Self { provider, batch_size: batch_size.max(1) }
    }

    /// Dimensionality advertised by the underlying provider.
    pub fn dimensions(&self) -> usize {
        self.provider.dimensions()
    }

    /// Name of the underlying provider.
    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    /// Embed every text, preserving order.
    ///
    /// An empty input returns an empty `Vec`.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Embedding`] if the provider fails, returns the wrong
    /// number of vectors, returns vectors of differing length, or returns a
    /// vector that cannot be normalized.
    pub async fn embed(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            warn!(provider = self.provider_name(), "no texts provided for embedding");
            return Ok(Vec::new());
        }

        info!(provider = self.provider_name(), count = texts.len(), "generating embeddings");
        let mut embeddings: Vec<Vec<f32>> = Vec::with_capacity(texts.len());

        for (batch_index, batch) in texts.chunks(self.batch_size).enumerate() {
            let vectors = self.provider.embed_batch(batch).await?;
            if vectors.len() != batch.len() {
                return Err(self.error(format!(
                    "provider returned {} embeddings for {} inputs",
                    vectors.len(),
                    batch.len()
                )));
            }

            for mut vector in vectors {
                let expected = embeddings.first().map_or(vector.len(), Vec::len);
                if expected != vector.len() {
                    return Err(self.error(format!(
                        "inconsistent embedding dimensions: {expected} and {}",
                        vector.len()
                    )));
                }
                if !l2_normalize(&mut vector) {
                    return Err(self.error("provider returned a zero or non-finite vector"));
                }
                embeddings.push(vector);
            }
            debug!(batch_index, batch_size = batch.len(), "embedded batch");
        }

        info!(provider = self.provider_name(), count = embeddings.len(), "generated embeddings");
        Ok(embeddings)
    }

    /// Embed a single query string through the provider's query path.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Embedding`] if the provider fails or returns a
    /// vector that cannot be normalized.
    pub async fn embed_query(&self, query: &str) -> Result<Vec<f32>> {
        let mut vector = self.provider.embed_query(query).await?;
        if !l2_normalize(&mut vector) {
            return Err(self.error("provider returned a zero or non-finite query vector"));
        }
        Ok(vector)
    }

    fn error(&self, message: impl Into<String>) -> RagError {
        RagError::Embedding { provider: self.provider_name().to_string(), message: message.into() }
    }
}

impl std::fmt::Debug for Embedder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Embedder")
            .field("provider", &self.provider.name())
            .field("batch_size", &self.batch_size)
            .finish()
    }
}
