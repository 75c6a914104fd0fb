//! Batched, retrying writes into a single collection.
//!
//! The [`IndexWriter`] is the only component that creates, fills, or drops
//! the pipeline's collection. Each batch is written independently: batches
//! committed before a failure stay committed.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use backon::{ExponentialBuilder, Retryable};
use tracing::{debug, error, info, warn};

use crate::config::{PointIdStrategy, RagConfig, RetryPolicy};
use crate::document::{Chunk, IndexedPoint, Payload, PointId};
use crate::error::{RagError, Result};
use crate::vectorstore::{Distance, VectorIndex};

/// Writes points into one collection of a [`VectorIndex`].
///
/// # Example
///
/// ```rust,ignore
/// use docrag::{Distance, IndexWriter, InMemoryVectorIndex, RagConfig};
///
/// let writer = IndexWriter::from_config(Arc::new(InMemoryVectorIndex::new()), &RagConfig::default());
/// writer.ensure_collection(768, Distance::Cosine).await?;
/// writer.upsert(&points).await?;
/// ```
#[derive(Clone)]
pub struct IndexWriter {
    index: Arc<dyn VectorIndex>,
    collection: String,
    batch_size: usize,
    retry: RetryPolicy,
}

impl IndexWriter {
    /// Create a writer for `collection`, sending `batch_size` points per request.
    pub fn new(
        index: Arc<dyn VectorIndex>,
        collection: impl Into<String>,
        batch_size: usize,
        retry: RetryPolicy,
    ) -> Self {
        Self { index, collection: collection.into(), batch_size: batch_size.max(1), retry }
    }

    /// Create a writer using the collection, batch size and retry policy of `config`.
    pub fn from_config(index: Arc<dyn VectorIndex>, config: &RagConfig) -> Self {
        Self::new(index, config.collection.clone(), config.upsert_batch_size, config.retry.clone())
    }

    /// The collection this writer owns.
    pub fn collection(&self) -> &str {
        &self.collection
    }

    /// Create the collection unless it exists.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Config`] if the collection exists with a different
    /// dimension or metric, or the index error if the lookup or creation fails.
    pub async fn ensure_collection(&self, dimension: usize, distance: Distance) -> Result<()> {
        let collection = self.collection.as_str();
        let existing = self
            .index
            .collection_info(collection)
            .await
            .map_err(|e| e.context(format!("looking up collection '{collection}'")))?;

        match existing {
            Some(info) if info.dimension == dimension && info.distance == distance => {
                debug!(collection, dimension, "collection already exists");
                Ok(())
            }
            Some(info) => {
                error!(collection, existing = ?info, dimension, ?distance, "collection shape mismatch");
                Err(RagError::Config(format!(
                    "collection '{collection}' has dimension {} and {:?} distance, \
                     but {dimension} and {distance:?} were requested",
                    info.dimension, info.distance
                )))
            }
            None => {
                info!(collection, dimension, ?distance, "creating collection");
                self.index
                    .create_collection(collection, dimension, distance)
                    .await
                    .map_err(|e| e.context(format!("creating collection '{collection}'")))
            }
        }
    }

    /// Write `points` in fixed-size batches, retrying timed-out batches.
    ///
    /// Returns the number of points written. A failure aborts the remaining
    /// batches; batches already written are not rolled back.
    ///
    /// # Errors
    ///
    /// Returns the first non-transient error, or the last transient error once
    /// the retry policy is exhausted.
    pub async fn upsert(&self, points: &[IndexedPoint]) -> Result<usize> {
        let collection = self.collection.as_str();
        if points.is_empty() {
            warn!(collection, "no points provided for upsert");
            return Ok(0);
        }

        let batch_count = points.len().div_ceil(self.batch_size);
        info!(collection, count = points.len(), batch_count, "storing points");

        for (batch_index, batch) in points.chunks(self.batch_size).enumerate() {
            self.write_batch(batch_index, batch).await.map_err(|e| {
                error!(collection, batch_index, batch_count, error = %e, "batch upsert failed");
                e.context(format!(
                    "upserting batch {}/{batch_count} into '{collection}'",
                    batch_index + 1
                ))
            })?;
            debug!(collection, batch_index, batch_size = batch.len(), "uploaded batch");
        }

        info!(collection, count = points.len(), "stored points");
        Ok(points.len())
    }

    async fn write_batch(&self, batch_index: usize, batch: &[IndexedPoint]) -> Result<()> {
        let attempt = AtomicUsize::new(1);
        (|| self.index.upsert(&self.collection, batch))
            .retry(backoff(&self.retry))
            .when(RagError::is_transient)
            .notify(|err: &RagError, delay: Duration| {
                let failed = attempt.fetch_add(1, Ordering::Relaxed);
                warn!(
                    collection = %self.collection,
                    batch_index,
                    attempt = failed,
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                    "retrying batch upsert after timeout"
                );
            })
            .await
    }

    /// Drop the collection if it exists.
    ///
    /// Returns `true` if a collection was deleted.
    pub async fn clear_collection(&self) -> Result<bool> {
        let collection = self.collection.as_str();
        let existing = self
            .index
            .collection_info(collection)
            .await
            .map_err(|e| e.context(format!("looking up collection '{collection}'")))?;

        if existing.is_none() {
            info!(collection, "collection does not exist, nothing to clear");
            return Ok(false);
        }

        self.index
            .delete_collection(collection)
            .await
            .map_err(|e| e.context(format!("deleting collection '{collection}'")))?;
        info!(collection, "deleted collection");
        Ok(true)
    }
}

impl std::fmt::Debug for IndexWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IndexWriter")
            .field("backend", &self.index.backend())
            .field("collection", &self.collection)
            .field("batch_size", &self.batch_size)
            .field("retry", &self.retry)
            .finish()
    }
}

/// Translate a [`RetryPolicy`] into a `backon` strategy.
fn backoff(policy: &RetryPolicy) -> ExponentialBuilder {
    ExponentialBuilder::default()
        .with_min_delay(policy.min_delay)
        .with_max_delay(policy.max_delay)
        .with_factor(policy.factor)
        .with_max_times(policy.max_attempts.saturating_sub(1))
}

/// Pair chunks with their embeddings and assign point ids.
///
/// # Errors
///
/// Returns [`RagError::Validation`] if the two sequences differ in length.
pub fn build_points(
    document_id: &str,
    chunks: Vec<Chunk>,
    embeddings: Vec<Vec<f32>>,
    strategy: PointIdStrategy,
) -> Result<Vec<IndexedPoint>> {
    if chunks.len() != embeddings.len() {
        return Err(RagError::Validation(format!(
            "{} chunks but {} embeddings for document '{document_id}'",
            chunks.len(),
            embeddings.len()
        )));
    }

    Ok(chunks
        .into_iter()
        .zip(embeddings)
        .map(|(chunk, vector)| {
            let id = match strategy {
                PointIdStrategy::Deterministic => {
                    PointId::for_chunk(document_id, chunk.sequence_index)
                }
                PointIdStrategy::Positional => PointId::Num(chunk.sequence_index as u64),
            };
            IndexedPoint { id, vector, payload: Payload { text: chunk.text, source: chunk.source_id } }
        })
        .collect())
}
