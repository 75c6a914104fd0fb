//! Vector index trait for storing and searching points.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::document::{IndexedPoint, PointId};
use crate::error::Result;

/// Similarity metric of a collection.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum Distance {
    /// Cosine similarity. The only metric the pipeline creates.
    #[default]
    Cosine,
    /// Dot product.
    Dot,
    /// Euclidean distance.
    Euclid,
    /// Manhattan distance.
    Manhattan,
}

/// Shape of an existing collection.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct CollectionInfo {
    /// Vector dimensionality.
    pub dimension: usize,
    /// Similarity metric.
    pub distance: Distance,
}

/// A search hit as stored in the index.
///
/// Payload fields are optional because points written by older tools may lack them.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredPoint {
    /// The point's id.
    pub id: PointId,
    /// Similarity to the query vector (higher is more similar).
    pub score: f32,
    /// The `text` payload field, if present and a string.
    pub text: Option<String>,
    /// The `source` payload field, if present and a string.
    pub source: Option<String>,
}

/// A storage backend for vectors with nearest-neighbor search.
///
/// Implementations manage named collections of [`IndexedPoint`]s. Upserting an
/// id that already exists overwrites that point.
///
/// # Example
///
/// ```rust,ignore
/// use docrag::{Distance, InMemoryVectorIndex, VectorIndex};
///
/// let index = InMemoryVectorIndex::new();
/// index.create_collection("docs", 768, Distance::Cosine).await?;
/// index.upsert("docs", &points).await?;
/// let hits = index.search("docs", &query_embedding, 3).await?;
/// ```
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Short backend name used in logs and errors.
    fn backend(&self) -> &str;

    /// Return the shape of a collection, or `None` if it does not exist.
    async fn collection_info(&self, name: &str) -> Result<Option<CollectionInfo>>;

    /// Create a collection. Callers check existence first.
    async fn create_collection(&self, name: &str, dimension: usize, distance: Distance)
    -> Result<()>;

    /// Delete a collection and all its points.
    async fn delete_collection(&self, name: &str) -> Result<()>;

    /// Insert or overwrite points in a collection as a single write.
    async fn upsert(&self, collection: &str, points: &[IndexedPoint]) -> Result<()>;

    /// Return up to `limit` points nearest to `vector`, best first.
    async fn search(&self, collection: &str, vector: &[f32], limit: usize)
    -> Result<Vec<ScoredPoint>>;
}
