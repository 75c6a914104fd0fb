//! In-memory vector index using cosine similarity.
//!
//! This module provides [`InMemoryVectorIndex`], a zero-dependency index
//! backed by a `HashMap` protected by a `tokio::sync::RwLock`. It is suitable
//! for development, testing, and small-scale use cases.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::document::{IndexedPoint, PointId};
use crate::error::{RagError, Result};
use crate::vectorstore::{CollectionInfo, Distance, ScoredPoint, VectorIndex};

const BACKEND: &str = "InMemory";

#[derive(Debug)]
struct Collection {
    info: CollectionInfo,
    points: HashMap<PointId, IndexedPoint>,
}

/// An in-memory vector index using cosine similarity for search.
///
/// Collections are stored as nested `HashMap`s: collection name → point id → point.
/// Writes with a vector of the wrong dimension are rejected, as a real index would.
///
/// # Example
///
/// ```rust,ignore
/// use docrag::{Distance, InMemoryVectorIndex, VectorIndex};
///
/// let index = InMemoryVectorIndex::new();
/// index.create_collection("docs", 384, Distance::Cosine).await?;
/// ```
#[derive(Debug, Default)]
pub struct InMemoryVectorIndex {
    collections: RwLock<HashMap<String, Collection>>,
}

impl InMemoryVectorIndex {
    /// Create a new empty in-memory index.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of points stored in a collection, or `None` if it does not exist.
    pub async fn point_count(&self, collection: &str) -> Option<usize> {
        self.collections.read().await.get(collection).map(|c| c.points.len())
    }

    /// Fetch a stored point by id.
    pub async fn get_point(&self, collection: &str, id: &PointId) -> Option<IndexedPoint> {
        self.collections.read().await.get(collection).and_then(|c| c.points.get(id).cloned())
    }

    fn missing(collection: &str) -> RagError {
        RagError::FatalIndex {
            backend: BACKEND.to_string(),
            message: format!("collection '{collection}' does not exist"),
        }
    }
}

/// Compute cosine similarity between two vectors.
///
/// Returns 0.0 if either vector has zero magnitude.
pub(crate) fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

#[async_trait]
impl VectorIndex for InMemoryVectorIndex {
    fn backend(&self) -> &str {
        BACKEND
    }

    async fn collection_info(&self, name: &str) -> Result<Option<CollectionInfo>> {
        Ok(self.collections.read().await.get(name).map(|c| c.info))
    }

    async fn create_collection(
        &self,
        name: &str,
        dimension: usize,
        distance: Distance,
    ) -> Result<()> {
        let mut collections = self.collections.write().await;
        collections.entry(name.to_string()).or_insert_with(|| Collection {
            info: CollectionInfo { dimension, distance },
            points: HashMap::new(),
        });
        Ok(())
    }

    async fn delete_collection(&self, name: &str) -> Result<()> {
        let mut collections = self.collections.write().await;
        collections.remove(name);
        Ok(())
    }

    async fn upsert(&self, collection: &str, points: &[IndexedPoint]) -> Result<()> {
        let mut collections = self.collections.write().await;
        let store = collections.get_mut(collection).ok_or_else(|| Self::missing(collection))?;

        if let Some(bad) = points.iter().find(|p| p.vector.len() != store.info.dimension) {
            return Err(RagError::FatalIndex {
                backend: BACKEND.to_string(),
                message: format!(
                    "point {} has dimension {}, collection '{collection}' expects {}",
                    bad.id,
                    bad.vector.len(),
                    store.info.dimension
                ),
            });
        }

        for point in points {
            store.points.insert(point.id.clone(), point.clone());
        }
        Ok(())
    }

    async fn search(
        &self,
        collection: &str,
        vector: &[f32],
        limit: usize,
    ) -> Result<Vec<ScoredPoint>> {
        let collections = self.collections.read().await;
        let store = collections.get(collection).ok_or_else(|| Self::missing(collection))?;

        let mut scored: Vec<ScoredPoint> = store
            .points
            .values()
            .map(|point| ScoredPoint {
                id: point.id.clone(),
                score: cosine_similarity(&point.vector, vector),
                text: Some(point.payload.text.clone()),
                source: Some(point.payload.source.clone()),
            })
            .collect();

        scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(limit);
        Ok(scored)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::Payload;

    fn point(id: u64, vector: Vec<f32>) -> IndexedPoint {
        IndexedPoint {
            id: PointId::Num(id),
            vector,
            payload: Payload { text: format!("chunk {id}"), source: "doc".into() },
        }
    }

    #[tokio::test]
    async fn upsert_overwrites_by_id() {
        let index = InMemoryVectorIndex::new();
        index.create_collection("c", 2, Distance::Cosine).await.unwrap();
        index.upsert("c", &[point(0, vec![1.0, 0.0]), point(1, vec![0.0, 1.0])]).await.unwrap();
        index.upsert("c", &[point(0, vec![0.6, 0.8])]).await.unwrap();

        assert_eq!(index.point_count("c").await, Some(2));
        let stored = index.get_point("c", &PointId::Num(0)).await.unwrap();
        assert_eq!(stored.vector, vec![0.6, 0.8]);
    }

    #[tokio::test]
    async fn rejects_wrong_dimension_and_missing_collection() {
        let index = InMemoryVectorIndex::new();
        let err = index.upsert("nope", &[point(0, vec![1.0])]).await.unwrap_err();
        assert!(matches!(err, RagError::FatalIndex { .. }));

        index.create_collection("c", 3, Distance::Cosine).await.unwrap();
        let err = index.upsert("c", &[point(0, vec![1.0, 0.0])]).await.unwrap_err();
        assert!(err.to_string().contains("expects 3"));
        assert!(index.search("nope", &[1.0], 3).await.is_err());
    }

    #[tokio::test]
    async fn create_keeps_existing_shape() {
        let index = InMemoryVectorIndex::new();
        index.create_collection("c", 3, Distance::Cosine).await.unwrap();
        index.create_collection("c", 5, Distance::Dot).await.unwrap();
        let info = index.collection_info("c").await.unwrap().unwrap();
        assert_eq!(info, CollectionInfo { dimension: 3, distance: Distance::Cosine });

        index.delete_collection("c").await.unwrap();
        assert_eq!(index.collection_info("c").await.unwrap(), None);
    }

    #[test]
    fn cosine_of_zero_vector_is_zero() {
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
        assert!((cosine_similarity(&[1.0, 0.0], &[2.0, 0.0]) - 1.0).abs() < 1e-6);
    }
}
