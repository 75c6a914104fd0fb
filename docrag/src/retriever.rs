//! Query embedding and nearest-neighbor search.

use std::sync::Arc;

use tracing::{error, info};

use crate::document::RetrievedMatch;
use crate::embedding::Embedder;
use crate::error::Result;
use crate::vectorstore::{ScoredPoint, VectorIndex};

/// Embeds queries and searches one collection.
#[derive(Clone)]
pub struct Retriever {
    embedder: Embedder,
    index: Arc<dyn VectorIndex>,
    collection: String,
}

impl Retriever {
    /// Create a retriever over `collection`.
    pub fn new(embedder: Embedder, index: Arc<dyn VectorIndex>, collection: impl Into<String>) -> Self {
        Self { embedder, index, collection: collection.into() }
    }

    /// Return up to `top_k` matches for `query`, most similar first.
    ///
    /// Points whose payload lacks `text` or `source` are returned with an
    /// empty text or an `"unknown"` source rather than failing the search.
    ///
    /// # Errors
    ///
    /// Returns the embedding error, or the index error if the search fails
    /// (including a missing collection).
    pub async fn search(&self, query: &str, top_k: usize) -> Result<Vec<RetrievedMatch>> {
        let preview: String = query.chars().take(50).collect();
        info!(query = %preview, top_k, "searching for similar chunks");

        let query_embedding = self.embedder.embed_query(query).await.map_err(|e| {
            error!(error = %e, "query embedding failed");
            e.context("embedding query")
        })?;

        let collection = self.collection.as_str();
        let hits = self.index.search(collection, &query_embedding, top_k).await.map_err(|e| {
            error!(collection, error = %e, "vector search failed");
            e.context(format!("searching collection '{collection}'"))
        })?;

        let mut matches: Vec<RetrievedMatch> = hits.into_iter().map(to_match).collect();
        matches.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        matches.truncate(top_k);

        info!(collection, result_count = matches.len(), "found similar chunks");
        Ok(matches)
    }
}

fn to_match(hit: ScoredPoint) -> RetrievedMatch {
    RetrievedMatch {
        text: hit.text.unwrap_or_default(),
        source: hit.source.unwrap_or_else(|| RetrievedMatch::UNKNOWN_SOURCE.to_string()),
        score: hit.score,
    }
}

impl std::fmt::Debug for Retriever {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Retriever")
            .field("embedder", &self.embedder)
            .field("backend", &self.index.backend())
            .field("collection", &self.collection)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;

    use super::*;
    use crate::document::{IndexedPoint, PointId};
    use crate::embedding::EmbeddingProvider;
    use crate::error::RagError;
    use crate::vectorstore::{CollectionInfo, Distance};

    struct FixedProvider;

    #[async_trait]
    impl EmbeddingProvider for FixedProvider {
        async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
            Ok(vec![1.0, 0.0])
        }

        fn dimensions(&self) -> usize {
            2
        }
    }

    /// Returns canned hits in a deliberately unsorted order.
    struct LegacyIndex;

    #[async_trait]
    impl VectorIndex for LegacyIndex {
        fn backend(&self) -> &str {
            "legacy"
        }

        async fn collection_info(&self, _name: &str) -> Result<Option<CollectionInfo>> {
            Ok(Some(CollectionInfo { dimension: 2, distance: Distance::Cosine }))
        }

        async fn create_collection(&self, _: &str, _: usize, _: Distance) -> Result<()> {
            Ok(())
        }

        async fn delete_collection(&self, _name: &str) -> Result<()> {
            Ok(())
        }

        async fn upsert(&self, _: &str, _: &[IndexedPoint]) -> Result<()> {
            Ok(())
        }

        async fn search(&self, collection: &str, _: &[f32], _: usize) -> Result<Vec<ScoredPoint>> {
            if collection != "docs" {
                return Err(RagError::FatalIndex {
                    backend: "legacy".into(),
                    message: "collection not found".into(),
                });
            }
            Ok(vec![
                ScoredPoint { id: PointId::Num(1), score: 0.2, text: None, source: None },
                ScoredPoint {
                    id: PointId::Num(2),
                    score: 0.9,
                    text: Some("best".into()),
                    source: Some("doc-a".into()),
                },
            ])
        }
    }

    fn retriever(collection: &str) -> Retriever {
        Retriever::new(Embedder::new(Arc::new(FixedProvider), 16), Arc::new(LegacyIndex), collection)
    }

    #[tokio::test]
    async fn missing_payload_fields_degrade_gracefully() {
        let matches = retriever("docs").search("query", 3).await.unwrap();
        assert_eq!(matches.len(), 2);
        assert_eq!(matches[0].text, "best");
        assert_eq!(matches[1].text, "");
        assert_eq!(matches[1].source, "unknown");
    }

    #[tokio::test]
    async fn results_are_bounded_and_descending() {
        let matches = retriever("docs").search("query", 1).await.unwrap();
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].score, 0.9);
    }

    #[tokio::test]
    async fn index_failures_propagate() {
        let err = retriever("other").search("query", 3).await.unwrap_err();
        assert!(matches!(err, RagError::FatalIndex { .. }));
        assert!(err.to_string().contains("searching collection 'other'"));
    }
}
