//! Qdrant vector index backend.
//!
//! Provides [`QdrantVectorIndex`] which implements [`VectorIndex`] using
//! the [qdrant-client](https://docs.rs/qdrant-client) crate over gRPC.
//!
//! This module is only available when the `qdrant` feature is enabled.
//!
//! # Example
//!
//! ```rust,ignore
//! use docrag::qdrant::QdrantVectorIndex;
//!
//! let index = QdrantVectorIndex::new("http://localhost:6334", Some(api_key), Duration::from_secs(60))?;
//! index.create_collection("docs", 768, Distance::Cosine).await?;
//! index.upsert("docs", &points).await?;
//! let hits = index.search("docs", &query_embedding, 3).await?;
//! ```

use std::time::Duration;

use async_trait::async_trait;
use qdrant_client::qdrant::point_id::PointIdOptions;
use qdrant_client::qdrant::value::Kind;
use qdrant_client::qdrant::vectors_config::Config as VectorsConfigKind;
use qdrant_client::qdrant::{
    CreateCollectionBuilder, Distance as QdrantDistance, PointStruct, SearchPointsBuilder,
    UpsertPointsBuilder, Value as QdrantValue, VectorParamsBuilder,
};
use qdrant_client::{Payload as QdrantPayload, Qdrant, QdrantError};
use tracing::debug;

use crate::document::{IndexedPoint, PointId};
use crate::error::{RagError, Result};
use crate::vectorstore::{CollectionInfo, Distance, ScoredPoint, VectorIndex};

const BACKEND: &str = "qdrant";

/// A [`VectorIndex`] backed by [Qdrant](https://qdrant.tech/).
///
/// Point payloads are stored as `{"text": …, "source": …}`.
pub struct QdrantVectorIndex {
    client: Qdrant,
}

impl QdrantVectorIndex {
    /// Connect to `url`, authenticating with `api_key` when given.
    ///
    /// `timeout` bounds both connection setup and each request.
    pub fn new(url: &str, api_key: Option<String>, timeout: Duration) -> Result<Self> {
        let client = Qdrant::from_url(url)
            .api_key(api_key)
            .timeout(timeout)
            .connect_timeout(timeout)
            .build()
            .map_err(classify)?;
        Ok(Self { client })
    }

    /// Create a new Qdrant index from an existing client.
    pub fn from_client(client: Qdrant) -> Self {
        Self { client }
    }

    /// Extract a string from a Qdrant payload value.
    fn extract_string(value: &QdrantValue) -> Option<String> {
        match &value.kind {
            Some(Kind::StringValue(s)) => Some(s.clone()),
            _ => None,
        }
    }

    fn to_payload(point: &IndexedPoint) -> Result<QdrantPayload> {
        let value = serde_json::json!({
            "text": point.payload.text,
            "source": point.payload.source,
        });
        QdrantPayload::try_from(value).map_err(classify)
    }
}

/// Map a client error onto the transient/fatal split.
///
/// Timeouts are transient: a server-side `DeadlineExceeded`, or the client's
/// own request timeout, which tonic reports as `Cancelled` with
/// "Timeout expired".
fn classify(e: QdrantError) -> RagError {
    let timed_out = match &e {
        QdrantError::ResponseError { status } => is_timeout(status),
        _ => false,
    };
    if timed_out {
        RagError::TransientIndex { backend: BACKEND.to_string(), message: e.to_string() }
    } else {
        RagError::FatalIndex { backend: BACKEND.to_string(), message: e.to_string() }
    }
}

fn is_timeout(status: &tonic::Status) -> bool {
    match status.code() {
        tonic::Code::DeadlineExceeded => true,
        tonic::Code::Cancelled => status.message().contains("Timeout expired"),
        _ => false,
    }
}

fn to_qdrant_distance(distance: Distance) -> QdrantDistance {
    match distance {
        Distance::Cosine => QdrantDistance::Cosine,
        Distance::Dot => QdrantDistance::Dot,
        Distance::Euclid => QdrantDistance::Euclid,
        Distance::Manhattan => QdrantDistance::Manhattan,
    }
}

fn from_qdrant_distance(distance: i32) -> Result<Distance> {
    match QdrantDistance::try_from(distance) {
        Ok(QdrantDistance::Cosine) => Ok(Distance::Cosine),
        Ok(QdrantDistance::Dot) => Ok(Distance::Dot),
        Ok(QdrantDistance::Euclid) => Ok(Distance::Euclid),
        Ok(QdrantDistance::Manhattan) => Ok(Distance::Manhattan),
        _ => Err(RagError::FatalIndex {
            backend: BACKEND.to_string(),
            message: format!("unsupported distance value {distance}"),
        }),
    }
}

fn to_qdrant_id(id: &PointId) -> qdrant_client::qdrant::PointId {
    match id {
        PointId::Num(n) => (*n).into(),
        PointId::Uuid(u) => u.clone().into(),
    }
}

fn from_qdrant_id(id: Option<qdrant_client::qdrant::PointId>) -> PointId {
    match id.and_then(|pid| pid.point_id_options) {
        Some(PointIdOptions::Num(n)) => PointId::Num(n),
        Some(PointIdOptions::Uuid(s)) => PointId::Uuid(s),
        None => PointId::Uuid(String::new()),
    }
}

#[async_trait]
impl VectorIndex for QdrantVectorIndex {
    fn backend(&self) -> &str {
        BACKEND
    }

    async fn collection_info(&self, name: &str) -> Result<Option<CollectionInfo>> {
        if !self.client.collection_exists(name).await.map_err(classify)? {
            return Ok(None);
        }

        let response = self.client.collection_info(name).await.map_err(classify)?;
        let params = response
            .result
            .and_then(|info| info.config)
            .and_then(|config| config.params)
            .and_then(|params| params.vectors_config)
            .and_then(|vectors| vectors.config);

        match params {
            Some(VectorsConfigKind::Params(params)) => Ok(Some(CollectionInfo {
                dimension: params.size as usize,
                distance: from_qdrant_distance(params.distance)?,
            })),
            _ => Err(RagError::Config(format!(
                "collection '{name}' does not use a single unnamed vector"
            ))),
        }
    }

    async fn create_collection(
        &self,
        name: &str,
        dimension: usize,
        distance: Distance,
    ) -> Result<()> {
        self.client
            .create_collection(CreateCollectionBuilder::new(name).vectors_config(
                VectorParamsBuilder::new(dimension as u64, to_qdrant_distance(distance)),
            ))
            .await
            .map_err(classify)?;

        debug!(collection = name, dimension, "created qdrant collection");
        Ok(())
    }

    async fn delete_collection(&self, name: &str) -> Result<()> {
        self.client.delete_collection(name).await.map_err(classify)?;
        debug!(collection = name, "deleted qdrant collection");
        Ok(())
    }

    async fn upsert(&self, collection: &str, points: &[IndexedPoint]) -> Result<()> {
        if points.is_empty() {
            return Ok(());
        }

        let qdrant_points = points
            .iter()
            .map(|point| {
                Ok(PointStruct::new(
                    to_qdrant_id(&point.id),
                    point.vector.clone(),
                    Self::to_payload(point)?,
                ))
            })
            .collect::<Result<Vec<PointStruct>>>()?;

        self.client
            .upsert_points(UpsertPointsBuilder::new(collection, qdrant_points).wait(true))
            .await
            .map_err(classify)?;

        debug!(collection, count = points.len(), "upserted points to qdrant");
        Ok(())
    }

    async fn search(
        &self,
        collection: &str,
        vector: &[f32],
        limit: usize,
    ) -> Result<Vec<ScoredPoint>> {
        let response = self
            .client
            .search_points(
                SearchPointsBuilder::new(collection, vector.to_vec(), limit as u64)
                    .with_payload(true),
            )
            .await
            .map_err(classify)?;

        Ok(response
            .result
            .into_iter()
            .map(|scored| ScoredPoint {
                text: scored.payload.get("text").and_then(Self::extract_string),
                source: scored.payload.get("source").and_then(Self::extract_string),
                id: from_qdrant_id(scored.id),
                score: scored.score,
            })
            .collect())
    }
}
