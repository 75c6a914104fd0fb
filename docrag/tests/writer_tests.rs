//! Batching and retry behaviour of the index writer against a scripted index.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use docrag::{
    CollectionInfo, Distance, IndexWriter, IndexedPoint, InMemoryVectorIndex, Payload, PointId,
    RagError, Result, RetryPolicy, ScoredPoint, VectorIndex,
};
use tokio::sync::Mutex;

/// What the scripted index does with the next upsert call.
#[derive(Debug, Clone, Copy)]
enum Outcome {
    Ok,
    Timeout,
    Fatal,
}

/// Wraps an [`InMemoryVectorIndex`], failing upserts according to a script.
/// Once the script runs out every call succeeds.
struct ScriptedIndex {
    inner: InMemoryVectorIndex,
    script: Mutex<VecDeque<Outcome>>,
    upsert_calls: AtomicUsize,
}

impl ScriptedIndex {
    async fn new(script: impl IntoIterator<Item = Outcome>) -> Arc<Self> {
        let inner = InMemoryVectorIndex::new();
        inner.create_collection("docs", 2, Distance::Cosine).await.unwrap();
        Arc::new(Self {
            inner,
            script: Mutex::new(script.into_iter().collect()),
            upsert_calls: AtomicUsize::new(0),
        })
    }

    fn calls(&self) -> usize {
        self.upsert_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl VectorIndex for ScriptedIndex {
    fn backend(&self) -> &str {
        "scripted"
    }

    async fn collection_info(&self, name: &str) -> Result<Option<CollectionInfo>> {
        self.inner.collection_info(name).await
    }

    async fn create_collection(
        &self,
        name: &str,
        dimension: usize,
        distance: Distance,
    ) -> Result<()> {
        self.inner.create_collection(name, dimension, distance).await
    }

    async fn delete_collection(&self, name: &str) -> Result<()> {
        self.inner.delete_collection(name).await
    }

    async fn upsert(&self, collection: &str, points: &[IndexedPoint]) -> Result<()> {
        self.upsert_calls.fetch_add(1, Ordering::SeqCst);
        let outcome = self.script.lock().await.pop_front().unwrap_or(Outcome::Ok);
        match outcome {
            Outcome::Ok => self.inner.upsert(collection, points).await,
            Outcome::Timeout => Err(RagError::TransientIndex {
                backend: "scripted".into(),
                message: "write timed out".into(),
            }),
            Outcome::Fatal => Err(RagError::FatalIndex {
                backend: "scripted".into(),
                message: "forbidden".into(),
            }),
        }
    }

    async fn search(
        &self,
        collection: &str,
        vector: &[f32],
        limit: usize,
    ) -> Result<Vec<ScoredPoint>> {
        self.inner.search(collection, vector, limit).await
    }
}

fn fast_retry() -> RetryPolicy {
    RetryPolicy {
        max_attempts: 3,
        min_delay: Duration::from_millis(1),
        max_delay: Duration::from_millis(5),
        factor: 2.0,
    }
}

fn points(n: usize) -> Vec<IndexedPoint> {
    (0..n)
        .map(|i| IndexedPoint {
            id: PointId::for_chunk("doc-1", i),
            vector: vec![1.0, i as f32],
            payload: Payload { text: format!("chunk {i}"), source: "doc-1".into() },
        })
        .collect()
}

fn writer(index: Arc<ScriptedIndex>, batch_size: usize) -> IndexWriter {
    IndexWriter::new(index, "docs", batch_size, fast_retry())
}

#[tokio::test]
async fn two_timeouts_then_success_uses_three_attempts() {
    let index = ScriptedIndex::new([Outcome::Timeout, Outcome::Timeout]).await;
    let written = writer(index.clone(), 100).upsert(&points(5)).await.unwrap();

    assert_eq!(written, 5);
    assert_eq!(index.calls(), 3);
    assert_eq!(index.inner.point_count("docs").await, Some(5));
}

#[tokio::test]
async fn fatal_error_is_not_retried() {
    let index = ScriptedIndex::new([Outcome::Fatal]).await;
    let err = writer(index.clone(), 100).upsert(&points(5)).await.unwrap_err();

    assert!(matches!(err, RagError::FatalIndex { .. }));
    assert_eq!(index.calls(), 1);
    assert_eq!(index.inner.point_count("docs").await, Some(0));
}

#[tokio::test]
async fn exhausted_retries_surface_the_timeout() {
    let index =
        ScriptedIndex::new([Outcome::Timeout, Outcome::Timeout, Outcome::Timeout]).await;
    let err = writer(index.clone(), 100).upsert(&points(2)).await.unwrap_err();

    assert!(err.is_transient());
    assert!(err.to_string().contains("batch 1/1"));
    assert_eq!(index.calls(), 3);
}

#[tokio::test]
async fn committed_batches_survive_a_later_failure() {
    // Batches of 2: first succeeds, second fails fatally, third never runs.
    let index = ScriptedIndex::new([Outcome::Ok, Outcome::Fatal]).await;
    let err = writer(index.clone(), 2).upsert(&points(5)).await.unwrap_err();

    assert!(err.to_string().contains("batch 2/3"));
    assert_eq!(index.calls(), 2);
    assert_eq!(index.inner.point_count("docs").await, Some(2));
}

#[tokio::test]
async fn retry_applies_per_batch() {
    let index = ScriptedIndex::new([Outcome::Timeout, Outcome::Ok, Outcome::Timeout]).await;
    let written = writer(index.clone(), 3).upsert(&points(6)).await.unwrap();

    assert_eq!(written, 6);
    assert_eq!(index.calls(), 4);
}

#[tokio::test]
async fn re_upserting_the_same_points_does_not_duplicate() {
    let index = ScriptedIndex::new([]).await;
    let writer = writer(index.clone(), 2);
    let batch = points(5);

    writer.upsert(&batch).await.unwrap();
    let before = index.search("docs", &[1.0, 2.0], 10).await.unwrap();
    writer.upsert(&batch).await.unwrap();
    let after = index.search("docs", &[1.0, 2.0], 10).await.unwrap();

    assert_eq!(index.inner.point_count("docs").await, Some(5));
    assert_eq!(before, after);
}

#[tokio::test]
async fn empty_upsert_is_a_no_op() {
    let index = ScriptedIndex::new([Outcome::Fatal]).await;
    assert_eq!(writer(index.clone(), 2).upsert(&[]).await.unwrap(), 0);
    assert_eq!(index.calls(), 0);
}

#[tokio::test]
async fn ensure_collection_rejects_shape_mismatch() {
    let index = ScriptedIndex::new([]).await;
    let writer = writer(index, 2);

    writer.ensure_collection(2, Distance::Cosine).await.unwrap();
    let err = writer.ensure_collection(3, Distance::Cosine).await.unwrap_err();
    assert!(matches!(err, RagError::Config(_)));
    let err = writer.ensure_collection(2, Distance::Dot).await.unwrap_err();
    assert!(matches!(err, RagError::Config(_)));
}

#[tokio::test]
async fn clearing_a_missing_collection_is_not_an_error() {
    let index = ScriptedIndex::new([]).await;
    let writer = writer(index.clone(), 2);

    assert!(writer.clear_collection().await.unwrap());
    assert!(!writer.clear_collection().await.unwrap());
    assert!(index.collection_info("docs").await.unwrap().is_none());
}
