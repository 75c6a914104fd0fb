//! Data types for documents, chunks, index points, and query results.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A source document as returned by the document store.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Document {
    /// Opaque identifier assigned by the document store.
    pub id: String,
    /// The document's text.
    #[serde(rename = "initialContent")]
    pub initial_content: String,
}

/// A contiguous window of a document's text.
///
/// Chunks live only for the duration of one ingestion run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Chunk {
    /// The window's text.
    pub text: String,
    /// Zero-based position of this chunk within its document.
    pub sequence_index: usize,
    /// Provenance tag written to the index payload.
    pub source_id: String,
}

/// Identifier of a point within a collection.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PointId {
    /// An unsigned integer id.
    Num(u64),
    /// A UUID in hyphenated string form.
    Uuid(String),
}

impl PointId {
    /// Derive a stable id from a document id and a chunk position.
    ///
    /// The same pair always yields the same UUIDv5.
    pub fn for_chunk(document_id: &str, sequence_index: usize) -> Self {
        let name = format!("{document_id}:{sequence_index}");
        PointId::Uuid(Uuid::new_v5(&Uuid::NAMESPACE_OID, name.as_bytes()).to_string())
    }
}

impl fmt::Display for PointId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PointId::Num(n) => write!(f, "{n}"),
            PointId::Uuid(u) => f.write_str(u),
        }
    }
}

/// The metadata stored next to each vector.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Payload {
    /// The chunk text.
    pub text: String,
    /// The chunk's provenance tag.
    pub source: String,
}

/// The unit persisted in the vector index.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IndexedPoint {
    /// Unique id within the collection. Writing an existing id overwrites it.
    pub id: PointId,
    /// L2-normalized embedding.
    pub vector: Vec<f32>,
    /// Text and provenance.
    pub payload: Payload,
}

/// A single nearest-neighbor hit.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RetrievedMatch {
    /// Chunk text, or empty when the stored payload lacks it.
    pub text: String,
    /// Provenance tag, or `"unknown"` when the stored payload lacks it.
    pub source: String,
    /// Similarity to the query (higher is more similar).
    pub score: f32,
}

impl RetrievedMatch {
    /// Source tag used when a stored payload has no `source` field.
    pub const UNKNOWN_SOURCE: &'static str = "unknown";
}

/// Summary returned by a successful ingestion.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct IngestReport {
    /// Always `"success"`; failures are reported as errors.
    pub status: String,
    /// Number of chunks written to the index.
    pub chunk_count: usize,
    /// The ingested document.
    pub document_id: String,
}

impl IngestReport {
    pub(crate) fn success(document_id: impl Into<String>, chunk_count: usize) -> Self {
        Self { status: "success".to_string(), chunk_count, document_id: document_id.into() }
    }
}

/// Result of answering a query.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Answer {
    /// The grounding matches, best first.
    pub matches: Vec<RetrievedMatch>,
    /// The generative model's output, verbatim.
    pub generated_text: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunk_point_ids_are_stable_and_distinct() {
        let a0 = PointId::for_chunk("doc-a", 0);
        assert_eq!(a0, PointId::for_chunk("doc-a", 0));
        assert_ne!(a0, PointId::for_chunk("doc-a", 1));
        assert_ne!(a0, PointId::for_chunk("doc-b", 0));
        assert!(matches!(&a0, PointId::Uuid(s) if Uuid::parse_str(s).is_ok()));
    }

    #[test]
    fn document_reads_store_field_name() {
        let doc: Document =
            serde_json::from_str(r#"{"id":"k1","initialContent":"hello"}"#).unwrap();
        assert_eq!(doc.initial_content, "hello");
    }

    #[test]
    fn ingest_report_serializes_flat() {
        let report = IngestReport::success("doc-1", 3);
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"status": "success", "chunk_count": 3, "document_id": "doc-1"})
        );
    }
}
