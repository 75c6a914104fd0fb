//! Document retrieval-augmented generation core.
//!
//! This crate provides:
//! - Fixed-size character chunking with overlap
//! - Batched, normalized embedding over a pluggable [`EmbeddingProvider`]
//! - An [`IndexWriter`] that upserts in batches and retries transient timeouts
//! - Similarity retrieval and prompt composition for a [`GenerativeModel`]
//! - A [`RagPipeline`] exposing `ingest`, `answer` and `reset_index`
//!
//! Network backends are behind cargo features:
//!
//! | Feature  | Adds                                              |
//! |----------|---------------------------------------------------|
//! | `convex` | [`convex::ConvexDocumentStore`]                   |
//! | `gemini` | Gemini embedding provider and answer generator    |
//! | `openai` | OpenAI embedding provider                         |
//! | `qdrant` | [`qdrant::QdrantVectorIndex`]                     |
//! | `full`   | all of the above                                  |

mod chunking;
mod composer;
mod config;
mod document;
mod embedding;
mod error;
mod generation;
mod inmemory;
mod pipeline;
mod retriever;
mod store;
mod vectorstore;
mod writer;

#[cfg(feature = "convex")]
pub mod convex;
#[cfg(feature = "gemini")]
pub mod gemini;
#[cfg(feature = "openai")]
pub mod openai;
#[cfg(feature = "qdrant")]
pub mod qdrant;

pub use chunking::{FixedSizeChunker, chunk_text};
pub use composer::{AnswerComposer, build_prompt};
pub use config::{PointIdStrategy, RagConfig, RagConfigBuilder, RetryPolicy, ServiceConfig};
pub use document::{
    Answer, Chunk, Document, IndexedPoint, IngestReport, Payload, PointId, RetrievedMatch,
};
pub use embedding::{Embedder, EmbeddingProvider, l2_normalize};
pub use error::{RagError, Result};
pub use generation::GenerativeModel;
pub use inmemory::InMemoryVectorIndex;
pub use pipeline::{RagPipeline, RagPipelineBuilder};
pub use retriever::Retriever;
pub use store::{DocumentStore, InMemoryDocumentStore};
pub use vectorstore::{CollectionInfo, Distance, ScoredPoint, VectorIndex};
pub use writer::{IndexWriter, build_points};

#[cfg(feature = "convex")]
pub use convex::ConvexDocumentStore;
#[cfg(feature = "gemini")]
pub use gemini::{GeminiEmbeddingProvider, GeminiGenerator, TaskType};
#[cfg(feature = "openai")]
pub use openai::OpenAIEmbeddingProvider;
#[cfg(feature = "qdrant")]
pub use qdrant::QdrantVectorIndex;
