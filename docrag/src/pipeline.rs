//! RAG pipeline orchestrator.
//!
//! The [`RagPipeline`] coordinates the full ingest-and-answer workflow by
//! composing a [`DocumentStore`], an [`EmbeddingProvider`], a [`VectorIndex`]
//! and a [`GenerativeModel`].
//!
//! # Example
//!
//! ```rust,ignore
//! use docrag::{InMemoryVectorIndex, RagConfig, RagPipeline};
//!
//! let pipeline = RagPipeline::builder()
//!     .config(RagConfig::default())
//!     .document_store(Arc::new(my_store))
//!     .embedding_provider(Arc::new(my_embedder))
//!     .vector_index(Arc::new(InMemoryVectorIndex::new()))
//!     .generative_model(Arc::new(my_model))
//!     .build()?;
//!
//! let report = pipeline.ingest("doc-123").await?;
//! let answer = pipeline.answer("What does the document say?").await?;
//! ```

use std::sync::Arc;

use tracing::{error, info};

use crate::chunking::FixedSizeChunker;
use crate::composer::AnswerComposer;
use crate::config::RagConfig;
use crate::document::{Answer, IngestReport, RetrievedMatch};
use crate::embedding::{Embedder, EmbeddingProvider};
use crate::error::{RagError, Result};
use crate::generation::GenerativeModel;
use crate::retriever::Retriever;
use crate::store::DocumentStore;
use crate::vectorstore::{Distance, VectorIndex};
use crate::writer::{IndexWriter, build_points};

/// The RAG pipeline orchestrator.
///
/// Ingestion runs fetch → chunk → embed → upsert; answering runs
/// embed-query → search → compose → generate. Stages run strictly in order
/// and the first failure aborts the call. Construct one via
/// [`RagPipeline::builder()`].
pub struct RagPipeline {
    config: RagConfig,
    documents: Arc<dyn DocumentStore>,
    chunker: FixedSizeChunker,
    embedder: Embedder,
    writer: IndexWriter,
    retriever: Retriever,
    composer: AnswerComposer,
}

impl RagPipeline {
    /// Create a new [`RagPipelineBuilder`].
    pub fn builder() -> RagPipelineBuilder {
        RagPipelineBuilder::default()
    }

    /// Return a reference to the pipeline configuration.
    pub fn config(&self) -> &RagConfig {
        &self.config
    }

    /// Return a reference to the index writer.
    pub fn writer(&self) -> &IndexWriter {
        &self.writer
    }

    /// Ingest a document: fetch → chunk → embed → upsert.
    ///
    /// The collection is created on first use, sized to the dimension of the
    /// first embedding produced.
    ///
    /// # Errors
    ///
    /// - [`RagError::NotFound`] if the store has no such document
    /// - [`RagError::Validation`] if the content is empty or yields no chunks
    ///   or embeddings
    /// - the embedding or index error that aborted the run
    pub async fn ingest(&self, document_id: &str) -> Result<IngestReport> {
        self.ingest_document(document_id).await.map_err(|e| {
            error!(document.id = %document_id, error = %e, "ingestion failed");
            e.context(format!("ingesting document '{document_id}'"))
        })
    }

    async fn ingest_document(&self, document_id: &str) -> Result<IngestReport> {
        // 1. Fetch
        info!(document.id = %document_id, store = self.documents.name(), "fetching document");
        let document = self
            .documents
            .get_document(document_id)
            .await?
            .ok_or_else(|| RagError::NotFound { document_id: document_id.to_string() })?;

        // 2. Validate
        if document.initial_content.is_empty() {
            return Err(RagError::Validation("document content is empty".to_string()));
        }

        // 3. Chunk, tagged with the document id unless a static label is configured
        let source = self.config.source_label.as_deref().unwrap_or(document_id);
        let chunks = self.chunker.chunk(&document.initial_content, source);
        if chunks.is_empty() {
            return Err(RagError::Validation("no chunks created from document content".into()));
        }
        info!(document.id = %document_id, chunk_count = chunks.len(), "prepared chunks");

        // 4. Embed
        let texts: Vec<&str> = chunks.iter().map(|c| c.text.as_str()).collect();
        let embeddings = self.embedder.embed(&texts).await?;
        if embeddings.is_empty() {
            return Err(RagError::Validation("no embeddings generated".to_string()));
        }

        // 5. Upsert
        let dimension = embeddings.first().map_or(self.config.fallback_dimension, Vec::len);
        self.writer.ensure_collection(dimension, Distance::Cosine).await?;

        let chunk_count = chunks.len();
        let points = build_points(document_id, chunks, embeddings, self.config.point_ids)?;
        self.writer.upsert(&points).await?;

        info!(document.id = %document_id, chunk_count, "ingested document");
        Ok(IngestReport::success(document_id, chunk_count))
    }

    /// Retrieve the `top_k` chunks most similar to `query`.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Validation`] for a blank query, otherwise the
    /// embedding or index error.
    pub async fn search(&self, query: &str, top_k: usize) -> Result<Vec<RetrievedMatch>> {
        validate_query(query)?;
        self.retriever.search(query, top_k).await
    }

    /// Answer `query` from the indexed documents: search → compose.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Validation`] for a blank query before any embedding
    /// or index call, otherwise the first downstream error.
    pub async fn answer(&self, query: &str) -> Result<Answer> {
        validate_query(query)?;

        let matches = self.retriever.search(query, self.config.top_k).await?;
        let generated_text = self.composer.compose(query, &matches).await?;

        info!(match_count = matches.len(), "query processed");
        Ok(Answer { matches, generated_text })
    }

    /// Create the collection using the embedder's advertised dimension.
    ///
    /// Falls back to the configured dimension if the provider reports zero.
    pub async fn ensure_collection(&self) -> Result<()> {
        let dimension = match self.embedder.dimensions() {
            0 => self.config.fallback_dimension,
            n => n,
        };
        self.writer.ensure_collection(dimension, Distance::Cosine).await
    }

    /// Drop the whole collection. A missing collection is not an error.
    pub async fn reset_index(&self) -> Result<()> {
        self.writer.clear_collection().await.map(|_| ()).map_err(|e| {
            error!(collection = self.writer.collection(), error = %e, "failed to clear collection");
            e
        })
    }
}

fn validate_query(query: &str) -> Result<()> {
    if query.trim().is_empty() {
        return Err(RagError::Validation("query cannot be empty".to_string()));
    }
    Ok(())
}

impl std::fmt::Debug for RagPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RagPipeline")
            .field("config", &self.config)
            .field("documents", &self.documents.name())
            .field("chunker", &self.chunker)
            .field("writer", &self.writer)
            .field("retriever", &self.retriever)
            .field("composer", &self.composer)
            .finish()
    }
}

/// Builder for constructing a [`RagPipeline`].
///
/// All fields are required. Call [`build()`](RagPipelineBuilder::build)
/// to validate and produce the pipeline.
#[derive(Default)]
pub struct RagPipelineBuilder {
    config: Option<RagConfig>,
    documents: Option<Arc<dyn DocumentStore>>,
    embedding_provider: Option<Arc<dyn EmbeddingProvider>>,
    vector_index: Option<Arc<dyn VectorIndex>>,
    generative_model: Option<Arc<dyn GenerativeModel>>,
}

impl RagPipelineBuilder {
    /// Set the pipeline configuration.
    pub fn config(mut self, config: RagConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Set the document store.
    pub fn document_store(mut self, store: Arc<dyn DocumentStore>) -> Self {
        self.documents = Some(store);
        self
    }

    /// Set the embedding provider.
    pub fn embedding_provider(mut self, provider: Arc<dyn EmbeddingProvider>) -> Self {
        self.embedding_provider = Some(provider);
        self
    }

    /// Set the vector index backend.
    pub fn vector_index(mut self, index: Arc<dyn VectorIndex>) -> Self {
        self.vector_index = Some(index);
        self
    }

    /// Set the generative model.
    pub fn generative_model(mut self, model: Arc<dyn GenerativeModel>) -> Self {
        self.generative_model = Some(model);
        self
    }

    /// Build the [`RagPipeline`], validating that all required fields are set.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Config`] if any required field is missing or the
    /// configuration fails [`RagConfig::validate`].
    pub fn build(self) -> Result<RagPipeline> {
        let config =
            self.config.ok_or_else(|| RagError::Config("config is required".to_string()))?;
        let documents = self
            .documents
            .ok_or_else(|| RagError::Config("document_store is required".to_string()))?;
        let embedding_provider = self
            .embedding_provider
            .ok_or_else(|| RagError::Config("embedding_provider is required".to_string()))?;
        let vector_index = self
            .vector_index
            .ok_or_else(|| RagError::Config("vector_index is required".to_string()))?;
        let generative_model = self
            .generative_model
            .ok_or_else(|| RagError::Config("generative_model is required".to_string()))?;
        config.validate()?;

        let chunker = FixedSizeChunker::new(config.chunk_size, config.chunk_overlap)?;
        let embedder = Embedder::new(embedding_provider, config.embed_batch_size);
        let writer = IndexWriter::from_config(vector_index.clone(), &config);
        let retriever = Retriever::new(embedder.clone(), vector_index, config.collection.clone());
        let composer = AnswerComposer::new(generative_model);

        Ok(RagPipeline { config, documents, chunker, embedder, writer, retriever, composer })
    }
}
