//! Error types for the `docrag` crate.

use thiserror::Error;

/// Errors that can occur while ingesting documents or answering queries.
///
/// Every variant maps to one failure class of the pipeline. Use
/// [`RagError::is_transient`] to decide whether an operation may be retried.
#[derive(Debug, Error)]
pub enum RagError {
    /// Invalid chunking parameters, a missing endpoint or credential, or an
    /// existing collection whose shape disagrees with the embedder.
    #[error("Configuration error: {0}")]
    Config(String),

    /// The document store has no document with the requested id.
    #[error("Document '{document_id}' not found")]
    NotFound {
        /// The id that was looked up.
        document_id: String,
    },

    /// Input or intermediate data failed a precondition (empty content,
    /// empty query, zero chunks, zero embeddings).
    #[error("Validation error: {0}")]
    Validation(String),

    /// The document store could not be queried.
    #[error("Document store error ({store}): {message}")]
    Document {
        /// The document store backend that produced the error.
        store: String,
        /// A description of the failure.
        message: String,
    },

    /// A write to the vector index timed out. Eligible for retry.
    #[error("Transient index error ({backend}): {message}")]
    TransientIndex {
        /// The vector index backend that produced the error.
        backend: String,
        /// A description of the failure.
        message: String,
    },

    /// Any other vector index failure. Never retried.
    #[error("Index error ({backend}): {message}")]
    FatalIndex {
        /// The vector index backend that produced the error.
        backend: String,
        /// A description of the failure.
        message: String,
    },

    /// The embedding function failed.
    #[error("Embedding error ({provider}): {message}")]
    Embedding {
        /// The embedding provider that produced the error.
        provider: String,
        /// A description of the failure.
        message: String,
    },

    /// The generative function failed.
    #[error("Generation error ({provider}): {message}")]
    Generation {
        /// The generative model provider that produced the error.
        provider: String,
        /// A description of the failure.
        message: String,
    },
}

impl RagError {
    /// Classify this error for the index retry policy.
    ///
    /// Only [`RagError::TransientIndex`] is transient; every other kind is fatal.
    pub fn is_transient(&self) -> bool {
        matches!(self, RagError::TransientIndex { .. })
    }

    /// Prefix the error message with `context`, keeping the error kind.
    pub fn context(self, context: impl std::fmt::Display) -> Self {
        match self {
            RagError::Config(message) => RagError::Config(format!("{context}: {message}")),
            RagError::NotFound { document_id } => RagError::NotFound { document_id },
            RagError::Validation(message) => RagError::Validation(format!("{context}: {message}")),
            RagError::Document { store, message } => {
                RagError::Document { store, message: format!("{context}: {message}") }
            }
            RagError::TransientIndex { backend, message } => {
                RagError::TransientIndex { backend, message: format!("{context}: {message}") }
            }
            RagError::FatalIndex { backend, message } => {
                RagError::FatalIndex { backend, message: format!("{context}: {message}") }
            }
            RagError::Embedding { provider, message } => {
                RagError::Embedding { provider, message: format!("{context}: {message}") }
            }
            RagError::Generation { provider, message } => {
                RagError::Generation { provider, message: format!("{context}: {message}") }
            }
        }
    }
}

/// A convenience result type for RAG operations.
pub type Result<T> = std::result::Result<T, RagError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_index_timeouts_are_transient() {
        let transient =
            RagError::TransientIndex { backend: "qdrant".into(), message: "timeout".into() };
        assert!(transient.is_transient());

        let fatal = [
            RagError::FatalIndex { backend: "qdrant".into(), message: "unauthorized".into() },
            RagError::Config("bad".into()),
            RagError::Validation("empty".into()),
            RagError::NotFound { document_id: "doc".into() },
            RagError::Embedding { provider: "Gemini".into(), message: "boom".into() },
            RagError::Generation { provider: "Gemini".into(), message: "boom".into() },
        ];
        for err in fatal {
            assert!(!err.is_transient(), "{err} should not be transient");
        }
    }

    #[test]
    fn context_keeps_kind() {
        let err = RagError::FatalIndex { backend: "qdrant".into(), message: "denied".into() }
            .context("upsert into 'docs'");
        assert!(matches!(err, RagError::FatalIndex { .. }));
        assert_eq!(err.to_string(), "Index error (qdrant): upsert into 'docs': denied");

        let err = RagError::NotFound { document_id: "abc".into() }.context("ingest");
        assert_eq!(err.to_string(), "Document 'abc' not found");
    }
}
