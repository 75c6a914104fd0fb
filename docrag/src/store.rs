//! Document store trait and an in-memory implementation.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::document::Document;
use crate::error::Result;

/// Read access to the document source of truth.
///
/// `Ok(None)` means the store has no such document; transport or format
/// failures are errors.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Fetch a document by its opaque id.
    async fn get_document(&self, id: &str) -> Result<Option<Document>>;

    /// Short backend name used in logs and errors.
    fn name(&self) -> &str {
        "custom"
    }
}

/// A [`DocumentStore`] holding documents in a `HashMap`.
#[derive(Debug, Default)]
pub struct InMemoryDocumentStore {
    documents: RwLock<HashMap<String, Document>>,
}

impl InMemoryDocumentStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a document.
    pub async fn insert(&self, id: impl Into<String>, content: impl Into<String>) {
        let id = id.into();
        let document = Document { id: id.clone(), initial_content: content.into() };
        self.documents.write().await.insert(id, document);
    }
}

#[async_trait]
impl DocumentStore for InMemoryDocumentStore {
    async fn get_document(&self, id: &str) -> Result<Option<Document>> {
        Ok(self.documents.read().await.get(id).cloned())
    }

    fn name(&self) -> &str {
        "InMemory"
    }
}
