//! Convex document store over the Convex HTTP query API.
//!
//! This module is only available when the `convex` feature is enabled.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, error};

use crate::document::Document;
use crate::error::{RagError, Result};
use crate::store::DocumentStore;

/// The query function that returns a document by id.
const DEFAULT_QUERY_PATH: &str = "documents:getById";

/// A [`DocumentStore`] that runs a Convex query function over HTTP.
///
/// Calls `POST {deployment_url}/api/query` with the document id as the `id`
/// argument. A `null` result means the document does not exist.
///
/// # Example
///
/// ```rust,ignore
/// use docrag::convex::ConvexDocumentStore;
///
/// let store = ConvexDocumentStore::new("https://happy-otter-123.convex.cloud")?;
/// let document = store.get_document("k17abc").await?;
/// ```
#[derive(Debug, Clone)]
pub struct ConvexDocumentStore {
    client: reqwest::Client,
    query_url: String,
    query_path: String,
}

impl ConvexDocumentStore {
    /// Create a store for the given deployment URL.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Config`] if the URL is not http(s).
    pub fn new(deployment_url: impl AsRef<str>) -> Result<Self> {
        let url = deployment_url.as_ref().trim().trim_end_matches('/');
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(RagError::Config(format!("CONVEX_URL must be an http(s) URL, got '{url}'")));
        }
        Ok(Self {
            client: reqwest::Client::new(),
            query_url: format!("{url}/api/query"),
            query_path: DEFAULT_QUERY_PATH.to_string(),
        })
    }

    /// Use a different query function (e.g. `notes:get`).
    pub fn with_query_path(mut self, path: impl Into<String>) -> Self {
        self.query_path = path.into();
        self
    }

    fn error(message: impl Into<String>) -> RagError {
        RagError::Document { store: "Convex".into(), message: message.into() }
    }
}

// ── Convex API request/response types ──────────────────────────────

#[derive(Serialize)]
struct QueryRequest<'a> {
    path: &'a str,
    args: QueryArgs<'a>,
    format: &'static str,
}

#[derive(Serialize)]
struct QueryArgs<'a> {
    id: &'a str,
}

#[derive(Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
enum QueryResponse {
    Success {
        #[serde(default)]
        value: Value,
    },
    Error {
        #[serde(rename = "errorMessage", default)]
        error_message: String,
    },
}

// ── DocumentStore implementation ───────────────────────────────────

#[async_trait]
impl DocumentStore for ConvexDocumentStore {
    async fn get_document(&self, id: &str) -> Result<Option<Document>> {
        debug!(store = "Convex", document.id = %id, path = %self.query_path, "querying document");

        let request = QueryRequest { path: &self.query_path, args: QueryArgs { id }, format: "json" };
        let response =
            self.client.post(&self.query_url).json(&request).send().await.map_err(|e| {
                error!(store = "Convex", error = %e, "request failed");
                Self::error(format!("request failed: {e}"))
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            error!(store = "Convex", %status, "API error");
            return Err(Self::error(format!("API returned {status}: {body}")));
        }

        let parsed: QueryResponse = response
            .json()
            .await
            .map_err(|e| Self::error(format!("failed to parse response: {e}")))?;

        let value = match parsed {
            QueryResponse::Success { value } => value,
            QueryResponse::Error { error_message } => {
                error!(store = "Convex", message = %error_message, "query function failed");
                return Err(Self::error(format!("query '{}' failed: {error_message}", self.query_path)));
            }
        };

        if value.is_null() {
            return Ok(None);
        }

        let content = value.get("initialContent").and_then(Value::as_str).ok_or_else(|| {
            RagError::Validation(format!(
                "document '{id}' has an invalid format: missing string field 'initialContent'"
            ))
        })?;

        Ok(Some(Document { id: id.to_string(), initial_content: content.to_string() }))
    }

    fn name(&self) -> &str {
        "Convex"
    }
}
