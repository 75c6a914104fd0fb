//! Embeddings from the OpenAI `/embeddings` endpoint or any API that mirrors it.
//!
//! Requires the `openai` feature.

use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use crate::embedding::EmbeddingProvider;
use crate::error::{RagError, Result};

const PROVIDER: &str = "OpenAI";
const API_ROOT: &str = "https://api.openai.com/v1";
const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-3-small";

/// Native output size of the models we know about.
fn native_dimensions(model: &str) -> Option<usize> {
    match model {
        "text-embedding-3-small" | "text-embedding-ada-002" => Some(1536),
        "text-embedding-3-large" => Some(3072),
        _ => None,
    }
}

/// An [`EmbeddingProvider`] for OpenAI-style embedding APIs.
///
/// Inputs are sent in one request per batch; the response's `index` field
/// restores input order. Setting an explicit size with
/// [`with_dimensions`](Self::with_dimensions) asks the API to shorten the
/// vectors, which the `text-embedding-3-*` models support.
///
/// ```rust,ignore
/// use docrag::openai::OpenAIEmbeddingProvider;
///
/// let provider = OpenAIEmbeddingProvider::new(key)?.with_dimensions(768);
/// ```
#[derive(Debug, Clone)]
pub struct OpenAIEmbeddingProvider {
    http: reqwest::Client,
    endpoint: String,
    model: String,
    shortened_to: Option<usize>,
}

impl OpenAIEmbeddingProvider {
    /// Build a provider for `text-embedding-3-small` authenticated with `api_key`.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Config`] for a blank or non-header-safe key.
    pub fn new(api_key: impl AsRef<str>) -> Result<Self> {
        let key = api_key.as_ref().trim();
        if key.is_empty() {
            return Err(RagError::Config("OpenAI API key must not be empty".into()));
        }

        let mut bearer = HeaderValue::from_str(&format!("Bearer {key}"))
            .map_err(|e| RagError::Config(format!("invalid OpenAI API key: {e}")))?;
        bearer.set_sensitive(true);
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, bearer);

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .build()
            .map_err(|e| RagError::Config(format!("failed to build OpenAI HTTP client: {e}")))?;

        Ok(Self {
            http,
            endpoint: format!("{API_ROOT}/embeddings"),
            model: DEFAULT_EMBEDDING_MODEL.to_string(),
            shortened_to: None,
        })
    }

    /// Use another embedding model.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Request vectors of `dimensions` entries instead of the model's native size.
    pub fn with_dimensions(mut self, dimensions: usize) -> Self {
        self.shortened_to = Some(dimensions);
        self
    }

    /// Send requests to a compatible API rooted at `base_url` (e.g. a local gateway).
    pub fn with_base_url(mut self, base_url: impl AsRef<str>) -> Self {
        self.endpoint = format!("{}/embeddings", base_url.as_ref().trim_end_matches('/'));
        self
    }

    fn failure(message: impl Into<String>) -> RagError {
        RagError::Embedding { provider: PROVIDER.to_string(), message: message.into() }
    }
}

#[derive(Serialize)]
struct EmbeddingsBody<'a> {
    model: &'a str,
    input: &'a [&'a str],
    #[serde(skip_serializing_if = "Option::is_none")]
    dimensions: Option<usize>,
}

#[derive(Deserialize)]
struct EmbeddingsReply {
    data: Vec<IndexedEmbedding>,
}

#[derive(Deserialize)]
struct IndexedEmbedding {
    index: usize,
    embedding: Vec<f32>,
}

#[derive(Deserialize)]
struct ApiFailure {
    error: ApiFailureDetail,
}

#[derive(Deserialize)]
struct ApiFailureDetail {
    message: String,
}

#[async_trait]
impl EmbeddingProvider for OpenAIEmbeddingProvider {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut vectors = self.embed_batch(&[text]).await?;
        vectors.pop().ok_or_else(|| Self::failure("no embedding in response"))
    }

    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        debug!(
            provider = PROVIDER,
            model = %self.model,
            inputs = texts.len(),
            "requesting embeddings"
        );

        let body =
            EmbeddingsBody { model: &self.model, input: texts, dimensions: self.shortened_to };
        let response = self.http.post(&self.endpoint).json(&body).send().await.map_err(|e| {
            error!(provider = PROVIDER, error = %e, "embedding request failed");
            Self::failure(format!("request failed: {e}"))
        })?;

        let status = response.status();
        if !status.is_success() {
            let raw = response.text().await.unwrap_or_default();
            let reason = match serde_json::from_str::<ApiFailure>(&raw) {
                Ok(failure) => failure.error.message,
                Err(_) => raw,
            };
            error!(provider = PROVIDER, %status, "embedding request rejected");
            return Err(Self::failure(format!("API returned {status}: {reason}")));
        }

        let reply: EmbeddingsReply = response
            .json()
            .await
            .map_err(|e| Self::failure(format!("unreadable response: {e}")))?;

        let mut slots: Vec<Option<Vec<f32>>> = vec![None; texts.len()];
        for item in reply.data {
            match slots.get_mut(item.index) {
                Some(slot) => *slot = Some(item.embedding),
                None => {
                    return Err(Self::failure(format!(
                        "response index {} out of range for {} inputs",
                        item.index,
                        texts.len()
                    )));
                }
            }
        }
        slots
            .into_iter()
            .enumerate()
            .map(|(i, slot)| {
                slot.ok_or_else(|| Self::failure(format!("no embedding for input {i}")))
            })
            .collect()
    }

    /// The requested size, else the model's native size, else 0 (unknown).
    fn dimensions(&self) -> usize {
        self.shortened_to.or_else(|| native_dimensions(&self.model)).unwrap_or(0)
    }

    fn name(&self) -> &str {
        PROVIDER
    }
}
