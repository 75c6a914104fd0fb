//! Gemini embedding provider and generative model over the Gemini REST API.
//!
//! This module is only available when the `gemini` feature is enabled.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use crate::embedding::EmbeddingProvider;
use crate::error::{RagError, Result};
use crate::generation::GenerativeModel;

/// The default Gemini API base URL.
const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// The default embedding model.
const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-004";

/// Output dimensionality of `text-embedding-004`.
const DEFAULT_EMBEDDING_DIMENSIONS: usize = 768;

/// The default generation model.
const DEFAULT_GENERATION_MODEL: &str = "gemini-2.5-flash";

/// Embedding task hint sent with every request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskType {
    /// Text that will be stored and searched.
    RetrievalDocument,
    /// Text used as a search query.
    RetrievalQuery,
    /// Symmetric similarity.
    SemanticSimilarity,
}

fn build_client(api_key: &str, provider: &str) -> Result<reqwest::Client> {
    if api_key.trim().is_empty() {
        return Err(RagError::Config(format!("{provider} API key must not be empty")));
    }
    let mut headers = reqwest::header::HeaderMap::new();
    let key = reqwest::header::HeaderValue::from_str(api_key.trim())
        .map_err(|e| RagError::Config(format!("invalid {provider} API key: {e}")))?;
    headers.insert("x-goog-api-key", key);
    reqwest::Client::builder()
        .default_headers(headers)
        .build()
        .map_err(|e| RagError::Config(format!("failed to build {provider} HTTP client: {e}")))
}

/// Read an error body, preferring the API's `error.message` field.
async fn error_detail(response: reqwest::Response) -> String {
    let body = response.text().await.unwrap_or_default();
    serde_json::from_str::<ErrorResponse>(&body).map(|e| e.error.message).unwrap_or(body)
}

// ── Gemini API request/response types ──────────────────────────────

#[derive(Serialize)]
struct Content<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<&'static str>,
    parts: Vec<Part<'a>>,
}

#[derive(Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct EmbedContentRequest<'a> {
    model: &'a str,
    content: Content<'a>,
    task_type: TaskType,
}

#[derive(Serialize)]
struct BatchEmbedRequest<'a> {
    requests: Vec<EmbedContentRequest<'a>>,
}

#[derive(Deserialize)]
struct BatchEmbedResponse {
    #[serde(default)]
    embeddings: Vec<ContentEmbedding>,
}

#[derive(Deserialize)]
struct ContentEmbedding {
    values: Vec<f32>,
}

#[derive(Serialize)]
struct GenerateContentRequest<'a> {
    contents: Vec<Content<'a>>,
}

#[derive(Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Deserialize)]
struct CandidatePart {
    text: Option<String>,
}

#[derive(Deserialize)]
struct ErrorResponse {
    error: ErrorDetail,
}

#[derive(Deserialize)]
struct ErrorDetail {
    message: String,
}

/// An [`EmbeddingProvider`] backed by the Gemini `batchEmbedContents` endpoint.
///
/// # Configuration
///
/// - `model` – defaults to `text-embedding-004` (768 dimensions).
/// - `task_type` – defaults to [`TaskType::RetrievalDocument`]. Queries are
///   sent as [`TaskType::RetrievalQuery`] unless the task is symmetric.
///
/// # Example
///
/// ```rust,ignore
/// use docrag::gemini::GeminiEmbeddingProvider;
///
/// let provider = GeminiEmbeddingProvider::new("your-api-key")?;
/// let embedding = provider.embed("hello world").await?;
/// ```
#[derive(Debug, Clone)]
pub struct GeminiEmbeddingProvider {
    client: reqwest::Client,
    base_url: String,
    model: String,
    task_type: TaskType,
    dimensions: usize,
}

impl GeminiEmbeddingProvider {
    /// Create a new provider using the given API key and the default model.
    pub fn new(api_key: impl AsRef<str>) -> Result<Self> {
        Ok(Self {
            client: build_client(api_key.as_ref(), "Gemini")?,
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_EMBEDDING_MODEL.to_string(),
            task_type: TaskType::RetrievalDocument,
            dimensions: DEFAULT_EMBEDDING_DIMENSIONS,
        })
    }

    /// Set the model name and its output dimensionality.
    pub fn with_model(mut self, model: impl Into<String>, dimensions: usize) -> Self {
        self.model = model.into();
        self.dimensions = dimensions;
        self
    }

    /// Set the task type used for document embedding requests.
    pub fn with_task_type(mut self, task_type: TaskType) -> Self {
        self.task_type = task_type;
        self
    }

    /// Point the provider at a different API root.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    fn query_task_type(&self) -> TaskType {
        match self.task_type {
            TaskType::RetrievalDocument => TaskType::RetrievalQuery,
            symmetric => symmetric,
        }
    }

    async fn request_embeddings(
        &self,
        texts: &[&str],
        task_type: TaskType,
    ) -> Result<Vec<Vec<f32>>> {
        debug!(
            provider = "Gemini",
            batch_size = texts.len(),
            model = %self.model,
            ?task_type,
            "embedding batch"
        );

        let model_path = format!("models/{}", self.model);
        let request = BatchEmbedRequest {
            requests: texts
                .iter()
                .map(|&text| EmbedContentRequest {
                    model: &model_path,
                    content: Content { role: None, parts: vec![Part { text }] },
                    task_type,
                })
                .collect(),
        };

        let url = format!("{}/{model_path}:batchEmbedContents", self.base_url);
        let response = self.client.post(&url).json(&request).send().await.map_err(|e| {
            error!(provider = "Gemini", error = %e, "embedding request failed");
            Self::error(format!("request failed: {e}"))
        })?;

        if !response.status().is_success() {
            let status = response.status();
            let detail = error_detail(response).await;
            error!(provider = "Gemini", %status, "API error");
            return Err(Self::error(format!("API returned {status}: {detail}")));
        }

        let parsed: BatchEmbedResponse = response
            .json()
            .await
            .map_err(|e| Self::error(format!("failed to parse response: {e}")))?;

        if parsed.embeddings.len() != texts.len() {
            return Err(Self::error(format!(
                "API returned {} embeddings for {} inputs",
                parsed.embeddings.len(),
                texts.len()
            )));
        }

        Ok(parsed.embeddings.into_iter().map(|e| e.values).collect())
    }

    fn error(message: impl Into<String>) -> RagError {
        RagError::Embedding { provider: "Gemini".into(), message: message.into() }
    }
}

#[async_trait]
impl EmbeddingProvider for GeminiEmbeddingProvider {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        debug!(provider = "Gemini", text_len = text.len(), "embedding single text");

        self.embed_batch(&[text])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| Self::error("API returned empty response"))
    }

    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        self.request_embeddings(texts, self.task_type).await
    }

    async fn embed_query(&self, query: &str) -> Result<Vec<f32>> {
        self.request_embeddings(&[query], self.query_task_type())
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| Self::error("API returned empty response"))
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn name(&self) -> &str {
        "Gemini"
    }
}

/// A [`GenerativeModel`] backed by the Gemini `generateContent` endpoint.
///
/// # Example
///
/// ```rust,ignore
/// use docrag::gemini::GeminiGenerator;
///
/// let model = GeminiGenerator::new("your-api-key")?.with_model("gemini-2.5-pro");
/// let text = model.generate("Summarize ...").await?;
/// ```
#[derive(Debug, Clone)]
pub struct GeminiGenerator {
    client: reqwest::Client,
    base_url: String,
    model: String,
}

impl GeminiGenerator {
    /// Create a generator using the given API key and the default model.
    pub fn new(api_key: impl AsRef<str>) -> Result<Self> {
        Ok(Self {
            client: build_client(api_key.as_ref(), "Gemini")?,
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_GENERATION_MODEL.to_string(),
        })
    }

    /// Set the model name (e.g. `gemini-2.5-pro`).
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Point the generator at a different API root.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    fn error(message: impl Into<String>) -> RagError {
        RagError::Generation { provider: "Gemini".into(), message: message.into() }
    }
}

#[async_trait]
impl GenerativeModel for GeminiGenerator {
    async fn generate(&self, prompt: &str) -> Result<String> {
        debug!(provider = "Gemini", model = %self.model, prompt_len = prompt.len(), "generating content");

        let request = GenerateContentRequest {
            contents: vec![Content { role: Some("user"), parts: vec![Part { text: prompt }] }],
        };
        let url = format!("{}/models/{}:generateContent", self.base_url, self.model);

        let response = self.client.post(&url).json(&request).send().await.map_err(|e| {
            error!(provider = "Gemini", error = %e, "generation request failed");
            Self::error(format!("request failed: {e}"))
        })?;

        if !response.status().is_success() {
            let status = response.status();
            let detail = error_detail(response).await;
            error!(provider = "Gemini", %status, "API error");
            return Err(Self::error(format!("API returned {status}: {detail}")));
        }

        let parsed: GenerateContentResponse = response
            .json()
            .await
            .map_err(|e| Self::error(format!("failed to parse response: {e}")))?;

        let text: String = parsed
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .map(|content| content.parts.into_iter().filter_map(|p| p.text).collect())
            .ok_or_else(|| Self::error("response contained no candidates"))?;

        Ok(text)
    }

    fn name(&self) -> &str {
        "Gemini"
    }
}
