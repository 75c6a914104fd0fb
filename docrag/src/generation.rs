//! Generative model trait.

use async_trait::async_trait;

use crate::error::Result;

/// A text-in, text-out generative model.
///
/// Implementations return the model's complete output; there is no streaming.
#[async_trait]
pub trait GenerativeModel: Send + Sync {
    /// Generate a completion for `prompt`.
    async fn generate(&self, prompt: &str) -> Result<String>;

    /// Short provider name used in logs and errors.
    fn name(&self) -> &str {
        "custom"
    }
}
