//! Grounded prompt assembly and answer generation.

use std::fmt::Write as _;
use std::sync::Arc;

use tracing::{error, info};

use crate::document::RetrievedMatch;
use crate::error::Result;
use crate::generation::GenerativeModel;

/// Build the grounding prompt for `query` from `matches`.
///
/// Matches are numbered from 1 in the given order, each with its source tag
/// and text, and followed by instructions to answer from the context when it
/// is sufficient and to say so explicitly when it is not.
pub fn build_prompt(query: &str, matches: &[RetrievedMatch]) -> String {
    let mut context = String::from("Relevant information from documents:\n");
    for (i, m) in matches.iter().enumerate() {
        // Writing into a String cannot fail.
        let _ = write!(context, "Document {} (Source: {}):\n{}\n\n", i + 1, m.source, m.text);
    }

    format!(
        "Query: {query}\n\n\
         Using the information provided below, generate a clear, formal, and informative answer to the query.\n\
         If the answer can be found in the documents, respond based only on that.\n\
         If the documents do not contain sufficient or relevant information, mention that explicitly and provide a general answer.\n\
         ---\n\
         Document Context:\n{context}\n\
         ---"
    )
}

/// Turns retrieved matches into an answer via a [`GenerativeModel`].
#[derive(Clone)]
pub struct AnswerComposer {
    model: Arc<dyn GenerativeModel>,
}

impl AnswerComposer {
    /// Create a composer that delegates generation to `model`.
    pub fn new(model: Arc<dyn GenerativeModel>) -> Self {
        Self { model }
    }

    /// Build the prompt and return the model's output verbatim.
    ///
    /// # Errors
    ///
    /// Propagates the model's error without retrying.
    pub async fn compose(&self, query: &str, matches: &[RetrievedMatch]) -> Result<String> {
        info!(provider = self.model.name(), match_count = matches.len(), "generating answer");
        let prompt = build_prompt(query, matches);
        let text = self.model.generate(&prompt).await.map_err(|e| {
            error!(provider = self.model.name(), error = %e, "answer generation failed");
            e
        })?;
        info!(provider = self.model.name(), answer_len = text.len(), "generated answer");
        Ok(text)
    }
}

impl std::fmt::Debug for AnswerComposer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnswerComposer").field("model", &self.model.name()).finish()
    }
}
