//! Language model seam.

use async_trait::async_trait;

use crate::error::LlmResult;

/// A chat-completion backend.
///
/// The harvester drives this with a system prompt describing the import
/// envelope and a user prompt describing the site; the response is
/// expected to be the raw JSON payload (possibly fenced, the caller
/// strips fences).
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// One-shot completion of a system + user prompt pair.
    async fn complete(&self, system: &str, user: &str) -> LlmResult<String>;

    /// Embedding vector for semantic features.
    async fn embed(&self, text: &str) -> LlmResult<Vec<f32>>;

    /// Model identifier for logs.
    fn name(&self) -> &str {
        "unknown"
    }
}
