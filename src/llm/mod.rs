//! Completion-backed field extraction: the model capability trait, prompt
//! construction, lenient answer parsing, and the schema-bound extractor.

#[cfg(feature = "openai")]
pub mod client;
pub mod extractor;
pub mod prompts;
pub mod types;

#[cfg(feature = "openai")]
pub use client::{EmbeddingRetriever, OpenAiClient};
pub use extractor::FieldExtractor;
pub use types::FieldExtraction;

use async_trait::async_trait;

use crate::error::Result;

/// Chat-style completion capability. One system prompt, one user prompt, one
/// text answer; parsing stays on the caller's side so any backend that can
/// return text qualifies.
#[async_trait]
pub trait CompletionModel: Send + Sync {
    async fn complete(&self, system_prompt: &str, user_prompt: &str) -> Result<String>;
}
