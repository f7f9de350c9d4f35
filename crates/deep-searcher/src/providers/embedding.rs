//! Embedding provider trait for generating text embeddings

use async_trait::async_trait;

use crate::error::Result;

/// Trait for generating text embeddings
///
/// Implementations:
/// - `OpenAiEmbedder`: OpenAI, Azure OpenAI, SiliconFlow, PPIO (OpenAI-compatible `/embeddings`)
/// - `OllamaEmbedder`: Local Ollama server (nomic-embed-text, bge-m3)
///
/// A failed call returns [`crate::Error::EmbeddingDegraded`]; no implementation substitutes
/// a placeholder vector.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Embed a single query string; the result has exactly `dimension()` values
    async fn embed_query(&self, text: &str) -> Result<Vec<f32>>;

    /// Embed several documents, index-aligned with `texts`
    ///
    /// Default implementation calls `embed_query` sequentially.
    async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut embeddings = Vec::with_capacity(texts.len());
        for text in texts {
            embeddings.push(self.embed_query(text).await?);
        }
        Ok(embeddings)
    }

    /// Vector width, fixed for the lifetime of the instance
    fn dimension(&self) -> usize;

    /// Check if the provider is reachable
    async fn health_check(&self) -> Result<bool>;

    /// Provider name for logging
    fn name(&self) -> &str;
}
