//! Provider abstractions for embeddings, LLM and vector storage
//!
//! Each capability is a trait; concrete backends are selected by name through
//! [`crate::registry::ProviderRegistry`].

pub mod embedding;
pub mod llm;
pub mod memory;
pub mod ollama;
pub mod openai;
pub mod qdrant;
pub mod vector_store;

pub use embedding::EmbeddingProvider;
pub use llm::{ChatMessage, ChatResponse, LlmProvider, Role};
pub use vector_store::VectorStoreProvider;

use serde::de::DeserializeOwned;

use crate::config::ProviderOptions;
use crate::error::{Error, Result};

/// Deserialize a provider's option mapping into its typed options struct
///
/// Options structs use `deny_unknown_fields`, so unrecognized keys fail here.
pub(crate) fn parse_options<T: DeserializeOwned>(provider: &str, options: &ProviderOptions) -> Result<T> {
    serde_json::from_value(serde_json::Value::Object(options.clone()))
        .map_err(|e| Error::provider_init(provider, format!("invalid options: {}", e)))
}
