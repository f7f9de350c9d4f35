//! Error types for deep-searcher

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Result type alias for deep-searcher operations
pub type Result<T> = std::result::Result<T, Error>;

/// deep-searcher errors
#[derive(Debug, Error)]
pub enum Error {
    /// Bad or missing provider selection, unreadable config file
    #[error("Configuration error: {0}")]
    Config(String),

    /// Provider name not in the known set for a capability
    #[error("Unknown provider '{provider}' for capability '{capability}'")]
    UnknownProvider { capability: String, provider: String },

    /// Provider construction failed (bad options, missing credentials, unreachable backend)
    #[error("Failed to initialize provider '{provider}': {message}")]
    ProviderInit { provider: String, message: String },

    /// Embedding width does not match the collection width
    #[error("Dimension mismatch for collection '{collection}': expected {expected}, got {actual}")]
    DimensionMismatch {
        collection: String,
        expected: usize,
        actual: usize,
    },

    /// A single embedding call failed; no vector was produced
    #[error("Embedding degraded ({provider}): {reason}")]
    EmbeddingDegraded { provider: String, reason: String },

    /// Embedding response was malformed
    #[error("Embedding generation failed: {0}")]
    Embedding(String),

    /// Vector database error
    #[error("Vector database error: {0}")]
    VectorDb(String),

    /// Collection does not exist
    #[error("Collection not found: {0}")]
    CollectionNotFound(String),

    /// LLM call failed
    #[error("Generation failed: {0}")]
    Generation(String),

    /// File loading or crawling failed
    #[error("Failed to load '{source_ref}': {message}")]
    Load { source_ref: String, message: String },

    /// Provider call exceeded its timeout
    #[error("{operation} timed out after {secs}s")]
    Timeout { operation: String, secs: u64 },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP request error
    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create a provider construction error
    pub fn provider_init(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ProviderInit {
            provider: provider.into(),
            message: message.into(),
        }
    }

    /// Create a degraded-embedding error
    pub fn embedding_degraded(provider: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::EmbeddingDegraded {
            provider: provider.into(),
            reason: reason.into(),
        }
    }

    /// Create a vector db error
    pub fn vector_db(message: impl Into<String>) -> Self {
        Self::VectorDb(message.into())
    }

    /// Create a generation error
    pub fn generation(message: impl Into<String>) -> Self {
        Self::Generation(message.into())
    }

    /// Create a load error
    pub fn load(source_ref: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Load {
            source_ref: source_ref.into(),
            message: message.into(),
        }
    }

    /// Create an internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Whether retrying the same call could succeed
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Error::EmbeddingDegraded { .. }
                | Error::Timeout { .. }
                | Error::Http(_)
                | Error::VectorDb(_)
                | Error::Generation(_)
        )
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let (status, error_type) = match &self {
            Error::Config(_) => (StatusCode::BAD_REQUEST, "config_error"),
            Error::UnknownProvider { .. } => (StatusCode::BAD_REQUEST, "unknown_provider"),
            Error::ProviderInit { .. } => (StatusCode::BAD_REQUEST, "provider_init_error"),
            Error::DimensionMismatch { .. } => (StatusCode::CONFLICT, "dimension_mismatch"),
            Error::EmbeddingDegraded { .. } | Error::Embedding(_) => {
                (StatusCode::BAD_GATEWAY, "embedding_error")
            }
            Error::VectorDb(_) => (StatusCode::INTERNAL_SERVER_ERROR, "vector_db_error"),
            Error::CollectionNotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
            Error::Generation(_) => (StatusCode::SERVICE_UNAVAILABLE, "generation_error"),
            Error::Load { .. } => (StatusCode::BAD_REQUEST, "load_error"),
            Error::Timeout { .. } => (StatusCode::GATEWAY_TIMEOUT, "timeout"),
            Error::Io(_) => (StatusCode::INTERNAL_SERVER_ERROR, "io_error"),
            Error::Json(_) => (StatusCode::BAD_REQUEST, "json_error"),
            Error::Http(_) => (StatusCode::BAD_GATEWAY, "http_error"),
            Error::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error"),
        };

        let body = Json(json!({
            "error": {
                "type": error_type,
                "message": self.to_string(),
            }
        }));

        (status, body).into_response()
    }
}
