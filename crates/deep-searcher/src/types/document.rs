//! Loaded documents and the chunks cut from them

use serde::{Deserialize, Serialize};

use super::retrieval::{Metadata, VectorEntry};

/// A document produced by a file loader or web crawler
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    /// Full text content
    pub text: String,
    /// Source identifier (file path or URL)
    pub reference: String,
    /// Loader-provided metadata
    #[serde(default)]
    pub metadata: Metadata,
}

impl Document {
    /// Create a document without metadata
    pub fn new(text: impl Into<String>, reference: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            reference: reference.into(),
            metadata: Metadata::new(),
        }
    }

    /// Attach a metadata field
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

/// A piece of a document ready to be embedded
#[derive(Debug, Clone, PartialEq)]
pub struct Chunk {
    /// Chunk text
    pub text: String,
    /// Reference of the parent document
    pub reference: String,
    /// Parent metadata plus `chunk_index`, `char_start` and `char_end`
    pub metadata: Metadata,
}

impl Chunk {
    /// Pair with its embedding
    pub fn into_entry(self, vector: Vec<f32>) -> VectorEntry {
        VectorEntry {
            vector,
            text: self.text,
            reference: self.reference,
            metadata: self.metadata,
        }
    }
}
