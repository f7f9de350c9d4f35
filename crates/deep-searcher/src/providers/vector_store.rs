//! Vector store provider trait for collections of embedded chunks

use async_trait::async_trait;

use crate::error::Result;
use crate::types::{CollectionInfo, MetadataFilter, RetrievalResult, VectorEntry};

/// Trait for vector storage and similarity search
///
/// Implementations:
/// - `MemoryVectorStore`: In-process brute-force cosine store
/// - `QdrantStore`: Qdrant over its REST API
#[async_trait]
pub trait VectorStoreProvider: Send + Sync {
    /// Create a collection if absent
    ///
    /// With `force_new` an existing collection is dropped and recreated. An existing
    /// collection of a different dimension without `force_new` is a
    /// [`crate::Error::DimensionMismatch`].
    async fn init_collection(
        &self,
        name: &str,
        dimension: usize,
        description: &str,
        force_new: bool,
    ) -> Result<()>;

    /// Append entries to a collection
    async fn insert(&self, collection: &str, entries: &[VectorEntry]) -> Result<()>;

    /// At most `top_k` results by descending score; an empty collection yields `[]`
    async fn search(
        &self,
        collection: &str,
        query_vector: &[f32],
        top_k: usize,
        filter: Option<&MetadataFilter>,
    ) -> Result<Vec<RetrievalResult>>;

    /// All collections with their dimension and description
    async fn list_collections(&self) -> Result<Vec<CollectionInfo>>;

    /// Drop a collection; missing collections are ignored
    async fn drop_collection(&self, name: &str) -> Result<()>;

    /// Collection used when the caller names none
    fn default_collection(&self) -> &str;

    /// Check if the backend is reachable
    async fn health_check(&self) -> Result<bool>;

    /// Provider name for logging
    fn name(&self) -> &str;
}
