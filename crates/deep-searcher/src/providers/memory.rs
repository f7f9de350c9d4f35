//! In-process vector store
//!
//! Brute-force cosine search over collections held in memory. Useful for tests, small
//! corpora and local experiments; nothing is persisted.

use async_trait::async_trait;
use parking_lot::RwLock;
use serde::Deserialize;
use std::collections::HashMap;

use crate::config::ProviderOptions;
use crate::error::{Error, Result};
use crate::types::{CollectionInfo, MetadataFilter, RetrievalResult, VectorEntry};

use super::parse_options;
use super::vector_store::VectorStoreProvider;

struct MemoryCollection {
    dimension: usize,
    description: String,
    entries: Vec<VectorEntry>,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct MemoryOptions {
    #[serde(default = "default_collection")]
    default_collection: String,
}

fn default_collection() -> String {
    "deepsearcher".to_string()
}

/// In-memory vector store keyed by collection name
pub struct MemoryVectorStore {
    collections: RwLock<HashMap<String, MemoryCollection>>,
    default_collection: String,
}

impl MemoryVectorStore {
    /// Create an empty store
    pub fn new(default_collection: impl Into<String>) -> Self {
        Self {
            collections: RwLock::new(HashMap::new()),
            default_collection: default_collection.into(),
        }
    }

    /// Construct from provider options: `default_collection`
    pub fn from_options(provider: &str, options: &ProviderOptions) -> Result<Self> {
        let opts: MemoryOptions = parse_options(provider, options)?;
        Ok(Self::new(opts.default_collection))
    }
}

impl Default for MemoryVectorStore {
    fn default() -> Self {
        Self::new(default_collection())
    }
}

/// Cosine similarity; zero-norm vectors score 0
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;
    for (x, y) in a.iter().zip(b) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    (dot / (norm_a.sqrt() * norm_b.sqrt())).clamp(-1.0, 1.0)
}

#[async_trait]
impl VectorStoreProvider for MemoryVectorStore {
    async fn init_collection(
        &self,
        name: &str,
        dimension: usize,
        description: &str,
        force_new: bool,
    ) -> Result<()> {
        let mut collections = self.collections.write();

        if let Some(existing) = collections.get(name) {
            if !force_new {
                if existing.dimension != dimension {
                    return Err(Error::DimensionMismatch {
                        collection: name.to_string(),
                        expected: existing.dimension,
                        actual: dimension,
                    });
                }
                tracing::debug!("Collection '{}' already exists, reusing it", name);
                return Ok(());
            }
            tracing::info!("Dropping collection '{}' for recreation", name);
        }

        collections.insert(
            name.to_string(),
            MemoryCollection {
                dimension,
                description: description.to_string(),
                entries: Vec::new(),
            },
        );
        tracing::info!("Created collection '{}' (dimension: {})", name, dimension);
        Ok(())
    }

    async fn insert(&self, collection: &str, entries: &[VectorEntry]) -> Result<()> {
        let mut collections = self.collections.write();
        let target = collections
            .get_mut(collection)
            .ok_or_else(|| Error::CollectionNotFound(collection.to_string()))?;

        if let Some(bad) = entries.iter().find(|e| e.vector.len() != target.dimension) {
            return Err(Error::DimensionMismatch {
                collection: collection.to_string(),
                expected: target.dimension,
                actual: bad.vector.len(),
            });
        }

        target.entries.extend_from_slice(entries);
        Ok(())
    }

    async fn search(
        &self,
        collection: &str,
        query_vector: &[f32],
        top_k: usize,
        filter: Option<&MetadataFilter>,
    ) -> Result<Vec<RetrievalResult>> {
        let collections = self.collections.read();
        let target = collections
            .get(collection)
            .ok_or_else(|| Error::CollectionNotFound(collection.to_string()))?;

        if query_vector.len() != target.dimension {
            return Err(Error::DimensionMismatch {
                collection: collection.to_string(),
                expected: target.dimension,
                actual: query_vector.len(),
            });
        }

        let mut results: Vec<RetrievalResult> = target
            .entries
            .iter()
            .filter(|e| filter.map_or(true, |f| f.matches(&e.metadata)))
            .map(|e| RetrievalResult::from_entry(e, cosine_similarity(query_vector, &e.vector)))
            .collect();

        RetrievalResult::sort_by_score(&mut results);
        results.truncate(top_k);
        Ok(results)
    }

    async fn list_collections(&self) -> Result<Vec<CollectionInfo>> {
        let collections = self.collections.read();
        let mut infos: Vec<CollectionInfo> = collections
            .iter()
            .map(|(name, c)| CollectionInfo {
                name: name.clone(),
                dimension: c.dimension,
                description: c.description.clone(),
            })
            .collect();
        infos.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(infos)
    }

    async fn drop_collection(&self, name: &str) -> Result<()> {
        if self.collections.write().remove(name).is_some() {
            tracing::info!("Dropped collection '{}'", name);
        }
        Ok(())
    }

    fn default_collection(&self) -> &str {
        &self.default_collection
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(true)
    }

    fn name(&self) -> &str {
        "memory"
    }
}
