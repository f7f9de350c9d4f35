//! In-test providers shared by the integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use deep_searcher::config::{CallPolicy, QuerySettings};
use deep_searcher::providers::memory::MemoryVectorStore;
use deep_searcher::providers::{
    ChatMessage, ChatResponse, EmbeddingProvider, LlmProvider, VectorStoreProvider,
};
use deep_searcher::types::{CollectionInfo, MetadataFilter, RetrievalResult, VectorEntry};
use deep_searcher::{Error, Result};
use parking_lot::Mutex;
use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

pub const DIMENSION: usize = 32;

/// Bag-of-words embedder: each lowercase word bumps one hashed slot
pub struct HashEmbedder {
    dimension: usize,
    /// Queries that fail with `EmbeddingDegraded`
    failing: HashSet<String>,
}

impl HashEmbedder {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            dimension: DIMENSION,
            failing: HashSet::new(),
        })
    }

    pub fn failing_on(queries: &[&str]) -> Arc<Self> {
        Arc::new(Self {
            dimension: DIMENSION,
            failing: queries.iter().map(|q| q.to_string()).collect(),
        })
    }

    pub fn vector(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0; self.dimension];
        for word in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
        {
            let hash = word
                .to_lowercase()
                .bytes()
                .fold(2166136261u32, |h, b| (h ^ b as u32).wrapping_mul(16777619));
            vector[hash as usize % self.dimension] += 1.0;
        }
        vector
    }
}

#[async_trait]
impl EmbeddingProvider for HashEmbedder {
    async fn embed_query(&self, text: &str) -> Result<Vec<f32>> {
        if self.failing.contains(text) {
            return Err(Error::embedding_degraded("hash", "scripted outage"));
        }
        Ok(self.vector(text))
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(true)
    }

    fn name(&self) -> &str {
        "hash"
    }
}

/// LLM that replays canned replies in order and records every prompt
pub struct ScriptedLlm {
    replies: Mutex<VecDeque<String>>,
    prompts: Mutex<Vec<String>>,
    tokens_per_call: u64,
}

impl ScriptedLlm {
    pub fn new(replies: &[&str], tokens_per_call: u64) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(replies.iter().map(|r| r.to_string()).collect()),
            prompts: Mutex::new(Vec::new()),
            tokens_per_call,
        })
    }

    pub fn calls(&self) -> usize {
        self.prompts.lock().len()
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().clone()
    }
}

#[async_trait]
impl LlmProvider for ScriptedLlm {
    async fn chat(&self, messages: &[ChatMessage]) -> Result<ChatResponse> {
        let prompt = messages
            .iter()
            .map(|m| m.content.as_str())
            .collect::<Vec<_>>()
            .join("\n");
        self.prompts.lock().push(prompt);

        let content = self
            .replies
            .lock()
            .pop_front()
            .ok_or_else(|| Error::generation("script exhausted"))?;
        Ok(ChatResponse {
            content,
            total_tokens: self.tokens_per_call,
        })
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(true)
    }

    fn name(&self) -> &str {
        "scripted"
    }

    fn model(&self) -> &str {
        "scripted-1"
    }
}

/// Memory store whose searches start failing after `ok_searches` successful calls
pub struct FlakyStore {
    inner: MemoryVectorStore,
    ok_searches: usize,
    searches: AtomicUsize,
    searched: Mutex<Vec<String>>,
}

impl FlakyStore {
    pub fn new(inner: MemoryVectorStore, ok_searches: usize) -> Arc<Self> {
        Arc::new(Self {
            inner,
            ok_searches,
            searches: AtomicUsize::new(0),
            searched: Mutex::new(Vec::new()),
        })
    }

    pub fn reliable(inner: MemoryVectorStore) -> Arc<Self> {
        Self::new(inner, usize::MAX)
    }

    /// Collections searched so far, in call order
    pub fn searched(&self) -> Vec<String> {
        self.searched.lock().clone()
    }
}

#[async_trait]
impl VectorStoreProvider for FlakyStore {
    async fn init_collection(
        &self,
        name: &str,
        dimension: usize,
        description: &str,
        force_new: bool,
    ) -> Result<()> {
        self.inner
            .init_collection(name, dimension, description, force_new)
            .await
    }

    async fn insert(&self, collection: &str, entries: &[VectorEntry]) -> Result<()> {
        self.inner.insert(collection, entries).await
    }

    async fn search(
        &self,
        collection: &str,
        vector: &[f32],
        top_k: usize,
        filter: Option<&MetadataFilter>,
    ) -> Result<Vec<RetrievalResult>> {
        self.searched.lock().push(collection.to_string());
        if self.searches.fetch_add(1, Ordering::SeqCst) >= self.ok_searches {
            return Err(Error::vector_db("connection reset"));
        }
        self.inner.search(collection, vector, top_k, filter).await
    }

    async fn list_collections(&self) -> Result<Vec<CollectionInfo>> {
        self.inner.list_collections().await
    }

    async fn drop_collection(&self, name: &str) -> Result<()> {
        self.inner.drop_collection(name).await
    }

    fn default_collection(&self) -> &str {
        self.inner.default_collection()
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(true)
    }

    fn name(&self) -> &str {
        "flaky"
    }
}

/// Store `docs` as `(reference, text)` pairs in `collection`, one entry each
pub async fn seed(
    store: &dyn VectorStoreProvider,
    embedder: &HashEmbedder,
    collection: &str,
    description: &str,
    docs: &[(&str, &str)],
) {
    store
        .init_collection(collection, embedder.dimension(), description, false)
        .await
        .unwrap();
    let entries: Vec<VectorEntry> = docs
        .iter()
        .map(|(reference, text)| VectorEntry {
            vector: embedder.vector(text),
            text: text.to_string(),
            reference: reference.to_string(),
            metadata: Default::default(),
        })
        .collect();
    store.insert(collection, &entries).await.unwrap();
}

/// Settings with fast, retry-free policies
pub fn settings() -> QuerySettings {
    let fast = CallPolicy {
        timeout_secs: 5,
        max_retries: 0,
        backoff_base_ms: 1,
    };
    QuerySettings {
        max_iter: 3,
        top_k: 3,
        token_budget: None,
        route_collections: true,
        retrieval_policy: fast.clone(),
        generation_policy: fast,
    }
}

pub const MILVUS_DOCS: &[(&str, &str)] = &[
    ("milvus.md", "Milvus is an open source vector database built for similarity search"),
    ("index.md", "Milvus index types include IVF_FLAT HNSW and DISKANN"),
    ("storage.md", "Milvus stores segments in object storage such as MinIO or S3"),
    ("recipes.md", "Slow cooked ragu needs tomatoes onions and patience"),
];
