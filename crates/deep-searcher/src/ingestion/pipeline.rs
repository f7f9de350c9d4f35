//! Ingestion pipeline: documents → chunks → embeddings → vector store

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;

use crate::agent::call::with_policy;
use crate::config::{CallPolicy, LoadSettings};
use crate::error::{Error, Result};
use crate::providers::{EmbeddingProvider, VectorStoreProvider};
use crate::types::{Document, VectorEntry};

use super::chunker::TextChunker;
use super::crawler::WebCrawler;
use super::loader::FileLoader;

/// Summary of one load call
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LoadReport {
    /// Collection written to
    pub collection: String,
    /// Documents read
    pub documents: usize,
    /// Chunks produced
    pub chunks: usize,
    /// Chunks written to the store
    pub inserted: usize,
    /// Chunks dropped because their embedding batch failed
    pub skipped: usize,
    /// Files or URLs that could not be read
    pub failed_sources: Vec<String>,
}

/// Chunks, embeds and stores documents in one collection
pub struct IngestPipeline {
    embedder: Arc<dyn EmbeddingProvider>,
    store: Arc<dyn VectorStoreProvider>,
    settings: LoadSettings,
    policy: CallPolicy,
}

impl IngestPipeline {
    /// Create a pipeline over an embedder and a store
    pub fn new(
        embedder: Arc<dyn EmbeddingProvider>,
        store: Arc<dyn VectorStoreProvider>,
        settings: LoadSettings,
        policy: CallPolicy,
    ) -> Self {
        Self {
            embedder,
            store,
            settings,
            policy,
        }
    }

    /// Read `paths` (files or directories) with `loader` and ingest them
    ///
    /// A path that does not exist fails the whole call; unreadable files are reported in
    /// [`LoadReport::failed_sources`].
    pub async fn load_from_local_files(
        &self,
        loader: Arc<dyn FileLoader>,
        paths: &[PathBuf],
        collection_name: Option<&str>,
        collection_description: Option<&str>,
        force_new_collection: bool,
    ) -> Result<LoadReport> {
        if let Some(missing) = paths.iter().find(|p| !p.exists()) {
            return Err(Error::load(missing.display().to_string(), "path does not exist"));
        }

        let paths = paths.to_vec();
        let (documents, failed_sources) = tokio::task::spawn_blocking(move || {
            let mut documents = Vec::new();
            let mut failed = Vec::new();
            for path in &paths {
                let loaded = if path.is_dir() {
                    loader.load_directory(path)
                } else {
                    loader.load_file(path)
                };
                match loaded {
                    Ok(docs) => documents.extend(docs),
                    Err(e) => {
                        tracing::warn!("Failed to load {}: {}", path.display(), e);
                        failed.push(path.display().to_string());
                    }
                }
            }
            (documents, failed)
        })
        .await
        .map_err(|e| Error::internal(format!("file loading task failed: {}", e)))?;

        let mut report = self
            .ingest(documents, collection_name, collection_description, force_new_collection)
            .await?;
        report.failed_sources = failed_sources;
        Ok(report)
    }

    /// Fetch `urls` with `crawler` and ingest them
    ///
    /// URLs that fail are reported in [`LoadReport::failed_sources`].
    pub async fn load_from_website(
        &self,
        crawler: Arc<dyn WebCrawler>,
        urls: &[String],
        collection_name: Option<&str>,
        collection_description: Option<&str>,
        force_new_collection: bool,
    ) -> Result<LoadReport> {
        let mut documents = Vec::new();
        let mut failed_sources = Vec::new();
        for url in urls {
            match crawler.crawl_url(url).await {
                Ok(docs) => documents.extend(docs),
                Err(e) => {
                    tracing::warn!("Failed to crawl {}: {}", url, e);
                    failed_sources.push(url.clone());
                }
            }
        }

        let mut report = self
            .ingest(documents, collection_name, collection_description, force_new_collection)
            .await?;
        report.failed_sources = failed_sources;
        Ok(report)
    }

    /// Ingest already-loaded documents
    pub async fn ingest(
        &self,
        documents: Vec<Document>,
        collection_name: Option<&str>,
        collection_description: Option<&str>,
        force_new_collection: bool,
    ) -> Result<LoadReport> {
        let collection = collection_name
            .map(str::to_string)
            .unwrap_or_else(|| self.store.default_collection().to_string());
        let description = collection_description.unwrap_or_default();

        self.store
            .init_collection(&collection, self.embedder.dimension(), description, force_new_collection)
            .await?;

        let chunker = TextChunker::new(self.settings.chunk_size, self.settings.chunk_overlap);
        let chunks: Vec<_> = documents.iter().flat_map(|d| chunker.chunk_document(d)).collect();

        let mut report = LoadReport {
            collection: collection.clone(),
            documents: documents.len(),
            chunks: chunks.len(),
            ..Default::default()
        };

        tracing::info!(
            "Ingesting {} documents ({} chunks) into '{}'",
            report.documents,
            report.chunks,
            collection
        );

        let batch_size = self.settings.batch_size.max(1);
        for (batch_index, batch) in chunks.chunks(batch_size).enumerate() {
            let texts: Vec<String> = batch.iter().map(|c| c.text.clone()).collect();

            let embeddings = match with_policy(&self.policy, "embed_documents", || {
                self.embedder.embed_documents(&texts)
            })
            .await
            {
                Ok(embeddings) => embeddings,
                Err(Error::EmbeddingDegraded { provider, reason }) => {
                    tracing::warn!(
                        "Skipping batch {} ({} chunks): embedding degraded ({}): {}",
                        batch_index,
                        batch.len(),
                        provider,
                        reason
                    );
                    report.skipped += batch.len();
                    continue;
                }
                Err(e) => return Err(e),
            };

            if embeddings.len() != batch.len() {
                return Err(Error::Embedding(format!(
                    "{} returned {} embeddings for {} chunks",
                    self.embedder.name(),
                    embeddings.len(),
                    batch.len()
                )));
            }

            let entries: Vec<VectorEntry> = batch
                .iter()
                .cloned()
                .zip(embeddings)
                .map(|(chunk, vector)| chunk.into_entry(vector))
                .collect();

            with_policy(&self.policy, "insert", || self.store.insert(&collection, &entries)).await?;
            report.inserted += entries.len();
            tracing::debug!("Inserted batch {} ({} chunks)", batch_index, entries.len());
        }

        tracing::info!(
            "Loaded '{}': {} inserted, {} skipped",
            collection,
            report.inserted,
            report.skipped
        );

        Ok(report)
    }
}
