//! High-level entry point tying the registry, ingestion and the query agent together

use std::path::PathBuf;
use std::sync::Arc;

use crate::config::ProviderConfig;
use crate::error::Result;
use crate::ingestion::LoadReport;
use crate::registry::{init_config, ProviderRegistry};
use crate::types::{MetadataFilter, QueryOutcome};

/// Cheap-to-clone handle over a frozen [`ProviderRegistry`]
///
/// Clones share provider instances, so concurrent queries reuse the same HTTP clients and
/// vector store.
#[derive(Clone)]
pub struct DeepSearcher {
    registry: Arc<ProviderRegistry>,
}

impl DeepSearcher {
    /// Wrap an initialized registry
    pub fn new(registry: Arc<ProviderRegistry>) -> Self {
        Self { registry }
    }

    /// Initialize a registry from `config` and wrap it
    pub fn from_config(config: ProviderConfig) -> Result<Self> {
        Ok(Self::new(init_config(config)?))
    }

    /// Underlying registry
    pub fn registry(&self) -> &Arc<ProviderRegistry> {
        &self.registry
    }

    /// Answer a question; `max_iter` defaults to the configured query settings
    pub async fn query(&self, question: &str, max_iter: Option<usize>) -> Result<QueryOutcome> {
        self.query_filtered(question, max_iter, None).await
    }

    /// Answer a question searching only entries that match `filter`
    pub async fn query_filtered(
        &self,
        question: &str,
        max_iter: Option<usize>,
        filter: Option<&MetadataFilter>,
    ) -> Result<QueryOutcome> {
        let agent = self.registry.deep_search().await?;
        let max_iter = max_iter.unwrap_or(agent.settings().max_iter);
        agent.query_filtered(question, max_iter, filter).await
    }

    /// Load files or directories with the configured file loader
    ///
    /// `collection_name` falls back to the vector store's default collection.
    pub async fn load_from_local_files(
        &self,
        paths: &[PathBuf],
        collection_name: Option<&str>,
        collection_description: Option<&str>,
        force_new_collection: bool,
    ) -> Result<LoadReport> {
        let loader = self.registry.file_loader().await?;
        self.registry
            .ingest_pipeline()
            .await?
            .load_from_local_files(loader, paths, collection_name, collection_description, force_new_collection)
            .await
    }

    /// Crawl URLs with the configured web crawler
    pub async fn load_from_website(
        &self,
        urls: &[String],
        collection_name: Option<&str>,
        collection_description: Option<&str>,
        force_new_collection: bool,
    ) -> Result<LoadReport> {
        let crawler = self.registry.web_crawler().await?;
        self.registry
            .ingest_pipeline()
            .await?
            .load_from_website(crawler, urls, collection_name, collection_description, force_new_collection)
            .await
    }
}
