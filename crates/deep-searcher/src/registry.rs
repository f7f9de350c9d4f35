//! Provider registry
//!
//! [`init_config`] freezes a [`ProviderConfig`] into a shared [`ProviderRegistry`]. Each
//! capability's provider is constructed on first use from its name and options, then cached
//! for the registry's lifetime.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tokio::sync::OnceCell;

use crate::agent::DeepSearch;
use crate::config::{Capability, ProviderConfig, ProviderOptions, ProviderSetting};
use crate::error::{Error, Result};
use crate::ingestion::{
    FileLoader, HtmlCrawler, IngestPipeline, JsonFileLoader, PdfLoader, TextLoader, WebCrawler,
};
use crate::providers::memory::MemoryVectorStore;
use crate::providers::ollama::{OllamaEmbedder, OllamaLlm};
use crate::providers::openai::{OpenAiEmbedder, OpenAiFlavor, OpenAiLlm};
use crate::providers::qdrant::QdrantStore;
use crate::providers::{EmbeddingProvider, LlmProvider, VectorStoreProvider};

/// Closed set of named provider variants for one capability
trait Backend: Copy + 'static {
    const CAPABILITY: Capability;
    const VARIANTS: &'static [(&'static str, Self)];

    fn variant_name(&self) -> &'static str
    where
        Self: PartialEq,
    {
        Self::VARIANTS
            .iter()
            .find(|(_, v)| v == self)
            .map(|(name, _)| *name)
            .unwrap_or("unknown")
    }
}

fn parse_backend<B: Backend>(name: &str) -> Result<B> {
    B::VARIANTS
        .iter()
        .find(|(known, _)| *known == name)
        .map(|(_, variant)| *variant)
        .ok_or_else(|| Error::UnknownProvider {
            capability: B::CAPABILITY.to_string(),
            provider: name.to_string(),
        })
}

macro_rules! backend_enum {
    ($(#[$meta:meta])* $name:ident, $capability:expr, { $($variant:ident => $label:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq)]
        pub enum $name {
            $($variant),+
        }

        impl Backend for $name {
            const CAPABILITY: Capability = $capability;
            const VARIANTS: &'static [(&'static str, Self)] = &[$(($label, Self::$variant)),+];
        }

        impl FromStr for $name {
            type Err = Error;

            fn from_str(s: &str) -> Result<Self> {
                parse_backend(s)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.variant_name())
            }
        }
    };
}

backend_enum!(
    /// Embedding providers
    EmbeddingBackend, Capability::Embedding, {
        OpenAi => "OpenAIEmbedding",
        SiliconFlow => "SiliconflowEmbedding",
        Ppio => "PPIOEmbedding",
        Ollama => "OllamaEmbedding",
    }
);

backend_enum!(
    /// Chat model providers
    LlmBackend, Capability::Llm, {
        OpenAi => "OpenAI",
        AzureOpenAi => "AzureOpenAI",
        DeepSeek => "DeepSeek",
        SiliconFlow => "SiliconFlow",
        Ppio => "PPIO",
        Ollama => "Ollama",
    }
);

backend_enum!(
    /// Vector store providers
    VectorDbBackend, Capability::VectorDb, {
        Memory => "Memory",
        Qdrant => "Qdrant",
    }
);

backend_enum!(
    /// Local file loaders
    FileLoaderBackend, Capability::FileLoader, {
        Text => "TextLoader",
        JsonLines => "JsonFileLoader",
        Pdf => "PdfLoader",
    }
);

backend_enum!(
    /// Web crawlers
    WebCrawlerBackend, Capability::WebCrawler, {
        Html => "HtmlCrawler",
    }
);

/// A constructed provider of any capability
#[derive(Clone)]
pub enum Provider {
    Embedding(Arc<dyn EmbeddingProvider>),
    Llm(Arc<dyn LlmProvider>),
    VectorDb(Arc<dyn VectorStoreProvider>),
    FileLoader(Arc<dyn FileLoader>),
    WebCrawler(Arc<dyn WebCrawler>),
}

impl Provider {
    /// Capability this provider fills
    pub fn capability(&self) -> Capability {
        match self {
            Self::Embedding(_) => Capability::Embedding,
            Self::Llm(_) => Capability::Llm,
            Self::VectorDb(_) => Capability::VectorDb,
            Self::FileLoader(_) => Capability::FileLoader,
            Self::WebCrawler(_) => Capability::WebCrawler,
        }
    }

    /// Provider name for logging
    pub fn name(&self) -> &str {
        match self {
            Self::Embedding(p) => p.name(),
            Self::Llm(p) => p.name(),
            Self::VectorDb(p) => p.name(),
            Self::FileLoader(p) => p.name(),
            Self::WebCrawler(p) => p.name(),
        }
    }
}

impl fmt::Debug for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Provider({}: {})", self.capability(), self.name())
    }
}

/// Frozen provider configuration with construct-once provider instances
pub struct ProviderRegistry {
    config: ProviderConfig,
    embedder: OnceCell<Arc<dyn EmbeddingProvider>>,
    llm: OnceCell<Arc<dyn LlmProvider>>,
    vector_db: OnceCell<Arc<dyn VectorStoreProvider>>,
    file_loader: OnceCell<Arc<dyn FileLoader>>,
    web_crawler: OnceCell<Arc<dyn WebCrawler>>,
}

/// Freeze `config` into a shared registry
///
/// Fails with [`Error::Config`] when `embedding`, `llm` or `vector_db` has no provider.
/// Nothing is constructed yet.
pub fn init_config(config: ProviderConfig) -> Result<Arc<ProviderRegistry>> {
    ProviderRegistry::init_config(config)
}

impl ProviderRegistry {
    /// See [`init_config`]
    pub fn init_config(config: ProviderConfig) -> Result<Arc<Self>> {
        let missing: Vec<&str> = Capability::REQUIRED
            .iter()
            .filter(|c| config.get_provider_config(**c).is_none())
            .map(|c| c.as_str())
            .collect();
        if !missing.is_empty() {
            return Err(Error::config(format!(
                "No provider configured for: {}",
                missing.join(", ")
            )));
        }

        for (capability, setting) in &config.provide_settings {
            tracing::info!("{}: {}", capability, setting.provider);
        }

        Ok(Arc::new(Self {
            config,
            embedder: OnceCell::new(),
            llm: OnceCell::new(),
            vector_db: OnceCell::new(),
            file_loader: OnceCell::new(),
            web_crawler: OnceCell::new(),
        }))
    }

    /// Registry with one capability reselected
    ///
    /// Instances already constructed for the other capabilities carry over, so an in-memory
    /// store keeps its collections when only the LLM changes.
    pub fn with_provider(
        &self,
        capability: Capability,
        provider: impl Into<String>,
        options: ProviderOptions,
    ) -> Result<Arc<Self>> {
        fn carry<T: Clone>(cell: &OnceCell<T>, keep: bool) -> OnceCell<T> {
            OnceCell::new_with(cell.get().filter(|_| keep).cloned())
        }

        let mut config = self.config.clone();
        config.set_provider(capability, provider, options);

        Ok(Arc::new(Self {
            config,
            embedder: carry(&self.embedder, capability != Capability::Embedding),
            llm: carry(&self.llm, capability != Capability::Llm),
            vector_db: carry(&self.vector_db, capability != Capability::VectorDb),
            file_loader: carry(&self.file_loader, capability != Capability::FileLoader),
            web_crawler: carry(&self.web_crawler, capability != Capability::WebCrawler),
        }))
    }

    /// Configuration this registry was built from
    pub fn config(&self) -> &ProviderConfig {
        &self.config
    }

    fn setting(&self, capability: Capability) -> Result<&ProviderSetting> {
        self.config.get_provider_config(capability).ok_or_else(|| {
            Error::config(format!("No provider configured for '{}'", capability))
        })
    }

    /// Fail with [`Error::ProviderInit`] when `validate_on_init` is set and the backend is down
    async fn validate<F>(&self, provider: &str, check: F) -> Result<()>
    where
        F: std::future::Future<Output = Result<bool>>,
    {
        if !self.config.validate_on_init {
            return Ok(());
        }
        match check.await {
            Ok(true) => Ok(()),
            Ok(false) => Err(Error::provider_init(provider, "health check failed")),
            Err(e) => Err(Error::provider_init(provider, format!("health check failed: {}", e))),
        }
    }

    /// Construct (once) and return the provider for `capability`
    pub async fn resolve(&self, capability: Capability) -> Result<Provider> {
        Ok(match capability {
            Capability::Embedding => Provider::Embedding(self.embedder().await?),
            Capability::Llm => Provider::Llm(self.llm().await?),
            Capability::VectorDb => Provider::VectorDb(self.vector_db().await?),
            Capability::FileLoader => Provider::FileLoader(self.file_loader().await?),
            Capability::WebCrawler => Provider::WebCrawler(self.web_crawler().await?),
        })
    }

    /// Embedding provider
    pub async fn embedder(&self) -> Result<Arc<dyn EmbeddingProvider>> {
        self.embedder
            .get_or_try_init(|| async {
                let setting = self.setting(Capability::Embedding)?;
                let name = setting.provider.as_str();
                let options = &setting.config;

                let embedder: Arc<dyn EmbeddingProvider> = match name.parse::<EmbeddingBackend>()? {
                    EmbeddingBackend::OpenAi => {
                        Arc::new(OpenAiEmbedder::from_options(OpenAiFlavor::OpenAi, name, options)?)
                    }
                    EmbeddingBackend::SiliconFlow => {
                        Arc::new(OpenAiEmbedder::from_options(OpenAiFlavor::SiliconFlow, name, options)?)
                    }
                    EmbeddingBackend::Ppio => {
                        Arc::new(OpenAiEmbedder::from_options(OpenAiFlavor::Ppio, name, options)?)
                    }
                    EmbeddingBackend::Ollama => Arc::new(OllamaEmbedder::from_options(name, options)?),
                };

                self.validate(name, embedder.health_check()).await?;
                tracing::info!("Embedding provider ready: {} (dimension {})", name, embedder.dimension());
                Ok::<_, Error>(embedder)
            })
            .await
            .cloned()
    }

    /// Language model
    pub async fn llm(&self) -> Result<Arc<dyn LlmProvider>> {
        self.llm
            .get_or_try_init(|| async {
                let setting = self.setting(Capability::Llm)?;
                let name = setting.provider.as_str();
                let options = &setting.config;

                let llm: Arc<dyn LlmProvider> = match name.parse::<LlmBackend>()? {
                    LlmBackend::OpenAi => Arc::new(OpenAiLlm::from_options(OpenAiFlavor::OpenAi, name, options)?),
                    LlmBackend::AzureOpenAi => {
                        Arc::new(OpenAiLlm::from_options(OpenAiFlavor::Azure, name, options)?)
                    }
                    LlmBackend::DeepSeek => {
                        Arc::new(OpenAiLlm::from_options(OpenAiFlavor::DeepSeek, name, options)?)
                    }
                    LlmBackend::SiliconFlow => {
                        Arc::new(OpenAiLlm::from_options(OpenAiFlavor::SiliconFlow, name, options)?)
                    }
                    LlmBackend::Ppio => Arc::new(OpenAiLlm::from_options(OpenAiFlavor::Ppio, name, options)?),
                    LlmBackend::Ollama => Arc::new(OllamaLlm::from_options(name, options)?),
                };

                self.validate(name, llm.health_check()).await?;
                tracing::info!("LLM provider ready: {} (model {})", name, llm.model());
                Ok::<_, Error>(llm)
            })
            .await
            .cloned()
    }

    /// Vector store
    pub async fn vector_db(&self) -> Result<Arc<dyn VectorStoreProvider>> {
        self.vector_db
            .get_or_try_init(|| async {
                let setting = self.setting(Capability::VectorDb)?;
                let name = setting.provider.as_str();
                let options = &setting.config;

                let store: Arc<dyn VectorStoreProvider> = match name.parse::<VectorDbBackend>()? {
                    VectorDbBackend::Memory => Arc::new(MemoryVectorStore::from_options(name, options)?),
                    VectorDbBackend::Qdrant => Arc::new(QdrantStore::from_options(name, options)?),
                };

                self.validate(name, store.health_check()).await?;
                tracing::info!("Vector store ready: {} (default collection '{}')", name, store.default_collection());
                Ok::<_, Error>(store)
            })
            .await
            .cloned()
    }

    /// File loader
    pub async fn file_loader(&self) -> Result<Arc<dyn FileLoader>> {
        self.file_loader
            .get_or_try_init(|| async {
                let setting = self.setting(Capability::FileLoader)?;
                let name = setting.provider.as_str();

                let loader: Arc<dyn FileLoader> = match name.parse::<FileLoaderBackend>()? {
                    FileLoaderBackend::Text => Arc::new(TextLoader::from_options(name, &setting.config)?),
                    FileLoaderBackend::JsonLines => {
                        Arc::new(JsonFileLoader::from_options(name, &setting.config)?)
                    }
                    FileLoaderBackend::Pdf => Arc::new(PdfLoader::from_options(name, &setting.config)?),
                };
                Ok::<_, Error>(loader)
            })
            .await
            .cloned()
    }

    /// Web crawler
    pub async fn web_crawler(&self) -> Result<Arc<dyn WebCrawler>> {
        self.web_crawler
            .get_or_try_init(|| async {
                let setting = self.setting(Capability::WebCrawler)?;
                let name = setting.provider.as_str();

                let crawler: Arc<dyn WebCrawler> = match name.parse::<WebCrawlerBackend>()? {
                    WebCrawlerBackend::Html => Arc::new(HtmlCrawler::from_options(name, &setting.config)?),
                };
                Ok::<_, Error>(crawler)
            })
            .await
            .cloned()
    }

    /// Query agent over this registry's embedder, LLM and store
    pub async fn deep_search(&self) -> Result<DeepSearch> {
        Ok(DeepSearch::new(
            self.embedder().await?,
            self.llm().await?,
            self.vector_db().await?,
            self.config.query_settings.clone(),
        ))
    }

    /// Ingestion pipeline over this registry's embedder and store
    pub async fn ingest_pipeline(&self) -> Result<IngestPipeline> {
        Ok(IngestPipeline::new(
            self.embedder().await?,
            self.vector_db().await?,
            self.config.load_settings.clone(),
            self.config.query_settings.retrieval_policy.clone(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::options;
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn local_config(ollama_url: &str) -> ProviderConfig {
        let mut config = ProviderConfig::empty();
        config
            .set_provider(
                Capability::Embedding,
                "OllamaEmbedding",
                options([
                    ("base_url", json!(ollama_url)),
                    ("model", json!("nomic-embed-text")),
                ]),
            )
            .set_provider(Capability::Llm, "Ollama", options([("base_url", json!(ollama_url))]))
            .set_provider(Capability::VectorDb, "Memory", ProviderOptions::new())
            .set_provider(Capability::FileLoader, "JsonFileLoader", ProviderOptions::new())
            .set_provider(Capability::WebCrawler, "HtmlCrawler", ProviderOptions::new());
        config
    }

    #[test]
    fn test_backend_names() {
        assert_eq!("SiliconflowEmbedding".parse::<EmbeddingBackend>().unwrap(), EmbeddingBackend::SiliconFlow);
        assert_eq!("AzureOpenAI".parse::<LlmBackend>().unwrap(), LlmBackend::AzureOpenAi);
        assert_eq!(VectorDbBackend::Qdrant.to_string(), "Qdrant");
        assert_eq!("PdfLoader".parse::<FileLoaderBackend>().unwrap(), FileLoaderBackend::Pdf);

        let err = "Milvus".parse::<VectorDbBackend>().unwrap_err();
        assert!(matches!(
            err,
            Error::UnknownProvider { ref capability, ref provider } if capability == "vector_db" && provider == "Milvus"
        ));
    }

    #[test]
    fn test_init_requires_core_capabilities() {
        let mut config = local_config("http://localhost:11434");
        config.clear_provider(Capability::Llm);
        let err = init_config(config).err().unwrap();
        assert!(matches!(err, Error::Config(ref m) if m.contains("llm")));
    }

    #[tokio::test]
    async fn test_every_capability_resolves() {
        let registry = init_config(local_config("http://localhost:11434")).unwrap();
        for capability in Capability::ALL {
            let provider = registry.resolve(capability).await.unwrap();
            assert_eq!(provider.capability(), capability);
        }
        assert_eq!(registry.embedder().await.unwrap().dimension(), 768);
    }

    #[tokio::test]
    async fn test_instances_are_constructed_once() {
        let registry = init_config(local_config("http://localhost:11434")).unwrap();
        let first = registry.vector_db().await.unwrap();
        let second = registry.vector_db().await.unwrap();
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[tokio::test]
    async fn test_unknown_provider_and_bad_options() {
        let mut config = local_config("http://localhost:11434");
        config.set_provider(Capability::VectorDb, "Milvus", ProviderOptions::new());
        config.set_provider(Capability::Llm, "Ollama", options([("modle", json!("typo"))]));
        let registry = init_config(config).unwrap();

        assert!(matches!(registry.vector_db().await, Err(Error::UnknownProvider { .. })));
        assert!(matches!(registry.llm().await, Err(Error::ProviderInit { .. })));
        // Other capabilities are unaffected
        assert!(registry.embedder().await.is_ok());
    }

    #[tokio::test]
    async fn test_validate_on_init_health_check() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/tags"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"models": []})))
            .mount(&server)
            .await;

        let mut config = local_config(&server.uri());
        config.validate_on_init = true;
        let registry = init_config(config).unwrap();
        assert!(registry.llm().await.is_ok());

        let mut down = local_config("http://127.0.0.1:9");
        down.validate_on_init = true;
        let registry = init_config(down).unwrap();
        assert!(matches!(registry.llm().await, Err(Error::ProviderInit { .. })));
    }

    #[tokio::test]
    async fn test_with_provider_carries_other_instances() {
        let registry = init_config(local_config("http://localhost:11434")).unwrap();
        let store = registry.vector_db().await.unwrap();
        let llm = registry.llm().await.unwrap();

        let updated = registry
            .with_provider(Capability::Llm, "Ollama", options([("model", json!("llama3.2"))]))
            .unwrap();
        assert!(Arc::ptr_eq(&store, &updated.vector_db().await.unwrap()));
        let new_llm = updated.llm().await.unwrap();
        assert!(!Arc::ptr_eq(&llm, &new_llm));
        assert_eq!(new_llm.model(), "llama3.2");
    }
}
