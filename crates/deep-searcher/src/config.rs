//! Provider selection and runtime settings
//!
//! A [`ProviderConfig`] maps each [`Capability`] to the provider that fills it plus that
//! provider's option mapping. Options are kept as raw JSON and only validated when the
//! registry constructs the provider.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use crate::error::{Error, Result};

/// Flat keyword options handed to a provider constructor
pub type ProviderOptions = serde_json::Map<String, serde_json::Value>;

/// Role a provider fills
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Capability {
    /// Text embedding model
    Embedding,
    /// Language model used for reflection and answer synthesis
    Llm,
    /// Vector database holding the collections
    VectorDb,
    /// Local file reader used at ingestion
    FileLoader,
    /// Web page fetcher used at ingestion
    WebCrawler,
}

impl Capability {
    /// Every known capability
    pub const ALL: [Capability; 5] = [
        Capability::Embedding,
        Capability::Llm,
        Capability::VectorDb,
        Capability::FileLoader,
        Capability::WebCrawler,
    ];

    /// Capabilities that must be configured before any query can run
    pub const REQUIRED: [Capability; 3] =
        [Capability::Embedding, Capability::Llm, Capability::VectorDb];

    /// Configuration key for this capability
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Embedding => "embedding",
            Self::Llm => "llm",
            Self::VectorDb => "vector_db",
            Self::FileLoader => "file_loader",
            Self::WebCrawler => "web_crawler",
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Capability {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Capability::ALL
            .into_iter()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| {
                Error::config(format!(
                    "Unknown capability '{}', expected one of: embedding, llm, vector_db, file_loader, web_crawler",
                    s
                ))
            })
    }
}

impl TryFrom<String> for Capability {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<Capability> for String {
    fn from(capability: Capability) -> Self {
        capability.as_str().to_string()
    }
}

/// Selected provider and its options for one capability
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderSetting {
    /// Provider variant name (e.g. "OpenAI", "Qdrant")
    pub provider: String,
    /// Provider-specific options
    #[serde(default)]
    pub config: ProviderOptions,
}

/// Timeout and bounded retry applied to a single provider call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallPolicy {
    /// Per-attempt timeout in seconds
    pub timeout_secs: u64,
    /// Extra attempts after the first failure
    pub max_retries: u32,
    /// Base delay for exponential backoff in milliseconds
    pub backoff_base_ms: u64,
}

impl CallPolicy {
    /// Policy for embedding and vector search calls
    pub fn retrieval() -> Self {
        Self {
            timeout_secs: 30,
            max_retries: 2,
            backoff_base_ms: 500,
        }
    }

    /// Policy for LLM calls; no retries, generation failures surface to the caller
    pub fn generation() -> Self {
        Self {
            timeout_secs: 120,
            max_retries: 0,
            backoff_base_ms: 1000,
        }
    }

    /// Per-attempt timeout
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Delay before retry number `attempt` (0-based)
    pub fn backoff(&self, attempt: u32) -> Duration {
        Duration::from_millis(self.backoff_base_ms.saturating_mul(2u64.saturating_pow(attempt)))
    }
}

/// Query-time settings for the orchestrator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuerySettings {
    /// Default cap on retrieve-reflect rounds
    #[serde(default = "default_max_iter")]
    pub max_iter: usize,
    /// Results fetched per collection per sub-query
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    /// Cooperative token ceiling checked between iterations
    #[serde(default)]
    pub token_budget: Option<u64>,
    /// Let the LLM choose collections when more than one exists
    #[serde(default = "default_route_collections")]
    pub route_collections: bool,
    /// Policy for embedding and search calls
    #[serde(default = "CallPolicy::retrieval")]
    pub retrieval_policy: CallPolicy,
    /// Policy for LLM calls
    #[serde(default = "CallPolicy::generation")]
    pub generation_policy: CallPolicy,
}

fn default_max_iter() -> usize { 3 }
fn default_top_k() -> usize { 5 }
fn default_route_collections() -> bool { true }

impl Default for QuerySettings {
    fn default() -> Self {
        Self {
            max_iter: 3,
            top_k: 5,
            token_budget: None,
            route_collections: true,
            retrieval_policy: CallPolicy::retrieval(),
            generation_policy: CallPolicy::generation(),
        }
    }
}

/// Ingestion settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoadSettings {
    /// Target chunk size in characters
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    /// Overlap between consecutive chunks in characters
    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,
    /// Chunks embedded per embedding call
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
}

fn default_chunk_size() -> usize { 1500 }
fn default_chunk_overlap() -> usize { 100 }
fn default_batch_size() -> usize { 64 }

impl Default for LoadSettings {
    fn default() -> Self {
        Self {
            chunk_size: 1500,
            chunk_overlap: 100,
            batch_size: 64,
        }
    }
}

/// Mutable configuration assembled before [`crate::registry::init_config`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Active provider per capability
    #[serde(default)]
    pub provide_settings: BTreeMap<Capability, ProviderSetting>,
    /// Orchestrator settings
    #[serde(default)]
    pub query_settings: QuerySettings,
    /// Ingestion settings
    #[serde(default)]
    pub load_settings: LoadSettings,
    /// Health-check each provider when it is constructed
    #[serde(default)]
    pub validate_on_init: bool,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        let mut config = Self::empty();
        config
            .set_provider(
                Capability::Llm,
                "OpenAI",
                options([("model", "gpt-4o-mini".into())]),
            )
            .set_provider(
                Capability::Embedding,
                "OpenAIEmbedding",
                options([("model", "text-embedding-ada-002".into())]),
            )
            .set_provider(
                Capability::VectorDb,
                "Memory",
                options([("default_collection", "deepsearcher".into())]),
            )
            .set_provider(Capability::FileLoader, "TextLoader", ProviderOptions::new())
            .set_provider(Capability::WebCrawler, "HtmlCrawler", ProviderOptions::new());
        config
    }
}

impl ProviderConfig {
    /// Configuration with no providers selected
    pub fn empty() -> Self {
        Self {
            provide_settings: BTreeMap::new(),
            query_settings: QuerySettings::default(),
            load_settings: LoadSettings::default(),
            validate_on_init: false,
        }
    }

    /// Select a provider by capability name; last write wins
    pub fn set_provider_config(
        &mut self,
        capability: &str,
        provider: impl Into<String>,
        options: ProviderOptions,
    ) -> Result<&mut Self> {
        let capability: Capability = capability.parse()?;
        Ok(self.set_provider(capability, provider, options))
    }

    /// Select a provider for a capability; last write wins
    pub fn set_provider(
        &mut self,
        capability: Capability,
        provider: impl Into<String>,
        options: ProviderOptions,
    ) -> &mut Self {
        self.provide_settings.insert(
            capability,
            ProviderSetting {
                provider: provider.into(),
                config: options,
            },
        );
        self
    }

    /// Remove the selection for a capability
    pub fn clear_provider(&mut self, capability: Capability) -> Option<ProviderSetting> {
        self.provide_settings.remove(&capability)
    }

    /// Current selection for a capability
    pub fn get_provider_config(&self, capability: Capability) -> Option<&ProviderSetting> {
        self.provide_settings.get(&capability)
    }

    /// Load from a `.yaml`/`.yml` or `.toml` file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        match path.extension().and_then(|e| e.to_str()) {
            Some("yaml") | Some("yml") => Self::from_yaml_str(&content),
            Some("toml") => Self::from_toml_str(&content),
            _ => Err(Error::config(format!(
                "Unsupported config file '{}', expected .yaml, .yml or .toml",
                path.display()
            ))),
        }
    }

    /// Parse YAML configuration
    pub fn from_yaml_str(content: &str) -> Result<Self> {
        serde_yaml::from_str(content)
            .map_err(|e| Error::config(format!("Invalid YAML configuration: {}", e)))
    }

    /// Parse TOML configuration
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content)
            .map_err(|e| Error::config(format!("Invalid TOML configuration: {}", e)))
    }
}

/// Build a [`ProviderOptions`] map from key/value pairs
pub fn options<const N: usize>(pairs: [(&str, serde_json::Value); N]) -> ProviderOptions {
    pairs
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect()
}
