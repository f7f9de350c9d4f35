//! OpenAI-compatible providers for embeddings and chat
//!
//! One HTTP implementation serves every vendor that speaks the OpenAI wire format:
//! OpenAI itself, Azure OpenAI deployments, SiliconFlow, PPIO and DeepSeek. Vendors differ
//! only in base URL, credential variable, auth header and default models.

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::config::ProviderOptions;
use crate::error::{Error, Result};

use super::embedding::EmbeddingProvider;
use super::llm::{ChatMessage, ChatResponse, LlmProvider};
use super::parse_options;

const DEFAULT_TIMEOUT_SECS: u64 = 120;
const EMBED_BATCH_SIZE: usize = 100;

/// Vendor speaking the OpenAI wire format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenAiFlavor {
    OpenAi,
    Azure,
    SiliconFlow,
    Ppio,
    DeepSeek,
}

impl OpenAiFlavor {
    fn label(&self) -> &'static str {
        match self {
            Self::OpenAi => "openai",
            Self::Azure => "azure-openai",
            Self::SiliconFlow => "siliconflow",
            Self::Ppio => "ppio",
            Self::DeepSeek => "deepseek",
        }
    }

    fn default_base_url(&self) -> &'static str {
        match self {
            Self::OpenAi => "https://api.openai.com/v1",
            // Azure has no shared endpoint; `azure_endpoint` is mandatory
            Self::Azure => "",
            Self::SiliconFlow => "https://api.siliconflow.cn/v1",
            Self::Ppio => "https://api.ppinfra.com/v3/openai",
            Self::DeepSeek => "https://api.deepseek.com",
        }
    }

    fn api_key_env(&self) -> &'static str {
        match self {
            Self::OpenAi => "OPENAI_API_KEY",
            Self::Azure => "AZURE_OPENAI_KEY",
            Self::SiliconFlow => "SILICONFLOW_API_KEY",
            Self::Ppio => "PPIO_API_KEY",
            Self::DeepSeek => "DEEPSEEK_API_KEY",
        }
    }

    fn base_url_env(&self) -> Option<&'static str> {
        match self {
            Self::OpenAi => Some("OPENAI_BASE_URL"),
            Self::Azure => Some("AZURE_OPENAI_ENDPOINT"),
            _ => None,
        }
    }

    fn default_chat_model(&self) -> &'static str {
        match self {
            Self::OpenAi | Self::Azure => "gpt-4o-mini",
            Self::SiliconFlow => "deepseek-ai/DeepSeek-V3",
            Self::Ppio => "deepseek/deepseek-r1-turbo",
            Self::DeepSeek => "deepseek-reasoner",
        }
    }

    fn default_embed_model(&self) -> &'static str {
        match self {
            Self::OpenAi | Self::Azure | Self::DeepSeek => "text-embedding-ada-002",
            Self::SiliconFlow => "BAAI/bge-m3",
            Self::Ppio => "baai/bge-m3",
        }
    }
}

/// Known output widths of common embedding models
pub fn known_dimension(model: &str) -> Option<usize> {
    match model {
        "text-embedding-ada-002" | "text-embedding-3-small" => Some(1536),
        "text-embedding-3-large" => Some(3072),
        "BAAI/bge-m3" | "baai/bge-m3" | "bge-m3" => Some(1024),
        "netease-youdao/bce-embedding-base_v1" => Some(768),
        "BAAI/bge-large-zh-v1.5" | "BAAI/bge-large-en-v1.5" => Some(1024),
        "nomic-embed-text" => Some(768),
        "mxbai-embed-large" => Some(1024),
        "all-minilm" => Some(384),
        _ => None,
    }
}

enum Auth {
    Bearer(String),
    AzureKey(String),
}

/// Resolved endpoint + credentials shared by the embedder and the chat client
struct Endpoint {
    client: Client,
    flavor: OpenAiFlavor,
    base_url: String,
    api_version: Option<String>,
    auth: Auth,
}

impl Endpoint {
    #[allow(clippy::too_many_arguments)]
    fn build(
        flavor: OpenAiFlavor,
        provider: &str,
        api_key: Option<String>,
        base_url: Option<String>,
        azure_endpoint: Option<String>,
        api_version: Option<String>,
        default_api_version: &str,
        timeout_secs: Option<u64>,
    ) -> Result<Self> {
        // An explicit azure_endpoint switches any OpenAI flavor to Azure routing
        let flavor = if azure_endpoint.is_some() && flavor == OpenAiFlavor::OpenAi {
            OpenAiFlavor::Azure
        } else {
            flavor
        };

        let api_key = api_key
            .or_else(|| std::env::var(flavor.api_key_env()).ok())
            .filter(|k| !k.is_empty())
            .ok_or_else(|| {
                Error::provider_init(
                    provider,
                    format!("missing api_key (pass it in config or set {})", flavor.api_key_env()),
                )
            })?;

        let base_url = match flavor {
            OpenAiFlavor::Azure => azure_endpoint
                .or(base_url)
                .or_else(|| flavor.base_url_env().and_then(|v| std::env::var(v).ok()))
                .ok_or_else(|| {
                    Error::provider_init(
                        provider,
                        "missing azure_endpoint (pass it in config or set AZURE_OPENAI_ENDPOINT)",
                    )
                })?,
            _ => base_url
                .or_else(|| flavor.base_url_env().and_then(|v| std::env::var(v).ok()))
                .unwrap_or_else(|| flavor.default_base_url().to_string()),
        };

        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS)))
            .pool_max_idle_per_host(5)
            .build()
            .map_err(|e| Error::provider_init(provider, format!("HTTP client: {}", e)))?;

        let (auth, api_version) = match flavor {
            OpenAiFlavor::Azure => (
                Auth::AzureKey(api_key),
                Some(api_version.unwrap_or_else(|| default_api_version.to_string())),
            ),
            _ => (Auth::Bearer(api_key), None),
        };

        Ok(Self {
            client,
            flavor,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_version,
            auth,
        })
    }

    /// URL for an operation; Azure routes by deployment name
    fn url(&self, operation: &str, model: &str) -> String {
        match (&self.flavor, &self.api_version) {
            (OpenAiFlavor::Azure, Some(version)) => format!(
                "{}/openai/deployments/{}/{}?api-version={}",
                self.base_url, model, operation, version
            ),
            _ => format!("{}/{}", self.base_url, operation),
        }
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.auth {
            Auth::Bearer(key) => request.bearer_auth(key),
            Auth::AzureKey(key) => request.header("api-key", key),
        }
    }

    async fn models_reachable(&self) -> Result<bool> {
        let url = match (&self.flavor, &self.api_version) {
            (OpenAiFlavor::Azure, Some(version)) => {
                format!("{}/openai/models?api-version={}", self.base_url, version)
            }
            _ => format!("{}/models", self.base_url),
        };

        match self.authorize(self.client.get(&url)).send().await {
            Ok(response) => Ok(response.status().is_success()),
            Err(_) => Ok(false),
        }
    }
}

/// OpenAI-style error body
#[derive(Deserialize)]
struct ErrorResponse {
    error: Option<ErrorDetail>,
}

#[derive(Deserialize)]
struct ErrorDetail {
    message: String,
}

async fn failure_message(response: reqwest::Response) -> String {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    match serde_json::from_str::<ErrorResponse>(&body) {
        Ok(ErrorResponse {
            error: Some(detail),
        }) => format!("HTTP {}: {}", status.as_u16(), detail.message),
        _ => format!("HTTP {}: {}", status.as_u16(), body),
    }
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct EmbeddingOptions {
    #[serde(default, alias = "model_name")]
    model: Option<String>,
    #[serde(default)]
    api_key: Option<String>,
    #[serde(default)]
    base_url: Option<String>,
    #[serde(default)]
    azure_endpoint: Option<String>,
    #[serde(default)]
    api_version: Option<String>,
    #[serde(default)]
    dimension: Option<usize>,
    #[serde(default)]
    timeout_secs: Option<u64>,
}

#[derive(Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    input: &'a [String],
    #[serde(skip_serializing_if = "Option::is_none")]
    dimensions: Option<usize>,
}

#[derive(Deserialize)]
struct EmbedResponse {
    data: Vec<EmbedData>,
}

#[derive(Deserialize)]
struct EmbedData {
    embedding: Vec<f32>,
    #[serde(default)]
    index: usize,
}

/// Embedding provider for the OpenAI `/embeddings` API and compatible vendors
pub struct OpenAiEmbedder {
    endpoint: Endpoint,
    model: String,
    dimension: usize,
}

impl OpenAiEmbedder {
    /// Construct from provider options
    ///
    /// Accepted keys: `model` (alias `model_name`), `api_key`, `base_url`, `azure_endpoint`,
    /// `api_version`, `dimension`, `timeout_secs`.
    pub fn from_options(flavor: OpenAiFlavor, provider: &str, options: &ProviderOptions) -> Result<Self> {
        let opts: EmbeddingOptions = parse_options(provider, options)?;
        let model = opts
            .model
            .unwrap_or_else(|| flavor.default_embed_model().to_string());

        let dimension = match opts.dimension.or_else(|| known_dimension(&model)) {
            Some(0) => return Err(Error::provider_init(provider, "dimension must be positive")),
            Some(d) => d,
            None => {
                return Err(Error::provider_init(
                    provider,
                    format!("unknown dimension for model '{}', set `dimension`", model),
                ))
            }
        };

        let endpoint = Endpoint::build(
            flavor,
            provider,
            opts.api_key,
            opts.base_url,
            opts.azure_endpoint,
            opts.api_version,
            "2023-05-15",
            opts.timeout_secs,
        )?;

        tracing::info!(
            "Initialized {} embedder (model: {}, dimension: {})",
            endpoint.flavor.label(),
            model,
            dimension
        );

        Ok(Self {
            endpoint,
            model,
            dimension,
        })
    }

    /// Only the v3 models accept a `dimensions` parameter; Azure takes it from the deployment
    fn requested_dimensions(&self) -> Option<usize> {
        match self.endpoint.flavor {
            OpenAiFlavor::Azure => None,
            _ if self.model == "text-embedding-ada-002" => None,
            OpenAiFlavor::OpenAi if self.model.starts_with("text-embedding-3") => Some(self.dimension),
            _ => None,
        }
    }

    async fn request(&self, input: &[String]) -> Result<Vec<Vec<f32>>> {
        let provider = self.endpoint.flavor.label();
        let body = EmbedRequest {
            model: &self.model,
            input,
            dimensions: self.requested_dimensions(),
        };

        let request = self
            .endpoint
            .client
            .post(self.endpoint.url("embeddings", &self.model))
            .json(&body);

        let response = self
            .endpoint
            .authorize(request)
            .send()
            .await
            .map_err(|e| Error::embedding_degraded(provider, format!("request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(Error::embedding_degraded(provider, failure_message(response).await));
        }

        let parsed: EmbedResponse = response
            .json()
            .await
            .map_err(|e| Error::Embedding(format!("Failed to parse {} response: {}", provider, e)))?;

        let mut data = parsed.data;
        data.sort_by_key(|d| d.index);

        if data.len() != input.len() {
            return Err(Error::Embedding(format!(
                "{} returned {} embeddings for {} inputs",
                provider,
                data.len(),
                input.len()
            )));
        }

        data.into_iter()
            .map(|d| {
                if d.embedding.len() == self.dimension {
                    Ok(d.embedding)
                } else {
                    Err(Error::Embedding(format!(
                        "{} returned width {} but model '{}' is configured for {}",
                        provider,
                        d.embedding.len(),
                        self.model,
                        self.dimension
                    )))
                }
            })
            .collect()
    }
}

#[async_trait]
impl EmbeddingProvider for OpenAiEmbedder {
    async fn embed_query(&self, text: &str) -> Result<Vec<f32>> {
        let mut embeddings = self.request(&[text.to_string()]).await?;
        embeddings
            .pop()
            .ok_or_else(|| Error::Embedding("Empty embedding response".to_string()))
    }

    async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut all = Vec::with_capacity(texts.len());
        for batch in texts.chunks(EMBED_BATCH_SIZE) {
            all.extend(self.request(batch).await?);
        }
        Ok(all)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn health_check(&self) -> Result<bool> {
        self.endpoint.models_reachable().await
    }

    fn name(&self) -> &str {
        self.endpoint.flavor.label()
    }
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct ChatOptions {
    #[serde(default, alias = "model_name")]
    model: Option<String>,
    #[serde(default)]
    api_key: Option<String>,
    #[serde(default)]
    base_url: Option<String>,
    #[serde(default)]
    azure_endpoint: Option<String>,
    #[serde(default)]
    api_version: Option<String>,
    #[serde(default)]
    temperature: Option<f32>,
    #[serde(default)]
    max_tokens: Option<u32>,
    #[serde(default)]
    timeout_secs: Option<u64>,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
}

#[derive(Deserialize)]
struct ChatCompletion {
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Deserialize)]
struct Usage {
    #[serde(default)]
    total_tokens: u64,
}

/// Chat provider for the OpenAI `/chat/completions` API and compatible vendors
pub struct OpenAiLlm {
    endpoint: Endpoint,
    model: String,
    temperature: Option<f32>,
    max_tokens: Option<u32>,
}

impl OpenAiLlm {
    /// Construct from provider options
    ///
    /// Accepted keys: `model` (alias `model_name`), `api_key`, `base_url`, `azure_endpoint`,
    /// `api_version`, `temperature`, `max_tokens`, `timeout_secs`.
    pub fn from_options(flavor: OpenAiFlavor, provider: &str, options: &ProviderOptions) -> Result<Self> {
        let opts: ChatOptions = parse_options(provider, options)?;
        let model = opts
            .model
            .unwrap_or_else(|| flavor.default_chat_model().to_string());

        let endpoint = Endpoint::build(
            flavor,
            provider,
            opts.api_key,
            opts.base_url,
            opts.azure_endpoint,
            opts.api_version,
            "2024-10-21",
            opts.timeout_secs,
        )?;

        tracing::info!("Initialized {} chat model: {}", endpoint.flavor.label(), model);

        Ok(Self {
            endpoint,
            model,
            temperature: opts.temperature,
            max_tokens: opts.max_tokens,
        })
    }
}

#[async_trait]
impl LlmProvider for OpenAiLlm {
    async fn chat(&self, messages: &[ChatMessage]) -> Result<ChatResponse> {
        let provider = self.endpoint.flavor.label();
        let body = ChatRequest {
            model: &self.model,
            messages,
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        };

        let request = self
            .endpoint
            .client
            .post(self.endpoint.url("chat/completions", &self.model))
            .json(&body);

        let response = self
            .endpoint
            .authorize(request)
            .send()
            .await
            .map_err(|e| Error::generation(format!("{} request failed: {}", provider, e)))?;

        if !response.status().is_success() {
            return Err(Error::generation(format!(
                "{} chat failed: {}",
                provider,
                failure_message(response).await
            )));
        }

        let completion: ChatCompletion = response
            .json()
            .await
            .map_err(|e| Error::generation(format!("Failed to parse {} response: {}", provider, e)))?;

        let content = completion
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| Error::generation(format!("No content in {} response", provider)))?;

        Ok(ChatResponse {
            content,
            total_tokens: completion.usage.map_or(0, |u| u.total_tokens),
        })
    }

    async fn health_check(&self) -> Result<bool> {
        self.endpoint.models_reachable().await
    }

    fn name(&self) -> &str {
        self.endpoint.flavor.label()
    }

    fn model(&self) -> &str {
        &self.model
    }
}
