//! Ollama-based providers for embeddings and chat
//!
//! Both providers wrap a shared [`OllamaClient`].

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

use crate::config::ProviderOptions;
use crate::error::{Error, Result};

use super::embedding::EmbeddingProvider;
use super::llm::{ChatMessage, ChatResponse, LlmProvider};
use super::openai::known_dimension;
use super::parse_options;

const DEFAULT_BASE_URL: &str = "http://localhost:11434";

/// Ollama HTTP API client
pub struct OllamaClient {
    /// HTTP client
    client: Client,
    /// Server base URL
    base_url: String,
}

#[derive(Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Deserialize)]
struct EmbedResponse {
    embeddings: Vec<Vec<f32>>,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    options: Option<GenerateOptions>,
}

#[derive(Serialize)]
struct GenerateOptions {
    temperature: f32,
}

#[derive(Deserialize)]
struct ChatResponseBody {
    message: ResponseMessage,
    #[serde(default)]
    prompt_eval_count: u64,
    #[serde(default)]
    eval_count: u64,
}

#[derive(Deserialize)]
struct ResponseMessage {
    content: String,
}

impl OllamaClient {
    /// Create a new Ollama client
    pub fn new(base_url: Option<String>, timeout_secs: u64) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .pool_max_idle_per_host(5)
            .build()
            .map_err(|e| Error::provider_init("ollama", format!("HTTP client: {}", e)))?;

        let base_url = base_url
            .or_else(|| std::env::var("OLLAMA_HOST").ok())
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Check if Ollama is available
    pub async fn health_check(&self) -> Result<bool> {
        let url = format!("{}/api/tags", self.base_url);

        match self.client.get(&url).send().await {
            Ok(response) => Ok(response.status().is_success()),
            Err(_) => Ok(false),
        }
    }

    /// Embed a batch of texts
    pub async fn embed(&self, model: &str, input: &[String]) -> Result<Vec<Vec<f32>>> {
        let url = format!("{}/api/embed", self.base_url);

        let response = self
            .client
            .post(&url)
            .json(&EmbedRequest { model, input })
            .send()
            .await
            .map_err(|e| Error::embedding_degraded("ollama", format!("request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::embedding_degraded(
                "ollama",
                format!("HTTP {} - {}", status, body),
            ));
        }

        let parsed: EmbedResponse = response
            .json()
            .await
            .map_err(|e| Error::Embedding(format!("Failed to parse Ollama embedding response: {}", e)))?;

        Ok(parsed.embeddings)
    }

    /// Run a non-streaming chat completion
    pub async fn chat(
        &self,
        model: &str,
        messages: &[ChatMessage],
        temperature: Option<f32>,
    ) -> Result<ChatResponse> {
        let url = format!("{}/api/chat", self.base_url);

        tracing::debug!("Ollama chat with model: {}", model);

        let request = ChatRequest {
            model,
            messages,
            stream: false,
            options: temperature.map(|temperature| GenerateOptions { temperature }),
        };

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| Error::generation(format!("Ollama request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::generation(format!(
                "Ollama chat failed: HTTP {} - {}",
                status, body
            )));
        }

        let body: ChatResponseBody = response
            .json()
            .await
            .map_err(|e| Error::generation(format!("Failed to parse Ollama response: {}", e)))?;

        Ok(ChatResponse {
            content: body.message.content,
            total_tokens: body.prompt_eval_count + body.eval_count,
        })
    }
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct OllamaEmbeddingOptions {
    #[serde(default, alias = "model_name")]
    model: Option<String>,
    #[serde(default)]
    base_url: Option<String>,
    #[serde(default)]
    dimension: Option<usize>,
    #[serde(default = "default_timeout")]
    timeout_secs: u64,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct OllamaLlmOptions {
    #[serde(default, alias = "model_name")]
    model: Option<String>,
    #[serde(default)]
    base_url: Option<String>,
    #[serde(default)]
    temperature: Option<f32>,
    #[serde(default = "default_timeout")]
    timeout_secs: u64,
}

fn default_timeout() -> u64 { 120 }

/// Ollama embedding provider using nomic-embed-text or similar models
pub struct OllamaEmbedder {
    client: Arc<OllamaClient>,
    dimension: usize,
    model: String,
}

impl OllamaEmbedder {
    /// Construct from provider options: `model`, `base_url`, `dimension`, `timeout_secs`
    pub fn from_options(provider: &str, options: &ProviderOptions) -> Result<Self> {
        let opts: OllamaEmbeddingOptions = parse_options(provider, options)?;
        let model = opts.model.unwrap_or_else(|| "nomic-embed-text".to_string());
        let dimension = opts
            .dimension
            .or_else(|| known_dimension(&model))
            .filter(|d| *d > 0)
            .ok_or_else(|| {
                Error::provider_init(
                    provider,
                    format!("unknown dimension for model '{}', set `dimension`", model),
                )
            })?;

        let client = Arc::new(OllamaClient::new(opts.base_url, opts.timeout_secs)?);
        tracing::info!("Initialized Ollama embedder (model: {}, dimension: {})", model, dimension);

        Ok(Self::from_client(client, dimension, model))
    }

    /// Create from existing OllamaClient
    pub fn from_client(client: Arc<OllamaClient>, dimension: usize, model: String) -> Self {
        Self {
            client,
            dimension,
            model,
        }
    }

    fn check_width(&self, embedding: Vec<f32>) -> Result<Vec<f32>> {
        if embedding.len() == self.dimension {
            Ok(embedding)
        } else {
            Err(Error::Embedding(format!(
                "Ollama model '{}' returned width {}, configured for {}",
                self.model,
                embedding.len(),
                self.dimension
            )))
        }
    }
}

#[async_trait]
impl EmbeddingProvider for OllamaEmbedder {
    async fn embed_query(&self, text: &str) -> Result<Vec<f32>> {
        let embedding = self
            .client
            .embed(&self.model, &[text.to_string()])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| Error::Embedding("Empty Ollama embedding response".to_string()))?;
        self.check_width(embedding)
    }

    async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let embeddings = self.client.embed(&self.model, texts).await?;
        if embeddings.len() != texts.len() {
            return Err(Error::Embedding(format!(
                "Ollama returned {} embeddings for {} inputs",
                embeddings.len(),
                texts.len()
            )));
        }
        embeddings.into_iter().map(|e| self.check_width(e)).collect()
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn health_check(&self) -> Result<bool> {
        self.client.health_check().await
    }

    fn name(&self) -> &str {
        "ollama"
    }
}

/// Ollama chat provider
pub struct OllamaLlm {
    client: Arc<OllamaClient>,
    model: String,
    temperature: Option<f32>,
}

impl OllamaLlm {
    /// Construct from provider options: `model`, `base_url`, `temperature`, `timeout_secs`
    pub fn from_options(provider: &str, options: &ProviderOptions) -> Result<Self> {
        let opts: OllamaLlmOptions = parse_options(provider, options)?;
        let model = opts.model.unwrap_or_else(|| "qwen3:8b".to_string());
        let client = Arc::new(OllamaClient::new(opts.base_url, opts.timeout_secs)?);
        tracing::info!("Initialized Ollama chat model: {}", model);

        Ok(Self {
            client,
            model,
            temperature: opts.temperature,
        })
    }
}

#[async_trait]
impl LlmProvider for OllamaLlm {
    async fn chat(&self, messages: &[ChatMessage]) -> Result<ChatResponse> {
        self.client.chat(&self.model, messages, self.temperature).await
    }

    async fn health_check(&self) -> Result<bool> {
        self.client.health_check().await
    }

    fn name(&self) -> &str {
        "ollama"
    }

    fn model(&self) -> &str {
        &self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::options;
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_chat_sums_prompt_and_eval_counts() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/chat"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "model": "qwen3:8b",
                "message": {"role": "assistant", "content": "[]"},
                "done": true,
                "prompt_eval_count": 120,
                "eval_count": 5
            })))
            .mount(&server)
            .await;

        let llm = OllamaLlm::from_options("Ollama", &options([("base_url", json!(server.uri()))])).unwrap();
        let response = llm.chat(&[ChatMessage::user("reflect")]).await.unwrap();
        assert_eq!(response.content, "[]");
        assert_eq!(response.total_tokens, 125);
    }

    #[tokio::test]
    async fn test_embed_checks_width() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/embed"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "model": "tiny",
                "embeddings": [[0.5, 0.5]]
            })))
            .mount(&server)
            .await;

        let embedder = OllamaEmbedder::from_options(
            "OllamaEmbedding",
            &options([
                ("base_url", json!(server.uri())),
                ("model", json!("tiny")),
                ("dimension", json!(2)),
            ]),
        )
        .unwrap();
        assert_eq!(embedder.embed_query("hi").await.unwrap(), vec![0.5, 0.5]);

        let wrong = OllamaEmbedder::from_options(
            "OllamaEmbedding",
            &options([
                ("base_url", json!(server.uri())),
                ("model", json!("tiny")),
                ("dimension", json!(4)),
            ]),
        )
        .unwrap();
        assert!(matches!(wrong.embed_query("hi").await, Err(Error::Embedding(_))));
    }

    #[tokio::test]
    async fn test_unreachable_server_is_unhealthy() {
        let llm = OllamaLlm::from_options(
            "Ollama",
            &options([("base_url", json!("http://127.0.0.1:9")), ("timeout_secs", json!(1))]),
        )
        .unwrap();
        assert!(!llm.health_check().await.unwrap());
    }
}
