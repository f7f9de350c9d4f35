//! Web crawlers

use async_trait::async_trait;
use reqwest::Client;
use scraper::{Html, Selector};
use serde::Deserialize;
use std::time::Duration;

use super::pdf::extract_pdf_text;
use crate::config::ProviderOptions;
use crate::error::{Error, Result};
use crate::providers::parse_options;
use crate::types::{Document, Metadata};

/// Tags whose text never ends up in a document
const SKIPPED_TAGS: [&str; 4] = ["script", "style", "noscript", "template"];

/// Trait for fetching web pages as documents
#[async_trait]
pub trait WebCrawler: Send + Sync {
    /// Fetch one URL
    async fn crawl_url(&self, url: &str) -> Result<Vec<Document>>;

    /// Provider name for logging
    fn name(&self) -> &str;
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct HtmlCrawlerOptions {
    #[serde(default = "default_selector")]
    selector: String,
    #[serde(default = "default_timeout")]
    timeout_secs: u64,
    #[serde(default)]
    user_agent: Option<String>,
}

fn default_selector() -> String { "body".to_string() }
fn default_timeout() -> u64 { 30 }

/// Fetches pages with `reqwest` and extracts visible text with `scraper`
///
/// Responses served as `application/pdf` (or URLs ending in `.pdf`) go through the PDF text
/// extractor instead.
pub struct HtmlCrawler {
    client: Client,
    selector: Selector,
}

impl HtmlCrawler {
    /// Construct from provider options: `selector`, `timeout_secs`, `user_agent`
    pub fn from_options(provider: &str, options: &ProviderOptions) -> Result<Self> {
        let opts: HtmlCrawlerOptions = parse_options(provider, options)?;

        let selector = Selector::parse(&opts.selector).map_err(|e| {
            Error::provider_init(provider, format!("invalid selector '{}': {}", opts.selector, e))
        })?;

        let user_agent = opts
            .user_agent
            .unwrap_or_else(|| format!("deep-searcher/{}", env!("CARGO_PKG_VERSION")));
        let client = Client::builder()
            .timeout(Duration::from_secs(opts.timeout_secs))
            .user_agent(user_agent)
            .build()
            .map_err(|e| Error::provider_init(provider, format!("HTTP client: {}", e)))?;

        Ok(Self { client, selector })
    }

    /// Extract `(title, text)` from an HTML page
    pub fn extract(&self, html: &str) -> (Option<String>, String) {
        let document = Html::parse_document(html);

        let title = Selector::parse("title")
            .ok()
            .and_then(|s| document.select(&s).next())
            .map(|t| t.text().collect::<String>().trim().to_string())
            .filter(|t| !t.is_empty());

        let mut lines: Vec<String> = Vec::new();
        for root in document.select(&self.selector) {
            for node in root.descendants() {
                let Some(text) = node.value().as_text() else {
                    continue;
                };
                let hidden = node.ancestors().any(|a| {
                    a.value()
                        .as_element()
                        .map(|e| SKIPPED_TAGS.contains(&e.name()))
                        .unwrap_or(false)
                });
                if hidden {
                    continue;
                }
                let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");
                if !collapsed.is_empty() {
                    lines.push(collapsed);
                }
            }
        }

        (title, lines.join("\n"))
    }
}

#[async_trait]
impl WebCrawler for HtmlCrawler {
    async fn crawl_url(&self, url: &str) -> Result<Vec<Document>> {
        tracing::debug!("Crawling {}", url);

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| Error::load(url, format!("request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(Error::load(url, format!("HTTP {}", response.status())));
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.to_ascii_lowercase())
            .unwrap_or_default();
        let is_pdf = content_type.contains("application/pdf")
            || response.url().path().to_ascii_lowercase().ends_with(".pdf");

        let mut metadata = Metadata::new();
        metadata.insert("url".to_string(), url.into());
        if !content_type.is_empty() {
            metadata.insert("content_type".to_string(), content_type.clone().into());
        }

        let text = if is_pdf {
            let bytes = response
                .bytes()
                .await
                .map_err(|e| Error::load(url, format!("failed to read body: {}", e)))?;
            let source = url.to_string();
            tokio::task::spawn_blocking(move || extract_pdf_text(&bytes, &source))
                .await
                .map_err(|e| Error::load(url, format!("PDF extraction task failed: {}", e)))??
        } else {
            let body = response
                .text()
                .await
                .map_err(|e| Error::load(url, format!("failed to read body: {}", e)))?;
            let (title, text) = self.extract(&body);
            if let Some(title) = title {
                metadata.insert("title".to_string(), title.into());
            }
            text
        };

        if text.is_empty() {
            tracing::warn!("No text extracted from {}", url);
            return Ok(Vec::new());
        }

        Ok(vec![Document {
            text,
            reference: url.to_string(),
            metadata,
        }])
    }

    fn name(&self) -> &str {
        "HtmlCrawler"
    }
}
