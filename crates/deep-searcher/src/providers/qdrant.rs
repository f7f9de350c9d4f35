//! Qdrant vector store over the REST API
//!
//! Entries are stored as points with payload `{text, reference, metadata}` and cosine
//! distance. Metadata filters are translated to Qdrant `must` conditions when every value is
//! a string, number or bool (floats become closed ranges). Other filters are evaluated
//! client-side while paging through the nearest points until `top_k` matches are found.

use async_trait::async_trait;
use parking_lot::RwLock;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::time::Duration;
use uuid::Uuid;

use crate::config::ProviderOptions;
use crate::error::{Error, Result};
use crate::types::{CollectionInfo, Metadata, MetadataFilter, RetrievalResult, VectorEntry};

use super::parse_options;
use super::vector_store::VectorStoreProvider;

/// Page size, as a multiple of `top_k`, when a filter has to be evaluated client-side
const CLIENT_FILTER_FACTOR: usize = 4;

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct QdrantOptions {
    #[serde(default = "default_url")]
    url: String,
    #[serde(default)]
    api_key: Option<String>,
    #[serde(default = "default_collection")]
    default_collection: String,
    #[serde(default = "default_timeout")]
    timeout_secs: u64,
}

fn default_url() -> String { "http://localhost:6333".to_string() }
fn default_collection() -> String { "deepsearcher".to_string() }
fn default_timeout() -> u64 { 30 }

#[derive(Deserialize)]
struct Envelope<T> {
    result: T,
}

#[derive(Deserialize)]
struct CollectionList {
    collections: Vec<CollectionName>,
}

#[derive(Deserialize)]
struct CollectionName {
    name: String,
}

#[derive(Deserialize)]
struct CollectionDetails {
    config: CollectionConfig,
}

#[derive(Deserialize)]
struct CollectionConfig {
    params: CollectionParams,
}

#[derive(Deserialize)]
struct CollectionParams {
    vectors: VectorParams,
}

#[derive(Deserialize)]
struct VectorParams {
    size: usize,
}

#[derive(Serialize, Deserialize)]
struct Payload {
    text: String,
    reference: String,
    #[serde(default)]
    metadata: Metadata,
}

#[derive(Serialize)]
struct Point<'a> {
    id: String,
    vector: &'a [f32],
    payload: Payload,
}

#[derive(Deserialize)]
struct ScoredPoint {
    score: f32,
    #[serde(default)]
    payload: Option<Payload>,
    #[serde(default)]
    vector: Option<Vec<f32>>,
}

/// Qdrant REST client
pub struct QdrantStore {
    client: Client,
    url: String,
    api_key: Option<String>,
    default_collection: String,
    /// Descriptions of collections created through this client
    descriptions: RwLock<HashMap<String, String>>,
}

impl QdrantStore {
    /// Construct from provider options: `url`, `api_key`, `default_collection`, `timeout_secs`
    pub fn from_options(provider: &str, options: &ProviderOptions) -> Result<Self> {
        let opts: QdrantOptions = parse_options(provider, options)?;
        let client = Client::builder()
            .timeout(Duration::from_secs(opts.timeout_secs))
            .build()
            .map_err(|e| Error::provider_init(provider, format!("HTTP client: {}", e)))?;

        tracing::info!("Initialized Qdrant store at {}", opts.url);

        Ok(Self {
            client,
            url: opts.url.trim_end_matches('/').to_string(),
            api_key: opts.api_key.or_else(|| std::env::var("QDRANT_API_KEY").ok()),
            default_collection: opts.default_collection,
            descriptions: RwLock::new(HashMap::new()),
        })
    }

    fn request(&self, builder: RequestBuilder) -> RequestBuilder {
        match &self.api_key {
            Some(key) => builder.header("api-key", key),
            None => builder,
        }
    }

    async fn send(&self, builder: RequestBuilder, operation: &str) -> Result<reqwest::Response> {
        let response = self
            .request(builder)
            .send()
            .await
            .map_err(|e| Error::vector_db(format!("Qdrant {} failed: {}", operation, e)))?;

        if response.status().is_success() {
            Ok(response)
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(Error::vector_db(format!(
                "Qdrant {} failed: HTTP {} - {}",
                operation, status, body
            )))
        }
    }

    /// Vector width of an existing collection, `None` if it does not exist
    async fn collection_dimension(&self, name: &str) -> Result<Option<usize>> {
        let response = self
            .request(self.client.get(format!("{}/collections/{}", self.url, name)))
            .send()
            .await
            .map_err(|e| Error::vector_db(format!("Qdrant get collection failed: {}", e)))?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(Error::vector_db(format!(
                "Qdrant get collection failed: HTTP {}",
                response.status()
            )));
        }

        let details: Envelope<CollectionDetails> = response.json().await?;
        Ok(Some(details.result.config.params.vectors.size))
    }

    /// One page of nearest points, best first
    async fn search_page(
        &self,
        collection: &str,
        query_vector: &[f32],
        limit: usize,
        offset: usize,
        filter: Option<&Value>,
    ) -> Result<Vec<ScoredPoint>> {
        let mut body = json!({
            "vector": query_vector,
            "limit": limit,
            "offset": offset,
            "with_payload": true,
            "with_vector": true,
        });
        if let Some(f) = filter {
            body["filter"] = f.clone();
        }

        let response = self
            .request(
                self.client
                    .post(format!("{}/collections/{}/points/search", self.url, collection))
                    .json(&body),
            )
            .send()
            .await
            .map_err(|e| Error::vector_db(format!("Qdrant search failed: {}", e)))?;

        if response.status() == StatusCode::NOT_FOUND {
            return Err(Error::CollectionNotFound(collection.to_string()));
        }
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::vector_db(format!(
                "Qdrant search failed: HTTP {} - {}",
                status, body
            )));
        }

        let scored: Envelope<Vec<ScoredPoint>> = response.json().await?;
        Ok(scored.result)
    }
}

/// Qdrant condition for `key == value`
///
/// Strings, bools and integers use `match`; floats use a closed range on the same value.
fn value_condition(key: &str, value: &Value) -> Option<Value> {
    match value {
        Value::String(_) | Value::Bool(_) => Some(json!({"key": key, "match": {"value": value}})),
        Value::Number(n) if n.is_i64() || n.is_u64() => Some(json!({"key": key, "match": {"value": value}})),
        Value::Number(n) => {
            let v = n.as_f64()?;
            Some(json!({"key": key, "range": {"gte": v, "lte": v}}))
        }
        _ => None,
    }
}

/// Translate to a Qdrant filter; `None` when some value has no native form
fn translate_filter(filter: &MetadataFilter) -> Option<Value> {
    fn conditions(filter: &MetadataFilter, out: &mut Vec<Value>) -> bool {
        match filter {
            MetadataFilter::Eq { field, value } => {
                match value_condition(&format!("metadata.{}", field), value) {
                    Some(condition) => {
                        out.push(condition);
                        true
                    }
                    None => false,
                }
            }
            MetadataFilter::In { field, values } => {
                let key = format!("metadata.{}", field);
                let matchable = values
                    .iter()
                    .all(|v| matches!(v, Value::String(_) | Value::Bool(_)) || v.is_i64() || v.is_u64());
                if matchable {
                    out.push(json!({"key": key, "match": {"any": values}}));
                    return true;
                }
                let should: Option<Vec<Value>> = values.iter().map(|v| value_condition(&key, v)).collect();
                match should {
                    Some(should) => {
                        out.push(json!({ "should": should }));
                        true
                    }
                    None => false,
                }
            }
            MetadataFilter::And { filters } => filters.iter().all(|f| conditions(f, out)),
        }
    }

    let mut must = Vec::new();
    conditions(filter, &mut must).then(|| json!({ "must": must }))
}

impl ScoredPoint {
    fn into_result(self) -> Option<RetrievalResult> {
        let payload = self.payload?;
        Some(RetrievalResult {
            embedding: self.vector.unwrap_or_default(),
            text: payload.text,
            reference: payload.reference,
            metadata: payload.metadata,
            score: self.score,
        })
    }
}

#[async_trait]
impl VectorStoreProvider for QdrantStore {
    async fn init_collection(
        &self,
        name: &str,
        dimension: usize,
        description: &str,
        force_new: bool,
    ) -> Result<()> {
        if let Some(existing) = self.collection_dimension(name).await? {
            if !force_new {
                if existing != dimension {
                    return Err(Error::DimensionMismatch {
                        collection: name.to_string(),
                        expected: existing,
                        actual: dimension,
                    });
                }
                self.descriptions
                    .write()
                    .entry(name.to_string())
                    .or_insert_with(|| description.to_string());
                return Ok(());
            }
            self.drop_collection(name).await?;
        }

        self.send(
            self.client
                .put(format!("{}/collections/{}", self.url, name))
                .json(&json!({"vectors": {"size": dimension, "distance": "Cosine"}})),
            "create collection",
        )
        .await?;

        self.descriptions
            .write()
            .insert(name.to_string(), description.to_string());
        tracing::info!("Created Qdrant collection '{}' (dimension: {})", name, dimension);
        Ok(())
    }

    async fn insert(&self, collection: &str, entries: &[VectorEntry]) -> Result<()> {
        if entries.is_empty() {
            return Ok(());
        }

        let points: Vec<Point<'_>> = entries
            .iter()
            .map(|e| Point {
                id: Uuid::new_v4().to_string(),
                vector: &e.vector,
                payload: Payload {
                    text: e.text.clone(),
                    reference: e.reference.clone(),
                    metadata: e.metadata.clone(),
                },
            })
            .collect();

        self.send(
            self.client
                .put(format!("{}/collections/{}/points?wait=true", self.url, collection))
                .json(&json!({ "points": points })),
            "upsert points",
        )
        .await?;
        Ok(())
    }

    async fn search(
        &self,
        collection: &str,
        query_vector: &[f32],
        top_k: usize,
        filter: Option<&MetadataFilter>,
    ) -> Result<Vec<RetrievalResult>> {
        if top_k == 0 {
            return Ok(Vec::new());
        }

        let native_filter = filter.and_then(translate_filter);
        let client_side = match filter {
            Some(f) if native_filter.is_none() => f,
            _ => {
                let points = self
                    .search_page(collection, query_vector, top_k, 0, native_filter.as_ref())
                    .await?;
                let mut results: Vec<RetrievalResult> =
                    points.into_iter().filter_map(ScoredPoint::into_result).collect();
                RetrievalResult::sort_by_score(&mut results);
                results.truncate(top_k);
                return Ok(results);
            }
        };

        let page = top_k * CLIENT_FILTER_FACTOR;
        let mut offset = 0;
        let mut results = Vec::new();
        loop {
            let points = self.search_page(collection, query_vector, page, offset, None).await?;
            let fetched = points.len();
            results.extend(
                points
                    .into_iter()
                    .filter_map(ScoredPoint::into_result)
                    .filter(|r| client_side.matches(&r.metadata)),
            );
            if results.len() >= top_k || fetched < page {
                break;
            }
            offset += page;
            tracing::debug!("Client-side filter needs more points from '{}', offset {}", collection, offset);
        }

        RetrievalResult::sort_by_score(&mut results);
        results.truncate(top_k);
        Ok(results)
    }

    async fn list_collections(&self) -> Result<Vec<CollectionInfo>> {
        let response = self
            .send(self.client.get(format!("{}/collections", self.url)), "list collections")
            .await?;
        let list: Envelope<CollectionList> = response.json().await?;

        let mut infos = Vec::with_capacity(list.result.collections.len());
        for c in list.result.collections {
            if let Some(dimension) = self.collection_dimension(&c.name).await? {
                let description = self
                    .descriptions
                    .read()
                    .get(&c.name)
                    .cloned()
                    .unwrap_or_default();
                infos.push(CollectionInfo {
                    name: c.name,
                    dimension,
                    description,
                });
            }
        }
        Ok(infos)
    }

    async fn drop_collection(&self, name: &str) -> Result<()> {
        let response = self
            .request(self.client.delete(format!("{}/collections/{}", self.url, name)))
            .send()
            .await
            .map_err(|e| Error::vector_db(format!("Qdrant drop collection failed: {}", e)))?;

        // Qdrant answers 200 with `result: false` or 404 for unknown collections
        if !response.status().is_success() && response.status() != StatusCode::NOT_FOUND {
            return Err(Error::vector_db(format!(
                "Qdrant drop collection failed: HTTP {}",
                response.status()
            )));
        }
        self.descriptions.write().remove(name);
        Ok(())
    }

    fn default_collection(&self) -> &str {
        &self.default_collection
    }

    async fn health_check(&self) -> Result<bool> {
        match self.request(self.client.get(format!("{}/healthz", self.url))).send().await {
            Ok(response) => Ok(response.status().is_success()),
            Err(_) => Ok(false),
        }
    }

    fn name(&self) -> &str {
        "qdrant"
    }
}
