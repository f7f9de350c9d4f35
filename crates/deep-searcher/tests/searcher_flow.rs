//! Load-then-query flows through the registry, the facade and the HTTP server

use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use deep_searcher::config::options;
use deep_searcher::server::{state::AppState, DeepSearcherServer, ServerSettings};
use deep_searcher::{Capability, DeepSearcher, Error, ProviderConfig};
use serde_json::{json, Value};
use std::path::PathBuf;
use tempfile::TempDir;
use tower::ServiceExt;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const ANSWER: &str = "Milvus is an open source vector database.";

async fn mock_ollama() -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/embed"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "model": "tiny",
            "embeddings": [[1.0, 0.0, 0.0]]
        })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "model": "qwen3:8b",
            "message": {"role": "assistant", "content": ANSWER},
            "done": true,
            "prompt_eval_count": 10,
            "eval_count": 2
        })))
        .mount(&server)
        .await;
    server
}

fn config(ollama: &MockServer) -> ProviderConfig {
    let mut config = ProviderConfig::empty();
    config
        .set_provider(
            Capability::Embedding,
            "OllamaEmbedding",
            options([
                ("base_url", json!(ollama.uri())),
                ("model", json!("tiny")),
                ("dimension", json!(3)),
            ]),
        )
        .set_provider(
            Capability::Llm,
            "Ollama",
            options([("base_url", json!(ollama.uri())), ("model", json!("qwen3:8b"))]),
        )
        .set_provider(
            Capability::VectorDb,
            "Memory",
            options([("default_collection", json!("docs"))]),
        )
        .set_provider(Capability::FileLoader, "TextLoader", Default::default())
        .set_provider(Capability::WebCrawler, "HtmlCrawler", Default::default());
    config
}

fn notes_dir() -> TempDir {
    let dir = TempDir::new().unwrap();
    std::fs::write(
        dir.path().join("milvus.md"),
        "Milvus is an open source vector database built for similarity search.",
    )
    .unwrap();
    dir
}

#[tokio::test]
async fn test_load_files_then_query() {
    let ollama = mock_ollama().await;
    let dir = notes_dir();
    let searcher = DeepSearcher::from_config(config(&ollama)).unwrap();

    let report = searcher
        .load_from_local_files(&[dir.path().to_path_buf()], None, Some("Project notes"), false)
        .await
        .unwrap();
    assert_eq!(report.collection, "docs");
    assert_eq!(report.documents, 1);
    assert_eq!(report.chunks, 1);
    assert_eq!(report.inserted, 1);
    assert!(report.failed_sources.is_empty());

    let outcome = searcher.query("What is Milvus?", Some(1)).await.unwrap();
    assert_eq!(outcome.answer, ANSWER);
    assert_eq!(outcome.consumed_tokens, 12);
    assert_eq!(outcome.results.len(), 1);
    assert!(outcome.results[0].reference.ends_with("milvus.md"));
}

#[tokio::test]
async fn test_load_website_then_query() {
    let ollama = mock_ollama().await;
    let site = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/overview"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(
            "<html><head><title>Overview</title></head><body><p>Milvus stores vectors.</p></body></html>",
            "text/html",
        ))
        .mount(&site)
        .await;

    let searcher = DeepSearcher::from_config(config(&ollama)).unwrap();
    let url = format!("{}/overview", site.uri());
    let missing = format!("{}/missing", site.uri());

    let report = searcher
        .load_from_website(&[url.clone(), missing.clone()], Some("web"), None, false)
        .await
        .unwrap();
    assert_eq!(report.collection, "web");
    assert_eq!(report.inserted, 1);
    assert_eq!(report.failed_sources, vec![missing]);

    let outcome = searcher.query("Where are vectors stored?", Some(1)).await.unwrap();
    assert_eq!(outcome.results[0].reference, url);
    assert_eq!(outcome.results[0].metadata.get("title"), Some(&json!("Overview")));
}

#[tokio::test]
async fn test_missing_path_fails_the_load() {
    let ollama = mock_ollama().await;
    let searcher = DeepSearcher::from_config(config(&ollama)).unwrap();

    let result = searcher
        .load_from_local_files(&[PathBuf::from("/definitely/not/here")], None, None, false)
        .await;
    assert!(matches!(result, Err(Error::Load { .. })));
}

#[tokio::test]
async fn test_reconfigured_llm_keeps_loaded_collections() {
    let ollama = mock_ollama().await;
    let dir = notes_dir();
    let searcher = DeepSearcher::from_config(config(&ollama)).unwrap();
    searcher
        .load_from_local_files(&[dir.path().to_path_buf()], None, None, false)
        .await
        .unwrap();

    let registry = searcher
        .registry()
        .with_provider(
            Capability::Llm,
            "Ollama",
            options([("base_url", json!(ollama.uri())), ("model", json!("llama3.2"))]),
        )
        .unwrap();
    let reconfigured = DeepSearcher::new(registry);

    let outcome = reconfigured.query("What is Milvus?", Some(1)).await.unwrap();
    assert_eq!(outcome.results.len(), 1);
    assert_eq!(reconfigured.registry().llm().await.unwrap().model(), "llama3.2");
}

#[tokio::test]
async fn test_missing_required_capability() {
    let mut config = ProviderConfig::default();
    config.clear_provider(Capability::VectorDb);
    assert!(matches!(DeepSearcher::from_config(config), Err(Error::Config(_))));
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn test_http_load_then_query() {
    let ollama = mock_ollama().await;
    let dir = notes_dir();
    let state = AppState::new(config(&ollama)).unwrap();
    let router = DeepSearcherServer::new(ServerSettings::default(), state).build_router();

    let load = Request::builder()
        .method("POST")
        .uri("/load-files")
        .header("content-type", "application/json")
        .body(Body::from(
            json!({"paths": [dir.path()], "collection_description": "Project notes"}).to_string(),
        ))
        .unwrap();
    let response = router.clone().oneshot(load).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["inserted"], 1);

    let query = Request::builder()
        .uri("/query?original_query=What%20is%20Milvus%3F&max_iter=1")
        .body(Body::empty())
        .unwrap();
    let response = router.oneshot(query).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["answer"], ANSWER);
    assert_eq!(body["consumed_tokens"], 12);
    assert_eq!(body["iterations"], 1);
    assert!(body["sources"][0].get("embedding").is_none());
    assert!(body["sources"][0]["reference"]
        .as_str()
        .unwrap()
        .ends_with("milvus.md"));
}
