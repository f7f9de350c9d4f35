//! End-to-end query flows over in-test providers

mod common;

use common::{seed, settings, FlakyStore, HashEmbedder, ScriptedLlm, MILVUS_DOCS};
use deep_searcher::providers::memory::MemoryVectorStore;
use deep_searcher::providers::VectorStoreProvider;
use deep_searcher::types::{MetadataFilter, VectorEntry};
use deep_searcher::{DeepSearch, Error, QueryWarning, NO_RESULT_ANSWER};
use serde_json::json;
use std::collections::HashSet;
use std::sync::Arc;

async fn milvus_store() -> Arc<FlakyStore> {
    let store = FlakyStore::reliable(MemoryVectorStore::new("deepsearcher"));
    seed(&*store, &HashEmbedder::new(), "deepsearcher", "Milvus notes", MILVUS_DOCS).await;
    store
}

fn agent(
    embedder: Arc<HashEmbedder>,
    llm: Arc<ScriptedLlm>,
    store: Arc<FlakyStore>,
) -> DeepSearch {
    DeepSearch::new(embedder, llm, store, settings())
}

#[tokio::test]
async fn test_single_iteration_answers_without_reflection() {
    let llm = ScriptedLlm::new(&["<think>easy</think>Milvus is a vector database."], 7);
    let search = agent(HashEmbedder::new(), llm.clone(), milvus_store().await);

    let outcome = search.query("What is Milvus?", 1).await.unwrap();

    assert_eq!(llm.calls(), 1);
    assert_eq!(outcome.answer, "Milvus is a vector database.");
    assert_eq!(outcome.consumed_tokens, 7);
    assert_eq!(outcome.iterations, 1);
    assert_eq!(outcome.results.len(), 3);
    assert!(outcome.warnings.is_empty());
    assert!(llm.prompts()[0].contains("What is Milvus?"));
}

#[tokio::test]
async fn test_zero_max_iter_runs_one_round() {
    let llm = ScriptedLlm::new(&["answer"], 1);
    let search = agent(HashEmbedder::new(), llm.clone(), milvus_store().await);

    let outcome = search.query("What is Milvus?", 0).await.unwrap();
    assert_eq!(outcome.iterations, 1);
    assert_eq!(llm.calls(), 1);
}

#[tokio::test]
async fn test_follow_up_rounds_dedupe_and_sum_tokens() {
    let llm = ScriptedLlm::new(&[r#"["Milvus index types"]"#, "[]", "Milvus supports HNSW."], 10);
    let search = agent(HashEmbedder::new(), llm.clone(), milvus_store().await);

    let outcome = search.query("What is Milvus?", 3).await.unwrap();

    assert_eq!(llm.calls(), 3);
    assert_eq!(outcome.consumed_tokens, 30);
    assert_eq!(outcome.iterations, 2);
    assert_eq!(outcome.answer, "Milvus supports HNSW.");

    let references: HashSet<_> = outcome.results.iter().map(|r| r.reference.as_str()).collect();
    assert_eq!(references.len(), outcome.results.len());
    assert!(references.contains("index.md"));

    // The second reflection sees the follow-up as already asked
    assert!(llm.prompts()[1].contains("Milvus index types"));
}

#[tokio::test]
async fn test_iteration_cap_goes_straight_to_answer() {
    let llm = ScriptedLlm::new(&[r#"["Milvus storage segments"]"#, "final answer"], 5);
    let search = agent(HashEmbedder::new(), llm.clone(), milvus_store().await);

    let outcome = search.query("What is Milvus?", 2).await.unwrap();

    assert_eq!(llm.calls(), 2);
    assert_eq!(outcome.iterations, 2);
    assert_eq!(outcome.answer, "final answer");
    assert_eq!(outcome.consumed_tokens, 10);
}

#[tokio::test]
async fn test_repeated_follow_up_counts_as_sufficient() {
    let llm = ScriptedLlm::new(&[r#"["what is milvus?"]"#, "done"], 3);
    let search = agent(HashEmbedder::new(), llm.clone(), milvus_store().await);

    let outcome = search.query("What is Milvus?", 3).await.unwrap();
    assert_eq!(outcome.iterations, 1);
    assert_eq!(outcome.answer, "done");
}

#[tokio::test]
async fn test_unparseable_reflection_counts_as_sufficient() {
    let llm = ScriptedLlm::new(&["I think we have enough.", "done"], 3);
    let search = agent(HashEmbedder::new(), llm.clone(), milvus_store().await);

    let outcome = search.query("What is Milvus?", 3).await.unwrap();
    assert_eq!(outcome.iterations, 1);
    assert_eq!(llm.calls(), 2);
}

#[tokio::test]
async fn test_no_collections_skips_the_llm() {
    let llm = ScriptedLlm::new(&[], 9);
    let store = FlakyStore::reliable(MemoryVectorStore::new("deepsearcher"));
    let search = agent(HashEmbedder::new(), llm.clone(), store);

    let outcome = search.query("What is Milvus?", 3).await.unwrap();

    assert_eq!(outcome.answer, NO_RESULT_ANSWER);
    assert_eq!(outcome.consumed_tokens, 0);
    assert!(outcome.results.is_empty());
    assert_eq!(llm.calls(), 0);
}

#[tokio::test]
async fn test_empty_collection_skips_the_llm() {
    let llm = ScriptedLlm::new(&[], 9);
    let store = FlakyStore::reliable(MemoryVectorStore::new("deepsearcher"));
    store
        .init_collection("deepsearcher", common::DIMENSION, "", false)
        .await
        .unwrap();
    let search = agent(HashEmbedder::new(), llm.clone(), store);

    let outcome = search.query("What is Milvus?", 1).await.unwrap();
    assert_eq!(outcome.answer, NO_RESULT_ANSWER);
    assert_eq!(llm.calls(), 0);
}

#[tokio::test]
async fn test_first_round_failure_is_fatal() {
    let store = FlakyStore::new(MemoryVectorStore::new("deepsearcher"), 0);
    seed(&*store, &HashEmbedder::new(), "deepsearcher", "", MILVUS_DOCS).await;
    let llm = ScriptedLlm::new(&["unused"], 1);
    let search = agent(HashEmbedder::new(), llm.clone(), store);

    let result = search.query("What is Milvus?", 3).await;
    assert!(matches!(result, Err(Error::VectorDb(_))));
    assert_eq!(llm.calls(), 0);
}

#[tokio::test]
async fn test_later_round_failure_keeps_earlier_evidence() {
    let store = FlakyStore::new(MemoryVectorStore::new("deepsearcher"), 1);
    seed(&*store, &HashEmbedder::new(), "deepsearcher", "", MILVUS_DOCS).await;
    let llm = ScriptedLlm::new(&[r#"["Milvus index types"]"#, "answer from round one"], 2);
    let search = agent(HashEmbedder::new(), llm.clone(), store);

    let outcome = search.query("What is Milvus?", 3).await.unwrap();

    assert_eq!(outcome.answer, "answer from round one");
    assert_eq!(outcome.results.len(), 3);
    assert!(outcome.is_partial());
    assert!(matches!(
        outcome.warnings.as_slice(),
        [QueryWarning::PartialRetrieval { iteration: 1, .. }]
    ));
}

#[tokio::test]
async fn test_degraded_sub_query_is_reported() {
    let embedder = HashEmbedder::failing_on(&["broken query"]);
    let llm = ScriptedLlm::new(&[r#"["broken query", "Milvus storage"]"#, "[]", "answer"], 1);
    let search = agent(embedder, llm.clone(), milvus_store().await);

    let outcome = search.query("What is Milvus?", 3).await.unwrap();

    assert_eq!(outcome.answer, "answer");
    assert!(outcome.warnings.iter().any(|w| matches!(
        w,
        QueryWarning::EmbeddingDegraded { query, .. } if query == "broken query"
    )));
    assert!(outcome
        .warnings
        .iter()
        .any(|w| matches!(w, QueryWarning::PartialRetrieval { iteration: 1, .. })));
}

#[tokio::test]
async fn test_question_embedding_outage_returns_empty_answer() {
    let embedder = HashEmbedder::failing_on(&["What is Milvus?"]);
    let llm = ScriptedLlm::new(&[], 1);
    let search = agent(embedder, llm.clone(), milvus_store().await);

    let outcome = search.query("What is Milvus?", 3).await.unwrap();

    assert_eq!(outcome.answer, NO_RESULT_ANSWER);
    assert!(outcome.results.is_empty());
    assert_eq!(outcome.consumed_tokens, 0);
    assert_eq!(outcome.iterations, 1);
    assert_eq!(outcome.warnings.len(), 1);
    assert!(matches!(
        &outcome.warnings[0],
        QueryWarning::EmbeddingDegraded { query, .. } if query == "What is Milvus?"
    ));
    assert_eq!(llm.calls(), 0);
}

#[tokio::test]
async fn test_token_budget_stops_retrieval() {
    let llm = ScriptedLlm::new(&[r#"["Milvus index types"]"#, "answer"], 10);
    let mut query_settings = settings();
    query_settings.token_budget = Some(5);
    let search = DeepSearch::new(HashEmbedder::new(), llm.clone(), milvus_store().await, query_settings);

    let outcome = search.query("What is Milvus?", 3).await.unwrap();

    assert_eq!(outcome.iterations, 1);
    assert_eq!(outcome.consumed_tokens, 20);
    assert_eq!(outcome.answer, "answer");
    assert!(outcome.warnings.contains(&QueryWarning::TokenBudgetExceeded {
        consumed: 10,
        budget: 5
    }));
}

#[tokio::test]
async fn test_dimension_mismatch_is_rejected() {
    let store = FlakyStore::reliable(MemoryVectorStore::new("deepsearcher"));
    store.init_collection("deepsearcher", 8, "", false).await.unwrap();
    let llm = ScriptedLlm::new(&[], 1);
    let search = agent(HashEmbedder::new(), llm, store);

    let result = search.query("What is Milvus?", 1).await;
    match result {
        Err(Error::DimensionMismatch {
            collection,
            expected,
            actual,
        }) => {
            assert_eq!(collection, "deepsearcher");
            assert_eq!(expected, 8);
            assert_eq!(actual, common::DIMENSION);
        }
        other => panic!("expected a dimension mismatch, got {:?}", other.map(|o| o.answer)),
    }
}

async fn three_collection_store() -> Arc<FlakyStore> {
    let embedder = HashEmbedder::new();
    let store = FlakyStore::reliable(MemoryVectorStore::new("deepsearcher"));
    seed(&*store, &embedder, "deepsearcher", "General notes", &MILVUS_DOCS[..3]).await;
    seed(
        &*store,
        &embedder,
        "papers",
        "Research papers on vector search",
        &[("hnsw.pdf", "HNSW graphs for approximate nearest neighbour search")],
    )
    .await;
    seed(
        &*store,
        &embedder,
        "recipes",
        "Italian cooking",
        &[("ragu.md", "Slow cooked ragu needs tomatoes onions and patience")],
    )
    .await;
    store
}

#[tokio::test]
async fn test_routing_limits_searched_collections() {
    let store = three_collection_store().await;
    let llm = ScriptedLlm::new(&[r#"["papers"]"#, "answer"], 4);
    let search = agent(HashEmbedder::new(), llm.clone(), store.clone());

    let outcome = search.query("How does HNSW work?", 1).await.unwrap();

    let searched: HashSet<String> = store.searched().into_iter().collect();
    assert_eq!(
        searched,
        HashSet::from(["deepsearcher".to_string(), "papers".to_string()])
    );
    assert_eq!(outcome.consumed_tokens, 8);
    assert!(llm.prompts()[0].contains("Italian cooking"));
    assert!(outcome.results.iter().all(|r| r.reference != "ragu.md"));
}

#[tokio::test]
async fn test_routing_disabled_searches_everything() {
    let store = three_collection_store().await;
    let llm = ScriptedLlm::new(&["answer"], 4);
    let mut query_settings = settings();
    query_settings.route_collections = false;
    let search = DeepSearch::new(HashEmbedder::new(), llm.clone(), store.clone(), query_settings);

    search.query("How does HNSW work?", 1).await.unwrap();

    assert_eq!(llm.calls(), 1);
    assert_eq!(store.searched().len(), 3);
}

#[tokio::test]
async fn test_metadata_filter_restricts_results() {
    let embedder = HashEmbedder::new();
    let store = FlakyStore::reliable(MemoryVectorStore::new("deepsearcher"));
    store
        .init_collection("deepsearcher", common::DIMENSION, "", false)
        .await
        .unwrap();
    let entries: Vec<VectorEntry> = [("en.md", "Milvus is fast", "en"), ("de.md", "Milvus ist schnell", "de")]
        .iter()
        .map(|(reference, text, lang)| VectorEntry {
            vector: embedder.vector(text),
            text: text.to_string(),
            reference: reference.to_string(),
            metadata: json!({ "lang": lang }).as_object().cloned().unwrap_or_default(),
        })
        .collect();
    store.insert("deepsearcher", &entries).await.unwrap();

    let llm = ScriptedLlm::new(&["antwort"], 1);
    let search = agent(embedder, llm, store);
    let filter = MetadataFilter::eq("lang", "de");

    let outcome = search
        .query_filtered("Is Milvus fast?", 1, Some(&filter))
        .await
        .unwrap();

    assert_eq!(outcome.results.len(), 1);
    assert_eq!(outcome.results[0].reference, "de.md");
}

#[tokio::test]
async fn test_concurrent_queries_keep_separate_accounting() {
    let llm = ScriptedLlm::new(&["first", "second"], 6);
    let search = Arc::new(agent(HashEmbedder::new(), llm.clone(), milvus_store().await));

    let (a, b) = tokio::join!(
        search.query("What is Milvus?", 1),
        search.query("Where are segments stored?", 1)
    );

    let (a, b) = (a.unwrap(), b.unwrap());
    assert_eq!(a.consumed_tokens, 6);
    assert_eq!(b.consumed_tokens, 6);
    assert_eq!(llm.calls(), 2);
}
