//! Iterative retrieve → reflect → answer loop

use futures::future::join_all;
use std::sync::Arc;

use crate::config::{CallPolicy, QuerySettings};
use crate::error::{Error, Result};
use crate::generation::{parse_string_list, strip_reasoning, PromptBuilder};
use crate::providers::{ChatMessage, ChatResponse, EmbeddingProvider, LlmProvider, VectorStoreProvider};
use crate::types::{CollectionInfo, MetadataFilter, QueryOutcome, QueryWarning, RetrievalResult};

use super::call::with_policy;
use super::router::CollectionRouter;
use super::session::QuerySession;

/// Answer returned when retrieval found nothing; no LLM call is made
pub const NO_RESULT_ANSWER: &str =
    "No relevant information found in the knowledge base to answer this question.";

/// One LLM call under `policy`; every failure surfaces as [`Error::Generation`]
pub(crate) async fn generate(
    llm: &dyn LlmProvider,
    policy: &CallPolicy,
    operation: &str,
    messages: Vec<ChatMessage>,
) -> Result<ChatResponse> {
    with_policy(policy, operation, || llm.chat(&messages))
        .await
        .map_err(|e| match e {
            Error::Generation(_) => e,
            other => Error::generation(format!("{} call to {} failed: {}", operation, llm.name(), other)),
        })
}

/// Retrieval outcome of one round
struct Round {
    hits: Vec<RetrievalResult>,
    attempted: usize,
    failed: usize,
    /// Failures caused by the embedder rather than the store
    degraded: usize,
    last_error: Option<Error>,
}

/// Multi-round retrieval agent over an embedder, an LLM and a vector store
pub struct DeepSearch {
    embedder: Arc<dyn EmbeddingProvider>,
    llm: Arc<dyn LlmProvider>,
    store: Arc<dyn VectorStoreProvider>,
    router: CollectionRouter,
    settings: QuerySettings,
}

impl DeepSearch {
    pub fn new(
        embedder: Arc<dyn EmbeddingProvider>,
        llm: Arc<dyn LlmProvider>,
        store: Arc<dyn VectorStoreProvider>,
        settings: QuerySettings,
    ) -> Self {
        let router = CollectionRouter::new(
            Arc::clone(&llm),
            settings.generation_policy.clone(),
            settings.route_collections,
        );
        Self {
            embedder,
            llm,
            store,
            router,
            settings,
        }
    }

    /// Settings in effect
    pub fn settings(&self) -> &QuerySettings {
        &self.settings
    }

    /// Answer `question` with at most `max_iter` retrieval rounds (0 is treated as 1)
    pub async fn query(&self, question: &str, max_iter: usize) -> Result<QueryOutcome> {
        self.query_filtered(question, max_iter, None).await
    }

    /// Like [`DeepSearch::query`], restricting every search to entries matching `filter`
    pub async fn query_filtered(
        &self,
        question: &str,
        max_iter: usize,
        filter: Option<&MetadataFilter>,
    ) -> Result<QueryOutcome> {
        let max_iter = max_iter.max(1);
        let mut session = QuerySession::new(question);

        tracing::info!("Query: \"{}\" (max_iter: {})", question, max_iter);

        let collections = self.select_collections(&mut session).await?;
        let mut sub_queries = vec![question.to_string()];

        loop {
            let iteration = session.iteration;
            let round = self.retrieve_round(&mut session, &sub_queries, &collections, filter).await;
            session.rounds += 1;

            if round.attempted > 0 && round.failed == round.attempted {
                let error = round
                    .last_error
                    .unwrap_or_else(|| Error::internal("retrieval failed without an error"));
                if iteration == 0 && round.degraded < round.failed {
                    return Err(error);
                }
                if iteration == 0 {
                    tracing::warn!("Question could not be embedded, answering without evidence: {}", error);
                    break;
                }
                tracing::warn!("Retrieval round {} failed, answering with earlier evidence: {}", iteration, error);
                session.warn(QueryWarning::PartialRetrieval {
                    iteration,
                    reason: error.to_string(),
                });
                break;
            }
            if round.failed > 0 {
                let reason = round
                    .last_error
                    .map(|e| e.to_string())
                    .unwrap_or_default();
                session.warn(QueryWarning::PartialRetrieval { iteration, reason });
            }

            let added = session.add_results(round.hits);
            tracing::info!(
                "Iteration {}: {} sub-queries, {} new chunks ({} total)",
                iteration,
                sub_queries.len(),
                added,
                session.results().len()
            );

            if collections.is_empty() || iteration + 1 >= max_iter || self.over_budget(&mut session) {
                break;
            }

            let follow_ups = self.reflect(&mut session).await?;
            if follow_ups.is_empty() {
                tracing::info!("Evidence judged sufficient after iteration {}", iteration);
                break;
            }
            if self.over_budget(&mut session) {
                break;
            }

            tracing::debug!("Follow-up queries: {:?}", follow_ups);
            session.iteration += 1;
            sub_queries = follow_ups;
        }

        let answer = self.synthesize(&mut session).await?;

        tracing::info!(
            "Query finished: {} rounds, {} chunks, {} tokens",
            session.rounds,
            session.results().len(),
            session.consumed_tokens()
        );

        Ok(session.into_outcome(answer))
    }

    /// List, route and validate the collections to search
    async fn select_collections(&self, session: &mut QuerySession) -> Result<Vec<CollectionInfo>> {
        let available = with_policy(&self.settings.retrieval_policy, "list_collections", || {
            self.store.list_collections()
        })
        .await?;

        if available.is_empty() {
            tracing::warn!("Vector store has no collections");
            return Ok(available);
        }

        let decision = self
            .router
            .route(&session.question, available, self.store.default_collection())
            .await?;
        session.add_tokens(decision.consumed_tokens);

        let width = self.embedder.dimension();
        if let Some(bad) = decision.collections.iter().find(|c| c.dimension != width) {
            return Err(Error::DimensionMismatch {
                collection: bad.name.clone(),
                expected: bad.dimension,
                actual: width,
            });
        }

        Ok(decision.collections)
    }

    /// Run every sub-query of a round concurrently
    async fn retrieve_round(
        &self,
        session: &mut QuerySession,
        sub_queries: &[String],
        collections: &[CollectionInfo],
        filter: Option<&MetadataFilter>,
    ) -> Round {
        let mut round = Round {
            hits: Vec::new(),
            attempted: 0,
            failed: 0,
            degraded: 0,
            last_error: None,
        };
        if collections.is_empty() {
            return round;
        }

        let outcomes = join_all(
            sub_queries
                .iter()
                .map(|query| self.retrieve_one(query, collections, filter)),
        )
        .await;

        for (query, outcome) in sub_queries.iter().zip(outcomes) {
            round.attempted += 1;
            match outcome {
                Ok(hits) => round.hits.extend(hits),
                Err(e) => {
                    if let Error::EmbeddingDegraded { reason, .. } = &e {
                        session.warn(QueryWarning::EmbeddingDegraded {
                            query: query.clone(),
                            reason: reason.clone(),
                        });
                        round.degraded += 1;
                    }
                    tracing::warn!("Sub-query \"{}\" failed: {}", query, e);
                    round.failed += 1;
                    round.last_error = Some(e);
                }
            }
        }

        RetrievalResult::sort_by_score(&mut round.hits);
        round
    }

    /// Embed one sub-query and search every collection with it
    ///
    /// Fails when the embedding fails or no collection could be searched.
    async fn retrieve_one(
        &self,
        query: &str,
        collections: &[CollectionInfo],
        filter: Option<&MetadataFilter>,
    ) -> Result<Vec<RetrievalResult>> {
        let policy = &self.settings.retrieval_policy;
        let vector = with_policy(policy, "embed_query", || self.embedder.embed_query(query)).await?;

        let mut hits = Vec::new();
        let mut searched = 0usize;
        let mut last_error = None;
        for collection in collections {
            match with_policy(policy, "search", || {
                self.store.search(&collection.name, &vector, self.settings.top_k, filter)
            })
            .await
            {
                Ok(found) => {
                    searched += 1;
                    hits.extend(found);
                }
                Err(e) => {
                    tracing::warn!("Search in '{}' failed: {}", collection.name, e);
                    last_error = Some(e);
                }
            }
        }

        match last_error {
            Some(e) if searched == 0 => Err(e),
            _ => Ok(hits),
        }
    }

    /// Ask the LLM for follow-up queries; an empty list means the evidence suffices
    async fn reflect(&self, session: &mut QuerySession) -> Result<Vec<String>> {
        let context = PromptBuilder::build_context(session.results());
        let prompt = PromptBuilder::build_reflect_prompt(&session.question, session.asked(), &context);

        let reply = generate(
            &*self.llm,
            &self.settings.generation_policy,
            "reflect",
            vec![ChatMessage::user(prompt)],
        )
        .await?;
        session.add_tokens(reply.total_tokens);

        let candidates = parse_string_list(&reply.content).unwrap_or_else(|| {
            tracing::warn!("Unparseable reflection reply, treating evidence as sufficient");
            Vec::new()
        });
        Ok(session.adopt_queries(candidates))
    }

    /// Produce the final answer from all evidence
    async fn synthesize(&self, session: &mut QuerySession) -> Result<String> {
        if session.results().is_empty() {
            tracing::info!("No evidence retrieved, skipping synthesis");
            return Ok(NO_RESULT_ANSWER.to_string());
        }

        let context = PromptBuilder::build_context(session.results());
        let prompt = PromptBuilder::build_summary_prompt(&session.question, session.asked(), &context);

        let reply = generate(
            &*self.llm,
            &self.settings.generation_policy,
            "summarize",
            vec![ChatMessage::user(prompt)],
        )
        .await?;
        session.add_tokens(reply.total_tokens);

        Ok(strip_reasoning(&reply.content))
    }

    /// Record a warning and return true once the token budget is spent
    fn over_budget(&self, session: &mut QuerySession) -> bool {
        match self.settings.token_budget {
            Some(budget) if session.consumed_tokens() > budget => {
                tracing::warn!(
                    "Token budget exceeded ({} > {}), stopping retrieval",
                    session.consumed_tokens(),
                    budget
                );
                session.warn(QueryWarning::TokenBudgetExceeded {
                    consumed: session.consumed_tokens(),
                    budget,
                });
                true
            }
            _ => false,
        }
    }
}
