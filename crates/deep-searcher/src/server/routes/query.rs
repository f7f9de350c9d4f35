//! Query endpoint

use axum::{
    extract::{Query, State},
    Json,
};
use serde::{Deserialize, Serialize};
use std::time::Instant;

use crate::error::{Error, Result};
use crate::server::state::AppState;
use crate::types::{QueryOutcome, QueryWarning};

#[derive(Debug, Deserialize)]
pub struct QueryParams {
    pub original_query: String,
    #[serde(default)]
    pub max_iter: Option<usize>,
}

/// Retrieved chunk without its embedding
#[derive(Debug, Serialize, Deserialize)]
pub struct SourceChunk {
    pub reference: String,
    pub text: String,
    pub score: f32,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct QueryResponse {
    pub answer: String,
    pub sources: Vec<SourceChunk>,
    pub consumed_tokens: u64,
    pub iterations: usize,
    pub warnings: Vec<QueryWarning>,
    pub processing_time_ms: u64,
}

impl QueryResponse {
    fn from_outcome(outcome: QueryOutcome, processing_time_ms: u64) -> Self {
        Self {
            answer: outcome.answer,
            sources: outcome
                .results
                .into_iter()
                .map(|r| SourceChunk {
                    reference: r.reference,
                    text: r.text,
                    score: r.score,
                })
                .collect(),
            consumed_tokens: outcome.consumed_tokens,
            iterations: outcome.iterations,
            warnings: outcome.warnings,
            processing_time_ms,
        }
    }
}

/// GET /query?original_query=..&max_iter=..
pub async fn query(
    State(state): State<AppState>,
    Query(params): Query<QueryParams>,
) -> Result<Json<QueryResponse>> {
    let start = Instant::now();

    if params.original_query.trim().is_empty() {
        return Err(Error::config("`original_query` must not be empty"));
    }

    let outcome = state
        .searcher()
        .query(&params.original_query, params.max_iter)
        .await?;

    let processing_time_ms = start.elapsed().as_millis() as u64;
    tracing::info!(
        "Query completed in {}ms, {} sources, {} tokens",
        processing_time_ms,
        outcome.results.len(),
        outcome.consumed_tokens
    );

    Ok(Json(QueryResponse::from_outcome(outcome, processing_time_ms)))
}
