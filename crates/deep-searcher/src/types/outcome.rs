//! Query results returned by the orchestrator

use serde::{Deserialize, Serialize};

use super::retrieval::RetrievalResult;

/// Non-fatal condition attached to an answer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum QueryWarning {
    /// A retrieval round after the first failed; the answer uses earlier evidence
    PartialRetrieval { iteration: usize, reason: String },
    /// Embedding a sub-query failed and it was skipped; when the question itself fails the
    /// answer is the no-result answer
    EmbeddingDegraded { query: String, reason: String },
    /// Token ceiling crossed, retrieval stopped early
    TokenBudgetExceeded { consumed: u64, budget: u64 },
}

/// Result of one `query()` call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryOutcome {
    /// Synthesized answer
    pub answer: String,
    /// Evidence in first-seen order, unique by reference
    pub results: Vec<RetrievalResult>,
    /// Sum of tokens reported by every LLM call
    pub consumed_tokens: u64,
    /// Non-fatal conditions hit during the session
    #[serde(default)]
    pub warnings: Vec<QueryWarning>,
    /// Retrieval rounds performed
    pub iterations: usize,
}

impl QueryOutcome {
    /// `(answer, results, consumed_tokens)`
    pub fn into_parts(self) -> (String, Vec<RetrievalResult>, u64) {
        (self.answer, self.results, self.consumed_tokens)
    }

    /// Whether any retrieval round was cut short
    pub fn is_partial(&self) -> bool {
        self.warnings
            .iter()
            .any(|w| matches!(w, QueryWarning::PartialRetrieval { .. }))
    }
}
