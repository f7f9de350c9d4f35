//! Per-query state

use std::collections::HashSet;

use crate::types::{QueryOutcome, QueryWarning, RetrievalResult};

/// State of one `query()` call, dropped when it returns
#[derive(Debug)]
pub(crate) struct QuerySession {
    pub question: String,
    /// Current round, from 0
    pub iteration: usize,
    /// Rounds that ran a retrieval
    pub rounds: usize,
    results: Vec<RetrievalResult>,
    seen_references: HashSet<String>,
    asked: Vec<String>,
    consumed_tokens: u64,
    warnings: Vec<QueryWarning>,
}

impl QuerySession {
    pub fn new(question: &str) -> Self {
        Self {
            question: question.to_string(),
            iteration: 0,
            rounds: 0,
            results: Vec::new(),
            seen_references: HashSet::new(),
            asked: vec![question.to_string()],
            consumed_tokens: 0,
            warnings: Vec::new(),
        }
    }

    /// Append results whose reference is new; returns how many were kept
    pub fn add_results(&mut self, results: Vec<RetrievalResult>) -> usize {
        let before = self.results.len();
        for result in results {
            if self.seen_references.insert(result.reference.clone()) {
                self.results.push(result);
            }
        }
        self.results.len() - before
    }

    pub fn results(&self) -> &[RetrievalResult] {
        &self.results
    }

    pub fn add_tokens(&mut self, tokens: u64) {
        self.consumed_tokens = self.consumed_tokens.saturating_add(tokens);
    }

    pub fn consumed_tokens(&self) -> u64 {
        self.consumed_tokens
    }

    pub fn warn(&mut self, warning: QueryWarning) {
        self.warnings.push(warning);
    }

    /// Every query issued so far, the original question first
    pub fn asked(&self) -> &[String] {
        &self.asked
    }

    /// Keep follow-ups not asked before and record them as asked
    pub fn adopt_queries(&mut self, candidates: Vec<String>) -> Vec<String> {
        let mut fresh = Vec::new();
        for candidate in candidates {
            let normalized = candidate.trim().to_lowercase();
            let known = self
                .asked
                .iter()
                .any(|q| q.trim().to_lowercase() == normalized);
            if !known {
                self.asked.push(candidate.clone());
                fresh.push(candidate);
            }
        }
        fresh
    }

    pub fn into_outcome(self, answer: String) -> QueryOutcome {
        QueryOutcome {
            answer,
            results: self.results,
            consumed_tokens: self.consumed_tokens,
            warnings: self.warnings,
            iterations: self.rounds,
        }
    }
}
