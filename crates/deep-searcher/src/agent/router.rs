//! LLM-assisted collection selection

use std::sync::Arc;

use crate::config::CallPolicy;
use crate::error::Result;
use crate::generation::{parse_string_list, PromptBuilder};
use crate::providers::{ChatMessage, LlmProvider};
use crate::types::CollectionInfo;

use super::orchestrator::generate;

/// Collections chosen for a question plus the tokens the choice cost
#[derive(Debug, Clone, PartialEq)]
pub struct RouteDecision {
    pub collections: Vec<CollectionInfo>,
    pub consumed_tokens: u64,
}

/// Picks the collections worth searching for a question
pub struct CollectionRouter {
    llm: Arc<dyn LlmProvider>,
    policy: CallPolicy,
    enabled: bool,
}

impl CollectionRouter {
    pub fn new(llm: Arc<dyn LlmProvider>, policy: CallPolicy, enabled: bool) -> Self {
        Self {
            llm,
            policy,
            enabled,
        }
    }

    /// Choose among `collections`
    ///
    /// With routing disabled or at most one collection, everything is searched without an
    /// LLM call. The default collection is always kept. A reply that names no known
    /// collection, or cannot be parsed, falls back to all collections.
    pub async fn route(
        &self,
        question: &str,
        collections: Vec<CollectionInfo>,
        default_collection: &str,
    ) -> Result<RouteDecision> {
        if !self.enabled || collections.len() <= 1 {
            return Ok(RouteDecision {
                collections,
                consumed_tokens: 0,
            });
        }

        let prompt = PromptBuilder::build_route_prompt(question, &collections);
        let reply = generate(&*self.llm, &self.policy, "route", vec![ChatMessage::user(prompt)]).await?;

        let selected = match parse_string_list(&reply.content) {
            Some(names) => {
                let chosen: Vec<CollectionInfo> = collections
                    .iter()
                    .filter(|c| c.name == default_collection || names.contains(&c.name))
                    .cloned()
                    .collect();
                if chosen.is_empty() {
                    collections
                } else {
                    chosen
                }
            }
            None => {
                tracing::warn!("Unparseable routing reply, searching all collections");
                collections
            }
        };

        tracing::info!(
            "Routed to collections: {}",
            selected.iter().map(|c| c.name.as_str()).collect::<Vec<_>>().join(", ")
        );

        Ok(RouteDecision {
            collections: selected,
            consumed_tokens: reply.total_tokens,
        })
    }
}
