//! Prompt templates for reflection, routing and answer synthesis

use crate::types::{CollectionInfo, RetrievalResult};

/// Prompt builder for the query loop
pub struct PromptBuilder;

impl PromptBuilder {
    /// Build numbered context from retrieved chunks
    pub fn build_context(results: &[RetrievalResult]) -> String {
        let mut context = String::new();

        for (i, result) in results.iter().enumerate() {
            context.push_str(&format!(
                "[{}] Source: {}\n\nContent:\n{}\n\n---\n\n",
                i + 1,
                result.reference,
                result.text
            ));
        }

        context
    }

    /// Ask for follow-up queries, or an empty list when the evidence suffices
    pub fn build_reflect_prompt(question: &str, asked: &[String], context: &str) -> String {
        format!(
            r#"Determine whether the retrieved chunks below are enough to fully answer the original question.

If they are enough, reply with an empty list: []
If they are not, reply with up to 3 new search queries that would find the missing information,
as a JSON list of strings, for example: ["query one", "query two"]
Do not repeat queries that were already asked. Reply with the JSON list only.

ORIGINAL QUESTION: {question}

QUERIES ALREADY ASKED:
{asked}

RETRIEVED CHUNKS:
{context}"#,
            question = question,
            asked = Self::format_list(asked),
            context = context
        )
    }

    /// Build the final answer prompt
    pub fn build_summary_prompt(question: &str, asked: &[String], context: &str) -> String {
        format!(
            r#"You are an AI content analysis expert. Using ONLY the retrieved chunks below, write a
specific and detailed answer to the original question. Cite the source of each claim in the
form [Source: reference]. If the chunks do not cover part of the question, say so.

ORIGINAL QUESTION: {question}

RELATED QUERIES:
{asked}

RETRIEVED CHUNKS:
{context}

Answer:"#,
            question = question,
            asked = Self::format_list(asked),
            context = context
        )
    }

    /// Ask which collections may hold the answer
    pub fn build_route_prompt(question: &str, collections: &[CollectionInfo]) -> String {
        let listing = collections
            .iter()
            .map(|c| {
                if c.description.is_empty() {
                    format!("- {}", c.name)
                } else {
                    format!("- {}: {}", c.name, c.description)
                }
            })
            .collect::<Vec<_>>()
            .join("\n");

        format!(
            r#"Select the collections that may contain information relevant to the question.
Reply with a JSON list of collection names only, for example: ["collection_a"]

QUESTION: {question}

COLLECTIONS:
{listing}"#,
            question = question,
            listing = listing
        )
    }

    fn format_list(items: &[String]) -> String {
        if items.is_empty() {
            return "(none)".to_string();
        }
        items
            .iter()
            .map(|q| format!("- {}", q))
            .collect::<Vec<_>>()
            .join("\n")
    }
}
