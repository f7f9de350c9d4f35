//! Prompt construction and reply parsing for the LLM calls

pub mod parse;
pub mod prompt;

pub use parse::{parse_string_list, strip_reasoning};
pub use prompt::PromptBuilder;
