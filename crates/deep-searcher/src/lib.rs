//! deep-searcher: iterative retrieval-augmented question answering
//!
//! Providers for embeddings, chat models, vector stores, file loading and web crawling are
//! selected by name in a [`ProviderConfig`] and constructed on demand by a
//! [`ProviderRegistry`]. The query agent embeds the question, searches the routed
//! collections, asks the model whether the evidence is sufficient, and repeats with
//! follow-up queries until it is or the iteration cap is reached.
//!
//! ```no_run
//! use deep_searcher::{DeepSearcher, ProviderConfig};
//! use std::path::PathBuf;
//!
//! # async fn run() -> deep_searcher::Result<()> {
//! let searcher = DeepSearcher::from_config(ProviderConfig::default())?;
//! searcher
//!     .load_from_local_files(&[PathBuf::from("docs/")], Some("docs"), Some("Project docs"), false)
//!     .await?;
//! let outcome = searcher.query("How is the index built?", Some(3)).await?;
//! println!("{} ({} tokens)", outcome.answer, outcome.consumed_tokens);
//! # Ok(())
//! # }
//! ```

pub mod agent;
pub mod config;
pub mod error;
pub mod generation;
pub mod ingestion;
pub mod providers;
pub mod registry;
pub mod searcher;
pub mod server;
pub mod types;

pub use agent::{DeepSearch, NO_RESULT_ANSWER};
pub use config::{Capability, CallPolicy, LoadSettings, ProviderConfig, ProviderOptions, QuerySettings};
pub use error::{Error, Result};
pub use ingestion::LoadReport;
pub use registry::{init_config, ProviderRegistry};
pub use searcher::DeepSearcher;
pub use types::{
    CollectionInfo, Document, MetadataFilter, QueryOutcome, QueryWarning, RetrievalResult,
};
