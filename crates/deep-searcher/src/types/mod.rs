//! Core types shared by providers, ingestion and the orchestrator

pub mod document;
pub mod outcome;
pub mod retrieval;

pub use document::{Chunk, Document};
pub use outcome::{QueryOutcome, QueryWarning};
pub use retrieval::{CollectionInfo, Metadata, MetadataFilter, RetrievalResult, VectorEntry};
