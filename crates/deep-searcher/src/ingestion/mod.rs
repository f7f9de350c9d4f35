//! Document ingestion: loading, crawling, chunking and storing

mod chunker;
mod crawler;
mod loader;
mod pdf;
mod pipeline;

pub use chunker::TextChunker;
pub use crawler::{HtmlCrawler, WebCrawler};
pub use loader::{FileLoader, JsonFileLoader, TextLoader};
pub use pdf::PdfLoader;
pub use pipeline::{IngestPipeline, LoadReport};
