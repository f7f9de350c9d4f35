//! Local file loaders
//!
//! A [`FileLoader`] turns a file or directory into [`Document`]s. Directories are walked
//! recursively and filtered by the loader's supported extensions.

use serde::Deserialize;
use std::path::Path;
use walkdir::WalkDir;

use crate::config::ProviderOptions;
use crate::error::{Error, Result};
use crate::providers::parse_options;
use crate::types::{Document, Metadata};

/// Trait for reading local files into documents
pub trait FileLoader: Send + Sync {
    /// Load one file
    fn load_file(&self, path: &Path) -> Result<Vec<Document>>;

    /// Extensions (without the dot) handled when walking a directory
    fn supported_file_types(&self) -> Vec<String>;

    /// Load every supported file below `dir`
    ///
    /// Files that fail to load are logged and skipped.
    fn load_directory(&self, dir: &Path) -> Result<Vec<Document>> {
        let supported = self.supported_file_types();
        let mut documents = Vec::new();

        for entry in WalkDir::new(dir)
            .follow_links(true)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
        {
            let path = entry.path();
            let matches = path
                .extension()
                .and_then(|e| e.to_str())
                .map(|ext| supported.iter().any(|s| s.eq_ignore_ascii_case(ext)))
                .unwrap_or(false);
            if !matches {
                continue;
            }

            match self.load_file(path) {
                Ok(docs) => documents.extend(docs),
                Err(e) => tracing::warn!("Skipping {}: {}", path.display(), e),
            }
        }

        Ok(documents)
    }

    /// Provider name for logging
    fn name(&self) -> &str;
}

pub(super) fn read_utf8(path: &Path) -> Result<String> {
    let bytes = std::fs::read(path)
        .map_err(|e| Error::load(path.display().to_string(), e.to_string()))?;
    String::from_utf8(bytes)
        .map_err(|_| Error::load(path.display().to_string(), "file is not valid UTF-8"))
}

pub(super) fn file_metadata(path: &Path) -> Metadata {
    let mut metadata = Metadata::new();
    if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
        metadata.insert("file_name".to_string(), name.into());
    }
    metadata
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct TextLoaderOptions {
    #[serde(default = "default_text_extensions")]
    extensions: Vec<String>,
}

fn default_text_extensions() -> Vec<String> {
    vec!["txt".to_string(), "md".to_string()]
}

/// Plain text and markdown loader; one document per file
pub struct TextLoader {
    extensions: Vec<String>,
}

impl TextLoader {
    /// Loader for `.txt` and `.md`
    pub fn new() -> Self {
        Self {
            extensions: default_text_extensions(),
        }
    }

    /// Construct from provider options: `extensions`
    pub fn from_options(provider: &str, options: &ProviderOptions) -> Result<Self> {
        let opts: TextLoaderOptions = parse_options(provider, options)?;
        Ok(Self {
            extensions: opts.extensions,
        })
    }
}

impl Default for TextLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl FileLoader for TextLoader {
    fn load_file(&self, path: &Path) -> Result<Vec<Document>> {
        let text = read_utf8(path)?;
        Ok(vec![Document {
            text,
            reference: path.display().to_string(),
            metadata: file_metadata(path),
        }])
    }

    fn supported_file_types(&self) -> Vec<String> {
        self.extensions.clone()
    }

    fn name(&self) -> &str {
        "TextLoader"
    }
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct JsonLoaderOptions {
    #[serde(default = "default_text_key")]
    text_key: String,
}

fn default_text_key() -> String {
    "text".to_string()
}

/// JSON Lines loader; one document per line
///
/// The `text_key` field becomes the document text, the remaining fields its metadata. A
/// `.json` file holding an array of objects is accepted as well.
pub struct JsonFileLoader {
    text_key: String,
}

impl JsonFileLoader {
    /// Loader reading `text_key` from each record
    pub fn new(text_key: impl Into<String>) -> Self {
        Self {
            text_key: text_key.into(),
        }
    }

    /// Construct from provider options: `text_key`
    pub fn from_options(provider: &str, options: &ProviderOptions) -> Result<Self> {
        let opts: JsonLoaderOptions = parse_options(provider, options)?;
        Ok(Self::new(opts.text_key))
    }

    fn record_to_document(&self, path: &Path, line: usize, record: serde_json::Value) -> Result<Document> {
        let reference = path.display().to_string();
        let serde_json::Value::Object(mut fields) = record else {
            return Err(Error::load(&reference, format!("record {} is not an object", line)));
        };

        let text = match fields.remove(&self.text_key) {
            Some(serde_json::Value::String(text)) => text,
            Some(_) => {
                return Err(Error::load(
                    &reference,
                    format!("record {}: '{}' is not a string", line, self.text_key),
                ))
            }
            None => {
                return Err(Error::load(
                    &reference,
                    format!("record {}: missing '{}'", line, self.text_key),
                ))
            }
        };

        let mut metadata = file_metadata(path);
        metadata.insert("line".to_string(), line.into());
        metadata.extend(fields);

        Ok(Document {
            text,
            reference,
            metadata,
        })
    }
}

impl FileLoader for JsonFileLoader {
    fn load_file(&self, path: &Path) -> Result<Vec<Document>> {
        let content = read_utf8(path)?;
        let trimmed = content.trim_start();

        if trimmed.starts_with('[') {
            let records: Vec<serde_json::Value> = serde_json::from_str(trimmed)
                .map_err(|e| Error::load(path.display().to_string(), e.to_string()))?;
            return records
                .into_iter()
                .enumerate()
                .map(|(i, record)| self.record_to_document(path, i + 1, record))
                .collect();
        }

        content
            .lines()
            .enumerate()
            .filter(|(_, line)| !line.trim().is_empty())
            .map(|(i, line)| {
                let record = serde_json::from_str(line).map_err(|e| {
                    Error::load(path.display().to_string(), format!("line {}: {}", i + 1, e))
                })?;
                self.record_to_document(path, i + 1, record)
            })
            .collect()
    }

    fn supported_file_types(&self) -> Vec<String> {
        vec!["jsonl".to_string(), "json".to_string()]
    }

    fn name(&self) -> &str {
        "JsonFileLoader"
    }
}
