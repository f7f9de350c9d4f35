//! PDF text extraction and the PDF-aware file loader

use serde::Deserialize;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::Path;

use super::loader::{file_metadata, read_utf8, FileLoader};
use crate::config::ProviderOptions;
use crate::error::{Error, Result};
use crate::providers::parse_options;
use crate::types::Document;

/// Extract the text layer of an in-memory PDF
///
/// `pdf-extract` panics on some malformed files, so the panic is caught and reported as a
/// load error for `source`. Blocking; call from a blocking context.
pub(crate) fn extract_pdf_text(bytes: &[u8], source: &str) -> Result<String> {
    let extracted = catch_unwind(AssertUnwindSafe(|| pdf_extract::extract_text_from_mem(bytes)))
        .map_err(|_| Error::load(source, "PDF parser panicked"))?
        .map_err(|e| Error::load(source, format!("PDF extraction failed: {}", e)))?;

    let text = extracted.trim().to_string();
    if text.is_empty() {
        return Err(Error::load(source, "PDF has no extractable text"));
    }
    Ok(text)
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct PdfLoaderOptions {}

/// Loads `.pdf` files through `pdf-extract`, plus `.md` and `.txt` as plain text
pub struct PdfLoader;

impl PdfLoader {
    pub fn new() -> Self {
        Self
    }

    /// Construct from provider options; none are accepted
    pub fn from_options(provider: &str, options: &ProviderOptions) -> Result<Self> {
        let _: PdfLoaderOptions = parse_options(provider, options)?;
        Ok(Self)
    }
}

impl Default for PdfLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl FileLoader for PdfLoader {
    fn load_file(&self, path: &Path) -> Result<Vec<Document>> {
        let reference = path.display().to_string();
        let is_pdf = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.eq_ignore_ascii_case("pdf"))
            .unwrap_or(false);

        let text = if is_pdf {
            let bytes = std::fs::read(path).map_err(|e| Error::load(&reference, e.to_string()))?;
            extract_pdf_text(&bytes, &reference)?
        } else {
            read_utf8(path)?
        };

        Ok(vec![Document {
            text,
            reference,
            metadata: file_metadata(path),
        }])
    }

    fn supported_file_types(&self) -> Vec<String> {
        vec!["pdf".to_string(), "md".to_string(), "txt".to_string()]
    }

    fn name(&self) -> &str {
        "PdfLoader"
    }
}

/// Build a one-page PDF showing `text` in Courier
#[cfg(test)]
pub(crate) fn sample_pdf(text: &str) -> Vec<u8> {
    use lopdf::content::{Content, Operation};
    use lopdf::{dictionary, Document as PdfDocument, Object, Stream};

    let mut doc = PdfDocument::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Courier",
        "Encoding" => "WinAnsiEncoding",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! { "F1" => font_id },
    });
    let content = Content {
        operations: vec![
            Operation::new("BT", vec![]),
            Operation::new("Tf", vec!["F1".into(), 12.into()]),
            Operation::new("Td", vec![72.into(), 720.into()]),
            Operation::new("Tj", vec![Object::string_literal(text)]),
            Operation::new("ET", vec![]),
        ],
    };
    let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));
    let page_id = doc.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => pages_id,
        "Contents" => content_id,
        "Resources" => resources_id,
    });
    let pages = dictionary! {
        "Type" => "Pages",
        "Kids" => vec![page_id.into()],
        "Count" => 1,
        "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
    };
    doc.objects.insert(pages_id, Object::Dictionary(pages));
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut bytes = Vec::new();
    doc.save_to(&mut bytes).unwrap();
    bytes
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::options;
    use serde_json::json;
    use tempfile::TempDir;

    #[test]
    fn test_extract_pdf_text() {
        let bytes = sample_pdf("Milvus is a vector database");
        let text = extract_pdf_text(&bytes, "milvus.pdf").unwrap();
        assert!(text.contains("Milvus"), "extracted: {:?}", text);
    }

    #[test]
    fn test_garbage_is_a_load_error() {
        let result = extract_pdf_text(b"not a pdf at all", "broken.pdf");
        assert!(matches!(result, Err(Error::Load { .. })));
    }

    #[test]
    fn test_pdf_loader_reads_pdf_and_text() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("milvus.pdf"), sample_pdf("Milvus stores embeddings")).unwrap();
        std::fs::write(dir.path().join("notes.md"), "# Notes\nQdrant too").unwrap();
        std::fs::write(dir.path().join("image.png"), [0u8, 1, 2]).unwrap();

        let loader = PdfLoader::new();
        let docs = loader.load_directory(dir.path()).unwrap();
        assert_eq!(docs.len(), 2);

        let pdf = docs.iter().find(|d| d.reference.ends_with("milvus.pdf")).unwrap();
        assert!(pdf.text.contains("Milvus"));
        assert_eq!(pdf.metadata["file_name"], json!("milvus.pdf"));
        assert!(docs.iter().any(|d| d.text.contains("Qdrant")));
    }

    #[test]
    fn test_rejects_unknown_options() {
        let result = PdfLoader::from_options("PdfLoader", &options([("ocr", json!(true))]));
        assert!(matches!(result, Err(Error::ProviderInit { .. })));
    }
}
