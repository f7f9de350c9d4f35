//! Text chunking on sentence boundaries with position tracking

use unicode_segmentation::UnicodeSegmentation;

use crate::types::{Chunk, Document};

/// Text chunker with configurable size and overlap
pub struct TextChunker {
    /// Target chunk size in characters
    chunk_size: usize,
    /// Overlap between chunks
    overlap: usize,
    /// Minimum chunk size; shorter tails are dropped unless they are the whole document
    min_size: usize,
}

impl TextChunker {
    /// Create a new chunker
    pub fn new(chunk_size: usize, overlap: usize) -> Self {
        let chunk_size = chunk_size.max(1);
        Self {
            chunk_size,
            overlap: overlap.min(chunk_size / 2),
            min_size: 50.min(chunk_size),
        }
    }

    /// Split a document into chunks carrying its reference and metadata
    ///
    /// Each chunk gets `chunk_index`, `char_start` and `char_end` metadata fields. Sizes and
    /// offsets count `char`s of the trimmed text, not bytes.
    pub fn chunk_document(&self, doc: &Document) -> Vec<Chunk> {
        let text = doc.text.trim();
        if text.is_empty() {
            return Vec::new();
        }

        let mut spans: Vec<(String, usize, usize)> = Vec::new();
        let mut current_chunk = String::new();
        let mut current_len = 0usize;
        let mut current_start = 0usize;
        let mut char_pos = 0usize;

        for sentence in text.split_sentence_bounds() {
            for piece in self.split_oversized(sentence) {
                let piece_len = piece.chars().count();

                if !current_chunk.is_empty() && current_len + piece_len > self.chunk_size {
                    if current_chunk.trim().chars().count() >= self.min_size {
                        spans.push((current_chunk.trim().to_string(), current_start, char_pos));
                    }

                    // Start new chunk with overlap
                    let overlap_text = self.get_overlap_text(&current_chunk);
                    let overlap_len = overlap_text.chars().count();
                    current_start = char_pos - overlap_len;
                    current_chunk = overlap_text;
                    current_len = overlap_len;
                }

                current_chunk.push_str(piece);
                current_len += piece_len;
                char_pos += piece_len;
            }
        }

        // Short documents still yield one chunk
        if current_chunk.trim().chars().count() >= self.min_size || spans.is_empty() {
            spans.push((current_chunk.trim().to_string(), current_start, char_pos));
        }

        spans
            .into_iter()
            .enumerate()
            .map(|(index, (chunk_text, start, end))| {
                let mut metadata = doc.metadata.clone();
                metadata.insert("chunk_index".to_string(), index.into());
                metadata.insert("char_start".to_string(), start.into());
                metadata.insert("char_end".to_string(), end.into());
                Chunk {
                    text: chunk_text,
                    reference: doc.reference.clone(),
                    metadata,
                }
            })
            .collect()
    }

    /// Break a sentence longer than `chunk_size` characters on word boundaries
    fn split_oversized<'a>(&self, sentence: &'a str) -> Vec<&'a str> {
        if sentence.chars().count() <= self.chunk_size {
            return vec![sentence];
        }

        let mut pieces = Vec::new();
        let mut start = 0usize;
        let mut end = 0usize;
        let mut piece_chars = 0usize;
        for (offset, word) in sentence.split_word_bound_indices() {
            let word_chars = word.chars().count();
            if piece_chars + word_chars > self.chunk_size && end > start {
                pieces.push(&sentence[start..end]);
                start = end;
                piece_chars = 0;
            }
            end = offset + word.len();
            piece_chars += word_chars;
        }
        if start < sentence.len() {
            pieces.push(&sentence[start..]);
        }
        pieces
    }

    /// Get overlap text from the end of a chunk
    fn get_overlap_text(&self, text: &str) -> String {
        if self.overlap == 0 {
            return String::new();
        }
        let total = text.chars().count();
        if total <= self.overlap {
            return text.to_string();
        }

        let start = text
            .char_indices()
            .nth(total - self.overlap)
            .map(|(i, _)| i)
            .unwrap_or(0);
        let overlap_text = &text[start..];

        // Try to start at a sentence boundary
        if let Some(pos) = overlap_text.find(". ") {
            return overlap_text[pos + 2..].to_string();
        }

        // Fall back to word boundary
        if let Some(pos) = overlap_text.find(' ') {
            return overlap_text[pos + 1..].to_string();
        }

        overlap_text.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_text(sentences: usize) -> String {
        (0..sentences)
            .map(|i| format!("This is sentence number {} about vector databases. ", i))
            .collect()
    }

    #[test]
    fn test_short_document_is_one_chunk() {
        let doc = Document::new("Milvus is a vector database.", "intro.md");
        let chunks = TextChunker::new(1500, 100).chunk_document(&doc);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text, "Milvus is a vector database.");
        assert_eq!(chunks[0].reference, "intro.md");
        assert_eq!(chunks[0].metadata["chunk_index"], json!(0));
    }

    #[test]
    fn test_chunks_respect_size_and_keep_metadata() {
        let doc = Document::new(sample_text(40), "long.md").with_metadata("lang", "en");
        let chunker = TextChunker::new(300, 60);
        let chunks = chunker.chunk_document(&doc);

        assert!(chunks.len() > 1);
        for (i, chunk) in chunks.iter().enumerate() {
            let len = chunk.text.chars().count();
            assert!(len <= 300, "chunk {} has {} chars", i, len);
            assert_eq!(chunk.metadata["chunk_index"], json!(i));
            assert_eq!(chunk.metadata["lang"], json!("en"));
        }
    }

    #[test]
    fn test_consecutive_chunks_overlap() {
        let doc = Document::new(sample_text(20), "overlap.md");
        let chunks = TextChunker::new(200, 80).chunk_document(&doc);
        assert!(chunks.len() > 1);

        let first_end = chunks[0].metadata["char_end"].as_u64().unwrap();
        let second_start = chunks[1].metadata["char_start"].as_u64().unwrap();
        assert!(second_start < first_end);
    }

    #[test]
    fn test_oversized_sentence_is_split() {
        let doc = Document::new("word ".repeat(200), "words.txt");
        let chunks = TextChunker::new(100, 0).chunk_document(&doc);
        assert!(chunks.len() >= 9);
        assert!(chunks.iter().all(|c| c.text.chars().count() <= 100));
    }

    #[test]
    fn test_sizes_and_offsets_count_chars() {
        let text = "Äpfel und Birnen für Müller aus Köln. ".repeat(30);
        let doc = Document::new(text.clone(), "umlaut.md");
        let chunks = TextChunker::new(100, 20).chunk_document(&doc);

        assert!(chunks.len() > 1);
        assert!(chunks.iter().all(|c| c.text.chars().count() <= 100));
        // Byte lengths would exceed the limit for this text
        assert!(chunks.iter().any(|c| c.text.len() > c.text.chars().count()));

        let last = chunks.last().unwrap();
        assert_eq!(
            last.metadata["char_end"].as_u64().unwrap() as usize,
            text.trim().chars().count()
        );
    }

    #[test]
    fn test_empty_document_yields_nothing() {
        let doc = Document::new("   \n  ", "blank.txt");
        assert!(TextChunker::new(100, 10).chunk_document(&doc).is_empty());
    }
}
