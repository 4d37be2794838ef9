//! Overlapping fixed-size windows over normalized text

use crate::error::ExtractorError;

/// One window of the document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    /// Position in document order, starting at 0
    pub index: usize,
    /// First character (char offset, inclusive)
    pub start: usize,
    /// Last character (char offset, exclusive)
    pub end: usize,
    /// Window text
    pub text: String,
}

/// Splits text into windows of `chunk_size` characters sharing `overlap` characters
///
/// Offsets are counted in characters, so a window never splits a code point.
#[derive(Debug, Clone, Copy)]
pub struct TextChunker {
    chunk_size: usize,
    overlap: usize,
}

impl TextChunker {
    /// Create a new text chunker
    pub fn new(chunk_size: usize, overlap: usize) -> Result<Self, ExtractorError> {
        if chunk_size == 0 {
            return Err(ExtractorError::Config(
                "chunk_size must be greater than 0".to_string(),
            ));
        }
        if overlap >= chunk_size {
            return Err(ExtractorError::Config(format!(
                "overlap ({}) must be smaller than chunk_size ({})",
                overlap, chunk_size
            )));
        }
        Ok(Self { chunk_size, overlap })
    }

    /// Window size in characters
    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Shared characters between consecutive windows
    pub fn overlap(&self) -> usize {
        self.overlap
    }

    /// Split text into chunks
    ///
    /// # Examples
    ///
    /// ```
    /// use normaudit_extractor::TextChunker;
    ///
    /// let chunker = TextChunker::new(4, 1).unwrap();
    /// let texts: Vec<String> = chunker.chunk("abcdefghij").into_iter().map(|c| c.text).collect();
    /// assert_eq!(texts, vec!["abcd", "defg", "ghij"]);
    /// ```
    pub fn chunk(&self, text: &str) -> Vec<Chunk> {
        // Byte offset of every char plus the end of the text
        let bounds: Vec<usize> = text
            .char_indices()
            .map(|(i, _)| i)
            .chain(std::iter::once(text.len()))
            .collect();
        let len = bounds.len() - 1;

        let mut chunks = Vec::new();
        if len == 0 {
            return chunks;
        }

        let mut start = 0;
        loop {
            let end = (start + self.chunk_size).min(len);
            chunks.push(Chunk {
                index: chunks.len(),
                start,
                end,
                text: text[bounds[start]..bounds[end]].to_string(),
            });
            if end == len {
                break;
            }
            start = end - self.overlap;
        }

        chunks
    }
}
