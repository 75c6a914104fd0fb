//! Fixed-window chunking with overlap.
//!
//! Offsets and lengths are counted in characters (Unicode scalar values), so a
//! window never splits a multi-byte character.

use std::iter;

use tracing::{debug, warn};

use crate::document::Chunk;
use crate::error::{RagError, Result};

/// Splits text into windows of `chunk_size` characters, each starting
/// `chunk_size - chunk_overlap` characters after the previous one.
///
/// Chunk `i` starts at `i * (chunk_size - chunk_overlap)` and the last chunk
/// ends exactly at the end of the text.
///
/// # Example
///
/// ```rust,ignore
/// use docrag::FixedSizeChunker;
///
/// let chunker = FixedSizeChunker::new(1000, 150)?;
/// let windows = chunker.split(&text);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedSizeChunker {
    chunk_size: usize,
    chunk_overlap: usize,
}

impl FixedSizeChunker {
    /// Create a new `FixedSizeChunker`.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Config`] unless `chunk_size > chunk_overlap`, which
    /// is what guarantees every step moves forward.
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Result<Self> {
        if chunk_overlap >= chunk_size {
            return Err(RagError::Config(format!(
                "chunk_overlap ({chunk_overlap}) must be less than chunk_size ({chunk_size})"
            )));
        }
        Ok(Self { chunk_size, chunk_overlap })
    }

    /// Maximum chunk length in characters.
    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Overlap between consecutive chunks in characters.
    pub fn chunk_overlap(&self) -> usize {
        self.chunk_overlap
    }

    /// Distance in characters between consecutive chunk starts.
    pub fn step(&self) -> usize {
        self.chunk_size - self.chunk_overlap
    }

    /// Split `text` into ordered, overlapping windows.
    ///
    /// Empty text yields an empty `Vec`.
    pub fn split(&self, text: &str) -> Vec<String> {
        if text.is_empty() {
            warn!("empty text provided for chunking");
            return Vec::new();
        }

        // Byte offset of every character start, plus the end of the text.
        let boundaries: Vec<usize> =
            text.char_indices().map(|(i, _)| i).chain(iter::once(text.len())).collect();
        let char_len = boundaries.len() - 1;
        let step = self.step();

        let mut chunks = Vec::with_capacity(char_len.div_ceil(step));
        let mut start = 0;
        while start < char_len {
            let end = (start + self.chunk_size).min(char_len);
            chunks.push(text[boundaries[start]..boundaries[end]].to_string());
            start += step;
        }

        debug!(chunk_count = chunks.len(), char_len, "created chunks");
        chunks
    }

    /// Split `text` and tag every window with its position and `source_id`.
    pub fn chunk(&self, text: &str, source_id: &str) -> Vec<Chunk> {
        self.split(text)
            .into_iter()
            .enumerate()
            .map(|(sequence_index, text)| Chunk {
                text,
                sequence_index,
                source_id: source_id.to_string(),
            })
            .collect()
    }
}

/// Split `text` with a one-off [`FixedSizeChunker`].
///
/// # Errors
///
/// Returns [`RagError::Config`] if `chunk_overlap >= chunk_size`.
pub fn chunk_text(text: &str, chunk_size: usize, chunk_overlap: usize) -> Result<Vec<String>> {
    Ok(FixedSizeChunker::new(chunk_size, chunk_overlap)?.split(text))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_non_advancing_configuration() {
        assert!(matches!(FixedSizeChunker::new(10, 10), Err(RagError::Config(_))));
        assert!(matches!(FixedSizeChunker::new(10, 11), Err(RagError::Config(_))));
        assert!(matches!(chunk_text("abc", 0, 0), Err(RagError::Config(_))));
        assert!(FixedSizeChunker::new(1, 0).is_ok());
    }

    #[test]
    fn empty_text_is_not_an_error() {
        assert_eq!(chunk_text("", 1000, 150).unwrap(), Vec::<String>::new());
    }

    #[test]
    fn windows_for_2200_chars() {
        let text: String = (0..2200).map(|i| char::from(b'a' + (i % 26) as u8)).collect();
        let chunks = chunk_text(&text, 1000, 150).unwrap();

        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0], text[0..1000]);
        assert_eq!(chunks[1], text[850..1850]);
        assert_eq!(chunks[2], text[1700..2200]);
        assert_eq!(chunks.iter().map(String::len).collect::<Vec<_>>(), vec![1000, 1000, 500]);
    }

    #[test]
    fn short_text_is_a_single_chunk() {
        assert_eq!(chunk_text("hello", 1000, 150).unwrap(), vec!["hello".to_string()]);
    }

    #[test]
    fn tail_window_inside_previous_is_still_emitted() {
        // Starts advance by 3 until they pass the end: 0, 3.
        let chunks = chunk_text("abcdef", 6, 3).unwrap();
        assert_eq!(chunks, vec!["abcdef".to_string(), "def".to_string()]);
    }

    #[test]
    fn counts_characters_not_bytes() {
        let chunks = chunk_text("héllo wörld", 4, 1).unwrap();
        assert_eq!(chunks, vec!["héll", "lo w", "wörl", "ld"]);
    }

    #[test]
    fn chunk_tags_sequence_and_source() {
        let chunker = FixedSizeChunker::new(4, 0).unwrap();
        let chunks = chunker.chunk("abcdefghij", "doc-7");
        assert_eq!(chunks.len(), 3);
        for (i, chunk) in chunks.iter().enumerate() {
            assert_eq!(chunk.sequence_index, i);
            assert_eq!(chunk.source_id, "doc-7");
        }
        assert_eq!(chunks[2].text, "ij");
    }
}
