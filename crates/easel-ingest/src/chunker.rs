//! Sliding-window text chunking.
//!
//! One chunker serves every source; profiles differ only in window size,
//! overlap, and minimum chunk length. The window advances by
//! `window_size - overlap`; when overlap is not smaller than the window,
//! the next start is clamped to the current window end so chunking always
//! terminates.

use once_cell::sync::Lazy;
use regex::Regex;

use easel_core::defaults::{
    DOCUMENT_CHUNK_MIN_CHARS, DOCUMENT_CHUNK_OVERLAP, DOCUMENT_CHUNK_SIZE,
    HANDWRITING_CHUNK_OVERLAP, HANDWRITING_CHUNK_SIZE,
};

static WHITESPACE_RUNS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

/// Collapse whitespace runs to single spaces and trim.
pub fn clean_text(text: &str) -> String {
    WHITESPACE_RUNS.replace_all(text.trim(), " ").into_owned()
}

/// Chunker configuration.
#[derive(Debug, Clone)]
pub struct ChunkerConfig {
    /// Window size in bytes (snapped to char boundaries).
    pub window_size: usize,
    /// Overlap carried into the next window.
    pub overlap: usize,
    /// Chunks whose trimmed text is not longer than this are dropped.
    pub min_chunk_chars: usize,
}

impl ChunkerConfig {
    /// Profile for PDF page text: 1000/200 with short-fragment filtering.
    pub fn document() -> Self {
        Self {
            window_size: DOCUMENT_CHUNK_SIZE,
            overlap: DOCUMENT_CHUNK_OVERLAP,
            min_chunk_chars: DOCUMENT_CHUNK_MIN_CHARS,
        }
    }

    /// Profile for OCR'd handwriting: 400/80, any non-empty chunk kept.
    pub fn handwriting() -> Self {
        Self {
            window_size: HANDWRITING_CHUNK_SIZE,
            overlap: HANDWRITING_CHUNK_OVERLAP,
            min_chunk_chars: 0,
        }
    }
}

/// One produced chunk. Spans are byte offsets into the input text.
#[derive(Debug, Clone, PartialEq)]
pub struct TextChunk {
    pub index: i32,
    pub text: String,
    pub char_start: usize,
    pub char_end: usize,
}

/// Sliding-window chunker.
#[derive(Debug, Clone)]
pub struct SlidingWindowChunker {
    config: ChunkerConfig,
}

/// Snap a byte position back to the nearest char boundary.
fn find_char_boundary_before(text: &str, mut pos: usize) -> usize {
    while pos > 0 && !text.is_char_boundary(pos) {
        pos -= 1;
    }
    pos
}

/// Snap a byte position forward to the nearest char boundary.
fn find_char_boundary_after(text: &str, mut pos: usize) -> usize {
    while pos < text.len() && !text.is_char_boundary(pos) {
        pos += 1;
    }
    pos
}

impl SlidingWindowChunker {
    pub fn new(config: ChunkerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ChunkerConfig {
        &self.config
    }

    /// Chunk text into overlapping windows. Surviving chunks are indexed
    /// contiguously from 0 even when short fragments were dropped.
    pub fn chunk(&self, text: &str) -> Vec<TextChunk> {
        if text.trim().is_empty() {
            return vec![];
        }

        let mut chunks = Vec::new();
        let mut index: i32 = 0;
        let mut start = 0;

        while start < text.len() {
            let mut end = (start + self.config.window_size).min(text.len());
            end = find_char_boundary_before(text, end);
            if end <= start {
                break;
            }

            let window = &text[start..end];
            if window.trim().len() > self.config.min_chunk_chars {
                chunks.push(TextChunk {
                    index,
                    text: window.to_string(),
                    char_start: start,
                    char_end: end,
                });
                index += 1;
            }

            if end >= text.len() {
                break;
            }

            // When overlap swallows the whole window, clamp the next start
            // to the window end so the scan always advances.
            let next_start = if self.config.overlap >= self.config.window_size {
                end
            } else {
                start + (self.config.window_size - self.config.overlap)
            };
            start = find_char_boundary_after(text, next_start.max(start + 1));
        }

        chunks
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunker(window: usize, overlap: usize, min: usize) -> SlidingWindowChunker {
        SlidingWindowChunker::new(ChunkerConfig {
            window_size: window,
            overlap,
            min_chunk_chars: min,
        })
    }

    #[test]
    fn test_clean_text_collapses_whitespace() {
        assert_eq!(clean_text("  a\t b\n\nc  "), "a b c");
        assert_eq!(clean_text("\n \t"), "");
    }

    #[test]
    fn test_empty_input_yields_no_chunks() {
        assert!(chunker(1000, 200, 50).chunk("").is_empty());
        assert!(chunker(1000, 200, 50).chunk("   \n  ").is_empty());
    }

    #[test]
    fn test_short_text_single_chunk() {
        let chunks = chunker(1000, 200, 0).chunk("just a line");
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].index, 0);
        assert_eq!(chunks[0].char_start, 0);
        assert_eq!(chunks[0].char_end, 11);
    }

    #[test]
    fn test_document_profile_window_starts() {
        // 2300 chars at window 1000 / overlap 200: starts at 0, 800, 1600.
        let text = "x".repeat(2300);
        let chunks = chunker(1000, 200, 50).chunk(&text);
        assert_eq!(chunks.len(), 3);
        assert_eq!(
            chunks.iter().map(|c| c.char_start).collect::<Vec<_>>(),
            vec![0, 800, 1600]
        );
        assert_eq!(chunks[0].char_end, 1000);
        assert_eq!(chunks[2].char_end, 2300);
        assert_eq!(chunks[2].text.len(), 700);
    }

    #[test]
    fn test_adjacent_chunks_overlap() {
        let text: String = ('a'..='z').cycle().take(2000).collect();
        let chunks = chunker(1000, 200, 0).chunk(&text);
        let first_tail = &chunks[0].text[800..];
        let second_head = &chunks[1].text[..200];
        assert_eq!(first_tail, second_head);
    }

    #[test]
    fn test_min_chars_filter_keeps_indices_contiguous() {
        // Window of padding, then a run short enough to be filtered.
        let text = format!("{}{}", "a".repeat(100), "  b ");
        let chunks = chunker(100, 0, 10).chunk(&text);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].index, 0);

        // Without the filter the trailing fragment survives as index 1.
        let chunks = chunker(100, 0, 0).chunk(&text);
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[1].index, 1);
    }

    #[test]
    fn test_overlap_equal_to_window_terminates() {
        let text = "y".repeat(500);
        let chunks = chunker(100, 100, 0).chunk(&text);
        // Next start clamps to window end: contiguous, non-overlapping.
        assert_eq!(chunks.len(), 5);
        assert_eq!(chunks[1].char_start, 100);
        assert_eq!(chunks[4].char_end, 500);
    }

    #[test]
    fn test_overlap_greater_than_window_terminates() {
        let text = "z".repeat(300);
        let chunks = chunker(100, 250, 0).chunk(&text);
        assert_eq!(chunks.len(), 3);
    }

    #[test]
    fn test_multibyte_boundaries_respected() {
        let text = "é".repeat(600); // 2 bytes per char
        let chunks = chunker(1001, 200, 0).chunk(&text);
        for c in &chunks {
            assert!(text.is_char_boundary(c.char_start));
            assert!(text.is_char_boundary(c.char_end));
            assert!(!c.text.is_empty());
        }
    }

    #[test]
    fn test_handwriting_profile_values() {
        let config = ChunkerConfig::handwriting();
        assert_eq!(config.window_size, 400);
        assert_eq!(config.overlap, 80);
        assert_eq!(config.min_chunk_chars, 0);
    }
}
