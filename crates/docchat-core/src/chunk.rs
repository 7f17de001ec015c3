//! Fixed-budget, overlapping text chunker.
//!
//! Splits a [`Document`]'s text into [`Chunk`]s of at most `max_chars`
//! characters, where consecutive chunks share roughly `overlap_chars`
//! characters so that a sentence cut at one boundary still appears whole in
//! the neighbouring chunk.
//!
//! # Algorithm
//!
//! 1. Slide a window of `max_chars` characters over the text.
//! 2. If the window ends mid-text, pull its end back to the last whitespace
//!    in the second half of the window so words are not cut in two.
//! 3. Start the next window `overlap_chars` before the previous end, snapped
//!    to a word start.
//! 4. Trim each piece; whitespace-only pieces are dropped.
//!
//! Budgets count `char`s, never bytes, so multi-byte UTF-8 text is never
//! split inside a code point.
//!
//! # Example
//!
//! ```rust
//! use docchat_core::chunk::{chunk_document, ChunkingParams};
//! use docchat_core::models::{Document, Metadata};
//!
//! let doc = Document::new("sky.txt", "The sky is blue.", Metadata::new());
//! let chunks = chunk_document(&doc, &ChunkingParams::default());
//! assert_eq!(chunks.len(), 1);
//! assert_eq!(chunks[0].text, "The sky is blue.");
//! ```

use uuid::Uuid;

use crate::models::{sha256_hex, Chunk, Document};

/// Chunk sizing, decoupled from application config.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkingParams {
    /// Maximum characters per chunk.
    pub max_chars: usize,
    /// Characters shared between consecutive chunks. Must be `< max_chars`.
    pub overlap_chars: usize,
}

impl Default for ChunkingParams {
    fn default() -> Self {
        Self {
            max_chars: 2048,
            overlap_chars: 280,
        }
    }
}

/// Split a document into chunks with contiguous indices starting at 0.
///
/// Every chunk inherits the document's metadata. A document whose text is
/// empty or whitespace-only yields no chunks.
pub fn chunk_document(doc: &Document, params: &ChunkingParams) -> Vec<Chunk> {
    split_text(&doc.text, params)
        .into_iter()
        .enumerate()
        .map(|(i, piece)| Chunk {
            id: Uuid::new_v4().to_string(),
            document_id: doc.id.clone(),
            chunk_index: i as i64,
            text: piece.to_string(),
            hash: sha256_hex(piece),
            metadata: doc.metadata.clone(),
        })
        .collect()
}

/// Split text into trimmed, overlapping pieces of at most `max_chars` chars.
pub fn split_text<'a>(text: &'a str, params: &ChunkingParams) -> Vec<&'a str> {
    let max_chars = params.max_chars.max(1);
    let overlap = params.overlap_chars.min(max_chars - 1);

    // Byte offset of every char, plus the end of the string.
    let mut offsets: Vec<usize> = text.char_indices().map(|(i, _)| i).collect();
    let n = offsets.len();
    offsets.push(text.len());
    let chars: Vec<char> = text.chars().collect();

    let mut pieces = Vec::new();
    let mut start = 0usize;

    while start < n {
        let mut end = (start + max_chars).min(n);

        if end < n {
            let floor = start + max_chars / 2;
            if let Some(ws) = (floor..end).rev().find(|&i| chars[i].is_whitespace()) {
                end = ws + 1;
            }
        }

        let piece = text[offsets[start]..offsets[end]].trim();
        if !piece.is_empty() {
            pieces.push(piece);
        }

        if end >= n {
            break;
        }

        let mut next = end.saturating_sub(overlap).max(start + 1);
        // Snap to a word start: forward inside the overlap, else back to the
        // start of the word the overlap begins in. Without overlap the next
        // chunk starts exactly at `end`.
        if next < end {
            if let Some(i) = (next..end).find(|&i| chars[i - 1].is_whitespace()) {
                next = i;
            } else if let Some(i) = (start + 1..next).rev().find(|&i| chars[i - 1].is_whitespace())
            {
                next = i;
            }
        }
        start = next;
    }

    pieces
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Metadata;

    fn params(max_chars: usize, overlap_chars: usize) -> ChunkingParams {
        ChunkingParams {
            max_chars,
            overlap_chars,
        }
    }

    #[test]
    fn test_small_text_single_chunk() {
        let doc = Document::new("doc1", "Hello, world!", Metadata::new());
        let chunks = chunk_document(&doc, &params(700, 70));
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].chunk_index, 0);
        assert_eq!(chunks[0].text, "Hello, world!");
        assert_eq!(chunks[0].document_id, "doc1");
    }

    #[test]
    fn test_empty_text_yields_nothing() {
        let doc = Document::new("doc1", "  \n\n ", Metadata::new());
        assert!(chunk_document(&doc, &params(700, 70)).is_empty());
    }

    #[test]
    fn test_pieces_respect_budget() {
        let text = "word ".repeat(200);
        for piece in split_text(&text, &params(50, 10)) {
            assert!(piece.chars().count() <= 50, "piece too long: {}", piece);
            assert!(!piece.starts_with(' ') && !piece.ends_with(' '));
        }
    }

    #[test]
    fn test_consecutive_chunks_overlap() {
        let text = (0..40)
            .map(|i| format!("w{:02}", i))
            .collect::<Vec<_>>()
            .join(" ");
        let pieces = split_text(&text, &params(30, 10));
        assert!(pieces.len() > 2);
        for pair in pieces.windows(2) {
            let last_word = pair[0].split_whitespace().last().unwrap();
            assert!(
                pair[1].contains(last_word),
                "expected {:?} to repeat {:?}",
                pair[1],
                last_word
            );
        }
    }

    #[test]
    fn test_words_not_cut() {
        let text = "alpha beta gamma delta epsilon zeta eta theta iota kappa";
        for piece in split_text(text, &params(20, 5)) {
            for word in piece.split_whitespace() {
                assert!(text.split_whitespace().any(|w| w == word), "cut word {}", word);
            }
        }
    }

    #[test]
    fn test_zero_overlap_never_repeats_a_word() {
        let text = "alpha beta gamma delta epsilon zeta eta theta iota kappa";
        let pieces = split_text(text, &params(20, 0));
        assert!(pieces.len() > 1);
        let words: Vec<&str> = pieces.iter().flat_map(|p| p.split_whitespace()).collect();
        assert_eq!(words, text.split_whitespace().collect::<Vec<_>>());
    }

    #[test]
    fn test_chunk_indices_contiguous_and_metadata_copied() {
        let mut metadata = Metadata::new();
        metadata.insert("file_name".to_string(), "doc1.txt".to_string());
        let text = (0..50)
            .map(|i| format!("Sentence number {}.", i))
            .collect::<Vec<_>>()
            .join(" ");
        let doc = Document::new("doc1.txt", text, metadata);
        let chunks = chunk_document(&doc, &params(60, 15));
        assert!(chunks.len() > 1);
        for (i, c) in chunks.iter().enumerate() {
            assert_eq!(c.chunk_index, i as i64);
            assert_eq!(c.metadata.get("file_name").unwrap(), "doc1.txt");
        }
    }

    #[test]
    fn test_multibyte_utf8_chars() {
        let text = "┌──────────────────┐ │ Hello wörld │ └──────────────────┘";
        let pieces = split_text(text, &params(7, 2));
        assert!(!pieces.is_empty());
        for p in pieces {
            assert!(p.chars().count() <= 7);
        }
    }

    #[test]
    fn test_unbroken_text_hard_splits() {
        let text = "x".repeat(95);
        let pieces = split_text(&text, &params(40, 10));
        assert_eq!(pieces[0].len(), 40);
        assert!(pieces.last().unwrap().len() <= 40);
        // Windows start at 0, 30, 60 and the last reaches the end.
        assert_eq!(pieces.len(), 3);
    }

    #[test]
    fn test_deterministic() {
        let doc = Document::new("doc1", "Alpha beta gamma delta ".repeat(20), Metadata::new());
        let c1 = chunk_document(&doc, &params(40, 8));
        let c2 = chunk_document(&doc, &params(40, 8));
        assert_eq!(c1.len(), c2.len());
        for (a, b) in c1.iter().zip(c2.iter()) {
            assert_eq!(a.text, b.text);
            assert_eq!(a.hash, b.hash);
            assert_eq!(a.chunk_index, b.chunk_index);
        }
    }
}
