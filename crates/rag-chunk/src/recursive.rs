//! Recursive character splitter.
//!
//! Splits text by trying progressively smaller separators until every piece
//! fits within the character limit, then merges neighbouring pieces back into
//! chunks that overlap by a fixed number of characters.

use std::collections::VecDeque;

use rag_core::{ChunkConfig, ChunkData, Chunker, RagError, Result};

/// Default separators, coarsest first. The empty separator splits by character.
const DEFAULT_SEPARATORS: &[&str] = &["\n\n", "\n", " ", ""];

/// Recursive chunker that splits text by multiple separators.
///
/// Tries each separator in order until pieces are small enough:
/// 1. Double newline (paragraph breaks)
/// 2. Single newline
/// 3. Word boundaries (space)
/// 4. Character (last resort)
///
/// Output depends only on the input text and the config, so re-running the
/// splitter over unchanged files yields the same chunk sequence.
pub struct RecursiveChunker {
    separators: Vec<String>,
}

impl RecursiveChunker {
    /// Create a chunker with the default separator list.
    pub fn new() -> Self {
        Self {
            separators: DEFAULT_SEPARATORS.iter().map(|s| s.to_string()).collect(),
        }
    }

    /// Create a chunker with a custom separator list, coarsest first.
    pub fn with_separators<I, S>(separators: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            separators: separators.into_iter().map(Into::into).collect(),
        }
    }

    fn split_text(&self, text: &str, separators: &[String], config: &ChunkConfig) -> Vec<String> {
        // Pick the first separator present in the text.
        let mut separator = "";
        let mut remaining: &[String] = &[];
        for (i, sep) in separators.iter().enumerate() {
            if sep.is_empty() {
                separator = "";
                remaining = &[];
                break;
            }
            if text.contains(sep.as_str()) {
                separator = sep.as_str();
                remaining = &separators[i + 1..];
                break;
            }
        }

        let pieces = split_by_separator(text, separator);

        let mut chunks = Vec::new();
        let mut fitting: Vec<&str> = Vec::new();
        for piece in pieces {
            if char_len(piece) < config.chunk_size {
                fitting.push(piece);
                continue;
            }

            if !fitting.is_empty() {
                chunks.extend(merge_splits(&fitting, separator, config));
                fitting.clear();
            }

            if remaining.is_empty() {
                chunks.push(piece.to_string());
            } else {
                chunks.extend(self.split_text(piece, remaining, config));
            }
        }

        if !fitting.is_empty() {
            chunks.extend(merge_splits(&fitting, separator, config));
        }

        chunks
    }
}

impl Default for RecursiveChunker {
    fn default() -> Self {
        Self::new()
    }
}

impl Chunker for RecursiveChunker {
    fn chunk(&self, content: &str, config: &ChunkConfig) -> Result<Vec<ChunkData>> {
        if config.chunk_size == 0 {
            return Err(RagError::chunking("chunk_size must be positive"));
        }
        if config.chunk_overlap >= config.chunk_size {
            return Err(RagError::chunking(format!(
                "chunk_overlap {} must be smaller than chunk_size {}",
                config.chunk_overlap, config.chunk_size
            )));
        }

        if content.trim().is_empty() {
            return Ok(Vec::new());
        }

        Ok(self
            .split_text(content, &self.separators, config)
            .into_iter()
            .map(|content| ChunkData {
                char_count: char_len(&content),
                content,
            })
            .collect())
    }
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

/// Split text by a separator.
fn split_by_separator<'a>(text: &'a str, separator: &str) -> Vec<&'a str> {
    if separator.is_empty() {
        // Character-level split as last resort
        return text
            .char_indices()
            .map(|(i, c)| &text[i..i + c.len_utf8()])
            .collect();
    }

    text.split(separator).filter(|s| !s.is_empty()).collect()
}

/// Greedily merge small pieces into chunks, carrying a tail of up to
/// `chunk_overlap` characters into the next chunk.
fn merge_splits(splits: &[&str], separator: &str, config: &ChunkConfig) -> Vec<String> {
    let sep_len = char_len(separator);
    let mut docs = Vec::new();
    let mut current: VecDeque<&str> = VecDeque::new();
    let mut total = 0usize;

    for &piece in splits {
        let len = char_len(piece);
        let joiner = if current.is_empty() { 0 } else { sep_len };

        if total + len + joiner > config.chunk_size && !current.is_empty() {
            push_joined(&mut docs, &current, separator);

            while total > config.chunk_overlap
                || (total + len + if current.is_empty() { 0 } else { sep_len } > config.chunk_size
                    && total > 0)
            {
                let Some(front) = current.pop_front() else {
                    break;
                };
                total -= char_len(front) + if current.is_empty() { 0 } else { sep_len };
            }
        }

        let joiner = if current.is_empty() { 0 } else { sep_len };
        current.push_back(piece);
        total += len + joiner;
    }

    push_joined(&mut docs, &current, separator);
    docs
}

fn push_joined(docs: &mut Vec<String>, pieces: &VecDeque<&str>, separator: &str) {
    let joined = pieces.iter().copied().collect::<Vec<_>>().join(separator);
    let trimmed = joined.trim();
    if !trimmed.is_empty() {
        docs.push(trimmed.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(size: usize, overlap: usize) -> ChunkConfig {
        ChunkConfig {
            chunk_size: size,
            chunk_overlap: overlap,
        }
    }

    #[test]
    fn test_simple_chunk() {
        let chunker = RecursiveChunker::new();
        let text = "Hello world. This is a test.";
        let chunks = chunker.chunk(text, &ChunkConfig::default()).unwrap();

        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].content, text);
        assert_eq!(chunks[0].char_count, text.len());
    }

    #[test]
    fn test_paragraph_split() {
        let chunker = RecursiveChunker::new();
        let text = "First paragraph with several words.\n\nSecond paragraph with words.\n\nThird one.";
        let chunks = chunker.chunk(text, &config(38, 0)).unwrap();

        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0].content, "First paragraph with several words.");
        assert_eq!(chunks[2].content, "Third one.");
    }

    #[test]
    fn test_chunks_respect_size() {
        let chunker = RecursiveChunker::new();
        let text = "word ".repeat(500);
        let chunks = chunker.chunk(&text, &config(100, 10)).unwrap();

        assert!(chunks.len() > 1);
        for chunk in &chunks {
            assert!(chunk.char_count <= 100, "chunk too long: {}", chunk.char_count);
        }
    }

    #[test]
    fn test_overlap_carries_tail() {
        let chunker = RecursiveChunker::new();
        let text = "alpha beta gamma delta epsilon zeta eta theta iota kappa";
        let chunks = chunker.chunk(text, &config(20, 10)).unwrap();

        assert_eq!(chunks[0].content, "alpha beta gamma");
        assert!(chunks[1].content.starts_with("beta gamma"));
    }

    #[test]
    fn test_character_fallback() {
        let chunker = RecursiveChunker::new();
        let text = "x".repeat(25);
        let chunks = chunker.chunk(&text, &config(10, 0)).unwrap();

        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[2].content, "xxxxx");
    }

    #[test]
    fn test_deterministic() {
        let chunker = RecursiveChunker::new();
        let text = "Line one\nLine two\n\nParagraph two has more words in it.\n".repeat(40);
        let a = chunker.chunk(&text, &config(120, 20)).unwrap();
        let b = chunker.chunk(&text, &config(120, 20)).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_empty_content() {
        let chunker = RecursiveChunker::new();
        let chunks = chunker.chunk("  \n\n ", &ChunkConfig::default()).unwrap();
        assert!(chunks.is_empty());
    }

    #[test]
    fn test_invalid_overlap() {
        let chunker = RecursiveChunker::new();
        let err = chunker.chunk("text", &config(10, 10)).unwrap_err();
        assert_eq!(err.error_code(), "CHUNKING_ERROR");
    }
}
