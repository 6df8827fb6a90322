//! Numbered context blocks for generation prompts.

use rag_core::FusedResult;

/// Default per-chunk character cap.
pub const DEFAULT_MAX_CHUNK_CHARS: usize = 1200;

/// Renders the top fused hits as a citable context block.
#[derive(Debug, Clone)]
pub struct ContextAssembler {
    max_chunk_chars: usize,
}

impl Default for ContextAssembler {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_CHUNK_CHARS)
    }
}

impl ContextAssembler {
    pub fn new(max_chunk_chars: usize) -> Self {
        Self { max_chunk_chars }
    }

    /// Render the first `limit` hits.
    ///
    /// Entry `[i]` in the returned text corresponds to `chosen[i - 1]`, so
    /// the bracket indices a model cites map straight back to citations.
    pub fn build(&self, hits: &[FusedResult], limit: usize) -> (String, Vec<FusedResult>) {
        let chosen: Vec<FusedResult> = hits.iter().take(limit).cloned().collect();

        let entries: Vec<String> = chosen
            .iter()
            .enumerate()
            .map(|(i, hit)| {
                format!(
                    "[{}] source={} page={} chunk={}\n{}\n",
                    i + 1,
                    hit.source,
                    hit.page,
                    hit.chunk_id,
                    truncate_chars(&hit.text, self.max_chunk_chars)
                )
            })
            .collect();

        (entries.join("\n"), chosen)
    }
}

/// Truncate at a character boundary.
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((byte, _)) => &text[..byte],
        None => text,
    }
}
