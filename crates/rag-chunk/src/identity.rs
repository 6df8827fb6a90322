//! Deterministic chunk identity shared by the keyword and vector indexes.

use rag_core::{Chunk, ChunkId};

/// A splitter output not yet assigned an id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplitPiece {
    pub source: String,
    pub page: u32,
    pub text: String,
}

/// Render the id of the `index`-th chunk of `(source, page)`.
pub fn chunk_id(source: &str, page: u32, index: usize) -> ChunkId {
    ChunkId::new(format!("{}:{}:{}", source, page, index))
}

/// Assign ids to an ordered piece sequence.
///
/// The index counts consecutive pieces sharing `(source, page)` and restarts
/// at zero whenever either changes. The result depends only on order and
/// metadata, so both indexing pipelines agree on every id.
pub fn assign_chunk_ids<I>(pieces: I) -> Vec<Chunk>
where
    I: IntoIterator<Item = SplitPiece>,
{
    let mut chunks = Vec::new();
    let mut last_key: Option<(String, u32)> = None;
    let mut index = 0usize;

    for piece in pieces {
        let same_page = matches!(
            &last_key,
            Some((source, page)) if *source == piece.source && *page == piece.page
        );
        if same_page {
            index += 1;
        } else {
            index = 0;
            last_key = Some((piece.source.clone(), piece.page));
        }

        chunks.push(Chunk {
            id: chunk_id(&piece.source, piece.page, index),
            source: piece.source,
            page: piece.page,
            text: piece.text,
        });
    }

    chunks
}
