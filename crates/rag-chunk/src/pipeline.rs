//! Incremental indexing: split, identify, and insert only new chunks.

use tracing::info;

use rag_core::{Chunk, ChunkConfig, ChunkIndex, Chunker, Document, Result};

use crate::identity::{assign_chunk_ids, SplitPiece};

/// Outcome of indexing into one store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexReport {
    pub index: &'static str,
    pub total: usize,
    pub added: usize,
    pub skipped: usize,
}

/// Turns documents into identified chunks and feeds them to indexes.
pub struct Indexer<C> {
    chunker: C,
    config: ChunkConfig,
}

impl<C: Chunker> Indexer<C> {
    pub fn new(chunker: C, config: ChunkConfig) -> Self {
        Self { chunker, config }
    }

    /// Split every document and assign deterministic ids.
    pub fn split_documents(&self, docs: &[Document]) -> Result<Vec<Chunk>> {
        let mut pieces = Vec::new();
        for doc in docs {
            for data in self.chunker.chunk(&doc.text, &self.config)? {
                pieces.push(SplitPiece {
                    source: doc.source.clone(),
                    page: doc.page,
                    text: data.content,
                });
            }
        }
        Ok(assign_chunk_ids(pieces))
    }

    /// Insert the chunks `index` does not already hold.
    pub async fn index_into(&self, chunks: &[Chunk], index: &dyn ChunkIndex) -> Result<IndexReport> {
        let ids: Vec<_> = chunks.iter().map(|c| c.id.clone()).collect();
        let existing = index.existing_ids(&ids).await?;

        let fresh: Vec<Chunk> = chunks
            .iter()
            .filter(|c| !existing.contains(&c.id))
            .cloned()
            .collect();

        let added = if fresh.is_empty() {
            0
        } else {
            index.add_chunks(&fresh).await?
        };

        let report = IndexReport {
            index: index.name(),
            total: chunks.len(),
            added,
            skipped: chunks.len() - fresh.len(),
        };
        info!(
            index = report.index,
            total = report.total,
            added = report.added,
            skipped = report.skipped,
            "indexed chunks"
        );
        Ok(report)
    }
}
