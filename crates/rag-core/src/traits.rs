//! Core traits defining the interfaces between components.

use std::collections::{HashMap, HashSet};
use std::time::SystemTime;

use async_trait::async_trait;

use crate::error::Result;
use crate::types::{Chunk, ChunkId, EngineHit, IndexStats};

/// Full-text keyword engine.
#[async_trait]
pub trait KeywordEngine: Send + Sync {
    /// Return up to `depth` matches, best first.
    ///
    /// When the native query syntax fails to parse, implementations degrade to
    /// an unranked substring scan instead of returning an error.
    async fn search(&self, query: &str, depth: usize) -> Result<Vec<EngineHit>>;
}

/// Batch text resolution for chunks the semantic engine did not return.
#[async_trait]
pub trait TextLookup: Send + Sync {
    /// Resolve many ids in one round trip. Missing ids are simply absent.
    async fn fetch_text(&self, ids: &[ChunkId]) -> Result<HashMap<ChunkId, String>>;
}

/// Vector similarity engine.
#[async_trait]
pub trait SemanticEngine: Send + Sync {
    /// Return the `depth` nearest chunks, lowest distance first, with full text.
    async fn similarity_search(&self, query: &str, depth: usize) -> Result<Vec<EngineHit>>;
}

/// Generative model.
#[async_trait]
pub trait Generator: Send + Sync {
    /// Produce a completion for a single prompt.
    async fn generate(&self, prompt: &str) -> Result<String>;
}

/// Embedding model trait.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embed a batch of document texts.
    async fn embed_documents(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>>;

    /// Embed a single query text.
    async fn embed_query(&self, text: &str) -> Result<Vec<f32>>;

    /// Get the embedding dimension.
    fn dimension(&self) -> usize;
}

/// File modification times, used by the temporal filter.
pub trait FileMetadata: Send + Sync {
    /// Modification time of `path`, or `None` if it cannot be read.
    fn mod_time(&self, path: &str) -> Option<SystemTime>;
}

/// Writable side of an index, used by the indexing pipeline.
#[async_trait]
pub trait ChunkIndex: Send + Sync {
    /// Short name for logs ("keyword", "semantic").
    fn name(&self) -> &'static str;

    /// Subset of `ids` already present.
    async fn existing_ids(&self, ids: &[ChunkId]) -> Result<HashSet<ChunkId>>;

    /// Insert chunks whose ids are not yet present; returns how many were added.
    async fn add_chunks(&self, chunks: &[Chunk]) -> Result<usize>;

    /// Remove every stored chunk.
    async fn reset(&self) -> Result<()>;

    /// Stored chunk and source counts.
    async fn stats(&self) -> Result<IndexStats>;
}

/// Chunking configuration.
#[derive(Debug, Clone)]
pub struct ChunkConfig {
    /// Maximum characters per chunk.
    pub chunk_size: usize,

    /// Characters shared between consecutive chunks.
    pub chunk_overlap: usize,
}

impl Default for ChunkConfig {
    fn default() -> Self {
        Self {
            chunk_size: 800,
            chunk_overlap: 80,
        }
    }
}

/// Chunking strategy trait.
pub trait Chunker: Send + Sync {
    /// Split text into ordered pieces. Must be deterministic.
    fn chunk(&self, content: &str, config: &ChunkConfig) -> Result<Vec<ChunkData>>;
}

/// Raw chunk data before ID assignment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkData {
    /// Chunk text content.
    pub content: String,

    /// Length in characters.
    pub char_count: usize,
}
