//! rag-model - Embedding and generation backends
//!
//! - [`OllamaEmbedder`] / [`OllamaGenerator`]: local Ollama server over HTTP.
//! - [`HashEmbedder`]: deterministic hashing-trick embeddings for offline use.

use std::sync::Arc;

use rag_core::{EmbeddingConfig, EmbeddingProvider, Result};

mod hash;
mod ollama;

pub use hash::HashEmbedder;
pub use ollama::{OllamaEmbedder, OllamaGenerator};

// Re-export the traits for convenience
pub use rag_core::{Embedder, Generator};

/// Build the embedder selected by configuration.
pub fn embedder_from_config(config: &EmbeddingConfig) -> Result<Arc<dyn Embedder>> {
    Ok(match config.provider {
        EmbeddingProvider::Ollama => Arc::new(OllamaEmbedder::new(config)?),
        EmbeddingProvider::Hash => Arc::new(HashEmbedder::new(config.dimension)),
    })
}
