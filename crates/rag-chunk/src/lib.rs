//! rag-chunk - Splitting, identity and loading
//!
//! This crate turns files on disk into identified chunks ready for both
//! indexes.
//!
//! - [`RecursiveChunker`]: splits text by paragraphs, lines, words and finally
//!   characters, with a fixed overlap between chunks.
//! - [`assign_chunk_ids`]: gives every chunk its `<source>:<page>:<index>` id.
//! - [`load_documents`]: reads `.txt` / `.md` files under a root.
//! - [`Indexer`]: incremental pipeline that only inserts unseen ids.
//!
//! # Example
//!
//! ```rust
//! use rag_chunk::{Chunker, RecursiveChunker};
//! use rag_core::ChunkConfig;
//!
//! let chunker = RecursiveChunker::new();
//! let chunks = chunker.chunk("Hello world", &ChunkConfig::default()).unwrap();
//! assert_eq!(chunks.len(), 1);
//! ```

mod identity;
mod loader;
mod pipeline;
mod recursive;

pub use identity::{assign_chunk_ids, chunk_id, SplitPiece};
pub use loader::{load_documents, SUPPORTED_EXTENSIONS};
pub use pipeline::{IndexReport, Indexer};
pub use recursive::RecursiveChunker;

// Re-export types for convenience
pub use rag_core::{ChunkConfig, ChunkData, Chunker};
