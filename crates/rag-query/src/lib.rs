//! rag-query - Hybrid retrieval
//!
//! This crate combines keyword and semantic search using Reciprocal Rank
//! Fusion (RRF) and prepares the fused hits for generation.
//!
//! # Features
//!
//! - Concurrent keyword + semantic retrieval fused with RRF (K = 60)
//! - Fail-closed modification-time cutoff
//! - Batch full-text resolution for keyword-only hits
//! - Numbered, citable context blocks and the grounded-answer prompt
//!
//! # Example
//!
//! ```rust,ignore
//! use rag_query::{ContextAssembler, RetrievalFusionEngine, build_prompt};
//!
//! let engine = RetrievalFusionEngine::new(keyword.clone(), keyword, semantic);
//! let ctx = QueryContext::new("search");
//! let hits = engine.retrieve(&ctx, "who captured Rome", None, 20, 8).await?;
//! let (context, chosen) = ContextAssembler::default().build(&hits, 6);
//! let answer = generator.generate(&build_prompt("who captured Rome", &context)).await?;
//! ```

mod context;
mod engine;
mod fusion;
mod prompt;
mod temporal;

pub use context::{truncate_chars, ContextAssembler, DEFAULT_MAX_CHUNK_CHARS};
pub use engine::RetrievalFusionEngine;
pub use fusion::{reciprocal_rank_fusion, rrf_contribution, Engine, DEFAULT_RRF_K};
pub use prompt::build_prompt;
pub use temporal::{DateCutoff, FsMetadata};

// Re-export for convenience
pub use rag_core::{FusedResult, QueryContext};
