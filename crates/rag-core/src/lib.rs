//! rag-core - Core types and traits for hybrid question answering
//!
//! This crate provides the foundational types, engine traits, error handling
//! and configuration shared by the indexing, retrieval and agent crates.

pub mod config;
pub mod context;
pub mod error;
pub mod traits;
pub mod types;

pub use config::*;
pub use context::QueryContext;
pub use error::{RagError, Result};
pub use traits::*;
pub use types::*;
