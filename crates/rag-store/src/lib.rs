//! rag-store - SQLite keyword and vector indexes
//!
//! Both indexes key rows by the same deterministic chunk id so the fusion
//! engine can join their results.
//!
//! - [`KeywordStore`]: FTS5 full-text index ranked by bm25, degrading to an
//!   unranked substring scan when a query does not parse.
//! - [`VectorStore`]: sqlite-vec cosine index holding chunk payloads.

mod keyword;
mod schema;
mod sqlite;
mod vector;

pub use keyword::{sanitize_match_query, KeywordStore};
pub use vector::VectorStore;

// Re-export schema for testing/migrations
pub use schema::{KEYWORD_SCHEMA, SCHEMA_VERSION, VECTOR_SCHEMA};
