//! Database schema definitions.

/// Keyword index schema.
///
/// `chunk_meta` enforces one row per chunk id; `chunks_fts` holds the
/// searchable text. The tokenizer keeps `@ . _ -` inside tokens so emails,
/// file names and error codes index as single terms.
pub const KEYWORD_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS chunk_meta (
    chunk_id TEXT PRIMARY KEY,
    source TEXT NOT NULL,
    page INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_chunk_meta_source ON chunk_meta(source);

CREATE VIRTUAL TABLE IF NOT EXISTS chunks_fts USING fts5(
    chunk_id UNINDEXED,
    source UNINDEXED,
    page UNINDEXED,
    text,
    tokenize = "unicode61 tokenchars '@._-'"
);
"#;

/// Vector index payload schema.
pub const VECTOR_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS vector_chunks (
    chunk_id TEXT PRIMARY KEY,
    source TEXT NOT NULL,
    page INTEGER NOT NULL,
    text TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS vector_meta (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
);
"#;

/// sqlite-vec table for a given embedding dimension.
pub fn vec_table_sql(dimension: usize) -> String {
    format!(
        r#"
CREATE VIRTUAL TABLE IF NOT EXISTS vec_chunks USING vec0(
    chunk_id TEXT PRIMARY KEY,
    embedding float[{}] distance_metric=cosine
);
"#,
        dimension
    )
}

/// Schema version for migrations.
pub const SCHEMA_VERSION: u32 = 1;
