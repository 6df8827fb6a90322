//! SQLite FTS5 keyword store.

use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::OnceLock;

use async_trait::async_trait;
use regex::Regex;
use rusqlite::{params, params_from_iter, Connection};
use tracing::{debug, warn};

use rag_core::{
    Chunk, ChunkId, ChunkIndex, EngineHit, IndexStats, KeywordEngine, RagError, Result,
    TextLookup,
};

use crate::schema::{KEYWORD_SCHEMA, SCHEMA_VERSION};
use crate::sqlite::{placeholders, SqliteDb};

/// Characters of context kept before the first token in a fallback preview.
const PREVIEW_LEAD: usize = 40;

/// Length of a fallback preview in characters.
const PREVIEW_LEN: usize = 160;

/// Maximum ids per `IN (...)` statement.
const LOOKUP_BATCH: usize = 500;

fn account_like_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)@|email|account|login|username").expect("valid regex"))
}

fn like_token_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[A-Za-z0-9@._-]+").expect("valid regex"))
}

/// Keyword index over chunk text.
pub struct KeywordStore {
    db: SqliteDb,
}

impl KeywordStore {
    /// Open or create the keyword index at the given path.
    pub fn open(path: impl AsRef<Path>, busy_timeout_ms: u32) -> Result<Self> {
        let db = SqliteDb::open(path.as_ref(), busy_timeout_ms)
            .map_err(|e| RagError::engine_unavailable("keyword", e.to_string()))?;
        Self::init(db)
    }

    /// Open an in-memory index (for testing).
    pub fn open_memory() -> Result<Self> {
        Self::init(SqliteDb::open_memory()?)
    }

    fn init(db: SqliteDb) -> Result<Self> {
        db.execute_batch(KEYWORD_SCHEMA)?;
        db.execute_batch(&format!("PRAGMA user_version = {};", SCHEMA_VERSION))?;
        Ok(Self { db })
    }

    /// Full-text MATCH ranked by bm25. Errors if the query does not parse.
    fn match_query(conn: &Connection, query: &str, depth: usize) -> rusqlite::Result<Vec<EngineHit>> {
        let mut stmt = conn.prepare(
            r#"
            SELECT chunk_id, source, page,
                   snippet(chunks_fts, 3, '[', ']', ' … ', 10) AS snip,
                   bm25(chunks_fts) AS score
            FROM chunks_fts
            WHERE chunks_fts MATCH ?1
            ORDER BY score, rowid
            LIMIT ?2
            "#,
        )?;

        let rows = stmt.query_map(params![query, depth as i64], |row| {
            Ok(EngineHit {
                chunk_id: ChunkId::new(row.get::<_, String>(0)?),
                source: row.get(1)?,
                page: row.get(2)?,
                text: row.get(3)?,
                native_score: Some(row.get(4)?),
            })
        })?;

        rows.collect()
    }

    /// Unranked case-insensitive substring scan.
    fn like_scan(conn: &Connection, query: &str, depth: usize) -> Result<Vec<EngineHit>> {
        let tokens = like_tokens(query);
        let Some(needle) = tokens.first().cloned() else {
            return Ok(Vec::new());
        };

        let clauses = (0..tokens.len())
            .map(|i| format!("lower(text) LIKE ?{} ESCAPE '\\'", i + 2))
            .collect::<Vec<_>>()
            .join(" OR ");

        let sql = format!(
            r#"
            SELECT chunk_id, source, page,
                   SUBSTR(text,
                          CASE WHEN INSTR(lower(text), ?1) <= {lead} THEN 1
                               ELSE INSTR(lower(text), ?1) - {lead} END,
                          {len}) AS snip
            FROM chunks_fts
            WHERE {clauses}
            ORDER BY rowid
            LIMIT ?{limit}
            "#,
            lead = PREVIEW_LEAD,
            len = PREVIEW_LEN,
            clauses = clauses,
            limit = tokens.len() + 2,
        );

        let mut values: Vec<rusqlite::types::Value> = Vec::with_capacity(tokens.len() + 2);
        values.push(needle.into());
        for token in &tokens {
            values.push(format!("%{}%", escape_like(token)).into());
        }
        values.push((depth as i64).into());

        conn.prepare(&sql)
            .and_then(|mut stmt| {
                let rows = stmt.query_map(params_from_iter(values), |row| {
                    Ok(EngineHit {
                        chunk_id: ChunkId::new(row.get::<_, String>(0)?),
                        source: row.get(1)?,
                        page: row.get(2)?,
                        text: row.get(3)?,
                        native_score: None,
                    })
                })?;
                rows.collect::<rusqlite::Result<Vec<_>>>()
            })
            .map_err(|e| RagError::database(e.to_string()))
    }

    fn chunk_count(conn: &Connection) -> Result<usize> {
        conn.query_row("SELECT COUNT(*) FROM chunk_meta", [], |row| row.get::<_, i64>(0))
            .map(|n| n as usize)
            .map_err(|e| RagError::database(e.to_string()))
    }
}

#[async_trait]
impl KeywordEngine for KeywordStore {
    async fn search(&self, query: &str, depth: usize) -> Result<Vec<EngineHit>> {
        let sanitized = sanitize_match_query(query);

        self.db.with_conn(|conn| {
            if sanitized.is_empty() {
                debug!(query, "empty match query, using substring scan");
                return Self::like_scan(conn, query, depth);
            }

            match Self::match_query(conn, &sanitized, depth) {
                Ok(hits) if hits.is_empty() && account_like_re().is_match(query) => {
                    debug!(query, "no match for account-like query, using substring scan");
                    Self::like_scan(conn, query, depth)
                }
                Ok(hits) => Ok(hits),
                Err(rusqlite::Error::SqliteFailure(_, msg)) if is_query_error(msg.as_deref()) => {
                    debug!(query = %sanitized, error = ?msg, "match query rejected, using substring scan");
                    Self::like_scan(conn, query, depth)
                }
                Err(e) => Err(RagError::engine_unavailable("keyword", e.to_string())),
            }
        })
    }
}

#[async_trait]
impl TextLookup for KeywordStore {
    async fn fetch_text(&self, ids: &[ChunkId]) -> Result<HashMap<ChunkId, String>> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }

        self.db.with_conn(|conn| {
            let mut out = HashMap::with_capacity(ids.len());
            for batch in ids.chunks(LOOKUP_BATCH) {
                let sql = format!(
                    "SELECT chunk_id, text FROM chunks_fts WHERE chunk_id IN ({})",
                    placeholders(1, batch.len())
                );
                let mut stmt = conn
                    .prepare(&sql)
                    .map_err(|e| RagError::database(e.to_string()))?;
                let rows = stmt
                    .query_map(params_from_iter(batch.iter().map(|id| id.as_str())), |row| {
                        Ok((ChunkId::new(row.get::<_, String>(0)?), row.get::<_, String>(1)?))
                    })
                    .map_err(|e| RagError::database(e.to_string()))?;
                for row in rows {
                    let (id, text) = row.map_err(|e| RagError::database(e.to_string()))?;
                    out.insert(id, text);
                }
            }
            Ok(out)
        })
    }
}

#[async_trait]
impl ChunkIndex for KeywordStore {
    fn name(&self) -> &'static str {
        "keyword"
    }

    async fn existing_ids(&self, ids: &[ChunkId]) -> Result<HashSet<ChunkId>> {
        self.db.with_conn(|conn| {
            let mut found = HashSet::new();
            for batch in ids.chunks(LOOKUP_BATCH) {
                let sql = format!(
                    "SELECT chunk_id FROM chunk_meta WHERE chunk_id IN ({})",
                    placeholders(1, batch.len())
                );
                let mut stmt = conn
                    .prepare(&sql)
                    .map_err(|e| RagError::database(e.to_string()))?;
                let rows = stmt
                    .query_map(params_from_iter(batch.iter().map(|id| id.as_str())), |row| {
                        row.get::<_, String>(0)
                    })
                    .map_err(|e| RagError::database(e.to_string()))?;
                for row in rows {
                    found.insert(ChunkId::new(row.map_err(|e| RagError::database(e.to_string()))?));
                }
            }
            Ok(found)
        })
    }

    async fn add_chunks(&self, chunks: &[Chunk]) -> Result<usize> {
        self.db.with_conn(|conn| {
            let tx = conn
                .unchecked_transaction()
                .map_err(|e| RagError::database(e.to_string()))?;

            let mut inserted = 0;
            {
                let mut meta = tx
                    .prepare("INSERT OR IGNORE INTO chunk_meta (chunk_id, source, page) VALUES (?1, ?2, ?3)")
                    .map_err(|e| RagError::database(e.to_string()))?;
                let mut fts = tx
                    .prepare("INSERT INTO chunks_fts (chunk_id, source, page, text) VALUES (?1, ?2, ?3, ?4)")
                    .map_err(|e| RagError::database(e.to_string()))?;

                for chunk in chunks {
                    let changed = meta
                        .execute(params![chunk.id.as_str(), chunk.source, chunk.page])
                        .map_err(|e| RagError::database(format!("Failed to insert chunk: {}", e)))?;
                    if changed == 0 {
                        continue;
                    }
                    fts.execute(params![chunk.id.as_str(), chunk.source, chunk.page, chunk.text])
                        .map_err(|e| RagError::database(format!("Failed to index chunk: {}", e)))?;
                    inserted += 1;
                }
            }

            tx.commit().map_err(|e| RagError::database(e.to_string()))?;
            debug!("Inserted {} keyword chunks", inserted);
            Ok(inserted)
        })
    }

    async fn reset(&self) -> Result<()> {
        self.db.with_conn(|conn| {
            conn.execute_batch("DELETE FROM chunk_meta; DELETE FROM chunks_fts;")
                .map_err(|e| RagError::database(e.to_string()))?;
            warn!("Keyword index cleared");
            Ok(())
        })
    }

    async fn stats(&self) -> Result<IndexStats> {
        self.db.with_conn(|conn| {
            let chunks = Self::chunk_count(conn)?;
            let sources = conn
                .query_row("SELECT COUNT(DISTINCT source) FROM chunk_meta", [], |row| {
                    row.get::<_, i64>(0)
                })
                .map_err(|e| RagError::database(e.to_string()))? as usize;
            Ok(IndexStats { chunks, sources })
        })
    }
}

/// Make free text safe for FTS5 MATCH.
///
/// Outside double quotes, anything FTS5 cannot read as a bareword becomes a
/// space; uppercase `OR` / `AND` / `NOT` pass through as operators. Balanced
/// quoted phrases are kept so tokens containing `@ . _ -` can still match
/// exactly. An unbalanced quote drops all quoting.
pub fn sanitize_match_query(query: &str) -> String {
    let balanced = query.matches('"').count() % 2 == 0;
    let mut parts: Vec<String> = Vec::new();

    for (i, segment) in query.split('"').enumerate() {
        let quoted = balanced && i % 2 == 1;
        if quoted {
            let inner = segment.split_whitespace().collect::<Vec<_>>().join(" ");
            if !inner.is_empty() {
                parts.push(format!("\"{}\"", inner));
            }
        } else {
            let cleaned: String = segment
                .chars()
                .map(|c| if is_bareword_char(c) { c } else { ' ' })
                .collect();
            parts.extend(cleaned.split_whitespace().map(str::to_string));
        }
    }

    parts.join(" ")
}

fn is_bareword_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || !c.is_ascii()
}

/// Lowercased, de-duplicated substring tokens longer than one character.
fn like_tokens(query: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    like_token_re()
        .find_iter(query)
        .map(|m| m.as_str().to_lowercase())
        .filter(|t| t.chars().count() > 1)
        .filter(|t| seen.insert(t.clone()))
        .collect()
}

fn escape_like(s: &str) -> String {
    s.replace('\\', "\\\\").replace('%', "\\%").replace('_', "\\_")
}

/// Whether an FTS5 failure came from the query text rather than the database.
fn is_query_error(msg: Option<&str>) -> bool {
    match msg {
        Some(m) => {
            m.contains("fts5: syntax error")
                || m.contains("no such column")
                || m.contains("unterminated string")
                || m.contains("unknown special query")
        }
        None => false,
    }
}
