//! SQLite vector store backed by sqlite-vec.

use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension};
use tracing::{debug, info, warn};

use rag_core::{
    Chunk, ChunkId, ChunkIndex, Embedder, EngineHit, IndexStats, RagError, Result,
    SemanticEngine,
};

use crate::schema::{vec_table_sql, SCHEMA_VERSION, VECTOR_SCHEMA};
use crate::sqlite::{placeholders, register_vec_extension, SqliteDb};

const LOOKUP_BATCH: usize = 500;

/// Vector index storing chunk payloads next to their embeddings.
pub struct VectorStore {
    db: SqliteDb,
    embedder: Arc<dyn Embedder>,
    batch_size: usize,
}

impl VectorStore {
    /// Open or create the vector index at the given path.
    pub fn open(
        path: impl AsRef<Path>,
        embedder: Arc<dyn Embedder>,
        busy_timeout_ms: u32,
    ) -> Result<Self> {
        register_vec_extension();
        let db = SqliteDb::open(path.as_ref(), busy_timeout_ms)
            .map_err(|e| RagError::engine_unavailable("semantic", e.to_string()))?;
        Self::init(db, embedder)
    }

    /// Open an in-memory index (for testing).
    pub fn open_memory(embedder: Arc<dyn Embedder>) -> Result<Self> {
        register_vec_extension();
        Self::init(SqliteDb::open_memory()?, embedder)
    }

    /// Set how many texts are embedded per backend call.
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    fn init(db: SqliteDb, embedder: Arc<dyn Embedder>) -> Result<Self> {
        let dimension = embedder.dimension();

        db.with_conn(|conn| {
            let version: String = conn
                .query_row("SELECT vec_version()", [], |row| row.get(0))
                .map_err(|e| {
                    RagError::engine_unavailable("semantic", format!("sqlite-vec not loaded: {}", e))
                })?;
            debug!("sqlite-vec {}", version);
            Ok(())
        })?;

        db.execute_batch(VECTOR_SCHEMA)?;
        db.execute_batch(&format!("PRAGMA user_version = {};", SCHEMA_VERSION))?;

        db.with_conn(|conn| {
            let stored: Option<String> = conn
                .query_row(
                    "SELECT value FROM vector_meta WHERE key = 'dimension'",
                    [],
                    |row| row.get(0),
                )
                .optional()
                .map_err(|e| RagError::database(e.to_string()))?;

            match stored {
                Some(value) if value != dimension.to_string() => Err(RagError::config(format!(
                    "vector index was built with dimension {}, embedder produces {}",
                    value, dimension
                ))),
                Some(_) => Ok(()),
                None => conn
                    .execute(
                        "INSERT INTO vector_meta (key, value) VALUES ('dimension', ?1)",
                        params![dimension.to_string()],
                    )
                    .map(|_| ())
                    .map_err(|e| RagError::database(e.to_string())),
            }
        })?;

        db.execute_batch(&vec_table_sql(dimension))?;
        info!("Vector index ready (dimension {})", dimension);

        Ok(Self {
            db,
            embedder,
            batch_size: 32,
        })
    }

    fn find_existing(conn: &Connection, ids: &[ChunkId]) -> Result<HashSet<ChunkId>> {
        let mut found = HashSet::new();
        for batch in ids.chunks(LOOKUP_BATCH) {
            let sql = format!(
                "SELECT chunk_id FROM vector_chunks WHERE chunk_id IN ({})",
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
    }

    fn insert_batch(&self, chunks: &[&Chunk], embeddings: &[Vec<f32>]) -> Result<usize> {
        self.db.with_conn(|conn| {
            let tx = conn
                .unchecked_transaction()
                .map_err(|e| RagError::database(e.to_string()))?;

            let mut inserted = 0;
            {
                let mut payload = tx
                    .prepare(
                        "INSERT OR IGNORE INTO vector_chunks (chunk_id, source, page, text) VALUES (?1, ?2, ?3, ?4)",
                    )
                    .map_err(|e| RagError::database(e.to_string()))?;
                let mut vectors = tx
                    .prepare("INSERT INTO vec_chunks (chunk_id, embedding) VALUES (?1, ?2)")
                    .map_err(|e| RagError::database(e.to_string()))?;

                for (chunk, embedding) in chunks.iter().zip(embeddings) {
                    let changed = payload
                        .execute(params![chunk.id.as_str(), chunk.source, chunk.page, chunk.text])
                        .map_err(|e| RagError::database(format!("Failed to insert chunk: {}", e)))?;
                    if changed == 0 {
                        continue;
                    }
                    vectors
                        .execute(params![chunk.id.as_str(), vec_to_bytes(embedding)])
                        .map_err(|e| RagError::database(format!("Failed to insert embedding: {}", e)))?;
                    inserted += 1;
                }
            }

            tx.commit().map_err(|e| RagError::database(e.to_string()))?;
            Ok(inserted)
        })
    }
}

#[async_trait]
impl SemanticEngine for VectorStore {
    async fn similarity_search(&self, query: &str, depth: usize) -> Result<Vec<EngineHit>> {
        if depth == 0 {
            return Ok(Vec::new());
        }

        let embedding = self.embedder.embed_query(query).await?;
        if embedding.len() != self.embedder.dimension() {
            return Err(RagError::embedding(format!(
                "query embedding has dimension {}, expected {}",
                embedding.len(),
                self.embedder.dimension()
            )));
        }
        let bytes = vec_to_bytes(&embedding);

        self.db.with_conn(|conn| {
            let mut stmt = conn
                .prepare(
                    r#"
                    WITH knn AS (
                        SELECT chunk_id, distance
                        FROM vec_chunks
                        WHERE embedding MATCH ?1 AND k = ?2
                    )
                    SELECT knn.chunk_id, knn.distance, c.source, c.page, c.text
                    FROM knn
                    JOIN vector_chunks c ON c.chunk_id = knn.chunk_id
                    ORDER BY knn.distance, c.rowid
                    "#,
                )
                .map_err(|e| RagError::engine_unavailable("semantic", e.to_string()))?;

            let rows = stmt
                .query_map(params![bytes, depth as i64], |row| {
                    Ok(EngineHit {
                        chunk_id: ChunkId::new(row.get::<_, String>(0)?),
                        native_score: Some(row.get(1)?),
                        source: row.get(2)?,
                        page: row.get(3)?,
                        text: row.get(4)?,
                    })
                })
                .map_err(|e| RagError::engine_unavailable("semantic", e.to_string()))?;

            let hits: Vec<_> = rows
                .collect::<std::result::Result<Vec<_>, _>>()
                .map_err(|e| RagError::engine_unavailable("semantic", e.to_string()))?;

            debug!(depth, returned = hits.len(), "vector search");
            Ok(hits)
        })
    }
}

#[async_trait]
impl ChunkIndex for VectorStore {
    fn name(&self) -> &'static str {
        "semantic"
    }

    async fn existing_ids(&self, ids: &[ChunkId]) -> Result<HashSet<ChunkId>> {
        self.db.with_conn(|conn| Self::find_existing(conn, ids))
    }

    async fn add_chunks(&self, chunks: &[Chunk]) -> Result<usize> {
        let ids: Vec<ChunkId> = chunks.iter().map(|c| c.id.clone()).collect();
        let existing = self.db.with_conn(|conn| Self::find_existing(conn, &ids))?;

        let mut seen = HashSet::new();
        let fresh: Vec<&Chunk> = chunks
            .iter()
            .filter(|c| !existing.contains(&c.id) && seen.insert(c.id.clone()))
            .collect();

        let mut inserted = 0;
        for batch in fresh.chunks(self.batch_size) {
            let texts: Vec<&str> = batch.iter().map(|c| c.text.as_str()).collect();
            let embeddings = self.embedder.embed_documents(&texts).await?;
            if embeddings.len() != batch.len() {
                return Err(RagError::embedding(format!(
                    "embedder returned {} vectors for {} texts",
                    embeddings.len(),
                    batch.len()
                )));
            }
            inserted += self.insert_batch(batch, &embeddings)?;
        }

        debug!("Inserted {} vector chunks", inserted);
        Ok(inserted)
    }

    async fn reset(&self) -> Result<()> {
        self.db.with_conn(|conn| {
            conn.execute_batch("DELETE FROM vector_chunks; DELETE FROM vec_chunks;")
                .map_err(|e| RagError::database(e.to_string()))?;
            warn!("Vector index cleared");
            Ok(())
        })
    }

    async fn stats(&self) -> Result<IndexStats> {
        self.db.with_conn(|conn| {
            let (chunks, sources) = conn
                .query_row(
                    "SELECT COUNT(*), COUNT(DISTINCT source) FROM vector_chunks",
                    [],
                    |row| Ok((row.get::<_, i64>(0)?, row.get::<_, i64>(1)?)),
                )
                .map_err(|e| RagError::database(e.to_string()))?;
            Ok(IndexStats {
                chunks: chunks as usize,
                sources: sources as usize,
            })
        })
    }
}

/// Convert f32 vector to bytes (little-endian).
fn vec_to_bytes(v: &[f32]) -> Vec<u8> {
    v.iter().flat_map(|f| f.to_le_bytes()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Letter-frequency embedding: texts sharing letters land close together.
    struct LetterEmbedder;

    impl LetterEmbedder {
        fn embed(text: &str) -> Vec<f32> {
            let mut v = vec![0.0f32; 26];
            for c in text.to_ascii_lowercase().bytes() {
                if c.is_ascii_lowercase() {
                    v[(c - b'a') as usize] += 1.0;
                }
            }
            let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
            if norm > 0.0 {
                for x in &mut v {
                    *x /= norm;
                }
            } else {
                v[0] = 1.0;
            }
            v
        }
    }

    #[async_trait]
    impl Embedder for LetterEmbedder {
        async fn embed_documents(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
            Ok(texts.iter().map(|t| Self::embed(t)).collect())
        }

        async fn embed_query(&self, text: &str) -> Result<Vec<f32>> {
            Ok(Self::embed(text))
        }

        fn dimension(&self) -> usize {
            26
        }
    }

    fn chunk(source: &str, idx: usize, text: &str) -> Chunk {
        Chunk {
            id: ChunkId::new(format!("{}:0:{}", source, idx)),
            source: source.to_string(),
            page: 0,
            text: text.to_string(),
        }
    }

    async fn seeded() -> VectorStore {
        let store = VectorStore::open_memory(Arc::new(LetterEmbedder)).unwrap();
        store
            .add_chunks(&[
                chunk("/n/a.txt", 0, "zzzz zzz zz"),
                chunk("/n/b.txt", 0, "xxxx yyyy"),
                chunk("/n/c.txt", 0, "abc abc abc"),
            ])
            .await
            .unwrap();
        store
    }

    #[tokio::test]
    async fn test_nearest_first_with_full_text() {
        let store = seeded().await;
        let hits = store.similarity_search("zz", 3).await.unwrap();

        assert_eq!(hits.len(), 3);
        assert_eq!(hits[0].source, "/n/a.txt");
        assert_eq!(hits[0].text, "zzzz zzz zz");
        let d0 = hits[0].native_score.unwrap();
        let d1 = hits[1].native_score.unwrap();
        assert!(d0 <= d1);
    }

    #[tokio::test]
    async fn test_depth_limits_results() {
        let store = seeded().await;
        assert_eq!(store.similarity_search("abc", 1).await.unwrap().len(), 1);
        assert!(store.similarity_search("abc", 0).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_add_skips_existing() {
        let store = seeded().await;
        let added = store
            .add_chunks(&[chunk("/n/a.txt", 0, "zzzz zzz zz"), chunk("/n/d.txt", 0, "qqq")])
            .await
            .unwrap();
        assert_eq!(added, 1);

        let stats = store.stats().await.unwrap();
        assert_eq!(stats.chunks, 4);
        assert_eq!(stats.sources, 4);
    }

    #[tokio::test]
    async fn test_dimension_mismatch_rejected() {
        struct Wide;

        #[async_trait]
        impl Embedder for Wide {
            async fn embed_documents(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
                Ok(texts.iter().map(|_| vec![0.1; 8]).collect())
            }
            async fn embed_query(&self, _text: &str) -> Result<Vec<f32>> {
                Ok(vec![0.1; 8])
            }
            fn dimension(&self) -> usize {
                8
            }
        }

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vec.db");
        VectorStore::open(&path, Arc::new(LetterEmbedder), 1000).unwrap();

        let err = VectorStore::open(&path, Arc::new(Wide), 1000).err().unwrap();
        assert_eq!(err.error_code(), "CONFIG_ERROR");
    }

    #[tokio::test]
    async fn test_reset() {
        let store = seeded().await;
        store.reset().await.unwrap();
        assert_eq!(store.stats().await.unwrap().chunks, 0);
        assert!(store.similarity_search("zz", 3).await.unwrap().is_empty());
    }
}
