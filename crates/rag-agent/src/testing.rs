//! Fakes shared by the router and agent tests.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime};

use async_trait::async_trait;

use rag_core::{
    ChunkId, EngineHit, FileMetadata, Generator, KeywordEngine, Result, SemanticEngine,
    TextLookup,
};
use rag_query::RetrievalFusionEngine;

pub fn hit(source: &str, idx: usize, text: &str) -> EngineHit {
    EngineHit {
        chunk_id: ChunkId::new(format!("{}:0:{}", source, idx)),
        source: source.to_string(),
        page: 0,
        text: text.to_string(),
        native_score: None,
    }
}

/// Returns canned hits per exact query string and records every query seen.
#[derive(Default)]
pub struct CannedEngine {
    by_query: HashMap<String, Vec<EngineHit>>,
    pub queries: Mutex<Vec<(String, usize)>>,
}

impl CannedEngine {
    pub fn with(mut self, query: &str, hits: Vec<EngineHit>) -> Self {
        self.by_query.insert(query.to_string(), hits);
        self
    }

    pub fn seen(&self) -> Vec<(String, usize)> {
        self.queries.lock().map(|q| q.clone()).unwrap_or_default()
    }

    fn answer(&self, query: &str, depth: usize) -> Vec<EngineHit> {
        if let Ok(mut q) = self.queries.lock() {
            q.push((query.to_string(), depth));
        }
        self.by_query
            .get(query)
            .map(|hits| hits.iter().take(depth).cloned().collect())
            .unwrap_or_default()
    }
}

#[async_trait]
impl KeywordEngine for CannedEngine {
    async fn search(&self, query: &str, depth: usize) -> Result<Vec<EngineHit>> {
        Ok(self.answer(query, depth))
    }
}

#[async_trait]
impl SemanticEngine for CannedEngine {
    async fn similarity_search(&self, query: &str, depth: usize) -> Result<Vec<EngineHit>> {
        Ok(self.answer(query, depth))
    }
}

#[async_trait]
impl TextLookup for CannedEngine {
    async fn fetch_text(&self, _ids: &[ChunkId]) -> Result<HashMap<ChunkId, String>> {
        Ok(HashMap::new())
    }
}

pub fn engine(keyword: Arc<CannedEngine>, semantic: Arc<CannedEngine>) -> Arc<RetrievalFusionEngine> {
    Arc::new(RetrievalFusionEngine::new(keyword.clone(), keyword, semantic))
}

/// Modification times by source path; unknown paths have none.
#[derive(Default)]
pub struct FixedMtimes(pub HashMap<String, SystemTime>);

impl FixedMtimes {
    pub fn with(mut self, path: &str, mtime: SystemTime) -> Self {
        self.0.insert(path.to_string(), mtime);
        self
    }
}

impl FileMetadata for FixedMtimes {
    fn mod_time(&self, path: &str) -> Option<SystemTime> {
        self.0.get(path).copied()
    }
}

pub fn engine_with_mtimes(
    keyword: Arc<CannedEngine>,
    semantic: Arc<CannedEngine>,
    mtimes: FixedMtimes,
) -> Arc<RetrievalFusionEngine> {
    Arc::new(
        RetrievalFusionEngine::new(keyword.clone(), keyword, semantic)
            .with_metadata(Arc::new(mtimes)),
    )
}

/// Replays scripted replies in order, then a fixed filler reply.
#[derive(Default)]
pub struct ScriptedGenerator {
    replies: Mutex<VecDeque<String>>,
    pub prompts: Mutex<Vec<String>>,
    delay: Option<Duration>,
}

impl ScriptedGenerator {
    pub fn new(replies: &[&str]) -> Self {
        Self {
            replies: Mutex::new(replies.iter().map(|r| r.to_string()).collect()),
            ..Self::default()
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> usize {
        self.prompts.lock().map(|p| p.len()).unwrap_or_default()
    }

    pub fn prompt(&self, i: usize) -> String {
        self.prompts
            .lock()
            .ok()
            .and_then(|p| p.get(i).cloned())
            .unwrap_or_default()
    }
}

#[async_trait]
impl Generator for ScriptedGenerator {
    async fn generate(&self, prompt: &str) -> Result<String> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if let Ok(mut p) = self.prompts.lock() {
            p.push(prompt.to_string());
        }
        let next = self.replies.lock().ok().and_then(|mut r| r.pop_front());
        Ok(next.unwrap_or_else(|| "Let me think about that.".to_string()))
    }
}
