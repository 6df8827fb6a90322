//! Fusion engine for hybrid retrieval.

use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info, Instrument};

use rag_core::{
    ChunkId, EngineHit, FileMetadata, FusedResult, KeywordEngine, QueryContext, Result,
    SemanticEngine, TextLookup,
};

use crate::fusion::{reciprocal_rank_fusion, Engine, DEFAULT_RRF_K};
use crate::temporal::{DateCutoff, FsMetadata, MtimeCache};

/// Hybrid retrieval over a keyword engine and a semantic engine.
///
/// Both engines are queried concurrently, fused with Reciprocal Rank Fusion,
/// filtered by source modification time when a cutoff is given, and
/// keyword-only hits are upgraded from snippet to full text with a single
/// batch lookup.
pub struct RetrievalFusionEngine {
    keyword: Arc<dyn KeywordEngine>,
    lookup: Arc<dyn TextLookup>,
    semantic: Arc<dyn SemanticEngine>,
    metadata: Arc<dyn FileMetadata>,
    rrf_k: u32,
}

impl RetrievalFusionEngine {
    /// Create an engine reading mtimes from the local filesystem.
    pub fn new(
        keyword: Arc<dyn KeywordEngine>,
        lookup: Arc<dyn TextLookup>,
        semantic: Arc<dyn SemanticEngine>,
    ) -> Self {
        Self {
            keyword,
            lookup,
            semantic,
            metadata: Arc::new(FsMetadata),
            rrf_k: DEFAULT_RRF_K,
        }
    }

    /// Replace the modification-time source.
    pub fn with_metadata(mut self, metadata: Arc<dyn FileMetadata>) -> Self {
        self.metadata = metadata;
        self
    }

    /// Override the RRF constant.
    pub fn with_rrf_k(mut self, rrf_k: u32) -> Self {
        self.rrf_k = rrf_k;
        self
    }

    pub fn rrf_k(&self) -> u32 {
        self.rrf_k
    }

    /// Fused retrieval.
    ///
    /// Engine failures propagate; a keyword query the native syntax rejects
    /// is handled inside the keyword engine and never surfaces here.
    pub async fn retrieve(
        &self,
        ctx: &QueryContext,
        query: &str,
        cutoff: Option<&DateCutoff>,
        keyword_depth: usize,
        semantic_depth: usize,
    ) -> Result<Vec<FusedResult>> {
        self.retrieve_inner(query, cutoff, keyword_depth, semantic_depth)
            .instrument(ctx.span().clone())
            .await
    }

    async fn retrieve_inner(
        &self,
        query: &str,
        cutoff: Option<&DateCutoff>,
        keyword_depth: usize,
        semantic_depth: usize,
    ) -> Result<Vec<FusedResult>> {
        let start = Instant::now();
        debug!(query, keyword_depth, semantic_depth, "retrieve");

        let (semantic_hits, keyword_hits) = tokio::join!(
            self.semantic_hits(query, semantic_depth),
            self.keyword_hits(query, keyword_depth)
        );
        let semantic_hits = semantic_hits?;
        let keyword_hits = keyword_hits?;

        debug!(
            semantic = semantic_hits.len(),
            keyword = keyword_hits.len(),
            "engine results"
        );

        let fused = reciprocal_rank_fusion(
            vec![
                (Engine::Semantic, semantic_hits),
                (Engine::Keyword, keyword_hits),
            ],
            self.rrf_k,
        );

        let mut fused = match cutoff {
            Some(cutoff) => self.filter_by_cutoff(fused, cutoff, |r| r.source.as_str()),
            None => fused,
        };

        self.resolve_full_text(&mut fused).await?;

        info!(
            results = fused.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "retrieve complete"
        );
        Ok(fused)
    }

    /// Keyword engine alone, with the optional temporal filter.
    pub async fn keyword_search(
        &self,
        ctx: &QueryContext,
        query: &str,
        depth: usize,
        cutoff: Option<&DateCutoff>,
    ) -> Result<Vec<EngineHit>> {
        let hits = self
            .keyword_hits(query, depth)
            .instrument(ctx.span().clone())
            .await?;
        Ok(match cutoff {
            Some(cutoff) => self.filter_by_cutoff(hits, cutoff, |h| h.source.as_str()),
            None => hits,
        })
    }

    /// Semantic engine alone, with the optional temporal filter.
    pub async fn semantic_search(
        &self,
        ctx: &QueryContext,
        query: &str,
        depth: usize,
        cutoff: Option<&DateCutoff>,
    ) -> Result<Vec<EngineHit>> {
        let hits = self
            .semantic_hits(query, depth)
            .instrument(ctx.span().clone())
            .await?;
        Ok(match cutoff {
            Some(cutoff) => self.filter_by_cutoff(hits, cutoff, |h| h.source.as_str()),
            None => hits,
        })
    }

    async fn semantic_hits(&self, query: &str, depth: usize) -> Result<Vec<EngineHit>> {
        if depth == 0 {
            return Ok(Vec::new());
        }
        self.semantic.similarity_search(query, depth).await
    }

    async fn keyword_hits(&self, query: &str, depth: usize) -> Result<Vec<EngineHit>> {
        if depth == 0 {
            return Ok(Vec::new());
        }
        self.keyword.search(query, depth).await
    }

    fn filter_by_cutoff<T>(
        &self,
        items: Vec<T>,
        cutoff: &DateCutoff,
        source: impl Fn(&T) -> &str,
    ) -> Vec<T> {
        let before = items.len();
        let mut cache = MtimeCache::new(self.metadata.as_ref());
        let kept: Vec<T> = items
            .into_iter()
            .filter(|item| cutoff.admits(cache.get(source(item))))
            .collect();
        debug!(before, after = kept.len(), "temporal filter");
        kept
    }

    /// Replace keyword snippets with stored full text.
    ///
    /// Only hits the semantic engine did not return need this. Ids the lookup
    /// cannot resolve keep their snippet.
    async fn resolve_full_text(&self, fused: &mut [FusedResult]) -> Result<()> {
        let missing: Vec<ChunkId> = fused
            .iter()
            .filter(|r| r.semantic_rank.is_none())
            .map(|r| r.chunk_id.clone())
            .collect();
        if missing.is_empty() {
            return Ok(());
        }

        let mut texts = self.lookup.fetch_text(&missing).await?;
        debug!(requested = missing.len(), resolved = texts.len(), "full text lookup");

        for result in fused.iter_mut().filter(|r| r.semantic_rank.is_none()) {
            if let Some(text) = texts.remove(&result.chunk_id) {
                result.text = text;
            }
        }
        Ok(())
    }
}
