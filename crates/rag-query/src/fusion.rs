//! Reciprocal Rank Fusion (RRF) for combining engine result lists.

use std::collections::HashMap;

use rag_core::{ChunkId, EngineHit, FusedResult};

/// RRF constant (commonly 60).
/// Higher values flatten the difference between top and lower ranks.
pub const DEFAULT_RRF_K: u32 = 60;

/// Which engine produced a result list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Engine {
    Semantic,
    Keyword,
}

/// Score contribution of a 1-based position.
pub fn rrf_contribution(k: u32, rank: usize) -> f64 {
    1.0 / (k as f64 + rank as f64)
}

/// Fuse engine result lists using Reciprocal Rank Fusion.
///
/// RRF score = Σ (1 / (k + rank_i)) over every list containing the chunk,
/// where `rank_i` is the 1-based position in that list. A chunk repeated
/// within one list only counts at its first position.
///
/// Lists are consumed in the order given (semantic first by convention).
/// Results are sorted by score descending; equal scores keep first-discovery
/// order, so the output is fully determined by the inputs.
///
/// The fused `text` is the payload from the first list that returned the
/// chunk: full text for semantic hits, a snippet for keyword-only hits.
pub fn reciprocal_rank_fusion(lists: Vec<(Engine, Vec<EngineHit>)>, k: u32) -> Vec<FusedResult> {
    let mut index: HashMap<ChunkId, usize> = HashMap::new();
    let mut fused: Vec<FusedResult> = Vec::new();

    for (engine, hits) in lists {
        for (position, hit) in hits.into_iter().enumerate() {
            if hit.chunk_id.as_str().is_empty() {
                continue;
            }
            let rank = position + 1;

            let slot = match index.get(&hit.chunk_id) {
                Some(&slot) => slot,
                None => {
                    let slot = fused.len();
                    index.insert(hit.chunk_id.clone(), slot);
                    fused.push(FusedResult {
                        chunk_id: hit.chunk_id,
                        source: hit.source,
                        page: hit.page,
                        text: hit.text,
                        semantic_rank: None,
                        keyword_rank: None,
                        rrf_score: 0.0,
                    });
                    slot
                }
            };

            let entry = &mut fused[slot];
            let engine_rank = match engine {
                Engine::Semantic => &mut entry.semantic_rank,
                Engine::Keyword => &mut entry.keyword_rank,
            };
            if engine_rank.is_some() {
                continue;
            }
            *engine_rank = Some(rank);
            entry.rrf_score += rrf_contribution(k, rank);
        }
    }

    // Vec order is discovery order; a stable sort keeps it for ties.
    fused.sort_by(|a, b| b.rrf_score.total_cmp(&a.rrf_score));
    fused
}
