//! Grouping hits into ranked file lists.

use std::collections::HashMap;

use rag_core::{EngineHit, FileHit, FusedResult};
use rag_query::rrf_contribution;

/// Preview length in characters.
pub const PREVIEW_CHARS: usize = 160;

/// One-line preview, capped with a trailing `...`.
pub fn preview(text: &str) -> String {
    let line = text.replace(['\r', '\n'], " ");
    if line.chars().count() <= PREVIEW_CHARS {
        line
    } else {
        let cut: String = line.chars().take(PREVIEW_CHARS).collect();
        format!("{}...", cut)
    }
}

/// Indices into `items` grouped by source, groups in first-seen order.
fn group_by_source<T>(items: &[T], source: impl Fn(&T) -> &str) -> Vec<Vec<usize>> {
    let mut slots: HashMap<&str, usize> = HashMap::new();
    let mut groups: Vec<Vec<usize>> = Vec::new();
    for (i, item) in items.iter().enumerate() {
        let slot = *slots.entry(source(item)).or_insert_with(|| {
            groups.push(Vec::new());
            groups.len() - 1
        });
        groups[slot].push(i);
    }
    groups
}

/// Rank files from keyword rows by hit count.
///
/// Ties keep first-seen order. The representative row is the file's first
/// (best-ranked) row and its score is that row's RRF contribution.
pub fn rank_by_hit_count(rows: &[EngineHit], max_files: usize, rrf_k: u32) -> Vec<FileHit> {
    let mut groups = group_by_source(rows, |r| r.source.as_str());
    groups.sort_by(|a, b| b.len().cmp(&a.len()));

    groups
        .into_iter()
        .take(max_files)
        .map(|group| {
            let best = group[0];
            let row = &rows[best];
            FileHit {
                path: row.source.clone(),
                top_page: row.page,
                preview: preview(&row.text),
                fused_score: rrf_contribution(rrf_k, best + 1),
                has_keyword_hit: true,
            }
        })
        .collect()
}

/// Rank files from fused hits by `(has keyword hit, best fused score)`.
pub fn rank_fused(hits: &[FusedResult], max_files: usize) -> Vec<FileHit> {
    let groups = group_by_source(hits, |h| h.source.as_str());

    let mut files: Vec<FileHit> = groups
        .into_iter()
        .map(|group| {
            let has_keyword_hit = group.iter().any(|&i| hits[i].has_keyword_hit());
            // First maximum wins.
            let best = group
                .iter()
                .copied()
                .reduce(|a, b| if hits[b].rrf_score > hits[a].rrf_score { b } else { a })
                .unwrap_or(group[0]);
            let hit = &hits[best];
            FileHit {
                path: hit.source.clone(),
                top_page: hit.page,
                preview: preview(&hit.text),
                fused_score: hit.rrf_score,
                has_keyword_hit,
            }
        })
        .collect();

    files.sort_by(|a, b| {
        b.has_keyword_hit
            .cmp(&a.has_keyword_hit)
            .then_with(|| b.fused_score.total_cmp(&a.fused_score))
    });
    files.truncate(max_files);
    files
}
