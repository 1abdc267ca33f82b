//! Two-stage funnel scoring over the search cache.
//!
//! Matryoshka-style embeddings keep their coarse semantics in the leading
//! dimensions, so stage 1 scores every stored vector against the query using
//! only the first [`SHORTLIST_DIMENSION`] components and keeps a shortlist of
//! `top_k * SHORTLIST_FACTOR` candidates. Stage 2 rescores the shortlist at
//! full dimension and returns the top `top_k`. Both stages L2-normalize
//! before the dot product, so scores are cosine similarities in `[-1, 1]`.
//!
//! Equal scores resolve to the earlier cache row, which is the
//! lexicographically smaller chunk key; result order is fully deterministic.

use std::cmp::Ordering;

use serde::Serialize;

use crate::storage::SearchCache;

/// Leading dimensions used by the stage-1 shortlist.
pub const SHORTLIST_DIMENSION: usize = 64;

/// Shortlist size as a multiple of `top_k`.
pub const SHORTLIST_FACTOR: usize = 15;

/// Added to vector norms before dividing, so zero vectors score zero
/// instead of producing NaN.
pub const NORM_EPSILON: f32 = 1e-9;

/// One search result.
#[derive(Debug, Clone, Serialize)]
pub struct SearchHit {
    pub key: String,
    pub score: f32,
    pub snippet: String,
}

/// Funnel geometry: how wide stage 1 casts its net.
#[derive(Debug, Clone)]
pub struct FunnelConfig {
    pub shortlist_dimension: usize,
    pub shortlist_factor: usize,
}

impl FunnelConfig {
    pub fn with_shortlist_dimension(mut self, dimension: usize) -> Self {
        self.shortlist_dimension = dimension;
        self
    }

    pub fn with_shortlist_factor(mut self, factor: usize) -> Self {
        self.shortlist_factor = factor;
        self
    }
}

impl Default for FunnelConfig {
    fn default() -> Self {
        Self {
            shortlist_dimension: SHORTLIST_DIMENSION,
            shortlist_factor: SHORTLIST_FACTOR,
        }
    }
}

/// Stage 1: score every row on the leading dimensions and return the
/// candidate row indices, best first, at most `top_k * shortlist_factor`.
pub fn shortlist(
    cache: &SearchCache,
    query: &[f32],
    config: &FunnelConfig,
    top_k: usize,
) -> Vec<usize> {
    let stage_dim = config.shortlist_dimension.min(cache.dimension());
    let query_prefix = normalized_prefix(query, stage_dim);

    let mut scores: Vec<(usize, f32)> = (0..cache.len())
        .map(|row| {
            let prefix = normalized_prefix(cache.row(row), stage_dim);
            (row, dot(&prefix, &query_prefix))
        })
        .collect();
    sort_descending(&mut scores);

    let limit = top_k
        .saturating_mul(config.shortlist_factor)
        .min(scores.len());
    scores.truncate(limit);
    scores.into_iter().map(|(row, _)| row).collect()
}

/// Run both funnel stages and return `(row, score)` pairs, best first.
///
/// Stage-2 results are always a subset of the stage-1 shortlist.
pub fn funnel_rank(
    cache: &SearchCache,
    query: &[f32],
    config: &FunnelConfig,
    top_k: usize,
) -> Vec<(usize, f32)> {
    if cache.is_empty() || top_k == 0 {
        return Vec::new();
    }

    let candidates = shortlist(cache, query, config, top_k);

    let full_dim = cache.dimension();
    let query_full = normalized_prefix(query, full_dim);
    let mut scores: Vec<(usize, f32)> = candidates
        .into_iter()
        .map(|row| {
            let normalized = normalized_prefix(cache.row(row), full_dim);
            (row, dot(&normalized, &query_full))
        })
        .collect();
    sort_descending(&mut scores);
    scores.truncate(top_k);
    scores
}

/// First `dim` components of `vector`, L2-normalized with the epsilon guard.
fn normalized_prefix(vector: &[f32], dim: usize) -> Vec<f32> {
    let prefix = &vector[..dim.min(vector.len())];
    let norm = dot(prefix, prefix).sqrt();
    prefix.iter().map(|x| x / (norm + NORM_EPSILON)).collect()
}

fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

/// Descending by score; ties go to the earlier row (smaller key).
fn sort_descending(scores: &mut [(usize, f32)]) {
    scores.sort_by(|a, b| {
        b.1.partial_cmp(&a.1)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.0.cmp(&b.0))
    });
}
