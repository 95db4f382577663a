//! Maximal Marginal Relevance selection over a retrieved candidate pool.
//!
//! MMR trades pure query relevance against diversity among the already
//! selected chunks: `score(d) = lambda * rel(d) - (1 - lambda) * max_sim(d, S)`
//! where `S` is the selected set. With `lambda = 1` the selection collapses
//! to plain top-k by similarity; with `lambda = 0` every pick after the
//! first maximizes distance from what was already chosen.

use crate::embedding::cosine_similarity;
use crate::models::Retrieved;

/// A candidate for MMR selection: the query relevance score it arrived
/// with and its embedding. Rank order is implied by slice position.
pub struct Candidate<'a> {
    pub relevance: f32,
    pub vector: &'a [f32],
}

/// Select up to `k` candidate indices by Maximal Marginal Relevance.
///
/// `candidates` must be in descending relevance order (the order the index
/// query returned them in). The first pick is always the most relevant
/// candidate. Ties in marginal score go to the candidate with the lowest
/// original rank, which keeps the selection deterministic. If the pool has
/// fewer than `k` candidates, all of them are selected, still in MMR
/// order; the selection order drives the final ranks either way.
pub fn select(candidates: &[Candidate<'_>], k: usize, lambda: f32) -> Vec<usize> {
    if candidates.is_empty() || k == 0 {
        return Vec::new();
    }

    let mut selected: Vec<usize> = Vec::with_capacity(k.min(candidates.len()));
    let mut remaining: Vec<usize> = (0..candidates.len()).collect();

    // Highest relevance first, regardless of lambda.
    selected.push(remaining.remove(0));

    while selected.len() < k && !remaining.is_empty() {
        let mut best_pos = 0;
        let mut best_score = f32::NEG_INFINITY;

        // Strict `>` keeps the earliest (lowest-rank) candidate on ties.
        for (pos, &idx) in remaining.iter().enumerate() {
            let redundancy = selected
                .iter()
                .map(|&s| cosine_similarity(candidates[idx].vector, candidates[s].vector))
                .fold(f32::NEG_INFINITY, f32::max);
            let score = lambda * candidates[idx].relevance - (1.0 - lambda) * redundancy;
            if score > best_score {
                best_score = score;
                best_pos = pos;
            }
        }

        selected.push(remaining.remove(best_pos));
    }

    selected
}

/// Apply MMR to a ranked retrieval pool, producing the final evidence set
/// with ranks renumbered from 1.
pub fn diversify(pool: Vec<Retrieved>, vectors: &[Vec<f32>], k: usize, lambda: f32) -> Vec<Retrieved> {
    let candidates: Vec<Candidate<'_>> = pool
        .iter()
        .zip(vectors.iter())
        .map(|(r, v)| Candidate {
            relevance: r.score,
            vector: v.as_slice(),
        })
        .collect();

    let picked = select(&candidates, k, lambda);

    picked
        .into_iter()
        .enumerate()
        .map(|(i, idx)| {
            let mut r = pool[idx].clone();
            r.rank = i + 1;
            r
        })
        .collect()
}
