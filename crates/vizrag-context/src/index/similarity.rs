//! Cosine ranking over index chunks.

use core::cmp::Ordering;

use super::{Chunk, ScoredChunk};

/// Calculate cosine similarity between two vectors
pub fn cosine_similarity(vector_a: &[f32], vector_b: &[f32]) -> f32 {
    if vector_a.len() != vector_b.len() {
        return 0.0;
    }

    let dot_product: f32 = vector_a
        .iter()
        .zip(vector_b.iter())
        .map(|(lhs, rhs)| lhs * rhs)
        .sum();
    let magnitude_a = vector_a.iter().map(|value| value * value).sum::<f32>().sqrt();
    let magnitude_b = vector_b.iter().map(|value| value * value).sum::<f32>().sqrt();

    if magnitude_a == 0.0 || magnitude_b == 0.0 {
        return 0.0;
    }

    dot_product / (magnitude_a * magnitude_b)
}

/// Total order key: NaN sinks to the bottom, `-0.0` and `0.0` compare equal.
fn sort_key(score: f32) -> f32 {
    if score.is_nan() { f32::NEG_INFINITY } else { score + 0.0 }
}

/// Score every chunk and keep the best `top_k`.
///
/// Chunks must be in ordinal order; the stable sort keeps equal scores in
/// that order.
pub fn rank<'index>(chunks: &'index [Chunk], query: &[f32], top_k: usize) -> Vec<ScoredChunk<'index>> {
    let mut scored: Vec<ScoredChunk<'index>> = chunks
        .iter()
        .map(|chunk| ScoredChunk {
            chunk,
            score: cosine_similarity(query, &chunk.embedding),
        })
        .collect();

    scored.sort_by(|first, second| {
        sort_key(second.score)
            .partial_cmp(&sort_key(first.score))
            .unwrap_or(Ordering::Equal)
    });
    scored.truncate(top_k);
    scored
}
