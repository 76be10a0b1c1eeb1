// Copyright (c) 2026 SpendLens Contributors
// SPDX-License-Identifier: AGPL-3.0
//! Embedding Similarity
//!
//! Exhaustive nearest-neighbour search over embedding memory. Candidates are
//! scanned in the order storage returns them; on equal scores the first one
//! seen wins.
//!
//! # Architecture
//!
//! - **Layer:** Application Layer
//! - **Purpose:** Cosine scoring and best-match selection

use crate::domain::categorization::Confidence;
use crate::domain::memory::StoredEmbedding;

/// Cosine similarity of two vectors, in [-1, 1].
///
/// Accumulates in f64 and divides by the square root of the product of the
/// squared norms, so `cosine_similarity(v, v)` is exactly `1.0` for any
/// non-zero `v`. Mismatched lengths and zero vectors score `0.0`.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0_f64;
    let mut norm_a = 0.0_f64;
    let mut norm_b = 0.0_f64;
    for (x, y) in a.iter().zip(b.iter()) {
        let (x, y) = (f64::from(*x), f64::from(*y));
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    (dot / (norm_a * norm_b).sqrt()).clamp(-1.0, 1.0)
}

#[derive(Debug, Clone, PartialEq)]
pub struct SimilarityMatch {
    pub category_name: String,
    /// Raw cosine score, compared against the threshold
    pub similarity: f64,
}

impl SimilarityMatch {
    /// Reported confidence: the score rounded to four decimals
    pub fn confidence(&self) -> Confidence {
        Confidence::rounded(self.similarity)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct SimilaritySearch {
    threshold: f64,
}

impl SimilaritySearch {
    pub fn new(threshold: f64) -> Self {
        Self { threshold }
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Highest-scoring candidate, if it reaches the threshold
    pub fn best_match(&self, query: &[f32], candidates: &[StoredEmbedding]) -> Option<SimilarityMatch> {
        let mut best: Option<(&StoredEmbedding, f64)> = None;
        for candidate in candidates {
            let score = cosine_similarity(query, &candidate.embedding);
            if best.is_none_or(|(_, top)| score > top) {
                best = Some((candidate, score));
            }
        }

        best.filter(|(_, score)| *score >= self.threshold)
            .map(|(candidate, score)| SimilarityMatch {
                category_name: candidate.category_name.clone(),
                similarity: score,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stored(category: &str, embedding: Vec<f32>) -> StoredEmbedding {
        StoredEmbedding {
            category_name: category.to_string(),
            embedding,
        }
    }

    #[test]
    fn test_self_similarity_is_exactly_one() {
        let vectors: [Vec<f32>; 3] = [
            vec![0.1, 0.2, 0.3, 0.4],
            vec![3.0, -7.5, 0.001, 12.25, 1e-3],
            (0..384).map(|i| ((i * 37 % 101) as f32 - 50.0) / 13.0).collect(),
        ];
        for v in vectors {
            assert_eq!(cosine_similarity(&v, &v), 1.0);
        }
    }

    #[test]
    fn test_degenerate_inputs() {
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
        assert_eq!(cosine_similarity(&[1.0, 0.0], &[1.0, 0.0, 0.0]), 0.0);
        assert_eq!(cosine_similarity(&[], &[]), 0.0);
        assert_eq!(cosine_similarity(&[1.0, 0.0], &[-1.0, 0.0]), -1.0);
    }

    #[test]
    fn test_threshold_is_inclusive() {
        // 7 / sqrt(100) == 0.7 exactly
        let query = [1.0, 0.0, 0.0, 0.0];
        let candidates = vec![stored("Food & Dining", vec![7.0, 7.0, 1.0, 1.0])];
        let search = SimilaritySearch::new(0.70);
        let hit = search.best_match(&query, &candidates).unwrap();
        assert_eq!(hit.similarity, 0.7);
        assert_eq!(hit.confidence().value(), 0.7);
        assert_eq!(hit.category_name, "Food & Dining");
    }

    #[test]
    fn test_just_below_threshold_misses() {
        let x = 0.699_999_f32;
        let y = (1.0 - x * x).sqrt();
        let candidates = vec![stored("Shopping", vec![x, y])];
        let search = SimilaritySearch::new(0.70);
        assert!(search.best_match(&[1.0, 0.0], &candidates).is_none());
    }

    #[test]
    fn test_ties_keep_first_encountered() {
        let candidates = vec![
            stored("Groceries", vec![1.0, 1.0]),
            stored("Shopping", vec![2.0, 2.0]),
        ];
        let hit = SimilaritySearch::new(0.5).best_match(&[1.0, 1.0], &candidates).unwrap();
        assert_eq!(hit.category_name, "Groceries");
    }

    #[test]
    fn test_best_of_many() {
        let candidates = vec![
            stored("Utilities", vec![0.0, 1.0]),
            stored("Travel & Transport", vec![0.9, 0.1]),
            stored("Entertainment", vec![0.5, 0.5]),
        ];
        let hit = SimilaritySearch::new(0.7).best_match(&[1.0, 0.0], &candidates).unwrap();
        assert_eq!(hit.category_name, "Travel & Transport");
        assert!(SimilaritySearch::new(0.7).best_match(&[1.0, 0.0], &[]).is_none());
    }
}
