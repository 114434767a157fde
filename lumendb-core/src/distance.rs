//! Linear distance kernels and the algorithm selector for `GetSimN`.
//!
//! Three functions over vectors of equal length `d`: `euclidean_distance`
//! (lower is closer), `dot_product_similarity` and `cosine_similarity`
//! (higher is closer).

use serde::{Deserialize, Serialize};

/// The distance/similarity kernel used by a linear (full-scan) `GetSimN`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LinearMetric {
    Euclidean,
    Dot,
    Cosine,
}

impl LinearMetric {
    /// `true` when a lower score means "closer" (only Euclidean).
    #[inline]
    pub fn lower_is_closer(&self) -> bool {
        matches!(self, LinearMetric::Euclidean)
    }

    #[inline]
    pub fn score(&self, a: &[f32], b: &[f32]) -> f32 {
        match self {
            LinearMetric::Euclidean => euclidean_distance(a, b),
            LinearMetric::Dot => dot_product_similarity(a, b),
            LinearMetric::Cosine => cosine_similarity(a, b),
        }
    }
}

/// The full `GetSimN` algorithm selector: the three linear kernels plus the
/// two non-linear indexes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SimilarityAlgorithm {
    Euclidean,
    Dot,
    Cosine,
    KdTree,
    Hnsw,
}

impl SimilarityAlgorithm {
    pub fn as_linear(&self) -> Option<LinearMetric> {
        match self {
            SimilarityAlgorithm::Euclidean => Some(LinearMetric::Euclidean),
            SimilarityAlgorithm::Dot => Some(LinearMetric::Dot),
            SimilarityAlgorithm::Cosine => Some(LinearMetric::Cosine),
            SimilarityAlgorithm::KdTree | SimilarityAlgorithm::Hnsw => None,
        }
    }
}

/// `sqrt(sum((a[i] - b[i])^2))`. Lower is closer.
#[inline]
pub fn euclidean_distance(a: &[f32], b: &[f32]) -> f32 {
    euclidean_distance_squared(a, b).sqrt()
}

/// Squared Euclidean distance, avoiding the `sqrt` when only relative
/// ordering matters (e.g. k-d tree bounding-box pruning).
#[inline]
pub fn euclidean_distance_squared(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| {
            let diff = x - y;
            diff * diff
        })
        .sum()
}

/// `sum(a[i] * b[i])`. Higher is closer.
#[inline]
pub fn dot_product_similarity(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

/// `(a . b) / (||a|| * ||b||)`. Higher is closer; when either norm is
/// zero the result is `0.0`.
#[inline]
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot = dot_product_similarity(a, b);
    let norm_a = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    let denom = norm_a * norm_b;
    if denom == 0.0 {
        0.0
    } else {
        dot / denom
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_euclidean_distance() {
        let a = [0.0, 0.0];
        let b = [3.0, 4.0];
        assert!((euclidean_distance(&a, &b) - 5.0).abs() < 1e-6);
    }

    #[test]
    fn test_euclidean_same_vector() {
        let a = [1.0, 2.0, 3.0];
        assert!(euclidean_distance(&a, &a) < 1e-10);
    }

    #[test]
    fn test_dot_product() {
        let a = [1.0, 2.0, 3.0];
        let b = [4.0, 5.0, 6.0];
        assert!((dot_product_similarity(&a, &b) - 32.0).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_identical_direction() {
        let a = [1.0, 0.0];
        let b = [2.0, 0.0];
        assert!((cosine_similarity(&a, &b) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_orthogonal() {
        let a = [1.0, 0.0];
        let b = [0.0, 1.0];
        assert!(cosine_similarity(&a, &b).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_opposite() {
        let a = [1.0, 0.0];
        let b = [-1.0, 0.0];
        assert!((cosine_similarity(&a, &b) + 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_zero_norm_is_zero() {
        let a = [0.0, 0.0];
        let b = [1.0, 0.0];
        assert_eq!(cosine_similarity(&a, &b), 0.0);
    }

    #[test]
    fn test_lower_is_closer() {
        assert!(LinearMetric::Euclidean.lower_is_closer());
        assert!(!LinearMetric::Dot.lower_is_closer());
        assert!(!LinearMetric::Cosine.lower_is_closer());
    }
}
