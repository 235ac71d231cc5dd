use crate::error::{MatchingError, Result};
use crate::models::{CategoryWeights, FeatureCategory, FeatureVector, SimilarityAlgorithm};

/// Cosine similarity clamped to [0, 1]
///
/// Defined as 0 when either vector has zero magnitude.
#[inline]
pub fn cosine_similarity(a: &[f64], b: &[f64]) -> Result<f64> {
    ensure_same_len(a, b)?;

    let dot: f64 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|x| x * x).sum::<f64>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f64>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return Ok(0.0);
    }

    Ok((dot / (norm_a * norm_b)).clamp(0.0, 1.0))
}

/// L2 distance between two equally sized vectors
#[inline]
pub fn euclidean_distance(a: &[f64], b: &[f64]) -> Result<f64> {
    ensure_same_len(a, b)?;
    Ok(a.iter().zip(b).map(|(x, y)| (x - y).powi(2)).sum::<f64>().sqrt())
}

/// Maps a distance in [0, inf) onto (0, 1]
#[inline]
pub fn euclidean_similarity(a: &[f64], b: &[f64]) -> Result<f64> {
    Ok(1.0 / (1.0 + euclidean_distance(a, b)?))
}

/// Similarity of one feature category, `None` if either side lacks it
pub fn category_similarity(
    a: &FeatureVector,
    b: &FeatureVector,
    category: FeatureCategory,
) -> Result<Option<f64>> {
    match (a.features.category(category), b.features.category(category)) {
        (Some(x), Some(y)) => cosine_similarity(x, y)
            .map(Some)
            .map_err(|e| with_context(e, a, b, category)),
        _ => Ok(None),
    }
}

/// Weighted mean of per-category cosine similarities
///
/// Categories missing on either side drop out of both the numerator and the
/// denominator. Returns 0 when no category is shared or all shared weights are 0.
pub fn weighted_hybrid_similarity(
    a: &FeatureVector,
    b: &FeatureVector,
    weights: &CategoryWeights,
) -> Result<f64> {
    let mut weighted_sum = 0.0;
    let mut total_weight = 0.0;

    for category in FeatureCategory::ALL {
        if let Some(sim) = category_similarity(a, b, category)? {
            let weight = weights.weight(category);
            weighted_sum += weight * sim;
            total_weight += weight;
        }
    }

    if total_weight <= 0.0 {
        return Ok(0.0);
    }

    Ok((weighted_sum / total_weight).clamp(0.0, 1.0))
}

/// Compatibility of two vectors in [0, 1] using the default hybrid weights
pub fn score(a: &FeatureVector, b: &FeatureVector, algorithm: SimilarityAlgorithm) -> Result<f64> {
    score_with_weights(a, b, algorithm, &CategoryWeights::default())
}

/// Compatibility of two vectors in [0, 1]
///
/// `weights` only affects [`SimilarityAlgorithm::WeightedHybrid`].
pub fn score_with_weights(
    a: &FeatureVector,
    b: &FeatureVector,
    algorithm: SimilarityAlgorithm,
    weights: &CategoryWeights,
) -> Result<f64> {
    match algorithm {
        SimilarityAlgorithm::Cosine => {
            let (u, v) = aligned(a, b)?;
            cosine_similarity(&u, &v).map_err(|e| with_users(e, a, b))
        }
        SimilarityAlgorithm::Euclidean => {
            let (u, v) = aligned(a, b)?;
            euclidean_similarity(&u, &v).map_err(|e| with_users(e, a, b))
        }
        SimilarityAlgorithm::WeightedHybrid => weighted_hybrid_similarity(a, b, weights),
    }
}

/// Both feature sets joined in category order
///
/// Every category must be present on both sides with the same length, or
/// absent on both.
fn aligned(a: &FeatureVector, b: &FeatureVector) -> Result<(Vec<f64>, Vec<f64>)> {
    let mut u = Vec::new();
    let mut v = Vec::new();

    for category in FeatureCategory::ALL {
        match (a.features.category(category), b.features.category(category)) {
            (Some(x), Some(y)) if x.len() == y.len() => {
                u.extend_from_slice(x);
                v.extend_from_slice(y);
            }
            (None, None) => {}
            (x, y) => {
                return Err(MatchingError::InvalidInput(format!(
                    "category {:?} mismatch: {} vs {} ({} / {})",
                    category,
                    describe(x),
                    describe(y),
                    a.user_id,
                    b.user_id
                )));
            }
        }
    }

    Ok((u, v))
}

fn describe(slot: Option<&[f64]>) -> String {
    match slot {
        Some(values) => format!("{} values", values.len()),
        None => "absent".to_string(),
    }
}

/// Score scaled by candidate profile quality (0-100)
#[inline]
pub fn confidence(score: f64, candidate_quality: f64) -> f64 {
    score * (candidate_quality.clamp(0.0, 100.0) / 100.0)
}

fn ensure_same_len(a: &[f64], b: &[f64]) -> Result<()> {
    if a.len() != b.len() {
        return Err(MatchingError::InvalidInput(format!(
            "vector dimension mismatch: {} vs {}",
            a.len(),
            b.len()
        )));
    }
    Ok(())
}

fn with_users(err: MatchingError, a: &FeatureVector, b: &FeatureVector) -> MatchingError {
    match err {
        MatchingError::InvalidInput(msg) => {
            MatchingError::InvalidInput(format!("{} ({} / {})", msg, a.user_id, b.user_id))
        }
        other => other,
    }
}

fn with_context(
    err: MatchingError,
    a: &FeatureVector,
    b: &FeatureVector,
    category: FeatureCategory,
) -> MatchingError {
    match err {
        MatchingError::InvalidInput(msg) => MatchingError::InvalidInput(format!(
            "{} in {:?} ({} / {})",
            msg, category, a.user_id, b.user_id
        )),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{FeatureSet, UserType, VectorMetadata};
    use chrono::Utc;

    fn vector(id: &str, features: FeatureSet) -> FeatureVector {
        FeatureVector {
            user_id: id.to_string(),
            user_type: UserType::Mentor,
            features,
            metadata: VectorMetadata {
                quality_score: 100.0,
                last_updated: Utc::now(),
            },
        }
    }

    fn full(values: f64) -> FeatureSet {
        FeatureSet {
            skills: Some(vec![values, 1.0, 0.0]),
            experience: Some(vec![values]),
            availability: Some(vec![1.0, values]),
            preference: Some(vec![0.5]),
            reputation: Some(vec![values]),
            engagement: Some(vec![0.2]),
        }
    }

    fn zeros() -> FeatureSet {
        FeatureSet {
            skills: Some(vec![0.0, 0.0, 0.0]),
            experience: Some(vec![0.0]),
            availability: Some(vec![0.0, 0.0]),
            preference: Some(vec![0.0]),
            reputation: Some(vec![0.0]),
            engagement: Some(vec![0.0]),
        }
    }

    #[test]
    fn test_zero_vectors_have_zero_cosine() {
        let a = vector("a", zeros());
        let b = vector("b", zeros());
        let sim = score(&a, &b, SimilarityAlgorithm::Cosine).unwrap();
        assert_eq!(sim, 0.0);
        assert!(!sim.is_nan());
    }

    #[test]
    fn test_zero_against_nonzero_is_zero() {
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 2.0]).unwrap(), 0.0);
    }

    #[test]
    fn test_identical_vectors_score_one() {
        let a = vector("a", full(0.7));
        let b = vector("b", full(0.7));

        let cos = score(&a, &b, SimilarityAlgorithm::Cosine).unwrap();
        let euc = score(&a, &b, SimilarityAlgorithm::Euclidean).unwrap();
        let hybrid = score(&a, &b, SimilarityAlgorithm::WeightedHybrid).unwrap();

        assert!((cos - 1.0).abs() < 1e-12);
        assert_eq!(euc, 1.0);
        assert!((hybrid - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_euclidean_distance_mapping() {
        // distance 5 (3-4-5 triangle) maps to 1/6
        let sim = euclidean_similarity(&[0.0, 0.0], &[3.0, 4.0]).unwrap();
        assert!((sim - 1.0 / 6.0).abs() < 1e-12);
    }

    #[test]
    fn test_orthogonal_cosine_is_zero() {
        assert_eq!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]).unwrap(), 0.0);
    }

    #[test]
    fn test_opposite_vectors_clamp_to_zero() {
        assert_eq!(cosine_similarity(&[1.0, 1.0], &[-1.0, -1.0]).unwrap(), 0.0);
    }

    #[test]
    fn test_dimension_mismatch_is_invalid_input() {
        let a = vector("a", FeatureSet { skills: Some(vec![1.0, 0.0]), ..Default::default() });
        let b = vector("b", FeatureSet { skills: Some(vec![1.0]), ..Default::default() });

        for algorithm in [
            SimilarityAlgorithm::Cosine,
            SimilarityAlgorithm::Euclidean,
            SimilarityAlgorithm::WeightedHybrid,
        ] {
            let err = score(&a, &b, algorithm).unwrap_err();
            assert!(matches!(err, MatchingError::InvalidInput(_)), "{algorithm}: {err}");
        }
    }

    #[test]
    fn test_flat_algorithms_reject_misaligned_categories() {
        // same total length, but experience on one side and availability on the other
        let a = vector(
            "a",
            FeatureSet {
                skills: Some(vec![1.0, 0.0]),
                experience: Some(vec![1.0]),
                ..Default::default()
            },
        );
        let b = vector(
            "b",
            FeatureSet {
                skills: Some(vec![1.0, 0.0]),
                availability: Some(vec![1.0]),
                ..Default::default()
            },
        );

        for algorithm in [SimilarityAlgorithm::Cosine, SimilarityAlgorithm::Euclidean] {
            match score(&a, &b, algorithm).unwrap_err() {
                MatchingError::InvalidInput(msg) => {
                    assert!(msg.contains("Experience"), "{msg}");
                    assert!(msg.contains("(a / b)"), "{msg}");
                }
                other => panic!("{algorithm}: expected InvalidInput, got {other}"),
            }
        }

        // the hybrid only compares the shared skills category
        assert_eq!(score(&a, &b, SimilarityAlgorithm::WeightedHybrid).unwrap(), 1.0);
    }

    #[test]
    fn test_flat_algorithms_skip_categories_absent_on_both_sides() {
        let features = FeatureSet {
            skills: Some(vec![1.0, 0.0]),
            engagement: Some(vec![0.5]),
            ..Default::default()
        };
        let a = vector("a", features.clone());
        let b = vector("b", features);

        assert!((score(&a, &b, SimilarityAlgorithm::Cosine).unwrap() - 1.0).abs() < 1e-12);
        assert_eq!(score(&a, &b, SimilarityAlgorithm::Euclidean).unwrap(), 1.0);
    }

    #[test]
    fn test_hybrid_excludes_missing_categories() {
        // Only skills shared: result equals the skills cosine, not a diluted value
        let a = vector(
            "a",
            FeatureSet {
                skills: Some(vec![1.0, 0.0]),
                experience: Some(vec![1.0]),
                ..Default::default()
            },
        );
        let b = vector(
            "b",
            FeatureSet {
                skills: Some(vec![1.0, 1.0]),
                availability: Some(vec![1.0]),
                ..Default::default()
            },
        );

        let hybrid = score(&a, &b, SimilarityAlgorithm::WeightedHybrid).unwrap();
        let skills_only = cosine_similarity(&[1.0, 0.0], &[1.0, 1.0]).unwrap();
        assert!((hybrid - skills_only).abs() < 1e-12);
    }

    #[test]
    fn test_hybrid_weighted_mean() {
        // skills identical (1.0), experience orthogonal (0.0)
        let a = vector(
            "a",
            FeatureSet {
                skills: Some(vec![1.0]),
                experience: Some(vec![1.0, 0.0]),
                ..Default::default()
            },
        );
        let b = vector(
            "b",
            FeatureSet {
                skills: Some(vec![2.0]),
                experience: Some(vec![0.0, 1.0]),
                ..Default::default()
            },
        );

        let hybrid = score(&a, &b, SimilarityAlgorithm::WeightedHybrid).unwrap();
        assert!((hybrid - 0.40 / 0.60).abs() < 1e-12);
    }

    #[test]
    fn test_hybrid_symmetric() {
        let a = vector("a", full(0.3));
        let b = vector("b", full(0.9));
        let ab = score(&a, &b, SimilarityAlgorithm::WeightedHybrid).unwrap();
        let ba = score(&b, &a, SimilarityAlgorithm::WeightedHybrid).unwrap();
        assert!((ab - ba).abs() < 1e-12);
    }

    #[test]
    fn test_hybrid_with_nothing_shared_is_zero() {
        let a = vector("a", FeatureSet { skills: Some(vec![1.0]), ..Default::default() });
        let b = vector("b", FeatureSet { engagement: Some(vec![1.0]), ..Default::default() });
        assert_eq!(score(&a, &b, SimilarityAlgorithm::WeightedHybrid).unwrap(), 0.0);
    }

    #[test]
    fn test_custom_weights_change_hybrid() {
        let a = vector(
            "a",
            FeatureSet {
                skills: Some(vec![1.0]),
                experience: Some(vec![1.0, 0.0]),
                ..Default::default()
            },
        );
        let b = vector(
            "b",
            FeatureSet {
                skills: Some(vec![1.0]),
                experience: Some(vec![0.0, 1.0]),
                ..Default::default()
            },
        );
        let skills_only = CategoryWeights {
            experience: 0.0,
            ..CategoryWeights::default()
        };

        let sim = score_with_weights(&a, &b, SimilarityAlgorithm::WeightedHybrid, &skills_only).unwrap();
        assert_eq!(sim, 1.0);
    }

    #[test]
    fn test_confidence_scales_by_quality() {
        assert!((confidence(0.8, 50.0) - 0.4).abs() < 1e-12);
        assert_eq!(confidence(0.8, 0.0), 0.0);
        assert!((confidence(0.8, 140.0) - 0.8).abs() < 1e-12);
    }
}
