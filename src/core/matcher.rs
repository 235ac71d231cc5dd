use async_trait::async_trait;
use serde_json::json;
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use std::time::Instant;
use validator::Validate;

use crate::core::{
    assignment::assign,
    fairness::{CandidatePool, FairnessAdjuster},
    reasons::match_reasons,
    similarity::{confidence, score_with_weights},
    validation::{MatchPipeline, ValidationHarness},
};
use crate::error::{MatchingError, Result};
use crate::models::{
    Assignment, CategoryWeights, FeatureVector, FindMatchesResponse, MatchingConstraints,
    MatchingCriteria, MatchingResult, ProfileFilter, RawScore, SimilarityAlgorithm, UserType,
    ValidationReport, ValidationTestCase,
};
use crate::services::{FeatureVectorStore, ProfileSource};

/// Defaults used when a caller does not override them
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MatchingDefaults {
    pub limit: usize,
    pub threshold: f64,
    pub algorithm: SimilarityAlgorithm,
}

impl Default for MatchingDefaults {
    fn default() -> Self {
        Self {
            limit: 10,
            threshold: 0.5,
            algorithm: SimilarityAlgorithm::WeightedHybrid,
        }
    }
}

/// Matching engine - wires vectors, scoring, fairness and assignment together
///
/// # Pipelines
/// * `find_matches` - filter candidates, score, threshold, rank
/// * `create_fair_matches` - score every mentor/mentee pair, adjust for
///   fairness, assign greedily, attach audit metrics
/// * `run_validation` - evaluate `find_matches` against expectations
#[derive(Clone)]
pub struct MatchingEngine {
    store: Arc<FeatureVectorStore>,
    profiles: Arc<dyn ProfileSource>,
    adjuster: FairnessAdjuster,
    defaults: MatchingDefaults,
}

impl MatchingEngine {
    pub fn new(
        store: Arc<FeatureVectorStore>,
        profiles: Arc<dyn ProfileSource>,
        adjuster: FairnessAdjuster,
        defaults: MatchingDefaults,
    ) -> Self {
        Self {
            store,
            profiles,
            adjuster,
            defaults,
        }
    }

    pub fn defaults(&self) -> &MatchingDefaults {
        &self.defaults
    }

    pub fn store(&self) -> &FeatureVectorStore {
        &self.store
    }

    /// Rank candidates for the user described by `criteria`
    ///
    /// Candidates are vectors of the target user type (by default the
    /// counterpart of the querying user), minus the user themself and anything
    /// excluded by the filters. Only scores at or above `threshold` are kept.
    pub async fn find_matches(
        &self,
        criteria: &MatchingCriteria,
        limit: usize,
        threshold: f64,
        algorithm: SimilarityAlgorithm,
    ) -> Result<FindMatchesResponse> {
        let started = Instant::now();
        criteria.validate()?;
        if !(0.0..=1.0).contains(&threshold) {
            return Err(MatchingError::InvalidInput(format!(
                "threshold must be within [0, 1], got {}",
                threshold
            )));
        }

        let source = self.store.get(&criteria.user_id).await?;
        let target_type = criteria
            .preferences
            .target_type
            .unwrap_or_else(|| source.user_type.counterpart());

        let pool = match &criteria.filters.candidate_ids {
            Some(ids) if ids.is_empty() => Vec::new(),
            Some(ids) => self.store.get_batch(ids).await?,
            None => self.store.get_batch(&[]).await?,
        };

        let excluded: HashSet<&str> = criteria
            .filters
            .exclude_user_ids
            .iter()
            .map(String::as_str)
            .collect();
        let min_quality = criteria.filters.min_quality_score.unwrap_or(0.0);

        let candidates: Vec<&FeatureVector> = pool
            .iter()
            .map(Arc::as_ref)
            .filter(|c| c.user_type == target_type)
            .filter(|c| c.user_id != source.user_id && !excluded.contains(c.user_id.as_str()))
            .filter(|c| c.metadata.quality_score >= min_quality)
            .collect();
        let total_processed = candidates.len();

        let weights = criteria.weights.unwrap_or_default();
        let mut matches = Vec::new();
        for candidate in candidates {
            let score = score_with_weights(&source, candidate, algorithm, &weights).map_err(|e| {
                tracing::warn!(
                    "Cannot score candidate {} for {} with {}: {}",
                    candidate.user_id,
                    source.user_id,
                    algorithm,
                    e
                );
                e
            })?;
            if score < threshold {
                continue;
            }

            let mut metadata = BTreeMap::new();
            metadata.insert("algorithm".to_string(), json!(algorithm.as_str()));
            metadata.insert("userType".to_string(), json!(candidate.user_type));
            metadata.insert("qualityScore".to_string(), json!(candidate.metadata.quality_score));

            matches.push(MatchingResult {
                target_id: candidate.user_id.clone(),
                score,
                confidence: confidence(score, candidate.metadata.quality_score),
                reasons: match_reasons(&source, candidate),
                metadata,
            });
        }

        // Stable sort keeps candidate order among equal scores
        matches.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        matches.truncate(limit);

        let execution_time_ms = started.elapsed().as_millis() as u64;
        tracing::info!(
            "find_matches for {}: {} of {} candidates above {} ({}, {}ms)",
            criteria.user_id,
            matches.len(),
            total_processed,
            threshold,
            algorithm,
            execution_time_ms
        );

        Ok(FindMatchesResponse {
            matches,
            total_processed,
            execution_time_ms,
            algorithm,
        })
    }

    /// Fairness-adjusted one-to-one assignment over the whole pool
    pub async fn create_fair_matches(&self, constraints: &MatchingConstraints) -> Result<Vec<Assignment>> {
        let started = Instant::now();
        constraints.validate()?;

        let vectors = self.store.get_batch(&[]).await?;
        let (mentors, mentees): (Vec<&FeatureVector>, Vec<&FeatureVector>) = vectors
            .iter()
            .map(Arc::as_ref)
            .partition(|v| v.user_type == UserType::Mentor);

        let in_pool: HashSet<&str> = vectors.iter().map(|v| v.user_id.as_str()).collect();
        let profiles: Vec<_> = self
            .profiles
            .load_profiles(&ProfileFilter::default())
            .await?
            .into_iter()
            .filter(|p| in_pool.contains(p.user_id.as_str()))
            .collect();
        let pool = CandidatePool::from_profiles(&profiles);

        let weights = constraints.category_weights();
        let raw_scores = raw_scores(&mentors, &mentees, &weights)?;
        let adjusted = self.adjuster.adjust(&pool, &raw_scores, constraints);
        let accepted = assign(&adjusted);
        let metrics = self.adjuster.metrics(&pool, &accepted);

        if metrics.equal_opportunity < constraints.min_equal_opportunity {
            tracing::warn!(
                "Equal opportunity {:.4} below required {:.4}",
                metrics.equal_opportunity,
                constraints.min_equal_opportunity
            );
        }

        let created_at = chrono::Utc::now();
        let assignments: Vec<Assignment> = accepted
            .into_iter()
            .map(|s| Assignment {
                id: uuid::Uuid::new_v4(),
                mentor_id: s.mentor_id,
                mentee_id: s.mentee_id,
                compatibility_score: s.score,
                fairness_score: s.fairness_adjusted_score,
                fairness_metrics: metrics,
                created_at,
            })
            .collect();

        tracing::info!(
            "create_fair_matches: {} assignments from {} mentors x {} mentees (parity {:.4}, {}ms)",
            assignments.len(),
            mentors.len(),
            mentees.len(),
            metrics.demographic_parity,
            started.elapsed().as_millis()
        );

        Ok(assignments)
    }

    /// Evaluate the engine against declared expectations
    pub async fn run_validation(&self, test_cases: &[ValidationTestCase]) -> Result<ValidationReport> {
        ValidationHarness::new(self, self.defaults).run(test_cases).await
    }

    /// Cache-busting hook for profile update events
    pub async fn invalidate_profile(&self, user_id: &str) {
        self.store.invalidate(user_id).await;
    }
}

/// Weighted-hybrid score for every mentor x mentee pair, mentor-major order
fn raw_scores(
    mentors: &[&FeatureVector],
    mentees: &[&FeatureVector],
    weights: &CategoryWeights,
) -> Result<Vec<RawScore>> {
    let mut scores = Vec::with_capacity(mentors.len() * mentees.len());
    for mentor in mentors {
        for mentee in mentees {
            scores.push(RawScore {
                mentor_id: mentor.user_id.clone(),
                mentee_id: mentee.user_id.clone(),
                score: score_with_weights(mentor, mentee, SimilarityAlgorithm::WeightedHybrid, weights)?,
            });
        }
    }
    Ok(scores)
}

#[async_trait]
impl MatchPipeline for MatchingEngine {
    async fn has_vector(&self, user_id: &str) -> Result<bool> {
        match self.store.get(user_id).await {
            Ok(_) => Ok(true),
            Err(MatchingError::NotFound(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }

    async fn find_matches(
        &self,
        criteria: &MatchingCriteria,
        limit: usize,
        threshold: f64,
        algorithm: SimilarityAlgorithm,
    ) -> Result<FindMatchesResponse> {
        MatchingEngine::find_matches(self, criteria, limit, threshold, algorithm).await
    }
}
