use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

use crate::models::domain::{CategoryWeights, SimilarityAlgorithm, UserType};

/// What kind of counterpart the querying user wants
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchPreferences {
    /// Defaults to the counterpart of the querying user's type
    #[serde(default)]
    pub target_type: Option<UserType>,
}

/// Hard filters applied before scoring
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct MatchFilters {
    #[serde(default)]
    pub exclude_user_ids: Vec<String>,
    /// Restricts scoring to exactly these candidates when set
    #[serde(default)]
    pub candidate_ids: Option<Vec<String>>,
    #[validate(range(min = 0.0, max = 100.0))]
    #[serde(default)]
    pub min_quality_score: Option<f64>,
}

/// Query-side description of what a user wants matched
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
#[validate(schema(function = "validate_criteria_weights"))]
pub struct MatchingCriteria {
    #[validate(length(min = 1))]
    pub user_id: String,
    #[serde(default)]
    pub preferences: MatchPreferences,
    #[serde(default)]
    pub weights: Option<CategoryWeights>,
    #[validate(nested)]
    #[serde(default)]
    pub filters: MatchFilters,
}

impl MatchingCriteria {
    pub fn for_user(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            preferences: MatchPreferences::default(),
            weights: None,
            filters: MatchFilters::default(),
        }
    }
}

fn validate_criteria_weights(criteria: &MatchingCriteria) -> Result<(), ValidationError> {
    match criteria.weights {
        Some(weights) if !weights.is_valid() => Err(ValidationError::new("negative_or_non_finite_weight")),
        _ => Ok(()),
    }
}

/// Policy knobs for one fair matching run
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct MatchingConstraints {
    #[validate(range(min = 0.0, max = 1.0))]
    pub max_demographic_imbalance: f64,
    #[validate(range(min = 0.0, max = 1.0))]
    pub min_equal_opportunity: f64,
    #[validate(range(min = 0.0, max = 1.0))]
    pub diversity_weight: f64,
    #[validate(range(min = 0.0))]
    pub skill_weight: f64,
    #[validate(range(min = 0.0))]
    pub preference_weight: f64,
}

impl MatchingConstraints {
    /// Hybrid weights with the skills and preference slots replaced
    pub fn category_weights(&self) -> CategoryWeights {
        CategoryWeights {
            skills: self.skill_weight,
            preference: self.preference_weight,
            ..CategoryWeights::default()
        }
    }
}

impl Default for MatchingConstraints {
    fn default() -> Self {
        Self {
            max_demographic_imbalance: 0.3,
            min_equal_opportunity: 0.8,
            diversity_weight: 0.3,
            skill_weight: 0.4,
            preference_weight: 0.15,
        }
    }
}

/// One declared expectation about a candidate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExpectedMatchOutcome {
    pub target_id: String,
    pub should_match: bool,
    #[serde(default)]
    pub expected_score_min: Option<f64>,
    #[serde(default)]
    pub expected_score_max: Option<f64>,
    #[serde(default)]
    pub reason: Option<String>,
}

impl ExpectedMatchOutcome {
    /// Inclusive band check; a missing bound is unbounded
    pub fn score_in_band(&self, score: f64) -> bool {
        self.expected_score_min.map_or(true, |min| score >= min)
            && self.expected_score_max.map_or(true, |max| score <= max)
    }
}

/// Declarative input for the validation harness
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationTestCase {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub source_user_id: String,
    pub candidate_user_ids: Vec<String>,
    pub expected_outcomes: Vec<ExpectedMatchOutcome>,
    #[serde(default)]
    pub threshold: Option<f64>,
    #[serde(default)]
    pub algorithm: Option<SimilarityAlgorithm>,
    #[serde(default)]
    pub limit: Option<usize>,
    /// Candidate type to search; defaults to the source user's counterpart
    #[serde(default)]
    pub target_type: Option<UserType>,
}
