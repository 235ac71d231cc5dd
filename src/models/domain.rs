use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Which side of the mentorship a user sits on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserType {
    Mentor,
    Mentee,
}

impl UserType {
    /// The side a user of this type gets matched against
    pub fn counterpart(self) -> Self {
        match self {
            UserType::Mentor => UserType::Mentee,
            UserType::Mentee => UserType::Mentor,
        }
    }
}

impl fmt::Display for UserType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UserType::Mentor => write!(f, "mentor"),
            UserType::Mentee => write!(f, "mentee"),
        }
    }
}

/// Feature categories, in the fixed order they are concatenated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeatureCategory {
    Skills,
    Experience,
    Availability,
    Preference,
    Reputation,
    Engagement,
}

impl FeatureCategory {
    pub const ALL: [FeatureCategory; 6] = [
        FeatureCategory::Skills,
        FeatureCategory::Experience,
        FeatureCategory::Availability,
        FeatureCategory::Preference,
        FeatureCategory::Reputation,
        FeatureCategory::Engagement,
    ];
}

/// Numeric encoding of a profile, split by category
///
/// A category is absent when the upstream profile has nothing to encode for it.
/// An empty sub-vector is treated the same as an absent one.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeatureSet {
    #[serde(rename = "skillsVector", default)]
    pub skills: Option<Vec<f64>>,
    #[serde(rename = "experienceVector", default)]
    pub experience: Option<Vec<f64>>,
    #[serde(rename = "availabilityVector", default)]
    pub availability: Option<Vec<f64>>,
    #[serde(rename = "preferenceVector", default)]
    pub preference: Option<Vec<f64>>,
    #[serde(rename = "reputationVector", default)]
    pub reputation: Option<Vec<f64>>,
    #[serde(rename = "engagementVector", default)]
    pub engagement: Option<Vec<f64>>,
}

impl FeatureSet {
    /// Sub-vector for a category, `None` when absent or empty
    pub fn category(&self, category: FeatureCategory) -> Option<&[f64]> {
        let slot = match category {
            FeatureCategory::Skills => &self.skills,
            FeatureCategory::Experience => &self.experience,
            FeatureCategory::Availability => &self.availability,
            FeatureCategory::Preference => &self.preference,
            FeatureCategory::Reputation => &self.reputation,
            FeatureCategory::Engagement => &self.engagement,
        };
        slot.as_deref().filter(|v| !v.is_empty())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VectorMetadata {
    /// Profile quality in [0, 100]
    pub quality_score: f64,
    pub last_updated: DateTime<Utc>,
}

/// Per-user feature vector as produced by the upstream profile encoder
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeatureVector {
    pub user_id: String,
    pub user_type: UserType,
    pub features: FeatureSet,
    pub metadata: VectorMetadata,
}

/// Demographic attributes used for grouping only
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DemographicInfo {
    #[serde(default)]
    pub gender: Option<String>,
    #[serde(default)]
    pub ethnicity: Option<String>,
    #[serde(default)]
    pub experience_level: Option<String>,
}

impl DemographicInfo {
    /// Group key `gender_ethnicity_experienceLevel`, `unknown` for gaps
    pub fn group_key(&self) -> String {
        let part = |v: &Option<String>| v.clone().unwrap_or_else(|| "unknown".to_string());
        format!(
            "{}_{}_{}",
            part(&self.gender),
            part(&self.ethnicity),
            part(&self.experience_level)
        )
    }
}

/// Lifecycle state of a past or ongoing mentorship
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchStatus {
    Pending,
    Active,
    Completed,
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchHistoryEntry {
    pub partner_id: String,
    pub status: MatchStatus,
}

/// Profile attributes the fairness path needs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    pub user_id: String,
    pub user_type: UserType,
    #[serde(default)]
    pub demographics: DemographicInfo,
    #[serde(default)]
    pub match_history: Vec<MatchHistoryEntry>,
}

/// Filter passed to bulk profile loads
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileFilter {
    #[serde(default)]
    pub user_type: Option<UserType>,
    #[serde(default)]
    pub user_ids: Vec<String>,
}

impl ProfileFilter {
    pub fn accepts(&self, profile: &Profile) -> bool {
        if let Some(user_type) = self.user_type {
            if profile.user_type != user_type {
                return false;
            }
        }
        self.user_ids.is_empty() || self.user_ids.contains(&profile.user_id)
    }
}

/// Compatibility of one mentor/mentee pair before fairness adjustment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawScore {
    pub mentor_id: String,
    pub mentee_id: String,
    pub score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FairnessAdjustedScore {
    pub mentor_id: String,
    pub mentee_id: String,
    pub score: f64,
    pub fairness_adjusted_score: f64,
}

/// Audit figures attached to an assignment batch
///
/// `calibration` has no agreed definition yet and is always reported as absent.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FairnessMetrics {
    pub demographic_parity: f64,
    pub equal_opportunity: f64,
    pub equalizing_odds: f64,
    pub calibration: Option<f64>,
}

/// Per-category weights for the weighted-hybrid algorithm
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryWeights {
    pub skills: f64,
    pub experience: f64,
    pub availability: f64,
    pub preference: f64,
    pub reputation: f64,
    pub engagement: f64,
}

impl CategoryWeights {
    pub fn weight(&self, category: FeatureCategory) -> f64 {
        match category {
            FeatureCategory::Skills => self.skills,
            FeatureCategory::Experience => self.experience,
            FeatureCategory::Availability => self.availability,
            FeatureCategory::Preference => self.preference,
            FeatureCategory::Reputation => self.reputation,
            FeatureCategory::Engagement => self.engagement,
        }
    }

    pub fn is_valid(&self) -> bool {
        FeatureCategory::ALL
            .iter()
            .all(|c| self.weight(*c).is_finite() && self.weight(*c) >= 0.0)
    }
}

impl Default for CategoryWeights {
    fn default() -> Self {
        Self {
            skills: 0.40,
            experience: 0.20,
            availability: 0.15,
            preference: 0.15,
            reputation: 0.05,
            engagement: 0.05,
        }
    }
}

/// Pairwise similarity algorithm
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SimilarityAlgorithm {
    Cosine,
    Euclidean,
    #[default]
    WeightedHybrid,
}

impl SimilarityAlgorithm {
    pub fn as_str(&self) -> &'static str {
        match self {
            SimilarityAlgorithm::Cosine => "cosine",
            SimilarityAlgorithm::Euclidean => "euclidean",
            SimilarityAlgorithm::WeightedHybrid => "weighted-hybrid",
        }
    }
}

impl fmt::Display for SimilarityAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for SimilarityAlgorithm {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "cosine" => Ok(SimilarityAlgorithm::Cosine),
            "euclidean" => Ok(SimilarityAlgorithm::Euclidean),
            "weighted-hybrid" | "weighted_hybrid" | "hybrid" => Ok(SimilarityAlgorithm::WeightedHybrid),
            other => Err(format!("unknown similarity algorithm: {}", other)),
        }
    }
}

/// Confirmed mentor/mentee pairing produced by the fair matching pass
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Assignment {
    pub id: uuid::Uuid,
    pub mentor_id: String,
    pub mentee_id: String,
    pub compatibility_score: f64,
    pub fairness_score: f64,
    pub fairness_metrics: FairnessMetrics,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_group_key_fills_unknown() {
        let info = DemographicInfo {
            gender: Some("female".to_string()),
            ethnicity: None,
            experience_level: Some("senior".to_string()),
        };
        assert_eq!(info.group_key(), "female_unknown_senior");
        assert_eq!(DemographicInfo::default().group_key(), "unknown_unknown_unknown");
    }

    #[test]
    fn test_empty_category_is_absent() {
        let features = FeatureSet {
            skills: Some(vec![]),
            experience: Some(vec![1.0, 2.0]),
            reputation: Some(vec![3.0]),
            ..Default::default()
        };
        assert!(features.category(FeatureCategory::Skills).is_none());
        assert!(features.category(FeatureCategory::Engagement).is_none());
        assert_eq!(features.category(FeatureCategory::Experience), Some(&[1.0, 2.0][..]));
    }

    #[test]
    fn test_default_weights_sum_to_one() {
        let weights = CategoryWeights::default();
        let sum: f64 = FeatureCategory::ALL.iter().map(|c| weights.weight(*c)).sum();
        assert!((sum - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_feature_vector_wire_names() {
        let json = r#"{
            "userId": "m1",
            "userType": "mentor",
            "features": { "skillsVector": [1.0, 0.5] },
            "metadata": { "qualityScore": 80.0, "lastUpdated": "2024-01-01T00:00:00Z" }
        }"#;
        let vector: FeatureVector = serde_json::from_str(json).unwrap();
        assert_eq!(vector.user_type, UserType::Mentor);
        assert_eq!(vector.features.skills, Some(vec![1.0, 0.5]));
        assert!(vector.features.engagement.is_none());
    }

    #[test]
    fn test_algorithm_parsing() {
        assert_eq!("cosine".parse::<SimilarityAlgorithm>(), Ok(SimilarityAlgorithm::Cosine));
        assert_eq!("Weighted-Hybrid".parse::<SimilarityAlgorithm>(), Ok(SimilarityAlgorithm::WeightedHybrid));
        assert!("manhattan".parse::<SimilarityAlgorithm>().is_err());
        assert_eq!(
            serde_json::to_string(&SimilarityAlgorithm::WeightedHybrid).unwrap(),
            "\"weighted-hybrid\""
        );
    }

    #[test]
    fn test_profile_filter() {
        let profile = Profile {
            user_id: "u1".to_string(),
            user_type: UserType::Mentee,
            demographics: DemographicInfo::default(),
            match_history: vec![],
        };
        assert!(ProfileFilter::default().accepts(&profile));
        assert!(!ProfileFilter { user_type: Some(UserType::Mentor), user_ids: vec![] }.accepts(&profile));
        assert!(!ProfileFilter { user_type: None, user_ids: vec!["u2".to_string()] }.accepts(&profile));
    }
}
