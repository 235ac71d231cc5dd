use crate::core::similarity::category_similarity;
use crate::models::{FeatureCategory, FeatureVector};

const SKILLS_THRESHOLD: f64 = 0.7;
const EXPERIENCE_THRESHOLD: f64 = 0.6;
const AVAILABILITY_THRESHOLD: f64 = 0.5;
const PREFERENCE_THRESHOLD: f64 = 0.6;
const REPUTATION_SUM_THRESHOLD: f64 = 2.0;
const ENGAGEMENT_MEAN_THRESHOLD: f64 = 0.7;

pub const FALLBACK_REASON: &str = "General compatibility";

/// Human-readable reasons why `candidate` suits `source`
///
/// Rules fire in a fixed order. Categories that cannot be compared (absent or
/// mismatched) simply do not fire.
pub fn match_reasons(source: &FeatureVector, candidate: &FeatureVector) -> Vec<String> {
    let mut reasons = Vec::new();
    let sim = |category| category_similarity(source, candidate, category).ok().flatten();

    if let Some(skills) = sim(FeatureCategory::Skills).filter(|s| *s > SKILLS_THRESHOLD) {
        reasons.push(format!(
            "Strong skills alignment ({}% match)",
            (skills * 100.0).round() as u32
        ));
    }

    if sim(FeatureCategory::Experience).is_some_and(|s| s > EXPERIENCE_THRESHOLD) {
        reasons.push("Compatible experience levels".to_string());
    }

    if sim(FeatureCategory::Availability).is_some_and(|s| s > AVAILABILITY_THRESHOLD) {
        reasons.push("Overlapping availability".to_string());
    }

    if sim(FeatureCategory::Preference).is_some_and(|s| s > PREFERENCE_THRESHOLD) {
        reasons.push("Aligned preferences".to_string());
    }

    if let Some(reputation) = candidate.features.category(FeatureCategory::Reputation) {
        if reputation.iter().sum::<f64>() > REPUTATION_SUM_THRESHOLD {
            reasons.push("High reputation score".to_string());
        }
    }

    if let Some(engagement) = candidate.features.category(FeatureCategory::Engagement) {
        let mean = engagement.iter().sum::<f64>() / engagement.len() as f64;
        if mean > ENGAGEMENT_MEAN_THRESHOLD {
            reasons.push("Highly engaged on the platform".to_string());
        }
    }

    if reasons.is_empty() {
        reasons.push(FALLBACK_REASON.to_string());
    }

    reasons
}
