// Unit tests for Mentor Match

use chrono::Utc;
use mentor_match::core::{
    assign,
    fairness::{demographic_parity, equal_opportunity, equalizing_odds, CandidatePool},
    similarity::{cosine_similarity, euclidean_similarity, weighted_hybrid_similarity},
    classify_outcome, score, FairnessAdjuster, OutcomeTally,
};
use mentor_match::models::{
    CategoryWeights, DemographicInfo, ExpectedMatchOutcome, FairnessAdjustedScore, FeatureSet,
    FeatureVector, MatchingConstraints, MatchingResult, Profile, RawScore, SimilarityAlgorithm,
    UserType, VectorMetadata,
};
use std::collections::{BTreeMap, HashSet};

fn create_vector(id: &str, user_type: UserType, features: FeatureSet) -> FeatureVector {
    FeatureVector {
        user_id: id.to_string(),
        user_type,
        features,
        metadata: VectorMetadata {
            quality_score: 80.0,
            last_updated: Utc::now(),
        },
    }
}

fn create_profile(id: &str, user_type: UserType, gender: &str) -> Profile {
    Profile {
        user_id: id.to_string(),
        user_type,
        demographics: DemographicInfo {
            gender: Some(gender.to_string()),
            ..Default::default()
        },
        match_history: vec![],
    }
}

fn pair(mentor: &str, mentee: &str) -> RawScore {
    RawScore {
        mentor_id: mentor.to_string(),
        mentee_id: mentee.to_string(),
        score: 0.5,
    }
}

fn adjusted(mentor: &str, mentee: &str, value: f64) -> FairnessAdjustedScore {
    FairnessAdjustedScore {
        mentor_id: mentor.to_string(),
        mentee_id: mentee.to_string(),
        score: value,
        fairness_adjusted_score: value,
    }
}

#[test]
fn test_zero_vectors_have_zero_cosine() {
    let zeros = vec![0.0; 8];
    let sim = cosine_similarity(&zeros, &zeros).unwrap();
    assert_eq!(sim, 0.0);
    assert!(!sim.is_nan());
}

#[test]
fn test_identical_vectors_score_one() {
    let features = FeatureSet {
        skills: Some(vec![0.3, 0.9, 0.1]),
        experience: Some(vec![0.5, 0.5]),
        engagement: Some(vec![0.7]),
        ..Default::default()
    };
    let a = create_vector("a", UserType::Mentor, features.clone());
    let b = create_vector("b", UserType::Mentee, features);

    assert!((score(&a, &b, SimilarityAlgorithm::Cosine).unwrap() - 1.0).abs() < 1e-12);
    assert_eq!(score(&a, &b, SimilarityAlgorithm::Euclidean).unwrap(), 1.0);
    assert!((score(&a, &b, SimilarityAlgorithm::WeightedHybrid).unwrap() - 1.0).abs() < 1e-12);
}

#[test]
fn test_euclidean_decreases_with_distance() {
    let origin = [0.0, 0.0];
    let near = euclidean_similarity(&origin, &[0.0, 1.0]).unwrap();
    let far = euclidean_similarity(&origin, &[0.0, 3.0]).unwrap();
    assert_eq!(near, 0.5);
    assert_eq!(far, 0.25);
}

#[test]
fn test_hybrid_ignores_categories_missing_on_either_side() {
    let shared_skills = vec![1.0, 0.0];
    let a = create_vector(
        "a",
        UserType::Mentor,
        FeatureSet {
            skills: Some(shared_skills.clone()),
            experience: Some(vec![1.0, 0.0]),
            ..Default::default()
        },
    );
    let b = create_vector(
        "b",
        UserType::Mentee,
        FeatureSet {
            skills: Some(shared_skills),
            preference: Some(vec![0.0, 1.0]),
            ..Default::default()
        },
    );

    // Only skills is on both sides, so the missing categories neither add nor dilute
    let sim = weighted_hybrid_similarity(&a, &b, &CategoryWeights::default()).unwrap();
    assert!((sim - 1.0).abs() < 1e-12);
}

#[test]
fn test_hybrid_independent_of_category_declaration_order() {
    let a: FeatureSet = serde_json::from_str(
        r#"{ "engagementVector": [0.2, 0.4], "skillsVector": [1.0, 0.5], "experienceVector": [0.1, 0.9] }"#,
    )
    .unwrap();
    let b: FeatureSet = serde_json::from_str(
        r#"{ "skillsVector": [0.8, 0.1], "experienceVector": [0.5, 0.5], "engagementVector": [0.9, 0.1] }"#,
    )
    .unwrap();
    let a_reordered: FeatureSet = serde_json::from_str(
        r#"{ "experienceVector": [0.1, 0.9], "skillsVector": [1.0, 0.5], "engagementVector": [0.2, 0.4] }"#,
    )
    .unwrap();

    let weights = CategoryWeights::default();
    let mentee = create_vector("e", UserType::Mentee, b);
    let first = weighted_hybrid_similarity(&create_vector("m", UserType::Mentor, a), &mentee, &weights).unwrap();
    let second =
        weighted_hybrid_similarity(&create_vector("m", UserType::Mentor, a_reordered), &mentee, &weights).unwrap();
    assert_eq!(first, second);
}

#[test]
fn test_parity_decreases_as_imbalance_grows() {
    let pool = CandidatePool::from_profiles(&[
        create_profile("ma", UserType::Mentor, "a"),
        create_profile("ea", UserType::Mentee, "a"),
        create_profile("mb", UserType::Mentor, "b"),
        create_profile("eb", UserType::Mentee, "b"),
        create_profile("mc", UserType::Mentor, "c"),
        create_profile("ec", UserType::Mentee, "c"),
    ]);

    let balanced = demographic_parity(&pool, &[pair("ma", "eb"), pair("mb", "ec"), pair("mc", "ea")]);
    let mild = demographic_parity(&pool, &[pair("ma", "eb"), pair("mb", "ea"), pair("ma", "ec")]);
    let heavy = demographic_parity(&pool, &[pair("ma", "ea"), pair("ma", "ea"), pair("mb", "ea")]);

    assert_eq!(balanced, 1.0);
    assert!((mild - 2.0 / 3.0).abs() < 1e-12);
    assert_eq!(heavy, 0.0);
    assert!(balanced > mild && mild > heavy);
}

#[test]
fn test_equal_rates_are_perfect_regardless_of_level() {
    let pool = CandidatePool::from_profiles(&[
        create_profile("ma", UserType::Mentor, "f"),
        create_profile("ea", UserType::Mentee, "f"),
        create_profile("mb", UserType::Mentor, "m"),
        create_profile("eb", UserType::Mentee, "m"),
        create_profile("mb2", UserType::Mentor, "m"),
        create_profile("eb2", UserType::Mentee, "m"),
    ]);

    // both groups at rate 0.5
    assert_eq!(equal_opportunity(&pool, &[pair("ma", "eb"), pair("mb", "eb2")]), 1.0);
    // both groups at rate 1.0
    assert_eq!(
        equal_opportunity(&pool, &[pair("ma", "eb"), pair("mb", "ea"), pair("mb2", "eb2"), pair("mb", "eb")]),
        1.0
    );
    // unequal rates lose points
    assert!(equal_opportunity(&pool, &[pair("mb", "eb")]) < 1.0);
}

#[test]
fn test_empty_pool_is_vacuously_fair() {
    let pool = CandidatePool::from_profiles(&[]);
    let matches = [pair("m", "e")];

    assert_eq!(demographic_parity(&pool, &matches), 1.0);
    assert_eq!(equal_opportunity(&pool, &matches), 1.0);
    assert_eq!(equalizing_odds(&pool), 1.0);

    let metrics = FairnessAdjuster::default().metrics(&pool, &matches);
    assert!(metrics.calibration.is_none());
}

#[test]
fn test_adjusted_scores_stay_in_unit_range() {
    let pool = CandidatePool::from_profiles(&[
        create_profile("m1", UserType::Mentor, "f"),
        create_profile("e1", UserType::Mentee, "f"),
        create_profile("e2", UserType::Mentee, "m"),
    ]);
    let constraints = MatchingConstraints {
        diversity_weight: 1.0,
        ..MatchingConstraints::default()
    };
    let raw = vec![
        RawScore { mentor_id: "m1".into(), mentee_id: "e1".into(), score: 1.0 },
        RawScore { mentor_id: "m1".into(), mentee_id: "e2".into(), score: 0.95 },
        RawScore { mentor_id: "m1".into(), mentee_id: "ghost".into(), score: 0.0 },
    ];

    let adjusted = FairnessAdjuster::default().adjust(&pool, &raw, &constraints);
    assert_eq!(adjusted.len(), 3);
    // same gender: penalized, no bonus
    assert!((adjusted[0].fairness_adjusted_score - 0.9).abs() < 1e-12);
    // different gender: full bonus, clamped
    assert_eq!(adjusted[1].fairness_adjusted_score, 1.0);
    for a in &adjusted {
        assert!((0.0..=1.0).contains(&a.fairness_adjusted_score));
    }
}

#[test]
fn test_assignment_is_one_to_one_and_deterministic() {
    let mut scores = Vec::new();
    for (m, mentor) in ["m1", "m2", "m3"].iter().enumerate() {
        for (e, mentee) in ["e1", "e2"].iter().enumerate() {
            scores.push(adjusted(mentor, mentee, ((m * 3 + e * 5) % 7) as f64 / 7.0));
        }
    }

    let first = assign(&scores);
    let second = assign(&scores);
    assert_eq!(first, second);
    assert!(first.len() <= 2);

    let mentors: HashSet<_> = first.iter().map(|a| a.mentor_id.as_str()).collect();
    let mentees: HashSet<_> = first.iter().map(|a| a.mentee_id.as_str()).collect();
    assert_eq!(mentors.len(), first.len());
    assert_eq!(mentees.len(), first.len());
}

#[test]
fn test_singleton_pool_round_trip() {
    for value in [0.0, 0.01, 0.99] {
        let accepted = assign(&[adjusted("m", "e", value)]);
        assert_eq!(accepted, vec![adjusted("m", "e", value)]);
    }
}

fn expectation(should_match: bool, min: Option<f64>) -> ExpectedMatchOutcome {
    ExpectedMatchOutcome {
        target_id: "t".to_string(),
        should_match,
        expected_score_min: min,
        expected_score_max: None,
        reason: None,
    }
}

fn found(score: f64) -> MatchingResult {
    MatchingResult {
        target_id: "t".to_string(),
        score,
        confidence: score,
        reasons: vec![],
        metadata: BTreeMap::new(),
    }
}

#[test]
fn test_single_true_positive_is_perfect() {
    let outcome = classify_outcome(&expectation(true, Some(0.8)), Some(&found(0.9)));
    assert!(outcome.passed);

    let mut tally = OutcomeTally::default();
    tally.record(outcome.classification);
    let metrics = tally.metrics();
    assert_eq!(metrics.true_positives, 1);
    assert_eq!(metrics.accuracy, 1.0);
    assert_eq!(metrics.precision, 1.0);
    assert_eq!(metrics.recall, 1.0);
    assert_eq!(metrics.f1_score, 1.0);
}

#[test]
fn test_unexpected_match_zeroes_precision() {
    let outcome = classify_outcome(&expectation(false, None), Some(&found(0.6)));
    assert!(!outcome.passed);

    let mut tally = OutcomeTally::default();
    tally.record(outcome.classification);
    let metrics = tally.metrics();
    assert_eq!(metrics.false_positives, 1);
    assert_eq!(metrics.precision, 0.0);
    assert_eq!(metrics.accuracy, 0.0);
}
