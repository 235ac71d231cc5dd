// Model exports
pub mod domain;
pub mod requests;
pub mod responses;

pub use domain::{
    Assignment, CategoryWeights, DemographicInfo, FairnessAdjustedScore, FairnessMetrics,
    FeatureCategory, FeatureSet, FeatureVector, MatchHistoryEntry, MatchStatus, Profile,
    ProfileFilter, RawScore, SimilarityAlgorithm, UserType, VectorMetadata,
};
pub use requests::{
    ExpectedMatchOutcome, MatchFilters, MatchPreferences, MatchingConstraints, MatchingCriteria,
    ValidationTestCase,
};
pub use responses::{
    AccuracyMetrics, FindMatchesResponse, MatchingResult, OutcomeClassification, OutcomeReport,
    TestCaseReport, ValidationReport,
};
