// Core algorithm exports
pub mod assignment;
pub mod fairness;
pub mod matcher;
pub mod reasons;
pub mod similarity;
pub mod validation;

pub use assignment::assign;
pub use fairness::{CandidatePool, FairnessAdjuster, FairnessConfig, MatchPair};
pub use matcher::{MatchingDefaults, MatchingEngine};
pub use reasons::match_reasons;
pub use similarity::{confidence, cosine_similarity, euclidean_similarity, score, score_with_weights};
pub use validation::{classify_outcome, MatchPipeline, OutcomeTally, ValidationHarness};
