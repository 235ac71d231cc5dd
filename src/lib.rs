//! Mentor Match - fairness-aware mentor/mentee matching engine
//!
//! Scores mentor/mentee compatibility from pre-computed feature vectors,
//! adjusts scores for demographic fairness, produces one-to-one assignments
//! and evaluates the whole pipeline against declared expectations.

pub mod cli;
pub mod config;
pub mod core;
pub mod error;
pub mod models;
pub mod services;

// Re-export commonly used types
pub use crate::core::{FairnessAdjuster, MatchingDefaults, MatchingEngine};
pub use error::{MatchingError, Result};
pub use models::{
    Assignment, FeatureVector, FindMatchesResponse, MatchingConstraints, MatchingCriteria,
    SimilarityAlgorithm, ValidationReport, ValidationTestCase,
};
pub use services::{FeatureVectorStore, InMemorySource, ProfileServiceClient};
