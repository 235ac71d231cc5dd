use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::models::domain::SimilarityAlgorithm;

/// One scored candidate for a queried user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchingResult {
    pub target_id: String,
    pub score: f64,
    pub confidence: f64,
    pub reasons: Vec<String>,
    #[serde(default)]
    pub metadata: BTreeMap<String, serde_json::Value>,
}

/// Output of a find-matches call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FindMatchesResponse {
    pub matches: Vec<MatchingResult>,
    pub total_processed: usize,
    pub execution_time_ms: u64,
    pub algorithm: SimilarityAlgorithm,
}

/// How an observed outcome relates to its expectation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeClassification {
    TruePositive,
    TrueNegative,
    FalsePositive,
    FalseNegative,
}

impl OutcomeClassification {
    pub fn is_pass(&self) -> bool {
        matches!(
            self,
            OutcomeClassification::TruePositive | OutcomeClassification::TrueNegative
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutcomeReport {
    pub target_id: String,
    pub should_match: bool,
    pub found: bool,
    pub observed_score: Option<f64>,
    pub passed: bool,
    pub classification: OutcomeClassification,
    pub message: String,
    #[serde(default)]
    pub details: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestCaseReport {
    pub test_case_id: String,
    pub name: String,
    pub passed: bool,
    pub execution_time_ms: u64,
    pub outcomes: Vec<OutcomeReport>,
    #[serde(default)]
    pub error: Option<String>,
}

/// Aggregate classification statistics, rounded to 4 decimals
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccuracyMetrics {
    pub accuracy: f64,
    pub precision: f64,
    pub recall: f64,
    pub f1_score: f64,
    pub true_positives: usize,
    pub false_positives: usize,
    pub true_negatives: usize,
    pub false_negatives: usize,
}

/// Result of one validation run; never mutated after construction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationReport {
    pub report_id: uuid::Uuid,
    pub generated_at: DateTime<Utc>,
    pub total_test_cases: usize,
    pub passed_test_cases: usize,
    pub failed_test_cases: usize,
    pub total_outcomes: usize,
    pub passed_outcomes: usize,
    pub metrics: AccuracyMetrics,
    pub test_case_reports: Vec<TestCaseReport>,
}
