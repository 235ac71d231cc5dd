use async_trait::async_trait;
use futures::future::join_all;
use std::collections::HashSet;
use std::time::Instant;

use crate::core::matcher::MatchingDefaults;
use crate::error::{MatchingError, Result};
use crate::models::{
    AccuracyMetrics, ExpectedMatchOutcome, FindMatchesResponse, MatchFilters, MatchPreferences,
    MatchingCriteria, MatchingResult, OutcomeClassification, OutcomeReport, SimilarityAlgorithm,
    TestCaseReport, ValidationReport, ValidationTestCase,
};

/// The matching operations the harness drives
#[async_trait]
pub trait MatchPipeline: Send + Sync {
    /// Whether a user has a feature vector the pipeline can score
    async fn has_vector(&self, user_id: &str) -> Result<bool>;

    async fn find_matches(
        &self,
        criteria: &MatchingCriteria,
        limit: usize,
        threshold: f64,
        algorithm: SimilarityAlgorithm,
    ) -> Result<FindMatchesResponse>;
}

/// Confusion counts for a set of outcomes
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct OutcomeTally {
    pub true_positives: usize,
    pub false_positives: usize,
    pub true_negatives: usize,
    pub false_negatives: usize,
}

impl OutcomeTally {
    pub fn record(&mut self, classification: OutcomeClassification) {
        match classification {
            OutcomeClassification::TruePositive => self.true_positives += 1,
            OutcomeClassification::FalsePositive => self.false_positives += 1,
            OutcomeClassification::TrueNegative => self.true_negatives += 1,
            OutcomeClassification::FalseNegative => self.false_negatives += 1,
        }
    }

    pub fn merge(self, other: OutcomeTally) -> OutcomeTally {
        OutcomeTally {
            true_positives: self.true_positives + other.true_positives,
            false_positives: self.false_positives + other.false_positives,
            true_negatives: self.true_negatives + other.true_negatives,
            false_negatives: self.false_negatives + other.false_negatives,
        }
    }

    pub fn total(&self) -> usize {
        self.true_positives + self.false_positives + self.true_negatives + self.false_negatives
    }

    pub fn passed(&self) -> usize {
        self.true_positives + self.true_negatives
    }

    /// Accuracy, precision, recall and F1, each 0 on a zero denominator
    pub fn metrics(&self) -> AccuracyMetrics {
        let tp = self.true_positives as f64;
        let fp = self.false_positives as f64;
        let fn_ = self.false_negatives as f64;

        let accuracy = ratio(self.passed() as f64, self.total() as f64);
        let precision = ratio(tp, tp + fp);
        let recall = ratio(tp, tp + fn_);
        let f1_score = ratio(2.0 * precision * recall, precision + recall);

        AccuracyMetrics {
            accuracy: round4(accuracy),
            precision: round4(precision),
            recall: round4(recall),
            f1_score: round4(f1_score),
            true_positives: self.true_positives,
            false_positives: self.false_positives,
            true_negatives: self.true_negatives,
            false_negatives: self.false_negatives,
        }
    }
}

fn ratio(numerator: f64, denominator: f64) -> f64 {
    if denominator > 0.0 {
        numerator / denominator
    } else {
        0.0
    }
}

fn round4(value: f64) -> f64 {
    (value * 10_000.0).round() / 10_000.0
}

/// Classify one expectation against what the engine returned
pub fn classify_outcome(expected: &ExpectedMatchOutcome, found: Option<&MatchingResult>) -> OutcomeReport {
    let (classification, message) = match (expected.should_match, found) {
        (true, Some(m)) if expected.score_in_band(m.score) => (
            OutcomeClassification::TruePositive,
            format!("Matched with score {:.4}", m.score),
        ),
        (true, Some(m)) => (
            OutcomeClassification::FalseNegative,
            format!(
                "Score {:.4} outside expected range [{}, {}]",
                m.score,
                bound(expected.expected_score_min),
                bound(expected.expected_score_max)
            ),
        ),
        (true, None) => (
            OutcomeClassification::FalseNegative,
            "Expected match not found (below threshold or outside the target user type)".to_string(),
        ),
        (false, None) => (
            OutcomeClassification::TrueNegative,
            "Correctly not matched".to_string(),
        ),
        (false, Some(m)) => (
            OutcomeClassification::FalsePositive,
            format!("Unexpected match with score {:.4}", m.score),
        ),
    };

    OutcomeReport {
        target_id: expected.target_id.clone(),
        should_match: expected.should_match,
        found: found.is_some(),
        observed_score: found.map(|m| m.score),
        passed: classification.is_pass(),
        classification,
        message,
        details: None,
    }
}

fn bound(value: Option<f64>) -> String {
    value.map_or_else(|| "-".to_string(), |v| format!("{:.4}", v))
}

/// Outcome report for an expectation whose case errored
fn errored_outcome(expected: &ExpectedMatchOutcome, case_id: &str, error: &MatchingError) -> OutcomeReport {
    let classification = if expected.should_match {
        OutcomeClassification::FalseNegative
    } else {
        OutcomeClassification::FalsePositive
    };

    OutcomeReport {
        target_id: expected.target_id.clone(),
        should_match: expected.should_match,
        found: false,
        observed_score: None,
        passed: false,
        classification,
        message: format!("Matching failed for test case {}", case_id),
        details: Some(error.to_string()),
    }
}

struct CaseResult {
    report: TestCaseReport,
    tally: OutcomeTally,
}

/// Runs declared expectations through a [`MatchPipeline`]
pub struct ValidationHarness<'a, P: MatchPipeline + ?Sized> {
    pipeline: &'a P,
    defaults: MatchingDefaults,
}

impl<'a, P: MatchPipeline + ?Sized> ValidationHarness<'a, P> {
    pub fn new(pipeline: &'a P, defaults: MatchingDefaults) -> Self {
        Self { pipeline, defaults }
    }

    /// Evaluate all test cases and build an immutable report
    ///
    /// Fails with [`MatchingError::MissingProfile`] before running anything if a
    /// case references users without vectors. Engine errors inside a case only
    /// fail that case.
    pub async fn run(&self, test_cases: &[ValidationTestCase]) -> Result<ValidationReport> {
        for case in test_cases {
            self.ensure_profiles(case).await?;
        }

        let results = join_all(test_cases.iter().map(|case| self.run_case(case))).await;

        let tally = results
            .iter()
            .fold(OutcomeTally::default(), |acc, r| acc.merge(r.tally));
        let test_case_reports: Vec<TestCaseReport> = results.into_iter().map(|r| r.report).collect();
        let passed_test_cases = test_case_reports.iter().filter(|r| r.passed).count();

        let report = ValidationReport {
            report_id: uuid::Uuid::new_v4(),
            generated_at: chrono::Utc::now(),
            total_test_cases: test_case_reports.len(),
            passed_test_cases,
            failed_test_cases: test_case_reports.len() - passed_test_cases,
            total_outcomes: tally.total(),
            passed_outcomes: tally.passed(),
            metrics: tally.metrics(),
            test_case_reports,
        };

        tracing::info!(
            "Validation {}: {}/{} cases passed, accuracy {:.4}, f1 {:.4}",
            report.report_id,
            report.passed_test_cases,
            report.total_test_cases,
            report.metrics.accuracy,
            report.metrics.f1_score
        );

        Ok(report)
    }

    async fn ensure_profiles(&self, case: &ValidationTestCase) -> Result<()> {
        let mut seen = HashSet::new();
        let mut missing = Vec::new();

        let ids = std::iter::once(&case.source_user_id).chain(case.candidate_user_ids.iter());
        for id in ids {
            if !seen.insert(id.as_str()) {
                continue;
            }
            if !self.pipeline.has_vector(id).await? {
                missing.push(id.clone());
            }
        }

        if missing.is_empty() {
            Ok(())
        } else {
            tracing::warn!("Test case {} references missing profiles: {:?}", case.id, missing);
            Err(MatchingError::MissingProfile { ids: missing })
        }
    }

    async fn run_case(&self, case: &ValidationTestCase) -> CaseResult {
        let started = Instant::now();

        let criteria = MatchingCriteria {
            preferences: MatchPreferences {
                target_type: case.target_type,
            },
            filters: MatchFilters {
                candidate_ids: Some(case.candidate_user_ids.clone()),
                ..MatchFilters::default()
            },
            ..MatchingCriteria::for_user(case.source_user_id.clone())
        };
        // Every candidate must be able to surface, so the limit never hides one
        let limit = case.limit.unwrap_or_else(|| case.candidate_user_ids.len().max(1));
        let threshold = case.threshold.unwrap_or(self.defaults.threshold);
        let algorithm = case.algorithm.unwrap_or(self.defaults.algorithm);

        let result = self
            .pipeline
            .find_matches(&criteria, limit, threshold, algorithm)
            .await;

        let (outcomes, error) = match result {
            Ok(response) => {
                let outcomes = case
                    .expected_outcomes
                    .iter()
                    .map(|expected| {
                        let found = response.matches.iter().find(|m| m.target_id == expected.target_id);
                        classify_outcome(expected, found)
                    })
                    .collect::<Vec<_>>();
                (outcomes, None)
            }
            Err(e) => {
                tracing::warn!("Test case {} failed with engine error: {}", case.id, e);
                let outcomes = case
                    .expected_outcomes
                    .iter()
                    .map(|expected| errored_outcome(expected, &case.id, &e))
                    .collect::<Vec<_>>();
                (outcomes, Some(e.to_string()))
            }
        };

        let mut tally = OutcomeTally::default();
        for outcome in &outcomes {
            tally.record(outcome.classification);
        }

        let report = TestCaseReport {
            test_case_id: case.id.clone(),
            name: case.name.clone(),
            passed: outcomes.iter().all(|o| o.passed),
            execution_time_ms: started.elapsed().as_millis() as u64,
            outcomes,
            error,
        };

        CaseResult { report, tally }
    }
}
