use std::cmp::Ordering;
use std::collections::HashSet;

use crate::models::FairnessAdjustedScore;

/// Greedy one-to-one mentor/mentee assignment
///
/// Pairs are visited by descending `fairness_adjusted_score`; a pair is
/// accepted when neither side has been used yet. The sort is stable, so ties
/// keep their input order. NaN scores are visited last.
///
/// This approximates maximum-weight bipartite matching and is not globally
/// optimal.
pub fn assign(adjusted_scores: &[FairnessAdjustedScore]) -> Vec<FairnessAdjustedScore> {
    let mut order: Vec<&FairnessAdjustedScore> = adjusted_scores.iter().collect();
    order.sort_by(|a, b| compare_desc(a.fairness_adjusted_score, b.fairness_adjusted_score));

    let mut used_mentors: HashSet<&str> = HashSet::new();
    let mut used_mentees: HashSet<&str> = HashSet::new();
    let mut accepted = Vec::new();

    for candidate in order {
        if used_mentors.contains(candidate.mentor_id.as_str())
            || used_mentees.contains(candidate.mentee_id.as_str())
        {
            continue;
        }
        used_mentors.insert(candidate.mentor_id.as_str());
        used_mentees.insert(candidate.mentee_id.as_str());
        accepted.push(candidate.clone());
    }

    tracing::debug!(
        "Greedy assignment accepted {} of {} scored pairs",
        accepted.len(),
        adjusted_scores.len()
    );

    accepted
}

fn compare_desc(a: f64, b: f64) -> Ordering {
    match (a.is_nan(), b.is_nan()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (false, false) => b.partial_cmp(&a).unwrap_or(Ordering::Equal),
    }
}
