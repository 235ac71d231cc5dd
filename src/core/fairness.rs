use std::collections::{BTreeMap, HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::error::{MatchingError, Result};
use crate::models::{
    Assignment, DemographicInfo, FairnessAdjustedScore, FairnessMetrics, MatchStatus,
    MatchingConstraints, Profile, RawScore,
};

/// Penalty applied to demographically near-identical pairs
pub const DEFAULT_DEMOGRAPHIC_PENALTY: f64 = 0.1;
/// Scale applied to the diversity bonus
pub const DEFAULT_DIVERSITY_SCALE: f64 = 0.2;

/// Tunable constants of the bias mitigation step
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FairnessConfig {
    #[serde(default = "default_demographic_penalty")]
    pub demographic_penalty: f64,
    #[serde(default = "default_diversity_scale")]
    pub diversity_scale: f64,
}

fn default_demographic_penalty() -> f64 { DEFAULT_DEMOGRAPHIC_PENALTY }
fn default_diversity_scale() -> f64 { DEFAULT_DIVERSITY_SCALE }

impl Default for FairnessConfig {
    fn default() -> Self {
        Self {
            demographic_penalty: DEFAULT_DEMOGRAPHIC_PENALTY,
            diversity_scale: DEFAULT_DIVERSITY_SCALE,
        }
    }
}

/// Anything that pairs a mentor with a mentee
pub trait MatchPair {
    fn mentor_id(&self) -> &str;
    fn mentee_id(&self) -> &str;
}

impl MatchPair for RawScore {
    fn mentor_id(&self) -> &str { &self.mentor_id }
    fn mentee_id(&self) -> &str { &self.mentee_id }
}

impl MatchPair for FairnessAdjustedScore {
    fn mentor_id(&self) -> &str { &self.mentor_id }
    fn mentee_id(&self) -> &str { &self.mentee_id }
}

impl MatchPair for Assignment {
    fn mentor_id(&self) -> &str { &self.mentor_id }
    fn mentee_id(&self) -> &str { &self.mentee_id }
}

#[derive(Debug, Default, Clone, Copy)]
struct HistoryTally {
    total: usize,
    completed: usize,
    cancelled: usize,
}

/// Candidate pool grouped by demographic key
///
/// Groups are kept in a `BTreeMap` so metric sums run in a stable order.
#[derive(Debug, Default, Clone)]
pub struct CandidatePool {
    groups: BTreeMap<String, Vec<String>>,
    membership: HashMap<String, String>,
    demographics: HashMap<String, DemographicInfo>,
    history: BTreeMap<String, HistoryTally>,
}

impl CandidatePool {
    pub fn from_profiles(profiles: &[Profile]) -> Self {
        let mut pool = CandidatePool::default();

        for profile in profiles {
            if pool.membership.contains_key(&profile.user_id) {
                continue;
            }
            let key = profile.demographics.group_key();

            pool.groups
                .entry(key.clone())
                .or_default()
                .push(profile.user_id.clone());
            pool.membership.insert(profile.user_id.clone(), key.clone());
            pool.demographics
                .insert(profile.user_id.clone(), profile.demographics.clone());

            let tally = pool.history.entry(key).or_default();
            for entry in &profile.match_history {
                tally.total += 1;
                match entry.status {
                    MatchStatus::Completed => tally.completed += 1,
                    MatchStatus::Cancelled => tally.cancelled += 1,
                    MatchStatus::Pending | MatchStatus::Active => {}
                }
            }
        }

        pool
    }

    pub fn is_empty(&self) -> bool {
        self.membership.is_empty()
    }

    pub fn group_count(&self) -> usize {
        self.groups.len()
    }

    pub fn group_of(&self, user_id: &str) -> Option<&str> {
        self.membership.get(user_id).map(String::as_str)
    }

    pub fn demographics_of(&self, user_id: &str) -> Option<&DemographicInfo> {
        self.demographics.get(user_id)
    }
}

/// Fraction of attributes, present on both sides, that match exactly
///
/// Returns 0 when no attribute is present on both sides.
pub fn demographic_similarity(a: &DemographicInfo, b: &DemographicInfo) -> f64 {
    let pairs = [
        (&a.gender, &b.gender),
        (&a.ethnicity, &b.ethnicity),
        (&a.experience_level, &b.experience_level),
    ];

    let mut compared = 0usize;
    let mut matching = 0usize;
    for (x, y) in pairs {
        if let (Some(x), Some(y)) = (x, y) {
            compared += 1;
            if x == y {
                matching += 1;
            }
        }
    }

    if compared == 0 {
        return 0.0;
    }
    matching as f64 / compared as f64
}

/// How evenly matches are spread across demographic groups
///
/// `1 - (sum_g |count_g - expected| / expected) / |groups|`, floored at 0,
/// with `expected = 2 * |matches| / |groups|`. Vacuously 1 for an empty pool
/// or an empty match set.
pub fn demographic_parity<M: MatchPair>(pool: &CandidatePool, matches: &[M]) -> f64 {
    let group_count = pool.group_count();
    if group_count == 0 || matches.is_empty() {
        return 1.0;
    }

    let mut counts: BTreeMap<&str, usize> = pool.groups.keys().map(|k| (k.as_str(), 0)).collect();
    for m in matches {
        for user_id in [m.mentor_id(), m.mentee_id()] {
            if let Some(group) = pool.group_of(user_id) {
                if let Some(count) = counts.get_mut(group) {
                    *count += 1;
                }
            }
        }
    }

    let expected = 2.0 * matches.len() as f64 / group_count as f64;
    let deviation: f64 = counts
        .values()
        .map(|count| (*count as f64 - expected).abs() / expected)
        .sum();

    (1.0 - deviation / group_count as f64).max(0.0)
}

/// Uniformity of per-group match rates
///
/// `1 - stddev(match_rate_g)`, floored at 0, where `match_rate_g` is the number
/// of matches touching group g divided by the group size.
pub fn equal_opportunity<M: MatchPair>(pool: &CandidatePool, matches: &[M]) -> f64 {
    if pool.group_count() == 0 {
        return 1.0;
    }

    let mut touching: HashMap<&str, usize> = HashMap::new();
    for m in matches {
        let groups: HashSet<&str> = [m.mentor_id(), m.mentee_id()]
            .into_iter()
            .filter_map(|id| pool.group_of(id))
            .collect();
        for group in groups {
            *touching.entry(group).or_default() += 1;
        }
    }

    let rates: Vec<f64> = pool
        .groups
        .iter()
        .map(|(key, members)| {
            touching.get(key.as_str()).copied().unwrap_or(0) as f64 / members.len() as f64
        })
        .collect();

    (1.0 - variance(&rates).sqrt()).max(0.0)
}

/// Agreement of historical completion and cancellation rates across groups
///
/// Per group `tpr = completed / total` and `fpr = cancelled / total` over the
/// members' match history. Groups with no history are left out.
pub fn equalizing_odds(pool: &CandidatePool) -> f64 {
    let (tprs, fprs): (Vec<f64>, Vec<f64>) = pool
        .history
        .values()
        .filter(|tally| tally.total > 0)
        .map(|tally| {
            let total = tally.total as f64;
            (tally.completed as f64 / total, tally.cancelled as f64 / total)
        })
        .unzip();

    if tprs.is_empty() {
        return 1.0;
    }

    (1.0 - (variance(&tprs).sqrt() + variance(&fprs).sqrt()) / 2.0).max(0.0)
}

/// Calibration has no agreed definition yet
pub fn calibration<M: MatchPair>(_pool: &CandidatePool, _matches: &[M]) -> Result<f64> {
    Err(MatchingError::NotImplemented("calibration fairness metric"))
}

/// Population variance, 0 for fewer than two values
fn variance(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n
}

/// Applies fairness penalties and diversity bonuses to raw scores
#[derive(Debug, Clone, Copy, Default)]
pub struct FairnessAdjuster {
    config: FairnessConfig,
}

impl FairnessAdjuster {
    pub fn new(config: FairnessConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &FairnessConfig {
        &self.config
    }

    /// Adjusted score for one pair given its demographic similarity
    pub fn adjust_score(
        &self,
        raw_score: f64,
        similarity: f64,
        constraints: &MatchingConstraints,
    ) -> f64 {
        let penalty = if similarity > 1.0 - constraints.max_demographic_imbalance {
            self.config.demographic_penalty
        } else {
            0.0
        };
        let bonus = (1.0 - similarity) * constraints.diversity_weight * self.config.diversity_scale;

        (raw_score * (1.0 - penalty) + bonus).clamp(0.0, 1.0)
    }

    /// Bias mitigation over a raw score set, preserving input order
    pub fn adjust(
        &self,
        pool: &CandidatePool,
        raw_scores: &[RawScore],
        constraints: &MatchingConstraints,
    ) -> Vec<FairnessAdjustedScore> {
        raw_scores
            .iter()
            .map(|raw| {
                let similarity = match (
                    pool.demographics_of(&raw.mentor_id),
                    pool.demographics_of(&raw.mentee_id),
                ) {
                    (Some(a), Some(b)) => demographic_similarity(a, b),
                    _ => 0.0,
                };

                FairnessAdjustedScore {
                    mentor_id: raw.mentor_id.clone(),
                    mentee_id: raw.mentee_id.clone(),
                    score: raw.score,
                    fairness_adjusted_score: self.adjust_score(raw.score, similarity, constraints),
                }
            })
            .collect()
    }

    /// Audit metrics for an accepted match set
    pub fn metrics<M: MatchPair>(&self, pool: &CandidatePool, matches: &[M]) -> FairnessMetrics {
        let calibration = match calibration(pool, matches) {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::trace!("Skipping calibration: {}", e);
                None
            }
        };

        FairnessMetrics {
            demographic_parity: demographic_parity(pool, matches),
            equal_opportunity: equal_opportunity(pool, matches),
            equalizing_odds: equalizing_odds(pool),
            calibration,
        }
    }
}
