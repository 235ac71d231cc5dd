use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::models::{MatchFilters, MatchPreferences, MatchingCriteria, SimilarityAlgorithm, UserType};

#[derive(Parser, Debug)]
#[command(
    name = "mentor-match",
    version,
    about = "Fairness-aware mentor/mentee matching and evaluation"
)]
pub struct Cli {
    /// Settings file; defaults to config/default and config/local
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Fixture with vectors and profiles; overrides the configured source
    #[arg(long, global = true)]
    pub fixture: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Rank candidates for one user
    FindMatches(FindMatchesArgs),
    /// Fairness-adjusted one-to-one assignment over the whole pool
    FairMatches(FairMatchesArgs),
    /// Run validation test cases and print the report
    Validate(ValidateArgs),
}

#[derive(Args, Debug, Clone)]
pub struct FindMatchesArgs {
    #[arg(long)]
    pub user_id: String,

    #[arg(long)]
    pub limit: Option<usize>,

    #[arg(long)]
    pub threshold: Option<f64>,

    /// cosine, euclidean or weighted-hybrid
    #[arg(long)]
    pub algorithm: Option<SimilarityAlgorithm>,

    /// Match against this side instead of the counterpart
    #[arg(long, value_parser = parse_user_type)]
    pub target_type: Option<UserType>,

    #[arg(long = "exclude")]
    pub exclude_user_ids: Vec<String>,

    /// Only score these candidates
    #[arg(long = "candidate")]
    pub candidate_ids: Vec<String>,

    #[arg(long)]
    pub min_quality: Option<f64>,
}

impl FindMatchesArgs {
    pub fn criteria(&self) -> MatchingCriteria {
        MatchingCriteria {
            user_id: self.user_id.clone(),
            preferences: MatchPreferences {
                target_type: self.target_type,
            },
            weights: None,
            filters: MatchFilters {
                exclude_user_ids: self.exclude_user_ids.clone(),
                candidate_ids: (!self.candidate_ids.is_empty()).then(|| self.candidate_ids.clone()),
                min_quality_score: self.min_quality,
            },
        }
    }
}

#[derive(Args, Debug, Clone)]
pub struct FairMatchesArgs {
    /// JSON file with matching constraints; defaults apply when omitted
    #[arg(long)]
    pub constraints: Option<PathBuf>,
}

#[derive(Args, Debug, Clone)]
pub struct ValidateArgs {
    /// JSON file holding an array of test cases
    #[arg(long)]
    pub cases: PathBuf,

    /// Exit non-zero when any test case fails
    #[arg(long, default_value_t = false)]
    pub strict: bool,
}

fn parse_user_type(raw: &str) -> Result<UserType, String> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "mentor" => Ok(UserType::Mentor),
        "mentee" => Ok(UserType::Mentee),
        other => Err(format!("unknown user type: {}", other)),
    }
}
