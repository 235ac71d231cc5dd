use thiserror::Error;

/// Errors surfaced by the matching engine
#[derive(Debug, Error)]
pub enum MatchingError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Data unavailable: {0}")]
    DataUnavailable(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Missing profiles: {}", .ids.join(", "))]
    MissingProfile { ids: Vec<String> },

    #[error("Not implemented: {0}")]
    NotImplemented(&'static str),
}

impl From<validator::ValidationErrors> for MatchingError {
    fn from(errors: validator::ValidationErrors) -> Self {
        MatchingError::InvalidInput(errors.to_string())
    }
}

pub type Result<T, E = MatchingError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_profile_lists_ids() {
        let err = MatchingError::MissingProfile {
            ids: vec!["a".to_string(), "b".to_string()],
        };
        assert_eq!(err.to_string(), "Missing profiles: a, b");
    }
}
