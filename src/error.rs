use thiserror::Error;

/// Failures surfaced by the odds aggregator
#[derive(Debug, Error)]
pub enum AggregatorError {
    #[error("match not found: {0}")]
    MatchNotFound(String),

    #[error("bookmaker not found: {0}")]
    BookmakerNotFound(String),

    /// Only produced by the strict parsers; the lenient ones default instead
    #[error("invalid value for {field}: {value:?}")]
    InvalidInput { field: &'static str, value: String },

    /// Whatever the content provider failed with, passed through as is
    #[error(transparent)]
    Provider(#[from] anyhow::Error),
}

impl AggregatorError {
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            AggregatorError::MatchNotFound(_) | AggregatorError::BookmakerNotFound(_)
        )
    }
}

pub type Result<T, E = AggregatorError> = std::result::Result<T, E>;
