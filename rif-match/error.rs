use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum MatchError {
    #[error("Invalid hash bin size: {0}")]
    InvalidBinSize(usize),
    #[error("Invalid RANSAC configuration: {reason}")]
    InvalidRansacConfig { reason: String },
}

pub type MatchResult<T> = Result<T, MatchError>;
