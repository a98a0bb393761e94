use rif_descriptor::DescriptorError;
use rif_match::MatchError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TrackError {
    #[error("Invalid configuration: {reason}")]
    InvalidConfig { reason: String },
    #[error("{images} reference images but {labels} labels")]
    LabelCountMismatch { images: usize, labels: usize },
    #[error("Operation cancelled")]
    Cancelled,
    #[error("Feature extraction failed: {0}")]
    Extraction(#[from] DescriptorError),
    #[error("Matching failed: {0}")]
    Matching(#[from] MatchError),
    #[error("Image decoding failed: {0}")]
    Image(#[from] image::ImageError),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type TrackResult<T> = Result<T, TrackError>;
