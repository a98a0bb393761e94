use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum FastError {
    #[error("Invalid threshold: {0} (must be 1-127)")]
    InvalidThreshold(u8),
    #[error("Image {width}x{height} too small (minimum {min_size}x{min_size})")]
    ImageTooSmall { width: usize, height: usize, min_size: usize },
    #[error("Unsupported channel count {channels} (expected grayscale)")]
    UnsupportedChannels { channels: usize },
    #[error("Invalid NMS distance: {0} (must be finite and >= 0)")]
    InvalidNmsDistance(f32),
    #[error("Invalid maximum feature count: {0} (must be > 0)")]
    InvalidMaxFeatures(usize),
}

pub type FastResult<T> = Result<T, FastError>;
