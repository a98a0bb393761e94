use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoreError {
    #[error("Invalid image dimensions: {width}x{height}x{channels} (must be > 0)")]
    InvalidDimensions { width: usize, height: usize, channels: usize },
    #[error("Buffer length mismatch: expected {expected_len}, got {actual_len}")]
    InvalidBufferLength { expected_len: usize, actual_len: usize },
    #[error("Row stride {stride} is smaller than row width {width}")]
    InvalidStride { stride: usize, width: usize },
    #[error("Pixel ({x}, {y}, {channel}) out of bounds for {width}x{height}x{channels} buffer")]
    OutOfBounds {
        x: isize,
        y: isize,
        channel: usize,
        width: usize,
        height: usize,
        channels: usize,
    },
    #[error("Region x=[{x0}, {x1}) y=[{y0}, {y1}) does not fit a {width}x{height} buffer")]
    InvalidRegion {
        x0: usize,
        x1: usize,
        y0: usize,
        y1: usize,
        width: usize,
        height: usize,
    },
    #[error("Channel count mismatch: expected {expected}, got {actual}")]
    ChannelMismatch { expected: usize, actual: usize },
}

pub type CoreResult<T> = Result<T, CoreError>;
