use rif_core::CoreError;
use rif_descriptor::DescriptorError;
use rif_track::TrackError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error("Tracking error: {0}")]
    Track(#[from] TrackError),
    #[error("Extraction error: {0}")]
    Descriptor(#[from] DescriptorError),
    #[error("Image buffer error: {0}")]
    Core(#[from] CoreError),
    #[error("Image codec error: {0}")]
    Image(#[from] image::ImageError),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Thread pool error: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
    #[error("Output buffer holds {actual} bytes, expected {expected}")]
    BufferSize { expected: usize, actual: usize },
    #[error("Cannot write {channels}-channel image as PGM/PPM")]
    UnsupportedChannels { channels: usize },
    #[error("Invalid config file {path}: {reason}")]
    Config { path: String, reason: String },
}

pub type CliResult<T> = Result<T, CliError>;
