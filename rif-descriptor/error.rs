use rif_core::CoreError;
use rif_fast::FastError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DescriptorError {
    #[error("Unknown cell configuration: {0}")]
    UnknownCellConfig(String),
    #[error(
        "Invalid cell geometry: patch_size={patch_size}, num_radii={num_radii}, num_angles={num_angles}"
    )]
    InvalidGeometry {
        patch_size: usize,
        num_radii: usize,
        num_angles: usize,
    },
    #[error("Invalid scale space: {num_octaves} octaves x {scales_per_octave} scales per octave")]
    InvalidScaleSpace {
        num_octaves: usize,
        scales_per_octave: usize,
    },
    #[error("{what} dimension {dim} exceeds the 255 limit of the binary format")]
    DimensionTooLarge { what: &'static str, dim: usize },
    #[error("Index {index} is repeated or out of range for {len} entries")]
    InvalidIndex { index: usize, len: usize },
    #[error("Detector error: {0}")]
    Detector(#[from] FastError),
    #[error("Image error: {0}")]
    Core(#[from] CoreError),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type DescriptorResult<T> = Result<T, DescriptorError>;
