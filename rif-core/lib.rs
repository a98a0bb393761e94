//! Pixel containers, image pyramids and the record types shared by the RIF
//! detection, description and tracking crates.

mod buffer;
mod error;
mod filters;
mod pyramid;
mod types;

pub use buffer::{Pixel, PixelBuffer};
pub use error::{CoreError, CoreResult};
pub use filters::gaussian_kernel;
pub use pyramid::{ImagePyramid, PyramidSampler, TrilinearCache};
pub use types::{Frame, Keypoint, Match};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Row-major 8-bit grayscale image
pub type GrayImage = PixelBuffer<u8>;

#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct RuntimeConfig {
    pub n_threads: usize,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            n_threads: num_cpus::get().max(1),
        }
    }
}

/// Initialize Rayon thread pool with the specified number of threads
pub fn init_thread_pool(n_threads: usize) -> Result<(), rayon::ThreadPoolBuildError> {
    rayon::ThreadPoolBuilder::new()
        .num_threads(n_threads)
        .build_global()
}
