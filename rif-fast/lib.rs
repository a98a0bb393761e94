//! FAST segment-test corner detection.
//!
//! [`FastDetector`] runs the raw FAST-9/FAST-12 test with binary-searched
//! corner scores; [`ConfiguredDetector`] adds greedy non-maximum suppression,
//! response thresholding and a strongest-N cap. Both implement
//! [`KeypointDetector`] so callers can swap detection strategies.

pub mod builder;
pub mod config;
pub mod configured_detector;
pub mod detector;
pub mod error;
pub mod suppression;
pub mod types;
pub mod utils;

pub use builder::DetectorBuilder;
pub use config::DetectorConfig;
pub use configured_detector::ConfiguredDetector;
pub use detector::{FastDetector, KeypointDetector, MIN_IMAGE_SIZE};
pub use error::{FastError, FastResult};
pub use rif_core::{GrayImage, Keypoint};
pub use suppression::{non_maximum_suppression, retain_strongest};
pub use types::{FastVariant, ScoredKeypoint};
