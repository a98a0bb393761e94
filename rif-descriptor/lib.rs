//! Rotation-invariant feature (RIF) description.
//!
//! A [`CellMap`] partitions a square patch into polar cells; the
//! [`RifExtractor`] histograms radial/tangential gradient pairs per cell and
//! stores the results with their keypoint frames in a [`FeatureStore`], which
//! persists to a compact binary format or plain text.

pub mod cell_map;
pub mod config;
pub mod error;
pub mod extractor;
pub mod quantizer;
pub mod store;

pub use cell_map::{CellConfig, CellMap};
pub use config::{ExtractorBuilder, ExtractorConfig};
pub use error::{DescriptorError, DescriptorResult};
pub use extractor::RifExtractor;
pub use quantizer::{Quantize3x3, Quantize5x5, Quantizer};
pub use store::{Descriptor, FeatureStore};
