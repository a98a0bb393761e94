//! Matching primitives for RIF features: descriptor distances, exhaustive
//! k-nearest-neighbour search, weighted affine fitting, RANSAC verification
//! and a spatial hash for frame-to-frame tracking.

mod affine;
mod brute_force;
mod distance;
mod error;
mod feature_hash;
mod ransac;

pub use affine::{AffineModel, AffineSolver};
pub use brute_force::{BruteForce, Neighbor};
pub use distance::{Distance, FastKl, L1, fast_log2};
pub use error::{MatchError, MatchResult};
pub use feature_hash::FeatureHash;
pub use ransac::{Ransac, RansacConfig, RansacOutcome};
