//! Real-time RIF tracking and recognition.
//!
//! [`RifTrack`] follows features from frame to frame and fits the camera
//! motion as an affine model. [`Matcher`] recognises reference images in a
//! frame by ratio-tested nearest neighbours and RANSAC. [`TrackMatch`] runs
//! both on the caller's thread; [`TrackMatchMt`] moves database building and
//! queries onto worker threads and keeps outlines of recognised references
//! moving with the tracked motion in the meantime.

pub mod config;
pub mod coordinator;
pub mod error;
pub mod matcher;
pub mod polygon;
pub mod track_match;
pub mod tracker;

#[cfg(test)]
mod testing;

pub use config::{CoordinatorConfig, MatcherConfig, TrackConfig};
pub use coordinator::{CoordinatorReport, TrackMatchMt};
pub use error::{TrackError, TrackResult};
pub use matcher::{load_gray_image, quantize_descriptor, Matcher, QueryResult, ReferenceImage};
pub use polygon::{PolygonTracker, TrackedPolygon};
pub use track_match::{TrackMatch, TrackMatchReport};
pub use tracker::{RifTrack, TrackOutcome};
