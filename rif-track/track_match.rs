use rif_core::GrayImage;
use rif_descriptor::{Quantize5x5, Quantizer};

use crate::config::CoordinatorConfig;
use crate::error::TrackResult;
use crate::matcher::{Matcher, QueryResult, ReferenceImage};
use crate::polygon::PolygonTracker;
use crate::tracker::{RifTrack, TrackOutcome};

/// Result of one synchronous track and match step
#[derive(Debug, Clone, PartialEq)]
pub struct TrackMatchReport {
    pub track: TrackOutcome,
    /// Present on frames where the database was queried
    pub query: Option<QueryResult>,
}

/// Tracks every frame and queries the reference database on the same thread
/// every `query_period` frames
#[derive(Debug)]
pub struct TrackMatch<Q: Quantizer = Quantize5x5> {
    query_period: usize,
    tracker: RifTrack<Q>,
    matcher: Matcher,
    polygons: PolygonTracker,
}

impl<Q: Quantizer> TrackMatch<Q> {
    pub fn new(config: CoordinatorConfig) -> TrackResult<Self> {
        config.validate()?;
        Ok(Self {
            query_period: config.query_period,
            tracker: RifTrack::new(config.track)?,
            matcher: Matcher::new(config.matcher)?,
            polygons: PolygonTracker::new(),
        })
    }

    pub fn build_database(&mut self, references: &[ReferenceImage]) -> TrackResult<()> {
        self.matcher.build_database(references)
    }

    pub fn tracker(&self) -> &RifTrack<Q> {
        &self.tracker
    }

    pub fn matcher(&self) -> &Matcher {
        &self.matcher
    }

    pub fn polygons(&self) -> &PolygonTracker {
        &self.polygons
    }

    pub fn track_frame(&mut self, image: &GrayImage) -> TrackResult<TrackMatchReport> {
        let track = self.tracker.track_frame(image)?;

        // Existing outlines follow the camera before new ones are placed in
        // current-frame coordinates
        if track.valid {
            self.polygons.propagate(&track.transform);
        } else if track.frame_number > 0 {
            self.polygons.reset();
        }

        let query = match self.tracker.current_store() {
            Some(store) if self.tracker.frame_number() % self.query_period == 0 && !self.matcher.is_empty() => {
                let result = self.matcher.query(store);
                self.polygons.update_polygons(
                    &result.models,
                    &self.matcher.reference_sizes(),
                    &self.matcher.labels(),
                );
                Some(result)
            }
            _ => None,
        };

        Ok(TrackMatchReport { track, query })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{create_textured_image, shift_image};
    use rif_match::{AffineModel, RansacConfig};

    fn create_test_config() -> CoordinatorConfig {
        let mut config = CoordinatorConfig::synchronous();
        config.matcher.ransac = RansacConfig {
            max_iterations: 200,
            ..RansacConfig::default()
        };
        // Tracking features double as query features
        config.track.extractor.detector.max_features = None;
        config
    }

    #[test]
    fn test_query_period() {
        let mut config = create_test_config();
        config.query_period = 2;
        let mut track_match = TrackMatch::<Quantize5x5>::new(config).unwrap();
        track_match
            .build_database(&[ReferenceImage::new(create_textured_image(96, 96, 1), "a")])
            .unwrap();
        let frame = create_textured_image(96, 96, 2);

        let queried: Vec<bool> = (0..4)
            .map(|_| track_match.track_frame(&frame).unwrap().query.is_some())
            .collect();
        assert_eq!(queried, vec![false, true, false, true]);
    }

    #[test]
    fn test_no_database_no_query() {
        let mut track_match = TrackMatch::<Quantize5x5>::new(create_test_config()).unwrap();
        let report = track_match.track_frame(&create_textured_image(96, 96, 3)).unwrap();
        assert!(report.query.is_none());
        assert!(track_match.polygons().is_empty());
    }

    #[test]
    fn test_locks_onto_reference_and_follows_motion() {
        let reference = create_textured_image(120, 90, 21);
        let mut track_match = TrackMatch::<Quantize5x5>::new(create_test_config()).unwrap();
        track_match
            .build_database(&[ReferenceImage::new(reference.clone(), "cover")])
            .unwrap();

        let scene = shift_image(&reference, 0, 0);
        let report = track_match.track_frame(&scene).unwrap();
        let model = report.query.unwrap().models[0].expect("reference not recognised");
        assert!(model.max_difference(&AffineModel::identity()) < 0.5);
        assert_eq!(track_match.polygons().len(), 1);
        assert_eq!(track_match.polygons().polygons()[0].label, "cover");

        let before = track_match.polygons().polygons()[0].centroid();
        track_match.track_frame(&shift_image(&reference, 4, 0)).unwrap();
        let after = track_match.polygons().polygons()[0].centroid();
        assert!((after.0 - before.0 - 4.0).abs() < 1.5, "{:?} -> {:?}", before, after);
        assert!((after.1 - before.1).abs() < 1.5);
    }
}
