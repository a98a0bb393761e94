use std::collections::VecDeque;

use rif_core::{GrayImage, Match};
use rif_descriptor::{FeatureStore, Quantize5x5, Quantizer, RifExtractor};
use rif_match::{AffineModel, AffineSolver, Distance, FastKl, FeatureHash};

use crate::config::TrackConfig;
use crate::error::TrackResult;

/// Per-frame tracking result
#[derive(Debug, Clone, PartialEq)]
pub struct TrackOutcome {
    /// Enough matches were found to fit the frame transform
    pub valid: bool,
    /// Maps previous-frame coordinates onto the current frame
    pub transform: AffineModel,
    /// `query` indexes the current frame, `reference` the previous one
    pub matches: Vec<Match>,
    /// `[prev_x, prev_y, curr_x, curr_y]` per match
    pub matched_points: Vec<[f32; 4]>,
    /// Degrees
    pub yaw: f32,
    pub pitch: f32,
    pub roll: f32,
    pub frame_number: usize,
}

/// Real-time frame-to-frame RIF tracker.
///
/// Each frame is described, matched against the previous frame through a
/// spatial hash, and the matches fitted with a least-squares affine model.
pub struct RifTrack<Q: Quantizer = Quantize5x5> {
    config: TrackConfig,
    extractor: RifExtractor<Q>,
    metric: FastKl,
    history: VecDeque<FeatureStore>,
    prev_hash: Option<FeatureHash>,
    frame_number: usize,
    transform: AffineModel,
    cumulative: AffineModel,
    yaw: f32,
    pitch: f32,
    roll: f32,
}

impl<Q: Quantizer> RifTrack<Q> {
    pub fn new(config: TrackConfig) -> TrackResult<Self> {
        config.validate()?;
        let extractor = RifExtractor::new(config.extractor.clone())?;
        log::debug!("{}", config.summary());
        Ok(Self {
            history: VecDeque::with_capacity(config.history),
            config,
            extractor,
            metric: FastKl,
            prev_hash: None,
            frame_number: 0,
            transform: AffineModel::identity(),
            cumulative: AffineModel::identity(),
            yaw: 0.0,
            pitch: 0.0,
            roll: 0.0,
        })
    }

    pub fn config(&self) -> &TrackConfig {
        &self.config
    }

    pub fn extractor(&self) -> &RifExtractor<Q> {
        &self.extractor
    }

    /// Frames processed so far
    pub fn frame_number(&self) -> usize {
        self.frame_number
    }

    /// Motion of the most recent frame
    pub fn transform(&self) -> &AffineModel {
        &self.transform
    }

    /// Product of every per-frame transform since the last reset
    pub fn cumulative_transform(&self) -> &AffineModel {
        &self.cumulative
    }

    /// `(yaw, pitch, roll)` in degrees for the most recent frame
    pub fn angles(&self) -> (f32, f32, f32) {
        (self.yaw, self.pitch, self.roll)
    }

    /// Features of the most recent frame
    pub fn current_store(&self) -> Option<&FeatureStore> {
        self.history.back()
    }

    /// Recent feature stores, oldest first
    pub fn history(&self) -> impl Iterator<Item = &FeatureStore> {
        self.history.iter()
    }

    pub fn reset(&mut self) {
        self.history.clear();
        self.prev_hash = None;
        self.frame_number = 0;
        self.transform = AffineModel::identity();
        self.cumulative = AffineModel::identity();
        self.yaw = 0.0;
        self.pitch = 0.0;
        self.roll = 0.0;
    }

    pub fn track_frame(&mut self, image: &GrayImage) -> TrackResult<TrackOutcome> {
        let (width, height) = image.dimensions();

        let current = self
            .extractor
            .extract_store(image, self.frame_number as i32)?;

        let mut matches = Vec::new();
        let mut matched_points = Vec::new();
        let mut valid = false;
        self.transform = AffineModel::identity();

        if let (Some(previous), Some(hash)) = (self.history.back(), self.prev_hash.as_ref()) {
            let mut solver = AffineSolver::new();
            for index in 0..current.len() {
                let Some(prev_index) = self.track_feature(&current, index, previous, hash) else {
                    continue;
                };
                let curr = current.frame(index);
                let prev = previous.frame(prev_index);
                solver.add_match((prev.x, prev.y), (curr.x, curr.y));
                matches.push(Match::new(index, prev_index));
                matched_points.push([prev.x, prev.y, curr.x, curr.y]);
            }

            if matches.len() >= self.config.min_tracked_points {
                if let Some(model) = solver.compute_transform() {
                    self.transform = model;
                    valid = true;
                }
            }

            self.cumulative = self.cumulative.compose(&self.transform);
            self.update_angles(width, height);
        }

        log::debug!(
            "Frame {}: {} features, {} tracked, valid={}",
            self.frame_number,
            current.len(),
            matches.len(),
            valid
        );

        self.prev_hash = Some(FeatureHash::new(
            width,
            height,
            self.config.bin_size,
            current.frames(),
        )?);
        self.history.push_back(current);
        while self.history.len() > self.config.history {
            self.history.pop_front();
        }

        let outcome = TrackOutcome {
            valid,
            transform: self.transform,
            matches,
            matched_points,
            yaw: self.yaw,
            pitch: self.pitch,
            roll: self.roll,
            frame_number: self.frame_number,
        };
        self.frame_number += 1;
        Ok(outcome)
    }

    /// Closest previous-frame feature among the first `max_compares` hash
    /// candidates, if any is within `thresh`
    fn track_feature(
        &self,
        current: &FeatureStore,
        index: usize,
        previous: &FeatureStore,
        hash: &FeatureHash,
    ) -> Option<usize> {
        let descriptor = current.descriptor(index);
        let mut best = None;
        let mut best_dist = f32::MAX;

        for &candidate in hash
            .neighbors(current.frame(index))
            .iter()
            .take(self.config.max_compares)
        {
            let dist = self
                .metric
                .distance(descriptor, previous.descriptor(candidate), self.config.thresh);

            if dist < self.config.early_term_thresh {
                return Some(candidate);
            }
            if dist < best_dist && dist < self.config.thresh {
                best = Some(candidate);
                best_dist = dist;
            }
        }
        best
    }

    /// Yaw and pitch from the image centre's displacement, roll from the
    /// rotation of a point to its right
    fn update_angles(&mut self, width: usize, height: usize) {
        let (cx, cy) = (width as f32 / 2.0, height as f32 / 2.0);
        let (ncx, ncy) = self.transform.transform(cx, cy);

        self.yaw = (ncx - cx) * self.config.fov_x / width as f32;
        self.pitch = (ncy - cy) * self.config.fov_y / height as f32;

        let (nrx, nry) = self.transform.transform(cx + self.config.roll_offset, cy);
        self.roll = (nry - ncy).atan2(nrx - ncx).to_degrees();
    }
}

impl<Q: Quantizer> std::fmt::Debug for RifTrack<Q> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RifTrack")
            .field("config", &self.config)
            .field("quantizer", &Q::NAME)
            .field("frame_number", &self.frame_number)
            .field("history", &self.history.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{create_textured_image, shift_image};
    use approx::assert_abs_diff_eq;
    use rif_descriptor::Quantize3x3;

    fn create_test_tracker() -> RifTrack {
        RifTrack::new(TrackConfig::default()).unwrap()
    }

    fn assert_near_translation(model: &AffineModel, tx: f64, ty: f64) {
        let p = model.params();
        assert_abs_diff_eq!(p[0], 1.0, epsilon = 0.02);
        assert_abs_diff_eq!(p[1], 0.0, epsilon = 0.02);
        assert_abs_diff_eq!(p[3], 0.0, epsilon = 0.02);
        assert_abs_diff_eq!(p[4], 1.0, epsilon = 0.02);
        for (x, y) in [(40.0, 40.0), (100.0, 40.0), (40.0, 80.0), (100.0, 80.0)] {
            let (nx, ny) = model.transform_f64(x, y);
            assert_abs_diff_eq!(nx - x, tx, epsilon = 1.0);
            assert_abs_diff_eq!(ny - y, ty, epsilon = 1.0);
        }
    }

    #[test]
    fn test_first_frame_is_invalid() {
        let mut tracker = create_test_tracker();
        let outcome = tracker.track_frame(&create_textured_image(160, 120, 1)).unwrap();
        assert!(!outcome.valid);
        assert!(outcome.matches.is_empty());
        assert_eq!(outcome.frame_number, 0);
        assert_eq!(outcome.transform, AffineModel::identity());
        assert_eq!(tracker.frame_number(), 1);
        assert!(tracker.current_store().is_some_and(|s| !s.is_empty()));
    }

    #[test]
    fn test_identical_frames_track_identity() {
        let mut tracker = create_test_tracker();
        let image = create_textured_image(160, 120, 2);
        tracker.track_frame(&image).unwrap();
        let outcome = tracker.track_frame(&image).unwrap();

        assert!(outcome.valid);
        assert!(outcome.matches.len() >= tracker.config().min_tracked_points);
        assert_near_translation(&outcome.transform, 0.0, 0.0);
        assert_abs_diff_eq!(outcome.yaw, 0.0, epsilon = 0.2);
        assert_abs_diff_eq!(outcome.pitch, 0.0, epsilon = 0.2);
        assert_abs_diff_eq!(outcome.roll, 0.0, epsilon = 1.0);

        let stationary = outcome
            .matched_points
            .iter()
            .filter(|p| (p[0], p[1]) == (p[2], p[3]))
            .count();
        assert!(stationary * 10 >= outcome.matched_points.len() * 9);
    }

    #[test]
    fn test_translation_tracked() {
        let mut tracker = create_test_tracker();
        let image = create_textured_image(200, 150, 3);
        tracker.track_frame(&image).unwrap();
        let outcome = tracker.track_frame(&shift_image(&image, 3, 2)).unwrap();

        assert!(outcome.valid);
        assert_near_translation(&outcome.transform, 3.0, 2.0);
        assert!(outcome.yaw > 0.0 && outcome.pitch > 0.0);
        assert_abs_diff_eq!(outcome.yaw, 3.0 * 53.0 / 200.0, epsilon = 0.2);
    }

    #[test]
    fn test_blank_frames_invalid() {
        let mut tracker = create_test_tracker();
        let blank = GrayImage::new(120, 90, 1);
        tracker.track_frame(&blank).unwrap();
        let outcome = tracker.track_frame(&blank).unwrap();
        assert!(!outcome.valid);
        assert_eq!(outcome.transform, AffineModel::identity());
    }

    #[test]
    fn test_history_is_bounded() {
        let mut tracker = create_test_tracker();
        let image = create_textured_image(96, 96, 4);
        for _ in 0..8 {
            tracker.track_frame(&image).unwrap();
        }
        assert_eq!(tracker.history().count(), 5);
        assert_eq!(tracker.frame_number(), 8);
        assert_eq!(tracker.current_store().map(|s| s.image_id(0)), Some(7));

        tracker.reset();
        assert_eq!(tracker.frame_number(), 0);
        assert!(tracker.current_store().is_none());
    }

    #[test]
    fn test_cumulative_transform_composes() {
        let mut tracker = create_test_tracker();
        let image = create_textured_image(200, 150, 5);
        tracker.track_frame(&image).unwrap();
        tracker.track_frame(&shift_image(&image, 2, 0)).unwrap();
        tracker.track_frame(&shift_image(&image, 4, 0)).unwrap();
        let params = tracker.cumulative_transform().params();
        assert_abs_diff_eq!(params[2], 4.0, epsilon = 1.0);
    }

    #[test]
    fn test_polar_variant() {
        let mut tracker = RifTrack::<Quantize3x3>::new(TrackConfig::polar()).unwrap();
        let image = create_textured_image(160, 120, 6);
        tracker.track_frame(&image).unwrap();
        let outcome = tracker.track_frame(&image).unwrap();
        assert!(outcome.valid);
        assert_eq!(tracker.extractor().descriptor_dim(), 13 * 9);
    }

    #[test]
    fn test_rejects_color_frames() {
        let mut tracker = create_test_tracker();
        assert!(tracker.track_frame(&GrayImage::new(64, 64, 3)).is_err());
    }
}
