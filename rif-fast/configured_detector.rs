use rif_core::GrayImage;

use crate::config::DetectorConfig;
use crate::detector::{FastDetector, KeypointDetector};
use crate::error::FastResult;
use crate::suppression::{non_maximum_suppression, retain_strongest};
use crate::types::ScoredKeypoint;

/// A FAST detector bundled with its suppression and truncation settings.
///
/// Output is ordered by descending response.
#[derive(Debug, Clone)]
pub struct ConfiguredDetector {
    pub(crate) detector: FastDetector,
    pub(crate) config: DetectorConfig,
}

impl ConfiguredDetector {
    pub fn new(config: DetectorConfig) -> FastResult<Self> {
        config.to_builder().build()
    }

    /// Detect, suppress, threshold and truncate
    pub fn detect_keypoints(&self, img: &GrayImage) -> FastResult<Vec<ScoredKeypoint>> {
        let raw = self.detector.detect_corners(img)?;
        let raw_count = raw.len();

        let mut kept = non_maximum_suppression(&raw, self.config.nms_distance);
        kept.retain(|k| k.response >= self.config.min_response);
        if let Some(max) = self.config.max_features {
            retain_strongest(&mut kept, max);
        }

        log::debug!(
            "{}x{}: {} raw corners, {} after suppression",
            img.width(),
            img.height(),
            raw_count,
            kept.len()
        );
        Ok(kept)
    }

    /// Get a reference to the underlying `FastDetector`.
    pub fn detector(&self) -> &FastDetector {
        &self.detector
    }

    pub fn config(&self) -> &DetectorConfig {
        &self.config
    }

    /// Get a summary of the detector's configuration.
    pub fn config_summary(&self) -> String {
        self.config.summary()
    }
}

impl KeypointDetector for ConfiguredDetector {
    fn detect(&self, image: &GrayImage) -> FastResult<Vec<ScoredKeypoint>> {
        self.detect_keypoints(image)
    }

    fn name(&self) -> &str {
        self.config
            .name
            .as_deref()
            .unwrap_or_else(|| self.detector.variant().name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::DetectorBuilder;

    /// Grid of bright 3x3 blobs on a dark background
    fn create_multiple_corners_image(width: usize, height: usize) -> GrayImage {
        let mut img = GrayImage::from_vec(width, height, 1, vec![50; width * height]).unwrap();
        for cy in (8..height - 8).step_by(12) {
            for cx in (8..width - 8).step_by(12) {
                for y in cy - 1..=cy + 1 {
                    for x in cx - 1..=cx + 1 {
                        img.set(x, y, 0, 230);
                    }
                }
            }
        }
        img
    }

    #[test]
    fn test_output_sorted_by_response() {
        let detector = DetectorBuilder::new().threshold(20).build().unwrap();
        let img = create_multiple_corners_image(64, 64);
        let kps = detector.detect_keypoints(&img).unwrap();
        assert!(!kps.is_empty());
        for pair in kps.windows(2) {
            assert!(pair[0].response >= pair[1].response);
        }
    }

    #[test]
    fn test_suppression_reduces_raw_corners() {
        let img = create_multiple_corners_image(64, 64);
        let detector = DetectorBuilder::new().threshold(20).nms_distance(5.0).build().unwrap();
        let raw = detector.detector().detect_corners(&img).unwrap();
        let kept = detector.detect_keypoints(&img).unwrap();
        assert!(kept.len() <= raw.len());
    }

    #[test]
    fn test_max_features_truncates() {
        let img = create_multiple_corners_image(96, 96);
        let detector = DetectorBuilder::new()
            .threshold(20)
            .max_features(Some(3))
            .build()
            .unwrap();
        assert_eq!(detector.detect_keypoints(&img).unwrap().len(), 3);
    }

    #[test]
    fn test_min_response_filters() {
        let img = create_multiple_corners_image(64, 64);
        let detector = DetectorBuilder::new()
            .threshold(20)
            .min_response(255.0)
            .build()
            .unwrap();
        assert!(detector.detect_keypoints(&img).unwrap().is_empty());
    }

    #[test]
    fn test_trait_name_prefers_metadata() {
        let detector = ConfiguredDetector::new(DetectorConfig::tracking_preset()).unwrap();
        assert_eq!(KeypointDetector::name(&detector), "Tracking");

        let detector = ConfiguredDetector::new(DetectorConfig::default()).unwrap();
        assert_eq!(KeypointDetector::name(&detector), "FAST-9");
    }
}
