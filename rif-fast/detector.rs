use rayon::prelude::*;
use rif_core::GrayImage;

use crate::error::{FastError, FastResult};
use crate::types::{CornerType, FastVariant, ScoredKeypoint};
use crate::utils::has_consecutive_bits;

/// Bresenham circle of radius 3, listed in contiguous order
const CIRCLE: [(isize, isize); 16] = [
    (-3, 0), (-3, 1), (-2, 2), (-1, 3),
    (0, 3), (1, 3), (2, 2), (3, 1),
    (3, 0), (3, -1), (2, -2), (1, -3),
    (0, -3), (-1, -3), (-2, -2), (-3, -1),
];

/// Compass samples used to reject most pixels before the full circle test
const COMPASS: [usize; 4] = [0, 4, 8, 12];

/// Smallest image the 3-pixel circle fits in
pub const MIN_IMAGE_SIZE: usize = 7;

/// Anything that turns a grayscale image into scored corners
pub trait KeypointDetector: Send + Sync {
    fn detect(&self, image: &GrayImage) -> FastResult<Vec<ScoredKeypoint>>;

    fn name(&self) -> &str;
}

/// Plain FAST segment-test detector.
///
/// Reports every pixel passing the test together with its corner score;
/// suppression and truncation are left to [`crate::ConfiguredDetector`].
#[derive(Debug, Clone)]
pub struct FastDetector {
    threshold: u8,
    variant: FastVariant,
}

impl FastDetector {
    pub fn new(threshold: u8, variant: FastVariant) -> FastResult<Self> {
        // 0 would fire on every textured pixel
        if threshold == 0 || threshold > 127 {
            return Err(FastError::InvalidThreshold(threshold));
        }
        Ok(Self { threshold, variant })
    }

    fn validate_image(img: &GrayImage) -> FastResult<()> {
        if img.channels() != 1 {
            return Err(FastError::UnsupportedChannels {
                channels: img.channels(),
            });
        }
        if img.width() < MIN_IMAGE_SIZE || img.height() < MIN_IMAGE_SIZE {
            return Err(FastError::ImageTooSmall {
                width: img.width(),
                height: img.height(),
                min_size: MIN_IMAGE_SIZE,
            });
        }
        Ok(())
    }

    /// All segment-test corners with their scores, in raster order
    pub fn detect_corners(&self, img: &GrayImage) -> FastResult<Vec<ScoredKeypoint>> {
        Self::validate_image(img)?;

        let (w, h) = img.dimensions();
        let corners: Vec<ScoredKeypoint> = (3..h - 3)
            .into_par_iter()
            .flat_map_iter(|y| {
                let mut row = Vec::new();
                for x in 3..w - 3 {
                    if self.segment_test(img, x, y, self.threshold) != CornerType::None {
                        let score = self.corner_score_unchecked(img, x, y);
                        row.push(ScoredKeypoint::new(x as f32, y as f32, score));
                    }
                }
                row
            })
            .collect();

        log::trace!(
            "{} found {} raw corners in {}x{}",
            self.variant.name(),
            corners.len(),
            w,
            h
        );
        Ok(corners)
    }

    /// Classifies the pixel at (x, y); the caller keeps it 3 pixels from the border
    pub(crate) fn segment_test(&self, img: &GrayImage, x: usize, y: usize, threshold: u8) -> CornerType {
        let p = img.at(x, y, 0) as i16;
        let t = threshold as i16;
        let sample = |i: usize| {
            let (dx, dy) = CIRCLE[i];
            img.at((x as isize + dx) as usize, (y as isize + dy) as usize, 0) as i16
        };

        let arc = self.variant.arc_length();
        let needed = arc / 4;
        let bright_compass = COMPASS.iter().filter(|&&i| sample(i) > p + t).count();
        let dark_compass = COMPASS.iter().filter(|&&i| sample(i) < p - t).count();
        if bright_compass < needed && dark_compass < needed {
            return CornerType::None;
        }

        let mut bright = 0u16;
        let mut dark = 0u16;
        for i in 0..CIRCLE.len() {
            let q = sample(i);
            if q > p + t {
                bright |= 1 << i;
            } else if q < p - t {
                dark |= 1 << i;
            }
        }

        if has_consecutive_bits(bright, arc) {
            CornerType::Bright
        } else if has_consecutive_bits(dark, arc) {
            CornerType::Dark
        } else {
            CornerType::None
        }
    }

    /// Largest threshold at which (x, y) still passes the segment test
    pub fn corner_score(&self, img: &GrayImage, x: usize, y: usize) -> FastResult<f32> {
        Self::validate_image(img)?;
        if x < 3 || y < 3 || x + 3 >= img.width() || y + 3 >= img.height() {
            return Ok(0.0);
        }
        if self.segment_test(img, x, y, self.threshold) == CornerType::None {
            return Ok(0.0);
        }
        Ok(self.corner_score_unchecked(img, x, y))
    }

    fn corner_score_unchecked(&self, img: &GrayImage, x: usize, y: usize) -> f32 {
        // Invariant: passes at `lo`, fails at `hi`
        let mut lo = self.threshold;
        let mut hi = u8::MAX;
        while hi - lo > 1 {
            let mid = lo + (hi - lo) / 2;
            if self.segment_test(img, x, y, mid) != CornerType::None {
                lo = mid;
            } else {
                hi = mid;
            }
        }
        lo as f32
    }

    pub fn threshold(&self) -> u8 {
        self.threshold
    }

    pub fn variant(&self) -> FastVariant {
        self.variant
    }
}

impl KeypointDetector for FastDetector {
    fn detect(&self, image: &GrayImage) -> FastResult<Vec<ScoredKeypoint>> {
        self.detect_corners(image)
    }

    fn name(&self) -> &str {
        self.variant.name()
    }
}
