use std::borrow::Cow;
use std::f64::consts::PI;
use std::marker::PhantomData;
use std::sync::Arc;

use rayon::prelude::*;
use rif_core::{Frame, GrayImage, ImagePyramid};
use rif_fast::{ConfiguredDetector, KeypointDetector};

use crate::cell_map::CellMap;
use crate::config::ExtractorConfig;
use crate::error::DescriptorResult;
use crate::quantizer::{Quantize5x5, Quantizer};
use crate::store::{Descriptor, FeatureStore};

/// Dimension order ranked by per-dimension variance; early-exit distances
/// see the most discriminative bins first. 1-based source indices.
const VARIANCE_ORDER: [usize; 100] = [
    88, 63, 38, 13, 5, 21, 1, 25, 23, 3, 8, 18, 43, 68, 33, 93, 58, 83, 26, 30, 50, 46, 37, 39, 4,
    2, 28, 24, 62, 22, 64, 87, 51, 89, 55, 14, 12, 48, 71, 75, 76, 80, 53, 100, 96, 78, 73, 98, 15,
    11, 9, 17, 19, 7, 42, 44, 32, 34, 36, 40, 67, 10, 69, 57, 59, 16, 6, 20, 61, 27, 92, 29, 65,
    94, 82, 84, 49, 47, 86, 90, 52, 41, 35, 31, 45, 54, 74, 72, 77, 99, 79, 97, 66, 60, 70, 56, 85,
    91, 81, 95,
];

/// Finite-difference step per gradient direction, x right and y down.
/// Odd directions are diagonal.
const DIRECTION_STEPS: [(isize, isize); 8] = [
    (1, 0),
    (1, 1),
    (0, 1),
    (-1, 1),
    (-1, 0),
    (-1, -1),
    (0, -1),
    (1, -1),
];

/// Inverse difference baselines: axis symmetric, axis one-sided,
/// diagonal symmetric, diagonal one-sided
const BASELINES: [f32; 4] = [0.5, 1.0, 0.353_553_39, 0.707_106_77];

/// Patch-relative difference taps and baseline for one pixel and direction
#[derive(Debug, Clone, Copy, Default)]
struct GradientTap {
    x0: usize,
    y0: usize,
    x1: usize,
    y1: usize,
    baseline: usize,
}

impl GradientTap {
    fn new(direction: usize, i: usize, j: usize, patch_size: usize) -> Self {
        let (dx, dy) = DIRECTION_STEPS[direction];
        let mut baseline = if direction % 2 == 0 { 0 } else { 2 };

        let limit = patch_size as isize - 1;
        let mut clamped = false;
        let mut clamp = |v: isize| {
            if v < 0 || v > limit {
                clamped = true;
            }
            v.clamp(0, limit) as usize
        };
        let (i, j) = (i as isize, j as isize);
        let x0 = clamp(i + dx);
        let y0 = clamp(j + dy);
        let x1 = clamp(i - dx);
        let y1 = clamp(j - dy);

        // Degrades to a one-sided difference at the patch border
        if clamped {
            baseline += 1;
        }

        Self { x0, y0, x1, y1, baseline }
    }
}

/// Radial and tangential taps for every patch pixel
#[derive(Debug, Clone)]
struct GradientTable {
    patch_size: usize,
    radial: Vec<GradientTap>,
    tangential: Vec<GradientTap>,
}

impl GradientTable {
    fn new(patch_size: usize) -> Self {
        let center = (patch_size as f64 - 1.0) / 2.0;
        let mut radial = Vec::with_capacity(patch_size * patch_size);
        let mut tangential = Vec::with_capacity(patch_size * patch_size);

        for i in 0..patch_size {
            for j in 0..patch_size {
                let x = i as f64 - center;
                let y = j as f64 - center;
                let degrees = y.atan2(x) * 180.0 / PI;
                let bin = ((degrees / 45.0 + 0.5).floor() as i64).rem_euclid(8) as usize;

                radial.push(GradientTap::new(bin, i, j, patch_size));
                tangential.push(GradientTap::new((bin + 2) % 8, i, j, patch_size));
            }
        }

        Self {
            patch_size,
            radial,
            tangential,
        }
    }

    fn taps(&self, i: usize, j: usize) -> (&GradientTap, &GradientTap) {
        let idx = i * self.patch_size + j;
        (&self.radial[idx], &self.tangential[idx])
    }
}

/// Sub-octave `j` of `source`; the first is the image itself
fn sub_octave(source: &GrayImage, j: usize, width: usize, height: usize) -> DescriptorResult<Cow<'_, GrayImage>> {
    if j == 0 {
        Ok(Cow::Borrowed(source))
    } else {
        Ok(Cow::Owned(source.resize(width, height)?))
    }
}

/// Image window a keypoint's patch covers
#[derive(Debug, Clone, Copy)]
struct Patch {
    x_start: usize,
    y_start: usize,
}

/// Rotation-invariant feature extractor.
///
/// Detects corners with a [`KeypointDetector`] and describes each one by
/// per-cell histograms of (radial, tangential) gradient pairs, quantized by
/// `Q`. Descriptors are `cells x Q::NUM_BINS` long and every cell's
/// sub-histogram sums to one.
pub struct RifExtractor<Q: Quantizer = Quantize5x5> {
    config: ExtractorConfig,
    cells: CellMap,
    gradients: GradientTable,
    detector: Arc<dyn KeypointDetector>,
    _quantizer: PhantomData<Q>,
}

impl<Q: Quantizer> Clone for RifExtractor<Q> {
    fn clone(&self) -> Self {
        Self {
            config: self.config.clone(),
            cells: self.cells.clone(),
            gradients: self.gradients.clone(),
            detector: Arc::clone(&self.detector),
            _quantizer: PhantomData,
        }
    }
}

impl<Q: Quantizer> std::fmt::Debug for RifExtractor<Q> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RifExtractor")
            .field("config", &self.config)
            .field("quantizer", &Q::NAME)
            .field("detector", &self.detector.name())
            .finish()
    }
}

impl<Q: Quantizer> RifExtractor<Q> {
    pub fn new(config: ExtractorConfig) -> DescriptorResult<Self> {
        config.validate()?;
        let detector = Arc::new(ConfiguredDetector::new(config.detector.clone())?);
        Self::with_detector(config, detector)
    }

    /// Uses `detector` in place of the configured FAST detector
    pub fn with_detector(
        config: ExtractorConfig,
        detector: Arc<dyn KeypointDetector>,
    ) -> DescriptorResult<Self> {
        config.validate()?;
        let cells = CellMap::new(config.cells)?;
        let gradients = GradientTable::new(cells.patch_size());
        Ok(Self {
            config,
            cells,
            gradients,
            detector,
            _quantizer: PhantomData,
        })
    }

    pub fn config(&self) -> &ExtractorConfig {
        &self.config
    }

    pub fn cell_map(&self) -> &CellMap {
        &self.cells
    }

    pub fn descriptor_dim(&self) -> usize {
        self.cells.len() * Q::NUM_BINS
    }

    /// Detects and describes features of `image`, appending them to `store`
    /// under `image_id`. Returns the number of features added.
    pub fn extract(&self, image: &GrayImage, store: &mut FeatureStore, image_id: i32) -> DescriptorResult<usize> {
        let before = store.len();

        let detect_image = if self.config.blur {
            let mut blurred = image.clone();
            blurred.blur_pow2(4);
            Cow::Owned(blurred)
        } else {
            Cow::Borrowed(image)
        };

        if self.config.is_multi_scale() {
            let blurred = self.config.blur.then_some(&*detect_image);
            self.extract_multi_scale(image, blurred, store, image_id)?;
        } else {
            let frames = self.detect(&detect_image, 0.0)?;
            self.describe_into(image, &frames, store, image_id);
        }

        let added = store.len() - before;
        log::debug!(
            "Extracted {} features from {}x{} image {}",
            added,
            image.width(),
            image.height(),
            image_id
        );
        Ok(added)
    }

    /// Convenience wrapper returning a fresh store
    pub fn extract_store(&self, image: &GrayImage, image_id: i32) -> DescriptorResult<FeatureStore> {
        let mut store = FeatureStore::new();
        self.extract(image, &mut store, image_id)?;
        Ok(store)
    }

    /// Detects on `blurred` when given, always describes on `image`
    fn extract_multi_scale(
        &self,
        image: &GrayImage,
        blurred: Option<&GrayImage>,
        store: &mut FeatureStore,
        image_id: i32,
    ) -> DescriptorResult<()> {
        let first = store.len();
        let scales = self.config.scales_per_octave;
        let octaves = self.config.num_octaves;

        for j in 0..scales {
            let exponent = j as f32 / scales as f32;
            let factor = 2f32.powf(-exponent);
            let width = (factor * image.width() as f32) as usize;
            let height = (factor * image.height() as f32) as usize;
            if width == 0 || height == 0 {
                break;
            }
            let pyramid = ImagePyramid::with_levels(&*sub_octave(image, j, width, height)?, octaves);
            let detect_pyramid = match blurred {
                Some(source) => Some(ImagePyramid::with_levels(&*sub_octave(source, j, width, height)?, octaves)),
                None => None,
            };

            for (i, level) in pyramid.levels().iter().enumerate() {
                let scale = exponent + i as f32;
                let detect_level = detect_pyramid.as_ref().and_then(|p| p.level(i)).unwrap_or(level);
                let frames = self.detect(detect_level, scale)?;
                let added = self.describe_into(level, &frames, store, image_id);
                log::trace!(
                    "Scale {:.2}: {}x{} level, {} corners, {} described",
                    scale,
                    level.width(),
                    level.height(),
                    frames.len(),
                    added
                );
            }
        }

        // Level-local coordinates back to the input image
        for index in first..store.len() {
            let frame = store.frame_mut(index);
            let factor = 2f32.powf(frame.scale);
            frame.x *= factor;
            frame.y *= factor;
        }
        Ok(())
    }

    /// Corners of `image` as frames tagged with `scale`, strongest first
    pub fn detect(&self, image: &GrayImage, scale: f32) -> DescriptorResult<Vec<Frame>> {
        if image.width() < self.cells.patch_size() || image.height() < self.cells.patch_size() {
            return Ok(Vec::new());
        }
        let keypoints = self.detector.detect(image)?;
        Ok(keypoints
            .into_iter()
            .map(|k| Frame::new(k.keypoint.x, k.keypoint.y, scale, k.response))
            .collect())
    }

    /// Describes `frames` on `image` in parallel and appends the in-bounds
    /// ones to `store` in input order. Returns how many were appended.
    pub fn describe_into(&self, image: &GrayImage, frames: &[Frame], store: &mut FeatureStore, image_id: i32) -> usize {
        let described: Vec<(Descriptor, Frame)> = frames
            .par_iter()
            .filter_map(|frame| self.describe(image, frame).map(|desc| (desc, *frame)))
            .collect();

        let count = described.len();
        for (desc, frame) in described {
            store.push(desc, frame, image_id);
        }
        count
    }

    /// Descriptor for `frame` in `image` coordinates, or `None` when the
    /// patch leaves the image
    pub fn describe(&self, image: &GrayImage, frame: &Frame) -> Option<Descriptor> {
        let patch = self.patch_for(image, frame)?;

        let variance = self.patch_variance(image, patch);
        let stdev_inv = if variance > f32::EPSILON {
            1.0 / variance.sqrt()
        } else {
            1.0
        };
        let baselines = BASELINES.map(|b| b * stdev_inv);

        let sample = |x: usize, y: usize| image.at(patch.x_start + x, patch.y_start + y, 0) as f32;
        let gradient = |tap: &GradientTap| (sample(tap.x0, tap.y0) - sample(tap.x1, tap.y1)) * baselines[tap.baseline];

        let mut desc = Vec::with_capacity(self.descriptor_dim());
        let mut histogram = vec![0u32; Q::NUM_BINS];

        for pixels in self.cells.cells() {
            // Laplace prior keeps every bin non-zero
            histogram.fill(1);
            for &(i, j) in pixels {
                let (radial, tangential) = self.gradients.taps(i, j);
                histogram[Q::quantize(gradient(radial), gradient(tangential))] += 1;
            }

            let sum_inv = 1.0 / histogram.iter().sum::<u32>() as f32;
            desc.extend(histogram.iter().map(|&count| count as f32 * sum_inv));
        }

        if self.config.reorder && desc.len() == VARIANCE_ORDER.len() {
            desc = VARIANCE_ORDER.iter().map(|&src| desc[src - 1]).collect();
        }

        Some(desc)
    }

    fn patch_for(&self, image: &GrayImage, frame: &Frame) -> Option<Patch> {
        let half = (self.cells.patch_size() / 2) as isize;
        let xc = frame.x.floor() as isize;
        let yc = frame.y.floor() as isize;

        let (x_start, y_start) = (xc - half, yc - half);
        let (x_stop, y_stop) = (xc + half, yc + half);
        if x_start < 0 || y_start < 0 || x_stop >= image.width() as isize || y_stop >= image.height() as isize {
            return None;
        }

        Some(Patch {
            x_start: x_start as usize,
            y_start: y_start as usize,
        })
    }

    /// Single-pass variance over every cell pixel, `E[x^2] - E[x]^2`
    fn patch_variance(&self, image: &GrayImage, patch: Patch) -> f32 {
        let mut sum = 0u64;
        let mut sum_sq = 0u64;
        let mut count = 0u64;
        for pixels in self.cells.cells() {
            for &(i, j) in pixels {
                let v = image.at(patch.x_start + i, patch.y_start + j, 0) as u64;
                sum += v;
                sum_sq += v * v;
                count += 1;
            }
        }
        if count == 0 {
            return 0.0;
        }
        // Exact in integers: count^2 * variance
        let scaled = count * sum_sq - sum * sum;
        (scaled as f64 / (count * count) as f64) as f32
    }
}
