//! Frame-processing entry point for RIF tracking.
//!
//! [`FrameProcessor`] is the boundary with a camera or display layer: it
//! takes one grayscale frame per call, tracks it at half resolution and
//! draws the result into an RGB buffer of the full frame size.

mod error;
pub mod overlay;
pub mod pnm;

pub use error::{CliError, CliResult};
pub use rif_track::{CoordinatorConfig, ReferenceImage};

use image::{ImageBuffer, Rgb};
use rif_core::GrayImage;
use rif_match::AffineModel;
use rif_track::{RifTrack, TrackMatchMt, TrackOutcome, TrackedPolygon};

/// Frames are tracked at this fraction of their input size
pub const DEFAULT_DOWNSAMPLE: usize = 2;

/// Per-frame summary handed back to the caller
#[derive(Debug, Clone, PartialEq)]
pub struct FrameReport {
    pub match_count: usize,
    pub valid: bool,
    /// Frame motion in tracker coordinates
    pub transform: AffineModel,
    pub yaw: f32,
    pub pitch: f32,
    pub roll: f32,
}

impl FrameReport {
    fn skipped() -> Self {
        Self {
            match_count: 0,
            valid: false,
            transform: AffineModel::identity(),
            yaw: 0.0,
            pitch: 0.0,
            roll: 0.0,
        }
    }

    fn from_outcome(outcome: &TrackOutcome) -> Self {
        Self {
            match_count: outcome.matches.len(),
            valid: outcome.valid,
            transform: outcome.transform,
            yaw: outcome.yaw,
            pitch: outcome.pitch,
            roll: outcome.roll,
        }
    }
}

enum Engine {
    Track(Box<RifTrack>),
    TrackMatch(Box<TrackMatchMt>),
}

impl Engine {
    fn new(config: &CoordinatorConfig, references: Vec<ReferenceImage>) -> CliResult<Self> {
        if references.is_empty() {
            Ok(Self::Track(Box::new(RifTrack::new(config.track.clone())?)))
        } else {
            Ok(Self::TrackMatch(Box::new(TrackMatchMt::new(config.clone(), references)?)))
        }
    }

    fn track_frame(&mut self, image: &GrayImage) -> CliResult<Option<TrackOutcome>> {
        match self {
            Self::Track(tracker) => Ok(Some(tracker.track_frame(image)?)),
            Self::TrackMatch(coordinator) => Ok(coordinator.track_frame(image)?.track),
        }
    }

    fn polygons(&self) -> &[TrackedPolygon] {
        match self {
            Self::Track(_) => &[],
            Self::TrackMatch(coordinator) => coordinator.polygons().polygons(),
        }
    }
}

/// Tracks camera frames and renders the tracking overlay.
///
/// With reference images the threaded track and match loop runs and
/// recognised references are outlined; otherwise only the motion is tracked.
pub struct FrameProcessor {
    config: CoordinatorConfig,
    references: Vec<ReferenceImage>,
    downsample: usize,
    engine: Option<Engine>,
    triangle: Option<[(f32, f32); 3]>,
    frame_count: usize,
}

impl FrameProcessor {
    pub fn new(config: CoordinatorConfig) -> Self {
        Self::with_references(config, Vec::new())
    }

    pub fn with_references(config: CoordinatorConfig, references: Vec<ReferenceImage>) -> Self {
        Self {
            config,
            references,
            downsample: DEFAULT_DOWNSAMPLE,
            engine: None,
            triangle: None,
            frame_count: 0,
        }
    }

    pub fn downsample(mut self, factor: usize) -> Self {
        self.downsample = factor.max(1);
        self
    }

    pub fn frame_count(&self) -> usize {
        self.frame_count
    }

    /// Outlines of recognised references in tracker coordinates
    pub fn polygons(&self) -> &[TrackedPolygon] {
        match &self.engine {
            Some(engine) => engine.polygons(),
            None => &[],
        }
    }

    /// Track one frame given as `height` rows of `stride` bytes and draw the
    /// overlay into `rgb_out`, which must hold `width * height` RGB pixels
    /// and normally carries the color frame already.
    pub fn process_frame(
        &mut self,
        gray: &[u8],
        width: usize,
        height: usize,
        stride: usize,
        rgb_out: &mut [u8],
    ) -> CliResult<FrameReport> {
        let expected = width * height * 3;
        let actual = rgb_out.len();
        if actual != expected {
            return Err(CliError::BufferSize { expected, actual });
        }

        let frame = GrayImage::from_strided(width, height, stride, gray)?;
        let small = frame.resize(width / self.downsample, height / self.downsample)?;

        if self.engine.is_none() {
            log::info!(
                "Initialising tracker for {}x{} frames (downsampled from {}x{})",
                small.width(),
                small.height(),
                width,
                height
            );
            let references = std::mem::take(&mut self.references);
            self.engine = Some(Engine::new(&self.config, references)?);
        }
        let outcome = match self.engine.as_mut() {
            Some(engine) => engine.track_frame(&small)?,
            None => None,
        };
        self.frame_count += 1;

        let report = match &outcome {
            Some(outcome) => FrameReport::from_outcome(outcome),
            None => FrameReport::skipped(),
        };
        let triangle = self.move_triangle(small.dimensions(), &report.transform);

        let mut canvas = ImageBuffer::<Rgb<u8>, &mut [u8]>::from_raw(width as u32, height as u32, rgb_out)
            .ok_or(CliError::BufferSize { expected, actual })?;
        let scale = self.downsample as f32;
        if let Some(outcome) = &outcome {
            overlay::draw_motion(&mut canvas, &outcome.matched_points, scale);
        }
        overlay::draw_polygons(&mut canvas, self.polygons(), scale);
        overlay::draw_triangle(&mut canvas, &triangle, report.valid, scale);

        Ok(report)
    }

    /// [`process_frame`](Self::process_frame) on a decoded image, drawing over
    /// a gray copy of it
    pub fn process_image(&mut self, gray: &GrayImage) -> CliResult<(FrameReport, image::RgbImage)> {
        let mut rgb = pnm::gray_to_rgb(gray);
        let (width, height) = gray.dimensions();
        let report = self.process_frame(gray.as_slice(), width, height, width, &mut rgb)?;
        Ok((report, rgb))
    }

    /// The triangle starts at the frame centre and rides the tracked motion
    /// until a corner leaves the frame
    fn move_triangle(&mut self, (width, height): (usize, usize), transform: &AffineModel) -> [(f32, f32); 3] {
        let (w, h) = (width as f32, height as f32);
        let in_bounds = |p: &(f32, f32)| p.0 >= 0.0 && p.0 < w && p.1 >= 0.0 && p.1 < h;

        let mut corners = match self.triangle {
            Some(corners) if corners.iter().all(in_bounds) => corners,
            _ => {
                let (cx, cy) = ((width / 2) as f32, (height / 2) as f32);
                [(cx, cy + 20.0), (cx - 20.0, cy - 10.0), (cx + 20.0, cy - 10.0)]
            }
        };
        for corner in &mut corners {
            *corner = transform.transform(corner.0, corner.1);
        }
        self.triangle = Some(corners);
        corners
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn textured_frame(width: usize, height: usize, dx: usize) -> Vec<u8> {
        let mut data = vec![0u8; width * height];
        for y in 0..height {
            for x in 0..width {
                let (bx, by) = (((x + 1000 - dx) / 12) as u32, (y / 12) as u32);
                let h = bx.wrapping_mul(73_856_093) ^ by.wrapping_mul(19_349_663);
                let h = h ^ (h >> 13);
                data[y * width + x] = (h % 200) as u8 + 28;
            }
        }
        data
    }

    fn create_test_config() -> CoordinatorConfig {
        let mut config = CoordinatorConfig::default();
        config.track.extractor.detector.max_features = None;
        config
    }

    #[test]
    fn test_rejects_wrong_output_size() {
        let mut processor = FrameProcessor::new(create_test_config());
        let gray = textured_frame(64, 48, 0);
        let mut rgb = vec![0u8; 64 * 48];
        let result = processor.process_frame(&gray, 64, 48, 64, &mut rgb);
        assert!(matches!(result, Err(CliError::BufferSize { .. })));
        assert_eq!(processor.frame_count(), 0);
    }

    #[test]
    fn test_strided_input() {
        let (width, height, stride) = (120, 80, 128);
        let packed = textured_frame(width, height, 0);
        let mut strided = vec![0u8; stride * height];
        for y in 0..height {
            strided[y * stride..y * stride + width].copy_from_slice(&packed[y * width..(y + 1) * width]);
        }

        let mut a = FrameProcessor::new(create_test_config());
        let mut b = FrameProcessor::new(create_test_config());
        let mut rgb_a = vec![0u8; width * height * 3];
        let mut rgb_b = vec![0u8; width * height * 3];
        let report_a = a.process_frame(&packed, width, height, width, &mut rgb_a).unwrap();
        let report_b = b.process_frame(&strided, width, height, stride, &mut rgb_b).unwrap();
        assert_eq!(report_a, report_b);
        assert_eq!(rgb_a, rgb_b);
    }

    #[test]
    fn test_tracks_shifted_frames() {
        let (width, height) = (320, 240);
        let mut processor = FrameProcessor::new(create_test_config());
        let mut rgb = vec![0u8; width * height * 3];

        let first = processor
            .process_frame(&textured_frame(width, height, 0), width, height, width, &mut rgb)
            .unwrap();
        assert!(!first.valid);

        let second = processor
            .process_frame(&textured_frame(width, height, 4), width, height, width, &mut rgb)
            .unwrap();
        assert!(second.valid);
        assert!(second.match_count >= 3);
        // 4 pixels at full size is 2 in tracker coordinates
        let (x, y) = second.transform.transform(80.0, 60.0);
        assert_abs_diff_eq!(x, 82.0, epsilon = 1.0);
        assert_abs_diff_eq!(y, 60.0, epsilon = 1.0);
        assert!(rgb.iter().any(|&v| v != 0));
    }

    #[test]
    fn test_triangle_recentres_when_lost() {
        let mut processor = FrameProcessor::new(create_test_config());
        let far = AffineModel::from_translation(500.0, 0.0);
        let moved = processor.move_triangle((100, 80), &far);
        assert!(moved[0].0 > 100.0);

        let reset = processor.move_triangle((100, 80), &AffineModel::identity());
        assert_eq!(reset[0], (50.0, 60.0));
    }
}
