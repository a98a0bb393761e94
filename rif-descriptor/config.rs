use std::marker::PhantomData;
use std::sync::Arc;

use rif_fast::{DetectorConfig, KeypointDetector};

use crate::cell_map::CellConfig;
use crate::error::{DescriptorError, DescriptorResult};
use crate::extractor::RifExtractor;
use crate::quantizer::Quantizer;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Settings for RIF detection and description
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct ExtractorConfig {
    pub cells: CellConfig,
    pub detector: DetectorConfig,
    /// Pyramid levels per sub-octave; 1 selects single-scale extraction
    pub num_octaves: usize,
    pub scales_per_octave: usize,
    /// Box-blur the image before detection; description always uses the input
    pub blur: bool,
    /// Apply the variance-ranked dimension order to 100-dimensional descriptors
    pub reorder: bool,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            cells: CellConfig::polar3x6_patch31_skip(),
            detector: DetectorConfig::database_preset(),
            num_octaves: 1,
            scales_per_octave: 1,
            blur: false,
            reorder: true,
        }
    }
}

impl ExtractorConfig {
    /// Single scale, strongest 100 corners
    pub fn tracking() -> Self {
        Self {
            cells: CellConfig::annuli4_patch35_skip(),
            detector: DetectorConfig::tracking_preset(),
            ..Self::default()
        }
    }

    /// 3 octaves x 3 scales, every corner
    pub fn database() -> Self {
        Self {
            cells: CellConfig::annuli4_patch35(),
            detector: DetectorConfig::database_preset(),
            num_octaves: 3,
            scales_per_octave: 3,
            ..Self::default()
        }
    }

    pub fn is_multi_scale(&self) -> bool {
        self.num_octaves > 1
    }

    pub fn validate(&self) -> DescriptorResult<()> {
        self.cells.validate()?;
        self.detector.validate()?;
        if self.num_octaves == 0 || self.scales_per_octave == 0 {
            return Err(DescriptorError::InvalidScaleSpace {
                num_octaves: self.num_octaves,
                scales_per_octave: self.scales_per_octave,
            });
        }
        Ok(())
    }

    pub fn summary(&self) -> String {
        format!(
            "ExtractorConfig: patch={}, cells={}, octaves={}x{}, blur={}, {}",
            self.cells.patch_size,
            self.cells.num_cells(),
            self.num_octaves,
            self.scales_per_octave,
            self.blur,
            self.detector.summary()
        )
    }
}

/// Fluent builder for [`RifExtractor`]
pub struct ExtractorBuilder<Q: Quantizer> {
    config: ExtractorConfig,
    detector: Option<Arc<dyn KeypointDetector>>,
    _quantizer: PhantomData<Q>,
}

impl<Q: Quantizer> Default for ExtractorBuilder<Q> {
    fn default() -> Self {
        Self::from_config(ExtractorConfig::default())
    }
}

impl<Q: Quantizer> ExtractorBuilder<Q> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(config: ExtractorConfig) -> Self {
        Self {
            config,
            detector: None,
            _quantizer: PhantomData,
        }
    }

    pub fn cells(mut self, cells: CellConfig) -> Self {
        self.config.cells = cells;
        self
    }

    /// Select a named cell preset such as `"Annuli4Patch35Skip"`
    pub fn cell_preset(mut self, name: &str) -> DescriptorResult<Self> {
        self.config.cells = CellConfig::from_name(name)?;
        Ok(self)
    }

    pub fn detector_config(mut self, detector: DetectorConfig) -> Self {
        self.config.detector = detector;
        self
    }

    /// Replace the FAST detector with another strategy
    pub fn detector(mut self, detector: Arc<dyn KeypointDetector>) -> Self {
        self.detector = Some(detector);
        self
    }

    pub fn octaves(mut self, num_octaves: usize, scales_per_octave: usize) -> Self {
        self.config.num_octaves = num_octaves;
        self.config.scales_per_octave = scales_per_octave;
        self
    }

    pub fn blur(mut self, enable: bool) -> Self {
        self.config.blur = enable;
        self
    }

    pub fn reorder(mut self, enable: bool) -> Self {
        self.config.reorder = enable;
        self
    }

    pub fn preset_tracking(mut self) -> Self {
        self.config = ExtractorConfig::tracking();
        self
    }

    pub fn preset_database(mut self) -> Self {
        self.config = ExtractorConfig::database();
        self
    }

    pub fn build(self) -> DescriptorResult<RifExtractor<Q>> {
        match self.detector {
            Some(detector) => RifExtractor::with_detector(self.config, detector),
            None => RifExtractor::new(self.config),
        }
    }

    pub fn summary(&self) -> String {
        format!("{} [quantizer {}]", self.config.summary(), Q::NAME)
    }

    pub fn to_config(self) -> ExtractorConfig {
        self.config
    }
}
