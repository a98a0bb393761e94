use crate::config::DetectorConfig;
use crate::configured_detector::ConfiguredDetector;
use crate::detector::FastDetector;
use crate::error::FastResult;
use crate::types::FastVariant;

/// Builder for creating a `ConfiguredDetector`
#[derive(Debug, Clone, Default)]
pub struct DetectorBuilder {
    config: DetectorConfig,
}

impl DetectorBuilder {
    /// Create a new builder with default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the FAST threshold (1-127)
    pub fn threshold(mut self, threshold: u8) -> Self {
        self.config.threshold = threshold;
        self
    }

    /// Set the FAST variant (FAST-9 or FAST-12)
    pub fn variant(mut self, variant: FastVariant) -> Self {
        self.config.variant = variant;
        self
    }

    /// Set the non-maximum suppression (NMS) distance
    pub fn nms_distance(mut self, distance: f32) -> Self {
        self.config.nms_distance = distance;
        self
    }

    pub fn min_response(mut self, response: f32) -> Self {
        self.config.min_response = response;
        self
    }

    /// Cap the number of returned corners; `None` keeps all
    pub fn max_features(mut self, max: Option<usize>) -> Self {
        self.config.max_features = max;
        self
    }

    pub fn preset_tracking(mut self) -> Self {
        self.config = DetectorConfig::tracking_preset();
        self
    }

    pub fn preset_database(mut self) -> Self {
        self.config = DetectorConfig::database_preset();
        self
    }

    pub fn preset_dense(mut self) -> Self {
        self.config = DetectorConfig::dense_preset();
        self
    }

    /// Build the `ConfiguredDetector`
    pub fn build(self) -> FastResult<ConfiguredDetector> {
        self.config.validate()?;
        let detector = FastDetector::new(self.config.threshold, self.config.variant)?;
        Ok(ConfiguredDetector {
            detector,
            config: self.config,
        })
    }

    /// Generate a summary of the builder's configuration
    pub fn summary(&self) -> String {
        self.config.summary()
    }

    /// Create a builder from an existing `DetectorConfig`
    pub fn from_config(config: DetectorConfig) -> Self {
        Self { config }
    }

    /// Convert the builder into a `DetectorConfig`
    pub fn to_config(self) -> DetectorConfig {
        self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FastError;

    #[test]
    fn test_fluent_configuration() {
        let config = DetectorBuilder::new()
            .threshold(25)
            .variant(FastVariant::Fast12)
            .nms_distance(4.0)
            .max_features(Some(50))
            .to_config();
        assert_eq!(config.threshold, 25);
        assert_eq!(config.variant, FastVariant::Fast12);
        assert_eq!(config.nms_distance, 4.0);
        assert_eq!(config.max_features, Some(50));
    }

    #[test]
    fn test_build_validates() {
        let result = DetectorBuilder::new().threshold(0).build();
        assert!(matches!(result, Err(FastError::InvalidThreshold(0))));

        let result = DetectorBuilder::new().nms_distance(-1.0).build();
        assert!(matches!(result, Err(FastError::InvalidNmsDistance(_))));
    }

    #[test]
    fn test_preset_then_override() {
        let detector = DetectorBuilder::new()
            .preset_tracking()
            .threshold(40)
            .build()
            .unwrap();
        assert_eq!(detector.config().threshold, 40);
        assert_eq!(detector.config().max_features, Some(100));
    }

    #[test]
    fn test_config_round_trip() {
        let config = DetectorConfig::dense_preset();
        assert_eq!(config.clone().to_builder().to_config(), config);
    }
}
