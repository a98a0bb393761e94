use crate::builder::DetectorBuilder;
use crate::error::{FastError, FastResult};
use crate::types::FastVariant;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Complete detector configuration with all settings
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct DetectorConfig {
    /// Segment-test threshold (1-127)
    pub threshold: u8,
    pub variant: FastVariant,
    /// Minimum distance between surviving corners; 0 disables suppression
    pub nms_distance: f32,
    /// Corners scoring below this are dropped after suppression
    pub min_response: f32,
    /// Keep only the strongest N corners
    #[cfg_attr(feature = "serde", serde(skip_serializing_if = "Option::is_none"))]
    pub max_features: Option<usize>,
    /// Metadata
    #[cfg_attr(feature = "serde", serde(skip_serializing_if = "Option::is_none"))]
    pub name: Option<String>,
    #[cfg_attr(feature = "serde", serde(skip_serializing_if = "Option::is_none"))]
    pub description: Option<String>,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            threshold: 30,
            variant: FastVariant::Fast9,
            nms_distance: 2.0,
            min_response: 0.0,
            max_features: None,
            name: None,
            description: None,
        }
    }
}

impl DetectorConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Per-frame tracking: a hundred strongest corners
    pub fn tracking_preset() -> Self {
        Self {
            max_features: Some(100),
            name: Some("Tracking".to_string()),
            description: Some("Strongest 100 corners per frame for motion tracking".to_string()),
            ..Self::default()
        }
    }

    /// Database building: every corner above threshold
    pub fn database_preset() -> Self {
        Self {
            name: Some("Database".to_string()),
            description: Some("All corners above threshold for reference images".to_string()),
            ..Self::default()
        }
    }

    /// Low-contrast scenes
    pub fn dense_preset() -> Self {
        Self {
            threshold: 15,
            name: Some("Dense".to_string()),
            description: Some("Lower threshold for low-contrast scenes".to_string()),
            ..Self::default()
        }
    }

    /// Add metadata to configuration
    pub fn with_metadata(mut self, name: &str, description: &str) -> Self {
        self.name = Some(name.to_string());
        self.description = Some(description.to_string());
        self
    }

    /// Convert to DetectorBuilder for further customization
    pub fn to_builder(self) -> DetectorBuilder {
        DetectorBuilder::from_config(self)
    }

    /// Generate human-readable summary
    pub fn summary(&self) -> String {
        let max = self
            .max_features
            .map_or_else(|| "all".to_string(), |m| m.to_string());
        format!(
            "DetectorConfig: {}, threshold={}, nms={:.1}, min_response={:.1}, max_features={}",
            self.variant.name(),
            self.threshold,
            self.nms_distance,
            self.min_response,
            max
        )
    }

    /// Validate configuration parameters
    pub fn validate(&self) -> FastResult<()> {
        if self.threshold == 0 || self.threshold > 127 {
            return Err(FastError::InvalidThreshold(self.threshold));
        }
        if !self.nms_distance.is_finite() || self.nms_distance < 0.0 {
            return Err(FastError::InvalidNmsDistance(self.nms_distance));
        }
        if self.max_features == Some(0) {
            return Err(FastError::InvalidMaxFeatures(0));
        }
        Ok(())
    }

    /// Save configuration to JSON file
    #[cfg(feature = "serde")]
    pub fn save_json<P: AsRef<std::path::Path>>(&self, path: P) -> Result<(), Box<dyn std::error::Error>> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Load configuration from JSON file
    #[cfg(feature = "serde")]
    pub fn load_json<P: AsRef<std::path::Path>>(path: P) -> Result<Self, Box<dyn std::error::Error>> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    /// Save configuration to TOML file
    #[cfg(feature = "serde")]
    pub fn save_toml<P: AsRef<std::path::Path>>(&self, path: P) -> Result<(), Box<dyn std::error::Error>> {
        let toml = toml::to_string_pretty(self)?;
        std::fs::write(path, toml)?;
        Ok(())
    }

    /// Load configuration from TOML file
    #[cfg(feature = "serde")]
    pub fn load_toml<P: AsRef<std::path::Path>>(path: P) -> Result<Self, Box<dyn std::error::Error>> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    #[cfg(feature = "serde")]
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    #[cfg(feature = "serde")]
    pub fn from_json(json: &str) -> Result<Self, Box<dyn std::error::Error>> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    #[cfg(feature = "serde")]
    pub fn to_toml(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }

    #[cfg(feature = "serde")]
    pub fn from_toml(toml_str: &str) -> Result<Self, Box<dyn std::error::Error>> {
        let config: Self = toml::from_str(toml_str)?;
        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        let config = DetectorConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.threshold, 30);
        assert_eq!(config.variant, FastVariant::Fast9);
    }

    #[test]
    fn test_presets_are_valid() {
        for preset in [
            DetectorConfig::tracking_preset(),
            DetectorConfig::database_preset(),
            DetectorConfig::dense_preset(),
        ] {
            assert!(preset.validate().is_ok(), "{}", preset.summary());
            assert!(preset.name.is_some());
        }
        assert_eq!(DetectorConfig::tracking_preset().max_features, Some(100));
    }

    #[test]
    fn test_validation_errors() {
        let mut config = DetectorConfig { threshold: 0, ..DetectorConfig::default() };
        assert!(matches!(config.validate(), Err(FastError::InvalidThreshold(0))));

        config.threshold = 20;
        config.nms_distance = f32::NAN;
        assert!(matches!(config.validate(), Err(FastError::InvalidNmsDistance(_))));

        config.nms_distance = 1.0;
        config.max_features = Some(0);
        assert!(matches!(config.validate(), Err(FastError::InvalidMaxFeatures(0))));
    }

    #[test]
    fn test_summary_mentions_variant() {
        let summary = DetectorConfig::default().summary();
        assert!(summary.contains("FAST-9"));
        assert!(summary.contains("max_features=all"));
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_json_round_trip() {
        let config = DetectorConfig::tracking_preset();
        let json = config.to_json().unwrap();
        assert_eq!(DetectorConfig::from_json(&json).unwrap(), config);
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_toml_rejects_invalid() {
        let result = DetectorConfig::from_toml("threshold = 0\n");
        assert!(result.is_err());
    }
}
