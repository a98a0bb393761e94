use rif_descriptor::{CellConfig, ExtractorConfig};
use rif_match::RansacConfig;

use crate::error::{TrackError, TrackResult};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// JSON and TOML persistence, validated on load
macro_rules! impl_config_io {
    ($config:ty) => {
        #[cfg(feature = "serde")]
        impl $config {
            /// Save configuration to JSON file
            pub fn save_json<P: AsRef<std::path::Path>>(&self, path: P) -> Result<(), Box<dyn std::error::Error>> {
                let json = serde_json::to_string_pretty(self)?;
                std::fs::write(path, json)?;
                Ok(())
            }

            /// Load configuration from JSON file
            pub fn load_json<P: AsRef<std::path::Path>>(path: P) -> Result<Self, Box<dyn std::error::Error>> {
                let content = std::fs::read_to_string(path)?;
                Self::from_json(&content)
            }

            /// Save configuration to TOML file
            pub fn save_toml<P: AsRef<std::path::Path>>(&self, path: P) -> Result<(), Box<dyn std::error::Error>> {
                let toml = toml::to_string_pretty(self)?;
                std::fs::write(path, toml)?;
                Ok(())
            }

            /// Load configuration from TOML file
            pub fn load_toml<P: AsRef<std::path::Path>>(path: P) -> Result<Self, Box<dyn std::error::Error>> {
                let content = std::fs::read_to_string(path)?;
                Self::from_toml(&content)
            }

            pub fn to_json(&self) -> Result<String, serde_json::Error> {
                serde_json::to_string_pretty(self)
            }

            pub fn from_json(json: &str) -> Result<Self, Box<dyn std::error::Error>> {
                let config: Self = serde_json::from_str(json)?;
                config.validate()?;
                Ok(config)
            }

            pub fn to_toml(&self) -> Result<String, toml::ser::Error> {
                toml::to_string_pretty(self)
            }

            pub fn from_toml(toml_str: &str) -> Result<Self, Box<dyn std::error::Error>> {
                let config: Self = toml::from_str(toml_str)?;
                config.validate()?;
                Ok(config)
            }
        }
    };
}

fn invalid(reason: impl Into<String>) -> TrackError {
    TrackError::InvalidConfig {
        reason: reason.into(),
    }
}

/// Frame-to-frame tracker settings
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct TrackConfig {
    pub extractor: ExtractorConfig,
    /// Largest descriptor distance accepted as a match
    pub thresh: f32,
    /// A candidate closer than this ends the search immediately
    pub early_term_thresh: f32,
    /// Spatial hash bin size in pixels, rounded up to a power of two
    pub bin_size: usize,
    /// Matches needed for a valid frame
    pub min_tracked_points: usize,
    /// Hash candidates compared per feature
    pub max_compares: usize,
    /// Feature stores kept in the ring buffer
    pub history: usize,
    /// Horizontal camera field of view in degrees
    pub fov_x: f32,
    pub fov_y: f32,
    /// Distance right of the image centre used to measure roll
    pub roll_offset: f32,
}

impl Default for TrackConfig {
    fn default() -> Self {
        Self {
            extractor: ExtractorConfig::tracking(),
            thresh: 1.0,
            early_term_thresh: 0.5,
            bin_size: 8,
            min_tracked_points: 3,
            max_compares: 8,
            history: 5,
            fov_x: 53.0,
            fov_y: 40.0,
            roll_offset: 50.0,
        }
    }
}

impl TrackConfig {
    /// 3 rings x 6 sectors, for use with the 3x3 quantizer
    pub fn polar() -> Self {
        let mut config = Self::default();
        config.extractor.cells = CellConfig::polar3x6_patch31_skip();
        config.thresh = 3.0;
        config
    }

    pub fn validate(&self) -> TrackResult<()> {
        self.extractor.validate()?;
        if !(self.thresh > 0.0) || !(self.early_term_thresh >= 0.0) {
            return Err(invalid(format!(
                "thresholds must be positive, got thresh={} early_term_thresh={}",
                self.thresh, self.early_term_thresh
            )));
        }
        if self.bin_size == 0 {
            return Err(invalid("bin_size must be positive"));
        }
        if self.max_compares == 0 || self.history == 0 {
            return Err(invalid("max_compares and history must be positive"));
        }
        if !(self.fov_x > 0.0 && self.fov_y > 0.0) {
            return Err(invalid("field of view must be positive"));
        }
        Ok(())
    }

    pub fn summary(&self) -> String {
        format!(
            "TrackConfig: thresh={:.2}, early={:.2}, bin={}, min_points={}, fov={}x{}, {}",
            self.thresh,
            self.early_term_thresh,
            self.bin_size,
            self.min_tracked_points,
            self.fov_x,
            self.fov_y,
            self.extractor.summary()
        )
    }
}

impl_config_io!(TrackConfig);

/// Reference database and query settings
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct MatcherConfig {
    pub extractor: ExtractorConfig,
    /// Nearest/second-nearest distance ratio for accepting a match
    pub ratio_thresh: f32,
    /// Reference descriptors whose nearest other descriptor in the same
    /// image is closer than this are discarded
    pub unique_desc_thresh: f32,
    pub min_matches: usize,
    pub ransac: RansacConfig,
}

impl Default for MatcherConfig {
    fn default() -> Self {
        Self {
            extractor: ExtractorConfig::database(),
            ratio_thresh: 0.8,
            unique_desc_thresh: 150.0,
            min_matches: 4,
            ransac: RansacConfig::default(),
        }
    }
}

impl MatcherConfig {
    pub fn validate(&self) -> TrackResult<()> {
        self.extractor.validate()?;
        self.ransac.validate()?;
        if !(self.ratio_thresh > 0.0 && self.ratio_thresh <= 1.0) {
            return Err(invalid(format!(
                "ratio_thresh must be in (0, 1], got {}",
                self.ratio_thresh
            )));
        }
        if !(self.unique_desc_thresh >= 0.0) {
            return Err(invalid("unique_desc_thresh must be non-negative"));
        }
        Ok(())
    }

    pub fn summary(&self) -> String {
        format!(
            "MatcherConfig: ratio={:.2}, unique={}, min_matches={}, ransac_iters={}, {}",
            self.ratio_thresh,
            self.unique_desc_thresh,
            self.min_matches,
            self.ransac.max_iterations,
            self.extractor.summary()
        )
    }
}

impl_config_io!(MatcherConfig);

/// Settings for the combined track and match loops
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct CoordinatorConfig {
    pub track: TrackConfig,
    pub matcher: MatcherConfig,
    /// Query the database every this many frames
    pub query_period: usize,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            track: TrackConfig::default(),
            matcher: MatcherConfig::default(),
            query_period: 15,
        }
    }
}

impl CoordinatorConfig {
    /// Query on every frame, for the synchronous loop
    pub fn synchronous() -> Self {
        Self {
            query_period: 1,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> TrackResult<()> {
        self.track.validate()?;
        self.matcher.validate()?;
        if self.query_period == 0 {
            return Err(invalid("query_period must be positive"));
        }
        Ok(())
    }

    pub fn summary(&self) -> String {
        format!(
            "CoordinatorConfig: query every {} frames\n  {}\n  {}",
            self.query_period,
            self.track.summary(),
            self.matcher.summary()
        )
    }
}

impl_config_io!(CoordinatorConfig);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_validate() {
        assert!(TrackConfig::default().validate().is_ok());
        assert!(TrackConfig::polar().validate().is_ok());
        assert!(MatcherConfig::default().validate().is_ok());
        assert!(CoordinatorConfig::default().validate().is_ok());
        assert_eq!(CoordinatorConfig::synchronous().query_period, 1);
    }

    #[test]
    fn test_tracking_defaults() {
        let config = TrackConfig::default();
        assert_eq!(config.extractor.cells, CellConfig::annuli4_patch35_skip());
        assert_eq!(config.extractor.detector.max_features, Some(100));
        assert_eq!(config.history, 5);
        assert_eq!(TrackConfig::polar().thresh, 3.0);
    }

    #[test]
    fn test_matcher_defaults() {
        let config = MatcherConfig::default();
        assert_eq!(config.extractor.cells, CellConfig::annuli4_patch35());
        assert_eq!(config.extractor.num_octaves, 3);
        assert_eq!(config.extractor.scales_per_octave, 3);
        assert_eq!(config.ratio_thresh, 0.8);
    }

    #[test]
    fn test_validation_errors() {
        let config = TrackConfig {
            bin_size: 0,
            ..TrackConfig::default()
        };
        assert!(matches!(config.validate(), Err(TrackError::InvalidConfig { .. })));

        let config = MatcherConfig {
            ratio_thresh: 1.5,
            ..MatcherConfig::default()
        };
        assert!(matches!(config.validate(), Err(TrackError::InvalidConfig { .. })));

        let config = CoordinatorConfig {
            query_period: 0,
            ..CoordinatorConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_ransac_errors_convert() {
        let mut config = MatcherConfig::default();
        config.ransac.max_iterations = 0;
        assert!(matches!(config.validate(), Err(TrackError::Matching(_))));
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_toml_round_trip() {
        let config = CoordinatorConfig::default();
        let text = config.to_toml().unwrap();
        assert_eq!(CoordinatorConfig::from_toml(&text).unwrap(), config);
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_partial_toml_uses_defaults() {
        let config = TrackConfig::from_toml("thresh = 2.5\n").unwrap();
        assert_eq!(config.thresh, 2.5);
        assert_eq!(config.bin_size, 8);
        assert!(TrackConfig::from_toml("bin_size = 0\n").is_err());
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_json_round_trip() {
        let config = MatcherConfig::default();
        let json = config.to_json().unwrap();
        assert_eq!(MatcherConfig::from_json(&json).unwrap(), config);
    }
}
