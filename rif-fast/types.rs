use rif_core::Keypoint;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Keypoint with corner response score for NMS
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoredKeypoint {
    pub keypoint: Keypoint,
    pub response: f32,
}

impl ScoredKeypoint {
    pub fn new(x: f32, y: f32, response: f32) -> Self {
        Self {
            keypoint: Keypoint { x, y, angle: 0.0 },
            response,
        }
    }
}

/// Segment-test variant: minimum contiguous arc on the 16-pixel circle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum FastVariant {
    #[default]
    Fast9,
    Fast12,
}

impl FastVariant {
    pub fn arc_length(self) -> usize {
        match self {
            FastVariant::Fast9 => 9,
            FastVariant::Fast12 => 12,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            FastVariant::Fast9 => "FAST-9",
            FastVariant::Fast12 => "FAST-12",
        }
    }
}

/// Corner type classification for the segment test
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum CornerType {
    Bright,
    Dark,
    None,
}
