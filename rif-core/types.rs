#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Corner location reported by a detector, in the pixel grid it ran on
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Keypoint {
    pub x: f32,
    pub y: f32,
    pub angle: f32,
}

/// Keypoint record `[x, y, scale, orientation, response]`.
///
/// `scale` is the (possibly fractional) octave the point was detected at;
/// `x` and `y` are in base-image coordinates once extraction finishes.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Frame {
    pub x: f32,
    pub y: f32,
    pub scale: f32,
    pub orientation: f32,
    pub response: f32,
}

impl Frame {
    /// Number of scalars in the serialized form
    pub const DIM: usize = 5;

    pub fn new(x: f32, y: f32, scale: f32, response: f32) -> Self {
        Self {
            x,
            y,
            scale,
            orientation: 0.0,
            response,
        }
    }

    pub fn to_array(&self) -> [f32; Self::DIM] {
        [self.x, self.y, self.scale, self.orientation, self.response]
    }

    /// Missing trailing values default to zero, extra values are ignored
    pub fn from_slice(values: &[f32]) -> Self {
        let at = |i: usize| values.get(i).copied().unwrap_or(0.0);
        Self {
            x: at(0),
            y: at(1),
            scale: at(2),
            orientation: at(3),
            response: at(4),
        }
    }

    /// Integer octave the frame was detected in
    pub fn octave(&self) -> u32 {
        self.scale.max(0.0) as u32
    }
}

/// Correspondence between a query feature and a reference feature
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Match {
    pub query: usize,
    pub reference: usize,
}

impl Match {
    pub fn new(query: usize, reference: usize) -> Self {
        Self { query, reference }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_array_round_trip() {
        let frame = Frame {
            x: 1.0,
            y: 2.0,
            scale: 1.5,
            orientation: 0.25,
            response: 40.0,
        };
        assert_eq!(Frame::from_slice(&frame.to_array()), frame);
        assert_eq!(frame.octave(), 1);
    }

    #[test]
    fn test_frame_from_short_slice() {
        let frame = Frame::from_slice(&[3.0, 4.0]);
        assert_eq!(frame, Frame::new(3.0, 4.0, 0.0, 0.0));
    }
}
