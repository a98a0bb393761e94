//! Joint quantization of (radial, tangential) gradient pairs into histogram bins.
//!
//! Gradients arrive already scaled by the patch's inverse standard deviation,
//! so levels sit at `[-0.5, -0.25, 0, 0.25, 0.5]` and outer bins are clipped.

/// Maps a gradient pair to a bin in a `SQRT_NUM_BINS x SQRT_NUM_BINS` grid
pub trait Quantizer: Default + Clone + Send + Sync + 'static {
    const NUM_BINS: usize;
    const SQRT_NUM_BINS: usize;
    const NAME: &'static str;

    fn scalar_quantize(x: f32) -> usize;

    #[inline]
    fn quantize(dr: f32, dt: f32) -> usize {
        Self::SQRT_NUM_BINS * Self::scalar_quantize(dr) + Self::scalar_quantize(dt)
    }
}

/// `round(4x)` with halves rounded up
#[inline]
fn quarter_level(x: f32) -> i32 {
    (4.0 * x + 0.5).floor() as i32
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Quantize3x3;

impl Quantizer for Quantize3x3 {
    const NUM_BINS: usize = 9;
    const SQRT_NUM_BINS: usize = 3;
    const NAME: &'static str = "3x3";

    #[inline]
    fn scalar_quantize(x: f32) -> usize {
        match quarter_level(x) {
            i if i >= 1 => 2,
            i if i <= -1 => 0,
            _ => 1,
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Quantize5x5;

impl Quantizer for Quantize5x5 {
    const NUM_BINS: usize = 25;
    const SQRT_NUM_BINS: usize = 5;
    const NAME: &'static str = "5x5";

    #[inline]
    fn scalar_quantize(x: f32) -> usize {
        (quarter_level(x).clamp(-2, 2) + 2) as usize
    }
}
