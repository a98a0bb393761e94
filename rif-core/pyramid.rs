use log::trace;

use crate::buffer::{Pixel, PixelBuffer};

/// Mipmap of progressively halved images, level 0 at full resolution.
///
/// Each level is `ceil(dim / 2)` of the previous one along both axes. Odd
/// dimensions use per-position 3-tap weights so the whole source extent is
/// covered; even dimensions use `[0.25, 0.5, 0.25]`.
#[derive(Debug, Clone)]
pub struct ImagePyramid<T> {
    levels: Vec<PixelBuffer<T>>,
}

/// Scale-dependent quantities reused while consecutive trilinear lookups
/// share the same scale. Owned by the caller, never shared between threads.
#[derive(Debug, Clone, Copy, Default)]
pub struct TrilinearCache {
    scale: Option<f32>,
    lower: usize,
    upper: usize,
    ratios: [(f32, f32); 2],
    weights: [f32; 2],
}

impl<T: Pixel> ImagePyramid<T> {
    /// Number of levels built for an image: `ceil(log2(max(width, height)))`, at least one
    pub fn level_count(width: usize, height: usize) -> usize {
        let max_dim = width.max(height).max(1);
        let levels = usize::BITS - (max_dim - 1).leading_zeros();
        (levels as usize).max(1)
    }

    pub fn new(image: &PixelBuffer<T>) -> Self {
        Self::with_levels(image, usize::MAX)
    }

    /// Only the first `max_levels` levels (at least one), capped at
    /// [`level_count`](Self::level_count)
    pub fn with_levels(image: &PixelBuffer<T>, max_levels: usize) -> Self {
        let count = Self::level_count(image.width(), image.height()).min(max_levels.max(1));
        let mut levels = Vec::with_capacity(count);
        levels.push(image.clone());
        for level in 1..count {
            let next = Self::downsample(&levels[level - 1]);
            trace!("pyramid level {} -> {}x{}", level, next.width(), next.height());
            levels.push(next);
        }
        Self { levels }
    }

    pub fn len(&self) -> usize {
        self.levels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }

    pub fn level(&self, index: usize) -> Option<&PixelBuffer<T>> {
        self.levels.get(index)
    }

    pub fn levels(&self) -> &[PixelBuffer<T>] {
        &self.levels
    }

    /// Per-output taps and weights along one axis
    fn axis_taps(prev: usize) -> Vec<([usize; 3], [f32; 3])> {
        let cur = prev.div_ceil(2);
        (0..cur)
            .map(|x| {
                let taps = [
                    (2 * x).saturating_sub(1),
                    (2 * x).min(prev - 1),
                    (2 * x + 1).min(prev - 1),
                ];
                let weights = if prev % 2 == 1 {
                    let w0 = x as f32 / prev as f32;
                    let w1 = cur as f32 / prev as f32;
                    [w0, w1, 1.0 - w0 - w1]
                } else {
                    [0.25, 0.5, 0.25]
                };
                (taps, weights)
            })
            .collect()
    }

    fn downsample(prev: &PixelBuffer<T>) -> PixelBuffer<T> {
        let (w, h, channels) = (prev.width(), prev.height(), prev.channels());
        if w == 0 || h == 0 {
            return prev.clone();
        }
        let x_taps = Self::axis_taps(w);
        let y_taps = Self::axis_taps(h);

        // Horizontal pass into a float scratch buffer
        let mut horiz = PixelBuffer::<f32>::new(x_taps.len(), h, channels);
        for y in 0..h {
            for (x, (taps, weights)) in x_taps.iter().enumerate() {
                for c in 0..channels {
                    let v: f32 = taps
                        .iter()
                        .zip(weights)
                        .map(|(&t, &wt)| wt * prev.at(t, y, c).to_f32())
                        .sum();
                    horiz.set(x, y, c, v);
                }
            }
        }

        let mut out = PixelBuffer::new(x_taps.len(), y_taps.len(), channels);
        for (y, (taps, weights)) in y_taps.iter().enumerate() {
            for x in 0..x_taps.len() {
                for c in 0..channels {
                    let v: f32 = taps
                        .iter()
                        .zip(weights)
                        .map(|(&t, &wt)| wt * horiz.at(x, t, c))
                        .sum();
                    out.set(x, y, c, T::from_f32(v));
                }
            }
        }
        out
    }

    fn update_cache(&self, cache: &mut TrilinearCache, scale: f32) {
        if cache.scale == Some(scale) {
            return;
        }
        let last = self.levels.len().saturating_sub(1);
        let log_scale = scale.log2();
        let lower = (log_scale.floor() as usize).min(last);
        let upper = (log_scale.ceil() as usize).min(last);
        let (base_w, base_h) = self.levels[0].dimensions();
        let ratio = |idx: usize| {
            let (w, h) = self.levels[idx].dimensions();
            (w as f32 / base_w as f32, h as f32 / base_h as f32)
        };
        let weights = if lower == upper {
            [1.0, 0.0]
        } else {
            let lo = (lower as f32).exp2();
            let hi = (upper as f32).exp2();
            let w0 = (hi - scale) / (hi - lo);
            [w0, 1.0 - w0]
        };
        *cache = TrilinearCache {
            scale: Some(scale),
            lower,
            upper,
            ratios: [ratio(lower), ratio(upper)],
            weights,
        };
    }

    /// Samples at a continuous `scale` (>= 1, base-image coordinates) by
    /// blending bilinear samples from the two bracketing octaves.
    pub fn trilinear(&self, cache: &mut TrilinearCache, x: f32, y: f32, scale: f32, channel: usize) -> f32 {
        if self.levels.is_empty() || self.levels[0].is_empty() {
            return 0.0;
        }
        let scale = scale.max(1.0);
        self.update_cache(cache, scale);

        let sample = |level: usize, (rx, ry): (f32, f32)| {
            self.levels[level].bilinear(x * rx, y * ry, channel).unwrap_or(0.0)
        };
        let v0 = sample(cache.lower, cache.ratios[0]);
        if cache.lower == cache.upper {
            return v0;
        }
        let v1 = sample(cache.upper, cache.ratios[1]);
        cache.weights[0] * v0 + cache.weights[1] * v1
    }

    /// Convenience sampler holding its own cache
    pub fn sampler(&self) -> PyramidSampler<'_, T> {
        PyramidSampler {
            pyramid: self,
            cache: TrilinearCache::default(),
        }
    }
}

/// Borrowing sampler with a private [`TrilinearCache`]
pub struct PyramidSampler<'a, T> {
    pyramid: &'a ImagePyramid<T>,
    cache: TrilinearCache,
}

impl<T: Pixel> PyramidSampler<'_, T> {
    pub fn sample(&mut self, x: f32, y: f32, scale: f32, channel: usize) -> f32 {
        self.pyramid.trilinear(&mut self.cache, x, y, scale, channel)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn create_constant(width: usize, height: usize, value: f32) -> PixelBuffer<f32> {
        PixelBuffer::from_vec(width, height, 1, vec![value; width * height]).unwrap()
    }

    #[test]
    fn test_level_count() {
        assert_eq!(ImagePyramid::<u8>::level_count(1, 1), 1);
        assert_eq!(ImagePyramid::<u8>::level_count(8, 4), 3);
        assert_eq!(ImagePyramid::<u8>::level_count(9, 4), 4);
        assert_eq!(ImagePyramid::<u8>::level_count(640, 480), 10);
    }

    #[test]
    fn test_level_sizes_round_up() {
        let pyramid = ImagePyramid::new(&create_constant(13, 6, 1.0));
        let sizes: Vec<_> = pyramid.levels().iter().map(|l| l.dimensions()).collect();
        assert_eq!(sizes, vec![(13, 6), (7, 3), (4, 2), (2, 1)]);
    }

    #[test]
    fn test_with_levels_stops_early() {
        let image = create_constant(13, 6, 1.0);
        let full = ImagePyramid::new(&image);
        let limited = ImagePyramid::with_levels(&image, 2);
        assert_eq!(limited.len(), 2);
        assert_eq!(limited.levels(), &full.levels()[..2]);
        assert_eq!(ImagePyramid::with_levels(&image, 0).len(), 1);
        assert_eq!(ImagePyramid::with_levels(&image, 50).len(), full.len());
    }

    #[test]
    fn test_downsample_preserves_constant() {
        let pyramid = ImagePyramid::new(&create_constant(15, 10, 5.0));
        for level in pyramid.levels() {
            for &v in level.as_slice() {
                assert_abs_diff_eq!(v, 5.0, epsilon = 1e-4);
            }
        }
    }

    #[test]
    fn test_odd_weights_sum_to_one() {
        for prev in [1usize, 3, 5, 7, 11] {
            for (_, weights) in ImagePyramid::<f32>::axis_taps(prev) {
                assert_abs_diff_eq!(weights.iter().sum::<f32>(), 1.0, epsilon = 1e-6);
            }
        }
    }

    #[test]
    fn test_trilinear_integer_scale() {
        let data: Vec<f32> = (0..64).map(|i| (i % 8) as f32).collect();
        let img = PixelBuffer::from_vec(8, 8, 1, data).unwrap();
        let pyramid = ImagePyramid::new(&img);
        let mut cache = TrilinearCache::default();
        let v = pyramid.trilinear(&mut cache, 3.0, 3.0, 1.0, 0);
        assert_abs_diff_eq!(v, 3.0, epsilon = 1e-5);
        // Scales below one clamp to the base level
        let v = pyramid.trilinear(&mut cache, 3.0, 3.0, 0.25, 0);
        assert_abs_diff_eq!(v, 3.0, epsilon = 1e-5);
    }

    #[test]
    fn test_trilinear_blends_between_levels() {
        let pyramid = ImagePyramid::new(&create_constant(32, 32, 8.0));
        let mut sampler = pyramid.sampler();
        assert_abs_diff_eq!(sampler.sample(6.0, 6.0, 1.5, 0), 8.0, epsilon = 1e-4);
        assert_abs_diff_eq!(sampler.sample(6.0, 6.0, 3.0, 0), 8.0, epsilon = 1e-4);
    }

    #[test]
    fn test_cache_is_per_caller() {
        let pyramid = ImagePyramid::new(&create_constant(16, 16, 2.0));
        let mut a = TrilinearCache::default();
        let mut b = TrilinearCache::default();
        pyramid.trilinear(&mut a, 2.0, 2.0, 2.0, 0);
        pyramid.trilinear(&mut b, 2.0, 2.0, 4.0, 0);
        assert_eq!(a.scale, Some(2.0));
        assert_eq!(b.scale, Some(4.0));
    }
}
