use std::ops::{Add, Sub};

use rayon::prelude::*;

use crate::buffer::{Pixel, PixelBuffer};
use crate::error::{CoreError, CoreResult};

/// Running-sum box filter over one line with window `[i - before, i + after]`.
/// Samples past either end count as zero; the output is divided by the full
/// window size.
fn box_filter_line(line: &[f32], out: &mut [f32], before: usize, after: usize) {
    let n = line.len();
    let size = (before + after + 1) as f32;
    let mut sum: f32 = line.iter().take(after).sum();
    for i in 0..n {
        if i + after < n {
            sum += line[i + after];
        }
        if i > before {
            sum -= line[i - before - 1];
        }
        out[i] = sum / size;
    }
}

/// 1D convolution that drops taps falling outside the line and renormalises
/// by the in-bounds kernel weight.
fn convolve_line(line: &[f32], out: &mut [f32], kernel: &[f32]) {
    let n = line.len() as isize;
    let center = (kernel.len() / 2) as isize;
    for (i, o) in out.iter_mut().enumerate() {
        let mut acc = 0.0f32;
        let mut weight = 0.0f32;
        for (k, &kv) in kernel.iter().enumerate() {
            let src = i as isize + k as isize - center;
            if src < 0 || src >= n {
                continue;
            }
            acc += kv * line[src as usize];
            weight += kv;
        }
        *o = if weight != 0.0 { acc / weight } else { 0.0 };
    }
}

impl<T: Pixel> PixelBuffer<T> {
    /// Applies `filter` to every row of every channel, rows in parallel
    fn filter_rows(&mut self, filter: impl Fn(&[f32], &mut [f32]) + Sync) {
        let (width, channels) = (self.width(), self.channels());
        if width == 0 {
            return;
        }
        self.as_mut_slice()
            .par_chunks_mut(width * channels)
            .for_each(|row| {
                let mut line = vec![0.0f32; width];
                let mut out = vec![0.0f32; width];
                for c in 0..channels {
                    for x in 0..width {
                        line[x] = row[x * channels + c].to_f32();
                    }
                    filter(&line, &mut out);
                    for x in 0..width {
                        row[x * channels + c] = T::from_f32(out[x]);
                    }
                }
            });
    }

    /// Applies `filter` to every column of every channel
    fn filter_columns(&mut self, filter: impl Fn(&[f32], &mut [f32])) {
        let (width, height, channels) = (self.width(), self.height(), self.channels());
        let mut line = vec![0.0f32; height];
        let mut out = vec![0.0f32; height];
        for x in 0..width {
            for c in 0..channels {
                for y in 0..height {
                    line[y] = self.at(x, y, c).to_f32();
                }
                filter(&line, &mut out);
                for y in 0..height {
                    self.set(x, y, c, T::from_f32(out[y]));
                }
            }
        }
    }

    /// Horizontal box blur; even sizes round down to the next odd size
    pub fn horiz_blur(&mut self, size: usize) {
        if size <= 1 {
            return;
        }
        let half = (size - 1) >> 1;
        self.filter_rows(|line, out| box_filter_line(line, out, half, half));
    }

    pub fn vert_blur(&mut self, size: usize) {
        if size <= 1 {
            return;
        }
        let half = (size - 1) >> 1;
        self.filter_columns(|line, out| box_filter_line(line, out, half, half));
    }

    /// Separable box blur in O(width x height) regardless of `size`
    pub fn blur(&mut self, size: usize) {
        self.horiz_blur(size);
        self.vert_blur(size);
    }

    /// Box blur whose window is `size` rounded down to a power of two
    pub fn blur_pow2(&mut self, size: usize) {
        if size <= 1 {
            return;
        }
        let size = 1usize << (usize::BITS - 1 - size.leading_zeros());
        let half = size >> 1;
        self.filter_rows(|line, out| box_filter_line(line, out, half, half - 1));
        self.filter_columns(|line, out| box_filter_line(line, out, half, half - 1));
    }

    /// Three box passes approximating a Gaussian of deviation `sigma`
    pub fn fast_gaussian_blur(&mut self, sigma: f32) {
        let size = (2.0 * sigma).round() as usize;
        for _ in 0..3 {
            self.blur(size);
        }
    }

    pub fn gaussian_blur(&mut self, sigma: f32) {
        if sigma <= 0.0 {
            return;
        }
        let kernel = gaussian_kernel(sigma);
        self.horiz_convolve(&kernel);
        self.vert_convolve(&kernel);
    }

    pub fn horiz_convolve(&mut self, kernel: &[f32]) {
        if kernel.is_empty() {
            return;
        }
        self.filter_rows(|line, out| convolve_line(line, out, kernel));
    }

    pub fn vert_convolve(&mut self, kernel: &[f32]) {
        if kernel.is_empty() {
            return;
        }
        self.filter_columns(|line, out| convolve_line(line, out, kernel));
    }

    /// 2D convolution with a single-channel kernel centred at `(w/2, h/2)`.
    ///
    /// Kernel taps that fall outside the image are skipped and the result is
    /// normalised by the sum of the remaining weights, so borders keep their
    /// brightness instead of fading to black.
    pub fn convolve(&self, kernel: &PixelBuffer<f32>) -> PixelBuffer<T> {
        let (width, height, channels) = (self.width(), self.height(), self.channels());
        let (kw, kh) = kernel.dimensions();
        let (cx, cy) = ((kw / 2) as isize, (kh / 2) as isize);
        let mut out = PixelBuffer::new(width, height, channels);
        for y in 0..height {
            for x in 0..width {
                for c in 0..channels {
                    let mut acc = 0.0f32;
                    let mut weight = 0.0f32;
                    for ky in 0..kh {
                        for kx in 0..kw {
                            let sx = x as isize + kx as isize - cx;
                            let sy = y as isize + ky as isize - cy;
                            if let Some(v) = self.get(sx, sy, c) {
                                let kv = kernel.at(kx, ky, 0);
                                acc += kv * v.to_f32();
                                weight += kv;
                            }
                        }
                    }
                    let value = if weight != 0.0 { acc / weight } else { 0.0 };
                    out.set(x, y, c, T::from_f32(value));
                }
            }
        }
        out
    }

    /// Bilinear resize; source neighbours past the last row/column are clamped
    pub fn resize(&self, width: usize, height: usize) -> CoreResult<PixelBuffer<T>> {
        if width == 0 || height == 0 || self.is_empty() {
            return Err(CoreError::InvalidDimensions {
                width,
                height,
                channels: self.channels(),
            });
        }
        let (old_w, old_h, channels) = (self.width(), self.height(), self.channels());
        let scale_x = width as f32 / old_w as f32;
        let scale_y = height as f32 / old_h as f32;
        let mut out = PixelBuffer::new(width, height, channels);
        for j in 0..height {
            let y = j as f32 / scale_y;
            let q = (y as usize).min(old_h - 1);
            let v = y - q as f32;
            let q1 = (q + 1).min(old_h - 1);
            for i in 0..width {
                let x = i as f32 / scale_x;
                let p = (x as usize).min(old_w - 1);
                let u = x - p as f32;
                let p1 = (p + 1).min(old_w - 1);
                for c in 0..channels {
                    let a = self.at(p, q, c).to_f32();
                    let b = self.at(p1, q, c).to_f32();
                    let cc = self.at(p, q1, c).to_f32();
                    let d = self.at(p1, q1, c).to_f32();
                    let value = (1.0 - v) * ((1.0 - u) * a + u * b) + v * ((1.0 - u) * cc + u * d);
                    out.set(i, j, c, T::from_f32(value));
                }
            }
        }
        Ok(out)
    }

    /// Rescales samples into `[0, U::RANGE_MAX]` using the observed min/max
    pub fn convert<U: Pixel>(&self) -> PixelBuffer<U> {
        let Some((lo, hi)) = self.min_max() else {
            return PixelBuffer::new(self.width(), self.height(), self.channels());
        };
        let (lo, hi) = (lo.to_f32(), hi.to_f32());
        let range = hi - lo;
        self.map(|v| {
            if range == 0.0 {
                U::from_f32(0.0)
            } else {
                U::from_f32(U::RANGE_MAX * (v.to_f32() - lo) / range)
            }
        })
    }

    /// Central-difference gradients, one-sided at the borders
    pub fn symmetric_gradients(&self) -> (PixelBuffer<f32>, PixelBuffer<f32>) {
        let (width, height, channels) = (self.width(), self.height(), self.channels());
        let mut gx = PixelBuffer::new(width, height, channels);
        let mut gy = PixelBuffer::new(width, height, channels);
        for y in 0..height {
            for x in 0..width {
                for c in 0..channels {
                    let x0 = x.saturating_sub(1);
                    let x1 = (x + 1).min(width - 1);
                    if x1 > x0 {
                        let d = self.at(x1, y, c).to_f32() - self.at(x0, y, c).to_f32();
                        gx.set(x, y, c, d / (x1 - x0) as f32);
                    }
                    let y0 = y.saturating_sub(1);
                    let y1 = (y + 1).min(height - 1);
                    if y1 > y0 {
                        let d = self.at(x, y1, c).to_f32() - self.at(x, y0, c).to_f32();
                        gy.set(x, y, c, d / (y1 - y0) as f32);
                    }
                }
            }
        }
        (gx, gy)
    }

    pub fn mean(&self, channel: usize) -> f32 {
        let n = self.width() * self.height();
        if n == 0 || channel >= self.channels() {
            return 0.0;
        }
        let sum: f64 = self
            .as_slice()
            .iter()
            .skip(channel)
            .step_by(self.channels())
            .map(|v| v.to_f32() as f64)
            .sum();
        (sum / n as f64) as f32
    }

    /// Population variance of one channel
    pub fn variance(&self, channel: usize) -> f32 {
        let n = self.width() * self.height();
        if n == 0 || channel >= self.channels() {
            return 0.0;
        }
        let mean = self.mean(channel) as f64;
        let sum: f64 = self
            .as_slice()
            .iter()
            .skip(channel)
            .step_by(self.channels())
            .map(|v| {
                let d = v.to_f32() as f64 - mean;
                d * d
            })
            .sum();
        (sum / n as f64) as f32
    }

    pub fn multiply(&mut self, factor: f32) {
        self.as_mut_slice()
            .iter_mut()
            .for_each(|v| *v = T::from_f32(v.to_f32() * factor));
    }

    /// Bilinear sample, `None` when any of the four neighbours is outside
    pub fn bilinear(&self, x: f32, y: f32, channel: usize) -> Option<f32> {
        if x < 0.0 || y < 0.0 || channel >= self.channels() {
            return None;
        }
        let p = x as usize;
        let q = y as usize;
        if p + 1 >= self.width() || q + 1 >= self.height() {
            return None;
        }
        let u = x - p as f32;
        let v = y - q as f32;
        let a = self.at(p, q, channel).to_f32();
        let b = self.at(p + 1, q, channel).to_f32();
        let c = self.at(p, q + 1, channel).to_f32();
        let d = self.at(p + 1, q + 1, channel).to_f32();
        Some((1.0 - v) * ((1.0 - u) * a + u * b) + v * ((1.0 - u) * c + u * d))
    }
}

/// Prefix-sum passes. Use a sample type wide enough for the image total.
impl<T> PixelBuffer<T>
where
    T: Pixel + Add<Output = T> + Sub<Output = T>,
{
    /// Horizontal then vertical prefix sums, in place
    pub fn integral_image(&mut self) {
        let (width, height, channels) = (self.width(), self.height(), self.channels());
        for y in 0..height {
            for x in 1..width {
                for c in 0..channels {
                    let v = self.at(x, y, c) + self.at(x - 1, y, c);
                    self.set(x, y, c, v);
                }
            }
        }
        for y in 1..height {
            for x in 0..width {
                for c in 0..channels {
                    let v = self.at(x, y, c) + self.at(x, y - 1, c);
                    self.set(x, y, c, v);
                }
            }
        }
    }

    /// Exact inverse of [`integral_image`](Self::integral_image)
    pub fn derivative_image(&mut self) {
        let (width, height, channels) = (self.width(), self.height(), self.channels());
        for y in (1..height).rev() {
            for x in 0..width {
                for c in 0..channels {
                    let v = self.at(x, y, c) - self.at(x, y - 1, c);
                    self.set(x, y, c, v);
                }
            }
        }
        for y in 0..height {
            for x in (1..width).rev() {
                for c in 0..channels {
                    let v = self.at(x, y, c) - self.at(x - 1, y, c);
                    self.set(x, y, c, v);
                }
            }
        }
    }

    /// Sum over `(x1, x2] x (y1, y2]` read from an integral image
    pub fn box_sum(&self, x1: usize, y1: usize, x2: usize, y2: usize, channel: usize) -> T {
        self.at(x2, y2, channel) - self.at(x1, y2, channel) - self.at(x2, y1, channel)
            + self.at(x1, y1, channel)
    }
}

impl PixelBuffer<f32> {
    /// Per channel zero mean and unit variance
    pub fn normalize(&mut self) {
        let channels = self.channels();
        for c in 0..channels {
            let mean = self.mean(c);
            let std_dev = self.variance(c).sqrt();
            let scale = if std_dev > 0.0 { 1.0 / std_dev } else { 1.0 };
            self.as_mut_slice()
                .iter_mut()
                .skip(c)
                .step_by(channels)
                .for_each(|v| *v = (*v - mean) * scale);
        }
    }
}

/// Normalised Gaussian taps over `2 * round(2 sigma) + 1` samples
pub fn gaussian_kernel(sigma: f32) -> Vec<f32> {
    let support = 2 * (2.0 * sigma).round() as usize + 1;
    let center = ((support - 1) / 2) as f32;
    let mut kernel: Vec<f32> = (0..support)
        .map(|i| {
            let dx = (i as f32 - center) / sigma;
            (-dx * dx).exp()
        })
        .collect();
    let sum: f32 = kernel.iter().sum();
    kernel.iter_mut().for_each(|k| *k /= sum);
    kernel
}
