use crate::error::{CoreError, CoreResult};

/// Sample type storable in a [`PixelBuffer`]
pub trait Pixel: Copy + Default + PartialOrd + Send + Sync + std::fmt::Debug + 'static {
    /// Upper end of the value range used by [`PixelBuffer::convert`]
    const RANGE_MAX: f32;

    fn to_f32(self) -> f32;

    /// Rounds and saturates for integer sample types
    fn from_f32(value: f32) -> Self;
}

macro_rules! impl_integer_pixel {
    ($($t:ty),*) => {
        $(
            impl Pixel for $t {
                const RANGE_MAX: f32 = <$t>::MAX as f32;

                #[inline(always)]
                fn to_f32(self) -> f32 {
                    self as f32
                }

                #[inline(always)]
                fn from_f32(value: f32) -> Self {
                    value.round().clamp(<$t>::MIN as f32, <$t>::MAX as f32) as $t
                }
            }
        )*
    };
}

impl_integer_pixel!(u8, u16, i32);

impl Pixel for f32 {
    const RANGE_MAX: f32 = 1.0;

    #[inline(always)]
    fn to_f32(self) -> f32 {
        self
    }

    #[inline(always)]
    fn from_f32(value: f32) -> Self {
        value
    }
}

/// Interleaved multi-channel 2D array, row-major
#[derive(Debug, Clone, PartialEq)]
pub struct PixelBuffer<T> {
    width: usize,
    height: usize,
    channels: usize,
    data: Vec<T>,
}

impl<T: Pixel> Default for PixelBuffer<T> {
    fn default() -> Self {
        Self::new(0, 0, 1)
    }
}

impl<T: Pixel> PixelBuffer<T> {
    /// Zero-filled buffer
    pub fn new(width: usize, height: usize, channels: usize) -> Self {
        Self {
            width,
            height,
            channels,
            data: vec![T::default(); width * height * channels],
        }
    }

    /// Wraps existing interleaved samples
    pub fn from_vec(width: usize, height: usize, channels: usize, data: Vec<T>) -> CoreResult<Self> {
        if channels == 0 {
            return Err(CoreError::InvalidDimensions { width, height, channels });
        }
        let expected_len = width * height * channels;
        if data.len() != expected_len {
            return Err(CoreError::InvalidBufferLength {
                expected_len,
                actual_len: data.len(),
            });
        }
        Ok(Self { width, height, channels, data })
    }

    /// Copies a single-channel image whose rows are `stride` samples apart
    pub fn from_strided(width: usize, height: usize, stride: usize, data: &[T]) -> CoreResult<Self> {
        if stride < width {
            return Err(CoreError::InvalidStride { stride, width });
        }
        let expected_len = if height == 0 { 0 } else { (height - 1) * stride + width };
        if data.len() < expected_len {
            return Err(CoreError::InvalidBufferLength {
                expected_len,
                actual_len: data.len(),
            });
        }
        let mut out = Vec::with_capacity(width * height);
        for row in 0..height {
            out.extend_from_slice(&data[row * stride..row * stride + width]);
        }
        Ok(Self {
            width,
            height,
            channels: 1,
            data: out,
        })
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn channels(&self) -> usize {
        self.channels
    }

    pub fn dimensions(&self) -> (usize, usize) {
        (self.width, self.height)
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn as_slice(&self) -> &[T] {
        &self.data
    }

    pub fn as_mut_slice(&mut self) -> &mut [T] {
        &mut self.data
    }

    pub fn into_vec(self) -> Vec<T> {
        self.data
    }

    #[inline(always)]
    fn offset(&self, x: usize, y: usize, channel: usize) -> usize {
        (y * self.width + x) * self.channels + channel
    }

    /// Unchecked-coordinate read; panics past the end of the storage
    #[inline(always)]
    pub fn at(&self, x: usize, y: usize, channel: usize) -> T {
        self.data[self.offset(x, y, channel)]
    }

    #[inline(always)]
    pub fn set(&mut self, x: usize, y: usize, channel: usize, value: T) {
        let idx = self.offset(x, y, channel);
        self.data[idx] = value;
    }

    pub fn contains(&self, x: isize, y: isize) -> bool {
        x >= 0 && y >= 0 && (x as usize) < self.width && (y as usize) < self.height
    }

    /// Bounds-checked read, `None` outside the buffer
    pub fn get(&self, x: isize, y: isize, channel: usize) -> Option<T> {
        if !self.contains(x, y) || channel >= self.channels {
            return None;
        }
        Some(self.at(x as usize, y as usize, channel))
    }

    /// Bounds-checked read reporting the failing coordinate
    pub fn try_get(&self, x: isize, y: isize, channel: usize) -> CoreResult<T> {
        self.get(x, y, channel).ok_or(CoreError::OutOfBounds {
            x,
            y,
            channel,
            width: self.width,
            height: self.height,
            channels: self.channels,
        })
    }

    /// All channels of one pixel
    pub fn pixel(&self, x: usize, y: usize) -> &[T] {
        let start = self.offset(x, y, 0);
        &self.data[start..start + self.channels]
    }

    pub fn row(&self, y: usize) -> &[T] {
        let stride = self.width * self.channels;
        &self.data[y * stride..(y + 1) * stride]
    }

    pub fn row_mut(&mut self, y: usize) -> &mut [T] {
        let stride = self.width * self.channels;
        &mut self.data[y * stride..(y + 1) * stride]
    }

    /// Reallocates (zeroed) only when the shape changes
    pub fn reshape(&mut self, width: usize, height: usize, channels: usize) {
        if self.width == width && self.height == height && self.channels == channels {
            return;
        }
        self.width = width;
        self.height = height;
        self.channels = channels;
        self.data.clear();
        self.data.resize(width * height * channels, T::default());
    }

    pub fn fill(&mut self, value: T) {
        self.data.iter_mut().for_each(|v| *v = value);
    }

    pub fn copy_from(&mut self, other: &PixelBuffer<T>) {
        self.reshape(other.width, other.height, other.channels);
        self.data.copy_from_slice(&other.data);
    }

    /// Smallest and largest sample over every channel
    pub fn min_max(&self) -> Option<(T, T)> {
        let mut iter = self.data.iter().copied();
        let first = iter.next()?;
        Some(iter.fold((first, first), |(lo, hi), v| {
            (if v < lo { v } else { lo }, if v > hi { v } else { hi })
        }))
    }

    /// Copies the half-open region `[x0, x1) x [y0, y1)`
    pub fn extract_region(&self, x0: usize, x1: usize, y0: usize, y1: usize) -> CoreResult<Self> {
        if x0 > x1 || y0 > y1 || x1 > self.width || y1 > self.height {
            return Err(CoreError::InvalidRegion {
                x0,
                x1,
                y0,
                y1,
                width: self.width,
                height: self.height,
            });
        }
        let width = x1 - x0;
        let mut data = Vec::with_capacity(width * (y1 - y0) * self.channels);
        for y in y0..y1 {
            let start = self.offset(x0, y, 0);
            data.extend_from_slice(&self.data[start..start + width * self.channels]);
        }
        Ok(Self {
            width,
            height: y1 - y0,
            channels: self.channels,
            data,
        })
    }

    /// In-place variant of [`extract_region`](Self::extract_region)
    pub fn crop(&mut self, x0: usize, x1: usize, y0: usize, y1: usize) -> CoreResult<()> {
        *self = self.extract_region(x0, x1, y0, y1)?;
        Ok(())
    }

    pub fn map<U: Pixel>(&self, f: impl Fn(T) -> U) -> PixelBuffer<U> {
        PixelBuffer {
            width: self.width,
            height: self.height,
            channels: self.channels,
            data: self.data.iter().map(|&v| f(v)).collect(),
        }
    }

    /// Value-preserving cast (saturating for narrower integer types)
    pub fn cast<U: Pixel>(&self) -> PixelBuffer<U> {
        self.map(|v| U::from_f32(v.to_f32()))
    }

    /// Extracts one channel into a single-channel buffer
    pub fn channel(&self, channel: usize) -> CoreResult<Self> {
        if channel >= self.channels {
            return Err(CoreError::ChannelMismatch {
                expected: channel + 1,
                actual: self.channels,
            });
        }
        Ok(Self {
            width: self.width,
            height: self.height,
            channels: 1,
            data: self.data.iter().skip(channel).step_by(self.channels).copied().collect(),
        })
    }
}
