//! Descriptor distances with an early-exit bound.
//!
//! Every metric stops accumulating once the running sum reaches `bound` and
//! returns the partial sum, which is then guaranteed to be `>= bound`. Pass
//! `f32::INFINITY` for the exact distance.

/// Distance between two equally long descriptors
pub trait Distance<T>: Send + Sync {
    fn distance(&self, a: &[T], b: &[T], bound: f32) -> f32;
}

/// Sum of absolute differences
#[derive(Debug, Clone, Copy, Default)]
pub struct L1;

macro_rules! impl_l1_integer {
    ($($t:ty),*) => {
        $(
            impl Distance<$t> for L1 {
                #[inline]
                fn distance(&self, a: &[$t], b: &[$t], bound: f32) -> f32 {
                    let mut dist = 0.0f32;
                    for (&x, &y) in a.iter().zip(b) {
                        dist += (x as i64 - y as i64).unsigned_abs() as f32;
                        if dist >= bound {
                            break;
                        }
                    }
                    dist
                }
            }
        )*
    };
}

impl_l1_integer!(u8, i32);

impl Distance<f32> for L1 {
    #[inline]
    fn distance(&self, a: &[f32], b: &[f32], bound: f32) -> f32 {
        let mut dist = 0.0f32;
        for (&x, &y) in a.iter().zip(b) {
            dist += (x - y).abs();
            if dist >= bound {
                break;
            }
        }
        dist
    }
}

/// Symmetric Kullback-Leibler divergence, `sum (a - b) * log2(a / b)`.
///
/// Inputs are strictly positive histograms; pairs with a non-positive entry
/// contribute nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct FastKl;

impl Distance<f32> for FastKl {
    #[inline]
    fn distance(&self, a: &[f32], b: &[f32], bound: f32) -> f32 {
        let mut dist = 0.0f32;
        for (&x, &y) in a.iter().zip(b) {
            if x <= 0.0 || y <= 0.0 {
                continue;
            }
            dist += (x - y) * fast_log2(x / y);
            if dist >= bound {
                break;
            }
        }
        dist
    }
}

/// Base-2 logarithm from the float exponent plus a quadratic fit of the
/// mantissa; absolute error is about 0.01 for positive normal inputs.
#[inline]
pub fn fast_log2(x: f32) -> f32 {
    let bits = x.to_bits() as i32;
    let exponent = ((bits >> 23) & 0xff) - 128;
    let mantissa = f32::from_bits(((bits & !(0xff << 23)) + (127 << 23)) as u32);
    (-1.0 / 3.0 * mantissa + 2.0) * mantissa - 2.0 / 3.0 + exponent as f32
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use proptest::prelude::*;

    #[test]
    fn test_l1_exact() {
        let a = [1u8, 10, 200];
        let b = [4u8, 10, 100];
        assert_eq!(L1.distance(&a, &b, f32::INFINITY), 103.0);

        let a = [-5i32, 7];
        let b = [5i32, -7];
        assert_eq!(L1.distance(&a, &b, f32::INFINITY), 24.0);

        let a = [0.5f32, -0.25];
        let b = [0.0f32, 0.25];
        assert_abs_diff_eq!(L1.distance(&a, &b, f32::INFINITY), 1.0);
    }

    #[test]
    fn test_l1_early_exit() {
        let a = [10u8; 8];
        let b = [0u8; 8];
        let partial = L1.distance(&a, &b, 25.0);
        assert_eq!(partial, 30.0);
        assert!(partial >= 25.0);
    }

    #[test]
    fn test_fast_log2_powers_of_two() {
        for e in -10..10 {
            let x = 2f32.powi(e);
            assert_abs_diff_eq!(fast_log2(x), e as f32, epsilon = 1e-5);
        }
    }

    #[test]
    fn test_kl_identical_is_zero() {
        let a = [0.1f32, 0.2, 0.7];
        assert_abs_diff_eq!(FastKl.distance(&a, &a, f32::INFINITY), 0.0);
    }

    #[test]
    fn test_kl_symmetric_and_positive() {
        let a = [0.1f32, 0.2, 0.7];
        let b = [0.3f32, 0.3, 0.4];
        let ab = FastKl.distance(&a, &b, f32::INFINITY);
        let ba = FastKl.distance(&b, &a, f32::INFINITY);
        assert!(ab > 0.0);
        assert_abs_diff_eq!(ab, ba, epsilon = 0.02);
    }

    proptest! {
        #[test]
        fn prop_fast_log2_close(x in 1e-6f32..1e6) {
            prop_assert!((fast_log2(x) - x.log2()).abs() < 0.011);
        }

        #[test]
        fn prop_bound_never_underestimates(
            a in prop::collection::vec(any::<u8>(), 16),
            b in prop::collection::vec(any::<u8>(), 16),
            bound in 0.0f32..2000.0,
        ) {
            let exact = L1.distance(&a, &b, f32::INFINITY);
            let bounded = L1.distance(&a, &b, bound);
            if exact < bound {
                prop_assert_eq!(bounded, exact);
            } else {
                prop_assert!(bounded >= bound);
            }
        }
    }
}
