use std::ops::Mul;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// 2D affine transform as a row-major 3x3 matrix with last row `0 0 1`
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct AffineModel {
    matrix: [f64; 9],
}

impl Default for AffineModel {
    fn default() -> Self {
        Self::identity()
    }
}

impl AffineModel {
    pub fn identity() -> Self {
        Self {
            matrix: [1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0],
        }
    }

    /// `x' = a x + b y + c`, `y' = d x + e y + f`
    pub fn from_rows(row_x: [f64; 3], row_y: [f64; 3]) -> Self {
        Self {
            matrix: [
                row_x[0], row_x[1], row_x[2], row_y[0], row_y[1], row_y[2], 0.0, 0.0, 1.0,
            ],
        }
    }

    pub fn from_translation(tx: f64, ty: f64) -> Self {
        Self::from_rows([1.0, 0.0, tx], [0.0, 1.0, ty])
    }

    /// Counter-clockwise rotation by `angle` radians about the origin, then a
    /// translation
    pub fn from_rotation(angle: f64, tx: f64, ty: f64) -> Self {
        let (sin, cos) = angle.sin_cos();
        Self::from_rows([cos, -sin, tx], [sin, cos, ty])
    }

    /// `[a, b, c, d, e, f]`
    pub fn params(&self) -> [f64; 6] {
        let m = &self.matrix;
        [m[0], m[1], m[2], m[3], m[4], m[5]]
    }

    pub fn matrix(&self) -> &[f64; 9] {
        &self.matrix
    }

    pub fn transform(&self, x: f32, y: f32) -> (f32, f32) {
        let (x, y) = self.transform_f64(x as f64, y as f64);
        (x as f32, y as f32)
    }

    pub fn transform_f64(&self, x: f64, y: f64) -> (f64, f64) {
        let m = &self.matrix;
        (m[0] * x + m[1] * y + m[2], m[3] * x + m[4] * y + m[5])
    }

    /// `self * other`: applies `other` first
    pub fn compose(&self, other: &AffineModel) -> AffineModel {
        let a = &self.matrix;
        let b = &other.matrix;
        let mut matrix = [0.0; 9];
        for row in 0..3 {
            for col in 0..3 {
                matrix[row * 3 + col] = (0..3).map(|k| a[row * 3 + k] * b[k * 3 + col]).sum();
            }
        }
        AffineModel { matrix }
    }

    /// `None` when the linear part is singular
    pub fn inverse(&self) -> Option<AffineModel> {
        let [a, b, c, d, e, f] = self.params();
        let det = a * e - b * d;
        if det == 0.0 || !det.is_finite() {
            return None;
        }
        let (ia, ib, id, ie) = (e / det, -b / det, -d / det, a / det);
        Some(AffineModel::from_rows(
            [ia, ib, -(ia * c + ib * f)],
            [id, ie, -(id * c + ie * f)],
        ))
    }

    /// Largest absolute parameter difference
    pub fn max_difference(&self, other: &AffineModel) -> f64 {
        self.params()
            .iter()
            .zip(other.params())
            .map(|(a, b)| (a - b).abs())
            .fold(0.0, f64::max)
    }
}

impl Mul for AffineModel {
    type Output = AffineModel;

    fn mul(self, rhs: AffineModel) -> AffineModel {
        self.compose(&rhs)
    }
}

/// Weighted least-squares affine fit over accumulated correspondences
#[derive(Debug, Clone, Default)]
pub struct AffineSolver {
    w: f64,
    sx: f64,
    sy: f64,
    dx: f64,
    dy: f64,
    sxsx: f64,
    sysy: f64,
    sxsy: f64,
    sxdx: f64,
    sxdy: f64,
    sydx: f64,
    sydy: f64,
}

impl AffineSolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Number of correspondences added so far, by total weight
    pub fn weight(&self) -> f64 {
        self.w
    }

    pub fn add_match(&mut self, src: (f32, f32), dst: (f32, f32)) {
        self.add_weighted_match(src, dst, 1.0);
    }

    pub fn add_weighted_match(&mut self, src: (f32, f32), dst: (f32, f32), weight: f64) {
        let (sx, sy) = (src.0 as f64, src.1 as f64);
        let (dx, dy) = (dst.0 as f64, dst.1 as f64);
        self.w += weight;
        self.sx += weight * sx;
        self.sy += weight * sy;
        self.dx += weight * dx;
        self.dy += weight * dy;
        self.sxsx += weight * sx * sx;
        self.sysy += weight * sy * sy;
        self.sxsy += weight * sx * sy;
        self.sxdx += weight * sx * dx;
        self.sxdy += weight * sx * dy;
        self.sydx += weight * sy * dx;
        self.sydy += weight * sy * dy;
    }

    /// Solve the normal equations by cofactor expansion; `None` when the
    /// sources are degenerate (fewer than three non-collinear points)
    pub fn compute_transform(&self) -> Option<AffineModel> {
        let m11 = self.w * self.sysy - self.sy * self.sy;
        let m12 = self.sy * self.sx - self.w * self.sxsy;
        let m13 = self.sxsy * self.sy - self.sx * self.sysy;
        let m22 = self.w * self.sxsx - self.sx * self.sx;
        let m23 = self.sxsy * self.sx - self.sy * self.sxsx;
        let m33 = self.sxsx * self.sysy - self.sxsy * self.sxsy;

        let t1 = self.sxsx * m11;
        let t2 = self.sxsy * m12;
        let t3 = self.sx * m13;
        let det = t1 + t2 + t3;
        let magnitude = t1.abs() + t2.abs() + t3.abs();
        if det == 0.0 || det.abs() <= magnitude * 1e-9 {
            return None;
        }

        let solve = |sxd: f64, syd: f64, d: f64| {
            [
                (m11 * sxd + m12 * syd + m13 * d) / det,
                (m12 * sxd + m22 * syd + m23 * d) / det,
                (m13 * sxd + m23 * syd + m33 * d) / det,
            ]
        };

        Some(AffineModel::from_rows(
            solve(self.sxdx, self.sydx, self.dx),
            solve(self.sxdy, self.sydy, self.dy),
        ))
    }
}
