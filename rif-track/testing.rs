//! Synthetic scenes shared by the tracking and matching tests.

use rif_core::GrayImage;
use rif_match::AffineModel;

/// Blocky pseudo-random texture with plenty of FAST corners
pub fn create_textured_image(width: usize, height: usize, seed: u32) -> GrayImage {
    let mut img = GrayImage::new(width, height, 1);
    for y in 0..height {
        for x in 0..width {
            let (bx, by) = ((x / 6) as u32, (y / 6) as u32);
            let h = bx.wrapping_mul(73_856_093) ^ by.wrapping_mul(19_349_663) ^ seed.wrapping_mul(83_492_791);
            let h = h ^ (h >> 13);
            img.set(x, y, 0, (h % 200) as u8 + 28);
        }
    }
    img
}

/// Content moved by `(dx, dy)` pixels, uncovered border clamped
pub fn shift_image(image: &GrayImage, dx: isize, dy: isize) -> GrayImage {
    let (w, h) = image.dimensions();
    let mut out = GrayImage::new(w, h, 1);
    for y in 0..h {
        for x in 0..w {
            let sx = (x as isize - dx).clamp(0, w as isize - 1) as usize;
            let sy = (y as isize - dy).clamp(0, h as isize - 1) as usize;
            out.set(x, y, 0, image.at(sx, sy, 0));
        }
    }
    out
}

/// Resample `image` so that `model` maps its pixels onto the output
pub fn warp_image(image: &GrayImage, model: &AffineModel, width: usize, height: usize) -> GrayImage {
    let inverse = model.inverse().unwrap();
    let mut out = GrayImage::new(width, height, 1);
    for y in 0..height {
        for x in 0..width {
            let (sx, sy) = inverse.transform(x as f32, y as f32);
            let value = image.bilinear(sx, sy, 0).unwrap_or(128.0);
            out.set(x, y, 0, value.round().clamp(0.0, 255.0) as u8);
        }
    }
    out
}
