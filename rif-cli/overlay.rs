//! Drawing of tracking results onto an RGB canvas.

use image::Rgb;
use imageproc::drawing::{draw_hollow_circle_mut, draw_line_segment_mut, Canvas};
use rif_track::TrackedPolygon;

pub const YELLOW: Rgb<u8> = Rgb([255, 255, 0]);
pub const BLACK: Rgb<u8> = Rgb([0, 0, 0]);
pub const BLUE: Rgb<u8> = Rgb([0, 0, 255]);
pub const GREEN: Rgb<u8> = Rgb([0, 255, 0]);
pub const RED: Rgb<u8> = Rgb([255, 0, 0]);

const CIRCLE_RADIUS: i32 = 5;
const SHADOW_OFFSET: f32 = 2.0;
/// Motion vectors are drawn this many times their length
const MOTION_EXPANSION: f32 = 2.0;

/// Circles at current positions with lines toward the previous ones, shadowed
/// in black. Points are `[prev_x, prev_y, curr_x, curr_y]` in tracker
/// coordinates; `scale` maps them onto the canvas.
pub fn draw_motion<C>(canvas: &mut C, matched_points: &[[f32; 4]], scale: f32)
where
    C: Canvas<Pixel = Rgb<u8>>,
{
    for point in matched_points {
        let prev = (point[0] * scale, point[1] * scale);
        let curr = (point[2] * scale, point[3] * scale);
        let delta = (
            MOTION_EXPANSION * (prev.0 - curr.0),
            MOTION_EXPANSION * (prev.1 - curr.1),
        );

        for (offset, color) in [(-SHADOW_OFFSET, BLACK), (SHADOW_OFFSET, BLACK), (0.0, YELLOW)] {
            let start = (curr.0 + offset, curr.1 + offset);
            draw_hollow_circle_mut(canvas, (start.0 as i32, start.1 as i32), CIRCLE_RADIUS, color);
            draw_line_segment_mut(canvas, start, (start.0 + delta.0, start.1 + delta.1), color);
        }
    }
}

pub fn draw_polygons<C>(canvas: &mut C, polygons: &[TrackedPolygon], scale: f32)
where
    C: Canvas<Pixel = Rgb<u8>>,
{
    for polygon in polygons {
        for (a, b) in polygon.edges() {
            draw_line_segment_mut(canvas, (a.0 * scale, a.1 * scale), (b.0 * scale, b.1 * scale), BLUE);
        }
    }
}

/// Green while tracking is valid, red otherwise
pub fn draw_triangle<C>(canvas: &mut C, corners: &[(f32, f32); 3], valid: bool, scale: f32)
where
    C: Canvas<Pixel = Rgb<u8>>,
{
    let color = if valid { GREEN } else { RED };
    for i in 0..3 {
        let a = corners[i];
        let b = corners[(i + 1) % 3];
        draw_line_segment_mut(canvas, (a.0 * scale, a.1 * scale), (b.0 * scale, b.1 * scale), color);
    }
}
