//! Rasterizer: draws turtle segments onto a fixed-size RGB canvas and saves it.
//!
//! Turtle coordinates are mapped to pixels through a [`CanvasTransform`].
//! Lines are drawn without anti-aliasing (Bresenham), each pixel stamped with
//! a square brush of the requested width. Anything outside the canvas is clipped.

use crate::error::{LsysError, Result};
use crate::turtle::Segment;
use glam::Vec2;
use image::{ImageBuffer, Rgb, RgbImage};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::debug;

/// Affine map from turtle space to pixel space:
/// `pixel = origin + (x, ±y) * scale`, with `y` negated when `flip_y` is set.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct CanvasTransform {
    /// Pixel position of the turtle-space origin.
    pub origin: Vec2,
    /// Pixels per turtle unit.
    pub scale: f32,
    /// Negate `y`, reconciling y-up turtle space with y-down rasters.
    pub flip_y: bool,
}

impl Default for CanvasTransform {
    fn default() -> Self {
        Self::identity()
    }
}

impl CanvasTransform {
    /// Turtle coordinates are pixel coordinates.
    pub fn identity() -> Self {
        Self {
            origin: Vec2::ZERO,
            scale: 1.0,
            flip_y: false,
        }
    }

    /// Turtle origin at the canvas center, y pointing up, one pixel per unit.
    pub fn centered(width: u32, height: u32) -> Self {
        Self {
            origin: Vec2::new(width as f32 / 2.0, height as f32 / 2.0),
            scale: 1.0,
            flip_y: true,
        }
    }

    /// Scales and centers the box `bounds` inside the canvas, leaving
    /// `margin` pixels on every side. Aspect ratio is preserved.
    ///
    /// With a zero margin the box spans pixel 0 to pixel `width - 1`.
    pub fn fit(bounds: (Vec2, Vec2), width: u32, height: u32, margin: f32) -> Self {
        let (min, max) = bounds;
        let span = max - min;
        let last = Vec2::new(width.max(1) as f32 - 1.0, height.max(1) as f32 - 1.0);
        let room = (last - 2.0 * margin).max(Vec2::ONE);

        let sx = if span.x > 0.0 { room.x / span.x } else { f32::INFINITY };
        let sy = if span.y > 0.0 { room.y / span.y } else { f32::INFINITY };
        let scale = match sx.min(sy) {
            s if s.is_finite() => s,
            _ => 1.0,
        };

        let center = (min + max) / 2.0;
        let canvas_center = last / 2.0;
        Self {
            origin: canvas_center - Vec2::new(center.x, -center.y) * scale,
            scale,
            flip_y: true,
        }
    }

    /// Maps a turtle-space point to canvas pixel coordinates.
    pub fn apply(&self, point: Vec2) -> Vec2 {
        let y = if self.flip_y { -point.y } else { point.y };
        self.origin + Vec2::new(point.x, y) * self.scale
    }
}

/// Owns the canvas for one render, from construction to [`persist`](Self::persist).
pub struct Rasterizer {
    canvas: RgbImage,
    transform: CanvasTransform,
}

impl Rasterizer {
    /// Creates a `width` × `height` canvas filled with `background`.
    ///
    /// The default transform is [`CanvasTransform::centered`].
    pub fn new(width: u32, height: u32, background: Rgb<u8>) -> Self {
        Self {
            canvas: ImageBuffer::from_pixel(width, height, background),
            transform: CanvasTransform::centered(width, height),
        }
    }

    /// Replaces the turtle-to-pixel mapping (builder pattern).
    pub fn with_transform(mut self, transform: CanvasTransform) -> Self {
        self.transform = transform;
        self
    }

    /// Current turtle-to-canvas mapping.
    pub fn transform(&self) -> &CanvasTransform {
        &self.transform
    }

    /// Canvas width in pixels.
    pub fn width(&self) -> u32 {
        self.canvas.width()
    }

    /// Canvas height in pixels.
    pub fn height(&self) -> u32 {
        self.canvas.height()
    }

    /// The canvas drawn so far.
    pub fn canvas(&self) -> &RgbImage {
        &self.canvas
    }

    /// Consumes the rasterizer, returning the canvas.
    pub fn into_image(self) -> RgbImage {
        self.canvas
    }

    /// Color at `(x, y)`, or `None` outside the canvas.
    pub fn pixel(&self, x: u32, y: u32) -> Option<Rgb<u8>> {
        self.canvas.get_pixel_checked(x, y).copied()
    }

    /// Draws `segment` if it is marked drawn; pen-up segments are skipped.
    pub fn draw_segment(&mut self, segment: &Segment, color: Rgb<u8>, line_width: u32) {
        if !segment.drawn {
            return;
        }
        let from = self.transform.apply(segment.from);
        let to = self.transform.apply(segment.to);
        self.draw_line(from, to, color, line_width);
    }

    /// Draws every segment in order; later segments overpaint earlier ones.
    pub fn draw_segments<'a>(
        &mut self,
        segments: impl IntoIterator<Item = &'a Segment>,
        color: Rgb<u8>,
        line_width: u32,
    ) -> usize {
        let mut drawn = 0;
        for segment in segments {
            if segment.drawn {
                self.draw_segment(segment, color, line_width);
                drawn += 1;
            }
        }
        drawn
    }

    /// Draws a line between two points already in pixel space.
    pub fn draw_line(&mut self, from: Vec2, to: Vec2, color: Rgb<u8>, line_width: u32) {
        let line_width = line_width.max(1);
        let pad = line_width as f32 / 2.0 + 1.0;
        let lo = Vec2::splat(-pad);
        let hi = Vec2::new(self.width() as f32 - 1.0, self.height() as f32 - 1.0) + pad;

        let Some((a, b)) = clip(from, to, lo, hi) else {
            return;
        };

        let (mut x0, mut y0) = (a.x.round() as i64, a.y.round() as i64);
        let (x1, y1) = (b.x.round() as i64, b.y.round() as i64);
        let dx = (x1 - x0).abs();
        let dy = -(y1 - y0).abs();
        let sx = if x0 < x1 { 1 } else { -1 };
        let sy = if y0 < y1 { 1 } else { -1 };
        let mut err = dx + dy;

        loop {
            self.stamp(x0, y0, color, line_width);
            if x0 == x1 && y0 == y1 {
                break;
            }
            let e2 = 2 * err;
            if e2 >= dy {
                err += dy;
                x0 += sx;
            }
            if e2 <= dx {
                err += dx;
                y0 += sy;
            }
        }
    }

    /// Paints a `size` × `size` square centered on `(x, y)`, skipping pixels off canvas.
    fn stamp(&mut self, x: i64, y: i64, color: Rgb<u8>, size: u32) {
        let start = -((size as i64 - 1) / 2);
        let (w, h) = (self.width() as i64, self.height() as i64);
        // Iterate only the part of the brush that lands on the canvas.
        let (x0, x1) = ((x + start).max(0), (x + start + size as i64).min(w));
        let (y0, y1) = ((y + start).max(0), (y + start + size as i64).min(h));
        for py in y0..y1 {
            for px in x0..x1 {
                self.canvas.put_pixel(px as u32, py as u32, color);
            }
        }
    }

    /// Writes the canvas to `path`, replacing any existing file.
    ///
    /// The format follows the file extension (`.png`, `.jpg`, `.bmp`, ...).
    pub fn persist(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        self.canvas.save(path).map_err(|source| LsysError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        debug!(path = %path.display(), "canvas written");
        Ok(())
    }
}

/// Liang–Barsky clip of `a → b` against the box `[lo, hi]`.
///
/// Endpoints already inside the box are returned bit-for-bit unchanged.
fn clip(a: Vec2, b: Vec2, lo: Vec2, hi: Vec2) -> Option<(Vec2, Vec2)> {
    if !(a.is_finite() && b.is_finite()) {
        return None;
    }
    let d = b - a;
    let mut t0 = 0.0f32;
    let mut t1 = 1.0f32;

    for (p, q) in [
        (-d.x, a.x - lo.x),
        (d.x, hi.x - a.x),
        (-d.y, a.y - lo.y),
        (d.y, hi.y - a.y),
    ] {
        if p == 0.0 {
            if q < 0.0 {
                return None;
            }
            continue;
        }
        let r = q / p;
        if p < 0.0 {
            if r > t1 {
                return None;
            }
            t0 = t0.max(r);
        } else {
            if r < t0 {
                return None;
            }
            t1 = t1.min(r);
        }
    }

    let start = if t0 > 0.0 { a + d * t0 } else { a };
    let end = if t1 < 1.0 { a + d * t1 } else { b };
    Some((start, end))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clip_keeps_inside_segment_exact() {
        let a = Vec2::new(1.5, 2.25);
        let b = Vec2::new(7.0, 3.0);
        let clipped = clip(a, b, Vec2::ZERO, Vec2::splat(10.0));
        assert_eq!(clipped, Some((a, b)));
    }

    #[test]
    fn clip_trims_to_box() {
        let (s, e) = clip(
            Vec2::new(-10.0, 5.0),
            Vec2::new(20.0, 5.0),
            Vec2::ZERO,
            Vec2::splat(10.0),
        )
        .unwrap();
        assert!(s.abs_diff_eq(Vec2::new(0.0, 5.0), 1e-4));
        assert!(e.abs_diff_eq(Vec2::new(10.0, 5.0), 1e-4));
    }

    #[test]
    fn clip_rejects_outside_segment() {
        assert!(clip(
            Vec2::new(-5.0, -5.0),
            Vec2::new(-1.0, -20.0),
            Vec2::ZERO,
            Vec2::splat(10.0)
        )
        .is_none());
    }
}
