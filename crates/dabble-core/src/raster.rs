//! CPU raster canvas.
//!
//! Pixels are straight-alpha RGBA8 in row-major order, the same layout as a
//! browser canvas' `getImageData`, so a buffer captured here can be shared
//! with browser peers unchanged.

use crate::brush::BrushColor;
use crate::event::DrawEvent;
use kurbo::{Point, Rect, Vec2};
use thiserror::Error;

/// Largest accepted width or height.
pub const MAX_DIMENSION: u32 = 16_384;

/// Raster errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RasterError {
    #[error("pixel buffer has {actual} bytes, expected {expected}")]
    SizeMismatch { expected: usize, actual: usize },
    #[error("canvas dimensions {width}x{height} exceed {MAX_DIMENSION}")]
    TooLarge { width: u32, height: u32 },
}

/// An RGBA8 pixel buffer with dab and segment primitives.
#[derive(Debug, Clone, PartialEq)]
pub struct PixelCanvas {
    width: u32,
    height: u32,
    data: Vec<u8>,
    generation: u64,
    /// Some pixel may be non-transparent.
    painted: bool,
}

impl PixelCanvas {
    /// Create a fully transparent canvas. Dimensions are clamped to
    /// [`MAX_DIMENSION`].
    pub fn new(width: u32, height: u32) -> Self {
        let width = width.min(MAX_DIMENSION);
        let height = height.min(MAX_DIMENSION);
        Self {
            width,
            height,
            data: vec![0; buffer_len(width, height)],
            generation: 0,
            painted: false,
        }
    }

    /// Wrap an existing RGBA buffer.
    pub fn from_rgba(width: u32, height: u32, data: Vec<u8>) -> Result<Self, RasterError> {
        if width > MAX_DIMENSION || height > MAX_DIMENSION {
            return Err(RasterError::TooLarge { width, height });
        }
        let expected = buffer_len(width, height);
        if data.len() != expected {
            return Err(RasterError::SizeMismatch {
                expected,
                actual: data.len(),
            });
        }
        let painted = data.chunks_exact(4).any(|px| px[3] != 0);
        Ok(Self {
            width,
            height,
            data,
            generation: 0,
            painted,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Raw RGBA bytes.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Counter bumped on every mutation.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Color of a single pixel, `None` outside the canvas.
    pub fn pixel(&self, x: u32, y: u32) -> Option<BrushColor> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let i = self.index(x, y);
        Some(BrushColor::new(
            self.data[i],
            self.data[i + 1],
            self.data[i + 2],
            self.data[i + 3],
        ))
    }

    /// Whether nothing has been painted since creation or the last
    /// [`clear`](Self::clear). Paint cropped away by a resize still counts.
    pub fn is_blank(&self) -> bool {
        !self.painted
    }

    pub fn clear(&mut self) {
        self.data.fill(0);
        self.painted = false;
        self.generation += 1;
    }

    /// Change the canvas size, keeping the overlapping top-left region.
    pub fn resize(&mut self, width: u32, height: u32) {
        let width = width.min(MAX_DIMENSION);
        let height = height.min(MAX_DIMENSION);
        if width == self.width && height == self.height {
            return;
        }

        let mut data = vec![0; buffer_len(width, height)];
        let copy_w = width.min(self.width) as usize * 4;
        for y in 0..height.min(self.height) as usize {
            let src = y * self.width as usize * 4;
            let dst = y * width as usize * 4;
            data[dst..dst + copy_w].copy_from_slice(&self.data[src..src + copy_w]);
        }

        self.width = width;
        self.height = height;
        self.data = data;
        self.generation += 1;
    }

    /// Copy `other` into this canvas at the origin, cropping whatever does
    /// not fit.
    pub fn blit(&mut self, other: &PixelCanvas) {
        let copy_w = self.width.min(other.width) as usize * 4;
        for y in 0..self.height.min(other.height) as usize {
            let src = y * other.width as usize * 4;
            let dst = y * self.width as usize * 4;
            self.data[dst..dst + copy_w].copy_from_slice(&other.data[src..src + copy_w]);
        }
        self.painted |= other.painted;
        self.generation += 1;
    }

    /// Paint an anti-aliased filled circle. Returns whether any pixel
    /// was touched.
    pub fn fill_dab(&mut self, center: Point, radius: f64, color: BrushColor) -> bool {
        if radius <= 0.0 {
            return false;
        }
        let area = Rect::from_center_size(center, (radius * 2.0, radius * 2.0)).inflate(1.0, 1.0);
        self.paint(area, color, |p| radius + 0.5 - p.distance(center))
    }

    /// Paint a line `2 * radius` wide from `from` to `to` with round ends.
    ///
    /// The whole capsule is rasterised in one pass so a translucent color
    /// is not blended twice where the line and its end dabs overlap.
    pub fn stroke_segment(&mut self, from: Point, to: Point, radius: f64, color: BrushColor) -> bool {
        if radius <= 0.0 {
            return false;
        }
        let area = Rect::from_points(from, to).inflate(radius + 1.0, radius + 1.0);
        self.paint(area, color, |p| radius + 0.5 - distance_to_segment(p, from, to))
    }

    /// Paint a draw event, limited to its [`DrawEvent::bounds`].
    pub fn apply(&mut self, event: &DrawEvent) -> bool {
        let radius = event.radius();
        if !event.is_finite() || radius <= 0.0 {
            return false;
        }
        let area = event.bounds().inflate(1.0, 1.0);
        let end = event.end();
        match event.start() {
            Some(start) => self.paint(area, event.color(), |p| {
                radius + 0.5 - distance_to_segment(p, start, end)
            }),
            None => self.paint(area, event.color(), |p| radius + 0.5 - p.distance(end)),
        }
    }

    fn index(&self, x: u32, y: u32) -> usize {
        (y as usize * self.width as usize + x as usize) * 4
    }

    /// Blend `color` into every pixel of `area` whose center has positive
    /// coverage.
    fn paint(&mut self, area: Rect, color: BrushColor, coverage: impl Fn(Point) -> f64) -> bool {
        if color.a == 0 || !area.is_finite() {
            return false;
        }

        // Float-to-int casts saturate, so off-canvas areas collapse to empty ranges.
        let x0 = area.x0.floor().max(0.0) as u32;
        let y0 = area.y0.floor().max(0.0) as u32;
        let x1 = (area.x1.ceil().min(self.width as f64)) as u32;
        let y1 = (area.y1.ceil().min(self.height as f64)) as u32;

        let mut touched = false;
        for y in y0..y1 {
            for x in x0..x1 {
                let c = coverage(Point::new(x as f64 + 0.5, y as f64 + 0.5));
                if c > 0.0 {
                    let i = self.index(x, y);
                    blend(&mut self.data[i..i + 4], color, c.min(1.0));
                    touched = true;
                }
            }
        }

        if touched {
            self.painted = true;
            self.generation += 1;
        }
        touched
    }
}

fn buffer_len(width: u32, height: u32) -> usize {
    width as usize * height as usize * 4
}

/// Source-over blend of `color` scaled by `coverage` into one straight-alpha pixel.
fn blend(dst: &mut [u8], color: BrushColor, coverage: f64) {
    let sa = color.a as f64 / 255.0 * coverage;
    if sa <= 0.0 {
        return;
    }
    let da = dst[3] as f64 / 255.0;
    let oa = sa + da * (1.0 - sa);

    let src = [color.r, color.g, color.b];
    for (channel, s) in dst.iter_mut().zip(src) {
        let value = (s as f64 * sa + *channel as f64 * da * (1.0 - sa)) / oa;
        *channel = value.round().clamp(0.0, 255.0) as u8;
    }
    dst[3] = (oa * 255.0).round().clamp(0.0, 255.0) as u8;
}

/// Distance from `p` to the segment `a`-`b`.
fn distance_to_segment(p: Point, a: Point, b: Point) -> f64 {
    let line: Vec2 = b - a;
    let len_sq = line.hypot2();
    if len_sq < f64::EPSILON {
        return p.distance(a);
    }
    let t = ((p - a).dot(line) / len_sq).clamp(0.0, 1.0);
    p.distance(a + line * t)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::brush::{Brush, PALETTE};

    const RED: BrushColor = BrushColor::rgb(255, 0, 0);

    #[test]
    fn test_new_canvas_is_blank() {
        let canvas = PixelCanvas::new(4, 3);
        assert_eq!(canvas.data().len(), 4 * 3 * 4);
        assert!(canvas.is_blank());
        assert_eq!(canvas.pixel(3, 2), Some(BrushColor::transparent()));
        assert_eq!(canvas.pixel(4, 0), None);
    }

    #[test]
    fn test_from_rgba_checks_length() {
        assert!(PixelCanvas::from_rgba(2, 2, vec![0; 16]).is_ok());
        assert_eq!(
            PixelCanvas::from_rgba(2, 2, vec![0; 15]),
            Err(RasterError::SizeMismatch {
                expected: 16,
                actual: 15
            })
        );
        assert!(matches!(
            PixelCanvas::from_rgba(MAX_DIMENSION + 1, 1, Vec::new()),
            Err(RasterError::TooLarge { .. })
        ));
    }

    #[test]
    fn test_dab_fills_center_and_not_outside() {
        let mut canvas = PixelCanvas::new(40, 40);
        assert!(canvas.fill_dab(Point::new(20.0, 20.0), 5.0, RED));

        assert_eq!(canvas.pixel(20, 20), Some(RED));
        assert_eq!(canvas.pixel(2, 2), Some(BrushColor::transparent()));
        // Just beyond the radius plus the anti-aliasing ramp.
        assert_eq!(canvas.pixel(27, 20).map(|c| c.a), Some(0));
    }

    #[test]
    fn test_dab_edge_is_antialiased() {
        let mut canvas = PixelCanvas::new(40, 40);
        canvas.fill_dab(Point::new(20.5, 20.5), 5.0, RED);

        // Pixel center at x = 25.5 sits exactly on the circle.
        let edge = canvas.pixel(25, 20).unwrap();
        assert_eq!(edge.a, 128);
        assert_eq!((edge.r, edge.g, edge.b), (255, 0, 0));
    }

    #[test]
    fn test_segment_covers_path_between_endpoints() {
        let mut canvas = PixelCanvas::new(100, 20);
        canvas.stroke_segment(Point::new(10.0, 10.0), Point::new(90.0, 10.0), 3.0, RED);

        for x in [10, 30, 50, 70, 89] {
            assert_eq!(canvas.pixel(x, 10), Some(RED), "x = {x}");
        }
        assert_eq!(canvas.pixel(50, 0).map(|c| c.a), Some(0));
    }

    #[test]
    fn test_translucent_segment_is_blended_once() {
        let mut canvas = PixelCanvas::new(30, 30);
        let half = BrushColor::new(0, 0, 255, 128);
        canvas.stroke_segment(Point::new(10.0, 15.0), Point::new(20.0, 15.0), 4.0, half);

        // The endpoint lies under both the line and the end dab.
        assert_eq!(canvas.pixel(20, 15).map(|c| c.a), Some(128));
    }

    #[test]
    fn test_blend_over_existing_paint() {
        let mut canvas = PixelCanvas::new(10, 10);
        canvas.fill_dab(Point::new(5.0, 5.0), 4.0, RED);
        canvas.fill_dab(Point::new(5.0, 5.0), 4.0, BrushColor::new(0, 0, 255, 128));

        let px = canvas.pixel(5, 5).unwrap();
        assert_eq!(px.a, 255);
        assert!(px.r > 100 && px.r < 150);
        assert!(px.b > 100 && px.b < 150);
    }

    #[test]
    fn test_off_canvas_paint_is_clipped() {
        let mut canvas = PixelCanvas::new(10, 10);
        assert!(!canvas.fill_dab(Point::new(-50.0, -50.0), 5.0, RED));
        assert!(!canvas.fill_dab(Point::new(500.0, 5.0), 5.0, RED));
        assert!(canvas.fill_dab(Point::new(-2.0, 5.0), 5.0, RED));
        assert_eq!(canvas.pixel(0, 5), Some(RED));
    }

    #[test]
    fn test_non_finite_event_is_ignored() {
        let mut canvas = PixelCanvas::new(10, 10);
        let event = DrawEvent::dot(&Brush::default(), Point::new(f64::NAN, 3.0));
        assert!(!canvas.apply(&event));
        assert_eq!(canvas.generation(), 0);
    }

    #[test]
    fn test_apply_dispatches_by_event_kind() {
        let brush = Brush::new(5.0, PALETTE[3]);
        let mut canvas = PixelCanvas::new(64, 64);

        canvas.apply(&DrawEvent::dot(&brush, Point::new(10.0, 10.0)));
        canvas.apply(&DrawEvent::segment(&brush, Point::new(10.0, 10.0), Point::new(50.0, 50.0)));

        assert_eq!(canvas.pixel(10, 10), Some(PALETTE[3]));
        assert_eq!(canvas.pixel(30, 30), Some(PALETTE[3]));
        assert_eq!(canvas.pixel(50, 10).map(|c| c.a), Some(0));
    }

    #[test]
    fn test_resize_keeps_top_left() {
        let mut canvas = PixelCanvas::new(20, 20);
        canvas.fill_dab(Point::new(5.0, 5.0), 3.0, RED);
        canvas.fill_dab(Point::new(15.0, 15.0), 3.0, RED);
        let generation = canvas.generation();

        canvas.resize(10, 30);
        assert_eq!((canvas.width(), canvas.height()), (10, 30));
        assert_eq!(canvas.pixel(5, 5), Some(RED));
        assert_eq!(canvas.pixel(5, 25).map(|c| c.a), Some(0));
        assert!(canvas.generation() > generation);
    }

    #[test]
    fn test_blit_crops() {
        let mut small = PixelCanvas::new(4, 4);
        small.fill_dab(Point::new(2.0, 2.0), 2.0, RED);

        let mut big = PixelCanvas::new(8, 2);
        big.blit(&small);
        assert_eq!(big.pixel(2, 1), small.pixel(2, 1));
        assert_eq!(big.pixel(6, 1).map(|c| c.a), Some(0));
    }

    #[test]
    fn test_clear() {
        let mut canvas = PixelCanvas::new(10, 10);
        canvas.fill_dab(Point::new(5.0, 5.0), 3.0, RED);
        assert!(!canvas.is_blank());
        canvas.clear();
        assert!(canvas.is_blank());
    }

    #[test]
    fn test_blank_tracking() {
        let mut canvas = PixelCanvas::new(10, 10);
        // Entirely off canvas: nothing touched.
        assert!(!canvas.fill_dab(Point::new(-50.0, -50.0), 3.0, RED));
        assert!(canvas.is_blank());

        let mut painted = PixelCanvas::new(4, 4);
        painted.fill_dab(Point::new(2.0, 2.0), 2.0, RED);
        canvas.blit(&PixelCanvas::new(4, 4));
        assert!(canvas.is_blank());
        canvas.blit(&painted);
        assert!(!canvas.is_blank());

        let restored = PixelCanvas::from_rgba(2, 1, vec![0, 0, 0, 0, 1, 2, 3, 4]).unwrap();
        assert!(!restored.is_blank());
        let empty = PixelCanvas::from_rgba(2, 1, vec![0; 8]).unwrap();
        assert!(empty.is_blank());
    }

    #[test]
    fn test_apply_stays_within_event_bounds() {
        let mut canvas = PixelCanvas::new(60, 60);
        let event = DrawEvent::segment(&Brush::new(5.0, RED), Point::new(20.0, 30.0), Point::new(40.0, 30.0));
        assert!(canvas.apply(&event));

        let bounds = event.bounds().inflate(1.0, 1.0);
        for y in 0..60 {
            for x in 0..60 {
                let inside = bounds.contains(Point::new(x as f64 + 0.5, y as f64 + 0.5));
                if !inside {
                    assert_eq!(canvas.pixel(x, y).map(|c| c.a), Some(0), "pixel {x},{y}");
                }
            }
        }
        assert_eq!(canvas.pixel(30, 30), Some(RED));
    }

    #[test]
    fn test_distance_to_segment() {
        let a = Point::new(0.0, 0.0);
        let b = Point::new(10.0, 0.0);
        assert!((distance_to_segment(Point::new(5.0, 3.0), a, b) - 3.0).abs() < 1e-9);
        assert!((distance_to_segment(Point::new(-4.0, 3.0), a, b) - 5.0).abs() < 1e-9);
        assert!((distance_to_segment(Point::new(1.0, 1.0), a, a) - 2f64.sqrt()).abs() < 1e-9);
    }
}
