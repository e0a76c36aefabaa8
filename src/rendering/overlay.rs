//! Bounding-box overlay for checking `fit_bounding_box` results by eye.

use crate::core::coords::TileCoords;
use crate::core::geo::Point;
use image::{Rgba, RgbaImage};

#[derive(Debug, Clone)]
pub struct BoxOverlay {
    canvas: RgbaImage,
    last: Option<(Point, Point)>,
    color: Rgba<u8>,
    line_width: u32,
}

impl BoxOverlay {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            canvas: RgbaImage::new(width, height),
            last: None,
            color: Rgba([255, 0, 0, 255]),
            line_width: 5,
        }
    }

    pub fn with_style(mut self, color: Rgba<u8>, line_width: u32) -> Self {
        self.color = color;
        self.line_width = line_width.max(1);
        self
    }

    pub fn canvas(&self) -> &RgbaImage {
        &self.canvas
    }

    /// Stroke the box `p1`-`p2` (normalized space). Skipped when neither
    /// the box nor the map changed since the last call.
    pub fn draw(&mut self, coords: &TileCoords, p1: Point, p2: Point, map_changed: bool) -> bool {
        let box_changed = self.last != Some((p1, p2));
        if !box_changed && !map_changed {
            return false;
        }
        self.last = Some((p1, p2));
        self.reset();

        let a = coords.xy_to_map_pixels(p1);
        let b = coords.xy_to_map_pixels(p2);
        self.stroke_rect(a, b);
        true
    }

    pub fn reset(&mut self) {
        self.canvas.pixels_mut().for_each(|p| *p = Rgba([0, 0, 0, 0]));
    }

    fn stroke_rect(&mut self, a: Point, b: Point) {
        let (w, h) = (self.canvas.width() as i64, self.canvas.height() as i64);
        let x0 = a.x.min(b.x).round() as i64;
        let x1 = a.x.max(b.x).round() as i64;
        let y0 = a.y.min(b.y).round() as i64;
        let y1 = a.y.max(b.y).round() as i64;
        let half = i64::from(self.line_width / 2);

        let mut fill = |xa: i64, xb: i64, ya: i64, yb: i64| {
            for y in ya.max(0)..=yb.min(h - 1) {
                for x in xa.max(0)..=xb.min(w - 1) {
                    self.canvas.put_pixel(x as u32, y as u32, self.color);
                }
            }
        };
        let lw = i64::from(self.line_width) - 1;
        fill(x0 - half, x1 + half, y0 - half, y0 - half + lw);
        fill(x0 - half, x1 + half, y1 - half, y1 - half + lw);
        fill(x0 - half, x0 - half + lw, y0 - half, y1 + half);
        fill(x1 - half, x1 - half + lw, y0 - half, y1 + half);
    }
}
