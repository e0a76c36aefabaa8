//! Tile coordinate transform
//!
//! [`TileCoords`] owns the integer view state (zoom and the indices of the
//! top-left tile) for an `nx` by `ny` grid, and converts between normalized
//! Web Mercator space, grid-local space and canvas pixels. The x axis wraps
//! across the antimeridian; the y axis is clamped at the poles.

use crate::core::config::GridParams;
use crate::core::geo::{round_half_up, wrap, wrap_unit, Point, TileCoord};
use serde::{Deserialize, Serialize};

/// Integer pan/zoom state of the grid
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewState {
    pub zoom: u8,
    pub x_tile0: u32,
    pub y_tile0: u32,
}

/// Axis selector for [`TileCoords::scale`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    X,
    Y,
}

#[derive(Debug, Clone)]
pub struct TileCoords {
    nx: u32,
    ny: u32,
    tile_size: u32,
    min_zoom: u8,
    max_zoom: u8,

    zoom: u8,
    x_tile0: i64,
    y_tile0: i64,

    // Derived by update_transform
    n_tiles: i64,
    origin: Point,
    scale: Point,
}

impl TileCoords {
    /// Start at the minimum zoom with the top-left tile at (0, 0)
    pub fn new(params: &GridParams) -> Self {
        let mut coords = Self {
            nx: params.nx,
            ny: params.ny,
            tile_size: params.tile_size,
            min_zoom: params.min_zoom,
            max_zoom: params.max_zoom,
            zoom: params.min_zoom,
            x_tile0: 0,
            y_tile0: 0,
            n_tiles: 1,
            origin: Point::default(),
            scale: Point::default(),
        };
        coords.update_transform();
        coords
    }

    fn update_transform(&mut self) {
        self.n_tiles = 1i64 << self.zoom;
        let n = self.n_tiles as f64;
        self.origin = Point::new(self.x_tile0 as f64 / n, self.y_tile0 as f64 / n);
        self.scale = Point::new(n / f64::from(self.nx), n / f64::from(self.ny));
    }

    fn clamp_y(&self, y: i64, n_tiles: i64) -> i64 {
        y.clamp(0, (n_tiles - i64::from(self.ny)).max(0))
    }

    /// Replace the state, returning whether anything changed
    fn apply(&mut self, zoom: u8, x_tile0: i64, y_tile0: i64) -> bool {
        let changed = zoom != self.zoom || x_tile0 != self.x_tile0 || y_tile0 != self.y_tile0;
        self.zoom = zoom;
        self.x_tile0 = x_tile0;
        self.y_tile0 = y_tile0;
        self.update_transform();
        changed
    }

    pub fn view(&self) -> ViewState {
        ViewState {
            zoom: self.zoom,
            x_tile0: self.x_tile0 as u32,
            y_tile0: self.y_tile0 as u32,
        }
    }

    pub fn zoom(&self) -> u8 {
        self.zoom
    }

    pub fn min_zoom(&self) -> u8 {
        self.min_zoom
    }

    pub fn max_zoom(&self) -> u8 {
        self.max_zoom
    }

    pub fn grid_size(&self) -> (u32, u32) {
        (self.nx, self.ny)
    }

    pub fn tile_size(&self) -> u32 {
        self.tile_size
    }

    /// Normalized position of the grid's top-left corner
    pub fn origin(&self) -> Point {
        self.origin
    }

    /// Grid-local units per normalized unit along `axis`
    pub fn scale(&self, axis: Axis) -> f64 {
        match axis {
            Axis::X => self.scale.x,
            Axis::Y => self.scale.y,
        }
    }

    /// Map a normalized global point into grid-local space, where the grid
    /// spans `[0, 1]` on both axes.
    ///
    /// The x offset from the origin is always wrapped into `[0, 1)` before
    /// scaling, so a point just west of the origin lands near the right edge
    /// of local space rather than at a small negative value.
    pub fn to_local(&self, global: Point) -> Point {
        let local = global.subtract(&self.origin);
        Point::new(wrap_unit(local.x), local.y).scale(self.scale.x, self.scale.y)
    }

    /// Map a normalized global point to canvas pixels
    pub fn xy_to_map_pixels(&self, global: Point) -> Point {
        let size = f64::from(self.tile_size);
        self.to_local(global)
            .scale(f64::from(self.nx) * size, f64::from(self.ny) * size)
    }

    /// The tile shown in grid cell `(ix, iy)`
    pub fn get_zxy(&self, ix: u32, iy: u32) -> TileCoord {
        let x = wrap(self.x_tile0 + i64::from(ix), self.n_tiles);
        let y = wrap(self.y_tile0 + i64::from(iy), self.n_tiles);
        TileCoord::new(x as u32, y as u32, self.zoom)
    }

    /// Distance from `tile` to the viewport, in tiles at the current zoom.
    ///
    /// Non-positive values mean the tile overlaps or touches the view. The
    /// final `- 1 + 1/zoom_fac` term pulls ancestors of visible tiles closer
    /// so they survive pruning while still serving as fallbacks.
    pub fn tile_distance(&self, tile: TileCoord) -> f64 {
        let zoom_fac = 2f64.powi(i32::from(self.zoom) - i32::from(tile.z));
        let n = self.n_tiles as f64;

        let (tx1, tx2) = (f64::from(tile.x) * zoom_fac, f64::from(tile.x + 1) * zoom_fac);
        let (ty1, ty2) = (f64::from(tile.y) * zoom_fac, f64::from(tile.y + 1) * zoom_fac);

        // The view may extend across the antimeridian or a pole
        let mx1 = self.x_tile0 as f64;
        let mx2 = mx1 + f64::from(self.nx) + 1.0;
        let my1 = self.y_tile0 as f64;
        let my2 = my1 + f64::from(self.ny) + 1.0;

        let xdist = f64::min(
            f64::max(mx1 - tx2, tx1 - mx2),
            f64::max(mx1 - (tx2 + n), (tx1 + n) - mx2),
        );
        let ydist = f64::min(
            f64::max(my1 - ty2, ty1 - my2),
            f64::max(my1 - (ty2 + n), (ty1 + n) - my2),
        );

        let hdist = xdist.max(ydist);
        hdist - 1.0 + 1.0 / zoom_fac
    }

    /// Zoom and center so the box `p1` (north-west) to `p2` (south-east)
    /// fits in `nx - 1` by `ny - 1` tiles. `p2.x < p1.x` means the box
    /// crosses the antimeridian. Returns `false` without changes when the
    /// box is inverted vertically or not finite.
    pub fn fit_bounding_box(&mut self, p1: Point, p2: Point) -> bool {
        if !p1.is_finite() || !p2.is_finite() {
            return false;
        }

        let mut box_width = p2.x - p1.x;
        if box_width < 0.0 {
            box_width += 1.0;
        }
        let box_height = p2.y - p1.y;
        if box_height < 0.0 {
            return false;
        }

        let zoom = fit_zoom(self.nx, box_width).min(fit_zoom(self.ny, box_height));

        let mut center_x = p1.x + box_width / 2.0;
        if center_x > 1.0 {
            center_x -= 1.0;
        }
        let center_y = 0.5 * (p1.y + p2.y);

        self.set_center_zoom(Point::new(center_x, center_y), zoom)
    }

    /// Relative pan/zoom. Deltas are rounded to integers and `dz` is clamped
    /// so the zoom stays within `[0, max_zoom]`. The pan is applied first,
    /// then the zoom one level at a time, recentering at each step.
    pub fn move_by(&mut self, dz: f64, dx: f64, dy: f64) -> bool {
        if !(dz.is_finite() && dx.is_finite() && dy.is_finite()) {
            return false;
        }
        let zoom = i64::from(self.zoom);
        let dzi = (round_half_up(dz) as i64).clamp(-zoom, i64::from(self.max_zoom) - zoom);
        let dxi = round_half_up(dx) as i64;
        let dyi = round_half_up(dy) as i64;

        let changed = dzi != 0 || dxi != 0 || dyi != 0;

        let nx = i64::from(self.nx);
        let ny = i64::from(self.ny);
        let mut n = self.n_tiles;
        let mut x0 = wrap(self.x_tile0 + dxi.rem_euclid(n), n);
        let mut y0 = self.clamp_y(self.y_tile0.saturating_add(dyi), n);

        let mut zoom = self.zoom;
        for _ in 0..dzi.max(0) {
            zoom += 1;
            n *= 2;
            x0 = wrap(2 * x0 + nx / 2, n);
            y0 = self.clamp_y(2 * y0 + ny / 2, n);
        }
        for _ in 0..(-dzi).max(0) {
            zoom -= 1;
            n /= 2;
            x0 = wrap(half_up(x0, self.nx), n);
            y0 = self.clamp_y(half_up(y0, self.ny), n);
        }

        self.apply(zoom, x0, y0);
        changed
    }

    /// Absolute positioning: zoom is clamped to `[min_zoom, max_zoom]` and
    /// floored, then the grid is centered on `center` (normalized space).
    pub fn set_center_zoom(&mut self, center: Point, zoom: f64) -> bool {
        if !center.is_finite() || zoom.is_nan() {
            return false;
        }
        let zoom = zoom
            .clamp(f64::from(self.min_zoom), f64::from(self.max_zoom))
            .floor() as u8;
        let n = 1i64 << zoom;
        let nf = n as f64;

        let x0 = round_half_up(center.x * nf - f64::from(self.nx) / 2.0) as i64;
        let y0 = round_half_up(center.y * nf - f64::from(self.ny) / 2.0) as i64;

        self.apply(zoom, wrap(x0, n), self.clamp_y(y0, n))
    }
}

/// Largest (fractional) zoom at which `extent` fits in `n - 1` tiles
fn fit_zoom(n: u32, extent: f64) -> f64 {
    if extent <= 0.0 {
        return f64::INFINITY;
    }
    (f64::from(n.saturating_sub(1)) / extent).log2()
}

/// Index of the top-left tile one zoom level out: `ceil((t - n/2) / 2)`
fn half_up(tile0: i64, n: u32) -> i64 {
    ((tile0 as f64 - f64::from(n) / 2.0) / 2.0).ceil() as i64
}

#[cfg(test)]
mod tests {
    use super::*;

    fn coords(nx: u32, ny: u32, max_zoom: u8) -> TileCoords {
        TileCoords::new(&GridParams::new(nx, ny, 512, max_zoom))
    }

    fn assert_close(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() < 1e-9,
            "expected {expected}, got {actual}"
        );
    }

    #[test]
    fn test_default_min_zoom() {
        assert_eq!(coords(2, 1, 20).min_zoom(), 0);
        assert_eq!(coords(4, 2, 20).min_zoom(), 1);
        assert_eq!(coords(8, 8, 20).min_zoom(), 3);
    }

    #[test]
    fn test_set_center_zoom_initial_position() {
        let mut c = coords(2, 1, 20);
        assert!(c.set_center_zoom(Point::new(0.5, 0.5), 1.0));
        assert_eq!(
            c.view(),
            ViewState {
                zoom: 1,
                x_tile0: 0,
                y_tile0: 1
            }
        );
        assert_eq!(c.get_zxy(0, 0), TileCoord::new(0, 1, 1));
        assert_eq!(c.get_zxy(1, 0), TileCoord::new(1, 1, 1));

        // Same position again is not a change
        assert!(!c.set_center_zoom(Point::new(0.5, 0.5), 1.0));
    }

    #[test]
    fn test_set_center_zoom_clamps_zoom() {
        let mut c = coords(2, 1, 5);
        c.set_center_zoom(Point::new(0.5, 0.5), 40.0);
        assert_eq!(c.zoom(), 5);
        c.set_center_zoom(Point::new(0.5, 0.5), -3.0);
        assert_eq!(c.zoom(), 0);
        c.set_center_zoom(Point::new(0.5, 0.5), 3.9);
        assert_eq!(c.zoom(), 3);
        assert!(!c.set_center_zoom(Point::new(0.5, 0.5), f64::NAN));
    }

    #[test]
    fn test_pole_clamp() {
        let mut c = coords(2, 2, 20);
        for zoom in 1..=10 {
            for &cy in &[0.0, 0.001, 0.3, 0.5, 0.999, 1.0] {
                c.set_center_zoom(Point::new(0.5, cy), f64::from(zoom));
                let n = 1u32 << zoom;
                let view = c.view();
                assert!(view.y_tile0 + 2 <= n, "zoom {zoom} cy {cy}: {view:?}");
            }
        }
    }

    #[test]
    fn test_get_zxy_wraps() {
        let mut c = coords(4, 2, 20);
        // Centered on the antimeridian so the grid straddles x = 0
        c.set_center_zoom(Point::new(0.0, 0.5), 2.0);
        assert_eq!(c.view().x_tile0, 2);
        let xs: Vec<u32> = (0..4).map(|ix| c.get_zxy(ix, 0).x).collect();
        assert_eq!(xs, vec![2, 3, 0, 1]);
        for ix in 0..4 {
            for iy in 0..2 {
                assert!(c.get_zxy(ix, iy).is_valid());
            }
        }
    }

    #[test]
    fn test_tile_distance_pinned_values() {
        let mut c = coords(2, 1, 20);
        c.set_center_zoom(Point::new(0.5, 0.5), 3.0);
        assert_eq!(
            c.view(),
            ViewState {
                zoom: 3,
                x_tile0: 3,
                y_tile0: 4
            }
        );

        assert_close(c.tile_distance(TileCoord::new(7, 4, 3)), 1.0);
        assert_close(c.tile_distance(TileCoord::new(0, 4, 3)), 2.0);
        // Top-left visible tile is within view
        assert_close(c.tile_distance(TileCoord::new(3, 4, 3)), -1.0);
        // Whole-world ancestor
        assert_close(c.tile_distance(TileCoord::new(0, 0, 0)), -4.875);
    }

    #[test]
    fn test_tile_distance_ancestor_bias() {
        let mut c = coords(2, 1, 20);
        c.set_center_zoom(Point::new(0.5, 0.5), 1.0);
        assert_close(c.tile_distance(TileCoord::new(0, 0, 0)), -1.5);
    }

    #[test]
    fn test_tile_distance_across_antimeridian() {
        let mut c = coords(2, 1, 20);
        c.set_center_zoom(Point::new(0.95, 0.5), 3.0);
        // x_tile0 = round(7.6 - 1) = 7; the grid shows tiles 7 and 0
        assert_eq!(c.view().x_tile0, 7);
        assert!(c.tile_distance(c.get_zxy(1, 0)) <= 0.0);
    }

    #[test]
    fn test_move_pan_wraps_and_clamps() {
        let mut c = coords(2, 1, 20);
        c.set_center_zoom(Point::new(0.5, 0.5), 2.0);
        // x0 = round(2 - 1) = 1, y0 = round(2 - 0.5) = 2
        assert!(c.move_by(0.0, -2.0, 0.0));
        assert_eq!(c.view().x_tile0, 3);
        assert!(c.move_by(0.0, 0.0, 10.0));
        assert_eq!(c.view().y_tile0, 3);
        assert!(c.move_by(0.0, 0.0, -10.0));
        assert_eq!(c.view().y_tile0, 0);
        assert!(!c.move_by(0.4, 0.2, -0.3));
    }

    #[test]
    fn test_move_huge_pan() {
        let mut c = coords(2, 1, 20);
        c.set_center_zoom(Point::new(0.5, 0.5), 2.0);
        for d in [1e19, -1e19, f64::MAX, f64::MIN] {
            assert!(c.move_by(0.0, d, 0.0));
            assert!(c.view().x_tile0 < 4);
            assert!(c.move_by(0.0, 0.0, d));
        }
        // Last pan saturates to the north pole
        assert_eq!(c.view().y_tile0, 0);
        assert!(c.move_by(0.0, 0.0, f64::MAX));
        assert_eq!(c.view().y_tile0, 3);
    }

    #[test]
    fn test_move_zoom_steps() {
        let mut c = coords(2, 1, 20);
        c.set_center_zoom(Point::new(0.5, 0.5), 2.0);
        assert!(c.move_by(1.0, 0.0, 0.0));
        // x = 2*1 + 1, y = 2*2 + 0
        assert_eq!(
            c.view(),
            ViewState {
                zoom: 3,
                x_tile0: 3,
                y_tile0: 4
            }
        );
        assert!(c.move_by(-1.0, 0.0, 0.0));
        // x = ceil((3 - 1) / 2), y = ceil((4 - 0.5) / 2)
        assert_eq!(
            c.view(),
            ViewState {
                zoom: 2,
                x_tile0: 1,
                y_tile0: 2
            }
        );
    }

    #[test]
    fn test_move_zoom_clamped() {
        let mut c = coords(2, 1, 4);
        c.set_center_zoom(Point::new(0.5, 0.5), 3.0);
        assert!(c.move_by(10.0, 0.0, 0.0));
        assert_eq!(c.zoom(), 4);
        assert!(!c.move_by(1.0, 0.0, 0.0));
        assert!(c.move_by(-10.0, 0.0, 0.0));
        assert_eq!(c.zoom(), 0);
        assert_eq!(c.view().y_tile0, 0);
    }

    #[test]
    fn test_fit_bounding_box() {
        let mut c = coords(4, 2, 20);
        let p1 = Point::new(0.25, 0.375);
        let p2 = Point::new(0.3125, 0.40625);
        assert!(c.fit_bounding_box(p1, p2));
        // width 1/16 in 3 tiles -> log2(48) = 5.58; height 1/32 in 1 tile -> 5
        assert_eq!(c.zoom(), 5);

        let (w, h) = (4.0 * 512.0, 2.0 * 512.0);
        for p in [p1, p2] {
            let px = c.xy_to_map_pixels(p);
            assert!((0.0..=w).contains(&px.x), "{px:?}");
            assert!((0.0..=h).contains(&px.y), "{px:?}");
        }
        assert!(!c.fit_bounding_box(p1, p2));
    }

    #[test]
    fn test_fit_bounding_box_across_antimeridian() {
        let mut c = coords(4, 2, 20);
        assert!(c.fit_bounding_box(Point::new(0.98, 0.45), Point::new(0.02, 0.5)));
        let view = c.view();
        // Centered on x = 0 means the grid straddles the wrap point
        let n = 1u32 << view.zoom;
        assert!(view.x_tile0 > n / 2);
    }

    #[test]
    fn test_fit_bounding_box_rejects_bad_input() {
        let mut c = coords(2, 1, 20);
        let before = c.view();
        assert!(!c.fit_bounding_box(Point::new(0.2, 0.6), Point::new(0.3, 0.5)));
        assert!(!c.fit_bounding_box(Point::new(f64::NAN, 0.1), Point::new(0.3, 0.5)));
        assert_eq!(c.view(), before);
    }

    #[test]
    fn test_to_local_wraps_west_of_origin() {
        let mut c = coords(2, 1, 20);
        c.set_center_zoom(Point::new(0.5, 0.5), 2.0);
        // origin.x = 0.25, scale.x = 2
        let local = c.to_local(Point::new(0.5, 0.5));
        assert_close(local.x, 0.5);
        assert_close(local.y, 0.0);

        // Slightly west of the origin wraps to the far right
        let west = c.to_local(Point::new(0.24, 0.5));
        assert_close(west.x, 0.99 * 2.0);
        assert!(west.x > 1.0);
    }

    #[test]
    fn test_scale_and_pixels() {
        let mut c = coords(2, 1, 20);
        c.set_center_zoom(Point::new(0.5, 0.5), 2.0);
        assert_close(c.scale(Axis::X), 2.0);
        assert_close(c.scale(Axis::Y), 4.0);
        let px = c.xy_to_map_pixels(Point::new(0.375, 0.5625));
        assert_close(px.x, 0.25 * 1024.0);
        assert_close(px.y, 0.25 * 512.0);
    }
}
