//! The map driver
//!
//! [`RasterMap`] ties the coordinate transform, the tile cache and a
//! [`Renderer`] together. Hosts call [`RasterMap::draw_tiles`] once per
//! frame; each call paints whatever resolution the cache can offer for
//! every grid cell and evicts tiles that drifted away from the viewport.

use crate::core::builder::MapBuilder;
use crate::core::config::MapOptions;
use crate::core::coords::{Axis, TileCoords, ViewState};
use crate::core::geo::Point;
use crate::core::grid::TileGrid;
use crate::data::feature::Feature;
use crate::rendering::overlay::BoxOverlay;
use crate::rendering::renderer::{CanvasRenderer, Renderer};
use crate::spatial::selection;
use crate::tiles::cache::{CacheStats, TileCache};
use crate::tiles::tile::TileBox;
use crate::Result;
use image::RgbaImage;
use std::path::Path;

pub struct RasterMap<R: Renderer = CanvasRenderer> {
    coords: TileCoords,
    cache: TileCache,
    grid: TileGrid,
    renderer: R,
    prune_threshold: f64,
    overlay: Option<BoxOverlay>,
    overlay_stale: bool,
    last_fit: Option<(Point, Point)>,
}

impl RasterMap<CanvasRenderer> {
    /// Build a map that fetches tiles from `options.sources` over HTTP
    pub fn new(options: MapOptions) -> Result<Self> {
        MapBuilder::from_options(options).build()
    }

    pub fn canvas(&self) -> &RgbaImage {
        self.renderer.canvas()
    }

    pub fn save_png(&self, path: impl AsRef<Path>) -> Result<()> {
        self.renderer.save_png(path)
    }
}

impl<R: Renderer> RasterMap<R> {
    pub(crate) fn from_parts(
        coords: TileCoords,
        cache: TileCache,
        renderer: R,
        prune_threshold: f64,
    ) -> Self {
        let (nx, ny) = coords.grid_size();
        Self {
            coords,
            cache,
            grid: TileGrid::new(nx, ny),
            renderer,
            prune_threshold,
            overlay: None,
            overlay_stale: true,
            last_fit: None,
        }
    }

    /// Paint every cell that can improve, then prune the cache.
    ///
    /// Returns whether any cell was drawn. Once all cells show tiles at the
    /// current zoom this is a no-op until the view changes or a redraw is
    /// requested.
    pub fn draw_tiles(&mut self) -> bool {
        if self.grid.is_complete() {
            return false;
        }

        let (nx, ny) = self.coords.grid_size();
        let zoom = self.coords.zoom();
        let mut updated = false;
        for iy in 0..ny {
            for ix in 0..nx {
                let drawn = self.grid.dz(ix, iy);
                if drawn == Some(0) {
                    continue;
                }
                let coord = self.coords.get_zxy(ix, iy);
                let Some(tile_box) = self.cache.retrieve(coord) else {
                    continue;
                };
                let dz = zoom - tile_box.coord.z;
                if drawn == Some(dz) {
                    continue;
                }
                self.renderer.draw(&tile_box, ix, iy);
                self.grid.record(ix, iy, tile_box, dz);
                updated = true;
            }
        }

        let coords = &self.coords;
        self.cache
            .prune(|c| coords.tile_distance(c), self.prune_threshold);
        updated
    }

    fn view_changed(&mut self) {
        let view = self.coords.view();
        log::debug!(
            "view z={} x0={} y0={}",
            view.zoom,
            view.x_tile0,
            view.y_tile0
        );
        self.grid.reset();
        self.renderer.clear();
        self.overlay_stale = true;
    }

    /// Apply a change to the transform, resetting the grid whenever the
    /// change reports one
    fn update_view(&mut self, change: impl FnOnce(&mut TileCoords) -> bool) -> bool {
        let changed = change(&mut self.coords);
        if changed {
            self.view_changed();
        }
        changed
    }

    /// Relative pan and zoom in whole tiles and zoom levels
    pub fn move_by(&mut self, dz: f64, dx: f64, dy: f64) -> bool {
        self.update_view(|coords| coords.move_by(dz, dx, dy))
    }

    /// Zoom and center so the box `p1` (north-west) to `p2` (south-east),
    /// in normalized coordinates, fits the grid
    pub fn fit_bounding_box(&mut self, p1: Point, p2: Point) -> bool {
        let fitted = self.update_view(|coords| coords.fit_bounding_box(p1, p2));
        if fitted {
            self.last_fit = Some((p1, p2));
        }
        fitted
    }

    pub fn set_center_zoom(&mut self, center: Point, zoom: f64) -> bool {
        self.update_view(|coords| coords.set_center_zoom(center, zoom))
    }

    pub fn to_local(&self, global: Point) -> Point {
        self.coords.to_local(global)
    }

    pub fn xy_to_map_pixels(&self, global: Point) -> Point {
        self.coords.xy_to_map_pixels(global)
    }

    pub fn scale(&self, axis: Axis) -> f64 {
        self.coords.scale(axis)
    }

    pub fn view(&self) -> ViewState {
        self.coords.view()
    }

    pub fn coords(&self) -> &TileCoords {
        &self.coords
    }

    /// Re-render one group (or everything) from cached payloads. The canvas
    /// keeps its pixels until each cell is painted again.
    pub fn redraw(&mut self, group: Option<&str>) {
        self.cache.unrender(group);
        self.grid.reset();
    }

    pub fn hide_group(&mut self, name: &str) -> bool {
        let changed = self.cache.hide_group(name);
        if changed {
            self.grid.reset();
        }
        changed
    }

    pub fn show_group(&mut self, name: &str) -> bool {
        let changed = self.cache.show_group(name);
        if changed {
            self.grid.reset();
        }
        changed
    }

    /// Feature of `source`/`layer` under canvas pixel `(px, py)`, with
    /// coordinates in normalized Web Mercator
    pub fn select(
        &self,
        px: f64,
        py: f64,
        threshold: f64,
        source: &str,
        layer: &str,
    ) -> Option<Feature> {
        selection::select(
            &self.grid,
            self.coords.tile_size(),
            px,
            py,
            threshold,
            source,
            layer,
        )
    }

    /// Fraction of cells showing tiles at the current zoom
    pub fn loaded(&self) -> f64 {
        self.grid.complete()
    }

    pub fn num_cached_tiles(&self) -> usize {
        self.cache.len()
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    pub fn cache(&self) -> &TileCache {
        &self.cache
    }

    pub fn tile_box(&self, ix: u32, iy: u32) -> Option<&TileBox> {
        self.grid.tile_box(ix, iy)
    }

    /// Drawn cells as `(ix, iy, box)`, row by row
    pub fn tile_boxes(&self) -> impl Iterator<Item = (u32, u32, &TileBox)> + '_ {
        let (nx, ny) = self.grid.size();
        (0..ny).flat_map(move |iy| {
            (0..nx).filter_map(move |ix| self.grid.tile_box(ix, iy).map(|b| (ix, iy, b)))
        })
    }

    pub fn renderer(&self) -> &R {
        &self.renderer
    }

    pub fn renderer_mut(&mut self) -> &mut R {
        &mut self.renderer
    }

    /// Stroke the box `p1`-`p2` on a separate overlay canvas. Returns
    /// whether the overlay was repainted.
    pub fn draw_bounding_box(&mut self, p1: Point, p2: Point) -> bool {
        let (nx, ny) = self.coords.grid_size();
        let size = self.coords.tile_size();
        let overlay = self
            .overlay
            .get_or_insert_with(|| BoxOverlay::new(nx * size, ny * size));
        let drawn = overlay.draw(&self.coords, p1, p2, self.overlay_stale);
        self.overlay_stale = false;
        drawn
    }

    /// Stroke the box passed to the last successful `fit_bounding_box`
    pub fn draw_fitted_box(&mut self) -> bool {
        match self.last_fit {
            Some((p1, p2)) => self.draw_bounding_box(p1, p2),
            None => false,
        }
    }

    pub fn bounding_box_overlay(&self) -> Option<&BoxOverlay> {
        self.overlay.as_ref()
    }
}
