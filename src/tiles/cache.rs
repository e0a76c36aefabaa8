//! Tile cache with ancestor fallback
//!
//! [`TileCache::retrieve`] returns the best rendered tile for an address:
//! the exact tile if ready, otherwise a crop of the nearest rendered
//! ancestor. Missing entries along the way are requested from the factory
//! after the parent lookup, so coarser tiles are always requested first.

use crate::core::geo::TileCoord;
use crate::rendering::paint::RenderStyle;
use crate::tiles::factory::TileFactory;
use crate::tiles::tile::{LoadState, Tile, TileBox};
use fxhash::FxHashMap;

/// Entry counts by load state
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    pub requested: usize,
    pub loaded: usize,
    pub rendered: usize,
    pub failed: usize,
}

impl CacheStats {
    pub fn total(&self) -> usize {
        self.requested + self.loaded + self.rendered + self.failed
    }
}

pub struct TileCache {
    tiles: FxHashMap<TileCoord, Tile>,
    factory: Box<dyn TileFactory>,
    style: RenderStyle,
    tile_size: u32,
}

impl TileCache {
    pub fn new(factory: Box<dyn TileFactory>, style: RenderStyle, tile_size: u32) -> Self {
        Self {
            tiles: FxHashMap::default(),
            factory,
            style,
            tile_size,
        }
    }

    pub fn tile_size(&self) -> u32 {
        self.tile_size
    }

    pub fn style(&self) -> &RenderStyle {
        &self.style
    }

    /// Best available crop for `coord`, or `None` if nothing in its
    /// ancestor chain is ready yet.
    pub fn retrieve(&mut self, coord: TileCoord) -> Option<TileBox> {
        let size = f64::from(self.tile_size);
        self.tile_or_parent(coord, 0.0, 0.0, size)
    }

    fn tile_or_parent(&mut self, coord: TileCoord, sx: f64, sy: f64, sw: f64) -> Option<TileBox> {
        if let Some(tile) = self.tiles.get_mut(&coord) {
            if tile.poll() == LoadState::Loaded {
                tile.render(&self.style, self.tile_size);
            }
            if let Some(found) = tile.tile_box(sx, sy, sw) {
                return Some(found);
            }
        }

        let mut found = None;
        if sw > 1.0 {
            if let Some(parent) = coord.parent() {
                let half = f64::from(self.tile_size) / 2.0;
                let (qx, qy) = coord.quadrant();
                let psx = sx / 2.0 + f64::from(qx) * half;
                let psy = sy / 2.0 + f64::from(qy) * half;
                found = self.tile_or_parent(parent, psx, psy, sw / 2.0);
            }
        }

        if !self.tiles.contains_key(&coord) {
            if let Some(tile) = self.factory.create(coord) {
                self.tiles.insert(coord, tile);
            }
        }

        found
    }

    /// Drop every entry with `distance(coord) >= threshold`. Dropped tiles
    /// cancel their outstanding requests. Returns the remaining count.
    pub fn prune<F>(&mut self, distance: F, threshold: f64) -> usize
    where
        F: Fn(TileCoord) -> f64,
    {
        let before = self.tiles.len();
        self.tiles.retain(|coord, _| distance(*coord) < threshold);
        let removed = before - self.tiles.len();
        if removed > 0 {
            log::debug!("pruned {} tiles, {} remain", removed, self.tiles.len());
        }
        self.tiles.len()
    }

    /// Mark one group (or everything) stale; payloads are kept so the next
    /// retrieve re-renders without refetching.
    pub fn unrender(&mut self, group: Option<&str>) {
        for tile in self.tiles.values_mut() {
            tile.unrender(group);
        }
    }

    /// Returns `false` if the group is unknown or already hidden
    pub fn hide_group(&mut self, name: &str) -> bool {
        self.set_group_visible(name, false)
    }

    /// Returns `false` if the group is unknown or already visible
    pub fn show_group(&mut self, name: &str) -> bool {
        self.set_group_visible(name, true)
    }

    fn set_group_visible(&mut self, name: &str, visible: bool) -> bool {
        if !self.style.set_visible(name, visible) {
            return false;
        }
        for tile in self.tiles.values_mut() {
            tile.invalidate_composite();
        }
        true
    }

    /// Insert a ready-made entry, replacing any existing one
    pub fn insert(&mut self, tile: Tile) {
        self.tiles.insert(tile.coord(), tile);
    }

    pub fn get(&self, coord: &TileCoord) -> Option<&Tile> {
        self.tiles.get(coord)
    }

    pub fn contains(&self, coord: &TileCoord) -> bool {
        self.tiles.contains_key(coord)
    }

    pub fn len(&self) -> usize {
        self.tiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tiles.is_empty()
    }

    pub fn clear(&mut self) {
        self.tiles.clear();
    }

    pub fn stats(&self) -> CacheStats {
        let mut stats = CacheStats::default();
        for tile in self.tiles.values() {
            match tile.state() {
                LoadState::Requested => stats.requested += 1,
                LoadState::Loaded => stats.loaded += 1,
                LoadState::Rendered => stats.rendered += 1,
                LoadState::Failed => stats.failed += 1,
            }
        }
        stats
    }
}
