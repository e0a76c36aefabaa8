//! Per-cell draw tracking for the visible grid.

use crate::tiles::tile::TileBox;

/// What each grid cell currently shows and how close it is to its target
/// zoom. `dz` is the requested zoom minus the zoom actually drawn; `None`
/// means nothing has been drawn since the last reset.
#[derive(Debug, Clone)]
pub struct TileGrid {
    nx: u32,
    ny: u32,
    boxes: Vec<Option<TileBox>>,
    dz: Vec<Option<u8>>,
    resolved: usize,
}

impl TileGrid {
    pub fn new(nx: u32, ny: u32) -> Self {
        let cells = nx as usize * ny as usize;
        Self {
            nx,
            ny,
            boxes: vec![None; cells],
            dz: vec![None; cells],
            resolved: 0,
        }
    }

    fn index(&self, ix: u32, iy: u32) -> Option<usize> {
        (ix < self.nx && iy < self.ny).then(|| iy as usize * self.nx as usize + ix as usize)
    }

    pub fn size(&self) -> (u32, u32) {
        (self.nx, self.ny)
    }

    /// Forget everything drawn; completion drops to zero
    pub fn reset(&mut self) {
        self.boxes.iter_mut().for_each(|b| *b = None);
        self.dz.iter_mut().for_each(|d| *d = None);
        self.resolved = 0;
    }

    pub fn dz(&self, ix: u32, iy: u32) -> Option<u8> {
        self.index(ix, iy).and_then(|i| self.dz[i])
    }

    pub fn tile_box(&self, ix: u32, iy: u32) -> Option<&TileBox> {
        self.index(ix, iy).and_then(|i| self.boxes[i].as_ref())
    }

    /// Store what was drawn in a cell. Returns whether the cell just
    /// reached its exact zoom.
    pub fn record(&mut self, ix: u32, iy: u32, tile_box: TileBox, dz: u8) -> bool {
        let Some(i) = self.index(ix, iy) else {
            return false;
        };
        let newly_resolved = dz == 0 && self.dz[i] != Some(0);
        if newly_resolved {
            self.resolved += 1;
        }
        self.boxes[i] = Some(tile_box);
        self.dz[i] = Some(dz);
        newly_resolved
    }

    /// Fraction of cells drawn at their exact zoom, in `[0, 1]`
    pub fn complete(&self) -> f64 {
        let cells = self.dz.len();
        if cells == 0 {
            return 1.0;
        }
        self.resolved as f64 / cells as f64
    }

    pub fn is_complete(&self) -> bool {
        self.resolved == self.dz.len()
    }
}
