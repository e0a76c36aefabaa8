use crate::tiles::tile::TileBox;
use crate::Result;
use image::imageops::{self, FilterType};
use image::{Rgba, RgbaImage};
use std::path::Path;

/// Paints tile crops into grid cells
pub trait Renderer {
    /// Draw the crop described by `tile_box` scaled to fill cell `(ix, iy)`
    fn draw(&mut self, tile_box: &TileBox, ix: u32, iy: u32);

    /// Clear the whole canvas
    fn clear(&mut self);
}

/// CPU renderer that blits into an in-memory RGBA canvas
#[derive(Debug, Clone)]
pub struct CanvasRenderer {
    canvas: RgbaImage,
    tile_size: u32,
    filter: FilterType,
}

impl CanvasRenderer {
    pub fn new(width: u32, height: u32, tile_size: u32) -> Self {
        Self {
            canvas: RgbaImage::new(width, height),
            tile_size,
            filter: FilterType::Triangle,
        }
    }

    pub fn with_filter(mut self, filter: FilterType) -> Self {
        self.filter = filter;
        self
    }

    pub fn canvas(&self) -> &RgbaImage {
        &self.canvas
    }

    pub fn save_png(&self, path: impl AsRef<Path>) -> Result<()> {
        self.canvas.save_with_format(path, image::ImageFormat::Png)?;
        Ok(())
    }
}

impl Renderer for CanvasRenderer {
    fn draw(&mut self, tile_box: &TileBox, ix: u32, iy: u32) {
        let image = &*tile_box.image;
        if image.width() == 0 || image.height() == 0 {
            return;
        }

        // Crop coordinates are in tile pixels; source images may be larger
        let tile = f64::from(self.tile_size);
        let rx = f64::from(image.width()) / tile;
        let ry = f64::from(image.height()) / tile;
        let x = ((tile_box.sx * rx).floor() as u32).min(image.width() - 1);
        let y = ((tile_box.sy * ry).floor() as u32).min(image.height() - 1);
        let w = ((tile_box.sw * rx).round() as u32).max(1).min(image.width() - x);
        let h = ((tile_box.sw * ry).round() as u32).max(1).min(image.height() - y);

        let crop = imageops::crop_imm(image, x, y, w, h).to_image();
        let size = self.tile_size;
        let cell = if (w, h) == (size, size) {
            crop
        } else {
            imageops::resize(&crop, size, size, self.filter)
        };

        imageops::replace(
            &mut self.canvas,
            &cell,
            i64::from(ix * size),
            i64::from(iy * size),
        );
    }

    fn clear(&mut self) {
        self.canvas.pixels_mut().for_each(|p| *p = Rgba([0, 0, 0, 0]));
    }
}
