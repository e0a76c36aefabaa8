//! Render groups and the painter seam used to fill laminae.

use crate::tiles::tile::TilePayload;
use image::{imageops, RgbaImage};
use std::fmt;
use std::sync::Arc;

/// Draws one render group of a tile's payload into its lamina.
///
/// The lamina is cleared to transparent before each call and has the
/// configured tile size; payload vector coordinates are in the same pixels.
pub trait LayerPainter: Send + Sync {
    fn paint(&self, group: &str, payload: &TilePayload, lamina: &mut RgbaImage);
}

impl<F> LayerPainter for F
where
    F: Fn(&str, &TilePayload, &mut RgbaImage) + Send + Sync,
{
    fn paint(&self, group: &str, payload: &TilePayload, lamina: &mut RgbaImage) {
        self(group, payload, lamina)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderGroup {
    pub name: String,
    pub visible: bool,
}

/// Ordered render groups plus the painter that fills them. No groups means
/// the plain raster path.
#[derive(Clone, Default)]
pub struct RenderStyle {
    groups: Vec<RenderGroup>,
    painter: Option<Arc<dyn LayerPainter>>,
}

impl RenderStyle {
    pub fn raster() -> Self {
        Self::default()
    }

    pub fn new(groups: Vec<String>, painter: Arc<dyn LayerPainter>) -> Self {
        Self {
            groups: groups
                .into_iter()
                .map(|name| RenderGroup { name, visible: true })
                .collect(),
            painter: Some(painter),
        }
    }

    pub fn is_raster(&self) -> bool {
        self.groups.is_empty()
    }

    pub fn groups(&self) -> &[RenderGroup] {
        &self.groups
    }

    pub fn visible_groups(&self) -> impl Iterator<Item = &RenderGroup> {
        self.groups.iter().filter(|g| g.visible)
    }

    /// Returns whether the visibility actually changed
    pub fn set_visible(&mut self, name: &str, visible: bool) -> bool {
        match self.groups.iter_mut().find(|g| g.name == name) {
            Some(group) if group.visible != visible => {
                group.visible = visible;
                true
            }
            _ => false,
        }
    }

    pub fn painter(&self) -> Option<&dyn LayerPainter> {
        self.painter.as_deref()
    }
}

impl fmt::Debug for RenderStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RenderStyle")
            .field("groups", &self.groups)
            .field("painter", &self.painter.is_some())
            .finish()
    }
}

/// Alpha-blend `layers` bottom to top onto a transparent square
pub fn composite<'a>(layers: impl Iterator<Item = &'a RgbaImage>, tile_size: u32) -> RgbaImage {
    let mut out = RgbaImage::new(tile_size, tile_size);
    for layer in layers {
        imageops::overlay(&mut out, layer, 0, 0);
    }
    out
}
