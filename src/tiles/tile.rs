//! Cache entries and the crops handed to the renderer.
//!
//! A [`Tile`] starts out `Requested` with one pending receiver per source.
//! [`Tile::poll`] drains them without blocking; once every source has
//! arrived the payload is stored and the tile becomes `Loaded`. Rendering
//! paints stale laminae, composites the visible ones and marks the tile
//! `Rendered`. Style changes drop it back to `Loaded` without a refetch.

use crate::core::geo::TileCoord;
use crate::data::feature::FeatureCollection;
use crate::data::mvt::VectorLayers;
use crate::rendering::paint::{composite, RenderStyle};
use crate::{MapError, Result};
use crossbeam_channel::{Receiver, TryRecvError};
use fxhash::FxHashMap;
use image::RgbaImage;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadState {
    Requested,
    Loaded,
    Rendered,
    Failed,
}

/// Decoded contents of one source for one tile
#[derive(Debug, Clone)]
pub enum SourceData {
    Raster(Arc<RgbaImage>),
    Vector(VectorLayers),
}

/// All sources of a tile, in configuration order
#[derive(Debug, Clone, Default)]
pub struct TilePayload {
    sources: Vec<(String, SourceData)>,
}

impl TilePayload {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_source(mut self, name: impl Into<String>, data: SourceData) -> Self {
        self.sources.push((name.into(), data));
        self
    }

    pub fn raster(name: impl Into<String>, image: RgbaImage) -> Self {
        Self::new().with_source(name, SourceData::Raster(Arc::new(image)))
    }

    pub fn source(&self, name: &str) -> Option<&SourceData> {
        self.sources.iter().find(|(n, _)| n == name).map(|(_, d)| d)
    }

    pub fn sources(&self) -> impl Iterator<Item = (&str, &SourceData)> {
        self.sources.iter().map(|(n, d)| (n.as_str(), d))
    }

    pub fn first_raster(&self) -> Option<Arc<RgbaImage>> {
        self.sources.iter().find_map(|(_, d)| match d {
            SourceData::Raster(image) => Some(Arc::clone(image)),
            SourceData::Vector(_) => None,
        })
    }

    pub fn vector_layer(&self, source: &str, layer: &str) -> Option<&FeatureCollection> {
        match self.source(source)? {
            SourceData::Vector(layers) => layers.get(layer),
            SourceData::Raster(_) => None,
        }
    }
}

#[derive(Debug)]
struct PendingPart {
    name: String,
    receiver: Receiver<Result<SourceData>>,
    data: Option<SourceData>,
}

enum PollOutcome {
    Pending,
    Ready(TilePayload),
    Failed(MapError),
}

/// In-flight requests for one tile. Dropping it raises the cancel flag.
#[derive(Debug)]
pub struct PendingLoad {
    parts: Vec<PendingPart>,
    cancel: Arc<AtomicBool>,
}

impl PendingLoad {
    pub fn new() -> Self {
        Self {
            parts: Vec::new(),
            cancel: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Shared flag the loader checks before doing work for this tile
    pub fn cancel_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancel)
    }

    pub fn push(&mut self, name: impl Into<String>, receiver: Receiver<Result<SourceData>>) {
        self.parts.push(PendingPart {
            name: name.into(),
            receiver,
            data: None,
        });
    }

    fn poll(&mut self) -> PollOutcome {
        let mut waiting = false;
        for part in self.parts.iter_mut().filter(|p| p.data.is_none()) {
            match part.receiver.try_recv() {
                Ok(Ok(data)) => part.data = Some(data),
                Ok(Err(err)) => return PollOutcome::Failed(err),
                Err(TryRecvError::Empty) => waiting = true,
                Err(TryRecvError::Disconnected) => {
                    return PollOutcome::Failed(MapError::Loader(format!(
                        "request for source {:?} was dropped",
                        part.name
                    )))
                }
            }
        }
        if waiting {
            return PollOutcome::Pending;
        }

        let mut payload = TilePayload::new();
        for part in self.parts.drain(..) {
            if let Some(data) = part.data {
                payload = payload.with_source(part.name, data);
            }
        }
        PollOutcome::Ready(payload)
    }
}

impl Default for PendingLoad {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for PendingLoad {
    fn drop(&mut self) {
        self.cancel.store(true, Ordering::Relaxed);
    }
}

/// Per-group rendering surface
#[derive(Debug)]
struct Lamina {
    image: RgbaImage,
    rendered: bool,
}

#[derive(Debug)]
pub struct Tile {
    coord: TileCoord,
    state: LoadState,
    pending: Option<PendingLoad>,
    payload: Option<Arc<TilePayload>>,
    image: Option<Arc<RgbaImage>>,
    laminae: FxHashMap<String, Lamina>,
}

impl Tile {
    /// A tile waiting on background requests
    pub fn requested(coord: TileCoord, pending: PendingLoad) -> Self {
        Self {
            coord,
            state: LoadState::Requested,
            pending: Some(pending),
            payload: None,
            image: None,
            laminae: FxHashMap::default(),
        }
    }

    /// A tile whose payload is already available
    pub fn loaded(coord: TileCoord, payload: TilePayload) -> Self {
        Self {
            coord,
            state: LoadState::Loaded,
            pending: None,
            payload: Some(Arc::new(payload)),
            image: None,
            laminae: FxHashMap::default(),
        }
    }

    pub fn coord(&self) -> TileCoord {
        self.coord
    }

    pub fn state(&self) -> LoadState {
        self.state
    }

    pub fn is_rendered(&self) -> bool {
        self.state == LoadState::Rendered
    }

    pub fn payload(&self) -> Option<&Arc<TilePayload>> {
        self.payload.as_ref()
    }

    pub fn image(&self) -> Option<&Arc<RgbaImage>> {
        self.image.as_ref()
    }

    /// Check for completed requests without blocking
    pub fn poll(&mut self) -> LoadState {
        if self.state != LoadState::Requested {
            return self.state;
        }
        let Some(pending) = self.pending.as_mut() else {
            return self.state;
        };
        match pending.poll() {
            PollOutcome::Pending => {}
            PollOutcome::Ready(payload) => {
                log::debug!("tile {} loaded", self.coord);
                self.payload = Some(Arc::new(payload));
                self.pending = None;
                self.state = LoadState::Loaded;
            }
            PollOutcome::Failed(err) => {
                log::warn!("tile {} failed: {}", self.coord, err);
                self.pending = None;
                self.state = LoadState::Failed;
            }
        }
        self.state
    }

    /// Paint stale laminae for the visible groups and composite them. With
    /// no groups the first raster source is used as the tile image.
    pub fn render(&mut self, style: &RenderStyle, tile_size: u32) {
        if !matches!(self.state, LoadState::Loaded | LoadState::Rendered) {
            return;
        }
        let Some(payload) = self.payload.clone() else {
            return;
        };

        if style.is_raster() {
            let image = payload
                .first_raster()
                .unwrap_or_else(|| Arc::new(RgbaImage::new(tile_size, tile_size)));
            self.image = Some(image);
        } else {
            for group in style.visible_groups() {
                let lamina = self
                    .laminae
                    .entry(group.name.clone())
                    .or_insert_with(|| Lamina {
                        image: RgbaImage::new(tile_size, tile_size),
                        rendered: false,
                    });
                if lamina.rendered {
                    continue;
                }
                lamina.image.pixels_mut().for_each(|p| p.0 = [0; 4]);
                if let Some(painter) = style.painter() {
                    painter.paint(&group.name, &payload, &mut lamina.image);
                }
                lamina.rendered = true;
            }
            let layers = style
                .visible_groups()
                .filter_map(|g| self.laminae.get(&g.name))
                .map(|l| &l.image);
            self.image = Some(Arc::new(composite(layers, tile_size)));
        }
        self.state = LoadState::Rendered;
    }

    /// Mark one group's lamina (or all of them) stale. The payload is kept.
    pub fn unrender(&mut self, group: Option<&str>) {
        match group {
            Some(name) => {
                if let Some(lamina) = self.laminae.get_mut(name) {
                    lamina.rendered = false;
                }
            }
            None => self.laminae.values_mut().for_each(|l| l.rendered = false),
        }
        self.invalidate_composite();
    }

    /// Force a recomposite on the next render, e.g. after a visibility change
    pub fn invalidate_composite(&mut self) {
        if self.state == LoadState::Rendered {
            self.state = LoadState::Loaded;
        }
    }

    /// Crop of this tile, if it is rendered
    pub fn tile_box(&self, sx: f64, sy: f64, sw: f64) -> Option<TileBox> {
        if self.state != LoadState::Rendered {
            return None;
        }
        Some(TileBox {
            coord: self.coord,
            image: Arc::clone(self.image.as_ref()?),
            payload: Arc::clone(self.payload.as_ref()?),
            sx,
            sy,
            sw,
        })
    }
}

/// The part of a rendered tile that covers one grid cell. `(sx, sy)` is the
/// top-left of a square crop of side `sw`, in the tile's own pixel space.
#[derive(Debug, Clone)]
pub struct TileBox {
    pub coord: TileCoord,
    pub image: Arc<RgbaImage>,
    pub payload: Arc<TilePayload>,
    pub sx: f64,
    pub sy: f64,
    pub sw: f64,
}

impl PartialEq for TileBox {
    fn eq(&self, other: &Self) -> bool {
        self.coord == other.coord
            && Arc::ptr_eq(&self.image, &other.image)
            && Arc::ptr_eq(&self.payload, &other.payload)
            && self.sx == other.sx
            && self.sy == other.sy
            && self.sw == other.sw
    }
}
