//! Prelude module for common rastermap types and traits
//!
//! This module re-exports the most commonly used types, traits, and functions
//! for easy importing with `use rastermap::prelude::*;`

pub use crate::core::{
    builder::MapBuilder,
    config::{GridParams, LoaderOptions, MapOptions, SourceKind, SourceOptions},
    coords::{Axis, TileCoords, ViewState},
    geo::{LatLng, Point, TileCoord},
    grid::TileGrid,
    map::RasterMap,
};

pub use crate::data::{
    feature::{Feature, FeatureCollection, Geometry},
    mvt::decode as decode_mvt,
};

pub use crate::tiles::{
    cache::{CacheStats, TileCache},
    factory::{RemoteTileFactory, SourceSpec, TileFactory},
    loader::{Fetch, HttpFetcher, TileLoader},
    source::{FnSource, TileSource, UrlTemplateSource},
    tile::{LoadState, PendingLoad, SourceData, Tile, TileBox, TilePayload},
};

pub use crate::rendering::{
    overlay::BoxOverlay,
    paint::{LayerPainter, RenderGroup, RenderStyle},
    renderer::{CanvasRenderer, Renderer},
};

pub use crate::{Error as MapError, Result};

pub use std::sync::Arc;

pub use fxhash::{FxHashMap as HashMap, FxHashSet as HashSet};
