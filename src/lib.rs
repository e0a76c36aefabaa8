//! # rastermap
//!
//! A slippy-map tile engine. A fixed grid of on-screen tiles is kept in
//! sync with a pan/zoom state; tiles are fetched on background workers and
//! coarser ancestors stand in while their descendants load.
//!
//! The per-frame entry point is [`RasterMap::draw_tiles`], which polls the
//! [`TileCache`](tiles::cache::TileCache), paints whatever resolution is
//! available and evicts tiles that drifted away from the viewport.

pub mod core;
pub mod data;
pub mod prelude;
pub mod rendering;
pub mod spatial;
pub mod tiles;
pub use crate::core::constants;

// Re-export public API
pub use core::{
    builder::MapBuilder,
    config::{MapOptions, SourceKind, SourceOptions},
    coords::{Axis, TileCoords, ViewState},
    geo::{LatLng, Point, TileCoord},
    map::RasterMap,
};

pub use data::feature::{Feature, FeatureCollection, Geometry};
pub use rendering::{paint::LayerPainter, renderer::CanvasRenderer, renderer::Renderer};
pub use tiles::{cache::TileCache, factory::TileFactory, source::TileSource, tile::TileBox};

/// Result type used throughout the library
pub type Result<T> = std::result::Result<T, MapError>;

/// Common error types
#[derive(Debug, thiserror::Error)]
pub enum MapError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("HTTP {status} for {url}")]
    Http { status: u16, url: String },

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("Loader error: {0}")]
    Loader(String),

    #[error("Decode error: {0}")]
    Decode(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid coordinates: {0}")]
    InvalidCoordinates(String),
}

impl From<prost::DecodeError> for MapError {
    fn from(err: prost::DecodeError) -> Self {
        MapError::Decode(err.to_string())
    }
}

/// Install `env_logger` for demos and tests; repeated calls are ignored
#[cfg(feature = "debug")]
pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Error type alias for convenience
pub type Error = MapError;
