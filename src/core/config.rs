//! Construction-time configuration
//!
//! [`MapOptions`] is deserialized from camelCase JSON (or built in code) and
//! validated into the derived [`GridParams`] before any map state exists.

use crate::core::constants::{
    DEFAULT_HEIGHT, DEFAULT_PRUNE_THRESHOLD, DEFAULT_TIMEOUT_MS, DEFAULT_USER_AGENT,
    DEFAULT_WIDTH, DEFAULT_WORKERS, MAX_SUPPORTED_ZOOM, MAX_ZOOM, TILE_SIZE,
};
use crate::{MapError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// How the bytes of a source are decoded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    /// PNG/JPEG images
    #[default]
    Raster,
    /// Mapbox vector tiles
    Vector,
}

/// One named tile source
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceOptions {
    pub name: String,
    #[serde(default)]
    pub kind: SourceKind,
    /// URL template with `{z}`, `{x}`, `{y}` and optionally `{token}`, `{size}`
    pub tiles: String,
}

impl SourceOptions {
    pub fn raster(name: impl Into<String>, tiles: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: SourceKind::Raster,
            tiles: tiles.into(),
        }
    }

    pub fn vector(name: impl Into<String>, tiles: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: SourceKind::Vector,
            tiles: tiles.into(),
        }
    }
}

/// Background loader settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoaderOptions {
    /// Number of fetch/decode worker threads
    pub workers: usize,
    pub user_agent: String,
    pub timeout_ms: u64,
    /// Extra attempts after a failed network request
    pub retries: usize,
    pub retry_delay_ms: u64,
}

impl Default for LoaderOptions {
    fn default() -> Self {
        Self {
            workers: DEFAULT_WORKERS,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            timeout_ms: DEFAULT_TIMEOUT_MS,
            retries: 1,
            retry_delay_ms: 100,
        }
    }
}

impl LoaderOptions {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    /// Single worker and no retries, for deterministic tests
    pub fn for_testing() -> Self {
        Self {
            workers: 1,
            retries: 0,
            retry_delay_ms: 0,
            ..Self::default()
        }
    }
}

fn default_tile_size() -> u32 {
    TILE_SIZE
}

fn default_width() -> u32 {
    DEFAULT_WIDTH
}

fn default_height() -> u32 {
    DEFAULT_HEIGHT
}

fn default_max_zoom() -> u8 {
    MAX_ZOOM
}

fn default_center() -> [f64; 2] {
    [0.5, 0.5]
}

fn default_prune_threshold() -> f64 {
    DEFAULT_PRUNE_THRESHOLD
}

/// Map construction options
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MapOptions {
    #[serde(default)]
    pub sources: Vec<SourceOptions>,
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default = "default_tile_size")]
    pub tile_size: u32,
    #[serde(default = "default_width")]
    pub width: u32,
    #[serde(default = "default_height")]
    pub height: u32,
    /// Defaults to `floor(min(log2 nx, log2 ny))`
    #[serde(default)]
    pub min_zoom: Option<u8>,
    #[serde(default = "default_max_zoom")]
    pub max_zoom: u8,
    /// Initial center in normalized Web Mercator space
    #[serde(default = "default_center")]
    pub center: [f64; 2],
    #[serde(default)]
    pub zoom: f64,
    #[serde(default = "default_prune_threshold")]
    pub prune_threshold: f64,
    /// Render groups in compositing order; empty means plain raster tiles
    #[serde(default)]
    pub groups: Vec<String>,
    #[serde(default)]
    pub loader: LoaderOptions,
}

impl Default for MapOptions {
    fn default() -> Self {
        Self {
            sources: Vec::new(),
            token: None,
            tile_size: TILE_SIZE,
            width: DEFAULT_WIDTH,
            height: DEFAULT_HEIGHT,
            min_zoom: None,
            max_zoom: MAX_ZOOM,
            center: default_center(),
            zoom: 0.0,
            prune_threshold: DEFAULT_PRUNE_THRESHOLD,
            groups: Vec::new(),
            loader: LoaderOptions::default(),
        }
    }
}

impl MapOptions {
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    /// Check sizes and zoom limits and derive the grid dimensions
    pub fn grid_params(&self) -> Result<GridParams> {
        let size = self.tile_size;
        if size == 0 {
            return Err(MapError::Config("tileSize must be positive".into()));
        }
        if self.width == 0 || self.height == 0 {
            return Err(MapError::Config(format!(
                "map size {}x{} must be positive",
                self.width, self.height
            )));
        }
        if self.width % size != 0 || self.height % size != 0 {
            return Err(MapError::Config(format!(
                "map size {}x{} is not a multiple of tileSize {}",
                self.width, self.height, size
            )));
        }
        if self.max_zoom > MAX_SUPPORTED_ZOOM {
            return Err(MapError::Config(format!(
                "maxZoom {} exceeds {}",
                self.max_zoom, MAX_SUPPORTED_ZOOM
            )));
        }
        if !(self.prune_threshold.is_finite() && self.prune_threshold > 0.0) {
            return Err(MapError::Config(format!(
                "pruneThreshold {} must be a positive number",
                self.prune_threshold
            )));
        }

        let mut params = GridParams::new(self.width / size, self.height / size, size, self.max_zoom);
        if let Some(min_zoom) = self.min_zoom {
            if min_zoom > self.max_zoom {
                return Err(MapError::Config(format!(
                    "minZoom {} exceeds maxZoom {}",
                    min_zoom, self.max_zoom
                )));
            }
            params.min_zoom = min_zoom;
        }
        Ok(params)
    }

    /// Full validation for maps that fetch from the configured sources
    pub fn validate(&self) -> Result<GridParams> {
        if self.sources.is_empty() {
            return Err(MapError::Config("at least one tile source is required".into()));
        }
        for source in &self.sources {
            if source.name.is_empty() || source.tiles.is_empty() {
                return Err(MapError::Config(format!(
                    "source {:?} needs a name and a tiles template",
                    source.name
                )));
            }
        }
        self.grid_params()
    }
}

/// Grid dimensions and zoom limits derived from [`MapOptions`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GridParams {
    pub nx: u32,
    pub ny: u32,
    pub tile_size: u32,
    pub min_zoom: u8,
    pub max_zoom: u8,
}

impl GridParams {
    /// Uses the lowest zoom at which no tile repeats across the grid
    pub fn new(nx: u32, ny: u32, tile_size: u32, max_zoom: u8) -> Self {
        let min_zoom = nx.min(ny).max(1).ilog2().min(u32::from(max_zoom)) as u8;
        Self {
            nx,
            ny,
            tile_size,
            min_zoom,
            max_zoom,
        }
    }

    pub fn canvas_size(&self) -> (u32, u32) {
        (self.nx * self.tile_size, self.ny * self.tile_size)
    }
}
