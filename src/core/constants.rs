//! Engine-wide defaults. Keeping them in a single place makes it easier to
//! tweak the magic numbers shared by config, coords and the cache.

/// Default square tile size in pixels.
pub const TILE_SIZE: u32 = 512;

/// Default maximum zoom level served by the tile sources.
pub const MAX_ZOOM: u8 = 22;

/// Hard upper bound on zoom; `2^z` tile indices must fit in a `u32`.
pub const MAX_SUPPORTED_ZOOM: u8 = 30;

/// Default canvas size in pixels.
pub const DEFAULT_WIDTH: u32 = 1024;
pub const DEFAULT_HEIGHT: u32 = 512;

/// Tiles whose distance metric reaches this value are evicted.
pub const DEFAULT_PRUNE_THRESHOLD: f64 = 3.5;

/// Default extent of a vector tile layer when the layer omits it.
pub const MVT_DEFAULT_EXTENT: u32 = 4096;

/// Latitude (degrees) at which Web Mercator maps to y = 0.
pub const MAX_MERCATOR_LATITUDE: f64 = 85.051_128_779_806_59;

/// Loader defaults.
pub const DEFAULT_WORKERS: usize = 4;
pub const DEFAULT_TIMEOUT_MS: u64 = 10_000;
pub const DEFAULT_USER_AGENT: &str = "rastermap/0.1";
