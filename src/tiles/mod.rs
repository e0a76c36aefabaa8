pub mod cache;
pub mod factory;
pub mod loader;
pub mod source;
pub mod tile;

// Re-exports for convenience
pub use cache::TileCache;
pub use factory::{RemoteTileFactory, SourceSpec, TileFactory};
pub use loader::{Fetch, HttpFetcher, TileLoader};
pub use source::{FnSource, TileSource, UrlTemplateSource};
pub use tile::{LoadState, Tile, TileBox, TilePayload};
