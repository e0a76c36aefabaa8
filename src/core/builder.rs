//! Map builder for fluent API configuration
//!
//! [`MapBuilder`] turns [`MapOptions`] into a ready [`RasterMap`]: it checks
//! the configuration, wires the tile factory and loader, picks the render
//! style and positions the view at the configured center and zoom.

use crate::core::config::{LoaderOptions, MapOptions, SourceKind};
use crate::core::coords::TileCoords;
use crate::core::geo::Point;
use crate::core::map::RasterMap;
use crate::rendering::paint::{LayerPainter, RenderStyle};
use crate::rendering::renderer::{CanvasRenderer, Renderer};
use crate::tiles::cache::TileCache;
use crate::tiles::factory::{RemoteTileFactory, SourceSpec, TileFactory};
use crate::tiles::loader::{Fetch, HttpFetcher};
use crate::tiles::source::TileSource;
use crate::{MapError, Result};
use std::sync::Arc;

/// Builder for creating and configuring [`RasterMap`] instances
pub struct MapBuilder {
    options: MapOptions,
    /// Replaces the remote factory entirely
    factory: Option<Box<dyn TileFactory>>,
    /// Transport for the remote factory; HTTP when unset
    fetcher: Option<Arc<dyn Fetch>>,
    painter: Option<Arc<dyn LayerPainter>>,
    /// Sources beyond the URL templates in `options`
    sources: Vec<SourceSpec>,
}

impl MapBuilder {
    pub fn new() -> Self {
        Self::from_options(MapOptions::default())
    }

    pub fn from_options(options: MapOptions) -> Self {
        Self {
            options,
            factory: None,
            fetcher: None,
            painter: None,
            sources: Vec::new(),
        }
    }

    /// Canvas size in pixels; both must be multiples of the tile size
    pub fn with_size(mut self, width: u32, height: u32) -> Self {
        self.options.width = width;
        self.options.height = height;
        self
    }

    pub fn with_tile_size(mut self, tile_size: u32) -> Self {
        self.options.tile_size = tile_size;
        self
    }

    /// Initial center in normalized coordinates and initial zoom
    pub fn with_center_and_zoom(mut self, center: Point, zoom: f64) -> Self {
        self.options.center = [center.x, center.y];
        self.options.zoom = zoom;
        self
    }

    pub fn with_zoom_limits(mut self, min_zoom: Option<u8>, max_zoom: u8) -> Self {
        self.options.min_zoom = min_zoom;
        self.options.max_zoom = max_zoom;
        self
    }

    pub fn with_prune_threshold(mut self, threshold: f64) -> Self {
        self.options.prune_threshold = threshold;
        self
    }

    /// Render groups in paint order; requires a painter
    pub fn with_groups(mut self, groups: Vec<String>) -> Self {
        self.options.groups = groups;
        self
    }

    pub fn with_painter(mut self, painter: Arc<dyn LayerPainter>) -> Self {
        self.painter = Some(painter);
        self
    }

    pub fn with_factory(mut self, factory: Box<dyn TileFactory>) -> Self {
        self.factory = Some(factory);
        self
    }

    pub fn with_fetcher(mut self, fetcher: Arc<dyn Fetch>) -> Self {
        self.fetcher = Some(fetcher);
        self
    }

    /// Add a source with custom URL resolution
    pub fn with_source(
        mut self,
        name: impl Into<String>,
        kind: SourceKind,
        source: Box<dyn TileSource>,
    ) -> Self {
        self.sources.push(SourceSpec::new(name, kind, source));
        self
    }

    /// Build a map drawing into an in-memory canvas
    pub fn build(self) -> Result<RasterMap> {
        let params = self.options.grid_params()?;
        let (width, height) = params.canvas_size();
        self.build_with_renderer(CanvasRenderer::new(width, height, params.tile_size))
    }

    pub fn build_with_renderer<R: Renderer>(self, renderer: R) -> Result<RasterMap<R>> {
        let Self {
            options,
            factory,
            fetcher,
            painter,
            sources,
        } = self;

        let params = if factory.is_some() || (options.sources.is_empty() && !sources.is_empty()) {
            options.grid_params()?
        } else {
            options.validate()?
        };

        let style = match (options.groups.is_empty(), painter) {
            (true, _) => RenderStyle::raster(),
            (false, Some(painter)) => RenderStyle::new(options.groups.clone(), painter),
            (false, None) => {
                return Err(MapError::Config(
                    "render groups need a layer painter".into(),
                ))
            }
        };

        let factory: Box<dyn TileFactory> = match factory {
            Some(factory) => factory,
            None => {
                let fetcher: Arc<dyn Fetch> = match fetcher {
                    Some(fetcher) => fetcher,
                    None if options.loader == LoaderOptions::default() => {
                        Arc::new(HttpFetcher::shared()?)
                    }
                    None => Arc::new(HttpFetcher::new(&options.loader)?),
                };
                let mut remote = RemoteTileFactory::from_options(&options, fetcher)?;
                for spec in sources {
                    remote.add_source(spec);
                }
                Box::new(remote)
            }
        };

        let mut coords = TileCoords::new(&params);
        coords.set_center_zoom(Point::from(options.center), options.zoom);
        let view = coords.view();
        log::info!(
            "map {}x{} tiles of {}px, zoom {}..={}, view z={} x0={} y0={}",
            params.nx,
            params.ny,
            params.tile_size,
            params.min_zoom,
            params.max_zoom,
            view.zoom,
            view.x_tile0,
            view.y_tile0
        );

        let cache = TileCache::new(factory, style, params.tile_size);
        Ok(RasterMap::from_parts(
            coords,
            cache,
            renderer,
            options.prune_threshold,
        ))
    }
}

impl Default for MapBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::SourceOptions;
    use crate::core::geo::TileCoord;
    use crate::tiles::source::FnSource;
    use crate::tiles::tile::{TilePayload, Tile};
    use image::RgbaImage;

    fn empty_factory() -> Box<dyn TileFactory> {
        Box::new(|_: TileCoord| None::<Tile>)
    }

    fn failing_fetcher() -> Arc<dyn Fetch> {
        Arc::new(|url: &str| -> Result<Vec<u8>> {
            Err(MapError::Http {
                status: 404,
                url: url.to_string(),
            })
        })
    }

    #[test]
    fn test_requires_sources_without_factory() {
        let err = MapBuilder::new().with_size(1024, 512).build();
        assert!(matches!(err, Err(MapError::Config(_))));
    }

    #[test]
    fn test_rejects_bad_sizes() {
        let err = MapBuilder::new()
            .with_size(1000, 512)
            .with_factory(empty_factory())
            .build();
        assert!(matches!(err, Err(MapError::Config(_))));
    }

    #[test]
    fn test_groups_need_painter() {
        let err = MapBuilder::new()
            .with_factory(empty_factory())
            .with_groups(vec!["land".into()])
            .build();
        assert!(matches!(err, Err(MapError::Config(_))));

        let painter: Arc<dyn LayerPainter> =
            Arc::new(|_: &str, _: &TilePayload, _: &mut RgbaImage| {});
        let map = MapBuilder::new()
            .with_factory(empty_factory())
            .with_groups(vec!["land".into()])
            .with_painter(painter)
            .build();
        assert!(map.is_ok());
    }

    #[test]
    fn test_initial_view_from_options() {
        let map = MapBuilder::new()
            .with_size(1024, 512)
            .with_center_and_zoom(Point::new(0.5, 0.5), 3.0)
            .with_factory(empty_factory())
            .build()
            .unwrap();
        let view = map.view();
        assert_eq!((view.zoom, view.x_tile0, view.y_tile0), (3, 3, 4));
        assert_eq!(map.canvas().dimensions(), (1024, 512));
    }

    #[test]
    fn test_custom_sources_only() {
        let source = FnSource::new(|id: &str| format!("mem://{id}"));
        let mut map = MapBuilder::new()
            .with_size(1024, 512)
            .with_fetcher(failing_fetcher())
            .with_source("base", SourceKind::Raster, Box::new(source))
            .build()
            .unwrap();
        map.draw_tiles();
        assert_eq!(map.num_cached_tiles(), 1);
    }

    #[test]
    fn test_from_options_with_fetcher() {
        let options = MapOptions {
            sources: vec![SourceOptions::raster("osm", "mem://{z}/{x}/{y}")],
            ..MapOptions::default()
        };
        let map = MapBuilder::from_options(options)
            .with_fetcher(failing_fetcher())
            .build();
        assert!(map.is_ok());
    }
}
