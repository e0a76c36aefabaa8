use crate::core::config::{MapOptions, SourceKind};
use crate::core::geo::TileCoord;
use crate::tiles::loader::{Fetch, TileLoader};
use crate::tiles::source::{TileSource, UrlTemplateSource};
use crate::tiles::tile::{PendingLoad, Tile};
use crate::Result;
use std::sync::Arc;

/// Creates cache entries for missing tiles. Must never block: the returned
/// tile is usually still `Requested` and completes in the background.
pub trait TileFactory {
    fn create(&mut self, coord: TileCoord) -> Option<Tile>;
}

impl<F> TileFactory for F
where
    F: FnMut(TileCoord) -> Option<Tile>,
{
    fn create(&mut self, coord: TileCoord) -> Option<Tile> {
        self(coord)
    }
}

/// A named source and how to decode it
pub struct SourceSpec {
    pub name: String,
    pub kind: SourceKind,
    pub source: Box<dyn TileSource>,
}

impl SourceSpec {
    pub fn new(name: impl Into<String>, kind: SourceKind, source: Box<dyn TileSource>) -> Self {
        Self {
            name: name.into(),
            kind,
            source,
        }
    }
}

/// Requests every configured source of a tile from the background loader
pub struct RemoteTileFactory {
    sources: Vec<SourceSpec>,
    loader: TileLoader,
    tile_size: u32,
}

impl RemoteTileFactory {
    pub fn new(sources: Vec<SourceSpec>, loader: TileLoader, tile_size: u32) -> Self {
        Self {
            sources,
            loader,
            tile_size,
        }
    }

    /// URL-template sources from `options`, loaded through `fetcher`
    pub fn from_options(options: &MapOptions, fetcher: Arc<dyn Fetch>) -> Result<Self> {
        let sources = options
            .sources
            .iter()
            .map(|s| {
                let template = UrlTemplateSource::new(s.tiles.clone())
                    .with_token(options.token.clone())
                    .with_tile_size(options.tile_size);
                SourceSpec::new(s.name.clone(), s.kind, Box::new(template))
            })
            .collect();
        let loader = TileLoader::new(fetcher, &options.loader)?;
        Ok(Self::new(sources, loader, options.tile_size))
    }

    pub fn add_source(&mut self, spec: SourceSpec) {
        self.sources.push(spec);
    }

    pub fn num_sources(&self) -> usize {
        self.sources.len()
    }

    pub fn loader(&self) -> &TileLoader {
        &self.loader
    }
}

impl TileFactory for RemoteTileFactory {
    fn create(&mut self, coord: TileCoord) -> Option<Tile> {
        if self.sources.is_empty() {
            return None;
        }
        let mut pending = PendingLoad::new();
        for spec in &self.sources {
            let url = spec.source.url(coord);
            log::debug!("request tile {} from {}", coord, url);
            let receiver = self
                .loader
                .submit(coord, url, spec.kind, self.tile_size, pending.cancel_flag());
            pending.push(spec.name.clone(), receiver);
        }
        Some(Tile::requested(coord, pending))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::{LoaderOptions, SourceOptions};
    use crate::data::mvt::tests::{encode, layer, point_feature};
    use crate::tiles::tile::{LoadState, SourceData};
    use crate::MapError;
    use image::{ImageOutputFormat, Rgba, RgbaImage};
    use std::io::Cursor;
    use std::sync::Mutex;
    use std::time::{Duration, Instant};

    fn png_bytes() -> Vec<u8> {
        let mut out = Cursor::new(Vec::new());
        RgbaImage::from_pixel(4, 4, Rgba([5, 6, 7, 255]))
            .write_to(&mut out, ImageOutputFormat::Png)
            .unwrap();
        out.into_inner()
    }

    fn wait_for(tile: &mut Tile) -> LoadState {
        let deadline = Instant::now() + Duration::from_secs(5);
        while tile.poll() == LoadState::Requested && Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(5));
        }
        tile.state()
    }

    fn options() -> MapOptions {
        MapOptions {
            sources: vec![
                SourceOptions::raster("satellite", "sat://{z}/{x}/{y}?key={token}"),
                SourceOptions::vector("streets", "mvt://{z}/{x}/{y}"),
            ],
            token: Some("secret".into()),
            tile_size: 4,
            width: 8,
            height: 4,
            loader: LoaderOptions::for_testing(),
            ..MapOptions::default()
        }
    }

    #[test]
    fn test_multi_source_tile_loads() {
        let urls = Arc::new(Mutex::new(Vec::new()));
        let seen = Arc::clone(&urls);
        let fetcher: Arc<dyn Fetch> = Arc::new(move |url: &str| -> Result<Vec<u8>> {
            seen.lock().unwrap().push(url.to_string());
            if url.starts_with("sat://") {
                Ok(png_bytes())
            } else {
                Ok(encode(vec![layer("poi", vec![point_feature(100, 100)])]))
            }
        });

        let mut factory = RemoteTileFactory::from_options(&options(), fetcher).unwrap();
        assert_eq!(factory.num_sources(), 2);
        let mut tile = factory.create(TileCoord::new(1, 0, 1)).unwrap();
        assert_eq!(wait_for(&mut tile), LoadState::Loaded);

        let payload = tile.payload().unwrap();
        assert!(matches!(payload.source("satellite"), Some(SourceData::Raster(_))));
        assert_eq!(payload.vector_layer("streets", "poi").unwrap().len(), 1);

        let mut urls = urls.lock().unwrap().clone();
        urls.sort();
        assert_eq!(urls, vec!["mvt://1/1/0", "sat://1/1/0?key=secret"]);
    }

    #[test]
    fn test_one_failed_source_fails_tile() {
        let fetcher: Arc<dyn Fetch> = Arc::new(|url: &str| -> Result<Vec<u8>> {
            if url.starts_with("sat://") {
                Ok(png_bytes())
            } else {
                Err(MapError::Http {
                    status: 404,
                    url: url.to_string(),
                })
            }
        });
        let mut factory = RemoteTileFactory::from_options(&options(), fetcher).unwrap();
        let mut tile = factory.create(TileCoord::new(0, 0, 0)).unwrap();
        assert_eq!(wait_for(&mut tile), LoadState::Failed);
    }

    #[test]
    fn test_closure_factory() {
        let mut created = Vec::new();
        let mut factory = |coord: TileCoord| {
            created.push(coord);
            None::<Tile>
        };
        assert!(factory.create(TileCoord::new(0, 0, 0)).is_none());
        drop(factory);
        assert_eq!(created, vec![TileCoord::new(0, 0, 0)]);
    }
}
