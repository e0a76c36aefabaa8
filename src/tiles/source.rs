use crate::core::geo::TileCoord;

/// Trait representing anything that can produce tile URLs for a given coordinate.
pub trait TileSource: Send + Sync {
    /// Build a URL for the requested `coord`.
    fn url(&self, coord: TileCoord) -> String;
}

/// Substitutes `{z}`, `{x}`, `{y}`, `{token}` and `{size}` in a template
#[derive(Debug, Clone, PartialEq)]
pub struct UrlTemplateSource {
    template: String,
    token: Option<String>,
    tile_size: u32,
}

impl UrlTemplateSource {
    pub fn new(template: impl Into<String>) -> Self {
        Self {
            template: template.into(),
            token: None,
            tile_size: crate::core::constants::TILE_SIZE,
        }
    }

    pub fn with_token(mut self, token: Option<String>) -> Self {
        self.token = token;
        self
    }

    pub fn with_tile_size(mut self, tile_size: u32) -> Self {
        self.tile_size = tile_size;
        self
    }

    pub fn template(&self) -> &str {
        &self.template
    }
}

impl TileSource for UrlTemplateSource {
    fn url(&self, coord: TileCoord) -> String {
        self.template
            .replace("{z}", &coord.z.to_string())
            .replace("{x}", &coord.x.to_string())
            .replace("{y}", &coord.y.to_string())
            .replace("{size}", &self.tile_size.to_string())
            .replace("{token}", self.token.as_deref().unwrap_or(""))
    }
}

/// Builds URLs by calling a closure with the tile id `z/x/y`
pub struct FnSource<F> {
    get_url: F,
}

impl<F> FnSource<F>
where
    F: Fn(&str) -> String + Send + Sync,
{
    pub fn new(get_url: F) -> Self {
        Self { get_url }
    }
}

impl<F> TileSource for FnSource<F>
where
    F: Fn(&str) -> String + Send + Sync,
{
    fn url(&self, coord: TileCoord) -> String {
        (self.get_url)(&coord.id())
    }
}
