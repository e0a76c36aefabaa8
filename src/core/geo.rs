use crate::core::constants::MAX_MERCATOR_LATITUDE;
use crate::{MapError, Result};
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;
use std::fmt;
use std::str::FromStr;

/// Represents a geographical coordinate with latitude and longitude in degrees
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatLng {
    pub lat: f64,
    pub lng: f64,
}

impl LatLng {
    /// Creates a new LatLng coordinate
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    /// Validates that the coordinates are within valid ranges
    pub fn is_valid(&self) -> bool {
        self.lat >= -90.0 && self.lat <= 90.0 && self.lng >= -180.0 && self.lng <= 180.0
    }

    /// Clamps latitude to the range Web Mercator can represent
    pub fn clamp_lat(lat: f64) -> f64 {
        lat.clamp(-MAX_MERCATOR_LATITUDE, MAX_MERCATOR_LATITUDE)
    }

    /// Projects to normalized Web Mercator space: x = 0 at -180°, x = 1 at
    /// +180°, y = 0 at the northern limit and y = 1 at the southern limit.
    pub fn to_normalized(&self) -> Point {
        Point::new(lng_to_x(self.lng), lat_to_y(self.lat))
    }

    /// Inverse of [`LatLng::to_normalized`]
    pub fn from_normalized(point: Point) -> Self {
        let lng = (point.x - 0.5) * 360.0;
        let lat = (2.0 * ((0.5 - point.y) * 2.0 * PI).exp().atan() - PI / 2.0).to_degrees();
        Self::new(lat, lng)
    }
}

impl Default for LatLng {
    fn default() -> Self {
        Self::new(0.0, 0.0)
    }
}

/// Longitude in degrees to normalized Web Mercator x
pub fn lng_to_x(lng: f64) -> f64 {
    0.5 + lng / 360.0
}

/// Latitude in degrees to normalized Web Mercator y, clipped to `[0, 1]`
pub fn lat_to_y(lat: f64) -> f64 {
    let clipped = LatLng::clamp_lat(lat).to_radians();
    let y = 0.5 - 0.5 / PI * (PI / 4.0 + clipped / 2.0).tan().ln();
    y.clamp(0.0, 1.0)
}

/// Represents a point in normalized, local or pixel coordinates
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn subtract(&self, other: &Point) -> Point {
        Point::new(self.x - other.x, self.y - other.y)
    }

    /// Component-wise scaling
    pub fn scale(&self, sx: f64, sy: f64) -> Point {
        Point::new(self.x * sx, self.y * sy)
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

impl Default for Point {
    fn default() -> Self {
        Self::new(0.0, 0.0)
    }
}

impl From<[f64; 2]> for Point {
    fn from(p: [f64; 2]) -> Self {
        Point::new(p[0], p[1])
    }
}

/// Tile coordinates for tile-based maps
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TileCoord {
    pub x: u32,
    pub y: u32,
    pub z: u8,
}

impl TileCoord {
    pub fn new(x: u32, y: u32, z: u8) -> Self {
        Self { x, y, z }
    }

    /// Number of tiles along one axis at this zoom
    pub fn tiles_at_zoom(&self) -> u64 {
        1u64 << self.z
    }

    /// Gets the parent tile coordinate
    pub fn parent(&self) -> Option<TileCoord> {
        if self.z == 0 {
            None
        } else {
            Some(TileCoord::new(self.x / 2, self.y / 2, self.z - 1))
        }
    }

    /// Which quadrant of the parent this tile occupies, as `(x % 2, y % 2)`
    pub fn quadrant(&self) -> (u32, u32) {
        (self.x % 2, self.y % 2)
    }

    /// Checks if the tile coordinate is valid for its zoom
    pub fn is_valid(&self) -> bool {
        u64::from(self.x) < self.tiles_at_zoom() && u64::from(self.y) < self.tiles_at_zoom()
    }

    /// The `z/x/y` identifier used by URL templates and callbacks
    pub fn id(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for TileCoord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.z, self.x, self.y)
    }
}

impl FromStr for TileCoord {
    type Err = MapError;

    fn from_str(s: &str) -> Result<Self> {
        let bad = || MapError::InvalidCoordinates(format!("expected z/x/y, got {s:?}"));
        let mut parts = s.split('/');
        let z = parts.next().and_then(|p| p.parse::<u8>().ok()).ok_or_else(bad)?;
        let x = parts.next().and_then(|p| p.parse::<u32>().ok()).ok_or_else(bad)?;
        let y = parts.next().and_then(|p| p.parse::<u32>().ok()).ok_or_else(bad)?;
        if parts.next().is_some() {
            return Err(bad());
        }
        let coord = TileCoord::new(x, y, z);
        if !coord.is_valid() {
            return Err(MapError::InvalidCoordinates(format!(
                "tile {coord} outside a {0}x{0} grid",
                coord.tiles_at_zoom()
            )));
        }
        Ok(coord)
    }
}

/// Wraps an integer tile index into `[0, n)`
pub fn wrap(value: i64, n: i64) -> i64 {
    value.rem_euclid(n)
}

/// Wraps a normalized coordinate into `[0, 1)`
pub fn wrap_unit(value: f64) -> f64 {
    let wrapped = value.rem_euclid(1.0);
    if wrapped >= 1.0 {
        0.0
    } else {
        wrapped
    }
}

/// Rounds half-way cases towards positive infinity
pub fn round_half_up(value: f64) -> f64 {
    (value + 0.5).floor()
}
