//! Mapbox Vector Tile decoding
//!
//! The protobuf messages are declared with `prost` derives; geometry command
//! streams are decoded here into [`Feature`]s whose coordinates are scaled
//! from the layer extent to tile pixels.

use crate::core::constants::MVT_DEFAULT_EXTENT;
use crate::data::feature::{Feature, FeatureCollection, Geometry, Position};
use crate::{MapError, Result};
use fxhash::FxHashMap;
use prost::Message;

/// Decoded layers of one tile, keyed by layer name
pub type VectorLayers = FxHashMap<String, FeatureCollection>;

const CMD_MOVE_TO: u32 = 1;
const CMD_LINE_TO: u32 = 2;
const CMD_CLOSE_PATH: u32 = 7;

#[derive(Clone, PartialEq, prost::Message)]
pub(crate) struct VectorTile {
    #[prost(message, repeated, tag = "3")]
    pub layers: Vec<VectorTileLayer>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub(crate) struct VectorTileLayer {
    #[prost(string, required, tag = "1")]
    pub name: String,
    #[prost(message, repeated, tag = "2")]
    pub features: Vec<VectorTileFeature>,
    #[prost(string, repeated, tag = "3")]
    pub keys: Vec<String>,
    #[prost(message, repeated, tag = "4")]
    pub values: Vec<VectorTileValue>,
    #[prost(uint32, optional, tag = "5")]
    pub extent: Option<u32>,
    #[prost(uint32, required, tag = "15")]
    pub version: u32,
}

#[derive(Clone, PartialEq, prost::Message)]
pub(crate) struct VectorTileFeature {
    #[prost(uint64, optional, tag = "1")]
    pub id: Option<u64>,
    #[prost(uint32, repeated, tag = "2")]
    pub tags: Vec<u32>,
    #[prost(enumeration = "GeomType", optional, tag = "3")]
    pub geometry_type: Option<i32>,
    #[prost(uint32, repeated, tag = "4")]
    pub geometry: Vec<u32>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub(crate) struct VectorTileValue {
    #[prost(string, optional, tag = "1")]
    pub string_value: Option<String>,
    #[prost(float, optional, tag = "2")]
    pub float_value: Option<f32>,
    #[prost(double, optional, tag = "3")]
    pub double_value: Option<f64>,
    #[prost(int64, optional, tag = "4")]
    pub int_value: Option<i64>,
    #[prost(uint64, optional, tag = "5")]
    pub uint_value: Option<u64>,
    #[prost(sint64, optional, tag = "6")]
    pub sint_value: Option<i64>,
    #[prost(bool, optional, tag = "7")]
    pub bool_value: Option<bool>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, prost::Enumeration)]
#[repr(i32)]
pub(crate) enum GeomType {
    Unknown = 0,
    Point = 1,
    LineString = 2,
    Polygon = 3,
}

/// Decode a vector tile into layers of features in `[0, tile_size]` pixels
pub fn decode(bytes: &[u8], tile_size: u32) -> Result<VectorLayers> {
    let tile = VectorTile::decode(bytes)?;
    let mut layers = VectorLayers::default();

    for layer in tile.layers {
        let extent = layer.extent.unwrap_or(MVT_DEFAULT_EXTENT);
        if extent == 0 {
            return Err(MapError::Decode(format!("layer {:?} has zero extent", layer.name)));
        }
        let scale = f64::from(tile_size) / f64::from(extent);

        let mut features = Vec::with_capacity(layer.features.len());
        for feature in &layer.features {
            let paths = decode_paths(&feature.geometry, scale)?;
            let kind = feature
                .geometry_type
                .and_then(|t| GeomType::try_from(t).ok())
                .unwrap_or(GeomType::Unknown);
            let Some(geometry) = build_geometry(kind, paths) else {
                continue;
            };
            features.push(Feature {
                id: feature.id,
                geometry,
                properties: decode_properties(&layer, feature),
            });
        }

        layers.insert(layer.name, FeatureCollection::new(features));
    }

    Ok(layers)
}

fn decode_zigzag(value: u32) -> i32 {
    ((value >> 1) as i32) ^ -((value & 1) as i32)
}

/// Run the command stream, returning one path per MoveTo. ClosePath repeats
/// the first vertex of the current path.
fn decode_paths(commands: &[u32], scale: f64) -> Result<Vec<Vec<Position>>> {
    let mut paths: Vec<Vec<Position>> = Vec::new();
    let mut path: Vec<Position> = Vec::new();
    let (mut x, mut y) = (0i32, 0i32);
    let mut cursor = 0usize;

    while cursor < commands.len() {
        let command = commands[cursor];
        cursor += 1;
        let id = command & 0x7;
        let count = (command >> 3) as usize;

        match id {
            CMD_MOVE_TO | CMD_LINE_TO => {
                if cursor + 2 * count > commands.len() {
                    return Err(MapError::Decode(format!(
                        "geometry truncated: command {id} wants {count} points"
                    )));
                }
                for _ in 0..count {
                    x = x.wrapping_add(decode_zigzag(commands[cursor]));
                    y = y.wrapping_add(decode_zigzag(commands[cursor + 1]));
                    cursor += 2;
                    if id == CMD_MOVE_TO && !path.is_empty() {
                        paths.push(std::mem::take(&mut path));
                    }
                    path.push([f64::from(x) * scale, f64::from(y) * scale]);
                }
            }
            CMD_CLOSE_PATH => {
                if let Some(first) = path.first().copied() {
                    path.push(first);
                }
            }
            _ => return Err(MapError::Decode(format!("unknown geometry command {id}"))),
        }
    }

    if !path.is_empty() {
        paths.push(path);
    }
    Ok(paths)
}

/// Shoelace sum over a ring in y-down tile coordinates
fn signed_area(ring: &[Position]) -> f64 {
    ring.windows(2)
        .map(|w| (w[1][0] - w[0][0]) * (w[0][1] + w[1][1]))
        .sum()
}

/// Group rings into polygons. The winding of the first ring marks
/// exteriors; rings with the opposite winding are holes of the latest one.
fn classify_rings(rings: Vec<Vec<Position>>) -> Vec<Vec<Vec<Position>>> {
    let mut polygons: Vec<Vec<Vec<Position>>> = Vec::new();
    let mut exterior_ccw: Option<bool> = None;

    for ring in rings {
        let area = signed_area(&ring);
        if area == 0.0 {
            continue;
        }
        let ccw = area < 0.0;
        let is_exterior = match exterior_ccw {
            None => {
                exterior_ccw = Some(ccw);
                true
            }
            Some(outer) => outer == ccw,
        };
        match polygons.last_mut() {
            Some(polygon) if !is_exterior => polygon.push(ring),
            _ => polygons.push(vec![ring]),
        }
    }
    polygons
}

fn build_geometry(kind: GeomType, mut paths: Vec<Vec<Position>>) -> Option<Geometry> {
    match kind {
        GeomType::Point => {
            let mut points: Vec<Position> = paths.into_iter().flatten().collect();
            match points.len() {
                0 => None,
                1 => points.pop().map(|coordinates| Geometry::Point { coordinates }),
                _ => Some(Geometry::MultiPoint { coordinates: points }),
            }
        }
        GeomType::LineString => match paths.len() {
            0 => None,
            1 => paths.pop().map(|coordinates| Geometry::LineString { coordinates }),
            _ => Some(Geometry::MultiLineString { coordinates: paths }),
        },
        GeomType::Polygon => {
            let mut polygons = classify_rings(paths);
            match polygons.len() {
                0 => None,
                1 => polygons.pop().map(|coordinates| Geometry::Polygon { coordinates }),
                _ => Some(Geometry::MultiPolygon {
                    coordinates: polygons,
                }),
            }
        }
        GeomType::Unknown => None,
    }
}

fn value_to_json(value: &VectorTileValue) -> serde_json::Value {
    if let Some(v) = &value.string_value {
        return v.clone().into();
    }
    if let Some(v) = value.bool_value {
        return v.into();
    }
    if let Some(v) = value.int_value.or(value.sint_value) {
        return v.into();
    }
    if let Some(v) = value.uint_value {
        return v.into();
    }
    if let Some(v) = value.double_value.or(value.float_value.map(f64::from)) {
        return serde_json::Number::from_f64(v).map_or(serde_json::Value::Null, Into::into);
    }
    serde_json::Value::Null
}

fn decode_properties(
    layer: &VectorTileLayer,
    feature: &VectorTileFeature,
) -> serde_json::Map<String, serde_json::Value> {
    let mut properties = serde_json::Map::new();
    for pair in feature.tags.chunks_exact(2) {
        let (Some(key), Some(value)) = (
            layer.keys.get(pair[0] as usize),
            layer.values.get(pair[1] as usize),
        ) else {
            continue;
        };
        properties.insert(key.clone(), value_to_json(value));
    }
    properties
}
