//! GeoJSON-like features decoded from vector tiles.
//!
//! Coordinates are tile-local pixels while a feature sits in the cache, and
//! normalized Web Mercator once it has been handed out by selection.

use geo_types::{Coord, LineString, MultiPolygon, Polygon};
use serde::{Deserialize, Serialize};

pub type Position = [f64; 2];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Geometry {
    Point {
        coordinates: Position,
    },
    MultiPoint {
        coordinates: Vec<Position>,
    },
    LineString {
        coordinates: Vec<Position>,
    },
    MultiLineString {
        coordinates: Vec<Vec<Position>>,
    },
    Polygon {
        coordinates: Vec<Vec<Position>>,
    },
    MultiPolygon {
        coordinates: Vec<Vec<Vec<Position>>>,
    },
}

impl Geometry {
    /// Point and MultiPoint geometries
    pub fn is_point_like(&self) -> bool {
        matches!(self, Geometry::Point { .. } | Geometry::MultiPoint { .. })
    }

    /// All vertices of a point-like geometry
    pub fn points(&self) -> &[Position] {
        match self {
            Geometry::Point { coordinates } => std::slice::from_ref(coordinates),
            Geometry::MultiPoint { coordinates } => coordinates,
            _ => &[],
        }
    }

    /// Apply `f` to every vertex in place
    pub fn map_coords(&mut self, f: impl Fn(Position) -> Position) {
        let apply = |p: &mut Position| *p = f(*p);
        match self {
            Geometry::Point { coordinates } => apply(coordinates),
            Geometry::MultiPoint { coordinates } | Geometry::LineString { coordinates } => {
                coordinates.iter_mut().for_each(apply)
            }
            Geometry::MultiLineString { coordinates } | Geometry::Polygon { coordinates } => {
                coordinates.iter_mut().flatten().for_each(apply)
            }
            Geometry::MultiPolygon { coordinates } => {
                coordinates.iter_mut().flatten().flatten().for_each(apply)
            }
        }
    }

    /// Convert polygonal geometries for `geo` predicates
    pub fn to_multi_polygon(&self) -> Option<MultiPolygon<f64>> {
        match self {
            Geometry::Polygon { coordinates } => Some(MultiPolygon::new(vec![to_polygon(coordinates)])),
            Geometry::MultiPolygon { coordinates } => Some(MultiPolygon::new(
                coordinates.iter().map(|rings| to_polygon(rings)).collect(),
            )),
            _ => None,
        }
    }
}

fn to_line_string(ring: &[Position]) -> LineString<f64> {
    LineString::new(ring.iter().map(|p| Coord { x: p[0], y: p[1] }).collect())
}

fn to_polygon(rings: &[Vec<Position>]) -> Polygon<f64> {
    let mut rings = rings.iter().map(|r| to_line_string(r));
    let exterior = rings.next().unwrap_or_else(|| LineString::new(Vec::new()));
    Polygon::new(exterior, rings.collect())
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Feature {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<u64>,
    pub geometry: Geometry,
    #[serde(default)]
    pub properties: serde_json::Map<String, serde_json::Value>,
}

impl Feature {
    pub fn new(geometry: Geometry) -> Self {
        Self {
            id: None,
            geometry,
            properties: serde_json::Map::new(),
        }
    }

    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    pub fn property(&self, key: &str) -> Option<&serde_json::Value> {
        self.properties.get(key)
    }
}

/// Features of one vector tile layer
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FeatureCollection {
    pub features: Vec<Feature>,
}

impl FeatureCollection {
    pub fn new(features: Vec<Feature>) -> Self {
        Self { features }
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_geojson_shape() {
        let feature = Feature::new(Geometry::Point {
            coordinates: [1.0, 2.0],
        })
        .with_property("name", "peak");
        let json = serde_json::to_value(&feature).unwrap();
        assert_eq!(json["geometry"]["type"], "Point");
        assert_eq!(json["geometry"]["coordinates"][1], 2.0);
        assert_eq!(json["properties"]["name"], "peak");

        let parsed: Feature = serde_json::from_value(json).unwrap();
        assert_eq!(parsed, feature);
    }

    #[test]
    fn test_map_coords_touches_every_vertex() {
        let mut geometry = Geometry::MultiPolygon {
            coordinates: vec![vec![
                vec![[0.0, 0.0], [2.0, 0.0], [2.0, 2.0], [0.0, 0.0]],
                vec![[0.5, 0.5], [1.0, 0.5], [1.0, 1.0], [0.5, 0.5]],
            ]],
        };
        geometry.map_coords(|[x, y]| [x + 10.0, y * 2.0]);
        match &geometry {
            Geometry::MultiPolygon { coordinates } => {
                assert_eq!(coordinates[0][0][1], [12.0, 0.0]);
                assert_eq!(coordinates[0][1][2], [11.0, 2.0]);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_to_multi_polygon() {
        let square = Geometry::Polygon {
            coordinates: vec![vec![[0.0, 0.0], [4.0, 0.0], [4.0, 4.0], [0.0, 4.0], [0.0, 0.0]]],
        };
        let mp = square.to_multi_polygon().unwrap();
        assert_eq!(mp.0.len(), 1);
        assert!(Geometry::LineString { coordinates: vec![] }.to_multi_polygon().is_none());
    }
}
