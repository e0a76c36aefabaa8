//! Pixel to feature hit-testing against the tiles currently on screen.

use crate::core::grid::TileGrid;
use crate::data::feature::{Feature, FeatureCollection};
use geo::Intersects;
use geo_types::Coord;

/// Find the feature of `source`/`layer` under canvas pixel `(px, py)`.
///
/// Point-like features win if one lies within `threshold` display pixels;
/// otherwise the first polygon containing the pixel (edges included) is
/// returned. The result is a copy with every coordinate reprojected from
/// tile pixels to normalized Web Mercator.
pub fn select(
    grid: &TileGrid,
    tile_size: u32,
    px: f64,
    py: f64,
    threshold: f64,
    source: &str,
    layer: &str,
) -> Option<Feature> {
    if !(px.is_finite() && py.is_finite()) || px < 0.0 || py < 0.0 {
        return None;
    }
    let size = f64::from(tile_size);
    let ix = (px / size).floor();
    let iy = (py / size).floor();
    let tile_box = grid.tile_box(ix as u32, iy as u32)?;
    let collection = tile_box.payload.vector_layer(source, layer)?;

    // Ancestor crops cover a fraction of their tile
    let frac = tile_box.sw / size;
    let tile_x = (px - ix * size) * frac + tile_box.sx;
    let tile_y = (py - iy * size) * frac + tile_box.sy;

    let hit = find_nearest_point(collection, tile_x, tile_y, threshold * frac)
        .or_else(|| find_containing_polygon(collection, tile_x, tile_y))?;

    let mut feature = hit.clone();
    let n = (1u64 << tile_box.coord.z) as f64;
    let (tx, ty) = (f64::from(tile_box.coord.x), f64::from(tile_box.coord.y));
    feature
        .geometry
        .map_coords(|[x, y]| [(tx + x / size) / n, (ty + y / size) / n]);
    Some(feature)
}

fn find_nearest_point(collection: &FeatureCollection, x: f64, y: f64, threshold: f64) -> Option<&Feature> {
    let mut nearest: Option<(&Feature, f64)> = None;
    for feature in collection.features.iter().filter(|f| f.geometry.is_point_like()) {
        for p in feature.geometry.points() {
            let distance = (p[0] - x).hypot(p[1] - y);
            if nearest.map_or(true, |(_, best)| distance < best) {
                nearest = Some((feature, distance));
            }
        }
    }
    nearest
        .filter(|(_, distance)| *distance <= threshold)
        .map(|(feature, _)| feature)
}

fn find_containing_polygon(collection: &FeatureCollection, x: f64, y: f64) -> Option<&Feature> {
    let pixel = Coord { x, y };
    collection.features.iter().find(|f| {
        f.geometry
            .to_multi_polygon()
            .map_or(false, |polygons| polygons.intersects(&pixel))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::geo::TileCoord;
    use crate::data::feature::Geometry;
    use crate::data::mvt::VectorLayers;
    use crate::tiles::tile::{SourceData, TileBox, TilePayload};
    use image::RgbaImage;
    use std::sync::Arc;

    const SIZE: u32 = 512;

    fn payload() -> TilePayload {
        let features = vec![
            Feature::new(Geometry::Point {
                coordinates: [100.0, 100.0],
            })
            .with_property("name", "a"),
            Feature::new(Geometry::Point {
                coordinates: [300.0, 300.0],
            })
            .with_property("name", "b"),
            Feature::new(Geometry::Polygon {
                coordinates: vec![
                    vec![[0.0, 400.0], [200.0, 400.0], [200.0, 512.0], [0.0, 512.0], [0.0, 400.0]],
                    vec![[50.0, 450.0], [100.0, 450.0], [100.0, 500.0], [50.0, 500.0], [50.0, 450.0]],
                ],
            })
            .with_property("name", "park"),
        ];
        let mut layers = VectorLayers::default();
        layers.insert("poi".to_string(), FeatureCollection::new(features));
        TilePayload::new().with_source("streets", SourceData::Vector(layers))
    }

    fn grid_with(coord: TileCoord, sx: f64, sy: f64, sw: f64) -> TileGrid {
        let mut grid = TileGrid::new(2, 1);
        let tile_box = TileBox {
            coord,
            image: Arc::new(RgbaImage::new(1, 1)),
            payload: Arc::new(payload()),
            sx,
            sy,
            sw,
        };
        grid.record(1, 0, tile_box, 0);
        grid
    }

    fn name(feature: &Feature) -> &str {
        feature.property("name").and_then(|v| v.as_str()).unwrap_or("")
    }

    #[test]
    fn test_selects_nearest_point_and_reprojects() {
        let grid = grid_with(TileCoord::new(3, 1, 2), 0.0, 0.0, 512.0);
        let feature = select(&grid, SIZE, 512.0 + 104.0, 97.0, 10.0, "streets", "poi").unwrap();
        assert_eq!(name(&feature), "a");
        match feature.geometry {
            Geometry::Point { coordinates } => {
                let expected = [(3.0 + 100.0 / 512.0) / 4.0, (1.0 + 100.0 / 512.0) / 4.0];
                assert!((coordinates[0] - expected[0]).abs() < 1e-12);
                assert!((coordinates[1] - expected[1]).abs() < 1e-12);
            }
            other => panic!("expected point, got {other:?}"),
        }
    }

    #[test]
    fn test_threshold_rejects_far_points() {
        let grid = grid_with(TileCoord::new(3, 1, 2), 0.0, 0.0, 512.0);
        assert!(select(&grid, SIZE, 512.0 + 200.0, 200.0, 10.0, "streets", "poi").is_none());
    }

    #[test]
    fn test_polygon_hit_excludes_holes() {
        let grid = grid_with(TileCoord::new(0, 0, 1), 0.0, 0.0, 512.0);
        let park = select(&grid, SIZE, 512.0 + 150.0, 420.0, 1.0, "streets", "poi").unwrap();
        assert_eq!(name(&park), "park");
        // Edge counts as inside
        assert!(select(&grid, SIZE, 512.0 + 200.0, 450.0, 1.0, "streets", "poi").is_some());
        // Inside the hole
        assert!(select(&grid, SIZE, 512.0 + 75.0, 475.0, 1.0, "streets", "poi").is_none());
    }

    #[test]
    fn test_ancestor_crop_scales_pixel_and_threshold() {
        // Cell shows the top-left quarter of a z=1 tile, magnified 2x
        let grid = grid_with(TileCoord::new(0, 0, 1), 0.0, 0.0, 256.0);
        // Display pixel (200, 200) maps to tile pixel (100, 100)
        let feature = select(&grid, SIZE, 512.0 + 200.0, 200.0, 2.0, "streets", "poi").unwrap();
        assert_eq!(name(&feature), "a");
        // 8 display pixels away is 4 tile pixels; threshold 6 display -> 3 tile
        assert!(select(&grid, SIZE, 512.0 + 208.0, 200.0, 6.0, "streets", "poi").is_none());
    }

    #[test]
    fn test_cached_feature_is_not_mutated() {
        let grid = grid_with(TileCoord::new(3, 1, 2), 0.0, 0.0, 512.0);
        select(&grid, SIZE, 512.0 + 100.0, 100.0, 1.0, "streets", "poi").unwrap();
        let cached = grid.tile_box(1, 0).unwrap().payload.vector_layer("streets", "poi").unwrap();
        assert_eq!(
            cached.features[0].geometry,
            Geometry::Point {
                coordinates: [100.0, 100.0]
            }
        );
    }

    #[test]
    fn test_missing_cell_source_or_layer() {
        let grid = grid_with(TileCoord::new(3, 1, 2), 0.0, 0.0, 512.0);
        assert!(select(&grid, SIZE, 10.0, 10.0, 5.0, "streets", "poi").is_none());
        assert!(select(&grid, SIZE, 612.0, 100.0, 5.0, "satellite", "poi").is_none());
        assert!(select(&grid, SIZE, 612.0, 100.0, 5.0, "streets", "roads").is_none());
        assert!(select(&grid, SIZE, -1.0, 100.0, 5.0, "streets", "poi").is_none());
    }
}
