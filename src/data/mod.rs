use crate::vector::{LineString, Lod, VectorLayers};
use anyhow::{Context, Result};
use geojson::{GeoJson, Geometry, Value};
use std::fs;
use std::path::Path;
use tracing::{info, warn};

/// Everything loaded from the data directory: overlays for the vector
/// layers plus the land and lake polygons feeding the colour mask.
#[derive(Default)]
pub struct MapData {
    pub layers: VectorLayers,
    pub land: Vec<LineString>,
    pub lakes: Vec<LineString>,
}

/// Load all available Natural Earth GeoJSON data. Missing files are
/// skipped; files that fail to parse are logged and skipped.
pub fn load_all_geojson(data_dir: &Path) -> MapData {
    let mut data = MapData::default();

    // Load coastlines at each resolution
    let coastline_files = [
        ("ne_110m_coastline.json", Lod::Low),
        ("ne_50m_coastline.json", Lod::Medium),
        ("ne_10m_coastline.json", Lod::High),
    ];
    for (filename, lod) in coastline_files {
        load_optional(data_dir, filename, |geojson| {
            for_each_line(geojson, |line| data.layers.add_coastline(line, lod));
        });
    }

    // Load borders
    let border_files = [
        ("ne_50m_borders.json", Lod::Medium),
        ("ne_10m_borders.json", Lod::High),
    ];
    for (filename, lod) in border_files {
        load_optional(data_dir, filename, |geojson| {
            for_each_line(geojson, |line| data.layers.add_border(line, lod));
        });
    }

    // Polygons for the land/water mask
    load_optional(data_dir, "ne_110m_land.json", |geojson| {
        for_each_line(geojson, |ring| data.land.push(ring));
    });
    load_optional(data_dir, "ne_110m_lakes.json", |geojson| {
        for_each_line(geojson, |ring| data.lakes.push(ring));
    });

    load_optional(data_dir, "ne_10m_cities.json", |geojson| {
        add_cities(&mut data.layers, geojson);
    });

    info!(
        coastlines = data.layers.coastlines_low.len()
            + data.layers.coastlines_medium.len()
            + data.layers.coastlines_high.len(),
        land = data.land.len(),
        lakes = data.lakes.len(),
        cities = data.layers.cities.len(),
        "map data loaded"
    );
    data
}

fn load_optional(data_dir: &Path, filename: &str, add: impl FnOnce(&GeoJson)) {
    let path = data_dir.join(filename);
    if !path.exists() {
        return;
    }
    match read_geojson(&path) {
        Ok(geojson) => add(&geojson),
        Err(e) => warn!("failed to load {filename}: {e:#}"),
    }
}

/// Parse a GeoJSON file with simd-json.
pub fn read_geojson(path: &Path) -> Result<GeoJson> {
    let mut bytes = fs::read(path).with_context(|| format!("reading {}", path.display()))?;
    let geojson = simd_json::serde::from_slice::<GeoJson>(&mut bytes)
        .with_context(|| format!("parsing {}", path.display()))?;
    Ok(geojson)
}

/// Add cities from a point feature collection
fn add_cities(layers: &mut VectorLayers, geojson: &GeoJson) {
    let GeoJson::FeatureCollection(fc) = geojson else {
        return;
    };

    for feature in &fc.features {
        let props = feature.properties.as_ref();

        let name = props
            .and_then(|p| p.get("name"))
            .and_then(|v| v.as_str())
            .unwrap_or("Unknown");

        // Get population (try multiple fields)
        let population = props
            .and_then(|p| {
                p.get("pop_max")
                    .or_else(|| p.get("pop_min"))
                    .or_else(|| p.get("population"))
            })
            .and_then(|v| v.as_f64())
            .map(|v| v as u64)
            .unwrap_or(0);

        if let Some(Value::Point(coords)) = feature.geometry.as_ref().map(|g| &g.value) {
            if coords.len() >= 2 {
                layers.add_city(coords[0], coords[1], name, population);
            }
        }
    }
}

/// Visit every line of a GeoJSON document; polygons yield their exterior
/// ring.
fn for_each_line<F>(geojson: &GeoJson, mut add_line: F)
where
    F: FnMut(LineString),
{
    match geojson {
        GeoJson::FeatureCollection(fc) => {
            for feature in &fc.features {
                if let Some(ref geometry) = feature.geometry {
                    geometry_lines(geometry, &mut add_line);
                }
            }
        }
        GeoJson::Feature(f) => {
            if let Some(ref geometry) = f.geometry {
                geometry_lines(geometry, &mut add_line);
            }
        }
        GeoJson::Geometry(geometry) => {
            geometry_lines(geometry, &mut add_line);
        }
    }
}

fn geometry_lines<F>(geometry: &Geometry, add_line: &mut F)
where
    F: FnMut(LineString),
{
    match &geometry.value {
        Value::LineString(coords) => add_line(to_line(coords)),
        Value::MultiLineString(lines) => {
            for coords in lines {
                add_line(to_line(coords));
            }
        }
        Value::Polygon(rings) => {
            if let Some(exterior) = rings.first() {
                add_line(to_line(exterior));
            }
        }
        Value::MultiPolygon(polygons) => {
            for rings in polygons {
                if let Some(exterior) = rings.first() {
                    add_line(to_line(exterior));
                }
            }
        }
        Value::GeometryCollection(geometries) => {
            for g in geometries {
                geometry_lines(g, add_line);
            }
        }
        _ => {}
    }
}

fn to_line(coords: &[Vec<f64>]) -> LineString {
    coords.iter().map(|c| (c[0], c[1])).collect()
}

/// Generate a simple world for when no data file is available. The
/// continent outlines are closed rings, used both as coastlines and as
/// land polygons.
pub fn generate_simple_world(data: &mut MapData) {
    let continents: [&[(f64, f64)]; 6] = [
        // North America
        &[
            (-168.0, 65.0), (-166.0, 60.0), (-141.0, 60.0), (-130.0, 55.0),
            (-125.0, 48.0), (-124.0, 40.0), (-117.0, 32.0), (-110.0, 25.0),
            (-97.0, 25.0), (-97.0, 28.0), (-82.0, 24.0), (-80.0, 25.0),
            (-81.0, 31.0), (-75.0, 35.0), (-70.0, 41.0), (-67.0, 45.0),
            (-65.0, 47.0), (-55.0, 47.0), (-52.0, 47.0), (-55.0, 52.0),
            (-58.0, 55.0), (-64.0, 60.0), (-73.0, 62.0), (-80.0, 63.0),
            (-95.0, 62.0), (-110.0, 68.0), (-130.0, 70.0), (-145.0, 70.0),
            (-168.0, 65.0),
        ],
        // South America
        &[
            (-80.0, 10.0), (-75.0, 5.0), (-70.0, 5.0), (-60.0, 5.0),
            (-50.0, 0.0), (-35.0, -5.0), (-35.0, -10.0), (-38.0, -15.0),
            (-40.0, -22.0), (-48.0, -25.0), (-55.0, -34.0), (-58.0, -38.0),
            (-65.0, -42.0), (-68.0, -50.0), (-75.0, -52.0), (-75.0, -45.0),
            (-72.0, -40.0), (-72.0, -30.0), (-70.0, -20.0), (-70.0, -15.0),
            (-80.0, -5.0), (-80.0, 0.0), (-80.0, 10.0),
        ],
        // Europe
        &[
            (-10.0, 36.0), (-5.0, 36.0), (0.0, 38.0), (5.0, 43.0),
            (10.0, 44.0), (15.0, 45.0), (20.0, 40.0), (25.0, 37.0),
            (30.0, 40.0), (35.0, 42.0), (40.0, 43.0), (40.0, 55.0),
            (30.0, 60.0), (25.0, 65.0), (20.0, 70.0), (10.0, 71.0),
            (5.0, 62.0), (5.0, 58.0), (-5.0, 58.0), (-10.0, 52.0),
            (-5.0, 48.0), (-5.0, 43.0), (-10.0, 36.0),
        ],
        // Africa
        &[
            (-17.0, 15.0), (-17.0, 20.0), (-15.0, 28.0), (-5.0, 35.0),
            (10.0, 37.0), (20.0, 33.0), (25.0, 32.0), (35.0, 30.0),
            (35.0, 20.0), (42.0, 12.0), (50.0, 12.0), (45.0, 5.0),
            (40.0, -5.0), (35.0, -20.0), (35.0, -25.0), (30.0, -30.0),
            (20.0, -35.0), (18.0, -35.0), (15.0, -30.0), (10.0, -15.0),
            (10.0, 0.0), (5.0, 5.0), (-5.0, 5.0), (-10.0, 5.0),
            (-15.0, 10.0), (-17.0, 15.0),
        ],
        // Asia
        &[
            (35.0, 42.0), (40.0, 43.0), (50.0, 40.0), (55.0, 37.0),
            (60.0, 25.0), (65.0, 25.0), (70.0, 20.0), (75.0, 15.0),
            (80.0, 8.0), (80.0, 15.0), (88.0, 22.0), (92.0, 22.0),
            (95.0, 16.0), (100.0, 14.0), (105.0, 10.0), (110.0, 20.0),
            (115.0, 22.0), (120.0, 22.0), (122.0, 25.0), (125.0, 30.0),
            (130.0, 35.0), (135.0, 35.0), (140.0, 40.0), (145.0, 45.0),
            (145.0, 50.0), (140.0, 55.0), (135.0, 55.0), (130.0, 52.0),
            (130.0, 43.0), (120.0, 40.0), (110.0, 45.0), (90.0, 50.0),
            (70.0, 55.0), (60.0, 55.0), (50.0, 50.0), (40.0, 43.0),
            (35.0, 42.0),
        ],
        // Australia
        &[
            (115.0, -20.0), (120.0, -18.0), (130.0, -12.0), (140.0, -12.0),
            (145.0, -15.0), (150.0, -25.0), (153.0, -30.0), (150.0, -35.0),
            (145.0, -38.0), (140.0, -38.0), (135.0, -35.0), (130.0, -32.0),
            (125.0, -32.0), (115.0, -35.0), (115.0, -25.0), (115.0, -20.0),
        ],
    ];

    for ring in continents {
        data.layers.add_coastline(ring.to_vec(), Lod::Low);
        data.land.push(ring.to_vec());
    }

    // Major cities with populations
    let cities = [
        (-74.0, 40.7, "New York", 18_800_000),
        (-0.1, 51.5, "London", 9_000_000),
        (2.3, 48.9, "Paris", 11_000_000),
        (139.7, 35.7, "Tokyo", 37_400_000),
        (151.2, -33.9, "Sydney", 5_300_000),
        (-43.2, -22.9, "Rio", 13_500_000),
        (37.6, 55.8, "Moscow", 12_500_000),
        (116.4, 39.9, "Beijing", 21_500_000),
        (77.2, 28.6, "Delhi", 32_900_000),
        (-118.2, 34.0, "Los Angeles", 12_400_000),
        (-77.0, 38.9, "Washington", 5_300_000),
        (-99.1, 19.4, "Mexico City", 21_800_000),
        (-58.4, -34.6, "Buenos Aires", 15_000_000),
    ];
    for (lon, lat, name, population) in cities {
        data.layers.add_city(lon, lat, name, population);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn scratch_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("globe-render-{name}-{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn test_simple_world_rings_are_closed() {
        let mut data = MapData::default();
        generate_simple_world(&mut data);
        assert_eq!(data.land.len(), 6);
        assert!(data.layers.has_data());
        for ring in &data.land {
            assert_eq!(ring.first(), ring.last());
        }
    }

    #[test]
    fn test_load_coastlines_land_and_cities() {
        let dir = scratch_dir("load");
        fs::write(
            dir.join("ne_110m_coastline.json"),
            r#"{"type":"FeatureCollection","features":[
                {"type":"Feature","properties":{},"geometry":{"type":"MultiLineString",
                 "coordinates":[[[0,0],[10,0]],[[20,5],[30,5],[40,5]]]}}]}"#,
        )
        .unwrap();
        fs::write(
            dir.join("ne_110m_land.json"),
            r#"{"type":"Polygon","coordinates":[[[0,0],[10,0],[10,10],[0,0]],[[2,2],[3,2],[3,3],[2,2]]]}"#,
        )
        .unwrap();
        fs::write(
            dir.join("ne_10m_cities.json"),
            r#"{"type":"FeatureCollection","features":[
                {"type":"Feature","properties":{"name":"Lyon","pop_max":1700000},
                 "geometry":{"type":"Point","coordinates":[4.8,45.8]}}]}"#,
        )
        .unwrap();

        let data = load_all_geojson(&dir);
        assert_eq!(data.layers.coastlines_low.len(), 2);
        assert_eq!(data.layers.coastlines_low[1].len(), 3);
        assert_eq!(data.land.len(), 1);
        assert_eq!(data.land[0].len(), 4);
        assert_eq!(data.layers.cities.len(), 1);
        assert_eq!(data.layers.cities[0].name, "Lyon");
        assert_eq!(data.layers.cities[0].population, 1_700_000);

        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_broken_file_is_skipped() {
        let dir = scratch_dir("broken");
        fs::write(dir.join("ne_50m_borders.json"), "{ not json").unwrap();

        let data = load_all_geojson(&dir);
        assert!(data.layers.borders_medium.is_empty());
        assert!(read_geojson(&dir.join("ne_50m_borders.json")).is_err());

        fs::remove_dir_all(&dir).ok();
    }
}
