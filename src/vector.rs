//! Vector overlays drawn on top of the texture: coastlines, borders, a
//! graticule and city markers, at a level of detail picked from the zoom.

use std::f64::consts::{PI, TAU};

use crate::clip::{ClipPainter, LabelPositionFlags};
use crate::geo::wrap_longitude;
use crate::geometry::Point;
use crate::paint::{rgb, FillRule, Painter, Pen, RasterPainter};
use crate::projection::Viewport;

/// A geographic line (sequence of lon/lat coordinates in degrees)
pub type LineString = Vec<(f64, f64)>;

/// Level of detail for map data
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Lod {
    Low,    // 110m - world view
    Medium, // 50m - continental
    High,   // 10m - regional
}

impl Lod {
    /// Select LOD based on zoom level
    pub fn from_zoom(zoom: f64) -> Self {
        if zoom < 2.0 {
            Lod::Low
        } else if zoom < 8.0 {
            Lod::Medium
        } else {
            Lod::High
        }
    }
}

/// Globe radius relative to the radius that shows the whole world.
pub fn zoom_level(viewport: &Viewport) -> f64 {
    let world = Viewport::world(viewport.projection, viewport.width, viewport.height);
    viewport.radius as f64 / world.radius.max(1) as f64
}

/// A city marker with position, name, and population
#[derive(Clone, Debug)]
pub struct City {
    pub lon: f64,
    pub lat: f64,
    pub name: String,
    pub population: u64,
}

/// Text to show next to a screen position.
#[derive(Clone, Debug, PartialEq)]
pub struct Label {
    pub x: f64,
    pub y: f64,
    pub text: String,
}

/// Display settings for map layers
#[derive(Clone, Debug)]
pub struct LayerSettings {
    pub show_coastlines: bool,
    pub show_borders: bool,
    pub show_graticule: bool,
    pub show_cities: bool,
    pub show_labels: bool,
}

impl Default for LayerSettings {
    fn default() -> Self {
        Self {
            show_coastlines: true,
            show_borders: true,
            show_graticule: false,
            show_cities: true,
            show_labels: true,
        }
    }
}

const COASTLINE_PEN: Pen = Pen {
    color: rgb(230, 230, 210),
    width: 1.0,
};
const BORDER_PEN: Pen = Pen {
    color: rgb(200, 120, 120),
    width: 1.0,
};
const GRATICULE_PEN: Pen = Pen {
    color: rgb(90, 110, 140),
    width: 1.0,
};
const CITY_BRUSH: u32 = rgb(255, 220, 90);

/// Degrees between graticule lines.
const GRATICULE_STEP: i32 = 30;

/// Screen polylines of a geographic line. The line is split where it goes
/// out of sight or jumps across the seam of a cylindrical map.
pub fn screen_polylines(viewport: &Viewport, line: &[(f64, f64)]) -> Vec<Vec<Point>> {
    let seam = viewport
        .projection
        .is_cylindrical()
        .then(|| PI * viewport.rad2pixel());

    let mut pieces = Vec::new();
    let mut current: Vec<Point> = Vec::new();
    let mut flush = |current: &mut Vec<Point>| {
        if current.len() >= 2 {
            pieces.push(std::mem::take(current));
        } else {
            current.clear();
        }
    };

    for &(lon, lat) in line {
        match viewport.screen_coordinates(lon.to_radians(), lat.to_radians()) {
            Some(point) => {
                let jumps = match (seam, current.last()) {
                    (Some(limit), Some(last)) => (point.x - last.x).abs() > limit,
                    _ => false,
                };
                if jumps {
                    flush(&mut current);
                }
                current.push(point);
            }
            None => flush(&mut current),
        }
    }
    flush(&mut current);
    pieces
}

/// Screen polygons of a geographic ring. Cylindrical maps repeat
/// horizontally, so the ring comes back once per visible copy of the world;
/// on the azimuthal maps the hidden part is folded onto the disc border.
pub fn screen_polygons(viewport: &Viewport, ring: &[(f64, f64)]) -> Vec<Vec<Point>> {
    if ring.len() < 3 {
        return Vec::new();
    }

    if !viewport.projection.is_cylindrical() {
        let hidden = ring.iter().all(|&(lon, lat)| {
            viewport
                .screen_coordinates(lon.to_radians(), lat.to_radians())
                .is_none()
        });
        if hidden {
            return Vec::new();
        }
        let polygon = ring
            .iter()
            .map(|&(lon, lat)| {
                viewport.screen_coordinates_on_disc(lon.to_radians(), lat.to_radians())
            })
            .collect();
        return vec![polygon];
    }

    // Unwrap longitudes so the ring stays in one piece.
    let k = viewport.rad2pixel();
    let (first_lon, first_lat) = ring[0];
    let Some(first) = viewport.screen_coordinates(first_lon.to_radians(), first_lat.to_radians())
    else {
        return Vec::new();
    };
    let mut polygon = Vec::with_capacity(ring.len());
    polygon.push(first);
    let mut x = first.x;
    let mut prev_lon = first_lon.to_radians();
    for &(lon, lat) in &ring[1..] {
        let lon = lon.to_radians();
        x += wrap_longitude(lon - prev_lon) * k;
        prev_lon = lon;
        if let Some(point) = viewport.screen_coordinates(lon, lat.to_radians()) {
            polygon.push(Point::new(x, point.y));
        }
    }

    let world_width = TAU * k;
    let (min_x, max_x) = polygon
        .iter()
        .fold((f64::MAX, f64::MIN), |(lo, hi), p| (lo.min(p.x), hi.max(p.x)));
    let first_copy = (-max_x / world_width).ceil() as i64;
    let last_copy = ((viewport.width as f64 - min_x) / world_width).floor() as i64;

    (first_copy..=last_copy)
        .map(|copy| {
            let dx = copy as f64 * world_width;
            polygon.iter().map(|p| Point::new(p.x + dx, p.y)).collect()
        })
        .collect()
}

/// Vector layers with multi-resolution coastline data
#[derive(Default)]
pub struct VectorLayers {
    pub coastlines_low: Vec<LineString>,
    pub coastlines_medium: Vec<LineString>,
    pub coastlines_high: Vec<LineString>,
    pub borders_medium: Vec<LineString>,
    pub borders_high: Vec<LineString>,
    pub cities: Vec<City>,
    pub settings: LayerSettings,
}

impl VectorLayers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Coastlines for the given LOD, falling back to coarser data
    fn coastlines(&self, lod: Lod) -> &[LineString] {
        match lod {
            Lod::High if !self.coastlines_high.is_empty() => &self.coastlines_high,
            Lod::High | Lod::Medium if !self.coastlines_medium.is_empty() => {
                &self.coastlines_medium
            }
            _ => &self.coastlines_low,
        }
    }

    /// Borders for the given LOD
    fn borders(&self, lod: Lod) -> &[LineString] {
        match lod {
            Lod::High if !self.borders_high.is_empty() => &self.borders_high,
            _ => &self.borders_medium,
        }
    }

    /// Visible cities based on zoom level (filter by population)
    fn visible_cities(&self, zoom: f64) -> impl Iterator<Item = &City> {
        let min_pop = if zoom > 15.0 {
            0
        } else if zoom > 6.0 {
            200_000
        } else if zoom > 2.0 {
            1_000_000
        } else {
            5_000_000
        };

        self.cities.iter().filter(move |c| c.population >= min_pop)
    }

    /// Draw all enabled layers and return the labels to show.
    pub fn render(
        &self,
        painter: &mut ClipPainter<RasterPainter>,
        viewport: &Viewport,
    ) -> Vec<Label> {
        let zoom = zoom_level(viewport);
        let lod = Lod::from_zoom(zoom);
        let mut labels = Vec::new();

        if self.settings.show_graticule {
            painter.painter_mut().set_pen(Some(GRATICULE_PEN));
            labels.extend(self.draw_graticule(painter, viewport));
        }

        if self.settings.show_coastlines {
            painter.painter_mut().set_pen(Some(COASTLINE_PEN));
            for line in self.coastlines(lod) {
                draw_linestring(painter, viewport, line);
            }
        }

        if self.settings.show_borders && lod != Lod::Low {
            painter.painter_mut().set_pen(Some(BORDER_PEN));
            for line in self.borders(lod) {
                draw_linestring(painter, viewport, line);
            }
        }

        if self.settings.show_cities {
            painter.painter_mut().set_pen(None);
            painter.painter_mut().set_brush(Some(CITY_BRUSH));
            let radius = if zoom > 6.0 { 2.0 } else { 1.0 };
            let (width, height) = painter.device_size();

            for city in self.visible_cities(zoom) {
                let Some(p) =
                    viewport.screen_coordinates(city.lon.to_radians(), city.lat.to_radians())
                else {
                    continue;
                };
                if p.x < 0.0 || p.y < 0.0 || p.x >= width as f64 || p.y >= height as f64 {
                    continue;
                }

                let marker = [
                    Point::new(p.x - radius, p.y - radius),
                    Point::new(p.x + radius, p.y - radius),
                    Point::new(p.x + radius, p.y + radius),
                    Point::new(p.x - radius, p.y + radius),
                ];
                painter.draw_polygon(&marker, FillRule::OddEven);

                if self.settings.show_labels {
                    labels.push(Label {
                        x: p.x + radius + 2.0,
                        y: p.y,
                        text: city.name.clone(),
                    });
                }
            }
            painter.painter_mut().set_brush(None);
        }

        labels
    }

    /// Parallels and meridians; parallels are labelled where they enter
    /// and leave the view.
    fn draw_graticule(
        &self,
        painter: &mut ClipPainter<RasterPainter>,
        viewport: &Viewport,
    ) -> Vec<Label> {
        let mut labels = Vec::new();

        for lat in (-90 + GRATICULE_STEP..90).step_by(GRATICULE_STEP as usize) {
            let parallel: LineString = (-180..=180)
                .step_by(2)
                .map(|lon| (lon as f64, lat as f64))
                .collect();
            let text = match lat {
                0 => "0°".to_string(),
                lat if lat > 0 => format!("{lat}°N"),
                lat => format!("{}°S", -lat),
            };
            for piece in screen_polylines(viewport, &parallel) {
                let anchors = painter.draw_polyline_with_labels(&piece, LabelPositionFlags::start_and_end());
                if self.settings.show_labels {
                    labels.extend(anchors.into_iter().map(|p| Label {
                        x: p.x,
                        y: p.y,
                        text: text.clone(),
                    }));
                }
            }
        }

        for lon in (-180..180).step_by(GRATICULE_STEP as usize) {
            let meridian: LineString = (-90..=90)
                .step_by(2)
                .map(|lat| (lon as f64, lat as f64))
                .collect();
            draw_linestring(painter, viewport, &meridian);
        }

        labels
    }

    /// Add coastline data at a specific LOD
    pub fn add_coastline(&mut self, line: LineString, lod: Lod) {
        match lod {
            Lod::Low => self.coastlines_low.push(line),
            Lod::Medium => self.coastlines_medium.push(line),
            Lod::High => self.coastlines_high.push(line),
        }
    }

    /// Add border data at a specific LOD
    pub fn add_border(&mut self, line: LineString, lod: Lod) {
        match lod {
            Lod::High => self.borders_high.push(line),
            Lod::Low | Lod::Medium => self.borders_medium.push(line),
        }
    }

    /// Add a city marker
    pub fn add_city(&mut self, lon: f64, lat: f64, name: &str, population: u64) {
        self.cities.push(City {
            lon,
            lat,
            name: name.to_string(),
            population,
        });
    }

    /// Check if any data is loaded
    pub fn has_data(&self) -> bool {
        !self.coastlines_low.is_empty()
            || !self.coastlines_medium.is_empty()
            || !self.coastlines_high.is_empty()
    }

    pub fn toggle_borders(&mut self) {
        self.settings.show_borders = !self.settings.show_borders;
    }

    pub fn toggle_graticule(&mut self) {
        self.settings.show_graticule = !self.settings.show_graticule;
    }

    pub fn toggle_cities(&mut self) {
        self.settings.show_cities = !self.settings.show_cities;
    }

    pub fn toggle_labels(&mut self) {
        self.settings.show_labels = !self.settings.show_labels;
    }
}

/// Draw a linestring through the clip painter
fn draw_linestring(painter: &mut ClipPainter<RasterPainter>, viewport: &Viewport, line: &[(f64, f64)]) {
    if line.len() < 2 {
        return;
    }
    for piece in screen_polylines(viewport, line) {
        painter.draw_polyline(&piece);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::paint::red;
    use crate::projection::Projection;

    fn painter(width: usize, height: usize) -> ClipPainter<RasterPainter> {
        ClipPainter::new(RasterPainter::new(width, height), true)
    }

    #[test]
    fn test_lod_from_zoom() {
        assert_eq!(Lod::from_zoom(1.0), Lod::Low);
        assert_eq!(Lod::from_zoom(4.0), Lod::Medium);
        assert_eq!(Lod::from_zoom(20.0), Lod::High);
    }

    #[test]
    fn test_zoom_level_of_world_view() {
        let viewport = Viewport::world(Projection::Equirectangular, 200, 100);
        assert!((zoom_level(&viewport) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_polyline_split_at_seam() {
        let viewport = Viewport::world(Projection::Equirectangular, 360, 180);
        let line = vec![(170.0, 0.0), (179.0, 0.0), (-179.0, 0.0), (-170.0, 0.0)];
        let pieces = screen_polylines(&viewport, &line);
        assert_eq!(pieces.len(), 2);
        assert_eq!(pieces[0].len(), 2);
    }

    #[test]
    fn test_polyline_split_behind_globe() {
        let viewport = Viewport::new(Projection::Spherical, 0.0, 0.0, 50, 200, 200);
        let line = vec![
            (0.0, 0.0),
            (45.0, 0.0),
            (135.0, 0.0),
            (180.0, 0.0),
            (-135.0, 0.0),
            (-45.0, 0.0),
            (-10.0, 0.0),
        ];
        let pieces = screen_polylines(&viewport, &line);
        assert_eq!(pieces.len(), 2);
    }

    #[test]
    fn test_polygon_across_the_seam_stays_whole() {
        let viewport = Viewport::world(Projection::Equirectangular, 360, 180);
        let ring = vec![(170.0, 10.0), (-170.0, 10.0), (-170.0, -10.0), (170.0, -10.0)];
        let polygons = screen_polygons(&viewport, &ring);
        // One copy reaching past the right edge, one past the left.
        assert_eq!(polygons.len(), 2);
        for polygon in &polygons {
            let width = polygon.iter().map(|p| p.x).fold(f64::MIN, f64::max)
                - polygon.iter().map(|p| p.x).fold(f64::MAX, f64::min);
            assert!((width - 20.0).abs() < 1e-9);
        }
    }

    #[test]
    fn test_hidden_polygon_is_dropped() {
        let viewport = Viewport::new(Projection::Spherical, 0.0, 0.0, 50, 200, 200);
        let ring = vec![(170.0, 10.0), (-170.0, 10.0), (-170.0, -10.0), (170.0, -10.0)];
        assert!(screen_polygons(&viewport, &ring).is_empty());
        let front = vec![(-10.0, 10.0), (10.0, 10.0), (10.0, -10.0), (-10.0, -10.0)];
        assert_eq!(screen_polygons(&viewport, &front).len(), 1);
    }

    #[test]
    fn test_render_draws_coastlines() {
        let viewport = Viewport::world(Projection::Equirectangular, 360, 180);
        let mut layers = VectorLayers::new();
        layers.add_coastline(vec![(-90.0, 0.0), (90.0, 0.0)], Lod::Low);
        layers.settings.show_cities = false;
        let mut painter = painter(360, 180);
        layers.render(&mut painter, &viewport);
        assert_eq!(red(painter.painter().canvas().pixel(180, 90)), 230);
        assert_eq!(painter.painter().canvas().pixel(180, 40), 0);
    }

    #[test]
    fn test_city_labels_follow_zoom() {
        let mut viewport = Viewport::world(Projection::Equirectangular, 360, 180);
        let mut layers = VectorLayers::new();
        layers.add_city(2.3, 48.9, "Paris", 11_000_000);
        layers.add_city(4.9, 52.4, "Amsterdam", 900_000);

        let labels = layers.render(&mut painter(360, 180), &viewport);
        assert_eq!(labels.len(), 1);
        assert_eq!(labels[0].text, "Paris");

        viewport.radius *= 8;
        viewport.center_lon = 4.9f64.to_radians();
        viewport.center_lat = 52.4f64.to_radians();
        let labels = layers.render(&mut painter(360, 180), &viewport);
        assert!(labels.iter().any(|l| l.text == "Amsterdam"));
    }

    #[test]
    fn test_graticule_labels() {
        let viewport = Viewport::world(Projection::Equirectangular, 360, 180);
        let mut layers = VectorLayers::new();
        layers.settings.show_graticule = true;
        let labels = layers.render(&mut painter(360, 180), &viewport);
        assert!(labels.iter().any(|l| l.text == "30°N"));
        assert!(labels.iter().any(|l| l.text == "0°"));
    }
}
