//! Map projections and the viewport description the renderers read.

mod azimuthal;
pub mod math;

pub use azimuthal::{lonlat_to_vec3, AzimuthalFrame};

use std::f64::consts::PI;

use crate::geo::{clamp_latitude, wrap_longitude};
use crate::geometry::Point;
use math::{gd, gd_inv_exact};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Projection {
    Equirectangular,
    Mercator,
    Gnomonic,
    Stereographic,
    /// Orthographic view of the globe.
    Spherical,
}

impl Projection {
    pub const ALL: [Projection; 5] = [
        Projection::Equirectangular,
        Projection::Mercator,
        Projection::Gnomonic,
        Projection::Stereographic,
        Projection::Spherical,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Projection::Equirectangular => "equirect",
            Projection::Mercator => "mercator",
            Projection::Gnomonic => "gnomonic",
            Projection::Stereographic => "stereographic",
            Projection::Spherical => "spherical",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|p| p.name().eq_ignore_ascii_case(name.trim()))
    }

    /// The next projection in [`Projection::ALL`], wrapping around.
    pub fn next(self) -> Self {
        let index = Self::ALL.iter().position(|&p| p == self).unwrap_or(0);
        Self::ALL[(index + 1) % Self::ALL.len()]
    }

    /// Cylindrical projections repeat horizontally.
    pub fn is_cylindrical(self) -> bool {
        matches!(self, Projection::Equirectangular | Projection::Mercator)
    }

    /// Radius of the projected disc in globe radii.
    pub fn clipping_radius(self) -> f64 {
        match self {
            Projection::Gnomonic => 3.0,
            Projection::Stereographic => 2.0,
            _ => 1.0,
        }
    }

    pub fn max_lat(self) -> f64 {
        match self {
            // Where the Mercator map turns square.
            Projection::Mercator => gd(PI),
            _ => PI / 2.0,
        }
    }

    pub fn min_lat(self) -> f64 {
        -self.max_lat()
    }
}

/// Rendering quality. Higher levels sample more exactly and more slowly.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum MapQuality {
    /// Interpolated and interlaced: every second row is a copy.
    Low,
    #[default]
    Normal,
    /// Bilinear sampling.
    High,
    /// Bilinear sampling of every single pixel.
    Print,
}

impl MapQuality {
    pub const ALL: [MapQuality; 4] = [
        MapQuality::Low,
        MapQuality::Normal,
        MapQuality::High,
        MapQuality::Print,
    ];

    pub fn name(self) -> &'static str {
        match self {
            MapQuality::Low => "low",
            MapQuality::Normal => "normal",
            MapQuality::High => "high",
            MapQuality::Print => "print",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|q| q.name().eq_ignore_ascii_case(name.trim()))
    }

    pub fn next(self) -> Self {
        let index = Self::ALL.iter().position(|&q| q == self).unwrap_or(0);
        Self::ALL[(index + 1) % Self::ALL.len()]
    }

    pub fn is_bilinear(self) -> bool {
        self >= MapQuality::High
    }
}

/// What the map looks at and how. Angles are radians.
#[derive(Clone, Debug, PartialEq)]
pub struct Viewport {
    pub projection: Projection,
    pub center_lon: f64,
    pub center_lat: f64,
    /// Globe radius in pixels.
    pub radius: i32,
    pub width: usize,
    pub height: usize,
    pub quality: MapQuality,
}

impl Viewport {
    pub fn new(
        projection: Projection,
        center_lon: f64,
        center_lat: f64,
        radius: i32,
        width: usize,
        height: usize,
    ) -> Self {
        Self {
            projection,
            center_lon: wrap_longitude(center_lon),
            center_lat: center_lat.clamp(projection.min_lat(), projection.max_lat()),
            radius: radius.max(1),
            width,
            height,
            quality: MapQuality::default(),
        }
    }

    /// Whole world in view.
    pub fn world(projection: Projection, width: usize, height: usize) -> Self {
        let radius = if projection.is_cylindrical() {
            (width / 4).min(height / 2)
        } else {
            width.min(height) / 2
        };
        Self::new(projection, 0.0, 0.0, radius as i32, width, height)
    }

    pub fn with_quality(mut self, quality: MapQuality) -> Self {
        self.quality = quality;
        self
    }

    pub fn size(&self) -> (usize, usize) {
        (self.width, self.height)
    }

    pub fn set_size(&mut self, width: usize, height: usize) {
        self.width = width;
        self.height = height;
    }

    pub fn set_projection(&mut self, projection: Projection) {
        self.projection = projection;
        self.center_lat = self
            .center_lat
            .clamp(projection.min_lat(), projection.max_lat());
    }

    /// Pixels per radian along the equator of the cylindrical projections.
    #[inline]
    pub fn rad2pixel(&self) -> f64 {
        2.0 * self.radius as f64 / PI
    }

    fn half_size(&self) -> (f64, f64) {
        (self.width as f64 / 2.0, self.height as f64 / 2.0)
    }

    /// Whether the projected map fills every pixel of the viewport.
    pub fn map_covers_viewport(&self) -> bool {
        let (half_width, half_height) = self.half_size();
        if self.projection.is_cylindrical() {
            let top = self.cylindrical_y(self.projection.max_lat());
            let bottom = self.cylindrical_y(self.projection.min_lat());
            top <= 0.0 && bottom >= self.height as f64
        } else {
            let clip_radius = self.radius as f64 * self.projection.clipping_radius();
            clip_radius * clip_radius >= half_width * half_width + half_height * half_height
        }
    }

    fn cylindrical_y(&self, lat: f64) -> f64 {
        let (_, half_height) = self.half_size();
        let k = self.rad2pixel();
        match self.projection {
            Projection::Mercator => {
                let lat = lat.clamp(Projection::Mercator.min_lat(), Projection::Mercator.max_lat());
                half_height - (gd_inv_exact(lat) - gd_inv_exact(self.center_lat)) * k
            }
            _ => half_height - (lat - self.center_lat) * k,
        }
    }

    /// Screen position of a geographic point, `None` when it is hidden
    /// (back side of the globe).
    pub fn screen_coordinates(&self, lon: f64, lat: f64) -> Option<Point> {
        let (half_width, half_height) = self.half_size();
        if self.projection.is_cylindrical() {
            let x = half_width + wrap_longitude(lon - self.center_lon) * self.rad2pixel();
            return Some(Point::new(x, self.cylindrical_y(lat)));
        }

        let frame = AzimuthalFrame::new(self.center_lon, self.center_lat);
        let (x, y) = frame.project(self.projection, lon, lat)?;
        let r = self.radius as f64;
        Some(Point::new(half_width + x * r, half_height - y * r))
    }

    /// Screen position of a geographic point; hidden points of the
    /// azimuthal projections are moved onto the border of the disc.
    pub fn screen_coordinates_on_disc(&self, lon: f64, lat: f64) -> Point {
        if let Some(point) = self.screen_coordinates(lon, lat) {
            return point;
        }
        let (half_width, half_height) = self.half_size();
        let (x, y) = AzimuthalFrame::new(self.center_lon, self.center_lat).project_onto_disc(
            self.projection,
            lon,
            lat,
        );
        let r = self.radius as f64;
        Point::new(half_width + x * r, half_height - y * r)
    }

    /// Geographic position under a screen pixel, `None` off the map.
    pub fn geo_coordinates(&self, x: f64, y: f64) -> Option<(f64, f64)> {
        let (half_width, half_height) = self.half_size();
        if self.projection.is_cylindrical() {
            let k = self.rad2pixel();
            let lon = wrap_longitude(self.center_lon + (x - half_width) / k);
            let lat = match self.projection {
                Projection::Mercator => {
                    let mercator_y = gd_inv_exact(self.center_lat) + (half_height - y) / k;
                    if mercator_y.abs() > PI {
                        return None;
                    }
                    gd(mercator_y)
                }
                _ => self.center_lat + (half_height - y) / k,
            };
            if lat.abs() > PI / 2.0 {
                return None;
            }
            return Some((lon, lat));
        }

        let r = self.radius as f64;
        AzimuthalFrame::new(self.center_lon, self.center_lat).unproject(
            self.projection,
            (x - half_width) / r,
            (half_height - y) / r,
        )
    }

    /// Move the view by a pixel delta; positive `dx` looks further east.
    pub fn pan(&mut self, dx: f64, dy: f64) {
        let scale = if self.projection.is_cylindrical() {
            self.rad2pixel()
        } else {
            self.radius as f64
        };
        self.center_lon = wrap_longitude(self.center_lon + dx / scale);
        self.center_lat = clamp_latitude(self.center_lat - dy / scale)
            .clamp(self.projection.min_lat(), self.projection.max_lat());
    }

    pub fn zoom_in(&mut self) {
        self.radius = ((self.radius as f64 * 1.5) as i32).min(MAX_RADIUS);
    }

    pub fn zoom_out(&mut self) {
        self.radius = ((self.radius as f64 / 1.5) as i32).max(MIN_RADIUS);
    }
}

const MIN_RADIUS: i32 = 8;
const MAX_RADIUS: i32 = 1 << 20;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_center_maps_to_screen_center() {
        for projection in Projection::ALL {
            let vp = Viewport::new(projection, 0.4, 0.3, 100, 400, 200);
            let p = vp.screen_coordinates(0.4, 0.3).unwrap();
            assert!((p.x - 200.0).abs() < 1e-9, "{projection:?}");
            assert!((p.y - 100.0).abs() < 1e-9, "{projection:?}");
        }
    }

    #[test]
    fn test_geo_round_trip() {
        for projection in Projection::ALL {
            let vp = Viewport::new(projection, -0.2, 0.1, 120, 300, 300);
            let (lon, lat) = vp.geo_coordinates(170.0, 130.0).unwrap();
            let p = vp.screen_coordinates(lon, lat).unwrap();
            assert!((p.x - 170.0).abs() < 1e-6, "{projection:?}");
            assert!((p.y - 130.0).abs() < 1e-6, "{projection:?}");
        }
    }

    #[test]
    fn test_mercator_center_pixel() {
        let vp = Viewport::new(Projection::Mercator, 0.0, 0.0, 100, 400, 400);
        let (lon, lat) = vp.geo_coordinates(200.0, 200.0).unwrap();
        assert!(lon.abs() < 1e-12);
        assert!(lat.abs() < 1e-12);
    }

    #[test]
    fn test_covers_viewport() {
        let small = Viewport::new(Projection::Spherical, 0.0, 0.0, 50, 400, 300);
        assert!(!small.map_covers_viewport());
        let big = Viewport::new(Projection::Spherical, 0.0, 0.0, 500, 400, 300);
        assert!(big.map_covers_viewport());

        let world = Viewport::world(Projection::Equirectangular, 400, 200);
        assert!(world.map_covers_viewport());
        let tall = Viewport::new(Projection::Equirectangular, 0.0, 0.0, 50, 400, 400);
        assert!(!tall.map_covers_viewport());
    }

    #[test]
    fn test_pan_wraps_longitude() {
        let mut vp = Viewport::world(Projection::Equirectangular, 400, 200);
        vp.pan(vp.rad2pixel() * 4.0, 0.0);
        assert!(vp.center_lon >= -PI && vp.center_lon < PI);
    }

    #[test]
    fn test_projection_names() {
        for projection in Projection::ALL {
            assert_eq!(Projection::from_name(projection.name()), Some(projection));
        }
        assert_eq!(MapQuality::from_name("HIGH"), Some(MapQuality::High));
        assert_eq!(Projection::Spherical.next(), Projection::Equirectangular);
    }
}
