use std::sync::Arc;

use super::generic::{disc_rect, paint_disc, InverseProjection};
use super::{CanvasCache, RenderPool, TextureMapper};
use crate::geo::wrap_longitude;
use crate::paint::PixelRect;
use crate::projection::{Projection, Viewport};
use crate::tile::TileLoader;

/// Closed form inverse gnomonic projection.
struct GnomonicInverse {
    center_lon: f64,
    center_lat: f64,
    sin_lat: f64,
    cos_lat: f64,
    radius: f64,
    half_width: f64,
    half_height: f64,
}

impl GnomonicInverse {
    fn new(viewport: &Viewport) -> Self {
        let (sin_lat, cos_lat) = viewport.center_lat.sin_cos();
        Self {
            center_lon: viewport.center_lon,
            center_lat: viewport.center_lat,
            sin_lat,
            cos_lat,
            radius: viewport.radius as f64,
            half_width: viewport.width as f64 / 2.0,
            half_height: viewport.height as f64 / 2.0,
        }
    }
}

impl InverseProjection for GnomonicInverse {
    #[inline]
    fn geo_coordinates(&self, x: f64, y: f64) -> Option<(f64, f64)> {
        let px = (x - self.half_width) / self.radius;
        let py = (self.half_height - y) / self.radius;
        let rho = px.hypot(py);
        if rho > Projection::Gnomonic.clipping_radius() {
            return None;
        }
        if rho < 1e-12 {
            return Some((self.center_lon, self.center_lat));
        }

        let (sin_c, cos_c) = rho.atan().sin_cos();
        let lat = (cos_c * self.sin_lat + py * sin_c * self.cos_lat / rho)
            .clamp(-1.0, 1.0)
            .asin();
        let lon = self.center_lon
            + (px * sin_c).atan2(rho * self.cos_lat * cos_c - py * self.sin_lat * sin_c);
        Some((wrap_longitude(lon), lat))
    }
}

/// Gnomonic texture mapper: great circles become straight lines.
pub struct GnomonicScanlineTextureMapper {
    tile_loader: Arc<dyn TileLoader>,
    pool: Arc<RenderPool>,
    cache: CanvasCache,
}

impl GnomonicScanlineTextureMapper {
    pub fn new(tile_loader: Arc<dyn TileLoader>, pool: Arc<RenderPool>) -> Self {
        Self {
            tile_loader,
            pool,
            cache: CanvasCache::new(),
        }
    }
}

impl TextureMapper for GnomonicScanlineTextureMapper {
    fn canvas_cache(&self) -> &CanvasCache {
        &self.cache
    }

    fn canvas_cache_mut(&mut self) -> &mut CanvasCache {
        &mut self.cache
    }

    fn tile_loader(&self) -> &Arc<dyn TileLoader> {
        &self.tile_loader
    }

    fn render(&mut self, viewport: &Viewport, tile_level: u32) {
        paint_disc(
            &self.pool,
            self.cache.canvas_mut(),
            &self.tile_loader,
            viewport,
            tile_level,
            &GnomonicInverse::new(viewport),
        );
    }

    fn blit_rect(&self, viewport: &Viewport) -> PixelRect {
        disc_rect(viewport)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_center_pixel_maps_to_center() {
        let viewport = Viewport::new(Projection::Gnomonic, -0.7, 0.4, 50, 200, 100);
        let (lon, lat) = GnomonicInverse::new(&viewport).geo_coordinates(100.0, 50.0).unwrap();
        assert!((lon + 0.7).abs() < 1e-12);
        assert!((lat - 0.4).abs() < 1e-12);
    }

    #[test]
    fn test_closed_form_matches_viewport() {
        let viewport = Viewport::new(Projection::Gnomonic, 0.3, -0.5, 40, 160, 120);
        let inverse = GnomonicInverse::new(&viewport);
        for (x, y) in [(10.0, 10.0), (80.0, 20.0), (150.0, 100.0), (60.0, 70.0)] {
            let (lon, lat) = inverse.geo_coordinates(x, y).unwrap();
            let (expected_lon, expected_lat) = viewport.geo_coordinates(x, y).unwrap();
            assert!((lon - expected_lon).abs() < 1e-9, "({x}, {y})");
            assert!((lat - expected_lat).abs() < 1e-9, "({x}, {y})");
        }
    }

    #[test]
    fn test_beyond_clipping_radius() {
        let viewport = Viewport::new(Projection::Gnomonic, 0.0, 0.0, 10, 200, 200);
        let inverse = GnomonicInverse::new(&viewport);
        assert!(inverse.geo_coordinates(100.0 + 31.0, 100.0).is_none());
        assert!(inverse.geo_coordinates(100.0 + 29.0, 100.0).is_some());
    }
}
