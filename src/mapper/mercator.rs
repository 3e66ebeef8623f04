use std::f64::consts::PI;
use std::sync::Arc;

use super::cylindrical::{paint_rows, painted_rows};
use super::{CanvasCache, RenderPool, TextureMapper};
use crate::projection::math::{gd, gd_inv_exact};
use crate::projection::Viewport;
use crate::tile::TileLoader;

/// Mercator: longitude is linear in screen space, latitude follows the
/// Gudermannian function of the screen row.
pub struct MercatorScanlineTextureMapper {
    tile_loader: Arc<dyn TileLoader>,
    pool: Arc<RenderPool>,
    cache: CanvasCache,
}

impl MercatorScanlineTextureMapper {
    pub fn new(tile_loader: Arc<dyn TileLoader>, pool: Arc<RenderPool>) -> Self {
        Self {
            tile_loader,
            pool,
            cache: CanvasCache::new(),
        }
    }

    /// Latitude of canvas row `y`.
    pub fn row_latitude(viewport: &Viewport, y: usize) -> f64 {
        let center = gd_inv_exact(viewport.center_lat);
        gd((viewport.height as f64 / 2.0 - y as f64) / viewport.rad2pixel() + center)
    }
}

impl TextureMapper for MercatorScanlineTextureMapper {
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
        // The map is square: it ends at a Mercator y of plus or minus pi.
        let k = viewport.rad2pixel();
        let center = gd_inv_exact(viewport.center_lat);
        let rows = painted_rows(viewport, (PI - center) * k, (PI + center) * k);
        paint_rows(
            &self.pool,
            self.cache.canvas_mut(),
            &self.tile_loader,
            viewport,
            tile_level,
            rows,
            |y| Self::row_latitude(viewport, y),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::{pool, position_loader};
    use super::*;
    use crate::mapper::cylindrical::left_longitude;
    use crate::paint::{PixelRect, RasterPainter};
    use crate::projection::Projection;

    #[test]
    fn test_center_pixel_maps_to_origin() {
        let viewport = Viewport::new(Projection::Mercator, 0.0, 0.0, 50, 180, 160);
        let lat = MercatorScanlineTextureMapper::row_latitude(&viewport, 80);
        let lon = left_longitude(&viewport) + 90.0 / viewport.rad2pixel();
        assert!(lat.abs() < 1e-12);
        assert!(lon.abs() < 1e-12);
    }

    #[test]
    fn test_rows_agree_with_viewport() {
        let viewport = Viewport::new(Projection::Mercator, 0.2, 0.6, 50, 200, 160);
        for y in [40, 80, 120, 159] {
            let lat = MercatorScanlineTextureMapper::row_latitude(&viewport, y);
            let (_, expected) = viewport.geo_coordinates(100.0, y as f64).unwrap();
            assert!((lat - expected).abs() < 1e-9, "row {y}");
        }
    }

    #[test]
    fn test_square_map_is_clipped_vertically() {
        // 2 * pi * rad2pixel = 4 * radius pixels tall.
        let viewport = Viewport::new(Projection::Mercator, 0.0, 0.0, 10, 60, 80);
        let mut mapper = MercatorScanlineTextureMapper::new(position_loader(), pool());
        let mut painter = RasterPainter::new(60, 80);
        mapper.map_texture(&mut painter, &viewport, 0, PixelRect::from_size(60, 80), None);

        let canvas = mapper.canvas_cache().canvas();
        assert_eq!(canvas.pixel(30, 10), 0);
        assert_ne!(canvas.pixel(30, 40), 0);
        assert_eq!(canvas.pixel(30, 70), 0);
    }
}
