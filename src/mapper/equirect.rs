use std::f64::consts::FRAC_PI_2;
use std::sync::Arc;

use super::cylindrical::{paint_rows, painted_rows};
use super::{CanvasCache, RenderPool, TextureMapper};
use crate::projection::Viewport;
use crate::tile::TileLoader;

/// Plate carrée: latitude and longitude are both linear in screen space.
pub struct EquirectScanlineTextureMapper {
    tile_loader: Arc<dyn TileLoader>,
    pool: Arc<RenderPool>,
    cache: CanvasCache,
}

impl EquirectScanlineTextureMapper {
    pub fn new(tile_loader: Arc<dyn TileLoader>, pool: Arc<RenderPool>) -> Self {
        Self {
            tile_loader,
            pool,
            cache: CanvasCache::new(),
        }
    }

    /// Latitude of canvas row `y`.
    pub fn row_latitude(viewport: &Viewport, y: usize) -> f64 {
        viewport.center_lat + (viewport.height as f64 / 2.0 - y as f64) / viewport.rad2pixel()
    }
}

impl TextureMapper for EquirectScanlineTextureMapper {
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
        let k = viewport.rad2pixel();
        let rows = painted_rows(
            viewport,
            (FRAC_PI_2 - viewport.center_lat) * k,
            (FRAC_PI_2 + viewport.center_lat) * k,
        );
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
