use std::sync::Arc;

use super::{
    for_each_row, paint_bands, CanvasCache, RenderPool, ScanlineTextureMapperContext, TextureMapper,
};
use crate::geometry::Point;
use crate::paint::{Canvas, PixelRect};
use crate::projection::{AzimuthalFrame, MapQuality, Projection, Viewport};
use crate::tile::TileLoader;

/// Screen pixel to geographic position, `None` off the map.
pub(crate) trait InverseProjection: Sync {
    fn geo_coordinates(&self, x: f64, y: f64) -> Option<(f64, f64)>;
}

/// Inverse of any azimuthal projection through the center frame.
struct FrameInverse {
    frame: AzimuthalFrame,
    projection: Projection,
    radius: f64,
    half_width: f64,
    half_height: f64,
}

impl FrameInverse {
    fn new(viewport: &Viewport) -> Self {
        Self {
            frame: AzimuthalFrame::new(viewport.center_lon, viewport.center_lat),
            projection: viewport.projection,
            radius: viewport.radius as f64,
            half_width: viewport.width as f64 / 2.0,
            half_height: viewport.height as f64 / 2.0,
        }
    }
}

impl InverseProjection for FrameInverse {
    #[inline]
    fn geo_coordinates(&self, x: f64, y: f64) -> Option<(f64, f64)> {
        self.frame.unproject(
            self.projection,
            (x - self.half_width) / self.radius,
            (self.half_height - y) / self.radius,
        )
    }
}

/// Bounding box of the projected disc.
pub(crate) fn disc_rect(viewport: &Viewport) -> PixelRect {
    let radius = (viewport.radius as f64 * viewport.projection.clipping_radius()) as i64;
    PixelRect::new(
        viewport.width as i64 / 2 - radius,
        viewport.height as i64 / 2 - radius,
        2 * radius,
        2 * radius,
    )
}

/// Per frame constants of the disc row painter.
struct DiscRows<'a, I> {
    inverse: &'a I,
    n: i64,
    bilinear: bool,
    clip_radius: f64,
    half_width: i64,
    half_height: i64,
    north_pole: Option<Point>,
}

impl<I: InverseProjection> DiscRows<'_, I> {
    fn exact(&self, context: &mut ScanlineTextureMapperContext, x: i64, y: usize) -> u32 {
        match self.inverse.geo_coordinates(x as f64, y as f64) {
            Some((lon, lat)) => context.sample(lon, lat, self.bilinear),
            None => 0,
        }
    }

    fn paint(&self, context: &mut ScanlineTextureMapperContext, row: &mut [u32], y: usize) {
        let width = row.len() as i64;
        let n = self.n;
        let dy = y as f64 - self.half_height as f64;
        let rx_squared = self.clip_radius * self.clip_radius - dy * dy;
        if rx_squared < 0.0 {
            return;
        }

        // Where the disc border is visible the row starts and ends on it.
        let rx = rx_squared.sqrt() as i64;
        let disc = self.half_width - rx > 0;
        let (x_left, x_right) = if disc {
            (self.half_width - rx, (self.half_width + rx).min(width))
        } else {
            (0, width)
        };
        let (x_ip_left, x_ip_right) = if disc {
            (n * (x_left / n + 1), n * (x_right / n - 1))
        } else {
            (1, n * (x_right / n - 1) + 1)
        };

        // Linear interpolation smears the texture around the pole; sample
        // the pixels close to it exactly.
        let pole = self
            .north_pole
            .filter(|pole| (pole.y - y as f64).abs() <= 0.75 * n as f64);

        // Whether the context's previous sample belongs to this row and the
        // disc, so a run may be interpolated from it.
        let mut anchored = false;
        let mut intervals = 0;
        let mut x = x_left;
        while x < x_right {
            let left_interval = (x_ip_left + intervals * n) as f64;
            let mut interpolate = false;
            if n > 1 && x >= x_ip_left && x <= x_ip_right {
                let near_pole = pole.is_some_and(|pole| {
                    pole.x >= left_interval + n as f64
                        && pole.x < left_interval + 2.0 * n as f64
                        && (x as f64) < left_interval + 3.0 * n as f64
                });
                if !near_pole {
                    x += n - 1;
                    interpolate = true;
                    intervals += 1;
                }
            }

            let run = (x + 1 - n).max(0) as usize..x as usize;
            match self.inverse.geo_coordinates(x as f64, y as f64) {
                Some((lon, lat)) => {
                    if interpolate && anchored {
                        context.sample_run(lon, lat, &mut row[run], self.bilinear);
                    } else if interpolate {
                        for skipped in run {
                            row[skipped] = self.exact(context, skipped as i64, y);
                        }
                    }
                    if x < width {
                        row[x as usize] = context.sample(lon, lat, self.bilinear);
                    }
                    anchored = true;
                }
                None => {
                    if interpolate {
                        for skipped in run {
                            row[skipped] = self.exact(context, skipped as i64, y);
                        }
                    }
                    if x < width {
                        row[x as usize] = 0;
                    }
                    anchored = false;
                }
            }
            x += 1;
        }
    }
}

/// Paint the rows covered by the projected disc.
pub(crate) fn paint_disc(
    pool: &RenderPool,
    canvas: &mut Canvas,
    tile_loader: &Arc<dyn TileLoader>,
    viewport: &Viewport,
    tile_level: u32,
    inverse: &impl InverseProjection,
) {
    let height = canvas.height() as i64;
    let width = canvas.width();
    let clip_radius = viewport.radius as f64 * viewport.projection.clipping_radius();
    let half_height = height / 2;
    let y_top = (half_height - clip_radius as i64).max(0);
    let y_bottom = (half_height + clip_radius as i64).min(height);
    if y_top >= y_bottom {
        return;
    }

    let rows = DiscRows {
        inverse,
        n: ScanlineTextureMapperContext::interpolation_step(viewport, viewport.quality) as i64,
        bilinear: viewport.quality.is_bilinear(),
        clip_radius,
        half_width: width as i64 / 2,
        half_height,
        north_pole: viewport.screen_coordinates(0.0, viewport.projection.max_lat()),
    };
    let interlaced = viewport.quality == MapQuality::Low;

    paint_bands(
        pool,
        canvas,
        y_top as usize..y_bottom as usize,
        |first_row, band| {
            let mut context =
                ScanlineTextureMapperContext::new(Arc::clone(tile_loader), tile_level);
            for_each_row(band, width, first_row, interlaced, |y, row| {
                rows.paint(&mut context, row, y);
            });
        },
    );
}

/// Texture mapper for any azimuthal projection, going through the full
/// inverse projection for every exact sample.
pub struct GenericScanlineTextureMapper {
    tile_loader: Arc<dyn TileLoader>,
    pool: Arc<RenderPool>,
    cache: CanvasCache,
}

impl GenericScanlineTextureMapper {
    pub fn new(tile_loader: Arc<dyn TileLoader>, pool: Arc<RenderPool>) -> Self {
        Self {
            tile_loader,
            pool,
            cache: CanvasCache::new(),
        }
    }
}

impl TextureMapper for GenericScanlineTextureMapper {
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
            &FrameInverse::new(viewport),
        );
    }

    fn blit_rect(&self, viewport: &Viewport) -> PixelRect {
        disc_rect(viewport)
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::{pool, position_loader};
    use super::*;
    use crate::paint::{alpha, rgb, RasterPainter};

    fn render(viewport: &Viewport) -> Canvas {
        let mut mapper = GenericScanlineTextureMapper::new(position_loader(), pool());
        let (width, height) = viewport.size();
        let mut painter = RasterPainter::new(width, height);
        mapper.map_texture(&mut painter, viewport, 1, PixelRect::from_size(width, height), None);
        mapper.canvas().clone()
    }

    #[test]
    fn test_small_globe_leaves_corners_empty() {
        let viewport = Viewport::new(Projection::Spherical, 0.0, 0.0, 15, 64, 48);
        let canvas = render(&viewport);
        assert_eq!(canvas.pixel(0, 0), 0);
        assert_eq!(canvas.pixel(63, 47), 0);
        assert_eq!(alpha(canvas.pixel(32, 24)), 255);
    }

    #[test]
    fn test_print_quality_samples_exactly() {
        let viewport = Viewport::new(Projection::Stereographic, 0.4, 0.3, 20, 64, 64)
            .with_quality(MapQuality::Print);
        let canvas = render(&viewport);

        let mut context = ScanlineTextureMapperContext::new(position_loader(), 1);
        for (x, y) in [(32, 32), (20, 40), (45, 22), (10, 30)] {
            let (lon, lat) = viewport.geo_coordinates(x as f64, y as f64).unwrap();
            assert_eq!(canvas.pixel(x, y), context.pixel_value_f(lon, lat), "({x}, {y})");
        }
    }

    #[test]
    fn test_visible_pole_is_painted() {
        let viewport = Viewport::new(Projection::Spherical, 1.0, 1.2, 30, 80, 80);
        let pole = viewport.screen_coordinates(0.0, Projection::Spherical.max_lat()).unwrap();
        let canvas = render(&viewport);
        assert_eq!(alpha(canvas.pixel(pole.x as usize, pole.y as usize)), 255);
    }

    /// Longitude linear in x, with a hole the inverse cannot resolve.
    struct HoledRow {
        hole: std::ops::RangeInclusive<i64>,
    }

    impl InverseProjection for HoledRow {
        fn geo_coordinates(&self, x: f64, _y: f64) -> Option<(f64, f64)> {
            (!self.hole.contains(&(x as i64))).then(|| ((x - 12.0) * 0.08, 0.2))
        }
    }

    #[test]
    fn test_run_after_an_off_map_sample_is_sampled_exactly() {
        let inverse = HoledRow { hole: 6..=8 };
        let rows = DiscRows {
            inverse: &inverse,
            n: 4,
            bilinear: false,
            clip_radius: 1000.0,
            half_width: 12,
            half_height: 0,
            north_pole: None,
        };
        let mut context = ScanlineTextureMapperContext::new(position_loader(), 1);
        let mut row = vec![0u32; 24];
        rows.paint(&mut context, &mut row, 0);

        let mut exact = ScanlineTextureMapperContext::new(position_loader(), 1);
        assert_eq!(row[6..=8], [0, 0, 0]);
        for x in 9..=12 {
            let (lon, lat) = inverse.geo_coordinates(x as f64, 0.0).unwrap();
            assert_eq!(row[x], exact.pixel_value(lon, lat), "x = {x}");
        }
    }

    #[test]
    fn test_blit_is_limited_to_the_disc() {
        let viewport = Viewport::new(Projection::Spherical, 0.0, 0.0, 10, 64, 48);
        let mut mapper = GenericScanlineTextureMapper::new(position_loader(), pool());
        let mut painter = RasterPainter::new(64, 48);
        painter.canvas_mut().fill(rgb(1, 2, 3));
        mapper.map_texture(&mut painter, &viewport, 0, PixelRect::from_size(64, 48), None);

        assert_eq!(disc_rect(&viewport), PixelRect::new(22, 14, 20, 20));
        assert_eq!(painter.canvas().pixel(2, 2), rgb(1, 2, 3));
        assert_ne!(painter.canvas().pixel(32, 24), rgb(1, 2, 3));
    }
}
