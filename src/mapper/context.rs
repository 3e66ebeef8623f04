use std::f64::consts::{PI, TAU};
use std::sync::Arc;

use crate::paint::{blue, green, red, rgb, CanvasFormat};
use crate::projection::math::{gd_inv, GD_INV_CLAMP, GD_INV_SERIES_LIMIT};
use crate::projection::{MapQuality, Viewport};
use crate::tile::{StackedTile, TileId, TileLoader, TileProjection};

/// Upper bound of the interpolation step search.
const MAX_INTERPOLATION_STEP: usize = 48;

/// Step used when the map leaves parts of the viewport empty.
const DISC_INTERPOLATION_STEP: usize = 8;

/// Fixed point scale of the integer approximation.
const FIXED_SHIFT: i32 = 7;
const FIXED_ONE: f64 = (1 << FIXED_SHIFT) as f64;

/// Per band sampling state: the tile currently read from and the position
/// of the last exactly sampled pixel.
///
/// Positions are kept relative to the current tile; `to_tile_coordinates_*`
/// converts texture pixel coordinates centred on (0, 0) into that frame.
pub struct ScanlineTextureMapperContext {
    tile_loader: Arc<dyn TileLoader>,
    texture_projection: TileProjection,
    tile_width: i32,
    tile_height: i32,
    tile_level: u32,
    global_width: i32,
    global_height: i32,
    norm_global_width: f64,
    norm_global_height: f64,
    tile: Option<Arc<StackedTile>>,
    tile_pos_x: i32,
    tile_pos_y: i32,
    to_tile_coordinates_lon: f64,
    to_tile_coordinates_lat: f64,
    prev_lon: f64,
    prev_lat: f64,
}

impl ScanlineTextureMapperContext {
    pub fn new(tile_loader: Arc<dyn TileLoader>, tile_level: u32) -> Self {
        let (tile_width, tile_height) = tile_loader.tile_size();
        let (tile_width, tile_height) = (tile_width as i32, tile_height as i32);
        let global_width = tile_width * tile_loader.tile_column_count(tile_level) as i32;
        let global_height = tile_height * tile_loader.tile_row_count(tile_level) as i32;

        // Nothing is loaded yet; the first lookup lands far outside and
        // triggers the initial tile load.
        let tile_pos_x = 65535;
        let tile_pos_y = 65535;

        Self {
            texture_projection: tile_loader.tile_projection(),
            tile_loader,
            tile_width,
            tile_height,
            tile_level,
            global_width,
            global_height,
            norm_global_width: global_width as f64 / TAU,
            norm_global_height: global_height as f64 / PI,
            tile: None,
            tile_pos_x,
            tile_pos_y,
            to_tile_coordinates_lon: global_width as f64 / 2.0 - tile_pos_x as f64,
            to_tile_coordinates_lat: global_height as f64 / 2.0 - tile_pos_y as f64,
            prev_lon: 0.0,
            prev_lat: 0.0,
        }
    }

    pub fn global_width(&self) -> i32 {
        self.global_width
    }

    pub fn global_height(&self) -> i32 {
        self.global_height
    }

    pub fn tile_level(&self) -> u32 {
        self.tile_level
    }

    /// Longitude to texture pixels, relative to the texture center.
    #[inline(always)]
    pub fn rad2pixel_x(&self, lon: f64) -> f64 {
        lon * self.norm_global_width
    }

    /// Latitude to texture pixels, relative to the texture center.
    #[inline(always)]
    pub fn rad2pixel_y(&self, lat: f64) -> f64 {
        match self.texture_projection {
            TileProjection::Equirectangular => -lat * self.norm_global_height,
            TileProjection::Mercator => {
                if lat.abs() < GD_INV_SERIES_LIMIT {
                    -gd_inv(lat) * 0.5 * self.norm_global_height
                } else if lat > 0.0 {
                    -GD_INV_CLAMP * 0.5 * self.norm_global_height
                } else {
                    GD_INV_CLAMP * 0.5 * self.norm_global_height
                }
            }
        }
    }

    #[inline(always)]
    fn tile_position(&self, lon: f64, lat: f64) -> (f64, f64) {
        (
            self.to_tile_coordinates_lon + self.rad2pixel_x(lon),
            self.to_tile_coordinates_lat + self.rad2pixel_y(lat),
        )
    }

    #[inline(always)]
    fn outside_tile(&self, x: f64, y: f64) -> bool {
        self.tile.is_none()
            || x < 0.0
            || y < 0.0
            || x >= self.tile_width as f64
            || y >= self.tile_height as f64
    }

    #[inline(always)]
    fn tile_pixel(&self, x: i32, y: i32) -> u32 {
        match &self.tile {
            Some(tile) => tile.pixel(x, y),
            None => 0,
        }
    }

    /// Nearest neighbour sample.
    pub fn pixel_value(&mut self, lon: f64, lat: f64) -> u32 {
        let (mut x, mut y) = self.tile_position(lon, lat);
        if self.outside_tile(x, y) {
            (x, y) = self.next_tile(x, y);
        }
        self.prev_lon = lon;
        self.prev_lat = lat;
        self.tile_pixel(x.floor() as i32, y.floor() as i32)
    }

    /// Bilinear sample.
    pub fn pixel_value_f(&mut self, lon: f64, lat: f64) -> u32 {
        let (mut x, mut y) = self.tile_position(lon, lat);
        if self.outside_tile(x, y) {
            (x, y) = self.next_tile(x, y);
        }
        self.prev_lon = lon;
        self.prev_lat = lat;
        self.bilinear(x, y)
    }

    /// Exact sample, bilinear or nearest.
    #[inline]
    pub fn sample(&mut self, lon: f64, lat: f64, bilinear: bool) -> u32 {
        if bilinear {
            self.pixel_value_f(lon, lat)
        } else {
            self.pixel_value(lon, lat)
        }
    }

    /// Interpolated run of `out.len()` pixels ending right before the
    /// sample at (`lon`, `lat`).
    #[inline]
    pub fn sample_run(&mut self, lon: f64, lat: f64, out: &mut [u32], bilinear: bool) {
        if bilinear {
            self.pixel_value_approx_f(lon, lat, out);
        } else {
            self.pixel_value_approx(lon, lat, out);
        }
    }

    /// Texel at tile relative integer coordinates; neighbours outside the
    /// current tile are read from the adjacent tile so filtering stays
    /// seamless.
    fn texel(&self, x: i32, y: i32) -> u32 {
        if x >= 0 && y >= 0 && x < self.tile_width && y < self.tile_height {
            return self.tile_pixel(x, y);
        }
        let gx = (x + self.tile_pos_x).rem_euclid(self.global_width);
        let gy = (y + self.tile_pos_y).clamp(0, self.global_height - 1);
        let id = TileId::new(
            self.tile_level,
            (gx / self.tile_width) as u32,
            (gy / self.tile_height) as u32,
        );
        self.tile_loader
            .load_tile(id)
            .pixel(gx % self.tile_width, gy % self.tile_height)
    }

    fn bilinear(&self, x: f64, y: f64) -> u32 {
        // Texel centers sit at half-integer positions.
        let (x, y) = (x - 0.5, y - 0.5);
        let (x0, y0) = (x.floor(), y.floor());
        let (fx, fy) = (x - x0, y - y0);
        let (ix, iy) = (x0 as i32, y0 as i32);

        let top_left = self.texel(ix, iy);
        let top_right = self.texel(ix + 1, iy);
        let bottom_left = self.texel(ix, iy + 1);
        let bottom_right = self.texel(ix + 1, iy + 1);

        let blend = |channel: fn(u32) -> u8| {
            let top = channel(top_left) as f64 * (1.0 - fx) + channel(top_right) as f64 * fx;
            let bottom =
                channel(bottom_left) as f64 * (1.0 - fx) + channel(bottom_right) as f64 * fx;
            (top * (1.0 - fy) + bottom * fy).round() as u8
        };
        rgb(blend(red), blend(green), blend(blue))
    }

    /// Fill `out` with the pixels between the previous exact sample and
    /// (`lon`, `lat`) by stepping linearly through the texture in fixed
    /// point arithmetic.
    pub fn pixel_value_approx(&mut self, lon: f64, lat: f64, out: &mut [u32]) {
        if out.is_empty() {
            return;
        }
        let n = out.len() as i32 + 1;
        let inverse_n = 1.0 / n as f64;
        let step_lon = lon - self.prev_lon;

        if step_lon.abs() >= PI {
            self.approx_across_dateline(lon, lat, out, false);
            return;
        }

        let prev_x = self.rad2pixel_x(self.prev_lon);
        let prev_y = self.rad2pixel_y(self.prev_lat);
        let it_step_x = ((self.rad2pixel_x(lon) - prev_x) * inverse_n * FIXED_ONE) as i32;
        let it_step_y = ((self.rad2pixel_y(lat) - prev_y) * inverse_n * FIXED_ONE) as i32;
        let mut it_x = ((prev_x + self.to_tile_coordinates_lon) * FIXED_ONE) as i32;
        let mut it_y = ((prev_y + self.to_tile_coordinates_lat) * FIXED_ONE) as i32;

        if !self.is_out_of_tile_range(it_x, it_y, it_step_x, it_step_y, n) {
            for slot in out.iter_mut() {
                it_x += it_step_x;
                it_y += it_step_y;
                *slot = self.tile_pixel(it_x >> FIXED_SHIFT, it_y >> FIXED_SHIFT);
            }
            return;
        }

        for (j, slot) in (1..).zip(out.iter_mut()) {
            let mut x = (it_x + it_step_x * j) >> FIXED_SHIFT;
            let mut y = (it_y + it_step_y * j) >> FIXED_SHIFT;
            if x < 0 || y < 0 || x >= self.tile_width || y >= self.tile_height {
                self.next_tile(x as f64, y as f64);
                it_x = ((prev_x + self.to_tile_coordinates_lon) * FIXED_ONE) as i32;
                it_y = ((prev_y + self.to_tile_coordinates_lat) * FIXED_ONE) as i32;
                x = (it_x + it_step_x * j) >> FIXED_SHIFT;
                y = (it_y + it_step_y * j) >> FIXED_SHIFT;
            }
            *slot = self.tile_pixel(x, y);
        }
    }

    /// Like [`Self::pixel_value_approx`] but bilinear. Nearest samples are
    /// taken first; only where the colour changes are the pixel and its
    /// predecessor re-sampled bilinearly.
    pub fn pixel_value_approx_f(&mut self, lon: f64, lat: f64, out: &mut [u32]) {
        if out.is_empty() {
            return;
        }
        let n = out.len() + 1;
        let inverse_n = 1.0 / n as f64;
        let step_lon = lon - self.prev_lon;

        if step_lon.abs() >= PI {
            self.approx_across_dateline(lon, lat, out, true);
            return;
        }

        let prev_x = self.rad2pixel_x(self.prev_lon);
        let prev_y = self.rad2pixel_y(self.prev_lat);
        let it_step_x = (self.rad2pixel_x(lon) - prev_x) * inverse_n;
        let it_step_y = (self.rad2pixel_y(lat) - prev_y) * inverse_n;
        let mut it_x = prev_x + self.to_tile_coordinates_lon;
        let mut it_y = prev_y + self.to_tile_coordinates_lat;

        let always_check = self.is_out_of_tile_range_f(it_x, it_y, it_step_x, it_step_y, n);

        let mut old_nearest: Option<u32> = None;
        let mut old_value = 0;
        let mut old_pos: Option<(f64, f64)> = None;

        for (j, slot) in (1..n).zip(0..) {
            let mut x = it_x + it_step_x * j as f64;
            let mut y = it_y + it_step_y * j as f64;

            if always_check && self.outside_tile(x, y) {
                self.next_tile(x, y);
                it_x = prev_x + self.to_tile_coordinates_lon;
                it_y = prev_y + self.to_tile_coordinates_lat;
                x = (it_x + it_step_x * j as f64).clamp(0.0, (self.tile_width - 1) as f64);
                y = (it_y + it_step_y * j as f64).clamp(0.0, (self.tile_height - 1) as f64);
                old_pos = None;
            }

            let nearest = self.tile_pixel(x.floor() as i32, y.floor() as i32);
            if old_nearest == Some(nearest) {
                out[slot] = old_value;
                old_pos = Some((x, y));
                continue;
            }

            // Refine the end of the previous run as well.
            if let Some((ox, oy)) = old_pos.take() {
                out[slot - 1] = self.bilinear(ox, oy);
            }
            old_nearest = Some(nearest);
            old_value = self.bilinear(x, y);
            out[slot] = old_value;
        }
    }

    /// The straight texture path between two samples on either side of the
    /// dateline goes the wrong way round the globe; sample every skipped
    /// pixel exactly while wrapping longitude instead.
    fn approx_across_dateline(&mut self, lon: f64, lat: f64, out: &mut [u32], bilinear: bool) {
        let n = (out.len() + 1) as f64;
        let step_lon = (TAU - (lon - self.prev_lon).abs()) / n;
        let step_lat = (lat - self.prev_lat) / n;
        let mut cur_lat = self.prev_lat;

        if self.prev_lon < lon {
            // Heading west across the dateline.
            let mut cur_lon = self.prev_lon;
            for slot in out.iter_mut() {
                cur_lat += step_lat;
                cur_lon -= step_lon;
                if cur_lon <= -PI {
                    cur_lon += TAU;
                }
                *slot = self.sample(cur_lon, cur_lat, bilinear);
            }
        } else {
            let mut cur_lon = lon - n * step_lon;
            for slot in out.iter_mut() {
                cur_lat += step_lat;
                cur_lon += step_lon;
                let eval_lon = if cur_lon <= -PI { cur_lon + TAU } else { cur_lon };
                *slot = self.sample(eval_lon, cur_lat, bilinear);
            }
        }
    }

    /// Whether any of the `n` fixed point steps leaves the current tile.
    pub fn is_out_of_tile_range(
        &self,
        it_x: i32,
        it_y: i32,
        step_x: i32,
        step_y: i32,
        n: i32,
    ) -> bool {
        let min_x = it_x.min(it_x + step_x * (n - 1)) >> FIXED_SHIFT;
        let max_x = it_x.max(it_x + step_x * (n - 1)) >> FIXED_SHIFT;
        let min_y = it_y.min(it_y + step_y * (n - 1)) >> FIXED_SHIFT;
        let max_y = it_y.max(it_y + step_y * (n - 1)) >> FIXED_SHIFT;

        self.tile.is_none()
            || min_x < 0
            || max_x >= self.tile_width
            || min_y < 0
            || max_y >= self.tile_height
    }

    pub fn is_out_of_tile_range_f(
        &self,
        it_x: f64,
        it_y: f64,
        step_x: f64,
        step_y: f64,
        n: usize,
    ) -> bool {
        let end_x = it_x + step_x * (n - 1) as f64;
        let end_y = it_y + step_y * (n - 1) as f64;

        self.tile.is_none()
            || it_x.min(end_x) < 0.0
            || it_x.max(end_x) >= self.tile_width as f64
            || it_y.min(end_y) < 0.0
            || it_y.max(end_y) >= self.tile_height as f64
    }

    /// Load the tile containing the tile relative position (`x`, `y`) and
    /// return the position relative to that tile. Longitude wraps around
    /// the texture; latitude is clamped to it.
    pub fn next_tile(&mut self, x: f64, y: f64) -> (f64, f64) {
        let global_width = self.global_width as f64;
        let global_height = self.global_height as f64;

        let gx = (x + self.tile_pos_x as f64).rem_euclid(global_width);
        let gy = (y + self.tile_pos_y as f64).clamp(0.0, global_height - f64::EPSILON * global_height);

        let column = ((gx as i32) / self.tile_width).min(self.global_width / self.tile_width - 1);
        let row = ((gy as i32) / self.tile_height).min(self.global_height / self.tile_height - 1);

        self.tile = Some(self.tile_loader.load_tile(TileId::new(
            self.tile_level,
            column as u32,
            row as u32,
        )));

        self.tile_pos_x = column * self.tile_width;
        self.tile_pos_y = row * self.tile_height;
        self.to_tile_coordinates_lon = global_width / 2.0 - self.tile_pos_x as f64;
        self.to_tile_coordinates_lat = global_height / 2.0 - self.tile_pos_y as f64;

        (gx - self.tile_pos_x as f64, gy - self.tile_pos_y as f64)
    }

    /// Pixels between exact samples. Print quality samples everything; maps
    /// leaving parts of the viewport empty use a fixed step; otherwise the
    /// step is chosen so that the last interval of a row is as short as
    /// possible.
    pub fn interpolation_step(viewport: &Viewport, quality: MapQuality) -> usize {
        if quality == MapQuality::Print {
            return 1;
        }
        if !viewport.map_covers_viewport() {
            return DISC_INTERPOLATION_STEP;
        }

        let width = viewport.width.saturating_sub(1);
        if width == 0 {
            return 1;
        }
        let mut best = 2;
        let mut eval_min = width;
        for n in 1..MAX_INTERPOLATION_STEP {
            let eval = width / n + width % n;
            if eval < eval_min {
                eval_min = eval;
                best = n;
            }
        }
        best
    }

    pub fn optimal_canvas_format(viewport: &Viewport) -> CanvasFormat {
        if viewport.map_covers_viewport() {
            CanvasFormat::Rgb32
        } else {
            CanvasFormat::Argb32Premultiplied
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::projection::Projection;
    use crate::tile::{ProceduralTileSource, StackedTileLoader, TileLevels};

    /// Two 16x16 tiles side by side, red channel = 2 * global x.
    fn ramp_loader() -> Arc<dyn TileLoader> {
        let levels = TileLevels {
            level_zero_columns: 2,
            level_zero_rows: 1,
            max_level: 0,
        };
        let source = ProceduralTileSource::new(levels, |t| rgb((t.x * 2) as u8, t.y as u8, 0));
        Arc::new(StackedTileLoader::new(source, 16, 16, levels))
    }

    /// Longitude of the left edge of global texel column `x`.
    fn lon_of(ctx: &ScanlineTextureMapperContext, x: f64) -> f64 {
        (x - ctx.global_width() as f64 / 2.0) / ctx.norm_global_width
    }

    fn lat_of(ctx: &ScanlineTextureMapperContext, y: f64) -> f64 {
        -(y - ctx.global_height() as f64 / 2.0) / ctx.norm_global_height
    }

    #[test]
    fn test_global_size() {
        let ctx = ScanlineTextureMapperContext::new(ramp_loader(), 0);
        assert_eq!(ctx.global_width(), 32);
        assert_eq!(ctx.global_height(), 16);
        assert!((ctx.rad2pixel_x(PI) - 16.0).abs() < 1e-12);
    }

    #[test]
    fn test_nearest_sampling_crosses_tiles() {
        let mut ctx = ScanlineTextureMapperContext::new(ramp_loader(), 0);
        let lat = lat_of(&ctx, 4.5);
        for x in [0.5, 15.5, 16.5, 31.5] {
            let lon = lon_of(&ctx, x);
            let value = ctx.pixel_value(lon, lat);
            assert_eq!(red(value) as f64, (x - 0.5) * 2.0, "at {x}");
            assert_eq!(green(value), 4);
        }
    }

    #[test]
    fn test_bilinear_is_seamless_across_tiles() {
        let mut ctx = ScanlineTextureMapperContext::new(ramp_loader(), 0);
        let lat = lat_of(&ctx, 4.5);
        // Exactly between the last texel of tile 0 (red 30) and the first
        // of tile 1 (red 32).
        let value = ctx.pixel_value_f(lon_of(&ctx, 16.0), lat);
        assert_eq!(red(value), 31);

        // Same result no matter which tile was loaded before.
        ctx.pixel_value(lon_of(&ctx, 20.5), lat);
        let again = ctx.pixel_value_f(lon_of(&ctx, 16.0), lat);
        assert_eq!(red(again), 31);
        ctx.pixel_value(lon_of(&ctx, 2.5), lat);
        let again = ctx.pixel_value_f(lon_of(&ctx, 16.0), lat);
        assert_eq!(red(again), 31);
    }

    #[test]
    fn test_longitude_wraps() {
        let mut ctx = ScanlineTextureMapperContext::new(ramp_loader(), 0);
        let lat = lat_of(&ctx, 4.5);
        let east = ctx.pixel_value(lon_of(&ctx, 0.5) + TAU, lat);
        assert_eq!(red(east), 0);
    }

    #[test]
    fn test_approx_matches_exact_within_a_tile() {
        let mut ctx = ScanlineTextureMapperContext::new(ramp_loader(), 0);
        let lat = lat_of(&ctx, 8.5);
        ctx.pixel_value(lon_of(&ctx, 1.5), lat);

        let mut out = [0u32; 3];
        ctx.pixel_value_approx(lon_of(&ctx, 5.5), lat, &mut out);
        let reds: Vec<u8> = out.iter().map(|&p| red(p)).collect();
        assert_eq!(reds, vec![4, 6, 8]);
    }

    #[test]
    fn test_approx_crossing_tile_border() {
        let mut ctx = ScanlineTextureMapperContext::new(ramp_loader(), 0);
        let lat = lat_of(&ctx, 8.5);
        ctx.pixel_value(lon_of(&ctx, 13.5), lat);

        let mut out = [0u32; 3];
        ctx.pixel_value_approx(lon_of(&ctx, 17.5), lat, &mut out);
        let reds: Vec<u8> = out.iter().map(|&p| red(p)).collect();
        assert_eq!(reds, vec![28, 30, 32]);

        let mut out_f = [0u32; 3];
        ctx.pixel_value(lon_of(&ctx, 13.5), lat);
        ctx.pixel_value_approx_f(lon_of(&ctx, 17.5), lat, &mut out_f);
        let reds: Vec<u8> = out_f.iter().map(|&p| red(p)).collect();
        assert_eq!(reds, vec![28, 30, 32]);
    }

    #[test]
    fn test_approx_across_dateline() {
        let mut ctx = ScanlineTextureMapperContext::new(ramp_loader(), 0);
        let lat = lat_of(&ctx, 8.5);
        // From the last texel column eastwards over the dateline.
        ctx.pixel_value(lon_of(&ctx, 30.5), lat);
        let mut out = [0u32; 2];
        ctx.pixel_value_approx(lon_of(&ctx, 1.5), lat, &mut out);
        let reds: Vec<u8> = out.iter().map(|&p| red(p)).collect();
        assert_eq!(reds, vec![62, 0]);
    }

    #[test]
    fn test_latitude_is_clamped() {
        let mut ctx = ScanlineTextureMapperContext::new(ramp_loader(), 0);
        let value = ctx.pixel_value(lon_of(&ctx, 3.5), lat_of(&ctx, -40.0));
        assert_eq!(green(value), 0);
        let value = ctx.pixel_value(lon_of(&ctx, 3.5), lat_of(&ctx, 99.0));
        assert_eq!(green(value), 15);
    }

    #[test]
    fn test_interpolation_step() {
        let print = Viewport::world(Projection::Equirectangular, 400, 200)
            .with_quality(MapQuality::Print);
        assert_eq!(
            ScanlineTextureMapperContext::interpolation_step(&print, print.quality),
            1
        );

        let disc = Viewport::new(Projection::Spherical, 0.0, 0.0, 50, 400, 300);
        assert_eq!(
            ScanlineTextureMapperContext::interpolation_step(&disc, MapQuality::Normal),
            8
        );

        let world = Viewport::world(Projection::Equirectangular, 401, 200);
        let n = ScanlineTextureMapperContext::interpolation_step(&world, MapQuality::Normal);
        assert!((1..48).contains(&n));
        assert_eq!(400 % n, 0);
    }

    #[test]
    fn test_optimal_format() {
        let world = Viewport::world(Projection::Equirectangular, 400, 200);
        assert_eq!(
            ScanlineTextureMapperContext::optimal_canvas_format(&world),
            CanvasFormat::Rgb32
        );
        let disc = Viewport::new(Projection::Spherical, 0.0, 0.0, 50, 400, 300);
        assert_eq!(
            ScanlineTextureMapperContext::optimal_canvas_format(&disc),
            CanvasFormat::Argb32Premultiplied
        );
    }
}
