//! Row painting shared by the cylindrical mappers: latitude is constant
//! along a row and longitude grows linearly.

use std::f64::consts::{PI, TAU};
use std::ops::Range;
use std::sync::Arc;

use super::{for_each_row, paint_bands, RenderPool, ScanlineTextureMapperContext};
use crate::geo::wrap_longitude;
use crate::paint::Canvas;
use crate::projection::{MapQuality, Viewport};
use crate::tile::TileLoader;

/// Longitude of the leftmost canvas column.
pub(crate) fn left_longitude(viewport: &Viewport) -> f64 {
    wrap_longitude(viewport.center_lon - viewport.width as f64 / 2.0 / viewport.rad2pixel())
}

/// Rows whose latitude lies within `[bottom_offset, top_offset]` pixels of
/// the vertical center, clamped to the canvas.
pub(crate) fn painted_rows(viewport: &Viewport, top_offset: f64, bottom_offset: f64) -> Range<usize> {
    let half_height = viewport.height as f64 / 2.0;
    let height = viewport.height as f64;
    let top = (half_height - top_offset).ceil().clamp(0.0, height);
    let bottom = ((half_height + bottom_offset).floor() + 1.0).clamp(top, height);
    top as usize..bottom as usize
}

/// Paint `rows` of the canvas, `row_latitude` giving the latitude of a
/// canvas row. Everything outside `rows` is cleared.
pub(crate) fn paint_rows(
    pool: &RenderPool,
    canvas: &mut Canvas,
    tile_loader: &Arc<dyn TileLoader>,
    viewport: &Viewport,
    tile_level: u32,
    rows: Range<usize>,
    row_latitude: impl Fn(usize) -> f64 + Sync,
) {
    let n = ScanlineTextureMapperContext::interpolation_step(viewport, viewport.quality);
    let pixel2rad = 1.0 / viewport.rad2pixel();
    let left_lon = left_longitude(viewport);
    let bilinear = viewport.quality.is_bilinear();
    let interlaced = viewport.quality == MapQuality::Low;
    let width = canvas.width();

    canvas.clear_outside_rows(rows.start, rows.end);
    paint_bands(pool, canvas, rows, |first_row, band| {
        let mut context = ScanlineTextureMapperContext::new(Arc::clone(tile_loader), tile_level);
        for_each_row(band, width, first_row, interlaced, |y, row| {
            paint_row(&mut context, row, left_lon, pixel2rad, row_latitude(y), n, bilinear);
        });
    });
}

/// Sample every `n`th pixel exactly and interpolate the ones in between.
pub(crate) fn paint_row(
    context: &mut ScanlineTextureMapperContext,
    row: &mut [u32],
    left_lon: f64,
    pixel2rad: f64,
    lat: f64,
    n: usize,
    bilinear: bool,
) {
    let width = row.len();
    let max_interpolation_x = n as i64 * ((width / n) as i64 - 1) + 1;
    let mut lon = left_lon;
    let mut x = 0;

    while x < width {
        let interpolate = n > 1 && x > 0 && x as i64 <= max_interpolation_x;
        if interpolate {
            x += n - 1;
            lon += (n - 1) as f64 * pixel2rad;
        }

        if lon < -PI {
            lon += TAU;
        } else if lon > PI {
            lon -= TAU;
        }

        if interpolate {
            context.sample_run(lon, lat, &mut row[x + 1 - n..x], bilinear);
        }
        if x < width {
            row[x] = context.sample(lon, lat, bilinear);
        }

        x += 1;
        lon += pixel2rad;
    }
}
