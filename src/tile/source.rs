use std::sync::Arc;

use super::{TileError, TileId, TileLevels};
use crate::clip::RingClipper;
use crate::geometry::{LatLonBox, Point};
use crate::hash::fractal_noise;
use crate::paint::{grey, red, rgb, FillRule, Painter, RasterPainter};

/// Produces the pixels of one tile.
pub trait TileSource: Send + Sync {
    fn render_tile(&self, id: TileId, width: u32, height: u32) -> Result<Vec<u32>, TileError>;
}

/// A pixel of the whole level texture.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Texel {
    pub x: u32,
    pub y: u32,
    pub global_width: u32,
    pub global_height: u32,
}

impl Texel {
    /// Horizontal position of the texel center in [0, 1).
    pub fn u(&self) -> f64 {
        (self.x as f64 + 0.5) / self.global_width as f64
    }

    /// Vertical position of the texel center in [0, 1), 0 being north.
    pub fn v(&self) -> f64 {
        (self.y as f64 + 0.5) / self.global_height as f64
    }
}

type Shader = Box<dyn Fn(Texel) -> u32 + Send + Sync>;

/// Tiles computed per texel from a function of the global texel position,
/// so neighbouring tiles and levels always agree.
pub struct ProceduralTileSource {
    levels: TileLevels,
    shader: Shader,
}

impl ProceduralTileSource {
    pub fn new(levels: TileLevels, shader: impl Fn(Texel) -> u32 + Send + Sync + 'static) -> Self {
        Self {
            levels,
            shader: Box::new(shader),
        }
    }

    /// Fractal greyscale relief, wrapping around the dateline.
    pub fn terrain(levels: TileLevels, seed: u64) -> Self {
        Self::new(levels, move |texel| {
            let height = fractal_noise(texel.u(), texel.v() * 0.5, 8, 7, seed);
            let value = (height.powf(1.5) * 255.0).round() as u8;
            rgb(value, value, value)
        })
    }

    pub fn levels(&self) -> TileLevels {
        self.levels
    }

    fn global_size(&self, id: TileId, width: u32, height: u32) -> (u32, u32) {
        (
            width * (self.levels.level_zero_columns << id.zoom),
            height * (self.levels.level_zero_rows << id.zoom),
        )
    }
}

impl TileSource for ProceduralTileSource {
    fn render_tile(&self, id: TileId, width: u32, height: u32) -> Result<Vec<u32>, TileError> {
        let (global_width, global_height) = self.global_size(id, width, height);
        let mut pixels = Vec::with_capacity((width * height) as usize);
        for y in 0..height {
            for x in 0..width {
                pixels.push((self.shader)(Texel {
                    x: id.x * width + x,
                    y: id.y * height + y,
                    global_width,
                    global_height,
                }));
            }
        }
        Ok(pixels)
    }
}

/// A land polygon in degrees with its bounding box.
struct LandRing {
    points: Vec<(f64, f64)>,
    bounds: LatLonBox,
}

impl LandRing {
    fn new(points: Vec<(f64, f64)>) -> Self {
        let mut bounds = LatLonBox::new(f64::MIN, f64::MAX, f64::MIN, f64::MAX);
        for &(lon, lat) in &points {
            bounds.north = bounds.north.max(lat);
            bounds.south = bounds.south.min(lat);
            bounds.east = bounds.east.max(lon);
            bounds.west = bounds.west.min(lon);
        }
        Self { points, bounds }
    }

    fn overlaps(&self, other: &LatLonBox) -> bool {
        self.bounds.west <= other.east
            && self.bounds.east >= other.west
            && self.bounds.south <= other.north
            && self.bounds.north >= other.south
    }
}

/// Relief texture with land raised above the sea. Land polygons are cut to
/// each tile's box with the ring clipper and rasterized into a coverage
/// mask. Assumes an equirectangular pyramid.
pub struct LandTileSource {
    base: ProceduralTileSource,
    land: Arc<Vec<LandRing>>,
}

impl LandTileSource {
    /// `land` holds closed rings of (lon, lat) degree pairs.
    pub fn new(base: ProceduralTileSource, land: Vec<Vec<(f64, f64)>>) -> Self {
        let land = land
            .into_iter()
            .filter(|ring| ring.len() >= 3)
            .map(LandRing::new)
            .collect();
        Self {
            base,
            land: Arc::new(land),
        }
    }

    pub fn land_ring_count(&self) -> usize {
        self.land.len()
    }

    fn tile_bounds(&self, id: TileId) -> LatLonBox {
        let levels = self.base.levels();
        let columns = (levels.level_zero_columns << id.zoom) as f64;
        let rows = (levels.level_zero_rows << id.zoom) as f64;
        LatLonBox::new(
            90.0 - id.y as f64 * 180.0 / rows,
            90.0 - (id.y + 1) as f64 * 180.0 / rows,
            (id.x + 1) as f64 * 360.0 / columns - 180.0,
            id.x as f64 * 360.0 / columns - 180.0,
        )
    }

    /// Land coverage of every tile pixel, in the red channel.
    fn land_mask(&self, id: TileId, width: u32, height: u32) -> RasterPainter {
        let bounds = self.tile_bounds(id);
        let clipper = RingClipper::new(&bounds, 0);
        let scale_x = width as f64 / (bounds.east - bounds.west);
        let scale_y = height as f64 / (bounds.north - bounds.south);

        let mut mask = RasterPainter::new(width as usize, height as usize);
        mask.set_pen(None);
        mask.set_brush(Some(rgb(255, 0, 0)));
        mask.set_antialiased(true);
        mask.canvas_mut().fill(rgb(0, 0, 0));

        for ring in self.land.iter().filter(|ring| ring.overlaps(&bounds)) {
            for piece in clipper.clip_geo(&ring.points, true) {
                let pixels: Vec<Point> = piece
                    .iter()
                    .map(|&(lon, lat)| {
                        Point::new(
                            (lon - bounds.west) * scale_x,
                            (bounds.north - lat) * scale_y,
                        )
                    })
                    .collect();
                mask.draw_polygon(&pixels, FillRule::Winding);
            }
        }
        mask
    }
}

impl TileSource for LandTileSource {
    fn render_tile(&self, id: TileId, width: u32, height: u32) -> Result<Vec<u32>, TileError> {
        let mut pixels = self.base.render_tile(id, width, height)?;
        let mask = self.land_mask(id, width, height);

        for (pixel, &coverage) in pixels.iter_mut().zip(mask.canvas().pixels()) {
            let g = grey(*pixel) as f64;
            let sea = g * 80.0 / 255.0;
            let land = 96.0 + g * 159.0 / 255.0;
            let share = red(coverage) as f64 / 255.0;
            let value = (sea + (land - sea) * share).round() as u8;
            *pixel = rgb(value, value, value);
        }
        Ok(pixels)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_procedural_tile_uses_global_texels() {
        let source = ProceduralTileSource::new(TileLevels::default(), |t| t.x + 1000 * t.y);
        let pixels = source.render_tile(TileId::new(1, 2, 1), 4, 4).unwrap();
        assert_eq!(pixels.len(), 16);
        assert_eq!(pixels[0], 8 + 1000 * 4);
        assert_eq!(pixels[5], 9 + 1000 * 5);
    }

    #[test]
    fn test_terrain_is_deterministic() {
        let a = ProceduralTileSource::terrain(TileLevels::default(), 3);
        let b = ProceduralTileSource::terrain(TileLevels::default(), 3);
        let id = TileId::new(0, 1, 0);
        assert_eq!(a.render_tile(id, 8, 8).unwrap(), b.render_tile(id, 8, 8).unwrap());
    }

    #[test]
    fn test_tile_bounds() {
        let source = LandTileSource::new(
            ProceduralTileSource::terrain(TileLevels::default(), 1),
            Vec::new(),
        );
        let bounds = source.tile_bounds(TileId::new(0, 1, 0));
        assert_eq!(bounds, LatLonBox::new(90.0, -90.0, 180.0, 0.0));
    }

    #[test]
    fn test_land_is_brighter_than_sea() {
        let flat = ProceduralTileSource::new(TileLevels::default(), |_| rgb(128, 128, 128));
        // Land covering the western half of the eastern tile.
        let island = vec![(0.0, 80.0), (90.0, 80.0), (90.0, -80.0), (0.0, -80.0)];
        let source = LandTileSource::new(flat, vec![island]);
        assert_eq!(source.land_ring_count(), 1);

        let pixels = source.render_tile(TileId::new(0, 1, 0), 8, 8).unwrap();
        let west = grey(pixels[3 * 8 + 1]);
        let east = grey(pixels[3 * 8 + 6]);
        assert!(west > east, "land {west} sea {east}");
    }
}
