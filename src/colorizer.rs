//! Recolours an elevation texture with sea and land palettes, using a
//! land/water mask drawn from vector polygons and an optional embossed
//! relief shading.

use std::str::FromStr;

use thiserror::Error;
use tracing::debug;

use crate::clip::ClipPainter;
use crate::paint::{alpha, blue, red, rgb, Canvas, CanvasFormat, FillRule, Painter, RasterPainter};
use crate::projection::{MapQuality, Viewport};
use crate::vector::{screen_polygons, LineString};

/// Shades per palette entry; shade 8 is the unshaded colour.
pub const SHADES: usize = 16;
const FLAT: u8 = 8;
const PALETTE_WIDTH: usize = 512;

const MASK_WATER: u32 = rgb(0, 0, 255);
const MASK_LAND: u32 = rgb(255, 0, 0);
const MASK_LAKE: u32 = rgb(0, 255, 0);

pub const DEFAULT_SEA_GRADIENT: &str = "#0a1a3c=0 #143c78=0.4 #2864a0=0.75 #5a96c8=1";
pub const DEFAULT_LAND_GRADIENT: &str =
    "#2d6e2d=0 #7a9a3c=0.3 #c8b464=0.55 #8c6e46=0.8 #f5f5f5=1";

const DEFAULT_SEA_STOPS: [(f64, u32); 4] = [
    (0.0, rgb(0x0a, 0x1a, 0x3c)),
    (0.4, rgb(0x14, 0x3c, 0x78)),
    (0.75, rgb(0x28, 0x64, 0xa0)),
    (1.0, rgb(0x5a, 0x96, 0xc8)),
];
const DEFAULT_LAND_STOPS: [(f64, u32); 5] = [
    (0.0, rgb(0x2d, 0x6e, 0x2d)),
    (0.3, rgb(0x7a, 0x9a, 0x3c)),
    (0.55, rgb(0xc8, 0xb4, 0x64)),
    (0.8, rgb(0x8c, 0x6e, 0x46)),
    (1.0, rgb(0xf5, 0xf5, 0xf5)),
];

#[derive(Debug, Error, PartialEq)]
pub enum GradientError {
    #[error("invalid colour `{0}`, expected #rrggbb")]
    InvalidColor(String),
    #[error("invalid stop position `{0}`")]
    InvalidPosition(String),
    #[error("gradient has no colour stops")]
    Empty,
}

/// Piecewise linear colour gradient over [0, 1].
#[derive(Clone, Debug, PartialEq)]
pub struct Gradient {
    stops: Vec<(f64, u32)>,
}

impl Gradient {
    pub fn from_stops(stops: &[(f64, u32)]) -> Result<Self, GradientError> {
        if stops.is_empty() {
            return Err(GradientError::Empty);
        }
        if let Some(&(position, _)) = stops.iter().find(|(p, _)| !(0.0..=1.0).contains(p)) {
            return Err(GradientError::InvalidPosition(position.to_string()));
        }
        let mut stops = stops.to_vec();
        stops.sort_by(|a, b| a.0.total_cmp(&b.0));
        Ok(Self { stops })
    }

    /// Parse whitespace separated `#rrggbb=position` stops. Tokens without
    /// a position are ignored.
    pub fn parse(text: &str) -> Result<Self, GradientError> {
        let mut stops = Vec::new();
        for token in text.split_whitespace() {
            let Some((color, position)) = token.split_once('=') else {
                continue;
            };
            let position: f64 = position
                .parse()
                .map_err(|_| GradientError::InvalidPosition(position.to_string()))?;
            stops.push((position, parse_color(color)?));
        }
        Self::from_stops(&stops)
    }

    /// Colour at `t`, clamped to the first and last stop.
    pub fn color_at(&self, t: f64) -> u32 {
        let first = self.stops[0];
        if t <= first.0 {
            return first.1;
        }
        for pair in self.stops.windows(2) {
            let (p0, c0) = pair[0];
            let (p1, c1) = pair[1];
            if t <= p1 {
                if p1 - p0 <= f64::EPSILON {
                    return c1;
                }
                return lerp_color(c0, c1, (t - p0) / (p1 - p0));
            }
        }
        self.stops[self.stops.len() - 1].1
    }

    /// The gradient sampled at the centres of `count` equal cells.
    fn sample(&self, count: usize) -> impl Iterator<Item = u32> + '_ {
        (0..count).map(move |i| self.color_at((i as f64 + 0.5) / count as f64))
    }
}

impl FromStr for Gradient {
    type Err = GradientError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

fn parse_color(text: &str) -> Result<u32, GradientError> {
    let invalid = || GradientError::InvalidColor(text.to_string());
    let hex = text.strip_prefix('#').ok_or_else(invalid)?;
    if hex.len() != 6 {
        return Err(invalid());
    }
    let value = u32::from_str_radix(hex, 16).map_err(|_| invalid())?;
    Ok(0xff00_0000 | value)
}

#[inline]
fn lerp_color(from: u32, to: u32, t: f64) -> u32 {
    let channel = |shift: u32| {
        let a = ((from >> shift) & 0xff) as f64;
        let b = ((to >> shift) & 0xff) as f64;
        (a + (b - a) * t).round() as u8
    };
    rgb(channel(16), channel(8), channel(0))
}

/// The 16 shades of `color`, from lit to shadowed.
fn shades(color: u32) -> [u32; SHADES] {
    let white = rgb(255, 255, 255);
    let black = rgb(0, 0, 0);
    let shading = Gradient {
        stops: vec![
            (0.0, white),
            (0.15, white),
            (0.496, color),
            (0.504, color),
            (0.75, black),
            (1.0, black),
        ],
    };
    // The shading runs across 256 pixels starting 120 pixels left of the
    // first shade.
    std::array::from_fn(|j| shading.color_at((j as f64 + 0.5 + 120.0) / 256.0))
}

/// Four last grey values of a row, oldest in the low byte.
#[derive(Clone, Copy, Debug, Default)]
struct EmbossFifo(u32);

impl EmbossFifo {
    #[inline(always)]
    fn head(self) -> u8 {
        self.0 as u8
    }

    #[inline(always)]
    fn enqueue(&mut self, value: u8) {
        self.0 = (self.0 >> 8 & 0x00ff_ffff) | (value as u32) << 24;
    }
}

/// Maps grey texels to sea or land colours.
pub struct TextureColorizer {
    palette: Box<[[u32; PALETTE_WIDTH]; SHADES]>,
    land: Vec<LineString>,
    lakes: Vec<LineString>,
    show_relief: bool,
    mask: Canvas,
}

impl TextureColorizer {
    pub fn new(sea: &Gradient, land: &Gradient) -> Self {
        let mut palette = Box::new([[0u32; PALETTE_WIDTH]; SHADES]);
        let base: Vec<u32> = sea.sample(256).chain(land.sample(256)).collect();
        for (i, color) in base.into_iter().enumerate() {
            for (shade, value) in shades(color).into_iter().enumerate() {
                palette[shade][i] = value;
            }
        }
        debug!("colour palette built");

        Self {
            palette,
            land: Vec::new(),
            lakes: Vec::new(),
            show_relief: true,
            mask: Canvas::new(0, 0, CanvasFormat::Rgb32),
        }
    }

    pub fn with_default_palette() -> Self {
        let sea = Gradient {
            stops: DEFAULT_SEA_STOPS.to_vec(),
        };
        let land = Gradient {
            stops: DEFAULT_LAND_STOPS.to_vec(),
        };
        Self::new(&sea, &land)
    }

    pub fn add_land_polygons(&mut self, rings: impl IntoIterator<Item = LineString>) {
        self.land.extend(rings);
    }

    pub fn add_lake_polygons(&mut self, rings: impl IntoIterator<Item = LineString>) {
        self.lakes.extend(rings);
    }

    pub fn set_show_relief(&mut self, show: bool) {
        self.show_relief = show;
    }

    pub fn show_relief(&self) -> bool {
        self.show_relief
    }

    /// Palette colour for a shade and an index, sea below 256.
    pub fn palette_entry(&self, shade: usize, index: usize) -> u32 {
        self.palette[shade.min(SHADES - 1)][index.min(PALETTE_WIDTH - 1)]
    }

    /// Land/water mask of the last colorized frame.
    pub fn mask(&self) -> &Canvas {
        &self.mask
    }

    fn draw_mask(&mut self, viewport: &Viewport, quality: MapQuality, width: usize, height: usize) {
        let mut mask = std::mem::replace(&mut self.mask, Canvas::new(0, 0, CanvasFormat::Rgb32));
        if mask.size() != (width, height) {
            mask = Canvas::new(width, height, CanvasFormat::Rgb32);
        }
        mask.fill(MASK_WATER);

        let mut raster = RasterPainter::from_canvas(mask);
        raster.set_pen(None);
        raster.set_antialiased(quality.is_bilinear());
        let mut painter = ClipPainter::new(raster, true);

        for (rings, brush) in [(&self.land, MASK_LAND), (&self.lakes, MASK_LAKE)] {
            painter.painter_mut().set_brush(Some(brush));
            for ring in rings {
                for polygon in screen_polygons(viewport, ring) {
                    painter.draw_polygon(&polygon, FillRule::OddEven);
                }
            }
        }

        self.mask = painter.into_inner().into_canvas();
    }

    #[inline]
    fn shade(&self, bump: u8, grey: u8, mask: u32) -> u32 {
        let row = &self.palette[bump as usize];
        let water = row[grey as usize];
        match red(mask) {
            0 => water,
            255 => row[grey as usize + 256],
            a => {
                let land = row[grey as usize + 256];
                let a = a as u32;
                let channel = |shift: u32| {
                    let l = (land >> shift) & 0xff;
                    let w = (water >> shift) & 0xff;
                    ((a * l + (255 - a) * w) / 255) as u8
                };
                rgb(channel(16), channel(8), channel(0))
            }
        }
    }

    /// Recolour a freshly mapped texture in place.
    pub fn colorize(&mut self, canvas: &mut Canvas, viewport: &Viewport, quality: MapQuality) {
        let (width, height) = canvas.size();
        if width == 0 || height == 0 {
            return;
        }
        self.draw_mask(viewport, quality, width, height);

        // Gnomonic and stereographic discs reach past the globe radius.
        let radius = (viewport.radius as f64 * viewport.projection.clipping_radius()) as i64;
        let (half_width, half_height) = (width as i64 / 2, height as i64 / 2);
        let cylindrical = viewport.projection.is_cylindrical();

        if cylindrical || radius * radius > half_width * half_width + half_height * half_height {
            let (top, bottom) = if cylindrical {
                self.map_rows(viewport, height)
            } else {
                (0, height)
            };
            for y in top..bottom {
                let mut emboss = EmbossFifo::default();
                for x in 0..width {
                    let texel = canvas.pixel(x, y);
                    if alpha(texel) == 0 {
                        continue;
                    }
                    let grey = blue(texel);
                    let bump = if self.show_relief {
                        emboss.enqueue(grey);
                        (emboss.head() as i32 + 8 - grey as i32).clamp(0, 15) as u8
                    } else {
                        FLAT
                    };
                    let color = self.shade(bump, grey, self.mask.pixel(x, y));
                    canvas.set_pixel(x, y, color);
                }
            }
        } else {
            let top = (half_height - radius).max(0);
            let bottom = (half_height + radius).min(height as i64);
            let mut emboss = EmbossFifo::default();
            for y in top..bottom {
                let dy = y - half_height;
                let rx = ((radius * radius - dy * dy) as f64).sqrt() as i64;
                let left = (half_width - rx).max(0);
                let right = (half_width + rx).min(width as i64);
                for x in left..right {
                    let (x, y) = (x as usize, y as usize);
                    let texel = canvas.pixel(x, y);
                    if alpha(texel) == 0 {
                        continue;
                    }
                    let grey = blue(texel);
                    let bump = if self.show_relief {
                        emboss.enqueue(grey);
                        ((emboss.head() as i32 + 16 - grey as i32) >> 1).clamp(0, 15) as u8
                    } else {
                        FLAT
                    };
                    let color = self.shade(bump, grey, self.mask.pixel(x, y));
                    canvas.set_pixel(x, y, color);
                }
            }
        }
    }

    /// Canvas rows between the projection's northern and southern limits.
    fn map_rows(&self, viewport: &Viewport, height: usize) -> (usize, usize) {
        let projection = viewport.projection;
        let y_of = |lat: f64| {
            viewport
                .screen_coordinates(viewport.center_lon, lat)
                .map_or(0.0, |p| p.y)
        };
        let top = y_of(projection.max_lat()).clamp(0.0, height as f64) as usize;
        let bottom = y_of(projection.min_lat()).clamp(0.0, height as f64) as usize;
        (top, bottom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::paint::green;
    use crate::projection::Projection;

    fn square(west: f64, east: f64, lat: f64) -> LineString {
        vec![(west, lat), (east, lat), (east, -lat), (west, -lat)]
    }

    fn grey_canvas(width: usize, height: usize, value: u8) -> Canvas {
        let mut canvas = Canvas::new(width, height, CanvasFormat::Rgb32);
        canvas.fill(rgb(value, value, value));
        canvas
    }

    #[test]
    fn test_parse_gradient() {
        let gradient = Gradient::parse("#000000=0 ignored #ffffff=1").unwrap();
        assert_eq!(gradient.color_at(0.0), rgb(0, 0, 0));
        assert_eq!(gradient.color_at(1.0), rgb(255, 255, 255));
        assert_eq!(gradient.color_at(0.5), rgb(128, 128, 128));
        assert_eq!(gradient.color_at(2.0), rgb(255, 255, 255));
    }

    #[test]
    fn test_parse_errors() {
        assert_eq!(
            Gradient::parse("#12345=0"),
            Err(GradientError::InvalidColor("#12345".into()))
        );
        assert_eq!(
            Gradient::parse("#123456=x"),
            Err(GradientError::InvalidPosition("x".into()))
        );
        assert_eq!(Gradient::parse("no stops here"), Err(GradientError::Empty));
        assert!("#123456=1.5".parse::<Gradient>().is_err());
    }

    #[test]
    fn test_default_gradients_parse_to_the_built_in_stops() {
        let sea: Gradient = DEFAULT_SEA_GRADIENT.parse().unwrap();
        let land: Gradient = DEFAULT_LAND_GRADIENT.parse().unwrap();
        assert_eq!(sea.stops, DEFAULT_SEA_STOPS.to_vec());
        assert_eq!(land.stops, DEFAULT_LAND_STOPS.to_vec());
    }

    #[test]
    fn test_flat_shade_is_the_base_colour() {
        let color = rgb(10, 200, 70);
        let shades = shades(color);
        assert_eq!(shades[FLAT as usize], color);
        // Lower shades are lighter, higher shades darker.
        assert!(green(shades[0]) > green(color));
        assert!(green(shades[15]) < green(color));
    }

    #[test]
    fn test_emboss_fifo_head_lags_three_values() {
        let mut fifo = EmbossFifo::default();
        for value in [1, 2, 3, 4] {
            fifo.enqueue(value);
        }
        assert_eq!(fifo.head(), 1);
        fifo.enqueue(5);
        assert_eq!(fifo.head(), 2);
    }

    #[test]
    fn test_without_land_everything_is_sea() {
        let mut colorizer = TextureColorizer::with_default_palette();
        colorizer.set_show_relief(false);
        let viewport = Viewport::world(Projection::Equirectangular, 64, 32);
        let mut canvas = grey_canvas(64, 32, 100);
        colorizer.colorize(&mut canvas, &viewport, MapQuality::Normal);

        let expected = colorizer.palette_entry(FLAT as usize, 100);
        assert_eq!(canvas.pixel(5, 5), expected);
        assert_eq!(canvas.pixel(60, 30), expected);
    }

    #[test]
    fn test_land_polygon_selects_land_palette() {
        let mut colorizer = TextureColorizer::with_default_palette();
        colorizer.set_show_relief(false);
        colorizer.add_land_polygons([square(-90.0, 0.0, 45.0)]);
        let viewport = Viewport::world(Projection::Equirectangular, 64, 32);
        let mut canvas = grey_canvas(64, 32, 100);
        colorizer.colorize(&mut canvas, &viewport, MapQuality::Normal);

        // One degree is 64 / 360 pixels: the square spans x 16..32.
        assert_eq!(canvas.pixel(24, 16), colorizer.palette_entry(FLAT as usize, 356));
        assert_eq!(canvas.pixel(48, 16), colorizer.palette_entry(FLAT as usize, 100));
    }

    #[test]
    fn test_lakes_are_water() {
        let mut colorizer = TextureColorizer::with_default_palette();
        colorizer.set_show_relief(false);
        colorizer.add_land_polygons([square(-90.0, 0.0, 45.0)]);
        colorizer.add_lake_polygons([square(-60.0, -30.0, 20.0)]);
        let viewport = Viewport::world(Projection::Equirectangular, 64, 32);
        let mut canvas = grey_canvas(64, 32, 100);
        colorizer.colorize(&mut canvas, &viewport, MapQuality::Normal);

        assert_eq!(canvas.pixel(24, 16), colorizer.palette_entry(FLAT as usize, 100));
        assert_eq!(canvas.pixel(18, 16), colorizer.palette_entry(FLAT as usize, 356));
    }

    #[test]
    fn test_relief_is_flat_on_flat_texture() {
        let mut colorizer = TextureColorizer::with_default_palette();
        let viewport = Viewport::world(Projection::Equirectangular, 64, 32);
        let mut canvas = grey_canvas(64, 32, 100);
        colorizer.colorize(&mut canvas, &viewport, MapQuality::Normal);

        // After the first pixels of a row the fifo holds the texture grey.
        assert_eq!(canvas.pixel(10, 10), colorizer.palette_entry(FLAT as usize, 100));
    }

    #[test]
    fn test_disc_leaves_transparent_pixels() {
        let mut colorizer = TextureColorizer::with_default_palette();
        let viewport = Viewport::new(Projection::Spherical, 0.0, 0.0, 10, 40, 40);
        let mut canvas = Canvas::new(40, 40, CanvasFormat::Argb32Premultiplied);
        for y in 15..25 {
            for x in 15..25 {
                canvas.set_pixel(x, y, rgb(50, 50, 50));
            }
        }
        colorizer.colorize(&mut canvas, &viewport, MapQuality::High);

        assert_eq!(canvas.pixel(0, 0), 0);
        assert_eq!(canvas.pixel(12, 12), 0);
        assert_ne!(canvas.pixel(20, 20), rgb(50, 50, 50));
    }

    #[test]
    fn test_gnomonic_disc_is_coloured_to_its_clipping_radius() {
        let mut colorizer = TextureColorizer::with_default_palette();
        let viewport = Viewport::new(Projection::Gnomonic, 0.0, 0.0, 10, 80, 80);
        let mut canvas = Canvas::new(80, 80, CanvasFormat::Rgb32);
        let grey = rgb(100, 100, 100);
        canvas.fill(grey);
        colorizer.colorize(&mut canvas, &viewport, MapQuality::Normal);

        assert_ne!(canvas.pixel(40, 40), grey);
        assert_ne!(canvas.pixel(55, 40), grey);
        assert_ne!(canvas.pixel(60, 40), grey);
        assert_eq!(canvas.pixel(75, 40), grey);
    }
}
