//! Paint surfaces.

mod canvas;
mod raster;

pub use canvas::{alpha, blue, green, grey, mix, red, rgb, Canvas, CanvasFormat};
pub use raster::{Pen, RasterPainter};

use crate::geometry::Point;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum FillRule {
    #[default]
    OddEven,
    Winding,
}

/// Integer pixel rectangle, `x`/`y` being the top-left corner.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PixelRect {
    pub x: i64,
    pub y: i64,
    pub width: i64,
    pub height: i64,
}

impl PixelRect {
    pub fn new(x: i64, y: i64, width: i64, height: i64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn from_size(width: usize, height: usize) -> Self {
        Self::new(0, 0, width as i64, height as i64)
    }

    pub fn is_empty(&self) -> bool {
        self.width <= 0 || self.height <= 0
    }

    pub fn right(&self) -> i64 {
        self.x + self.width
    }

    pub fn bottom(&self) -> i64 {
        self.y + self.height
    }

    pub fn intersected(&self, other: &PixelRect) -> PixelRect {
        let x = self.x.max(other.x);
        let y = self.y.max(other.y);
        let right = self.right().min(other.right());
        let bottom = self.bottom().min(other.bottom());
        PixelRect::new(x, y, (right - x).max(0), (bottom - y).max(0))
    }
}

/// The drawing surface the clip engine and the texture mappers paint on.
pub trait Painter {
    /// Device size in pixels.
    fn device_size(&self) -> (usize, usize);

    fn pen_width(&self) -> f64;

    fn draw_polygon(&mut self, points: &[Point], fill_rule: FillRule);

    fn draw_polyline(&mut self, points: &[Point]);

    /// Copy `source` of `image` onto `target` of the device.
    fn draw_image(&mut self, target: PixelRect, image: &Canvas, source: PixelRect);
}
