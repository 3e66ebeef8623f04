use super::canvas::{alpha, mix, rgb};
use super::{Canvas, CanvasFormat, FillRule, Painter, PixelRect};
use crate::geometry::Point;

/// Stroke settings.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Pen {
    pub color: u32,
    pub width: f64,
}

impl Default for Pen {
    fn default() -> Self {
        Self {
            color: rgb(255, 255, 255),
            width: 1.0,
        }
    }
}

/// Software painter drawing into an owned [`Canvas`].
pub struct RasterPainter {
    canvas: Canvas,
    pen: Option<Pen>,
    brush: Option<u32>,
    antialiased: bool,
}

impl RasterPainter {
    pub fn new(width: usize, height: usize) -> Self {
        Self::from_canvas(Canvas::new(width, height, CanvasFormat::Rgb32))
    }

    pub fn from_canvas(canvas: Canvas) -> Self {
        Self {
            canvas,
            pen: Some(Pen::default()),
            brush: None,
            antialiased: false,
        }
    }

    pub fn canvas(&self) -> &Canvas {
        &self.canvas
    }

    pub fn canvas_mut(&mut self) -> &mut Canvas {
        &mut self.canvas
    }

    pub fn into_canvas(self) -> Canvas {
        self.canvas
    }

    pub fn set_pen(&mut self, pen: Option<Pen>) {
        self.pen = pen;
    }

    pub fn set_brush(&mut self, brush: Option<u32>) {
        self.brush = brush;
    }

    /// With antialiasing, pixels only partly covered by a filled polygon
    /// are mixed with what is already there.
    pub fn set_antialiased(&mut self, enable: bool) {
        self.antialiased = enable;
    }

    /// Bresenham's line algorithm
    pub fn draw_line(&mut self, x0: i64, y0: i64, x1: i64, y1: i64, color: u32) {
        let dx = (x1 - x0).abs();
        let dy = -(y1 - y0).abs();
        let sx = if x0 < x1 { 1 } else { -1 };
        let sy = if y0 < y1 { 1 } else { -1 };
        let mut err = dx + dy;

        let mut x = x0;
        let mut y = y0;

        loop {
            self.canvas.set_pixel_signed(x, y, color);

            if x == x1 && y == y1 {
                break;
            }

            let e2 = 2 * err;

            if e2 >= dy {
                if x == x1 {
                    break;
                }
                err += dy;
                x += sx;
            }

            if e2 <= dx {
                if y == y1 {
                    break;
                }
                err += dx;
                y += sy;
            }
        }
    }

    fn stroke(&mut self, points: &[Point], closed: bool) {
        let Some(pen) = self.pen else {
            return;
        };
        if points.len() < 2 {
            return;
        }
        let thickness = pen.width.round().max(1.0) as i64;
        let offset = (thickness - 1) / 2;

        let segments = points.windows(2).map(|w| (w[0], w[1]));
        let closing = closed.then(|| (points[points.len() - 1], points[0]));
        for (a, b) in segments.chain(closing) {
            if !a.is_finite() || !b.is_finite() {
                continue;
            }
            let (x0, y0) = (a.x.round() as i64, a.y.round() as i64);
            let (x1, y1) = (b.x.round() as i64, b.y.round() as i64);
            // Thick lines are a bundle of shifted one pixel lines.
            for ox in -offset..thickness - offset {
                for oy in -offset..thickness - offset {
                    self.draw_line(x0 + ox, y0 + oy, x1 + ox, y1 + oy, pen.color);
                }
            }
        }
    }

    fn fill(&mut self, points: &[Point], fill_rule: FillRule, color: u32) {
        if points.len() < 3 || points.iter().any(|p| !p.is_finite()) {
            return;
        }
        let (width, height) = self.canvas.size();
        let min_y = points.iter().map(|p| p.y).fold(f64::INFINITY, f64::min);
        let max_y = points.iter().map(|p| p.y).fold(f64::NEG_INFINITY, f64::max);
        let first_row = min_y.floor().max(0.0) as usize;
        let last_row = (max_y.ceil().max(0.0) as usize).min(height);

        let mut crossings: Vec<(f64, i32)> = Vec::new();
        for y in first_row..last_row {
            let sample_y = y as f64 + 0.5;
            crossings.clear();

            let mut prev = points[points.len() - 1];
            for &p in points {
                if (prev.y <= sample_y) != (p.y <= sample_y) {
                    let x = prev.x + (sample_y - prev.y) * (p.x - prev.x) / (p.y - prev.y);
                    crossings.push((x, if p.y > prev.y { 1 } else { -1 }));
                }
                prev = p;
            }
            crossings.sort_by(|a, b| a.0.total_cmp(&b.0));

            match fill_rule {
                FillRule::OddEven => {
                    for pair in crossings.chunks_exact(2) {
                        self.fill_span(y, pair[0].0, pair[1].0, width, color);
                    }
                }
                FillRule::Winding => {
                    let mut winding = 0;
                    let mut span_start = 0.0;
                    for &(x, dir) in &crossings {
                        if winding == 0 {
                            span_start = x;
                        }
                        winding += dir;
                        if winding == 0 {
                            self.fill_span(y, span_start, x, width, color);
                        }
                    }
                }
            }
        }
    }

    fn fill_span(&mut self, y: usize, from: f64, to: f64, width: usize, color: u32) {
        if to <= from {
            return;
        }
        let first = from.floor().max(0.0) as usize;
        let last = (to.ceil().max(0.0) as usize).min(width);
        for x in first..last {
            let left = x as f64;
            if self.antialiased {
                let coverage = (left + 1.0).min(to) - left.max(from);
                if coverage >= 1.0 - 1e-9 {
                    self.canvas.set_pixel(x, y, color);
                } else if coverage > 0.0 {
                    let blended = mix(self.canvas.pixel(x, y), color, coverage);
                    self.canvas.set_pixel(x, y, blended);
                }
            } else {
                let center = left + 0.5;
                if center >= from && center < to {
                    self.canvas.set_pixel(x, y, color);
                }
            }
        }
    }
}

impl Painter for RasterPainter {
    fn device_size(&self) -> (usize, usize) {
        self.canvas.size()
    }

    fn pen_width(&self) -> f64 {
        self.pen.map_or(0.0, |pen| pen.width)
    }

    fn draw_polygon(&mut self, points: &[Point], fill_rule: FillRule) {
        if let Some(brush) = self.brush {
            self.fill(points, fill_rule, brush);
        }
        self.stroke(points, true);
    }

    fn draw_polyline(&mut self, points: &[Point]) {
        self.stroke(points, false);
    }

    fn draw_image(&mut self, target: PixelRect, image: &Canvas, source: PixelRect) {
        let device = PixelRect::from_size(self.canvas.width(), self.canvas.height());
        if target.is_empty() || source.is_empty() {
            return;
        }

        for ty in target.y.max(0)..target.bottom().min(device.bottom()) {
            let sy = source.y + (ty - target.y) * source.height / target.height;
            if sy < 0 || sy as usize >= image.height() {
                continue;
            }
            for tx in target.x.max(0)..target.right().min(device.right()) {
                let sx = source.x + (tx - target.x) * source.width / target.width;
                if sx < 0 || sx as usize >= image.width() {
                    continue;
                }
                let src = image.pixel(sx as usize, sy as usize);
                let (tx, ty) = (tx as usize, ty as usize);
                match alpha(src) {
                    0 => {}
                    255 => self.canvas.set_pixel(tx, ty, src),
                    a => {
                        let dst = self.canvas.pixel(tx, ty);
                        self.canvas.set_pixel(tx, ty, source_over(src, dst, a));
                    }
                }
            }
        }
    }
}

/// Premultiplied source-over.
fn source_over(src: u32, dst: u32, a: u8) -> u32 {
    let inverse = 255 - a as u32;
    let channel = |shift: u32| {
        let s = (src >> shift) & 0xff;
        let d = (dst >> shift) & 0xff;
        (s + d * inverse / 255).min(255) << shift
    };
    channel(24) | channel(16) | channel(8) | channel(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::paint::red;

    fn square(min: f64, max: f64) -> Vec<Point> {
        vec![
            Point::new(min, min),
            Point::new(max, min),
            Point::new(max, max),
            Point::new(min, max),
        ]
    }

    #[test]
    fn test_horizontal_line() {
        let mut painter = RasterPainter::new(10, 3);
        painter.draw_polyline(&[Point::new(0.0, 1.0), Point::new(9.0, 1.0)]);
        let row = painter.canvas().scan_line(1);
        assert!(row.iter().all(|&p| p == Pen::default().color));
        assert!(painter.canvas().scan_line(0).iter().all(|&p| p == 0));
    }

    #[test]
    fn test_vertical_line() {
        let mut painter = RasterPainter::new(3, 8);
        painter.draw_line(1, 0, 1, 7, 5);
        for y in 0..8 {
            assert_eq!(painter.canvas().pixel(1, y), 5);
        }
    }

    #[test]
    fn test_fill_square() {
        let mut painter = RasterPainter::new(10, 10);
        painter.set_pen(None);
        painter.set_brush(Some(rgb(255, 0, 0)));
        painter.draw_polygon(&square(2.0, 6.0), FillRule::OddEven);
        let filled = painter
            .canvas()
            .pixels()
            .iter()
            .filter(|&&p| p == rgb(255, 0, 0))
            .count();
        assert_eq!(filled, 16);
        assert_eq!(painter.canvas().pixel(2, 2), rgb(255, 0, 0));
        assert_eq!(painter.canvas().pixel(6, 6), 0);
    }

    #[test]
    fn test_winding_fills_overlap_once() {
        let mut painter = RasterPainter::new(10, 10);
        painter.set_pen(None);
        painter.set_brush(Some(1));
        let mut twice = square(0.0, 4.0);
        twice.extend(square(0.0, 4.0));
        painter.draw_polygon(&twice, FillRule::Winding);
        assert_eq!(painter.canvas().pixel(1, 1), 1);
    }

    #[test]
    fn test_antialiased_edge_is_partial() {
        let mut painter = RasterPainter::new(4, 1);
        painter.set_pen(None);
        painter.set_brush(Some(rgb(255, 0, 0)));
        painter.set_antialiased(true);
        painter.canvas_mut().fill(rgb(0, 0, 0));
        painter.draw_polygon(
            &[
                Point::new(0.0, 0.0),
                Point::new(1.5, 0.0),
                Point::new(1.5, 1.0),
                Point::new(0.0, 1.0),
            ],
            FillRule::OddEven,
        );
        assert_eq!(painter.canvas().pixel(0, 0), rgb(255, 0, 0));
        assert_eq!(red(painter.canvas().pixel(1, 0)), 128);
    }

    #[test]
    fn test_draw_image_skips_transparent() {
        let mut painter = RasterPainter::new(2, 1);
        painter.canvas_mut().fill(rgb(1, 2, 3));
        let mut image = Canvas::new(2, 1, CanvasFormat::Argb32Premultiplied);
        image.set_pixel(1, 0, rgb(9, 9, 9));
        let rect = PixelRect::new(0, 0, 2, 1);
        painter.draw_image(rect, &image, rect);
        assert_eq!(painter.canvas().pixel(0, 0), rgb(1, 2, 3));
        assert_eq!(painter.canvas().pixel(1, 0), rgb(9, 9, 9));
    }
}
