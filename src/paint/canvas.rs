/// Pixel layout of a [`Canvas`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CanvasFormat {
    /// Opaque, alpha is always 0xff.
    Rgb32,
    /// Premultiplied alpha; zero means nothing was painted.
    Argb32Premultiplied,
}

/// Pack an opaque colour.
#[inline(always)]
pub const fn rgb(r: u8, g: u8, b: u8) -> u32 {
    0xff00_0000 | (r as u32) << 16 | (g as u32) << 8 | b as u32
}

#[inline(always)]
pub const fn alpha(pixel: u32) -> u8 {
    (pixel >> 24) as u8
}

#[inline(always)]
pub const fn red(pixel: u32) -> u8 {
    (pixel >> 16) as u8
}

#[inline(always)]
pub const fn green(pixel: u32) -> u8 {
    (pixel >> 8) as u8
}

#[inline(always)]
pub const fn blue(pixel: u32) -> u8 {
    pixel as u8
}

/// Average of the three colour channels.
#[inline(always)]
pub fn grey(pixel: u32) -> u8 {
    ((red(pixel) as u32 + green(pixel) as u32 + blue(pixel) as u32) / 3) as u8
}

/// Mix two opaque colours, `coverage` in [0, 1] being the share of `top`.
#[inline]
pub fn mix(bottom: u32, top: u32, coverage: f64) -> u32 {
    let c = coverage.clamp(0.0, 1.0);
    let channel = |b: u8, t: u8| (b as f64 + (t as f64 - b as f64) * c).round() as u8;
    rgb(
        channel(red(bottom), red(top)),
        channel(green(bottom), green(top)),
        channel(blue(bottom), blue(top)),
    )
}

/// Row-major 32 bit pixel buffer.
#[derive(Clone, Debug, PartialEq)]
pub struct Canvas {
    width: usize,
    height: usize,
    format: CanvasFormat,
    pixels: Vec<u32>,
}

impl Canvas {
    pub fn new(width: usize, height: usize, format: CanvasFormat) -> Self {
        Self {
            width,
            height,
            format,
            pixels: vec![0; width * height],
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn size(&self) -> (usize, usize) {
        (self.width, self.height)
    }

    pub fn format(&self) -> CanvasFormat {
        self.format
    }

    pub fn is_null(&self) -> bool {
        self.pixels.is_empty()
    }

    pub fn fill(&mut self, value: u32) {
        self.pixels.fill(value);
    }

    /// Pixel at (x, y). Out of range reads return 0.
    #[inline]
    pub fn pixel(&self, x: usize, y: usize) -> u32 {
        if x >= self.width || y >= self.height {
            return 0;
        }
        self.pixels[y * self.width + x]
    }

    /// Set a pixel, ignoring out of range coordinates.
    #[inline]
    pub fn set_pixel(&mut self, x: usize, y: usize, value: u32) {
        if x < self.width && y < self.height {
            self.pixels[y * self.width + x] = value;
        }
    }

    #[inline]
    pub fn set_pixel_signed(&mut self, x: i64, y: i64, value: u32) {
        if x >= 0 && y >= 0 {
            self.set_pixel(x as usize, y as usize, value);
        }
    }

    pub fn scan_line(&self, y: usize) -> &[u32] {
        &self.pixels[y * self.width..(y + 1) * self.width]
    }

    pub fn scan_line_mut(&mut self, y: usize) -> &mut [u32] {
        &mut self.pixels[y * self.width..(y + 1) * self.width]
    }

    pub fn pixels(&self) -> &[u32] {
        &self.pixels
    }

    pub fn pixels_mut(&mut self) -> &mut [u32] {
        &mut self.pixels
    }

    /// Zero every row outside `[top, bottom)`.
    pub fn clear_outside_rows(&mut self, top: usize, bottom: usize) {
        let top = top.min(self.height);
        let bottom = bottom.clamp(top, self.height);
        self.pixels[..top * self.width].fill(0);
        self.pixels[bottom * self.width..].fill(0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channels() {
        let c = rgb(10, 20, 30);
        assert_eq!(alpha(c), 255);
        assert_eq!(red(c), 10);
        assert_eq!(green(c), 20);
        assert_eq!(blue(c), 30);
        assert_eq!(grey(c), 20);
    }

    #[test]
    fn test_out_of_range_pixels_are_ignored() {
        let mut canvas = Canvas::new(4, 2, CanvasFormat::Rgb32);
        canvas.set_pixel(4, 0, 1);
        canvas.set_pixel_signed(-1, 0, 1);
        assert!(canvas.pixels().iter().all(|&p| p == 0));
        assert_eq!(canvas.pixel(10, 10), 0);
    }

    #[test]
    fn test_clear_outside_rows() {
        let mut canvas = Canvas::new(2, 4, CanvasFormat::Rgb32);
        canvas.fill(7);
        canvas.clear_outside_rows(1, 3);
        assert_eq!(canvas.scan_line(0), &[0, 0]);
        assert_eq!(canvas.scan_line(1), &[7, 7]);
        assert_eq!(canvas.scan_line(3), &[0, 0]);
    }

    #[test]
    fn test_mix_halfway() {
        let c = mix(rgb(0, 0, 0), rgb(200, 100, 50), 0.5);
        assert_eq!(c, rgb(100, 50, 25));
    }
}
