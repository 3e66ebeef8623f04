use glam::DVec2;

/// A point in screen space (pixels, y pointing down) or in flipped
/// geographic space (lon, -lat).
pub type Point = DVec2;

/// Smallest horizontal run used when computing a slope. In screen
/// coordinates the difference between 0 and 1e-6 is invisible.
pub const MIN_RUN: f64 = 0.000_001;

/// Slope of the line through `start` and `end` with a clamped run so
/// near-vertical segments never divide by zero.
#[inline]
pub fn slope(start: Point, end: Point) -> f64 {
    let mut run = end.x - start.x;
    if run.abs() < MIN_RUN {
        run = if run < 0.0 { -MIN_RUN } else { MIN_RUN };
    }
    (end.y - start.y) / run
}

/// An ordered point sequence, either a closed ring or an open polyline.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PolyObject {
    pub points: Vec<Point>,
    pub closed: bool,
}

impl PolyObject {
    pub fn ring(points: Vec<Point>) -> Self {
        Self {
            points,
            closed: true,
        }
    }

    pub fn polyline(points: Vec<Point>) -> Self {
        Self {
            points,
            closed: false,
        }
    }

    /// Rings need three points to enclose anything, polylines need two.
    pub fn is_degenerate(&self) -> bool {
        self.points.len() < if self.closed { 3 } else { 2 }
    }
}

/// One of the nine regions the clip rectangle's (infinitely long) border
/// lines divide the plane into:
///
/// ```text
///  0 | 1 | 2
///  --+---+--
///  3 | 4 | 5   <- 4 is the visible area
///  --+---+--
///  6 | 7 | 8
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Sector(pub u8);

impl Sector {
    pub const TOP_LEFT: Sector = Sector(0);
    pub const TOP: Sector = Sector(1);
    pub const TOP_RIGHT: Sector = Sector(2);
    pub const LEFT: Sector = Sector(3);
    pub const INSIDE: Sector = Sector(4);
    pub const RIGHT: Sector = Sector(5);
    pub const BOTTOM_LEFT: Sector = Sector(6);
    pub const BOTTOM: Sector = Sector(7);
    pub const BOTTOM_RIGHT: Sector = Sector(8);

    #[inline(always)]
    pub fn is_inside(self) -> bool {
        self == Sector::INSIDE
    }

    #[inline(always)]
    pub fn is_corner(self) -> bool {
        matches!(self.0, 0 | 2 | 6 | 8)
    }
}

/// Axis-aligned clip bounds, y growing downwards.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ClipRect {
    pub left: f64,
    pub top: f64,
    pub right: f64,
    pub bottom: f64,
}

impl ClipRect {
    pub fn new(left: f64, top: f64, right: f64, bottom: f64) -> Self {
        Self {
            left,
            top,
            right,
            bottom,
        }
    }

    /// Bounds of a paint device inflated by half the pen width plus one
    /// pixel, so strokes ending on the border leave no seam.
    pub fn for_device(width: usize, height: usize, pen_width: f64) -> Self {
        let pen_half_width = pen_width / 2.0 + 1.0;
        Self {
            left: -pen_half_width,
            top: -pen_half_width,
            right: width as f64 + pen_half_width,
            bottom: height as f64 + pen_half_width,
        }
    }

    /// Geographic boxes have their origin in the bottom left corner, so the
    /// y axis gets flipped: north becomes the top edge at `-north`.
    pub fn from_lat_lon_box(bounds: &LatLonBox) -> Self {
        Self {
            left: bounds.west,
            top: -bounds.north,
            right: bounds.east,
            bottom: -bounds.south,
        }
    }

    #[inline(always)]
    pub fn width(&self) -> f64 {
        self.right - self.left
    }

    #[inline(always)]
    pub fn height(&self) -> f64 {
        self.bottom - self.top
    }

    pub fn top_left(&self) -> Point {
        Point::new(self.left, self.top)
    }

    pub fn top_right(&self) -> Point {
        Point::new(self.right, self.top)
    }

    pub fn bottom_right(&self) -> Point {
        Point::new(self.right, self.bottom)
    }

    pub fn bottom_left(&self) -> Point {
        Point::new(self.left, self.bottom)
    }

    /// Corners in clockwise screen order, starting top-left.
    pub fn corners(&self) -> [Point; 4] {
        [
            self.top_left(),
            self.top_right(),
            self.bottom_right(),
            self.bottom_left(),
        ]
    }

    /// Classify a point into one of the nine sectors. Points on the border
    /// count as inside.
    #[inline]
    pub fn sector(&self, point: Point) -> Sector {
        let x_sector = if point.x < self.left {
            0
        } else if point.x > self.right {
            2
        } else {
            1
        };

        let y_sector = if point.y < self.top {
            0
        } else if point.y > self.bottom {
            6
        } else {
            3
        };

        Sector(x_sector + y_sector)
    }

    #[inline]
    pub fn contains(&self, point: Point) -> bool {
        self.sector(point).is_inside()
    }

    /// The corner point a corner sector touches.
    pub fn corner_of(&self, sector: Sector) -> Option<Point> {
        match sector {
            Sector::TOP_LEFT => Some(self.top_left()),
            Sector::TOP_RIGHT => Some(self.top_right()),
            Sector::BOTTOM_LEFT => Some(self.bottom_left()),
            Sector::BOTTOM_RIGHT => Some(self.bottom_right()),
            _ => None,
        }
    }

    /// Where the line through `point` with slope `m` meets the top border.
    #[inline]
    pub fn clip_top(&self, m: f64, point: Point) -> Point {
        Point::new((self.top - point.y) / m + point.x, self.top)
    }

    #[inline]
    pub fn clip_left(&self, m: f64, point: Point) -> Point {
        Point::new(self.left, (self.left - point.x) * m + point.y)
    }

    #[inline]
    pub fn clip_bottom(&self, m: f64, point: Point) -> Point {
        Point::new((self.bottom - point.y) / m + point.x, self.bottom)
    }

    #[inline]
    pub fn clip_right(&self, m: f64, point: Point) -> Point {
        Point::new(self.right, (self.right - point.x) * m + point.y)
    }

    /// Position of a border point along the clockwise perimeter, measured
    /// from the top-left corner.
    pub fn perimeter_position(&self, point: Point) -> f64 {
        let (w, h) = (self.width(), self.height());
        if point.y <= self.top && point.x < self.right {
            point.x.clamp(self.left, self.right) - self.left
        } else if point.x >= self.right && point.y < self.bottom {
            w + point.y.clamp(self.top, self.bottom) - self.top
        } else if point.y >= self.bottom && point.x > self.left {
            w + h + self.right - point.x.clamp(self.left, self.right)
        } else {
            2.0 * w + h + self.bottom - point.y.clamp(self.top, self.bottom)
        }
    }

    pub fn perimeter(&self) -> f64 {
        2.0 * (self.width() + self.height())
    }
}

/// A geographic bounding box. Units are whatever the clipped coordinates
/// use (degrees for tile preprocessing).
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LatLonBox {
    pub north: f64,
    pub south: f64,
    pub east: f64,
    pub west: f64,
}

impl LatLonBox {
    pub fn new(north: f64, south: f64, east: f64, west: f64) -> Self {
        Self {
            north,
            south,
            east,
            west,
        }
    }
}

/// Twice the signed area of a ring. Positive means clockwise on screen
/// (y pointing down).
pub fn signed_area2(ring: &[Point]) -> f64 {
    if ring.len() < 3 {
        return 0.0;
    }
    let mut sum = 0.0;
    let mut prev = ring[ring.len() - 1];
    for &p in ring {
        sum += prev.x * p.y - p.x * prev.y;
        prev = p;
    }
    sum
}

/// Even-odd point in polygon test.
pub fn ring_contains(ring: &[Point], point: Point) -> bool {
    if ring.len() < 3 {
        return false;
    }
    let mut inside = false;
    let mut prev = ring[ring.len() - 1];
    for &p in ring {
        if (p.y > point.y) != (prev.y > point.y) {
            let x = (prev.x - p.x) * (point.y - p.y) / (prev.y - p.y) + p.x;
            if point.x < x {
                inside = !inside;
            }
        }
        prev = p;
    }
    inside
}
