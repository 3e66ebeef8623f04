//! Screen-space clipping of polygons and polylines.
//!
//! Projected geometry can be many times larger than the viewport; painting
//! it directly is slow and overflows integer rasterizers. [`ScanClipper`]
//! walks each polygon once, classifies every vertex into one of nine sectors
//! around the clip rectangle and emits only the visible parts, adding the
//! rectangle's corners where a filled ring wraps around the outside.

mod labels;
pub mod ring;
mod transitions;

pub use labels::{LabelArea, LabelPositionFlags, LABEL_MARGIN};
pub use ring::RingClipper;

use tracing::trace;

use crate::geometry::{slope, ClipRect, Point, PolyObject, Sector};
use crate::paint::{Canvas, FillRule, Painter, PixelRect};

/// Sector-based single pass clipper.
#[derive(Clone, Copy, Debug)]
pub struct ScanClipper {
    rect: ClipRect,
}

impl ScanClipper {
    pub fn new(rect: ClipRect) -> Self {
        Self { rect }
    }

    pub fn rect(&self) -> &ClipRect {
        &self.rect
    }

    /// Clip `polygon` against the rectangle. Closed rings come back as
    /// closed rings (without repeating the first point), open polylines as
    /// one or more visible pieces.
    pub fn clip(&self, polygon: &[Point], is_closed: bool) -> Vec<Vec<Point>> {
        let Some(&first) = polygon.first() else {
            return Vec::new();
        };

        let mut walk = Walk::new(&self.rect, is_closed, first);

        for &point in polygon {
            walk.step(point);
        }
        // The closing edge is walked exactly once, here.
        if is_closed {
            walk.step(first);
        }

        let pieces = walk.finish();
        trace!(
            input = polygon.len(),
            pieces = pieces.len(),
            closed = is_closed,
            "clipped"
        );
        pieces
    }

    pub fn clip_object(&self, object: &PolyObject) -> Vec<PolyObject> {
        self.clip(&object.points, object.closed)
            .into_iter()
            .map(|points| PolyObject {
                points,
                closed: object.closed,
            })
            .collect()
    }
}

/// Per-call state of one clipping walk.
struct Walk<'a> {
    rect: &'a ClipRect,
    closed: bool,
    previous_point: Point,
    previous_sector: Sector,
    current: Vec<Point>,
    done: Vec<Vec<Point>>,
}

impl<'a> Walk<'a> {
    fn new(rect: &'a ClipRect, closed: bool, start: Point) -> Self {
        Self {
            rect,
            closed,
            previous_point: start,
            previous_sector: rect.sector(start),
            current: Vec::new(),
            done: Vec::new(),
        }
    }

    fn step(&mut self, point: Point) {
        let sector = self.rect.sector(point);

        if sector != self.previous_sector {
            if sector.is_inside() || self.previous_sector.is_inside() {
                self.clip_once(point, sector);
            } else {
                self.clip_multiple(point, sector);
            }
            self.previous_sector = sector;
        }

        if sector.is_inside() {
            self.current.push(point);
        }
        self.previous_point = point;
    }

    /// Exactly one of the two points is visible: one crossing.
    fn clip_once(&mut self, point: Point, sector: Sector) {
        let rect = self.rect;
        let m = slope(self.previous_point, point);
        let appearing = sector.is_inside();
        let offscreen = if appearing {
            self.previous_sector
        } else {
            sector
        };
        let anchor = self.previous_point;

        match offscreen {
            Sector::TOP_LEFT => {
                let mut p = rect.clip_top(m, anchor);
                if p.x < rect.left {
                    p = rect.clip_left(m, p);
                }
                self.cross_corner(rect.top_left(), p, appearing);
            }
            Sector::TOP => self.cross_edge(rect.clip_top(m, anchor), appearing),
            Sector::TOP_RIGHT => {
                let mut p = rect.clip_top(m, anchor);
                if p.x > rect.right {
                    p = rect.clip_right(m, p);
                }
                self.cross_corner(rect.top_right(), p, appearing);
            }
            Sector::LEFT => self.cross_edge(rect.clip_left(m, anchor), appearing),
            Sector::RIGHT => self.cross_edge(rect.clip_right(m, anchor), appearing),
            Sector::BOTTOM_LEFT => {
                let mut p = rect.clip_bottom(m, anchor);
                if p.x < rect.left {
                    p = rect.clip_left(m, p);
                }
                self.cross_corner(rect.bottom_left(), p, appearing);
            }
            Sector::BOTTOM => self.cross_edge(rect.clip_bottom(m, anchor), appearing),
            Sector::BOTTOM_RIGHT => {
                let mut p = rect.clip_bottom(m, anchor);
                if p.x > rect.right {
                    p = rect.clip_right(m, p);
                }
                self.cross_corner(rect.bottom_right(), p, appearing);
            }
            _ => {}
        }
    }

    fn cross_corner(&mut self, corner: Point, point: Point, appearing: bool) {
        if !self.closed {
            self.cross_edge(point, appearing);
        } else if appearing {
            self.current.push(corner);
            self.current.push(point);
        } else {
            self.current.push(point);
            self.current.push(corner);
        }
    }

    fn cross_edge(&mut self, point: Point, appearing: bool) {
        if appearing {
            if !self.closed {
                self.flush();
            }
            self.current.push(point);
        } else {
            self.current.push(point);
            if !self.closed {
                self.flush();
            }
        }
    }

    /// Both points invisible and in different sectors.
    fn clip_multiple(&mut self, point: Point, sector: Sector) {
        if self.closed {
            let points = transitions::ring_transition(
                self.rect,
                self.previous_point,
                point,
                self.previous_sector,
                sector,
            );
            self.current.extend(points);
        } else if let Some((a, b)) =
            transitions::visible_chord(self.rect, self.previous_point, point)
        {
            self.flush();
            self.done.push(vec![a, b]);
        }
    }

    fn flush(&mut self) {
        if !self.current.is_empty() {
            self.done.push(std::mem::take(&mut self.current));
        }
    }

    fn finish(mut self) -> Vec<Vec<Point>> {
        self.flush();
        let closed = self.closed;
        self.done
            .into_iter()
            .filter_map(|mut piece| {
                if closed {
                    piece.dedup();
                    while piece.len() > 1 && piece.first() == piece.last() {
                        piece.pop();
                    }
                    (piece.len() >= 3).then_some(piece)
                } else {
                    (piece.len() >= 2).then_some(piece)
                }
            })
            .collect()
    }
}

/// A painter wrapper that clips all geometry to the device bounds before
/// handing it on.
pub struct ClipPainter<P> {
    painter: P,
    clip: bool,
    label_margin: f64,
}

impl<P: Painter> ClipPainter<P> {
    pub fn new(painter: P, clip: bool) -> Self {
        Self {
            painter,
            clip,
            label_margin: LABEL_MARGIN,
        }
    }

    pub fn set_screen_clip(&mut self, enable: bool) {
        self.clip = enable;
    }

    pub fn has_screen_clip(&self) -> bool {
        self.clip
    }

    pub fn set_label_margin(&mut self, margin: f64) {
        self.label_margin = margin;
    }

    pub fn painter(&self) -> &P {
        &self.painter
    }

    pub fn painter_mut(&mut self) -> &mut P {
        &mut self.painter
    }

    pub fn into_inner(self) -> P {
        self.painter
    }

    /// Device bounds inflated by the current pen, recomputed per call since
    /// both may change between paint operations.
    pub fn clip_rect(&self) -> ClipRect {
        let (width, height) = self.painter.device_size();
        ClipRect::for_device(width, height, self.painter.pen_width())
    }

    fn label_area(&self) -> LabelArea {
        let (width, height) = self.painter.device_size();
        LabelArea {
            margin: self.label_margin,
            ..LabelArea::new(width, height)
        }
    }

    pub fn label_position(&self, polyline: &[Point], flags: LabelPositionFlags) -> Vec<Point> {
        self.label_area().label_position(polyline, flags)
    }

    /// Clip and draw a polyline, returning label anchors for the visible
    /// pieces.
    pub fn draw_polyline_with_labels(
        &mut self,
        polyline: &[Point],
        flags: LabelPositionFlags,
    ) -> Vec<Point> {
        let area = self.label_area();
        let mut anchors = Vec::new();

        if self.clip {
            let clipper = ScanClipper::new(self.clip_rect());
            for piece in clipper.clip(polyline, false) {
                self.painter.draw_polyline(&piece);
                anchors.extend(area.label_position(&piece, flags));
            }
        } else {
            self.painter.draw_polyline(polyline);
            anchors = area.label_position(polyline, flags);
        }
        anchors
    }
}

impl<P: Painter> Painter for ClipPainter<P> {
    fn device_size(&self) -> (usize, usize) {
        self.painter.device_size()
    }

    fn pen_width(&self) -> f64 {
        self.painter.pen_width()
    }

    fn draw_polygon(&mut self, points: &[Point], fill_rule: FillRule) {
        if !self.clip {
            self.painter.draw_polygon(points, fill_rule);
            return;
        }
        let clipper = ScanClipper::new(self.clip_rect());
        for ring in clipper.clip(points, true) {
            self.painter.draw_polygon(&ring, fill_rule);
        }
    }

    fn draw_polyline(&mut self, points: &[Point]) {
        if !self.clip {
            self.painter.draw_polyline(points);
            return;
        }
        let clipper = ScanClipper::new(self.clip_rect());
        for piece in clipper.clip(points, false) {
            self.painter.draw_polyline(&piece);
        }
    }

    fn draw_image(&mut self, target: PixelRect, image: &Canvas, source: PixelRect) {
        self.painter.draw_image(target, image, source);
    }
}
