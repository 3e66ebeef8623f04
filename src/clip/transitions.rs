//! Border crossings for a segment whose endpoints lie in two different
//! outside sectors, keyed by the ordered pair (current, previous).

use crate::geometry::{slope, ClipRect, Point, Sector};

/// Intersections of the segment's supporting line with the four border lines.
#[derive(Clone, Copy, Debug)]
pub(crate) struct Crossings {
    pub top: Point,
    pub right: Point,
    pub bottom: Point,
    pub left: Point,
}

impl Crossings {
    pub(crate) fn of(rect: &ClipRect, previous: Point, current: Point) -> Self {
        let m = slope(previous, current);
        Self {
            top: rect.clip_top(m, previous),
            right: rect.clip_right(m, previous),
            bottom: rect.clip_bottom(m, previous),
            left: rect.clip_left(m, previous),
        }
    }
}

/// Points a closed ring gains when its edge jumps from `previous` to
/// `current`, both outside. The segment may cut through the visible area
/// (two crossings), graze a corner, or stay outside entirely, in which case
/// only corner points are emitted so the ring keeps wrapping the rectangle.
pub(crate) fn ring_transition(
    rect: &ClipRect,
    previous_point: Point,
    current_point: Point,
    previous: Sector,
    current: Sector,
) -> Vec<Point> {
    let c = Crossings::of(rect, previous_point, current_point);
    let (l, t, r, b) = (rect.left, rect.top, rect.right, rect.bottom);
    let mut out = Vec::with_capacity(5);

    let in_x = |p: Point| p.x > l && p.x < r;
    let in_y = |p: Point| p.y > t && p.y < b;

    match (current.0, previous.0) {
        (0, 5) => {
            out.push(if c.right.y > t { c.right } else { rect.top_right() });
            if c.top.x >= l && c.top.x < r {
                out.push(c.top);
            }
            if c.left.y > t {
                out.push(c.left);
            }
        }
        (0, 7) => {
            out.push(if c.bottom.x > l {
                c.bottom
            } else {
                rect.bottom_left()
            });
            if c.left.y >= t && c.left.y < b {
                out.push(c.left);
            }
            if c.top.x > l {
                out.push(c.top);
            }
        }
        (0, 8) | (8, 0) => {
            // Diagonal jumps: the crossing order follows the walk direction.
            let order = if current.0 == 0 {
                [c.bottom, c.right, c.top, c.left]
            } else {
                [c.top, c.left, c.bottom, c.right]
            };
            for (i, p) in order.into_iter().enumerate() {
                let on_horizontal = i % 2 == 0;
                if (on_horizontal && in_x(p)) || (!on_horizontal && in_y(p)) {
                    out.push(p);
                }
            }
            if c.bottom.x <= l && c.left.y >= b {
                out.push(rect.bottom_left());
            }
            if c.top.x >= r && c.right.y <= t {
                out.push(rect.top_right());
            }
        }

        (1, 3) => {
            out.push(if c.left.y > t { c.left } else { rect.top_left() });
            if c.top.x > l {
                out.push(c.top);
            }
        }
        (1, 5) => {
            out.push(if c.right.y > t { c.right } else { rect.top_right() });
            if c.top.x < r {
                out.push(c.top);
            }
        }
        (1, 6) => {
            if c.bottom.x > l {
                out.push(c.bottom);
            }
            if c.left.y > t && c.left.y <= b {
                out.push(c.left);
            }
            out.push(if c.top.x > l { c.top } else { rect.top_left() });
        }
        (1, 7) => {
            out.push(c.bottom);
            out.push(c.top);
        }
        (1, 8) => {
            if c.bottom.x < r {
                out.push(c.bottom);
            }
            if c.right.y > t && c.right.y <= b {
                out.push(c.right);
            }
            out.push(if c.top.x < r { c.top } else { rect.top_right() });
        }

        (2, 3) => {
            out.push(if c.left.y > t { c.left } else { rect.top_left() });
            if c.top.x > l && c.top.x <= r {
                out.push(c.top);
            }
            if c.right.y > t {
                out.push(c.right);
            }
        }
        (2, 7) => {
            out.push(if c.bottom.x < r {
                c.bottom
            } else {
                rect.bottom_right()
            });
            if c.right.y >= t && c.right.y < b {
                out.push(c.right);
            }
            if c.top.x < r {
                out.push(c.top);
            }
        }
        (2, 6) | (6, 2) => {
            let order = if current.0 == 2 {
                [c.bottom, c.left, c.top, c.right]
            } else {
                [c.top, c.right, c.bottom, c.left]
            };
            for (i, p) in order.into_iter().enumerate() {
                let on_horizontal = i % 2 == 0;
                if (on_horizontal && in_x(p)) || (!on_horizontal && in_y(p)) {
                    out.push(p);
                }
            }
            if c.bottom.x >= r && c.right.y >= b {
                out.push(rect.bottom_right());
            }
            if c.top.x <= l && c.left.y <= t {
                out.push(rect.top_left());
            }
        }

        (3, 7) => {
            if c.bottom.x > l {
                out.push(c.bottom);
            }
            out.push(if c.left.y < b {
                c.left
            } else {
                rect.bottom_left()
            });
        }
        (3, 1) => {
            if c.top.x > l {
                out.push(c.top);
            }
            out.push(if c.left.y > t { c.left } else { rect.top_left() });
        }
        (3, 8) => {
            if c.right.y < b {
                out.push(c.right);
            }
            if c.bottom.x > l && c.bottom.x <= r {
                out.push(c.bottom);
            }
            out.push(if c.left.y < b {
                c.left
            } else {
                rect.bottom_left()
            });
        }
        (3, 5) => {
            out.push(c.right);
            out.push(c.left);
        }
        (3, 2) => {
            if c.right.y > t {
                out.push(c.right);
            }
            if c.top.x > l && c.top.x <= r {
                out.push(c.top);
            }
            out.push(if c.left.y > t { c.left } else { rect.top_left() });
        }

        (5, 7) => {
            if c.bottom.x < r {
                out.push(c.bottom);
            }
            out.push(if c.right.y < b {
                c.right
            } else {
                rect.bottom_right()
            });
        }
        (5, 1) => {
            if c.top.x < r {
                out.push(c.top);
            }
            out.push(if c.right.y > t { c.right } else { rect.top_right() });
        }
        (5, 6) => {
            if c.left.y < b {
                out.push(c.left);
            }
            if c.bottom.x >= l && c.bottom.x < r {
                out.push(c.bottom);
            }
            out.push(if c.right.y < b {
                c.right
            } else {
                rect.bottom_right()
            });
        }
        (5, 3) => {
            out.push(c.left);
            out.push(c.right);
        }
        (5, 0) => {
            if c.left.y > t {
                out.push(c.left);
            }
            if c.top.x >= l && c.top.x < r {
                out.push(c.top);
            }
            out.push(if c.right.y > t { c.right } else { rect.top_right() });
        }

        (6, 5) => {
            out.push(if c.right.y < b {
                c.right
            } else {
                rect.bottom_right()
            });
            if c.bottom.x >= l && c.bottom.x < r {
                out.push(c.bottom);
            }
            if c.left.y < b {
                out.push(c.left);
            }
        }
        (6, 1) => {
            out.push(if c.top.x > l { c.top } else { rect.top_left() });
            if c.left.y > t && c.left.y <= b {
                out.push(c.left);
            }
            if c.bottom.x > l {
                out.push(c.bottom);
            }
        }

        (7, 3) => {
            out.push(if c.left.y < b {
                c.left
            } else {
                rect.bottom_left()
            });
            if c.bottom.x > l {
                out.push(c.bottom);
            }
        }
        (7, 5) => {
            out.push(if c.right.y < b {
                c.right
            } else {
                rect.bottom_right()
            });
            if c.bottom.x < r {
                out.push(c.bottom);
            }
        }
        (7, 0) => {
            if c.top.x > l {
                out.push(c.top);
            }
            if c.left.y >= t && c.left.y < b {
                out.push(c.left);
            }
            out.push(if c.bottom.x > l {
                c.bottom
            } else {
                rect.bottom_left()
            });
        }
        (7, 1) => {
            out.push(c.top);
            out.push(c.bottom);
        }
        (7, 2) => {
            if c.top.x < r {
                out.push(c.top);
            }
            if c.right.y >= t && c.right.y < b {
                out.push(c.right);
            }
            out.push(if c.bottom.x < r {
                c.bottom
            } else {
                rect.bottom_right()
            });
        }

        (8, 3) => {
            out.push(if c.left.y < b {
                c.left
            } else {
                rect.bottom_left()
            });
            if c.bottom.x > l && c.bottom.x <= r {
                out.push(c.bottom);
            }
            if c.right.y < b {
                out.push(c.right);
            }
        }
        (8, 1) => {
            out.push(if c.top.x < r { c.top } else { rect.top_right() });
            if c.right.y > t && c.right.y <= b {
                out.push(c.right);
            }
            if c.bottom.x < r {
                out.push(c.bottom);
            }
        }

        // Moves within one band of outside sectors (e.g. 0 -> 1) never cross
        // the visible area; the corner below keeps the ring wrapped.
        _ => {}
    }

    if let Some(corner) = rect.corner_of(current) {
        out.push(corner);
    }
    out
}

/// The visible part of a segment whose endpoints are both outside, in walk
/// order. `None` when the segment misses the rectangle.
pub(crate) fn visible_chord(
    rect: &ClipRect,
    previous_point: Point,
    current_point: Point,
) -> Option<(Point, Point)> {
    let c = Crossings::of(rect, previous_point, current_point);
    let direction = current_point - previous_point;
    let length2 = direction.length_squared();
    if length2 == 0.0 {
        return None;
    }

    let mut hits: Vec<(f64, Point)> = Vec::with_capacity(4);
    for p in [c.top, c.right, c.bottom, c.left] {
        if !p.is_finite() || !rect.contains(p) {
            continue;
        }
        let t = (p - previous_point).dot(direction) / length2;
        if (0.0..=1.0).contains(&t) {
            hits.push((t, p));
        }
    }
    hits.sort_by(|a, b| a.0.total_cmp(&b.0));

    let (_, first) = *hits.first()?;
    let (_, last) = *hits.last()?;
    if first.distance_squared(last) < 1e-12 {
        return None;
    }
    Some((first, last))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rect() -> ClipRect {
        ClipRect::new(0.0, 0.0, 100.0, 100.0)
    }

    #[test]
    fn test_vertical_pass_through() {
        let points = ring_transition(
            &rect(),
            Point::new(50.0, -10.0),
            Point::new(50.0, 110.0),
            Sector::TOP,
            Sector::BOTTOM,
        );
        assert_eq!(points.len(), 2);
        assert!((points[0].y - 0.0).abs() < 1e-9);
        assert!((points[1].y - 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_corner_sector_appends_corner() {
        // Top edge to the top-left sector without touching the rectangle.
        let points = ring_transition(
            &rect(),
            Point::new(150.0, -50.0),
            Point::new(-50.0, -50.0),
            Sector::TOP_RIGHT,
            Sector::TOP_LEFT,
        );
        assert_eq!(points, vec![Point::new(0.0, 0.0)]);
    }

    #[test]
    fn test_diagonal_cut_through() {
        let points = ring_transition(
            &rect(),
            Point::new(-50.0, -50.0),
            Point::new(150.0, 150.0),
            Sector::TOP_LEFT,
            Sector::BOTTOM_RIGHT,
        );
        // Passing exactly through both corners.
        assert_eq!(points.last(), Some(&Point::new(100.0, 100.0)));
    }

    #[test]
    fn test_chord_of_horizontal_segment() {
        let chord = visible_chord(&rect(), Point::new(-10.0, 40.0), Point::new(110.0, 40.0));
        let (a, b) = chord.expect("segment crosses the rectangle");
        assert_eq!(a, Point::new(0.0, 40.0));
        assert_eq!(b, Point::new(100.0, 40.0));
    }

    #[test]
    fn test_chord_misses() {
        let chord = visible_chord(&rect(), Point::new(-10.0, -5.0), Point::new(110.0, -20.0));
        assert!(chord.is_none());
    }
}
