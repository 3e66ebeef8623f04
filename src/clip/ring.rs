//! Clipping of closed rings against a geographic box.
//!
//! The base ring is split wherever it crosses the box border; every crossing
//! is tagged entering or leaving and linked into both the base ring and the
//! (optionally densified) clip ring. Output rings are traced by walking the
//! base ring from an entering crossing to the next leaving one, then the clip
//! ring clockwise to the next entering crossing, until the walk closes.
//! Nodes live in index arenas; links are plain indices.

use tracing::trace;

use super::ScanClipper;
use crate::geometry::{ring_contains, signed_area2, ClipRect, LatLonBox, Point};

/// Walks longer than this many nodes per input node indicate a broken
/// arena; they are cut short.
const MAX_WALK_FACTOR: usize = 20;

const PARAM_EPSILON: f64 = 1e-12;

#[derive(Clone, Copy, Debug)]
struct Node {
    point: Point,
    next: usize,
    crossing: Option<usize>,
}

#[derive(Clone, Copy, Debug)]
struct Crossing {
    point: Point,
    entering: bool,
    base: usize,
    clip: usize,
    processed: bool,
}

#[derive(Debug, Default)]
struct Arena {
    base: Vec<Node>,
    clip: Vec<Node>,
    crossings: Vec<Crossing>,
}

/// Ring clipper for geographic boxes.
#[derive(Clone, Debug)]
pub struct RingClipper {
    rect: ClipRect,
    points_at_edges: usize,
    clip_ring: Vec<Point>,
}

impl RingClipper {
    /// Clipper for a lat/lon box. Points handed to [`RingClipper::clip`]
    /// are `(lon, -lat)`; [`RingClipper::clip_geo`] does the flipping.
    pub fn new(bounds: &LatLonBox, points_at_edges: usize) -> Self {
        Self::from_rect(ClipRect::from_lat_lon_box(bounds), points_at_edges)
    }

    pub fn from_rect(rect: ClipRect, points_at_edges: usize) -> Self {
        let clip_ring = densified_ring(&rect, points_at_edges);
        Self {
            rect,
            points_at_edges,
            clip_ring,
        }
    }

    pub fn rect(&self) -> &ClipRect {
        &self.rect
    }

    pub fn points_at_edges(&self) -> usize {
        self.points_at_edges
    }

    /// The clip rectangle as a clockwise ring including the extra edge
    /// points.
    pub fn clip_ring(&self) -> &[Point] {
        &self.clip_ring
    }

    /// Clip a ring or polyline. Open polylines go through the sector based
    /// scan clipper, which already handles them in a single pass.
    pub fn clip(&self, polygon: &[Point], is_closed: bool) -> Vec<Vec<Point>> {
        if !is_closed {
            return ScanClipper::new(self.rect).clip(polygon, false);
        }

        let mut ring: Vec<Point> = polygon.to_vec();
        ring.dedup();
        while ring.len() > 1 && ring.first() == ring.last() {
            ring.pop();
        }
        if ring.len() < 3 {
            return Vec::new();
        }
        // The walk follows the clip ring clockwise, so the base ring has to
        // run the same way.
        if signed_area2(&ring) < 0.0 {
            ring.reverse();
        }

        let mut arena = self.build_arena(&ring);

        if arena.crossings.is_empty() {
            return self.without_crossings(ring);
        }

        let rings = walk(&mut arena, ring.len() + self.clip_ring.len());
        trace!(
            input = polygon.len(),
            crossings = arena.crossings.len(),
            rings = rings.len(),
            "ring clipped"
        );
        rings
    }

    /// Clip `(lon, lat)` pairs, flipping latitude into screen orientation
    /// and back.
    pub fn clip_geo(&self, polygon: &[(f64, f64)], is_closed: bool) -> Vec<Vec<(f64, f64)>> {
        let flipped: Vec<Point> = polygon
            .iter()
            .map(|&(lon, lat)| Point::new(lon, -lat))
            .collect();
        self.clip(&flipped, is_closed)
            .into_iter()
            .map(|ring| ring.into_iter().map(|p| (p.x, -p.y)).collect())
            .collect()
    }

    fn without_crossings(&self, ring: Vec<Point>) -> Vec<Vec<Point>> {
        let all_inside = ring.iter().all(|&p| self.rect.contains(p));
        if all_inside {
            return vec![ring];
        }
        let center = Point::new(
            (self.rect.left + self.rect.right) / 2.0,
            (self.rect.top + self.rect.bottom) / 2.0,
        );
        if ring_contains(&ring, center) {
            vec![self.clip_ring.clone()]
        } else {
            Vec::new()
        }
    }

    fn build_arena(&self, ring: &[Point]) -> Arena {
        // Every vertex and border crossing, each tagged with whether the
        // piece following it lies inside the rectangle.
        let mut marks: Vec<(Point, bool)> = Vec::with_capacity(ring.len() * 2);
        for (i, &a) in ring.iter().enumerate() {
            let b = ring[(i + 1) % ring.len()];
            let mut params = self.border_params(a, b);
            params.sort_by(|x, y| x.0.total_cmp(&y.0));
            params.dedup_by(|x, y| (x.0 - y.0).abs() < PARAM_EPSILON);

            let mut from = 0.0;
            let mut from_point = a;
            for &(t, point) in params.iter().chain(std::iter::once(&(1.0, b))) {
                let mid = a.lerp(b, (from + t) / 2.0);
                marks.push((from_point, self.rect.contains(mid)));
                from = t;
                from_point = point;
            }
        }

        let mut arena = Arena::default();
        let count = marks.len();
        for (j, &(point, inside_after)) in marks.iter().enumerate() {
            let inside_before = marks[(j + count - 1) % count].1;
            let crossing = (inside_before != inside_after).then(|| {
                arena.crossings.push(Crossing {
                    point,
                    entering: inside_after,
                    base: j,
                    clip: 0,
                    processed: false,
                });
                arena.crossings.len() - 1
            });
            arena.base.push(Node {
                point,
                next: (j + 1) % count,
                crossing,
            });
        }

        if arena.crossings.is_empty() {
            return arena;
        }

        // Clip ring: its own vertices and the crossings, ordered along the
        // clockwise perimeter.
        let mut order: Vec<(f64, Point, Option<usize>)> = self
            .clip_ring
            .iter()
            .map(|&p| (self.rect.perimeter_position(p), p, None))
            .collect();
        for (k, crossing) in arena.crossings.iter().enumerate() {
            order.push((
                self.rect.perimeter_position(crossing.point),
                crossing.point,
                Some(k),
            ));
        }
        order.sort_by(|a, b| a.0.total_cmp(&b.0));

        let count = order.len();
        for (i, &(_, point, crossing)) in order.iter().enumerate() {
            if let Some(k) = crossing {
                arena.crossings[k].clip = i;
            }
            arena.clip.push(Node {
                point,
                next: (i + 1) % count,
                crossing,
            });
        }
        arena
    }

    /// Segment parameters in (0, 1) where `a -> b` meets the border, with
    /// the crossing point placed exactly on the border line it meets.
    fn border_params(&self, a: Point, b: Point) -> Vec<(f64, Point)> {
        let r = &self.rect;
        let d = b - a;
        let mut params = Vec::new();

        if d.x != 0.0 {
            for x in [r.left, r.right] {
                let t = (x - a.x) / d.x;
                let y = a.y + t * d.y;
                if t > PARAM_EPSILON && t < 1.0 - PARAM_EPSILON && y >= r.top && y <= r.bottom {
                    params.push((t, Point::new(x, y)));
                }
            }
        }
        if d.y != 0.0 {
            for y in [r.top, r.bottom] {
                let t = (y - a.y) / d.y;
                let x = a.x + t * d.x;
                if t > PARAM_EPSILON && t < 1.0 - PARAM_EPSILON && x >= r.left && x <= r.right {
                    params.push((t, Point::new(x, y)));
                }
            }
        }
        params
    }
}

fn densified_ring(rect: &ClipRect, points_at_edges: usize) -> Vec<Point> {
    let corners = rect.corners();
    let mut ring = Vec::with_capacity(4 * (points_at_edges + 1));
    for (i, &corner) in corners.iter().enumerate() {
        let next = corners[(i + 1) % corners.len()];
        ring.push(corner);
        let delta = (next - corner) / (points_at_edges + 1) as f64;
        for step in 1..=points_at_edges {
            ring.push(corner + delta * step as f64);
        }
    }
    ring
}

fn walk(arena: &mut Arena, node_count: usize) -> Vec<Vec<Point>> {
    let limit = MAX_WALK_FACTOR * node_count.max(1);
    let mut rings = Vec::new();

    for start in 0..arena.crossings.len() {
        let crossing = arena.crossings[start];
        if !crossing.entering || crossing.processed {
            continue;
        }

        let mut ring = Vec::new();
        let mut current = start;
        let mut steps = 0usize;

        'trace: loop {
            arena.crossings[current].processed = true;
            ring.push(arena.crossings[current].point);

            // Along the base ring to the leaving crossing.
            let mut node = arena.base[arena.crossings[current].base].next;
            let leaving = loop {
                steps += 1;
                if steps > limit {
                    break 'trace;
                }
                let n = arena.base[node];
                match n.crossing {
                    Some(k) => break k,
                    None => {
                        ring.push(n.point);
                        node = n.next;
                    }
                }
            };
            arena.crossings[leaving].processed = true;
            ring.push(arena.crossings[leaving].point);

            // Along the clip ring to the next entering crossing.
            let mut node = arena.clip[arena.crossings[leaving].clip].next;
            let entering = loop {
                steps += 1;
                if steps > limit {
                    break 'trace;
                }
                let n = arena.clip[node];
                match n.crossing {
                    Some(k) if arena.crossings[k].entering => break k,
                    Some(_) => node = n.next,
                    None => {
                        ring.push(n.point);
                        node = n.next;
                    }
                }
            };

            if entering == start {
                break;
            }
            current = entering;
        }

        debug_assert!(steps <= limit, "ring walk did not close");

        ring.dedup();
        while ring.len() > 1 && ring.first() == ring.last() {
            ring.pop();
        }
        if ring.len() >= 3 {
            rings.push(ring);
        }
    }
    rings
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hash::{hash3, unit_float};

    fn clipper(points_at_edges: usize) -> RingClipper {
        RingClipper::from_rect(ClipRect::new(0.0, 0.0, 100.0, 100.0), points_at_edges)
    }

    fn square(min: f64, max: f64) -> Vec<Point> {
        vec![
            Point::new(min, min),
            Point::new(max, min),
            Point::new(max, max),
            Point::new(min, max),
        ]
    }

    #[test]
    fn test_inside_ring_returned_unchanged() {
        let ring = square(10.0, 20.0);
        assert_eq!(clipper(0).clip(&ring, true), vec![ring]);
    }

    #[test]
    fn test_enclosing_ring_yields_clip_ring() {
        let rings = clipper(1).clip(&square(-50.0, 150.0), true);
        assert_eq!(rings.len(), 1);
        assert_eq!(rings[0].len(), 8);
        assert_eq!(rings[0][0], Point::new(0.0, 0.0));
        assert_eq!(rings[0][1], Point::new(50.0, 0.0));
    }

    #[test]
    fn test_outside_ring_is_dropped() {
        assert!(clipper(0).clip(&square(200.0, 300.0), true).is_empty());
    }

    #[test]
    fn test_overlapping_square() {
        let rings = clipper(0).clip(&square(50.0, 150.0), true);
        assert_eq!(rings.len(), 1);
        let ring = &rings[0];
        assert_eq!(ring.len(), 4);
        for corner in square(50.0, 100.0) {
            assert!(ring.contains(&corner), "{corner:?} missing from {ring:?}");
        }
    }

    #[test]
    fn test_counter_clockwise_input_is_handled() {
        let mut ring = square(50.0, 150.0);
        ring.reverse();
        let rings = clipper(0).clip(&ring, true);
        assert_eq!(rings.len(), 1);
        assert_eq!(rings[0].len(), 4);
    }

    #[test]
    fn test_u_shape_splits_into_two_rings() {
        // A U opening downwards whose legs cross the bottom edge and whose
        // base lies below it.
        let ring = vec![
            Point::new(10.0, 50.0),
            Point::new(40.0, 50.0),
            Point::new(40.0, 150.0),
            Point::new(60.0, 150.0),
            Point::new(60.0, 50.0),
            Point::new(90.0, 50.0),
            Point::new(90.0, 200.0),
            Point::new(10.0, 200.0),
        ];
        let rings = clipper(0).clip(&ring, true);
        assert_eq!(rings.len(), 2);
        for ring in rings {
            assert_eq!(ring.len(), 4);
            assert!(ring.iter().all(|p| p.y >= 50.0 && p.y <= 100.0));
        }
    }

    #[test]
    fn test_geo_box_flips_latitude() {
        let clipper = RingClipper::new(&LatLonBox::new(10.0, 0.0, 10.0, 0.0), 0);
        let rings = clipper.clip_geo(
            &[(5.0, 5.0), (20.0, 5.0), (20.0, 8.0), (5.0, 8.0)],
            true,
        );
        assert_eq!(rings.len(), 1);
        assert!(rings[0].iter().all(|&(lon, lat)| lon <= 10.0 && lat >= 5.0));
    }

    /// Clip against the rectangle one half plane at a time.
    fn half_plane_clip(ring: &[Point], rect: &ClipRect) -> Vec<Point> {
        let planes: [fn(Point, &ClipRect) -> f64; 4] = [
            |p: Point, r: &ClipRect| p.x - r.left,
            |p: Point, r: &ClipRect| r.right - p.x,
            |p: Point, r: &ClipRect| p.y - r.top,
            |p: Point, r: &ClipRect| r.bottom - p.y,
        ];
        let mut out = ring.to_vec();
        for distance in planes {
            let input = std::mem::take(&mut out);
            let Some(&last) = input.last() else {
                break;
            };
            let mut prev = last;
            for &p in &input {
                let (dp, dc) = (distance(prev, rect), distance(p, rect));
                if (dp >= 0.0) != (dc >= 0.0) {
                    out.push(prev.lerp(p, dp / (dp - dc)));
                }
                if dc >= 0.0 {
                    out.push(p);
                }
                prev = p;
            }
        }
        out
    }

    /// A simple ring: vertices at increasing angles around a centre.
    fn star_ring(case: u64) -> Vec<Point> {
        let u = |k: u64| unit_float(hash3(case, k, 0x51a2));
        let center = Point::new(50.0 + 120.0 * (u(0) - 0.5), 50.0 + 120.0 * (u(1) - 0.5));
        let count = 5 + (u(2) * 10.0) as u64;
        (0..count)
            .map(|i| {
                let angle = (i as f64 + 0.8 * u(10 + i)) * std::f64::consts::TAU / count as f64;
                let radius = 20.0 + 100.0 * u(100 + i);
                center + Point::new(angle.cos(), angle.sin()) * radius
            })
            .collect()
    }

    #[test]
    fn test_crossings_lie_exactly_on_the_border() {
        let clipper = clipper(0);
        let crossings = clipper.border_params(Point::new(-3.4789, 37.5594), Point::new(61.3, -28.77));
        assert_eq!(crossings.len(), 2);
        for (_, p) in crossings {
            assert!(p.x == 0.0 || p.y == 0.0, "{p:?}");
        }
    }

    #[test]
    fn test_star_rings_match_half_plane_clipping() {
        let clipper = clipper(0);
        for case in 0..300 {
            let ring = star_ring(case);
            let expected = signed_area2(&half_plane_clip(&ring, clipper.rect())).abs() / 2.0;

            let rings = clipper.clip(&ring, true);
            let area: f64 = rings.iter().map(|r| signed_area2(r).abs() / 2.0).sum();
            assert!(
                (area - expected).abs() < 1e-6 * expected.max(1.0),
                "case {case}: area {area}, expected {expected}, rings {rings:?}"
            );
            for p in rings.iter().flatten() {
                assert!(clipper.rect().contains(*p), "case {case}: {p:?} outside");
            }
        }
    }

    #[test]
    fn test_open_polyline_uses_scan_clipper() {
        let line = vec![Point::new(-10.0, 50.0), Point::new(50.0, 50.0)];
        let pieces = clipper(3).clip(&line, false);
        assert_eq!(pieces, vec![vec![Point::new(0.0, 50.0), Point::new(50.0, 50.0)]]);
    }
}
