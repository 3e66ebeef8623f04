use crate::geometry::{slope, Point};

/// Default distance between a label anchor and the viewport border.
pub const LABEL_MARGIN: f64 = 10.0;

/// Where along a line labels may be placed. Plain booleans: several flags
/// may be combined.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct LabelPositionFlags {
    pub line_center: bool,
    pub line_start: bool,
    pub line_end: bool,
    pub ignore_x_margin: bool,
    pub ignore_y_margin: bool,
}

impl LabelPositionFlags {
    pub fn center() -> Self {
        Self {
            line_center: true,
            ..Self::default()
        }
    }

    pub fn start_and_end() -> Self {
        Self {
            line_start: true,
            line_end: true,
            ..Self::default()
        }
    }
}

/// Label placement against a viewport of the given size.
#[derive(Clone, Copy, Debug)]
pub struct LabelArea {
    pub width: f64,
    pub height: f64,
    pub margin: f64,
}

impl LabelArea {
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width: width as f64,
            height: height as f64,
            margin: LABEL_MARGIN,
        }
    }

    #[inline]
    pub fn point_allows_label(&self, point: Point) -> bool {
        point.x > self.margin
            && point.x < self.width - self.margin
            && point.y > self.margin
            && point.y < self.height - self.margin
    }

    /// Move from `previous` (outside the label area) towards `current` until
    /// the label margin is reached.
    pub fn interpolate_label_point(
        &self,
        previous: Point,
        current: Point,
        flags: LabelPositionFlags,
    ) -> Option<Point> {
        let m = slope(previous, current);
        let margin = self.margin;

        if previous.x <= margin {
            if flags.ignore_x_margin {
                return None;
            }
            return Some(Point::new(margin, previous.y + (margin - previous.x) * m));
        }
        if previous.x >= self.width - margin {
            if flags.ignore_x_margin {
                return None;
            }
            return Some(Point::new(
                self.width - margin,
                previous.y - (previous.x - self.width + margin) * m,
            ));
        }
        if previous.y <= margin {
            if flags.ignore_y_margin {
                return None;
            }
            return Some(Point::new(previous.x + (margin - previous.y) / m, margin));
        }
        if previous.y >= self.height - margin {
            if flags.ignore_y_margin {
                return None;
            }
            return Some(Point::new(
                previous.x - (previous.y - self.height + margin) / m,
                self.height - margin,
            ));
        }
        None
    }

    /// Label anchors for a (clipped) polyline.
    pub fn label_position(&self, polyline: &[Point], flags: LabelPositionFlags) -> Vec<Point> {
        let mut anchors = Vec::new();
        if polyline.is_empty() {
            return anchors;
        }

        if flags.line_center {
            anchors.push(polyline[polyline.len() / 2]);
        }

        // An eligible endpoint is taken as is. The first eligible vertex
        // after it adds an anchor on the margin when its predecessor lies
        // outside the label area.
        if flags.line_start {
            if self.point_allows_label(polyline[0]) {
                anchors.push(polyline[0]);
            }
            if let Some(it) = (1..polyline.len()).find(|&it| self.point_allows_label(polyline[it])) {
                anchors.extend(self.interpolate_label_point(polyline[it - 1], polyline[it], flags));
            }
        }

        if flags.line_end && polyline.len() > 1 {
            let last = polyline.len() - 1;
            if self.point_allows_label(polyline[last]) {
                anchors.push(polyline[last]);
            }
            if let Some(it) = (1..last).rev().find(|&it| self.point_allows_label(polyline[it])) {
                anchors.extend(self.interpolate_label_point(polyline[it + 1], polyline[it], flags));
            }
        }

        anchors
    }
}
