use glam::DVec3;

use super::Projection;

/// Orthonormal frame at the projection center: `forward` points from the
/// globe's center to the center point, `right` east and `up` north.
#[derive(Clone, Copy, Debug)]
pub struct AzimuthalFrame {
    forward: DVec3,
    right: DVec3,
    up: DVec3,
}

impl AzimuthalFrame {
    pub fn new(center_lon: f64, center_lat: f64) -> Self {
        let (sin_lon, cos_lon) = center_lon.sin_cos();
        let (sin_lat, cos_lat) = center_lat.sin_cos();
        Self {
            forward: DVec3::new(cos_lat * cos_lon, cos_lat * sin_lon, sin_lat),
            right: DVec3::new(-sin_lon, cos_lon, 0.0),
            up: DVec3::new(-sin_lat * cos_lon, -sin_lat * sin_lon, cos_lat),
        }
    }

    /// Projected plane coordinates (unit radius, y north) of a geographic
    /// point, `None` when the projection cannot show it.
    pub fn project(&self, projection: Projection, lon: f64, lat: f64) -> Option<(f64, f64)> {
        let p = lonlat_to_vec3(lon, lat);
        let cos_c = p.dot(self.forward);
        let sx = p.dot(self.right);
        let sy = p.dot(self.up);

        let k = match projection {
            Projection::Spherical if cos_c >= 0.0 => 1.0,
            Projection::Gnomonic if cos_c > 1e-9 => 1.0 / cos_c,
            Projection::Stereographic if 1.0 + cos_c > 1e-9 => 2.0 / (1.0 + cos_c),
            _ => return None,
        };
        Some((sx * k, sy * k))
    }

    /// Like [`AzimuthalFrame::project`], but points the projection cannot
    /// show are pushed onto the border of the projected disc. Used to fill
    /// polygons that reach round the back of the globe.
    pub fn project_onto_disc(&self, projection: Projection, lon: f64, lat: f64) -> (f64, f64) {
        if let Some(point) = self.project(projection, lon, lat) {
            return point;
        }
        let p = lonlat_to_vec3(lon, lat);
        let (sx, sy) = (p.dot(self.right), p.dot(self.up));
        let length = sx.hypot(sy);
        let radius = projection.clipping_radius();
        if length < 1e-12 {
            return (0.0, radius);
        }
        (sx / length * radius, sy / length * radius)
    }

    /// Inverse of [`AzimuthalFrame::project`] for plane coordinates inside
    /// the projection's clipping radius.
    pub fn unproject(&self, projection: Projection, x: f64, y: f64) -> Option<(f64, f64)> {
        let rho = x.hypot(y);
        if rho > projection.clipping_radius() {
            return None;
        }
        let c = match projection {
            Projection::Spherical => rho.min(1.0).asin(),
            Projection::Gnomonic => rho.atan(),
            Projection::Stereographic => 2.0 * (rho / 2.0).atan(),
            _ => return None,
        };

        let p = if rho < 1e-12 {
            self.forward
        } else {
            let (sin_c, cos_c) = c.sin_cos();
            self.forward * cos_c + (self.right * x + self.up * y) * (sin_c / rho)
        };

        let lat = p.z.clamp(-1.0, 1.0).asin();
        let lon = p.y.atan2(p.x);
        Some((lon, lat))
    }
}

/// Convert lon/lat (radians) to a unit sphere vector.
#[inline(always)]
pub fn lonlat_to_vec3(lon: f64, lat: f64) -> DVec3 {
    let (sin_lon, cos_lon) = lon.sin_cos();
    let (sin_lat, cos_lat) = lat.sin_cos();
    DVec3::new(cos_lat * cos_lon, cos_lat * sin_lon, sin_lat)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_center_projects_to_origin() {
        let frame = AzimuthalFrame::new(0.3, 0.5);
        for projection in [
            Projection::Spherical,
            Projection::Gnomonic,
            Projection::Stereographic,
        ] {
            let (x, y) = frame.project(projection, 0.3, 0.5).unwrap();
            assert!(x.abs() < 1e-12 && y.abs() < 1e-12);
        }
    }

    #[test]
    fn test_east_is_right_north_is_up() {
        let frame = AzimuthalFrame::new(0.0, 0.0);
        let (x, _) = frame.project(Projection::Spherical, 0.2, 0.0).unwrap();
        let (_, y) = frame.project(Projection::Spherical, 0.0, 0.2).unwrap();
        assert!(x > 0.0);
        assert!(y > 0.0);
    }

    #[test]
    fn test_back_side_is_hidden() {
        let frame = AzimuthalFrame::new(0.0, 0.0);
        assert!(frame
            .project(Projection::Spherical, std::f64::consts::PI, 0.0)
            .is_none());
        assert!(frame.project(Projection::Gnomonic, 1.6, 0.0).is_none());
    }

    #[test]
    fn test_hidden_points_land_on_the_limb() {
        let frame = AzimuthalFrame::new(0.0, 0.0);
        let (x, y) = frame.project_onto_disc(Projection::Spherical, 2.5, 0.0);
        assert!((x - 1.0).abs() < 1e-12);
        assert!(y.abs() < 1e-12);
        let visible = frame.project_onto_disc(Projection::Spherical, 0.2, 0.1);
        assert_eq!(Some(visible), frame.project(Projection::Spherical, 0.2, 0.1));
    }

    #[test]
    fn test_round_trip() {
        let frame = AzimuthalFrame::new(-1.0, 0.8);
        for projection in [
            Projection::Spherical,
            Projection::Gnomonic,
            Projection::Stereographic,
        ] {
            let (x, y) = frame.project(projection, -0.8, 0.6).unwrap();
            let (lon, lat) = frame.unproject(projection, x, y).unwrap();
            assert!((lon + 0.8).abs() < 1e-9, "{projection:?}");
            assert!((lat - 0.6).abs() < 1e-9, "{projection:?}");
        }
    }
}
