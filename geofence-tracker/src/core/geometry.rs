/*!
Pure geometric primitives: great-circle distance, point-in-polygon containment
and short-range coordinate projection
*/

use serde::{Deserialize, Serialize};

/// Mean Earth radius in meters
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// A WGS84 position in decimal degrees
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinate {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// Whether both components lie within the valid WGS84 ranges
    pub fn in_range(&self) -> bool {
        (-90.0..=90.0).contains(&self.latitude) && (-180.0..=180.0).contains(&self.longitude)
    }
}

/// Great-circle distance between two coordinates in meters, via the haversine
/// formula.
pub fn haversine_distance(a: Coordinate, b: Coordinate) -> f64 {
    let lat_a = a.latitude.to_radians();
    let lat_b = b.latitude.to_radians();
    let d_lat = (b.latitude - a.latitude).to_radians();
    let d_lon = (b.longitude - a.longitude).to_radians();

    let h = (d_lat / 2.0).sin().powi(2) + lat_a.cos() * lat_b.cos() * (d_lon / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_M * h.sqrt().min(1.0).asin()
}

/// Even-odd (ray casting) containment test treating (lat, lon) as planar
/// coordinates.
///
/// Valid for polygons whose extent is small relative to Earth's curvature;
/// this is not a geodesic test. Points exactly on a vertex or edge resolve
/// one way or the other, but always the same way for identical input.
/// Callers must reject polygons with fewer than 3 vertices.
pub fn point_in_polygon(point: Coordinate, vertices: &[Coordinate]) -> bool {
    let mut inside = false;
    let mut j = vertices.len() - 1;
    for i in 0..vertices.len() {
        let a = vertices[i];
        let b = vertices[j];
        if (a.latitude > point.latitude) != (b.latitude > point.latitude) {
            let crossing = (b.longitude - a.longitude) * (point.latitude - a.latitude)
                / (b.latitude - a.latitude)
                + a.longitude;
            if point.longitude < crossing {
                inside = !inside;
            }
        }
        j = i;
    }
    inside
}

/// Project a destination point from `origin` along `heading_deg` for
/// `distance_m` meters using an equirectangular approximation.
///
/// Accurate for the short per-tick steps the synthetic feed produces; not
/// intended for long geodesics. The result is clamped back into valid
/// latitude range and wrapped across the antimeridian.
pub fn project_destination(origin: Coordinate, heading_deg: f64, distance_m: f64) -> Coordinate {
    let heading = heading_deg.to_radians();
    let d_lat = distance_m * heading.cos() / EARTH_RADIUS_M;
    // Longitude spacing shrinks with latitude; keep the divisor off zero at the poles.
    let lat_scale = origin.latitude.to_radians().cos().abs().max(1e-12);
    let d_lon = distance_m * heading.sin() / (EARTH_RADIUS_M * lat_scale);

    let latitude = (origin.latitude + d_lat.to_degrees()).clamp(-90.0, 90.0);
    let mut longitude = origin.longitude + d_lon.to_degrees();
    if longitude > 180.0 {
        longitude -= 360.0;
    } else if longitude < -180.0 {
        longitude += 360.0;
    }

    Coordinate {
        latitude,
        longitude,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_distance_is_symmetric_and_zero_on_identity() {
        let pairs = [
            (Coordinate::new(40.7128, -74.0060), Coordinate::new(34.0522, -118.2437)),
            (Coordinate::new(-33.8688, 151.2093), Coordinate::new(51.5074, -0.1278)),
            (Coordinate::new(0.0, 179.9), Coordinate::new(0.0, -179.9)),
        ];
        for (a, b) in pairs {
            assert!((haversine_distance(a, b) - haversine_distance(b, a)).abs() < 1e-9);
            assert_eq!(haversine_distance(a, a), 0.0);
        }
    }

    #[test]
    fn test_distance_one_degree_of_latitude() {
        let a = Coordinate::new(0.0, 0.0);
        let b = Coordinate::new(1.0, 0.0);
        let expected = EARTH_RADIUS_M * std::f64::consts::PI / 180.0;
        assert!((haversine_distance(a, b) - expected).abs() < 1e-6);
    }

    #[test]
    fn test_distance_antipodal() {
        let a = Coordinate::new(0.0, 0.0);
        let b = Coordinate::new(0.0, 180.0);
        let expected = EARTH_RADIUS_M * std::f64::consts::PI;
        let d = haversine_distance(a, b);
        assert!((d - expected).abs() / expected < 1e-6);
    }

    #[test]
    fn test_point_in_unit_square() {
        let square = [
            Coordinate::new(0.0, 0.0),
            Coordinate::new(0.0, 1.0),
            Coordinate::new(1.0, 1.0),
            Coordinate::new(1.0, 0.0),
        ];
        assert!(point_in_polygon(Coordinate::new(0.5, 0.5), &square));
        assert!(!point_in_polygon(Coordinate::new(5.0, 5.0), &square));
        assert!(!point_in_polygon(Coordinate::new(0.5, -3.0), &square));
    }

    #[test]
    fn test_point_on_edge_is_deterministic() {
        let square = [
            Coordinate::new(0.0, 0.0),
            Coordinate::new(0.0, 1.0),
            Coordinate::new(1.0, 1.0),
            Coordinate::new(1.0, 0.0),
        ];
        let edge = Coordinate::new(0.5, 0.0);
        let vertex = Coordinate::new(1.0, 1.0);
        for point in [edge, vertex] {
            let first = point_in_polygon(point, &square);
            for _ in 0..10 {
                assert_eq!(point_in_polygon(point, &square), first);
            }
        }
    }

    #[test]
    fn test_concave_polygon() {
        // U-shaped polygon: the notch at the top center is outside.
        let u_shape = [
            Coordinate::new(0.0, 0.0),
            Coordinate::new(3.0, 0.0),
            Coordinate::new(3.0, 1.0),
            Coordinate::new(1.0, 1.0),
            Coordinate::new(1.0, 2.0),
            Coordinate::new(3.0, 2.0),
            Coordinate::new(3.0, 3.0),
            Coordinate::new(0.0, 3.0),
        ];
        assert!(point_in_polygon(Coordinate::new(0.5, 1.5), &u_shape));
        assert!(!point_in_polygon(Coordinate::new(2.0, 1.5), &u_shape));
    }

    #[test]
    fn test_project_destination_round_trip_distance() {
        let origin = Coordinate::new(40.7128, -74.0060);
        for heading in [0.0, 45.0, 90.0, 180.0, 270.0] {
            let dest = project_destination(origin, heading, 1000.0);
            let d = haversine_distance(origin, dest);
            assert!((d - 1000.0).abs() < 2.0, "heading {heading}: got {d}");
        }
    }

    #[test]
    fn test_project_destination_stays_in_range() {
        let near_pole = Coordinate::new(89.9999, 0.0);
        let dest = project_destination(near_pole, 0.0, 100_000.0);
        assert!(dest.in_range());

        let near_antimeridian = Coordinate::new(0.0, 179.9999);
        let dest = project_destination(near_antimeridian, 90.0, 10_000.0);
        assert!(dest.in_range());
    }

    #[test]
    fn test_coordinate_range_checks() {
        assert!(Coordinate::new(90.0, 180.0).in_range());
        assert!(Coordinate::new(-90.0, -180.0).in_range());
        assert!(!Coordinate::new(90.1, 0.0).in_range());
        assert!(!Coordinate::new(0.0, -180.1).in_range());
    }
}
