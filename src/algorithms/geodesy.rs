//! Spherical geodesy kernel
//!
//! Stateless functions over a spherical Earth model:
//! - Great-circle distance (optionally adjusted by an altitude delta)
//! - Initial bearing between two points
//! - Destination point and sampled geodesic arcs
//! - Intersection of two bearing rays

use crate::core::{Coordinate, EARTH_RADIUS_M};
use std::f64::consts::{FRAC_PI_2, PI};
use std::iter::FusedIterator;

/// Sines below this are treated as zero when testing rays for parallelism
const PARALLEL_TOLERANCE: f64 = 1e-12;

/// Origins closer than this (radians of arc) are treated as the same point
const COINCIDENT_TOLERANCE: f64 = 1e-12;

/// Largest disagreement (degrees) between a ray's azimuth and the bearing to its intersection
const FORWARD_BEARING_TOLERANCE_DEG: f64 = 1e-3;

/// Normalize any angle in degrees into [0, 360)
pub fn normalize_bearing(degrees: f64) -> f64 {
    let normalized = degrees.rem_euclid(360.0);
    // rem_euclid can round up to exactly 360 for tiny negative inputs
    if normalized >= 360.0 {
        0.0
    } else {
        normalized
    }
}

/// Normalize a longitude into [-180, 180)
pub fn normalize_longitude(degrees: f64) -> f64 {
    (degrees + 540.0).rem_euclid(360.0) - 180.0
}

/// Smallest absolute difference between two bearings (degrees, in [0, 180])
pub fn bearing_difference(a: f64, b: f64) -> f64 {
    let diff = normalize_bearing(a - b);
    if diff > 180.0 {
        360.0 - diff
    } else {
        diff
    }
}

fn central_angle(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let phi1 = lat1.to_radians();
    let phi2 = lat2.to_radians();
    let d_phi = (lat2 - lat1).to_radians();
    let d_lambda = (lon2 - lon1).to_radians();

    let a = (d_phi / 2.0).sin().powi(2) + phi1.cos() * phi2.cos() * (d_lambda / 2.0).sin().powi(2);
    2.0 * a.sqrt().atan2((1.0 - a).max(0.0).sqrt())
}

/// Distance in meters between two points.
///
/// Haversine great-circle distance, combined with the altitude difference
/// `alt1 - alt2` as the vertical leg of a right triangle.
pub fn distance(lat1: f64, lon1: f64, lat2: f64, lon2: f64, alt1: f64, alt2: f64) -> f64 {
    let surface = EARTH_RADIUS_M * central_angle(lat1, lon1, lat2, lon2);
    let height = alt1 - alt2;
    (surface * surface + height * height).sqrt()
}

/// Surface distance in meters, ignoring altitude
pub fn aerial_distance(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    distance(lat1, lon1, lat2, lon2, 0.0, 0.0)
}

/// Initial great-circle bearing from the first point to the second, in [0, 360)
pub fn bearing(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let phi1 = lat1.to_radians();
    let phi2 = lat2.to_radians();
    let d_lambda = (lon2 - lon1).to_radians();

    let y = d_lambda.sin() * phi2.cos();
    let x = phi1.cos() * phi2.sin() - phi1.sin() * phi2.cos() * d_lambda.cos();

    normalize_bearing(y.atan2(x).to_degrees())
}

/// Point reached by travelling `distance_m` from the origin along `azimuth_deg`
pub fn destination(lat: f64, lon: f64, azimuth_deg: f64, distance_m: f64) -> Coordinate {
    let delta = distance_m / EARTH_RADIUS_M;
    let theta = azimuth_deg.to_radians();
    let phi1 = lat.to_radians();
    let lambda1 = lon.to_radians();

    let sin_phi2 = (phi1.sin() * delta.cos() + phi1.cos() * delta.sin() * theta.cos()).clamp(-1.0, 1.0);
    let phi2 = sin_phi2.asin();
    let lambda2 = lambda1
        + (theta.sin() * delta.sin() * phi1.cos()).atan2(delta.cos() - phi1.sin() * sin_phi2);

    Coordinate::new(phi2.to_degrees(), normalize_longitude(lambda2.to_degrees()))
}

/// Sampled great-circle ray, see [`geodesic_arc`]
#[derive(Debug, Clone)]
pub struct GeodesicArc {
    origin: Coordinate,
    azimuth_deg: f64,
    spacing_m: f64,
    next: usize,
    steps: usize,
}

impl Iterator for GeodesicArc {
    type Item = Coordinate;

    fn next(&mut self) -> Option<Coordinate> {
        if self.next >= self.steps {
            return None;
        }
        let index = self.next;
        self.next += 1;

        if index == 0 {
            return Some(self.origin);
        }
        Some(destination(
            self.origin.lat,
            self.origin.lon,
            self.azimuth_deg,
            self.spacing_m * index as f64,
        ))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.steps - self.next;
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for GeodesicArc {}

impl FusedIterator for GeodesicArc {}

/// `steps` points along the great circle leaving (`lat`, `lon`) at `azimuth_deg`.
///
/// The first point is the origin itself and the last lies `max_distance_m`
/// away, with equal spacing in between. Distance from the origin grows
/// monotonically as long as `max_distance_m` stays within half the
/// circumference.
pub fn geodesic_arc(steps: usize, max_distance_m: f64, lat: f64, lon: f64, azimuth_deg: f64) -> GeodesicArc {
    let spacing_m = if steps > 1 {
        max_distance_m / (steps - 1) as f64
    } else {
        0.0
    };

    GeodesicArc {
        origin: Coordinate::new(lat, lon),
        azimuth_deg: normalize_bearing(azimuth_deg),
        spacing_m,
        next: 0,
        steps,
    }
}

/// Outcome of intersecting two bearing rays
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Triangulation {
    /// Both rays reach this point travelling forward
    Intersection(Coordinate),
    /// Parallel, coincident, or diverging rays
    NoIntersection,
}

impl Triangulation {
    pub fn intersection(&self) -> Option<Coordinate> {
        match self {
            Triangulation::Intersection(point) => Some(*point),
            Triangulation::NoIntersection => None,
        }
    }

    pub fn is_intersection(&self) -> bool {
        matches!(self, Triangulation::Intersection(_))
    }
}

/// Intersection of the ray leaving point 1 at `az1` with the ray leaving point 2 at `az2`.
///
/// Great circles always meet twice; only an intersection lying ahead of both
/// origins, within a quarter circumference of each, is reported.
pub fn triangulate(lat1: f64, lon1: f64, az1: f64, lat2: f64, lon2: f64, az2: f64) -> Triangulation {
    let phi1 = lat1.to_radians();
    let lambda1 = lon1.to_radians();
    let phi2 = lat2.to_radians();
    let theta13 = normalize_bearing(az1).to_radians();
    let theta23 = normalize_bearing(az2).to_radians();

    let delta12 = central_angle(lat1, lon1, lat2, lon2);
    if delta12.abs() < COINCIDENT_TOLERANCE {
        return Triangulation::NoIntersection;
    }

    // Bearings along the baseline, in both directions
    let cos_theta_a = ((phi2.sin() - phi1.sin() * delta12.cos()) / (delta12.sin() * phi1.cos())).clamp(-1.0, 1.0);
    let cos_theta_b = ((phi1.sin() - phi2.sin() * delta12.cos()) / (delta12.sin() * phi2.cos())).clamp(-1.0, 1.0);
    let theta_a = cos_theta_a.acos();
    let theta_b = cos_theta_b.acos();

    let (theta12, theta21) = if (lon2 - lon1).to_radians().sin() > 0.0 {
        (theta_a, 2.0 * PI - theta_b)
    } else {
        (2.0 * PI - theta_a, theta_b)
    };

    let alpha1 = theta13 - theta12;
    let alpha2 = theta21 - theta23;

    if alpha1.sin().abs() < PARALLEL_TOLERANCE && alpha2.sin().abs() < PARALLEL_TOLERANCE {
        return Triangulation::NoIntersection;
    }
    if alpha1.sin() * alpha2.sin() < 0.0 {
        return Triangulation::NoIntersection;
    }

    let cos_alpha3 = -alpha1.cos() * alpha2.cos() + alpha1.sin() * alpha2.sin() * delta12.cos();
    let delta13 = (delta12.sin() * alpha1.sin() * alpha2.sin()).atan2(alpha2.cos() + alpha1.cos() * cos_alpha3);

    if delta13 <= 0.0 || delta13 > FRAC_PI_2 {
        return Triangulation::NoIntersection;
    }

    let sin_phi3 = (phi1.sin() * delta13.cos() + phi1.cos() * delta13.sin() * theta13.cos()).clamp(-1.0, 1.0);
    let phi3 = sin_phi3.asin();
    let d_lambda13 = (theta13.sin() * delta13.sin() * phi1.cos()).atan2(delta13.cos() - phi1.sin() * sin_phi3);
    let point = Coordinate::new(phi3.to_degrees(), normalize_longitude((lambda1 + d_lambda13).to_degrees()));

    let delta23 = central_angle(lat2, lon2, point.lat, point.lon);
    if delta23 > FRAC_PI_2 {
        return Triangulation::NoIntersection;
    }
    if delta23 > COINCIDENT_TOLERANCE
        && bearing_difference(bearing(lat2, lon2, point.lat, point.lon), az2) > FORWARD_BEARING_TOLERANCE_DEG
    {
        return Triangulation::NoIntersection;
    }

    Triangulation::Intersection(point)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::Rng;

    fn random_coordinate(rng: &mut impl Rng) -> (f64, f64) {
        (rng.gen_range(-80.0..80.0), rng.gen_range(-179.0..179.0))
    }

    #[test]
    fn test_distance_is_symmetric() {
        let mut rng = rand::thread_rng();
        for _ in 0..200 {
            let (lat1, lon1) = random_coordinate(&mut rng);
            let (lat2, lon2) = random_coordinate(&mut rng);
            let ab = distance(lat1, lon1, lat2, lon2, 0.0, 0.0);
            let ba = distance(lat2, lon2, lat1, lon1, 0.0, 0.0);
            assert!((ab - ba).abs() < 1e-6, "{} != {}", ab, ba);
        }
    }

    #[test]
    fn test_distance_to_self_is_zero() {
        let mut rng = rand::thread_rng();
        for _ in 0..100 {
            let (lat, lon) = random_coordinate(&mut rng);
            assert_eq!(distance(lat, lon, lat, lon, 12.0, 12.0), 0.0);
        }
    }

    #[test]
    fn test_distance_known_values() {
        // One degree of latitude on the 6371 km sphere
        let d = aerial_distance(0.0, 0.0, 1.0, 0.0);
        assert!((d - 111_194.9).abs() < 1.0);

        // ~100 m north of the origin
        let d = aerial_distance(0.0, 0.0, 0.0009, 0.0);
        assert!((d - 100.07).abs() < 0.1);

        // Pure altitude difference
        let d = distance(10.0, 10.0, 10.0, 10.0, 100.0, 40.0);
        assert!((d - 60.0).abs() < 1e-9);
    }

    #[test]
    fn test_bearing_cardinal_directions() {
        assert!(bearing(0.0, 0.0, 1.0, 0.0).abs() < 1e-9);
        assert!((bearing(0.0, 0.0, 0.0, 1.0) - 90.0).abs() < 1e-9);
        assert!((bearing(0.0, 0.0, -1.0, 0.0) - 180.0).abs() < 1e-9);
        assert!((bearing(0.0, 0.0, 0.0, -1.0) - 270.0).abs() < 1e-9);
    }

    #[test]
    fn test_bearing_is_normalized() {
        let mut rng = rand::thread_rng();
        for _ in 0..200 {
            let (lat1, lon1) = random_coordinate(&mut rng);
            let (lat2, lon2) = random_coordinate(&mut rng);
            let b = bearing(lat1, lon1, lat2, lon2);
            assert!((0.0..360.0).contains(&b), "bearing {} out of range", b);
        }
    }

    #[test]
    fn test_bearing_reciprocal_for_nearby_points() {
        let mut rng = rand::thread_rng();
        for _ in 0..200 {
            let lat1: f64 = rng.gen_range(-60.0..60.0);
            let lon1: f64 = rng.gen_range(-170.0..170.0);
            let lat2 = lat1 + rng.gen_range(-0.01..0.01);
            let lon2 = lon1 + rng.gen_range(-0.01..0.01);
            if aerial_distance(lat1, lon1, lat2, lon2) < 1.0 {
                continue;
            }

            let forward = bearing(lat1, lon1, lat2, lon2);
            let back = bearing(lat2, lon2, lat1, lon1);
            let diff = bearing_difference(forward, normalize_bearing(back + 180.0));
            assert!(diff < 0.02, "forward {} back {} diff {}", forward, back, diff);
        }
    }

    #[test]
    fn test_normalize_bearing() {
        assert_eq!(normalize_bearing(0.0), 0.0);
        assert_eq!(normalize_bearing(360.0), 0.0);
        assert_eq!(normalize_bearing(-90.0), 270.0);
        assert_eq!(normalize_bearing(725.0), 5.0);
        assert!(normalize_bearing(-1e-20) < 360.0);
    }

    #[test]
    fn test_destination_round_trip_distance() {
        let target = destination(45.0, 7.0, 33.0, 12_345.0);
        assert!((aerial_distance(45.0, 7.0, target.lat, target.lon) - 12_345.0).abs() < 1e-3);
        assert!((bearing(45.0, 7.0, target.lat, target.lon) - 33.0).abs() < 1e-6);
    }

    #[test]
    fn test_geodesic_arc_properties() {
        let (lat, lon, az) = (31.77, 35.21, 57.0);
        let arc: Vec<Coordinate> = geodesic_arc(200, 1e5, lat, lon, az).collect();

        assert_eq!(arc.len(), 200);
        assert_eq!(arc[0], Coordinate::new(lat, lon));

        let last = arc[arc.len() - 1];
        assert!((aerial_distance(lat, lon, last.lat, last.lon) - 1e5).abs() < 1e-3);

        let mut previous = 0.0;
        for point in &arc {
            let d = aerial_distance(lat, lon, point.lat, point.lon);
            assert!(d + 1e-9 >= previous);
            previous = d;
        }
    }

    #[test]
    fn test_geodesic_arc_degenerate_step_counts() {
        assert_eq!(geodesic_arc(0, 1e5, 0.0, 0.0, 0.0).count(), 0);

        let single: Vec<Coordinate> = geodesic_arc(1, 1e5, 10.0, 20.0, 90.0).collect();
        assert_eq!(single, vec![Coordinate::new(10.0, 20.0)]);

        let mut arc = geodesic_arc(3, 10.0, 0.0, 0.0, 0.0);
        assert_eq!(arc.len(), 3);
        arc.by_ref().for_each(drop);
        assert!(arc.next().is_none());
    }

    #[test]
    fn test_triangulate_same_ray_has_no_intersection() {
        let result = triangulate(32.0, 35.0, 45.0, 32.0, 35.0, 45.0);
        assert_eq!(result, Triangulation::NoIntersection);
    }

    #[test]
    fn test_triangulate_converging_rays() {
        let result = triangulate(0.0, 0.0, 45.0, 0.0, 0.02, 315.0);
        let point = result.intersection().expect("rays converge");

        assert!((point.lat - 0.01).abs() < 1e-5);
        assert!((point.lon - 0.01).abs() < 1e-5);
        assert!(bearing_difference(bearing(0.0, 0.0, point.lat, point.lon), 45.0) < 1e-6);
        assert!(bearing_difference(bearing(0.0, 0.02, point.lat, point.lon), 315.0) < 1e-3);
    }

    #[test]
    fn test_triangulate_matches_known_target() {
        let target = Coordinate::new(32.1, 35.3);
        let (lat1, lon1) = (32.0, 35.2);
        let (lat2, lon2) = (32.05, 35.45);
        let az1 = bearing(lat1, lon1, target.lat, target.lon);
        let az2 = bearing(lat2, lon2, target.lat, target.lon);

        let point = triangulate(lat1, lon1, az1, lat2, lon2, az2).intersection().unwrap();
        assert!(aerial_distance(point.lat, point.lon, target.lat, target.lon) < 0.01);
    }

    #[test]
    fn test_triangulate_parallel_and_diverging_rays() {
        // Both rays along the shared baseline, facing away from each other
        assert!(!triangulate(0.0, 0.0, 270.0, 0.0, 0.01, 90.0).is_intersection());

        // Rays opening away from each other only meet on the far side of the globe
        assert!(!triangulate(0.0, 0.0, 300.0, 0.0, 0.01, 60.0).is_intersection());

        // Intersection behind the second observer
        assert!(!triangulate(0.0, 0.0, 45.0, 0.0, 0.02, 135.0).is_intersection());
    }
}
