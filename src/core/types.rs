//! Core data types for the geospatial layer

use crate::algorithms::geodesy;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Geographic position in decimal degrees
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub lat: f64,
    pub lon: f64,
    /// Elevation above sea level (meters), when known
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub elevation: Option<f64>,
}

impl Coordinate {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self {
            lat,
            lon,
            elevation: None,
        }
    }

    pub fn with_elevation(mut self, elevation: f64) -> Self {
        self.elevation = Some(elevation);
        self
    }

    /// Great-circle distance to `other`, including the elevation delta when both are known
    pub fn distance_to(&self, other: &Coordinate) -> f64 {
        let (alt1, alt2) = match (self.elevation, other.elevation) {
            (Some(a), Some(b)) => (a, b),
            _ => (0.0, 0.0),
        };
        geodesy::distance(self.lat, self.lon, other.lat, other.lon, alt1, alt2)
    }

    /// Initial bearing towards `other` in [0, 360)
    pub fn bearing_to(&self, other: &Coordinate) -> f64 {
        geodesy::bearing(self.lat, self.lon, other.lat, other.lon)
    }

    pub fn is_valid(&self) -> bool {
        self.lat.is_finite()
            && self.lon.is_finite()
            && (-90.0..=90.0).contains(&self.lat)
            && (-180.0..=180.0).contains(&self.lon)
    }
}

impl fmt::Display for Coordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[lat: {:.6}, lon: {:.6}]", self.lat, self.lon)
    }
}

/// Geographic bounding box in decimal degrees
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub north: f64,
    pub south: f64,
    pub east: f64,
    pub west: f64,
}

impl BoundingBox {
    pub fn new(north: f64, south: f64, east: f64, west: f64) -> Self {
        Self {
            north,
            south,
            east,
            west,
        }
    }

    /// Box reaching `radius_m` from `center` in each cardinal direction
    pub fn around(center: Coordinate, radius_m: f64) -> Self {
        let north = geodesy::destination(center.lat, center.lon, 0.0, radius_m);
        let south = geodesy::destination(center.lat, center.lon, 180.0, radius_m);
        let east = geodesy::destination(center.lat, center.lon, 90.0, radius_m);
        let west = geodesy::destination(center.lat, center.lon, 270.0, radius_m);

        Self {
            north: north.lat,
            south: south.lat,
            east: east.lon,
            west: west.lon,
        }
    }

    /// Tightest box enclosing every coordinate, `None` for an empty set
    pub fn enclosing<'a, I>(points: I) -> Option<Self>
    where
        I: IntoIterator<Item = &'a Coordinate>,
    {
        let mut iter = points.into_iter();
        let first = iter.next()?;
        let mut bbox = Self::new(first.lat, first.lat, first.lon, first.lon);

        for point in iter {
            bbox.north = bbox.north.max(point.lat);
            bbox.south = bbox.south.min(point.lat);
            bbox.east = bbox.east.max(point.lon);
            bbox.west = bbox.west.min(point.lon);
        }

        Some(bbox)
    }

    pub fn center(&self) -> Coordinate {
        Coordinate::new(
            (self.north + self.south) / 2.0,
            (self.east + self.west) / 2.0,
        )
    }

    pub fn contains(&self, point: &Coordinate) -> bool {
        (self.south..=self.north).contains(&point.lat) && (self.west..=self.east).contains(&point.lon)
    }

    pub fn lat_span(&self) -> f64 {
        self.north - self.south
    }

    pub fn lon_span(&self) -> f64 {
        self.east - self.west
    }
}

impl fmt::Display for BoundingBox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[N: {:.6}, S: {:.6}, E: {:.6}, W: {:.6}]",
            self.north, self.south, self.east, self.west
        )
    }
}
