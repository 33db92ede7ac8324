//! Points of interest and the Overpass-style feed they arrive in

use crate::core::Coordinate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A point of interest from the places feed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PointOfInterest {
    /// Single located point
    Node {
        coordinate: Coordinate,
        name: Option<String>,
    },
    /// Area or line, described by its bounding box
    Way {
        min: Coordinate,
        max: Coordinate,
        #[serde(default)]
        geometry: Vec<Coordinate>,
        name: Option<String>,
    },
}

impl PointOfInterest {
    pub fn node(lat: f64, lon: f64, name: Option<&str>) -> Self {
        PointOfInterest::Node {
            coordinate: Coordinate::new(lat, lon),
            name: name.map(str::to_string),
        }
    }

    pub fn way(min: Coordinate, max: Coordinate, name: Option<&str>) -> Self {
        PointOfInterest::Way {
            min,
            max,
            geometry: Vec::new(),
            name: name.map(str::to_string),
        }
    }

    pub fn name(&self) -> Option<&str> {
        match self {
            PointOfInterest::Node { name, .. } | PointOfInterest::Way { name, .. } => name.as_deref(),
        }
    }

    /// Representative location: the node itself, or a way's bounding-box centroid
    pub fn location(&self) -> Coordinate {
        match self {
            PointOfInterest::Node { coordinate, .. } => *coordinate,
            PointOfInterest::Way { min, max, .. } => centroid(min, max),
        }
    }
}

/// Midpoint of a bounding box given by its min and max corners
pub fn centroid(min: &Coordinate, max: &Coordinate) -> Coordinate {
    Coordinate::new((min.lat + max.lat) / 2.0, (min.lon + max.lon) / 2.0)
}

/// Feed parsing errors
#[derive(Debug, Error)]
pub enum FeedError {
    #[error("malformed places feed")]
    Malformed(#[from] serde_json::Error),
}

#[derive(Debug, Deserialize)]
struct OverpassResponse {
    #[serde(default)]
    elements: Vec<OverpassElement>,
}

#[derive(Debug, Deserialize)]
struct OverpassElement {
    #[serde(rename = "type")]
    kind: String,
    lat: Option<f64>,
    lon: Option<f64>,
    bounds: Option<OverpassBounds>,
    #[serde(default)]
    geometry: Vec<OverpassPoint>,
    #[serde(default)]
    tags: OverpassTags,
}

#[derive(Debug, Deserialize)]
struct OverpassBounds {
    minlat: f64,
    minlon: f64,
    maxlat: f64,
    maxlon: f64,
}

#[derive(Debug, Deserialize)]
struct OverpassPoint {
    lat: f64,
    lon: f64,
}

#[derive(Debug, Default, Deserialize)]
struct OverpassTags {
    name: Option<String>,
}

impl OverpassElement {
    fn into_poi(self) -> Option<PointOfInterest> {
        let name = self.tags.name;
        if self.kind == "node" {
            return Some(PointOfInterest::Node {
                coordinate: Coordinate::new(self.lat?, self.lon?),
                name,
            });
        }

        let bounds = self.bounds?;
        Some(PointOfInterest::Way {
            min: Coordinate::new(bounds.minlat, bounds.minlon),
            max: Coordinate::new(bounds.maxlat, bounds.maxlon),
            geometry: self
                .geometry
                .into_iter()
                .map(|point| Coordinate::new(point.lat, point.lon))
                .collect(),
            name,
        })
    }
}

/// Ordered collection of points of interest
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PoiFeed {
    pub places: Vec<PointOfInterest>,
}

impl PoiFeed {
    /// Parse an Overpass `out geom` style response.
    ///
    /// Nodes without coordinates and non-node elements without bounds are skipped.
    pub fn from_json(content: &str) -> Result<Self, FeedError> {
        let response: OverpassResponse = serde_json::from_str(content)?;
        let total = response.elements.len();

        let places: Vec<PointOfInterest> = response
            .elements
            .into_iter()
            .filter_map(OverpassElement::into_poi)
            .collect();

        if places.len() < total {
            log::debug!("skipped {} unlocatable feed elements", total - places.len());
        }
        Ok(Self { places })
    }

    pub fn len(&self) -> usize {
        self.places.len()
    }

    pub fn is_empty(&self) -> bool {
        self.places.is_empty()
    }
}
