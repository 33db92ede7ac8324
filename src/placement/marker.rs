//! Location markers registered with the placement engine

use crate::core::Coordinate;
use crate::renderer::{AnchorHandle, ScalingParams};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Registration number of a marker in its engine.
///
/// Numbers are never reused, so an id taken before `clear_markers` does not
/// resolve to a marker added afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MarkerId(usize);

impl MarkerId {
    pub fn new(index: usize) -> Self {
        Self(index)
    }

    pub fn index(&self) -> usize {
        self.0
    }
}

impl fmt::Display for MarkerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "marker {}", self.0)
    }
}

/// A geographic point rendered as an anchor in the camera scene
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationMarker {
    pub coordinate: Coordinate,
    /// Real-world height of the marked object (meters)
    #[serde(default)]
    pub height: f64,
    #[serde(default)]
    pub distance_group: i32,
    /// Markers further away than this are not placed (meters), `None` for no limit
    #[serde(default)]
    pub only_render_within_m: Option<f64>,
    #[serde(default)]
    pub scaling: ScalingParams,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(skip)]
    pub(crate) anchor: Option<AnchorHandle>,
}

impl LocationMarker {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self {
            coordinate: Coordinate::new(lat, lon),
            height: 0.0,
            distance_group: 0,
            only_render_within_m: None,
            scaling: ScalingParams::default(),
            name: None,
            anchor: None,
        }
    }

    pub fn with_height(mut self, height: f64) -> Self {
        self.height = height;
        self
    }

    pub fn with_distance_group(mut self, group: i32) -> Self {
        self.distance_group = group;
        self
    }

    pub fn only_render_within(mut self, distance_m: f64) -> Self {
        self.only_render_within_m = Some(distance_m);
        self
    }

    pub fn with_scaling(mut self, scaling: ScalingParams) -> Self {
        self.scaling = scaling;
        self
    }

    pub fn with_name(mut self, name: &str) -> Self {
        self.name = Some(name.to_string());
        self
    }

    /// Anchor currently carrying this marker
    pub fn anchor(&self) -> Option<AnchorHandle> {
        self.anchor
    }

    /// Whether a marker at `distance_m` is close enough to be placed
    pub fn within_render_range(&self, distance_m: f64) -> bool {
        self.only_render_within_m.map_or(true, |limit| distance_m <= limit)
    }
}
