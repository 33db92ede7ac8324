//! Placement math: from a geographic target to a camera-relative offset
//!
//! Distant targets are pulled in to the render distance, then raised a little
//! to keep the horizon illusion, and shrunk so their apparent size still
//! matches the real distance.

use crate::algorithms::geodesy::{self, normalize_bearing};
use crate::core::Coordinate;
use crate::renderer::LocalOffset;
use crate::utils::config::PlacementConfig;
use serde::Serialize;

/// Parameters of the placement math for one pass
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlacementParams {
    pub distance_limit_m: f64,
    pub render_distance_m: f64,
    pub height_compensation_coefficient: f64,
    pub near_threshold_m: f64,
    pub bearing_adjustment_deg: f64,
}

impl PlacementParams {
    /// Parameters from configuration, with the engine's live limit and adjustment
    pub fn from_config(config: &PlacementConfig, distance_limit_m: f64, bearing_adjustment_deg: f64) -> Self {
        Self {
            distance_limit_m,
            render_distance_m: config.render_distance_m,
            height_compensation_coefficient: config.height_compensation_coefficient,
            near_threshold_m: config.near_threshold_m,
            bearing_adjustment_deg,
        }
    }
}

/// Where and how large a target is drawn
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MarkerGeometry {
    /// Surface distance from the device (meters)
    pub true_distance_m: f64,
    /// Absolute bearing from the device (degrees)
    pub bearing_deg: f64,
    /// Bearing relative to the device heading, in [0, 360)
    pub relative_bearing_deg: f64,
    /// Distance at which the anchor is placed (meters)
    pub render_distance_m: f64,
    /// Raise added to compensate for distance capping (meters)
    pub height_offset_m: f64,
    pub offset: LocalOffset,
    /// Height handed to the renderer
    pub rendered_height: f64,
}

/// Compute the placement of a target seen from `device` facing `heading`
pub fn compute_geometry(
    device: &Coordinate,
    heading: f64,
    target: &Coordinate,
    target_height: f64,
    camera_height: f64,
    params: &PlacementParams,
) -> MarkerGeometry {
    let true_distance_m = geodesy::aerial_distance(device.lat, device.lon, target.lat, target.lon);
    let bearing_deg = device.bearing_to(target);
    let relative_bearing_deg = normalize_bearing(bearing_deg - heading + params.bearing_adjustment_deg + 360.0);

    let render_distance_m = true_distance_m
        .min(params.distance_limit_m)
        .min(params.render_distance_m)
        .max(0.0);

    let height_offset_m = if render_distance_m < true_distance_m {
        let capped_true = true_distance_m.min(params.distance_limit_m / 2.0);
        // A limit below twice the render distance never lowers the marker
        (params.height_compensation_coefficient * (capped_true - render_distance_m)).max(0.0)
    } else {
        0.0
    };

    let rotation = relative_bearing_deg.to_radians();
    let offset = LocalOffset::new(
        -render_distance_m * rotation.sin(),
        camera_height + height_offset_m,
        -render_distance_m * rotation.cos(),
    );

    let rendered_height = if true_distance_m > params.near_threshold_m {
        params.near_threshold_m * target_height / true_distance_m
    } else {
        target_height
    };

    MarkerGeometry {
        true_distance_m,
        bearing_deg,
        relative_bearing_deg,
        render_distance_m,
        height_offset_m,
        offset,
        rendered_height,
    }
}
