use crate::core::{
    CALIBRATED_INTERVAL_FACTOR, CALIBRATION_ITERATIONS, DEFAULT_DISTANCE_LIMIT_M, DEFAULT_REFRESH_INTERVAL_MS,
    HEIGHT_COMPENSATION_COEFFICIENT, RENDER_DISTANCE_M,
};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Top-level configuration for the geospatial scene
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SceneConfig {
    /// Anchor placement and refresh scheduling
    pub placement: PlacementConfig,
    /// Bearing-line triangulation on the map
    pub triangulation: TriangulationConfig,
    /// Map viewport framing
    pub viewport: ViewportConfig,
}

/// Anchor placement engine parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlacementConfig {
    /// Refresh interval before calibration completes (milliseconds)
    pub base_refresh_interval_ms: u64,
    /// Scheduler ticks before the interval backs off
    pub calibration_iterations: u32,
    /// Multiplier applied to the base interval once calibrated
    pub calibrated_interval_factor: u32,
    /// Cap on marker distances inside the scene (meters)
    pub distance_limit_m: f64,
    /// Value restored by `reset_distance_limit` (meters)
    pub default_distance_limit_m: f64,
    /// Furthest an anchor is placed from the camera (meters)
    pub render_distance_m: f64,
    /// Height raise per meter lost to distance capping
    pub height_compensation_coefficient: f64,
    /// Markers further than this shrink with distance (meters)
    pub near_threshold_m: f64,
    /// Compass correction added to every relative bearing (degrees)
    pub bearing_adjustment_deg: f64,
    /// Width of a distance group band (meters)
    pub distance_group_size_m: f64,
    /// Keep refreshing at the base interval instead of backing off
    pub continuous_marker_refresh: bool,
    /// Ask the renderer to re-orient anchors right after placement
    pub minimal_refreshing: bool,
    /// Refresh on every location update instead of on a timer
    pub refresh_on_location_change: bool,
    /// Raise markers that overlap on screen
    pub offset_overlapping: bool,
    /// Hide all but the nearest of overlapping markers
    pub remove_overlapping: bool,
    /// Markers whose relative bearings differ by less than this overlap (degrees)
    pub overlap_bearing_tolerance_deg: f64,
    /// Vertical raise per overlapping marker (meters)
    pub overlap_height_step_m: f64,
}

impl Default for PlacementConfig {
    fn default() -> Self {
        Self {
            base_refresh_interval_ms: DEFAULT_REFRESH_INTERVAL_MS,
            calibration_iterations: CALIBRATION_ITERATIONS,
            calibrated_interval_factor: CALIBRATED_INTERVAL_FACTOR,
            distance_limit_m: DEFAULT_DISTANCE_LIMIT_M,
            default_distance_limit_m: DEFAULT_DISTANCE_LIMIT_M,
            render_distance_m: RENDER_DISTANCE_M,
            height_compensation_coefficient: HEIGHT_COMPENSATION_COEFFICIENT,
            near_threshold_m: RENDER_DISTANCE_M,
            bearing_adjustment_deg: 0.0,
            distance_group_size_m: 1_000.0,
            continuous_marker_refresh: false,
            minimal_refreshing: false,
            refresh_on_location_change: false,
            offset_overlapping: false,
            remove_overlapping: false,
            overlap_bearing_tolerance_deg: 5.0,
            overlap_height_step_m: 0.5,
        }
    }
}

impl PlacementConfig {
    pub fn base_refresh_interval(&self) -> Duration {
        Duration::from_millis(self.base_refresh_interval_ms)
    }
}

/// Triangulation session parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TriangulationConfig {
    /// Samples per remote observation arc
    pub remote_arc_steps: usize,
    /// Samples for the local observer's line of sight
    pub observer_arc_steps: usize,
    /// Length of every drawn arc (meters)
    pub arc_length_m: f64,
    /// Intersections further than this from the observer are dropped (meters)
    pub max_intersection_distance_m: f64,
    /// Heading changes below this are ignored (degrees)
    pub azimuth_epsilon_deg: f64,
}

impl Default for TriangulationConfig {
    fn default() -> Self {
        Self {
            remote_arc_steps: 1_000,
            observer_arc_steps: 200,
            arc_length_m: 1e5,
            max_intersection_distance_m: 5e4,
            azimuth_epsilon_deg: 1e-2,
        }
    }
}

/// Map viewport framing parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewportConfig {
    /// Radius of the box framed around the observer (meters)
    pub observer_bbox_radius_m: f64,
}

impl Default for ViewportConfig {
    fn default() -> Self {
        Self {
            observer_bbox_radius_m: 5_000.0,
        }
    }
}

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {parameter} = {value}: {reason}")]
    InvalidParameter {
        parameter: String,
        value: String,
        reason: String,
    },
    #[error("failed to access config file '{}'", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed configuration")]
    Serialization(#[from] serde_json::Error),
}

impl ConfigError {
    fn invalid(parameter: &str, value: impl ToString, reason: &str) -> Self {
        ConfigError::InvalidParameter {
            parameter: parameter.to_string(),
            value: value.to_string(),
            reason: reason.to_string(),
        }
    }
}

/// Configuration validation result
#[derive(Debug, Default)]
pub struct ValidationResult {
    pub errors: Vec<ConfigError>,
    pub warnings: Vec<String>,
}

impl ValidationResult {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    /// First error, if any
    pub fn into_result(self) -> Result<Vec<String>, ConfigError> {
        match self.errors.into_iter().next() {
            Some(error) => Err(error),
            None => Ok(self.warnings),
        }
    }
}

impl SceneConfig {
    /// Load and validate a JSON configuration file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&content)
    }

    pub fn from_json(content: &str) -> Result<Self, ConfigError> {
        let config: SceneConfig = serde_json::from_str(content)?;
        for warning in config.validate().into_result()? {
            log::warn!("configuration: {}", warning);
        }
        Ok(config)
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let path = path.as_ref();
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn validate(&self) -> ValidationResult {
        let mut result = ValidationResult::default();
        let placement = &self.placement;

        if placement.base_refresh_interval_ms == 0 {
            result.errors.push(ConfigError::invalid(
                "base_refresh_interval_ms",
                placement.base_refresh_interval_ms,
                "refresh interval must be positive",
            ));
        }
        if placement.calibrated_interval_factor == 0 {
            result.errors.push(ConfigError::invalid(
                "calibrated_interval_factor",
                placement.calibrated_interval_factor,
                "interval factor must be at least 1",
            ));
        }
        for (name, value) in [
            ("distance_limit_m", placement.distance_limit_m),
            ("default_distance_limit_m", placement.default_distance_limit_m),
            ("render_distance_m", placement.render_distance_m),
            ("near_threshold_m", placement.near_threshold_m),
            ("distance_group_size_m", placement.distance_group_size_m),
        ] {
            if !(value.is_finite() && value > 0.0) {
                result.errors.push(ConfigError::invalid(name, value, "must be a positive distance"));
            }
        }
        if !(placement.height_compensation_coefficient.is_finite() && placement.height_compensation_coefficient >= 0.0) {
            result.errors.push(ConfigError::invalid(
                "height_compensation_coefficient",
                placement.height_compensation_coefficient,
                "coefficient must be non-negative",
            ));
        }
        if !placement.bearing_adjustment_deg.is_finite() {
            result.errors.push(ConfigError::invalid(
                "bearing_adjustment_deg",
                placement.bearing_adjustment_deg,
                "must be finite",
            ));
        }
        if placement.offset_overlapping && placement.remove_overlapping {
            result.errors.push(ConfigError::invalid(
                "remove_overlapping",
                true,
                "offset_overlapping and remove_overlapping are mutually exclusive",
            ));
        }
        if !(0.0..180.0).contains(&placement.overlap_bearing_tolerance_deg) {
            result.errors.push(ConfigError::invalid(
                "overlap_bearing_tolerance_deg",
                placement.overlap_bearing_tolerance_deg,
                "tolerance must be within [0, 180)",
            ));
        }
        if placement.render_distance_m > placement.distance_limit_m {
            result.warnings.push(format!(
                "render distance {} m exceeds the distance limit {} m and will never be reached",
                placement.render_distance_m, placement.distance_limit_m
            ));
        }

        let triangulation = &self.triangulation;
        if triangulation.remote_arc_steps < 2 || triangulation.observer_arc_steps < 2 {
            result.errors.push(ConfigError::invalid(
                "arc_steps",
                triangulation.remote_arc_steps.min(triangulation.observer_arc_steps),
                "arcs need at least two samples",
            ));
        }
        if !(triangulation.arc_length_m.is_finite() && triangulation.arc_length_m > 0.0) {
            result.errors.push(ConfigError::invalid(
                "arc_length_m",
                triangulation.arc_length_m,
                "must be a positive distance",
            ));
        }
        if triangulation.max_intersection_distance_m > triangulation.arc_length_m {
            result.warnings.push(format!(
                "intersections up to {} m are kept but arcs end at {} m",
                triangulation.max_intersection_distance_m, triangulation.arc_length_m
            ));
        }
        if triangulation.azimuth_epsilon_deg < 0.0 {
            result.errors.push(ConfigError::invalid(
                "azimuth_epsilon_deg",
                triangulation.azimuth_epsilon_deg,
                "must be non-negative",
            ));
        }

        if !(self.viewport.observer_bbox_radius_m.is_finite() && self.viewport.observer_bbox_radius_m > 0.0) {
            result.errors.push(ConfigError::invalid(
                "observer_bbox_radius_m",
                self.viewport.observer_bbox_radius_m,
                "must be a positive distance",
            ));
        }

        result
    }
}
