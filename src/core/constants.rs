//! Physical constants and default tuning parameters

/// Mean Earth radius used by the spherical model (meters)
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Default anchor refresh interval before calibration (milliseconds)
pub const DEFAULT_REFRESH_INTERVAL_MS: u64 = 2_000;

/// Scheduler ticks before the refresh interval backs off
pub const CALIBRATION_ITERATIONS: u32 = 3;

/// Interval multiplier applied once calibrated
pub const CALIBRATED_INTERVAL_FACTOR: u32 = 10;

/// Default cap for marker distances inside the scene (meters)
pub const DEFAULT_DISTANCE_LIMIT_M: f64 = 5_000.0;

/// Furthest distance an anchor is actually placed from the camera (meters)
pub const RENDER_DISTANCE_M: f64 = 10.0;

/// Height raise per meter of distance lost to capping
pub const HEIGHT_COMPENSATION_COEFFICIENT: f64 = 0.005;
