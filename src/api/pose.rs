//! Device pose feed consumed by the placement engine

use crate::core::Coordinate;
use std::sync::{Arc, RwLock};

/// Source of the device's location fix and compass heading.
///
/// Polled once per placement pass.
pub trait DevicePoseProvider {
    /// Current location fix, `None` until the first fix arrives
    fn location(&self) -> Option<Coordinate>;

    /// Current heading in degrees clockwise from north
    fn heading(&self) -> f64;
}

/// A single pose reading
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PoseSample {
    pub location: Option<Coordinate>,
    pub heading: f64,
}

impl PoseSample {
    pub fn new(location: Coordinate, heading: f64) -> Self {
        Self {
            location: Some(location),
            heading,
        }
    }
}

/// Fixed pose, updated explicitly by the owner
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct StaticPose {
    sample: PoseSample,
}

impl StaticPose {
    pub fn new(location: Coordinate, heading: f64) -> Self {
        Self {
            sample: PoseSample::new(location, heading),
        }
    }

    /// Pose with no location fix yet
    pub fn unavailable() -> Self {
        Self::default()
    }

    pub fn set_location(&mut self, location: Option<Coordinate>) {
        self.sample.location = location;
    }

    pub fn set_heading(&mut self, heading: f64) {
        self.sample.heading = heading;
    }
}

impl DevicePoseProvider for StaticPose {
    fn location(&self) -> Option<Coordinate> {
        self.sample.location
    }

    fn heading(&self) -> f64 {
        self.sample.heading
    }
}

/// Pose shared between a sensor thread (writer) and the render thread (reader)
#[derive(Debug, Clone, Default)]
pub struct SharedPose {
    inner: Arc<RwLock<PoseSample>>,
}

impl SharedPose {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update(&self, sample: PoseSample) {
        match self.inner.write() {
            Ok(mut guard) => *guard = sample,
            Err(poisoned) => *poisoned.into_inner() = sample,
        }
    }

    pub fn sample(&self) -> PoseSample {
        match self.inner.read() {
            Ok(guard) => *guard,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }
}

impl DevicePoseProvider for SharedPose {
    fn location(&self) -> Option<Coordinate> {
        self.sample().location
    }

    fn heading(&self) -> f64 {
        self.sample().heading
    }
}
