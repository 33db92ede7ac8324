//! Anchor renderer interface trait and placement parameters

use crate::renderer::RenderResult;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque handle to a renderer-owned anchor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AnchorHandle(u64);

impl AnchorHandle {
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn id(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for AnchorHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Offset from the camera in scene units (meters).
///
/// `x` points right, `y` up and `-z` straight ahead of the camera.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct LocalOffset {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl LocalOffset {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// Horizontal distance from the camera
    pub fn horizontal_distance(&self) -> f64 {
        self.x.hypot(self.z)
    }
}

/// How a marker's rendered size reacts to its distance
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScalingMode {
    /// Same on-screen size at any distance
    #[default]
    FixedSizeOnScreen,
    /// Natural perspective, no compensation
    NoScaling,
    /// Shrink gradually up to the render distance cap
    GradualToMaxRenderDistance,
    /// Shrink gradually, then hold a fixed size
    GradualFixedSize,
}

/// Scaling parameters handed to the renderer for every anchor
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScalingParams {
    pub mode: ScalingMode,
    /// Multiplier applied on top of the mode's scale
    pub modifier: f64,
    pub gradual_min_scale: f64,
    pub gradual_max_scale: f64,
}

impl Default for ScalingParams {
    fn default() -> Self {
        Self {
            mode: ScalingMode::FixedSizeOnScreen,
            modifier: 1.0,
            gradual_min_scale: 0.8,
            gradual_max_scale: 1.4,
        }
    }
}

impl ScalingParams {
    pub fn with_mode(mut self, mode: ScalingMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_modifier(mut self, modifier: f64) -> Self {
        self.modifier = modifier;
        self
    }
}

/// Abstraction over the 3D scene that owns anchors.
///
/// Anchors are created relative to the current camera pose. Implementations
/// are driven from the thread that owns the scene and need not be thread-safe.
pub trait AnchorRenderer {
    /// Height of the camera in scene coordinates
    fn camera_height(&self) -> f64;

    /// Create an enabled anchor at `offset` from the camera
    fn create_anchor(&mut self, offset: LocalOffset) -> RenderResult<AnchorHandle>;

    /// Detach an anchor from the scene, invalidating its handle
    fn detach(&mut self, handle: AnchorHandle) -> RenderResult<()>;

    /// Show or hide an anchor
    fn set_enabled(&mut self, handle: AnchorHandle, enabled: bool) -> RenderResult<()>;

    /// Whether the anchor is live and shown
    fn is_enabled(&self, handle: AnchorHandle) -> bool;

    /// Rendered height of the anchor's content
    fn set_height(&mut self, handle: AnchorHandle, height: f64) -> RenderResult<()>;

    /// Scaling behavior of the anchor's content
    fn set_scaling(&mut self, handle: AnchorHandle, params: &ScalingParams) -> RenderResult<()>;

    /// Re-apply scale and face the content towards the camera
    fn scale_and_rotate(&mut self, handle: AnchorHandle) -> RenderResult<()>;
}
