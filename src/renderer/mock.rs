//! Mock renderer implementation for testing and development

use crate::renderer::{AnchorHandle, AnchorRenderer, LocalOffset, RenderError, RenderResult, ScalingParams};
use std::collections::{BTreeMap, HashSet};

/// Calls received by a [`MockRenderer`], in order
#[derive(Debug, Clone, PartialEq)]
pub enum RenderCall {
    CreateAnchor(LocalOffset),
    Detach(AnchorHandle),
    SetEnabled(AnchorHandle, bool),
    SetHeight(AnchorHandle, f64),
    SetScaling(AnchorHandle, ScalingParams),
    ScaleAndRotate(AnchorHandle),
}

/// State of an anchor held by the mock scene
#[derive(Debug, Clone, PartialEq)]
pub struct MockAnchor {
    pub offset: LocalOffset,
    pub enabled: bool,
    pub height: Option<f64>,
    pub scaling: Option<ScalingParams>,
}

/// In-memory scene for testing and development
#[derive(Debug, Default)]
pub struct MockRenderer {
    camera_height: f64,
    anchors: BTreeMap<AnchorHandle, MockAnchor>,
    calls: Vec<RenderCall>,
    next_id: u64,
    create_attempts: usize,
    reject_all: bool,
    rejected_attempts: HashSet<usize>,
}

impl MockRenderer {
    /// Create a new mock renderer with the camera at height zero
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_camera_height(mut self, height: f64) -> Self {
        self.camera_height = height;
        self
    }

    pub fn set_camera_height(&mut self, height: f64) {
        self.camera_height = height;
    }

    /// Reject every anchor creation while enabled
    pub fn reject_anchors(&mut self, reject: bool) {
        self.reject_all = reject;
    }

    /// Reject the `n`-th anchor creation attempt (zero-based, counted over the renderer's lifetime)
    pub fn reject_attempt(&mut self, n: usize) {
        self.rejected_attempts.insert(n);
    }

    /// Get a live anchor
    pub fn anchor(&self, handle: AnchorHandle) -> Option<&MockAnchor> {
        self.anchors.get(&handle)
    }

    /// Number of live anchors
    pub fn anchor_count(&self) -> usize {
        self.anchors.len()
    }

    /// Number of live, enabled anchors
    pub fn enabled_count(&self) -> usize {
        self.anchors.values().filter(|anchor| anchor.enabled).count()
    }

    /// Get all calls received so far
    pub fn calls(&self) -> &[RenderCall] {
        &self.calls
    }

    /// Clear the call history
    pub fn clear_calls(&mut self) {
        self.calls.clear();
    }

    /// Number of `create_anchor` calls received
    pub fn create_count(&self) -> usize {
        self.create_attempts
    }

    fn anchor_mut(&mut self, handle: AnchorHandle) -> RenderResult<&mut MockAnchor> {
        self.anchors
            .get_mut(&handle)
            .ok_or(RenderError::UnknownAnchor { handle })
    }
}

impl AnchorRenderer for MockRenderer {
    fn camera_height(&self) -> f64 {
        self.camera_height
    }

    fn create_anchor(&mut self, offset: LocalOffset) -> RenderResult<AnchorHandle> {
        self.calls.push(RenderCall::CreateAnchor(offset));
        let attempt = self.create_attempts;
        self.create_attempts += 1;

        if self.reject_all || self.rejected_attempts.contains(&attempt) {
            return Err(RenderError::AnchorRejected {
                reason: format!("simulated rejection of attempt {}", attempt),
            });
        }

        let handle = AnchorHandle::new(self.next_id);
        self.next_id += 1;
        self.anchors.insert(
            handle,
            MockAnchor {
                offset,
                enabled: true,
                height: None,
                scaling: None,
            },
        );
        Ok(handle)
    }

    fn detach(&mut self, handle: AnchorHandle) -> RenderResult<()> {
        self.calls.push(RenderCall::Detach(handle));
        self.anchors
            .remove(&handle)
            .map(|_| ())
            .ok_or(RenderError::UnknownAnchor { handle })
    }

    fn set_enabled(&mut self, handle: AnchorHandle, enabled: bool) -> RenderResult<()> {
        self.calls.push(RenderCall::SetEnabled(handle, enabled));
        self.anchor_mut(handle)?.enabled = enabled;
        Ok(())
    }

    fn is_enabled(&self, handle: AnchorHandle) -> bool {
        self.anchors.get(&handle).map_or(false, |anchor| anchor.enabled)
    }

    fn set_height(&mut self, handle: AnchorHandle, height: f64) -> RenderResult<()> {
        self.calls.push(RenderCall::SetHeight(handle, height));
        self.anchor_mut(handle)?.height = Some(height);
        Ok(())
    }

    fn set_scaling(&mut self, handle: AnchorHandle, params: &ScalingParams) -> RenderResult<()> {
        self.calls.push(RenderCall::SetScaling(handle, *params));
        self.anchor_mut(handle)?.scaling = Some(*params);
        Ok(())
    }

    fn scale_and_rotate(&mut self, handle: AnchorHandle) -> RenderResult<()> {
        self.calls.push(RenderCall::ScaleAndRotate(handle));
        self.anchor_mut(handle).map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_anchor_lifecycle() {
        let mut renderer = MockRenderer::new().with_camera_height(1.5);
        assert_eq!(renderer.camera_height(), 1.5);

        let handle = renderer.create_anchor(LocalOffset::new(0.0, 1.5, -10.0)).unwrap();
        assert!(renderer.is_enabled(handle));
        assert_eq!(renderer.anchor_count(), 1);

        renderer.set_enabled(handle, false).unwrap();
        assert!(!renderer.is_enabled(handle));
        assert_eq!(renderer.enabled_count(), 0);

        renderer.detach(handle).unwrap();
        assert_eq!(renderer.anchor_count(), 0);
        assert!(!renderer.is_enabled(handle));
    }

    #[test]
    fn test_stale_handle() {
        let mut renderer = MockRenderer::new();
        let handle = renderer.create_anchor(LocalOffset::default()).unwrap();
        renderer.detach(handle).unwrap();

        assert_eq!(renderer.set_height(handle, 2.0), Err(RenderError::UnknownAnchor { handle }));
        assert!(renderer.detach(handle).is_err());
    }

    #[test]
    fn test_rejection_simulation() {
        let mut renderer = MockRenderer::new();
        renderer.reject_attempt(1);

        assert!(renderer.create_anchor(LocalOffset::default()).is_ok());
        assert!(matches!(
            renderer.create_anchor(LocalOffset::default()),
            Err(RenderError::AnchorRejected { .. })
        ));
        assert!(renderer.create_anchor(LocalOffset::default()).is_ok());

        renderer.reject_anchors(true);
        assert!(renderer.create_anchor(LocalOffset::default()).is_err());
        assert_eq!(renderer.create_count(), 4);
        assert_eq!(renderer.anchor_count(), 2);
    }

    #[test]
    fn test_call_recording() {
        let mut renderer = MockRenderer::new();
        let handle = renderer.create_anchor(LocalOffset::new(1.0, 0.0, -1.0)).unwrap();
        renderer.set_scaling(handle, &ScalingParams::default()).unwrap();
        renderer.scale_and_rotate(handle).unwrap();

        assert_eq!(
            renderer.calls(),
            &[
                RenderCall::CreateAnchor(LocalOffset::new(1.0, 0.0, -1.0)),
                RenderCall::SetScaling(handle, ScalingParams::default()),
                RenderCall::ScaleAndRotate(handle),
            ]
        );
        renderer.clear_calls();
        assert!(renderer.calls().is_empty());
    }
}
