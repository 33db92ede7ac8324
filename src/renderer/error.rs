//! Renderer error types and recovery classification

use crate::renderer::AnchorHandle;
use thiserror::Error;

/// Errors reported by an anchor renderer
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RenderError {
    /// The renderer refused to create an anchor at the requested offset
    #[error("anchor rejected: {reason}")]
    AnchorRejected { reason: String },
    /// The handle does not name a live anchor
    #[error("unknown anchor {handle}")]
    UnknownAnchor { handle: AnchorHandle },
    /// Camera tracking is not established, no pose to anchor against
    #[error("camera tracking lost")]
    TrackingLost,
    /// Backend-specific failure
    #[error("renderer error {code}: {description}")]
    Backend { code: u32, description: String },
}

/// Result type for renderer operations
pub type RenderResult<T> = Result<T, RenderError>;

/// What the placement engine should do after a renderer failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveryStrategy {
    /// Try the marker again on the next pass
    RetryNextPass,
    /// Forget the anchor handle and place from scratch next pass
    DropAnchor,
    /// Give up on the marker
    Fail,
}

impl RenderError {
    /// Recommended recovery strategy for this error
    pub fn recovery_strategy(&self) -> RecoveryStrategy {
        match self {
            RenderError::AnchorRejected { .. } => RecoveryStrategy::RetryNextPass,
            RenderError::UnknownAnchor { .. } => RecoveryStrategy::DropAnchor,
            RenderError::TrackingLost => RecoveryStrategy::RetryNextPass,
            RenderError::Backend { .. } => RecoveryStrategy::Fail,
        }
    }

    /// Check if this error is recoverable
    pub fn is_recoverable(&self) -> bool {
        !matches!(self.recovery_strategy(), RecoveryStrategy::Fail)
    }
}
