//! Renderer abstraction layer for scene anchors
//!
//! The placement engine never touches scene objects directly. It drives an
//! [`AnchorRenderer`] through opaque [`AnchorHandle`]s, which keeps the
//! placement math independent of any particular 3D toolkit.

pub mod anchor;
pub mod error;
pub mod mock;

pub use anchor::{AnchorHandle, AnchorRenderer, LocalOffset, ScalingMode, ScalingParams};
pub use error::{RecoveryStrategy, RenderError, RenderResult};
pub use mock::{MockAnchor, MockRenderer, RenderCall};
