//! Anchor placement for location markers
//!
//! This module converts geographic markers into camera-relative anchors:
//! the placement math, the overlap policies, refresh scheduling with its
//! single-pass guard, and the engine tying them to a renderer and a pose feed.

pub mod engine;
pub mod geometry;
pub mod marker;
pub mod overlap;
pub mod refresh;

pub use engine::{
    AnchorPlacementEngine, PassOutcome, PassReport, Placement, PlacementError, PlacementFailure, PlacementResult,
    SkipReason, SkippedMarker,
};
pub use geometry::{compute_geometry, MarkerGeometry, PlacementParams};
pub use marker::{LocationMarker, MarkerId};
pub use overlap::{resolve_overlaps, OverlapAction, OverlapCandidate, OverlapPolicy};
pub use refresh::{
    lock_scheduler, spawn_refresh_timer, Clock, ManualClock, PassEntry, PassGuard, RefreshHandle, RefreshScheduler,
    RefreshState, RefreshTimer, SharedScheduler, SystemClock,
};
