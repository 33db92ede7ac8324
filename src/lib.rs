//! Geospatial scene computation
//!
//! Turns device pose, points of interest and terrain visibility into what an
//! augmented-reality or map view draws: camera-anchored location markers,
//! bearing-line triangulation between observers, and the set of places
//! visible from a viewshed.

pub mod core;
pub mod algorithms;
pub mod processing;
pub mod placement;
pub mod renderer;
pub mod api;
pub mod utils;

// Re-export commonly used types
pub use core::{BoundingBox, Coordinate, EARTH_RADIUS_M};
pub use algorithms::geodesy::{bearing, destination, distance, geodesic_arc, triangulate, Triangulation};
pub use algorithms::triangulation::{TriangulationObservation, TriangulationSession, TriangulationUpdate};
pub use processing::{intersect_visible_places, CellType, GeoRaster, PointOfInterest, Raster, ViewshedGrid, VisiblePlace};
pub use placement::{AnchorPlacementEngine, LocationMarker, MarkerId, PassOutcome, PassReport, RefreshHandle};
pub use renderer::{AnchorHandle, AnchorRenderer, LocalOffset, MockRenderer, RenderError};
pub use api::{DevicePoseProvider, EventDispatcher, HostEvent, StaticPose};
pub use utils::{ConfigError, SceneConfig};
