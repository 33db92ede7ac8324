//! Spherical geodesy and bearing-line triangulation

pub mod geodesy;
pub mod triangulation;

pub use geodesy::{GeodesicArc, Triangulation};
pub use triangulation::{TriangulatedPoint, TriangulationObservation, TriangulationSession, TriangulationUpdate};
