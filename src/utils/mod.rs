//! Configuration utilities

pub mod config;

pub use config::{ConfigError, PlacementConfig, SceneConfig, TriangulationConfig, ValidationResult, ViewportConfig};
