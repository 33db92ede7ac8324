//! Core types and constants shared by the geospatial layer

pub mod types;
pub mod constants;

pub use types::*;
pub use constants::*;
