//! Terrain and places processing

pub mod raster;
pub mod poi;
pub mod viewshed;

pub use raster::{CellType, GeoRaster, Raster, RasterError, RasterResult, ViewshedGrid};
pub use poi::{FeedError, PoiFeed, PointOfInterest};
pub use viewshed::{intersect_visible_places, VisiblePlace};
