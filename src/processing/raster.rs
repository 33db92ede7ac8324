//! Raster grid contract and the viewshed classification grid

use crate::core::{BoundingBox, Coordinate};
use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Raster lookup errors
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RasterError {
    #[error("coordinate {coordinate} lies outside the raster")]
    OutOfBounds { coordinate: Coordinate },
    #[error("invalid raster geometry: {reason}")]
    InvalidGeometry { reason: String },
    #[error("grid has {actual} cells, expected {expected}")]
    DimensionMismatch { expected: usize, actual: usize },
}

/// Result type for raster operations
pub type RasterResult<T> = Result<T, RasterError>;

/// Fixed-size grid over a geographic area.
///
/// Row 0 is the northern edge, column 0 the western edge.
pub trait Raster {
    fn rows(&self) -> usize;
    fn cols(&self) -> usize;

    /// Cell containing `coordinate`, bounds-checked
    fn row_col_of(&self, coordinate: &Coordinate) -> RasterResult<(usize, usize)>;
}

/// Regular latitude/longitude grid over a bounding box
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeoRaster {
    bounds: BoundingBox,
    rows: usize,
    cols: usize,
}

impl GeoRaster {
    pub fn new(bounds: BoundingBox, rows: usize, cols: usize) -> RasterResult<Self> {
        if rows == 0 || cols == 0 {
            return Err(RasterError::InvalidGeometry {
                reason: format!("{}x{} grid is empty", rows, cols),
            });
        }
        if !(bounds.lat_span() > 0.0 && bounds.lon_span() > 0.0) {
            return Err(RasterError::InvalidGeometry {
                reason: format!("bounds {} have no area", bounds),
            });
        }

        Ok(Self { bounds, rows, cols })
    }

    pub fn bounds(&self) -> &BoundingBox {
        &self.bounds
    }

    /// Center coordinate of a cell
    pub fn cell_center(&self, row: usize, col: usize) -> Option<Coordinate> {
        if row >= self.rows || col >= self.cols {
            return None;
        }
        let cell_height = self.bounds.lat_span() / self.rows as f64;
        let cell_width = self.bounds.lon_span() / self.cols as f64;

        Some(Coordinate::new(
            self.bounds.north - (row as f64 + 0.5) * cell_height,
            self.bounds.west + (col as f64 + 0.5) * cell_width,
        ))
    }
}

impl Raster for GeoRaster {
    fn rows(&self) -> usize {
        self.rows
    }

    fn cols(&self) -> usize {
        self.cols
    }

    fn row_col_of(&self, coordinate: &Coordinate) -> RasterResult<(usize, usize)> {
        if !self.bounds.contains(coordinate) {
            return Err(RasterError::OutOfBounds {
                coordinate: *coordinate,
            });
        }

        let row_fraction = (self.bounds.north - coordinate.lat) / self.bounds.lat_span();
        let col_fraction = (coordinate.lon - self.bounds.west) / self.bounds.lon_span();

        // The southern and eastern edges belong to the last row and column
        let row = ((row_fraction * self.rows as f64).floor() as usize).min(self.rows - 1);
        let col = ((col_fraction * self.cols as f64).floor() as usize).min(self.cols - 1);

        Ok((row, col))
    }
}

/// Visibility classification of a raster cell
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum CellType {
    /// Visible from the observation point
    Viewshed,
    /// Hidden by terrain
    Obstructed,
    #[default]
    Unknown,
}

/// Per-cell visibility grid, same dimensions as its raster
#[derive(Debug, Clone, PartialEq)]
pub struct ViewshedGrid {
    cells: DMatrix<CellType>,
}

impl ViewshedGrid {
    /// Grid with every cell set to `fill`
    pub fn filled(rows: usize, cols: usize, fill: CellType) -> Self {
        Self {
            cells: DMatrix::from_element(rows, cols, fill),
        }
    }

    /// Grid from cells listed row by row
    pub fn from_row_slice(rows: usize, cols: usize, cells: &[CellType]) -> RasterResult<Self> {
        if cells.len() != rows * cols {
            return Err(RasterError::DimensionMismatch {
                expected: rows * cols,
                actual: cells.len(),
            });
        }
        Ok(Self {
            cells: DMatrix::from_row_slice(rows, cols, cells),
        })
    }

    pub fn rows(&self) -> usize {
        self.cells.nrows()
    }

    pub fn cols(&self) -> usize {
        self.cells.ncols()
    }

    /// Cell classification, `None` outside the grid
    pub fn get(&self, row: usize, col: usize) -> Option<CellType> {
        self.cells.get((row, col)).copied()
    }

    pub fn set(&mut self, row: usize, col: usize, cell: CellType) -> RasterResult<()> {
        let (rows, cols) = self.cells.shape();
        match self.cells.get_mut((row, col)) {
            Some(slot) => {
                *slot = cell;
                Ok(())
            }
            None => Err(RasterError::InvalidGeometry {
                reason: format!("cell ({}, {}) outside {}x{} grid", row, col, rows, cols),
            }),
        }
    }

    pub fn is_visible(&self, row: usize, col: usize) -> bool {
        self.get(row, col) == Some(CellType::Viewshed)
    }

    pub fn visible_count(&self) -> usize {
        self.cells.iter().filter(|cell| **cell == CellType::Viewshed).count()
    }

    /// Whether the grid matches the raster's dimensions
    pub fn matches<R: Raster + ?Sized>(&self, raster: &R) -> bool {
        self.rows() == raster.rows() && self.cols() == raster.cols()
    }
}
