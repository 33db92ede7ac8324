//! Field-of-view filtering of points of interest against a viewshed grid

use crate::core::Coordinate;
use crate::processing::poi::{centroid, PointOfInterest};
use crate::processing::raster::{Raster, RasterResult, ViewshedGrid};
use serde::Serialize;

/// A point of interest found to be visible
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VisiblePlace {
    /// Label of the place; always present for nodes
    pub name: Option<String>,
    /// Node position, or the way's bounding-box centroid
    pub coordinate: Coordinate,
}

/// Points of interest visible in `grid`, in input order, at most one record each.
///
/// Nodes need a non-empty name and a `Viewshed` cell. Ways are tested against
/// their bounding-box envelope and reported at its centroid as soon as one
/// visible cell is found. Places whose cells fall outside the raster are
/// left out.
pub fn intersect_visible_places<R: Raster + ?Sized>(
    raster: &R,
    grid: &ViewshedGrid,
    pois: &[PointOfInterest],
) -> Vec<VisiblePlace> {
    if !grid.matches(raster) {
        log::warn!(
            "viewshed grid is {}x{} but raster is {}x{}, cells outside either are skipped",
            grid.rows(),
            grid.cols(),
            raster.rows(),
            raster.cols()
        );
    }

    let mut visible = Vec::new();
    let mut out_of_bounds = 0usize;

    for poi in pois {
        match visible_place(raster, grid, poi) {
            Ok(Some(place)) => visible.push(place),
            Ok(None) => {}
            Err(err) => {
                out_of_bounds += 1;
                log::trace!("excluding place: {}", err);
            }
        }
    }

    log::debug!(
        "{} of {} places visible, {} outside the raster",
        visible.len(),
        pois.len(),
        out_of_bounds
    );
    visible
}

fn visible_place<R: Raster + ?Sized>(
    raster: &R,
    grid: &ViewshedGrid,
    poi: &PointOfInterest,
) -> RasterResult<Option<VisiblePlace>> {
    match poi {
        PointOfInterest::Node { coordinate, name } => {
            let (row, col) = raster.row_col_of(coordinate)?;
            let label = match name.as_deref() {
                Some(label) if !label.is_empty() => label,
                _ => return Ok(None),
            };
            if !grid.is_visible(row, col) {
                return Ok(None);
            }
            Ok(Some(VisiblePlace {
                name: Some(label.to_string()),
                coordinate: *coordinate,
            }))
        }
        PointOfInterest::Way { min, max, name, .. } => {
            let (min_row, min_col) = raster.row_col_of(min)?;
            let (max_row, max_col) = raster.row_col_of(max)?;

            let rows = min_row.min(max_row)..=min_row.max(max_row);
            let cols = min_col.min(max_col)..=min_col.max(max_col);

            let any_visible = rows
                .flat_map(|row| cols.clone().map(move |col| (row, col)))
                .any(|(row, col)| grid.is_visible(row, col));

            Ok(any_visible.then(|| VisiblePlace {
                name: name.clone(),
                coordinate: centroid(min, max),
            }))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::BoundingBox;
    use crate::processing::raster::{CellType, GeoRaster};
    use std::cell::Cell;

    fn setup() -> (GeoRaster, ViewshedGrid) {
        let raster = GeoRaster::new(BoundingBox::new(1.0, 0.0, 1.0, 0.0), 10, 10).unwrap();
        let grid = ViewshedGrid::filled(10, 10, CellType::Obstructed);
        (raster, grid)
    }

    #[test]
    fn test_named_visible_node_included() {
        let (raster, mut grid) = setup();
        grid.set(4, 2, CellType::Viewshed).unwrap();

        let pois = vec![PointOfInterest::node(0.55, 0.25, Some("Tower"))];
        let visible = intersect_visible_places(&raster, &grid, &pois);

        assert_eq!(
            visible,
            vec![VisiblePlace {
                name: Some("Tower".to_string()),
                coordinate: Coordinate::new(0.55, 0.25),
            }]
        );
    }

    #[test]
    fn test_unnamed_visible_node_dropped() {
        let (raster, mut grid) = setup();
        grid.set(4, 2, CellType::Viewshed).unwrap();

        let pois = vec![
            PointOfInterest::node(0.55, 0.25, None),
            PointOfInterest::node(0.55, 0.25, Some("")),
        ];
        assert!(intersect_visible_places(&raster, &grid, &pois).is_empty());
    }

    #[test]
    fn test_obstructed_node_excluded() {
        let (raster, grid) = setup();
        let pois = vec![PointOfInterest::node(0.55, 0.25, Some("Tower"))];
        assert!(intersect_visible_places(&raster, &grid, &pois).is_empty());
    }

    #[test]
    fn test_way_reported_once_at_centroid() {
        let (raster, mut grid) = setup();
        grid.set(2, 3, CellType::Viewshed).unwrap();
        grid.set(3, 4, CellType::Viewshed).unwrap();

        let way = PointOfInterest::way(Coordinate::new(0.61, 0.21), Coordinate::new(0.79, 0.49), Some("Ridge"));
        let visible = intersect_visible_places(&raster, &grid, &[way]);

        assert_eq!(visible.len(), 1);
        assert_eq!(visible[0].name.as_deref(), Some("Ridge"));
        assert!((visible[0].coordinate.lat - 0.70).abs() < 1e-12);
        assert!((visible[0].coordinate.lon - 0.35).abs() < 1e-12);
    }

    #[test]
    fn test_hidden_way_excluded() {
        let (raster, mut grid) = setup();
        grid.set(9, 9, CellType::Viewshed).unwrap();

        let way = PointOfInterest::way(Coordinate::new(0.61, 0.21), Coordinate::new(0.79, 0.49), Some("Ridge"));
        assert!(intersect_visible_places(&raster, &grid, &[way]).is_empty());
    }

    #[test]
    fn test_out_of_bounds_places_do_not_fail_the_pass() {
        let (raster, mut grid) = setup();
        grid.set(4, 2, CellType::Viewshed).unwrap();

        let pois = vec![
            PointOfInterest::node(5.0, 5.0, Some("Far away")),
            PointOfInterest::way(Coordinate::new(0.5, 0.5), Coordinate::new(1.5, 0.7), Some("Straddling")),
            PointOfInterest::node(0.55, 0.25, Some("Tower")),
        ];
        let visible = intersect_visible_places(&raster, &grid, &pois);

        assert_eq!(visible.len(), 1);
        assert_eq!(visible[0].name.as_deref(), Some("Tower"));
    }

    #[test]
    fn test_order_preserved() {
        let (raster, _) = setup();
        let grid = ViewshedGrid::filled(10, 10, CellType::Viewshed);

        let pois = vec![
            PointOfInterest::node(0.15, 0.15, Some("b")),
            PointOfInterest::way(Coordinate::new(0.3, 0.3), Coordinate::new(0.4, 0.4), None),
            PointOfInterest::node(0.85, 0.85, Some("a")),
        ];
        let visible = intersect_visible_places(&raster, &grid, &pois);

        let names: Vec<Option<&str>> = visible.iter().map(|place| place.name.as_deref()).collect();
        assert_eq!(names, vec![Some("b"), None, Some("a")]);
    }

    /// Raster wrapper counting coordinate lookups
    struct CountingRaster {
        inner: GeoRaster,
        lookups: Cell<usize>,
    }

    impl Raster for CountingRaster {
        fn rows(&self) -> usize {
            self.inner.rows()
        }

        fn cols(&self) -> usize {
            self.inner.cols()
        }

        fn row_col_of(&self, coordinate: &Coordinate) -> RasterResult<(usize, usize)> {
            self.lookups.set(self.lookups.get() + 1);
            self.inner.row_col_of(coordinate)
        }
    }

    #[test]
    fn test_way_lookup_uses_only_corners() {
        let (inner, _) = setup();
        let raster = CountingRaster {
            inner,
            lookups: Cell::new(0),
        };
        let grid = ViewshedGrid::filled(10, 10, CellType::Viewshed);
        let way = PointOfInterest::way(Coordinate::new(0.05, 0.05), Coordinate::new(0.95, 0.95), Some("Valley"));

        assert_eq!(intersect_visible_places(&raster, &grid, &[way]).len(), 1);
        assert_eq!(raster.lookups.get(), 2);
    }
}
