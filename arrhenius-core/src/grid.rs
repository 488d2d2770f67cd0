//! Geographic grid discretization
//!
//! This module provides [`GridSpec`], the latitude/longitude discretization a
//! model run operates on, and [`GridCell`], the identity of a single cell.
//!
//! A grid is described by the angular width of its cells in degrees. The
//! rounding policy is strict: steps must divide the 180 degrees of latitude
//! and 360 degrees of longitude into a whole number of cells, otherwise the
//! grid is rejected rather than silently truncated.
//!
//! # Examples
//!
//! ```rust
//! use arrhenius_core::grid::GridSpec;
//!
//! let grid = GridSpec::new(10.0, 10.0).unwrap();
//! assert_eq!(grid.cell_count(), 18 * 36);
//! ```

use crate::errors::{ArrheniusError, ArrheniusResult};
use crate::FloatValue;
use serde::{Deserialize, Serialize};

/// Tolerance for deciding whether a step divides the sphere evenly, in cells.
const DIVISIBILITY_TOLERANCE: f64 = 1e-9;

/// Identity of a single grid cell.
///
/// Immutable once constructed for a run. Ordering is row-major: latitude
/// index first, then longitude index, matching the order in which
/// [`GridSpec::cells`] yields cells.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct GridCell {
    pub lat_index: usize,
    pub lon_index: usize,
}

impl GridCell {
    pub fn new(lat_index: usize, lon_index: usize) -> Self {
        Self {
            lat_index,
            lon_index,
        }
    }
}

/// Discretization of the globe into latitude/longitude cells.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GridSpec {
    lat_step: FloatValue,
    lon_step: FloatValue,
    lat_cells: usize,
    lon_cells: usize,
}

impl GridSpec {
    /// Create a grid with cells `lat_step` degrees tall and `lon_step`
    /// degrees wide.
    ///
    /// Fails with [`ArrheniusError::InvalidGrid`] if either step is
    /// non-positive, does not divide the sphere evenly, or yields a grid
    /// with no cells.
    pub fn new(lat_step: FloatValue, lon_step: FloatValue) -> ArrheniusResult<Self> {
        if !(lat_step > 0.0) || !(lon_step > 0.0) {
            return Err(ArrheniusError::InvalidGrid(format!(
                "steps must be positive, got lat_step={lat_step}, lon_step={lon_step}"
            )));
        }

        let lat_cells = Self::divide(180.0, lat_step, "latitude")?;
        let lon_cells = Self::divide(360.0, lon_step, "longitude")?;
        if lat_cells == 0 || lon_cells == 0 {
            return Err(ArrheniusError::InvalidGrid(format!(
                "grid of {lat_cells} x {lon_cells} cells has no area"
            )));
        }

        Ok(Self {
            lat_step,
            lon_step,
            lat_cells,
            lon_cells,
        })
    }

    fn divide(extent: f64, step: f64, dimension: &str) -> ArrheniusResult<usize> {
        let cells = extent / step;
        if (cells - cells.round()).abs() > DIVISIBILITY_TOLERANCE {
            return Err(ArrheniusError::InvalidGrid(format!(
                "{dimension} step {step} does not divide {extent} degrees evenly"
            )));
        }
        Ok(cells.round() as usize)
    }

    pub fn lat_step(&self) -> FloatValue {
        self.lat_step
    }

    pub fn lon_step(&self) -> FloatValue {
        self.lon_step
    }

    /// Number of latitude bands in the grid.
    pub fn lat_cells(&self) -> usize {
        self.lat_cells
    }

    /// Number of cells per latitude band.
    pub fn lon_cells(&self) -> usize {
        self.lon_cells
    }

    /// Total number of cells in the grid.
    pub fn cell_count(&self) -> usize {
        self.lat_cells * self.lon_cells
    }

    /// Latitude of a cell's center in degrees, south pole negative.
    pub fn center_lat(&self, lat_index: usize) -> FloatValue {
        -90.0 + (lat_index as FloatValue + 0.5) * self.lat_step
    }

    /// Longitude of a cell's center in degrees, in `[-180, 180)`.
    pub fn center_lon(&self, lon_index: usize) -> FloatValue {
        -180.0 + (lon_index as FloatValue + 0.5) * self.lon_step
    }

    /// Iterate over every cell of the grid in row-major order (latitude
    /// outer, longitude inner).
    ///
    /// The sequence is finite, deterministic and restartable: each call
    /// produces a fresh iterator over the same cells.
    pub fn cells(&self) -> impl Iterator<Item = GridCell> + '_ {
        (0..self.lat_cells)
            .flat_map(move |lat| (0..self.lon_cells).map(move |lon| GridCell::new(lat, lon)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ten_degree_grid_has_648_cells() {
        let grid = GridSpec::new(10.0, 10.0).unwrap();
        assert_eq!(grid.lat_cells(), 18);
        assert_eq!(grid.lon_cells(), 36);
        assert_eq!(grid.cell_count(), 648);
    }

    #[test]
    fn fractional_steps_divide_evenly() {
        let grid = GridSpec::new(0.5, 0.5).unwrap();
        assert_eq!(grid.cell_count(), 360 * 720);
    }

    #[test]
    fn non_positive_steps_rejected() {
        assert!(GridSpec::new(0.0, 10.0).is_err());
        assert!(GridSpec::new(10.0, -1.0).is_err());
        assert!(GridSpec::new(f64::NAN, 10.0).is_err());
    }

    #[test]
    fn uneven_steps_rejected() {
        let result = GridSpec::new(7.0, 10.0);
        assert!(matches!(result, Err(ArrheniusError::InvalidGrid(_))));
        assert!(GridSpec::new(10.0, 7.0).is_err());
    }

    #[test]
    fn cells_are_row_major_and_restartable() {
        let grid = GridSpec::new(90.0, 90.0).unwrap();
        let first: Vec<GridCell> = grid.cells().collect();
        assert_eq!(first.len(), 2 * 4);
        assert_eq!(first[0], GridCell::new(0, 0));
        assert_eq!(first[1], GridCell::new(0, 1));
        assert_eq!(first[4], GridCell::new(1, 0));

        // A second traversal yields the identical sequence.
        let second: Vec<GridCell> = grid.cells().collect();
        assert_eq!(first, second);
    }

    #[test]
    fn cell_centers() {
        let grid = GridSpec::new(10.0, 10.0).unwrap();
        assert_eq!(grid.center_lat(0), -85.0);
        assert_eq!(grid.center_lat(17), 85.0);
        assert_eq!(grid.center_lon(0), -175.0);
        assert_eq!(grid.center_lon(35), 175.0);
    }
}
